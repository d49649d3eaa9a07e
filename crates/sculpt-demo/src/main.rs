//! Headless sculpting demo: stamps a sphere, repaints it, then walks the
//! undo history while the mesh pool keeps chunk geometry current.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use glam::IVec3;
use sculpt_config::{CliArgs, Config};
use sculpt_mesh::CulledKernel;
use sculpt_voxel::{ChunkCoord, FileStorage, MemoryStorage, Voxel, VoxelEdit, VoxelStorage};
use sculpt_world::{World, WorldOptions};
use tracing::{error, info, warn};

/// Batch id shared by every slice of the sphere stroke.
const STROKE_BATCH: u64 = 1;
/// Batch id of the repaint pass.
const PAINT_BATCH: u64 = 2;

fn main() {
    let args = CliArgs::parse();

    let config_dir = args
        .config
        .clone()
        .or_else(Config::default_dir)
        .unwrap_or_else(|| PathBuf::from(".sculpt"));

    let mut config = Config::load_or_create(&config_dir).unwrap_or_else(|e| {
        eprintln!("Failed to load config: {e}, using defaults");
        Config::default()
    });
    config.apply_cli_overrides(&args);

    let log_dir = config_dir.join("logs");
    sculpt_log::init_logging(Some(&log_dir), config.debug.log_to_file, Some(&config));

    if let Err(e) = config.validate() {
        error!("{e}");
        std::process::exit(2);
    }

    let chunk_size = config.world.chunk_size;
    match config.storage.directory.clone() {
        Some(dir) => {
            let storage = match FileStorage::open(&dir, chunk_size, config.storage.debounce()) {
                Ok(storage) => storage.with_generator(ground(chunk_size)),
                Err(e) => {
                    error!("Failed to open chunk storage: {e}");
                    std::process::exit(1);
                }
            };
            match storage.list_stored() {
                Ok(stored) => info!("{} chunks already stored in {}", stored.len(), dir.display()),
                Err(e) => warn!("Could not list stored chunks: {e}"),
            }
            let mut world = sculpt(storage, &config);
            match world.storage_mut().flush() {
                Ok(written) => info!("Flushed {written} chunks to {}", dir.display()),
                Err(e) => error!("Failed to flush chunks: {e}"),
            }
        }
        None => {
            let storage = MemoryStorage::new(chunk_size).with_generator(ground(chunk_size));
            let world = sculpt(storage, &config);
            info!("{} chunks held in memory", world.storage().loaded_count());
        }
    }
}

/// Runs the sculpting session and returns the world for storage teardown.
fn sculpt<S: VoxelStorage>(storage: S, config: &Config) -> World<S> {
    let options = WorldOptions {
        history: config.world.history,
        workers: config.world.workers(),
    };
    let mut world = World::new(storage, Arc::new(CulledKernel::new()), options);
    let changes = world.subscribe();
    let timeout = config.demo.mesh_timeout();
    let radius = config.demo.brush_radius as i32;

    // One stroke, submitted slice by slice like a dragged brush.
    for z in -radius..=radius {
        let slice: Vec<VoxelEdit> = sphere(radius)
            .filter(|p| p.z == z)
            .map(|p| VoxelEdit::set(p.x, p.y, p.z, 255, shade(p, radius)))
            .collect();
        world.update(&slice, Some(STROKE_BATCH));
    }
    settle(&mut world, timeout, "stroke");

    // Repaint the upper half; paint keeps material values.
    let top: Vec<VoxelEdit> = sphere(radius)
        .filter(|p| p.y > 0)
        .map(|p| VoxelEdit::paint(p.x, p.y, p.z, [230, 60, 40]))
        .collect();
    world.update(&top, Some(PAINT_BATCH));
    settle(&mut world, timeout, "paint");

    world.undo();
    settle(&mut world, timeout, "undo");
    world.redo();
    settle(&mut world, timeout, "redo");

    info!(
        "{} change notifications, {} undo steps",
        changes.try_iter().count(),
        world.history().undo_batches().len()
    );
    world.dispose();
    world
}

/// Waits for meshing and logs geometry totals.
fn settle<S: VoxelStorage>(world: &mut World<S>, timeout: std::time::Duration, step: &str) {
    if !world.wait_idle(timeout) {
        warn!(step, in_flight = world.in_flight(), "meshing did not settle in time");
    }
    let (mut visible, mut triangles, mut instances) = (0, 0, 0);
    let mut widest = 0.0_f32;
    for chunk in world.chunks() {
        if let Some(geometry) = chunk.geometry() {
            visible += 1;
            triangles += geometry.triangle_count();
            instances += geometry.instance_count();
            widest = widest.max(geometry.bounding_sphere().1);
        }
    }
    info!(
        step,
        chunks = world.chunks().count(),
        visible,
        triangles,
        instances,
        widest,
        "world settled"
    );
}

/// Integer points inside a sphere centred on the origin.
fn sphere(radius: i32) -> impl Iterator<Item = IVec3> {
    let r2 = radius * radius;
    (-radius..=radius).flat_map(move |z| {
        (-radius..=radius).flat_map(move |y| {
            (-radius..=radius)
                .map(move |x| IVec3::new(x, y, z))
                .filter(move |p| p.length_squared() <= r2)
        })
    })
}

/// Blue-to-white gradient by height.
fn shade(p: IVec3, radius: i32) -> [u8; 3] {
    let t = (p.y + radius) as f32 / (2 * radius).max(1) as f32;
    let c = (80.0 + t * 175.0) as u8;
    [c, c, 255]
}

/// A one-voxel stone floor just below world y = 0.
fn ground(chunk_size: usize) -> impl Fn(ChunkCoord, &mut [u32]) + Send + 'static {
    let stone = Voxel::new(255, [110, 110, 120]).pack();
    move |coord, data| {
        if coord.y != -1 {
            return;
        }
        let top = chunk_size - 1;
        for z in 0..chunk_size {
            let row = (z * chunk_size + top) * chunk_size;
            data[row..row + chunk_size].fill(stone);
        }
    }
}
