//! End-to-end behaviour of the world: history, invalidation, and the
//! version-gated meshing loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use sculpt_mesh::{CulledKernel, KernelOutput, MeshKernel, MeshKernelError, VERTEX_STRIDE};
use glam::Vec3;
use sculpt_voxel::{
    ChunkCoord, FileStorage, MemoryStorage, Voxel, VoxelEdit, VoxelStorage, voxel_index,
};
use sculpt_world::{World, WorldChanged, WorldOptions};

const SIZE: usize = 4;
const TIMEOUT: Duration = Duration::from_secs(5);

fn world_with(chunk_size: usize, history: bool) -> World<MemoryStorage> {
    World::new(
        MemoryStorage::new(chunk_size),
        Arc::new(CulledKernel),
        WorldOptions {
            history,
            workers: Some(2),
        },
    )
}

fn snapshot(world: &mut World<MemoryStorage>, coords: &[ChunkCoord]) -> Vec<Vec<u32>> {
    coords
        .iter()
        .map(|&c| world.storage_mut().get(c).to_vec())
        .collect()
}

fn total_triangles<S: VoxelStorage>(world: &World<S>) -> usize {
    world
        .chunks()
        .filter_map(|c| c.geometry())
        .map(|g| g.triangle_count())
        .sum()
}

/// Ticks until `done` holds or the timeout passes.
fn tick_until<S: VoxelStorage>(world: &mut World<S>, mut done: impl FnMut(&World<S>) -> bool) {
    let start = Instant::now();
    while !done(&*world) {
        world.tick();
        assert!(start.elapsed() < TIMEOUT, "Timed out waiting for the world");
        std::thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn test_concrete_scenario_chunk_size_four() {
    let mut world = world_with(SIZE, true);
    world.update(&[VoxelEdit::set(0, 0, 0, 200, [255, 0, 0])], Some(1));
    let origin = ChunkCoord::new(0, 0, 0);
    assert_eq!(
        world.storage_mut().get(origin)[0],
        (0 << 24) | (0 << 16) | (255 << 8) | 200
    );

    world.undo();
    assert_eq!(world.storage_mut().get(origin)[0], 0);
}

#[test]
fn test_undo_round_trip_restores_every_word() {
    let mut world = world_with(SIZE, true);
    let coords = [
        ChunkCoord::new(0, 0, 0),
        ChunkCoord::new(1, 0, 0),
        ChunkCoord::new(-1, 0, 0),
    ];
    world.update(&[VoxelEdit::set(3, 1, 1, 40, [9, 9, 9])], None);
    let before = snapshot(&mut world, &coords);

    world.update(
        &[
            VoxelEdit::set(3, 1, 1, 80, [1, 2, 3]),
            VoxelEdit::set(4, 1, 1, 80, [1, 2, 3]),
            VoxelEdit::set(-1, 0, 0, 1, [0, 0, 0]),
        ],
        Some(5),
    );
    world.update(&[VoxelEdit::paint(3, 1, 1, [200, 0, 0])], Some(5));
    world.update(&[VoxelEdit::erase(4, 1, 1)], None);

    world.undo();
    world.undo();
    assert_eq!(snapshot(&mut world, &coords), before);
}

#[test]
fn test_repeated_voxel_in_one_update_undoes_to_original() {
    let mut world = world_with(SIZE, true);
    world.update(
        &[
            VoxelEdit::set(1, 1, 1, 10, [0, 0, 0]),
            VoxelEdit::set(1, 1, 1, 20, [0, 0, 0]),
        ],
        None,
    );
    assert_eq!(world.history().undo_batches()[0].len(), 1);
    world.undo();
    assert_eq!(world.voxel(1, 1, 1), 0);
    world.redo();
    assert_eq!(world.voxel(1, 1, 1), 20);
}

#[test]
fn test_undo_redo_pair_is_identity_and_resets_merging() {
    let mut world = world_with(SIZE, true);
    world.update(&[VoxelEdit::set(0, 0, 0, 3, [4, 5, 6])], Some(2));
    let before = world.voxel(0, 0, 0);

    world.undo();
    world.redo();
    assert_eq!(world.voxel(0, 0, 0), before);
    assert_eq!(world.history().last(), None);

    world.update(&[VoxelEdit::set(1, 0, 0, 3, [4, 5, 6])], Some(2));
    assert_eq!(world.history().undo_batches().len(), 2);
}

#[test]
fn test_coalescing_keeps_first_undo_and_last_redo() {
    let mut world = world_with(SIZE, true);
    world.update(&[VoxelEdit::set(2, 2, 2, 11, [0, 0, 0])], None);
    let original = world.voxel(2, 2, 2);

    let a = VoxelEdit::set(2, 2, 2, 50, [1, 1, 1]);
    let b = VoxelEdit::set(2, 2, 2, 60, [2, 2, 2]);
    world.update(&[a], Some(7));
    world.update(&[b], Some(7));

    let batches = world.history().undo_batches();
    assert_eq!(batches.len(), 2);
    let actions = batches[1].actions();
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].undo, original);
    assert_eq!(actions[0].redo, Voxel::new(60, [2, 2, 2]).pack());
}

#[test]
fn test_new_user_batch_clears_redo() {
    let mut world = world_with(SIZE, true);
    world.update(&[VoxelEdit::set(0, 0, 0, 1, [0, 0, 0])], None);
    world.undo();
    assert!(world.can_redo());
    world.update(&[VoxelEdit::set(0, 0, 0, 2, [0, 0, 0])], None);
    assert!(!world.can_redo());
}

#[test]
fn test_noop_update_ends_the_running_stroke() {
    let mut world = world_with(SIZE, true);
    world.update(&[VoxelEdit::set(0, 0, 0, 1, [0, 0, 0])], Some(7));
    // Painting air changes nothing but still counts as a user update.
    world.update(&[VoxelEdit::paint(2, 2, 2, [9, 9, 9])], Some(8));
    assert_eq!(world.history().last(), Some(8));
    world.update(&[VoxelEdit::set(1, 0, 0, 1, [0, 0, 0])], Some(7));
    assert_eq!(world.history().last(), Some(7));

    world.undo();
    assert_eq!(world.voxel(1, 0, 0), 0);
    assert_ne!(world.voxel(0, 0, 0), 0);
}

#[test]
fn test_noop_update_clears_redo() {
    let mut world = world_with(SIZE, true);
    world.update(&[VoxelEdit::set(0, 0, 0, 1, [0, 0, 0])], None);
    world.undo();
    assert!(world.can_redo());

    world.update(&[VoxelEdit::paint(3, 3, 3, [1, 1, 1])], Some(3));
    assert!(!world.can_redo());
    assert_eq!(world.history().last(), Some(3));
    world.redo();
    assert_eq!(world.voxel(0, 0, 0), 0);
}

#[test]
fn test_history_disabled_by_default() {
    let mut world = World::new(
        MemoryStorage::new(SIZE),
        Arc::new(CulledKernel),
        WorldOptions::default(),
    );
    world.update(&[VoxelEdit::set(0, 0, 0, 1, [0, 0, 0])], Some(1));
    assert!(!world.can_undo());
    world.undo();
    assert_eq!(world.voxel(0, 0, 0), 1);
    world.dispose();
}

#[test]
fn test_dirty_marks_at_chunk_size_32() {
    let marks = |x: i32, y: i32, z: i32| {
        let mut world = world_with(32, false);
        world.update(&[VoxelEdit::set(x, y, z, 1, [0, 0, 0])], None);
        world.pending_dirty()
    };
    assert_eq!(marks(0, 0, 0), 1);
    assert_eq!(marks(8, 8, 8), 1);
    assert_eq!(marks(16, 16, 16), 8);
    assert_eq!(marks(16, 8, 8), 2);
}

#[test]
fn test_single_voxel_meshes_once_across_chunks() {
    let mut world = world_with(SIZE, false);
    let changes = world.subscribe();
    world.update(&[VoxelEdit::set(1, 1, 1, 255, [255, 255, 255])], None);
    assert_eq!(world.pending_dirty(), 8);
    assert!(world.wait_idle(TIMEOUT));

    assert_eq!(world.chunks().count(), 8);
    assert_eq!(total_triangles(&world), 12);
    let owner = world.chunk(ChunkCoord::new(0, 0, 0)).expect("meshed");
    assert!(owner.is_visible());
    assert_eq!(owner.version(), 1);
    assert_eq!(world.chunks().filter(|c| c.is_visible()).count(), 1);

    let events: Vec<WorldChanged> = changes.try_iter().collect();
    assert_eq!(events.len(), 8);
    assert_eq!(world.change_count(), 8);
}

#[test]
fn test_seam_faces_culled_between_chunk_meshes() {
    let mut world = world_with(SIZE, false);
    world.update(
        &[
            VoxelEdit::set(1, 0, 0, 255, [255, 0, 0]),
            VoxelEdit::set(2, 0, 0, 255, [0, 255, 0]),
        ],
        None,
    );
    assert!(world.wait_idle(TIMEOUT));
    assert_eq!(total_triangles(&world), 20);
}

#[test]
fn test_odd_chunk_size_places_voxel_on_its_world_cell() {
    let mut world = world_with(5, false);
    world.update(&[VoxelEdit::set(0, 0, 0, 255, [255, 255, 255])], None);
    assert!(world.wait_idle(TIMEOUT));

    let owner = world.chunk(ChunkCoord::new(0, 0, 0)).expect("meshed");
    let geometry = owner.geometry().expect("visible");
    assert_eq!(owner.position() + geometry.min(), Vec3::ZERO);
    assert_eq!(owner.position() + geometry.max(), Vec3::ONE);
    assert_eq!(total_triangles(&world), 12);
}

#[test]
fn test_odd_chunk_size_remeshes_both_sides_of_a_seam() {
    // size 5: world x = 1 is the culling margin of chunk 1's window.
    let mut world = world_with(5, false);
    world.update(
        &[
            VoxelEdit::set(1, 0, 0, 255, [255, 0, 0]),
            VoxelEdit::set(2, 0, 0, 255, [0, 255, 0]),
        ],
        None,
    );
    assert!(world.wait_idle(TIMEOUT));
    assert_eq!(total_triangles(&world), 20);

    world.update(&[VoxelEdit::erase(1, 0, 0)], None);
    assert_eq!(world.pending_dirty(), 2);
    assert!(world.wait_idle(TIMEOUT));
    assert_eq!(total_triangles(&world), 12);
}

#[test]
fn test_all_empty_neighborhood_hides_chunk() {
    let mut world = world_with(SIZE, false);
    let coord = ChunkCoord::new(3, -2, 1);
    world.update_chunk(coord);
    assert!(world.wait_idle(TIMEOUT));

    let chunk = world.chunk(coord).expect("entity exists");
    assert!(!chunk.is_visible());
    assert!(chunk.geometry().is_none());
    assert_eq!(chunk.version(), 1);
}

#[test]
fn test_erasing_last_voxel_hides_chunk() {
    let mut world = world_with(SIZE, true);
    world.update(&[VoxelEdit::set(0, 0, 0, 9, [9, 9, 9])], None);
    assert!(world.wait_idle(TIMEOUT));
    assert!(world.chunk(ChunkCoord::default()).is_some_and(|c| c.is_visible()));

    world.undo();
    assert!(world.wait_idle(TIMEOUT));
    let chunk = world.chunk(ChunkCoord::default()).expect("entity exists");
    assert!(!chunk.is_visible());
    assert_eq!(chunk.version(), 2);
}

/// Blocks each job until the gate named by its own chunk's first voxel
/// value is released, then reports that value in `bounds[0]`.
struct Gated {
    gates: Vec<Receiver<()>>,
}

impl MeshKernel for Gated {
    fn run(&self, chunks: &[u32], chunk_size: usize, out: &mut KernelOutput) {
        let own = chunk_size.pow(3) * 7;
        let tag = Voxel::unpack(chunks[own]).value as usize;
        let _ = self.gates[tag].recv();
        out.triangles = 1;
        out.vertices.resize(3 * VERTEX_STRIDE, 0.0);
        out.bounds[0] = tag as f32;
    }
}

#[test]
fn test_late_stale_result_is_discarded() {
    let (release, gates): (Vec<_>, Vec<_>) =
        (0..3).map(|_| crossbeam_channel::unbounded::<()>()).unzip();
    let mut world = World::new(
        MemoryStorage::new(SIZE),
        Arc::new(Gated { gates }),
        WorldOptions {
            history: false,
            workers: Some(2),
        },
    );
    let coord = ChunkCoord::new(0, 0, 0);
    let first_voxel = voxel_index([0, 0, 0], SIZE);

    world.storage_mut().get(coord)[first_voxel] = Voxel::new(1, [0, 0, 0]).pack();
    world.update_chunk(coord);
    world.storage_mut().get(coord)[first_voxel] = Voxel::new(2, [0, 0, 0]).pack();
    world.update_chunk(coord);
    assert_eq!(world.in_flight(), 2);

    // The second dispatch finishes first and is applied.
    release[2].send(()).unwrap();
    tick_until(&mut world, |w| w.chunk(coord).is_some_and(|c| c.version() == 2));

    // The first one arrives late and must not overwrite it.
    release[1].send(()).unwrap();
    tick_until(&mut world, |w| w.in_flight() == 0);

    let chunk = world.chunk(coord).expect("entity exists");
    assert_eq!(chunk.version(), 2);
    assert_eq!(chunk.geometry().map(|g| g.bounds[0]), Some(2.0));
    assert_eq!(world.change_count(), 1);
}

#[test]
fn test_edits_persist_through_file_storage() {
    let dir = tempfile::tempdir().unwrap();
    let storage = FileStorage::open(dir.path(), SIZE, Duration::ZERO).unwrap();
    let mut world = World::new(
        storage,
        Arc::new(CulledKernel),
        WorldOptions {
            history: true,
            workers: Some(1),
        },
    );
    world.update(&[VoxelEdit::set(5, 0, 0, 77, [1, 2, 3])], None);
    assert_eq!(world.storage().pending_count(), 1);
    assert_eq!(world.storage_mut().flush().unwrap(), 1);
    drop(world);

    let mut reopened = FileStorage::open(dir.path(), SIZE, Duration::ZERO).unwrap();
    let data = reopened.get(ChunkCoord::new(1, 0, 0));
    assert_eq!(data[voxel_index([1, 0, 0], SIZE)], Voxel::new(77, [1, 2, 3]).pack());
}

#[test]
fn test_tick_performs_due_saves() {
    let dir = tempfile::tempdir().unwrap();
    let storage = FileStorage::open(dir.path(), SIZE, Duration::ZERO).unwrap();
    let mut world = World::new(storage, Arc::new(CulledKernel), WorldOptions::default());
    world.update(&[VoxelEdit::set(0, 0, 0, 1, [0, 0, 0])], None);
    assert_eq!(world.storage().pending_count(), 1);

    world.tick();
    assert_eq!(world.storage().pending_count(), 0);
    assert_eq!(world.storage().list_stored().unwrap(), vec![ChunkCoord::new(0, 0, 0)]);
}

struct Unloadable;

impl MeshKernel for Unloadable {
    fn init(&self, _chunk_size: usize) -> Result<(), MeshKernelError> {
        Err(MeshKernelError::Init("missing".into()))
    }

    fn run(&self, _chunks: &[u32], _chunk_size: usize, _out: &mut KernelOutput) {
        unreachable!("never initialized");
    }
}

#[test]
fn test_wait_idle_sleeps_out_its_timeout_without_units() {
    let mut world = World::new(
        MemoryStorage::new(SIZE),
        Arc::new(Unloadable),
        WorldOptions {
            history: false,
            workers: Some(2),
        },
    );
    world.update(&[VoxelEdit::set(0, 0, 0, 1, [0, 0, 0])], None);
    // Let every unit report its failure and exit.
    assert!(!world.wait_idle(Duration::from_millis(100)));

    let timeout = Duration::from_millis(60);
    let start = Instant::now();
    assert!(!world.wait_idle(timeout));
    assert!(start.elapsed() >= timeout);
    assert_eq!(world.in_flight(), 1);
}
