//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Sculpt command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "sculpt", about = "Sparse voxel sculpting world")]
pub struct CliArgs {
    /// Chunk side length in voxels.
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Mesh execution units (0 = one per CPU).
    #[arg(long)]
    pub workers: Option<usize>,

    /// Disable undo/redo history.
    #[arg(long)]
    pub no_history: bool,

    /// Persist chunks under this directory instead of keeping them in memory.
    #[arg(long)]
    pub storage_dir: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Sphere brush radius in voxels.
    #[arg(long)]
    pub radius: Option<u32>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(size) = args.chunk_size {
            self.world.chunk_size = size;
        }
        if let Some(workers) = args.workers {
            self.world.mesh_workers = workers;
        }
        if args.no_history {
            self.world.history = false;
        }
        if let Some(ref dir) = args.storage_dir {
            self.storage.directory = Some(dir.clone());
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
        if let Some(radius) = args.radius {
            self.demo.brush_radius = radius;
        }
    }
}
