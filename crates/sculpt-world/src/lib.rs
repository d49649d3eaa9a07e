//! The sculpted world: edits, undo history, neighbor invalidation and the
//! version-gated meshing loop that keeps chunk entities up to date.

pub mod chunk;
pub mod events;
pub mod history;
pub mod invalidation;
pub mod world;

pub use chunk::Chunk;
pub use events::WorldChanged;
pub use history::{Action, ActionBatch, HistoryLog, MAX_BATCH_ACTIONS};
pub use invalidation::{ChunkSet, MeshInvalidator};
pub use world::{World, WorldOptions};
