//! Voxel words, chunk coordinates, and the storage seam behind a sculpted world.

pub mod chunk_file;
pub mod coord;
pub mod file_storage;
pub mod rle;
pub mod storage;
pub mod word;

pub use chunk_file::ChunkFileError;
pub use coord::{
    ChunkCoord, NEIGHBORHOOD_LEN, chunk_origin, half_chunk, neighborhood, split_world,
    voxel_index,
};
pub use file_storage::{FileStorage, StorageError};
pub use storage::{ChunkGenerator, MemoryStorage, VoxelStorage};
pub use word::{Voxel, VoxelEdit};
