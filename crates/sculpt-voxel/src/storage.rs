//! The storage seam: keyed, lazily-created dense voxel buffers.
//!
//! A [`VoxelStorage`] hands out one mutable buffer of `chunk_size³` packed
//! words per chunk. `get` is total: the first access creates the buffer
//! (generated, loaded, or zero-filled). `save` is best-effort and may be
//! deferred or ignored entirely.

use std::time::Instant;

use rustc_hash::FxHashMap;

use crate::coord::ChunkCoord;

/// Fills a freshly created chunk buffer. Called at most once per chunk.
pub type ChunkGenerator = Box<dyn Fn(ChunkCoord, &mut [u32]) + Send>;

/// Keyed access to dense per-chunk voxel buffers.
pub trait VoxelStorage {
    /// Side length of every chunk, fixed for the storage's lifetime.
    fn chunk_size(&self) -> usize;

    /// Returns the buffer for `coord`, creating it on first access.
    ///
    /// The returned slice always holds `chunk_size³` words and is mutated
    /// in place by the caller.
    fn get(&mut self, coord: ChunkCoord) -> &mut [u32];

    /// Requests persistence of the chunk at `coord`. Best-effort.
    fn save(&mut self, coord: ChunkCoord);

    /// Performs deferred saves that are due by `now`. Returns how many
    /// chunks were written.
    fn flush_due(&mut self, now: Instant) -> usize {
        let _ = now;
        0
    }
}

impl<S: VoxelStorage + ?Sized> VoxelStorage for Box<S> {
    fn chunk_size(&self) -> usize {
        (**self).chunk_size()
    }

    fn get(&mut self, coord: ChunkCoord) -> &mut [u32] {
        (**self).get(coord)
    }

    fn save(&mut self, coord: ChunkCoord) {
        (**self).save(coord)
    }

    fn flush_due(&mut self, now: Instant) -> usize {
        (**self).flush_due(now)
    }
}

/// Volatile storage: buffers live in memory and `save` does nothing.
pub struct MemoryStorage {
    chunk_size: usize,
    chunks: FxHashMap<ChunkCoord, Box<[u32]>>,
    generator: Option<ChunkGenerator>,
}

impl MemoryStorage {
    /// Default chunk side length.
    pub const DEFAULT_CHUNK_SIZE: usize = 32;

    /// Creates an empty storage with the given chunk size.
    ///
    /// # Panics
    ///
    /// Panics if `chunk_size` is zero.
    pub fn new(chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "chunk size must be positive");
        Self {
            chunk_size,
            chunks: FxHashMap::default(),
            generator: None,
        }
    }

    /// Installs a generator that fills chunks on first access.
    pub fn with_generator(
        mut self,
        generator: impl Fn(ChunkCoord, &mut [u32]) + Send + 'static,
    ) -> Self {
        self.generator = Some(Box::new(generator));
        self
    }

    /// Number of chunks created so far.
    pub fn loaded_count(&self) -> usize {
        self.chunks.len()
    }

    /// Returns `true` if the chunk at `coord` has been created.
    pub fn contains(&self, coord: ChunkCoord) -> bool {
        self.chunks.contains_key(&coord)
    }

    /// Read-only view of a created chunk, without creating it.
    pub fn peek(&self, coord: ChunkCoord) -> Option<&[u32]> {
        self.chunks.get(&coord).map(|data| &data[..])
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CHUNK_SIZE)
    }
}

impl VoxelStorage for MemoryStorage {
    fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    fn get(&mut self, coord: ChunkCoord) -> &mut [u32] {
        let volume = self.chunk_size.pow(3);
        let generator = &self.generator;
        self.chunks.entry(coord).or_insert_with(|| {
            let mut data = vec![0u32; volume].into_boxed_slice();
            if let Some(generate) = generator {
                generate(coord, &mut data);
            }
            data
        })
    }

    fn save(&mut self, _coord: ChunkCoord) {}
}
