//! Directory-backed storage with debounced, compressed chunk writes.
//!
//! Each chunk lives in `<dir>/<x>_<y>_<z>.chunk` (see [`crate::chunk_file`]).
//! `save` only schedules a write; repeated saves of the same chunk within the
//! debounce window collapse into one. Writes happen on [`VoxelStorage::flush_due`]
//! or [`FileStorage::flush`], and best-effort on drop.

use std::collections::hash_map::Entry;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;

use crate::chunk_file::{ChunkFileError, decode_chunk, encode_chunk};
use crate::coord::ChunkCoord;
use crate::storage::{ChunkGenerator, VoxelStorage};

/// File extension of persisted chunks.
const CHUNK_EXTENSION: &str = "chunk";

/// Errors surfaced by explicit storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A filesystem operation failed.
    #[error("i/o error on {path}: {source}")]
    Io {
        /// The path being accessed.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// A persisted chunk could not be decoded.
    #[error("corrupt chunk file {path}: {source}")]
    Decode {
        /// The offending file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: ChunkFileError,
    },
}

/// Storage that loads chunks from and persists chunks to a directory.
pub struct FileStorage {
    dir: PathBuf,
    chunk_size: usize,
    debounce: Duration,
    chunks: FxHashMap<ChunkCoord, Box<[u32]>>,
    /// Chunks awaiting a write, with the instant the write becomes due.
    pending: FxHashMap<ChunkCoord, Instant>,
    generator: Option<ChunkGenerator>,
}

impl FileStorage {
    /// Opens (creating if needed) a storage directory.
    ///
    /// # Panics
    ///
    /// Panics if `chunk_size` is zero or does not fit the file header.
    pub fn open(
        dir: impl Into<PathBuf>,
        chunk_size: usize,
        debounce: Duration,
    ) -> Result<Self, StorageError> {
        assert!(
            chunk_size > 0 && chunk_size <= u16::MAX as usize,
            "chunk size must be in 1..=65535"
        );
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| StorageError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self {
            dir,
            chunk_size,
            debounce,
            chunks: FxHashMap::default(),
            pending: FxHashMap::default(),
            generator: None,
        })
    }

    /// Installs a generator for chunks that have never been persisted.
    pub fn with_generator(
        mut self,
        generator: impl Fn(ChunkCoord, &mut [u32]) + Send + 'static,
    ) -> Self {
        self.generator = Some(Box::new(generator));
        self
    }

    /// The backing directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of chunks with a scheduled, unwritten save.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Writes every pending chunk now, regardless of debounce.
    ///
    /// Stops at the first failure, leaving it and the remaining chunks pending.
    pub fn flush(&mut self) -> Result<usize, StorageError> {
        let mut coords: Vec<ChunkCoord> = self.pending.keys().copied().collect();
        coords.sort_unstable();
        let mut written = 0;
        for coord in coords {
            self.write_chunk(coord)?;
            self.pending.remove(&coord);
            written += 1;
        }
        Ok(written)
    }

    /// Lists the coordinates of every chunk persisted in the directory.
    pub fn list_stored(&self) -> Result<Vec<ChunkCoord>, StorageError> {
        let entries = std::fs::read_dir(&self.dir).map_err(|source| StorageError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let mut coords: Vec<ChunkCoord> = entries
            .filter_map(Result::ok)
            .filter_map(|entry| parse_chunk_file_name(&entry.path()))
            .collect();
        coords.sort_unstable();
        Ok(coords)
    }

    fn write_chunk(&self, coord: ChunkCoord) -> Result<(), StorageError> {
        let Some(data) = self.chunks.get(&coord) else {
            return Ok(());
        };
        let path = chunk_path(&self.dir, coord);
        let tmp = path.with_extension("tmp");
        let bytes = encode_chunk(self.chunk_size, data);
        std::fs::write(&tmp, bytes).map_err(|source| StorageError::Io {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &path).map_err(|source| StorageError::Io {
            path: path.clone(),
            source,
        })?;
        tracing::debug!(%coord, "chunk persisted");
        Ok(())
    }
}

impl VoxelStorage for FileStorage {
    fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    fn get(&mut self, coord: ChunkCoord) -> &mut [u32] {
        let volume = self.chunk_size.pow(3);
        match self.chunks.entry(coord) {
            Entry::Occupied(entry) => &mut entry.into_mut()[..],
            Entry::Vacant(entry) => {
                let mut data = vec![0u32; volume].into_boxed_slice();
                if !load_chunk_file(&self.dir, self.chunk_size, coord, &mut data)
                    && let Some(generate) = &self.generator
                {
                    generate(coord, &mut data);
                }
                &mut entry.insert(data)[..]
            }
        }
    }

    fn save(&mut self, coord: ChunkCoord) {
        if self.chunks.contains_key(&coord) {
            self.pending.insert(coord, Instant::now() + self.debounce);
        }
    }

    /// Writes every pending chunk whose debounce window has elapsed by `now`.
    ///
    /// Failures are logged and the chunk stays pending. Returns the number of
    /// chunks written.
    fn flush_due(&mut self, now: Instant) -> usize {
        let due: Vec<ChunkCoord> = self
            .pending
            .iter()
            .filter(|(_, at)| **at <= now)
            .map(|(coord, _)| *coord)
            .collect();
        let mut written = 0;
        for coord in due {
            match self.write_chunk(coord) {
                Ok(()) => {
                    self.pending.remove(&coord);
                    written += 1;
                }
                Err(err) => tracing::warn!(%coord, "deferred chunk save failed: {err}"),
            }
        }
        written
    }
}

impl Drop for FileStorage {
    fn drop(&mut self) {
        if let Err(err) = self.flush() {
            tracing::warn!("chunk flush on drop failed: {err}");
        }
    }
}

/// Path of the file persisting `coord` under `dir`.
fn chunk_path(dir: &Path, coord: ChunkCoord) -> PathBuf {
    dir.join(format!("{}_{}_{}.{CHUNK_EXTENSION}", coord.x, coord.y, coord.z))
}

/// Fills `data` from disk. Returns `false` if nothing usable was found.
fn load_chunk_file(dir: &Path, chunk_size: usize, coord: ChunkCoord, data: &mut [u32]) -> bool {
    let path = chunk_path(dir, coord);
    let bytes = match std::fs::read(&path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return false,
        Err(source) => {
            let err = StorageError::Io { path, source };
            tracing::warn!(%coord, "chunk load failed, regenerating: {err}");
            return false;
        }
    };
    match decode_chunk(&bytes, chunk_size, data) {
        Ok(()) => true,
        Err(source) => {
            let err = StorageError::Decode { path, source };
            tracing::warn!(%coord, "{err}, regenerating");
            data.fill(0);
            false
        }
    }
}

/// Parses `<x>_<y>_<z>.chunk` into a coordinate.
fn parse_chunk_file_name(path: &Path) -> Option<ChunkCoord> {
    if path.extension()? != CHUNK_EXTENSION {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    let mut parts = stem.split('_').map(str::parse::<i32>);
    let x = parts.next()?.ok()?;
    let y = parts.next()?.ok()?;
    let z = parts.next()?.ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(ChunkCoord::new(x, y, z))
}
