//! The world orchestrator.
//!
//! `World` owns the voxel storage, the chunk entities and the mesh worker
//! pool, and is the only writer of voxel data. All of its state lives on
//! the thread that owns it; the pool's units only ever see copies.
//!
//! Scheduling is cooperative. `update` marks affected chunks dirty and, on
//! the transition from clean to dirty, schedules one deferred drain. The
//! drain runs on the next [`World::tick`] (or [`World::run_deferred`]), so
//! every edit made between two ticks collapses into a single remesh wave.
//! The same tick polls the pool and applies finished meshes, accepting a
//! result only if the chunk has not already shown a newer one, and lets the
//! storage perform deferred saves.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use rustc_hash::FxHashMap;
use sculpt_mesh::{JobId, MeshCompletion, MeshKernel, MeshWorkerPool};
use sculpt_voxel::word::VALUE_MASK;
use sculpt_voxel::{
    ChunkCoord, Voxel, VoxelEdit, VoxelStorage, neighborhood, split_world, voxel_index,
};

use crate::chunk::Chunk;
use crate::events::{ChangeNotifier, WorldChanged};
use crate::history::{Action, ActionBatch, HistoryLog};
use crate::invalidation::{ChunkSet, MeshInvalidator};

/// Upper bound on a single blocking wait inside [`World::wait_idle`].
const WAIT_SLICE: Duration = Duration::from_millis(10);

/// Construction options for [`World`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorldOptions {
    /// Record undo/redo history. Off by default.
    pub history: bool,
    /// Number of mesh execution units; `None` uses one per CPU.
    pub workers: Option<usize>,
}

/// Sparse voxel world with asynchronous chunk meshing.
pub struct World<S: VoxelStorage> {
    storage: S,
    chunk_size: usize,
    chunks: FxHashMap<ChunkCoord, Chunk>,
    dirty: ChunkSet,
    drain_scheduled: bool,
    pool: Option<MeshWorkerPool>,
    /// Dispatched jobs and the request number each one carries.
    in_flight: FxHashMap<JobId, (ChunkCoord, u64)>,
    history: HistoryLog,
    notifier: ChangeNotifier,
}

impl<S: VoxelStorage> World<S> {
    /// Creates a world over `storage`, meshing with `kernel`.
    pub fn new<K: MeshKernel + ?Sized>(
        storage: S,
        kernel: Arc<K>,
        options: WorldOptions,
    ) -> Self {
        let chunk_size = storage.chunk_size();
        let pool = match options.workers {
            Some(workers) => MeshWorkerPool::with_concurrency(kernel, chunk_size, workers),
            None => MeshWorkerPool::new(kernel, chunk_size),
        };
        tracing::info!(
            chunk_size,
            workers = pool.concurrency(),
            history = options.history,
            "world created"
        );
        Self {
            storage,
            chunk_size,
            chunks: FxHashMap::default(),
            dirty: ChunkSet::new(),
            drain_scheduled: false,
            pool: Some(pool),
            in_flight: FxHashMap::default(),
            history: HistoryLog::new(options.history),
            notifier: ChangeNotifier::default(),
        }
    }

    /// Applies a user edit batch.
    ///
    /// Updates sharing a `batch` id with the previous recorded update are
    /// merged into one undo step. `None` never merges.
    pub fn update(&mut self, edits: &[VoxelEdit], batch: Option<u64>) {
        self.apply(edits, batch, false);
    }

    /// Applies edits without recording history, as undo/redo do.
    pub fn replay(&mut self, edits: &[VoxelEdit]) {
        self.apply(edits, None, true);
    }

    /// Reverts the most recent batch. No-op when there is nothing to undo.
    pub fn undo(&mut self) {
        if let Some(edits) = self.history.undo() {
            tracing::debug!(voxels = edits.len(), "undo");
            self.replay(&edits);
        }
    }

    /// Reapplies the most recently undone batch. No-op when there is nothing
    /// to redo.
    pub fn redo(&mut self) {
        if let Some(edits) = self.history.redo() {
            tracing::debug!(voxels = edits.len(), "redo");
            self.replay(&edits);
        }
    }

    fn apply(&mut self, edits: &[VoxelEdit], batch: Option<u64>, from_history: bool) {
        let chunk_size = self.chunk_size;
        let had_dirty = !self.dirty.is_empty();
        let record = self.history.is_enabled() && !from_history;
        let mut actions = ActionBatch::new();
        let mut affected = ChunkSet::new();

        for edit in edits {
            let (coord, local) = split_world(edit.x, edit.y, edit.z, chunk_size);
            let index = voxel_index(local, chunk_size);
            let data = self.storage.get(coord);
            let current = data[index];
            let value = match edit.value {
                Some(value) => value,
                None => match (current & VALUE_MASK) as u8 {
                    // Painting air does nothing.
                    0 => continue,
                    value => value,
                },
            };
            let updated = Voxel::new(value, [edit.r, edit.g, edit.b]).pack();
            data[index] = updated;

            for stale in MeshInvalidator::invalidate(coord, local, chunk_size) {
                self.dirty.insert(stale);
            }
            affected.insert(coord);
            if record {
                actions.record(Action {
                    x: edit.x,
                    y: edit.y,
                    z: edit.z,
                    undo: current,
                    redo: updated,
                });
            }
        }

        if record {
            self.history.record(batch, actions);
        }

        for coord in affected.iter() {
            self.storage.save(coord);
        }

        if !had_dirty && !self.dirty.is_empty() {
            self.drain_scheduled = true;
            tracing::trace!(dirty = self.dirty.len(), "remesh drain scheduled");
        }
    }

    /// Dispatches a remesh of the chunk at `coord`, creating its entity on
    /// first use.
    ///
    /// The neighborhood `coord - 1 ..= coord` is copied to the pool
    /// immediately; the result is applied by a later [`tick`](Self::tick).
    pub fn update_chunk(&mut self, coord: ChunkCoord) {
        let Self {
            storage,
            chunk_size,
            chunks,
            pool,
            in_flight,
            ..
        } = self;
        let Some(pool) = pool.as_mut() else {
            tracing::debug!(%coord, "world disposed, remesh skipped");
            return;
        };
        let chunk = chunks
            .entry(coord)
            .or_insert_with(|| Chunk::new(coord, *chunk_size));

        let hood = neighborhood(coord);
        let request = chunk.next_request();
        let job = pool.run_with(|slot, dst| dst.copy_from_slice(storage.get(hood[slot])));
        in_flight.insert(job, (coord, request));
    }

    /// Runs the scheduled drain, if any: remeshes every dirty chunk once and
    /// empties the dirty set. Returns the number of dispatches.
    pub fn run_deferred(&mut self) -> usize {
        if !self.drain_scheduled {
            return 0;
        }
        self.drain_scheduled = false;
        let coords = self.dirty.take();
        for &coord in &coords {
            self.update_chunk(coord);
        }
        tracing::debug!(chunks = coords.len(), "remesh wave dispatched");
        coords.len()
    }

    /// Applies every mesh result delivered so far. Returns how many results
    /// changed a chunk.
    pub fn poll_meshes(&mut self) -> usize {
        let completions = match self.pool.as_mut() {
            Some(pool) => pool.poll(),
            None => return 0,
        };
        self.apply_completions(completions)
    }

    /// One scheduler step: the deferred drain, result delivery, then any
    /// storage saves whose debounce has elapsed. Returns the number of
    /// results applied.
    pub fn tick(&mut self) -> usize {
        self.run_deferred();
        let applied = self.poll_meshes();
        self.storage.flush_due(Instant::now());
        applied
    }

    /// Ticks until no drain is pending and no mesh job is outstanding, or
    /// until `timeout` elapses. Returns `true` if the world went idle.
    ///
    /// Jobs on a failed pool never finish, so this times out rather than
    /// erroring in that case.
    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.run_deferred();
            self.poll_meshes();
            if !self.drain_scheduled && self.in_flight.is_empty() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let slice = (deadline - now).min(WAIT_SLICE);
            let completions = match self.pool.as_mut() {
                Some(pool) => pool.wait(slice),
                None => Vec::new(),
            };
            self.apply_completions(completions);
        }
    }

    fn apply_completions(&mut self, completions: Vec<MeshCompletion>) -> usize {
        let mut applied = 0;
        for MeshCompletion { job, geometry } in completions {
            let Some((coord, request)) = self.in_flight.remove(&job) else {
                continue;
            };
            let Some(chunk) = self.chunks.get_mut(&coord) else {
                continue;
            };
            if chunk.version >= request {
                tracing::trace!(%coord, request, version = chunk.version, "stale mesh dropped");
                continue;
            }
            chunk.update(geometry);
            chunk.version = request;
            self.notifier.notify(coord);
            applied += 1;
        }
        applied
    }

    /// Releases every chunk entity and the pool, and forgets pending work.
    /// Idempotent.
    ///
    /// Later updates still edit storage but schedule no meshing.
    pub fn dispose(&mut self) {
        let Some(mut pool) = self.pool.take() else {
            return;
        };
        for chunk in self.chunks.values_mut() {
            chunk.dispose();
        }
        self.chunks.clear();
        pool.dispose();
        self.dirty.clear();
        self.drain_scheduled = false;
        self.in_flight.clear();
        tracing::info!("world disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.pool.is_none()
    }

    /// Subscribes to [`WorldChanged`] notifications.
    pub fn subscribe(&mut self) -> Receiver<WorldChanged> {
        self.notifier.subscribe()
    }

    /// Number of mesh results applied since creation.
    pub fn change_count(&self) -> u64 {
        self.notifier.count()
    }

    pub fn chunk(&self, coord: ChunkCoord) -> Option<&Chunk> {
        self.chunks.get(&coord)
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.values()
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn storage_mut(&mut self) -> &mut S {
        &mut self.storage
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of chunks waiting for the next drain.
    pub fn pending_dirty(&self) -> usize {
        self.dirty.len()
    }

    /// Number of dispatched jobs without a delivered result.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Reads the packed word at a world position through storage.
    pub fn voxel(&mut self, x: i32, y: i32, z: i32) -> u32 {
        let (coord, local) = split_world(x, y, z, self.chunk_size);
        self.storage.get(coord)[voxel_index(local, self.chunk_size)]
    }
}
