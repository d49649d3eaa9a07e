//! Undo/redo log with batch coalescing.
//!
//! Every user-originated `update` produces one [`ActionBatch`]. Consecutive
//! updates tagged with the same batch id collapse into a single batch so a
//! whole brush stroke undoes in one step. Replays from undo/redo never touch
//! the log.

use rustc_hash::FxHashMap;
use sculpt_voxel::VoxelEdit;

/// Largest batch a coalescing update may still merge into.
pub const MAX_BATCH_ACTIONS: usize = 10_000;

/// One voxel's before and after words.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Action {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    /// Packed word before the batch touched this voxel.
    pub undo: u32,
    /// Packed word after the latest edit in the batch.
    pub redo: u32,
}

/// Ordered actions with at most one entry per voxel.
#[derive(Clone, Debug, Default)]
pub struct ActionBatch {
    actions: Vec<Action>,
    index: FxHashMap<[i32; 3], usize>,
}

impl ActionBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `action`, or, when its voxel is already present, overwrites only
    /// that entry's `redo` word so the original `undo` word survives.
    pub fn record(&mut self, action: Action) {
        let key = [action.x, action.y, action.z];
        if let Some(&slot) = self.index.get(&key) {
            self.actions[slot].redo = action.redo;
        } else {
            self.index.insert(key, self.actions.len());
            self.actions.push(action);
        }
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Edits that restore every voxel to its pre-batch word, last touched
    /// first.
    pub fn undo_edits(&self) -> Vec<VoxelEdit> {
        self.actions
            .iter()
            .rev()
            .map(|a| VoxelEdit::restore(a.x, a.y, a.z, a.undo))
            .collect()
    }

    /// Edits that reapply every voxel's final word in recording order.
    pub fn redo_edits(&self) -> Vec<VoxelEdit> {
        self.actions
            .iter()
            .map(|a| VoxelEdit::restore(a.x, a.y, a.z, a.redo))
            .collect()
    }
}

/// Undo and redo stacks plus the id of the most recent batch.
#[derive(Debug, Default)]
pub struct HistoryLog {
    enabled: bool,
    last: Option<u64>,
    undo: Vec<ActionBatch>,
    redo: Vec<ActionBatch>,
}

impl HistoryLog {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            ..Self::default()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// The batch id most recently recorded, `None` after undo/redo or an
    /// untagged update.
    pub fn last(&self) -> Option<u64> {
        self.last
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn undo_batches(&self) -> &[ActionBatch] {
        &self.undo
    }

    pub fn redo_batches(&self) -> &[ActionBatch] {
        &self.redo
    }

    /// Records the actions of one user update.
    ///
    /// Merges into the top undo batch when `batch` is tagged, equals the
    /// last recorded id and the top batch is below [`MAX_BATCH_ACTIONS`];
    /// otherwise pushes a new batch. Either way `batch` becomes the last id
    /// and the redo stack is cleared, even when `actions` is empty.
    pub fn record(&mut self, batch: Option<u64>, actions: ActionBatch) {
        if !self.enabled {
            return;
        }
        let mergeable = batch.is_some() && batch == self.last;
        let target = self
            .undo
            .last_mut()
            .filter(|top| mergeable && top.len() < MAX_BATCH_ACTIONS);
        if let Some(top) = target {
            for action in actions.actions {
                top.record(action);
            }
        } else {
            self.undo.push(actions);
        }
        self.last = batch;
        self.redo.clear();
    }

    /// Moves the top undo batch onto the redo stack and returns the edits
    /// that revert it. `None` when there is nothing to undo.
    pub fn undo(&mut self) -> Option<Vec<VoxelEdit>> {
        let batch = self.undo.pop()?;
        self.last = None;
        let edits = batch.undo_edits();
        self.redo.push(batch);
        Some(edits)
    }

    /// Moves the top redo batch back onto the undo stack and returns the
    /// edits that reapply it. `None` when there is nothing to redo.
    pub fn redo(&mut self) -> Option<Vec<VoxelEdit>> {
        let batch = self.redo.pop()?;
        self.last = None;
        let edits = batch.redo_edits();
        self.undo.push(batch);
        Some(edits)
    }

    /// Drops both stacks.
    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
        self.last = None;
    }
}
