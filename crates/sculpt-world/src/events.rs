//! Change notifications for rendering collaborators.

use crossbeam_channel::{Receiver, Sender};
use sculpt_voxel::ChunkCoord;

/// Emitted when a chunk's applied geometry changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorldChanged {
    /// The chunk whose geometry was replaced.
    pub coord: ChunkCoord,
}

/// Fan-out of [`WorldChanged`] to any number of subscribers.
///
/// Subscribers whose receiver was dropped are pruned on the next send.
#[derive(Debug, Default)]
pub(crate) struct ChangeNotifier {
    subscribers: Vec<Sender<WorldChanged>>,
    sent: u64,
}

impl ChangeNotifier {
    pub(crate) fn subscribe(&mut self) -> Receiver<WorldChanged> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.push(tx);
        rx
    }

    pub(crate) fn notify(&mut self, coord: ChunkCoord) {
        self.sent += 1;
        let event = WorldChanged { coord };
        self.subscribers.retain(|tx| tx.send(event).is_ok());
    }

    /// Total notifications emitted, with or without listeners.
    pub(crate) fn count(&self) -> u64 {
        self.sent
    }

    #[cfg(test)]
    fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}
