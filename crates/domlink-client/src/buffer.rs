//! Per-destination FIFO of operations that arrived before a receiver was bound.

use std::collections::{HashMap, VecDeque};

use domlink_core::{DestinationUri, DomOp};

/// Operations held for destinations with no bound receiver.
#[derive(Debug, Default)]
pub struct MutationBuffer {
    queues: HashMap<DestinationUri, VecDeque<DomOp>>,
}

impl MutationBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an operation for `uri`. Returns the queue depth afterwards.
    pub fn push(&mut self, uri: &DestinationUri, op: DomOp) -> usize {
        let queue = self.queues.entry(uri.clone()).or_default();
        queue.push_back(op);
        queue.len()
    }

    /// Remove and return everything queued for `uri`, oldest first.
    pub fn take(&mut self, uri: &str) -> VecDeque<DomOp> {
        self.queues.remove(uri).unwrap_or_default()
    }

    /// Number of operations queued for `uri`.
    pub fn len(&self, uri: &str) -> usize {
        self.queues.get(uri).map_or(0, VecDeque::len)
    }
}
