//! Fan-out of `action-queued` notifications to any number of subscribers.

use domlink_core::QueuedAction;
use tokio::sync::broadcast;
use tracing::debug;

/// Broadcasts queued actions to every live subscriber.
///
/// With no subscribers a notification is dropped silently. A subscriber that
/// falls more than `capacity` actions behind observes
/// [`broadcast::error::RecvError::Lagged`] and skips ahead.
#[derive(Clone)]
pub struct ActionDispatch {
    tx: broadcast::Sender<QueuedAction>,
}

impl ActionDispatch {
    /// Create a dispatcher buffering up to `capacity` actions per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Add a subscriber. It sees actions queued after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<QueuedAction> {
        self.tx.subscribe()
    }

    /// Deliver `action` to every subscriber. Returns how many received it.
    pub fn notify(&self, action: QueuedAction) -> usize {
        let action_id = action.id.clone();
        match self.tx.send(action) {
            Ok(n) => n,
            Err(_) => {
                debug!(%action_id, "no action subscribers, dropping");
                0
            }
        }
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
