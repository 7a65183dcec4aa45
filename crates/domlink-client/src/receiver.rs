//! Consumers of routed remote-dom operations.
//!
//! A [`Receiver`] is the application-side handle bound to one destination.
//! The session applies operations to it synchronously, inside the same turn
//! that decoded the frame, so a receiver must not block.

use domlink_core::DomOp;
use serde_json::Value;
use tokio::sync::mpsc;

/// A consumer able to apply mutation lists and method calls for one destination.
pub trait Receiver: Send {
    /// Apply a full mutation list.
    fn mutate(&mut self, mutations: &[Value]);

    /// Invoke a named method with arguments.
    fn call(&mut self, method: &str, args: &[Value]);

    /// Apply a routed operation. Dispatches to [`mutate`](Self::mutate) or
    /// [`call`](Self::call).
    fn apply(&mut self, op: &DomOp) {
        match op {
            DomOp::Mutate { mutations } => self.mutate(mutations),
            DomOp::Call { method, args, .. } => self.call(method, args),
        }
    }
}

/// Forwards every applied operation into an unbounded channel.
///
/// Lets async consumers observe operations without running inside the
/// session turn.
pub struct ChannelReceiver {
    tx: mpsc::UnboundedSender<DomOp>,
}

impl ChannelReceiver {
    /// Create a receiver and the channel end that observes its operations.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DomOp>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Receiver for ChannelReceiver {
    fn mutate(&mut self, mutations: &[Value]) {
        let _ = self.tx.send(DomOp::Mutate {
            mutations: mutations.to_vec(),
        });
    }

    fn call(&mut self, method: &str, args: &[Value]) {
        let _ = self.tx.send(DomOp::Call {
            id: None,
            method: method.to_owned(),
            args: args.to_vec(),
        });
    }

    // Overridden so the call id survives the hop.
    fn apply(&mut self, op: &DomOp) {
        let _ = self.tx.send(op.clone());
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Default)]
    struct Tally {
        mutations: usize,
        calls: Vec<String>,
    }

    impl Receiver for Tally {
        fn mutate(&mut self, mutations: &[Value]) {
            self.mutations += mutations.len();
        }

        fn call(&mut self, method: &str, _args: &[Value]) {
            self.calls.push(method.to_owned());
        }
    }

    #[test]
    fn default_apply_dispatches_by_kind() {
        let mut tally = Tally::default();
        tally.apply(&DomOp::Mutate {
            mutations: vec![json!(1), json!(2)],
        });
        tally.apply(&DomOp::Call {
            id: Some("c1".into()),
            method: "focus".into(),
            args: vec![],
        });
        assert_eq!(tally.mutations, 2);
        assert_eq!(tally.calls, vec!["focus"]);
    }

    #[test]
    fn channel_receiver_forwards_ops() {
        let (mut receiver, mut rx) = ChannelReceiver::new();
        let op = DomOp::Call {
            id: Some("c1".into()),
            method: "scroll".into(),
            args: vec![json!(10)],
        };
        receiver.apply(&op);
        receiver.mutate(&[json!("m")]);

        assert_eq!(rx.try_recv().unwrap(), op);
        assert_eq!(
            rx.try_recv().unwrap(),
            DomOp::Mutate {
                mutations: vec![json!("m")]
            }
        );
    }

    #[test]
    fn channel_receiver_tolerates_dropped_observer() {
        let (mut receiver, rx) = ChannelReceiver::new();
        drop(rx);
        receiver.mutate(&[json!(1)]);
    }
}
