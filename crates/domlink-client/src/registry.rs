//! Destination registry: receiver binding, routing, and replay.
//!
//! Each destination moves through an explicit lifecycle:
//!
//! ```text
//! Unbound ──route──▶ Buffering ──register──▶ Bound
//!    │                   ▲                     │
//!    └─────register──────┼─────────────────────┘
//!                        └──────unregister─────┘
//! ```
//!
//! `Unbound` is the state of a destination the registry has never seen.
//! Unregistering keeps the buffer, so a quick unmount/remount cycle loses
//! nothing that arrived in between.

use std::collections::HashMap;

use domlink_core::{DestinationUri, DomOp};
use serde::Serialize;
use tracing::{debug, warn};

use crate::buffer::MutationBuffer;
use crate::receiver::Receiver;

/// Lifecycle state of one destination.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DestinationState {
    /// Never routed to or registered.
    Unbound,
    /// No receiver; inbound operations are queued.
    Buffering,
    /// A receiver is attached; operations apply immediately.
    Bound,
}

/// What happened to a routed operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Applied to the bound receiver.
    Applied,
    /// Queued; `depth` is the destination's queue length afterwards.
    Buffered {
        /// Queue length after the push.
        depth: usize,
    },
    /// Discarded because the frame named no destination.
    Dropped,
}

/// Result of binding a receiver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegisterOutcome {
    /// A previous receiver for the same destination was dropped.
    pub replaced: bool,
    /// Buffered operations applied to the new receiver.
    pub replayed: usize,
}

/// Per-destination view for diagnostics.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationSnapshot {
    /// Destination key.
    pub uri: DestinationUri,
    /// Current lifecycle state.
    pub state: DestinationState,
    /// Operations waiting for a receiver.
    pub buffered: usize,
}

struct Destination {
    state: DestinationState,
    receiver: Option<Box<dyn Receiver>>,
}

/// Owns receivers and the mutation buffer for every destination.
#[derive(Default)]
pub struct ReceiverRegistry {
    destinations: HashMap<DestinationUri, Destination>,
    buffer: MutationBuffer,
}

impl ReceiverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `receiver` to `uri`, replacing any previous receiver, then
    /// replay and clear the buffered operations in arrival order.
    pub fn register(&mut self, uri: DestinationUri, receiver: Box<dyn Receiver>) -> RegisterOutcome {
        let queued = self.buffer.take(&uri);
        let replayed = queued.len();

        let dest = self.destinations.entry(uri.clone()).or_insert(Destination {
            state: DestinationState::Unbound,
            receiver: None,
        });
        let replaced = dest.receiver.replace(receiver).is_some();
        if replaced {
            debug!(%uri, "replacing receiver");
        }
        dest.state = DestinationState::Bound;

        if let Some(receiver) = dest.receiver.as_mut() {
            for op in &queued {
                receiver.apply(op);
            }
        }
        if replayed > 0 {
            debug!(%uri, replayed, "replayed buffered operations");
        }

        RegisterOutcome { replaced, replayed }
    }

    /// Detach the receiver for `uri`. The buffer is retained.
    ///
    /// Returns `false` if nothing was bound.
    pub fn unregister(&mut self, uri: &str) -> bool {
        let Some(dest) = self.destinations.get_mut(uri) else {
            return false;
        };
        let was_bound = dest.receiver.take().is_some();
        if was_bound {
            dest.state = DestinationState::Buffering;
        }
        was_bound
    }

    /// Apply `op` to the receiver bound to `uri`, or buffer it.
    pub fn route(&mut self, uri: Option<DestinationUri>, op: DomOp) -> RouteOutcome {
        let Some(uri) = uri else {
            warn!(op = ?op, "remote-dom frame has no destination uri, dropping");
            return RouteOutcome::Dropped;
        };

        let dest = self.destinations.entry(uri.clone()).or_insert(Destination {
            state: DestinationState::Unbound,
            receiver: None,
        });
        if let Some(receiver) = dest.receiver.as_mut() {
            receiver.apply(&op);
            return RouteOutcome::Applied;
        }

        dest.state = DestinationState::Buffering;
        let depth = self.buffer.push(&uri, op);
        debug!(%uri, depth, "no receiver bound, buffering");
        RouteOutcome::Buffered { depth }
    }

    /// Destinations that currently have a receiver, sorted.
    pub fn bound_uris(&self) -> Vec<DestinationUri> {
        let mut uris: Vec<_> = self
            .destinations
            .iter()
            .filter(|(_, d)| d.state == DestinationState::Bound)
            .map(|(uri, _)| uri.clone())
            .collect();
        uris.sort();
        uris
    }

    /// Every known destination, sorted by URI.
    pub fn snapshot(&self) -> Vec<DestinationSnapshot> {
        let mut out: Vec<_> = self
            .destinations
            .iter()
            .map(|(uri, d)| DestinationSnapshot {
                uri: uri.clone(),
                state: d.state,
                buffered: self.buffer.len(uri),
            })
            .collect();
        out.sort_by(|a, b| a.uri.cmp(&b.uri));
        out
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::RecordingReceiver;
    use proptest::prelude::*;
    use serde_json::json;

    fn mutate(n: i64) -> DomOp {
        DomOp::Mutate {
            mutations: vec![json!(n)],
        }
    }

    fn call(method: &str) -> DomOp {
        DomOp::Call {
            id: None,
            method: method.into(),
            args: vec![],
        }
    }

    fn uri(s: &str) -> Option<DestinationUri> {
        Some(DestinationUri::from(s))
    }

    fn state(registry: &ReceiverRegistry, uri: &str) -> DestinationState {
        registry
            .destinations
            .get(uri)
            .map_or(DestinationState::Unbound, |d| d.state)
    }

    fn buffered(registry: &ReceiverRegistry, uri: &str) -> usize {
        registry.buffer.len(uri)
    }

    // ── lifecycle ───────────────────────────────────────────────────

    #[test]
    fn unseen_destination_is_unbound() {
        let registry = ReceiverRegistry::new();
        assert_eq!(state(&registry, "ui://x"), DestinationState::Unbound);
    }

    #[test]
    fn route_without_receiver_buffers() {
        let mut registry = ReceiverRegistry::new();
        let outcome = registry.route(uri("ui://panel-1"), mutate(1));
        assert_eq!(outcome, RouteOutcome::Buffered { depth: 1 });
        assert_eq!(state(&registry, "ui://panel-1"), DestinationState::Buffering);
        assert_eq!(buffered(&registry, "ui://panel-1"), 1);
    }

    #[test]
    fn register_replays_buffer_in_order_and_clears_it() {
        let mut registry = ReceiverRegistry::new();
        let _ = registry.route(uri("ui://panel-1"), mutate(1));
        let _ = registry.route(uri("ui://panel-1"), mutate(2));

        let recorder = RecordingReceiver::new();
        let outcome = registry.register("ui://panel-1".into(), Box::new(recorder.clone()));

        assert_eq!(
            outcome,
            RegisterOutcome {
                replaced: false,
                replayed: 2
            }
        );
        assert_eq!(recorder.ops(), vec![mutate(1), mutate(2)]);
        assert_eq!(buffered(&registry, "ui://panel-1"), 0);
        assert_eq!(state(&registry, "ui://panel-1"), DestinationState::Bound);
    }

    #[test]
    fn bound_receiver_applies_immediately() {
        let mut registry = ReceiverRegistry::new();
        let recorder = RecordingReceiver::new();
        let _ = registry.register("ui://a".into(), Box::new(recorder.clone()));

        assert_eq!(registry.route(uri("ui://a"), call("focus")), RouteOutcome::Applied);
        assert_eq!(recorder.ops(), vec![call("focus")]);
    }

    #[test]
    fn replacement_receiver_takes_over() {
        let mut registry = ReceiverRegistry::new();
        let first = RecordingReceiver::new();
        let second = RecordingReceiver::new();
        let _ = registry.register("ui://a".into(), Box::new(first.clone()));
        let outcome = registry.register("ui://a".into(), Box::new(second.clone()));
        assert!(outcome.replaced);

        let _ = registry.route(uri("ui://a"), mutate(7));
        assert!(first.ops().is_empty());
        assert_eq!(second.ops(), vec![mutate(7)]);
    }

    #[test]
    fn unregister_retains_buffer_for_remount() {
        let mut registry = ReceiverRegistry::new();
        let first = RecordingReceiver::new();
        let _ = registry.register("ui://a".into(), Box::new(first.clone()));
        assert!(registry.unregister("ui://a"));
        assert_eq!(state(&registry, "ui://a"), DestinationState::Buffering);

        let _ = registry.route(uri("ui://a"), mutate(1));
        let second = RecordingReceiver::new();
        let _ = registry.register("ui://a".into(), Box::new(second.clone()));

        assert!(first.ops().is_empty());
        assert_eq!(second.ops(), vec![mutate(1)]);
    }

    #[test]
    fn unregister_unknown_is_noop() {
        let mut registry = ReceiverRegistry::new();
        assert!(!registry.unregister("ui://nothing"));
        assert!(!registry.unregister("ui://nothing"));
    }

    #[test]
    fn frame_without_uri_is_dropped() {
        let mut registry = ReceiverRegistry::new();
        assert_eq!(registry.route(None, mutate(1)), RouteOutcome::Dropped);
        assert!(registry.snapshot().is_empty());
    }

    #[test]
    fn destinations_are_isolated() {
        let mut registry = ReceiverRegistry::new();
        let a = RecordingReceiver::new();
        let _ = registry.register("ui://a".into(), Box::new(a.clone()));
        let _ = registry.route(uri("ui://b"), mutate(1));
        let _ = registry.route(uri("ui://a"), mutate(2));

        assert_eq!(a.ops(), vec![mutate(2)]);
        assert_eq!(buffered(&registry, "ui://b"), 1);
        assert_eq!(registry.bound_uris(), vec![DestinationUri::from("ui://a")]);
    }

    #[test]
    fn snapshot_lists_every_destination() {
        let mut registry = ReceiverRegistry::new();
        let _ = registry.route(uri("ui://b"), mutate(1));
        let _ = registry.register("ui://a".into(), Box::new(RecordingReceiver::new()));

        let snapshot = registry.snapshot();
        assert_eq!(
            snapshot,
            vec![
                DestinationSnapshot {
                    uri: "ui://a".into(),
                    state: DestinationState::Bound,
                    buffered: 0,
                },
                DestinationSnapshot {
                    uri: "ui://b".into(),
                    state: DestinationState::Buffering,
                    buffered: 1,
                },
            ]
        );
    }

    // ── ordering property ───────────────────────────────────────────

    proptest! {
        #[test]
        fn replay_then_live_preserves_arrival_order(
            before in prop::collection::vec(any::<i64>(), 0..40),
            after in prop::collection::vec(any::<i64>(), 0..40),
        ) {
            let mut registry = ReceiverRegistry::new();
            for n in &before {
                let _ = registry.route(uri("ui://p"), mutate(*n));
            }
            let recorder = RecordingReceiver::new();
            let _ = registry.register("ui://p".into(), Box::new(recorder.clone()));
            for n in &after {
                let _ = registry.route(uri("ui://p"), mutate(*n));
            }

            let expected: Vec<_> = before.iter().chain(after.iter()).map(|n| mutate(*n)).collect();
            prop_assert_eq!(recorder.ops(), expected);
            prop_assert_eq!(buffered(&registry, "ui://p"), 0);
        }
    }
}
