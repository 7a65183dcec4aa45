//! Table of response-tracked requests awaiting a `ui-message-response`.
//!
//! The table owns no timers. The session asks for [`next_deadline`] and
//! calls [`expire`] when it passes, so every settlement happens inside a
//! session turn.
//!
//! [`next_deadline`]: PendingRequestTable::next_deadline
//! [`expire`]: PendingRequestTable::expire

use std::collections::HashMap;
use std::time::Duration;

use domlink_core::{BridgeError, CorrelationId, ResponsePayload};
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Completion side of a response-tracked request.
pub type Responder = oneshot::Sender<Result<Value, BridgeError>>;

struct PendingRequest {
    responder: Responder,
    created_at: Instant,
    deadline: Instant,
}

/// Outstanding requests keyed by correlation ID.
pub struct PendingRequestTable {
    entries: HashMap<CorrelationId, PendingRequest>,
    timeout: Duration,
}

impl PendingRequestTable {
    /// Create a table whose entries expire after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            timeout,
        }
    }

    /// Register a responder under a fresh correlation ID.
    pub fn create(&mut self, responder: Responder, now: Instant) -> CorrelationId {
        let mut id = CorrelationId::new();
        while self.entries.contains_key(&id) {
            id = CorrelationId::new();
        }
        let _ = self.entries.insert(
            id.clone(),
            PendingRequest {
                responder,
                created_at: now,
                deadline: now + self.timeout,
            },
        );
        id
    }

    /// Resolve `id` with a value. Returns `false` for unknown IDs.
    pub fn resolve(&mut self, id: &str, value: Value) -> bool {
        self.finish(id, Ok(value))
    }

    /// Reject `id` with an error. Returns `false` for unknown IDs.
    pub fn reject(&mut self, id: &str, error: BridgeError) -> bool {
        self.finish(id, Err(error))
    }

    /// Settle `id` from a response payload.
    pub fn settle(&mut self, id: &CorrelationId, payload: ResponsePayload) -> bool {
        match payload.into_result() {
            Ok(value) => self.resolve(id, value),
            Err(message) => self.reject(
                id,
                BridgeError::Remote {
                    message_id: id.clone(),
                    message,
                },
            ),
        }
    }

    /// Earliest deadline among outstanding entries.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.values().map(|p| p.deadline).min()
    }

    /// Reject every entry whose deadline is at or before `now`.
    ///
    /// Returns the number of entries expired.
    pub fn expire(&mut self, now: Instant) -> usize {
        let expired: Vec<CorrelationId> = self
            .entries
            .iter()
            .filter(|(_, p)| p.deadline <= now)
            .map(|(id, _)| id.clone())
            .collect();

        let timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
        for id in &expired {
            if let Some(pending) = self.entries.remove(id) {
                warn!(message_id = %id, timeout_ms, "request timed out");
                let _ = pending.responder.send(Err(BridgeError::Timeout {
                    message_id: id.clone(),
                    timeout_ms,
                }));
            }
        }
        expired.len()
    }

    /// Number of outstanding requests.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no requests are outstanding.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn finish(&mut self, id: &str, result: Result<Value, BridgeError>) -> bool {
        let Some(pending) = self.entries.remove(id) else {
            warn!(message_id = id, "no pending request for response, ignoring");
            return false;
        };
        debug!(
            message_id = id,
            elapsed_ms = u64::try_from(pending.created_at.elapsed().as_millis()).unwrap_or(u64::MAX),
            ok = result.is_ok(),
            "settling request"
        );
        // The caller may have stopped waiting.
        let _ = pending.responder.send(result);
        true
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
