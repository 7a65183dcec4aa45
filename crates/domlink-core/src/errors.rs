//! Error hierarchy for the bridge.
//!
//! - [`ProtocolError`]: a single inbound frame could not be decoded, or an
//!   outbound frame could not be encoded. Never fatal to the connection.
//! - [`BridgeError`]: failures surfaced to callers of the session API.

use thiserror::Error;

use crate::ids::CorrelationId;

/// Errors from decoding or encoding a single wire frame.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The frame was not valid JSON.
    #[error("frame is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    /// The frame had no string `type` discriminator.
    #[error("frame has no `type` field")]
    MissingType,

    /// The frame's `type` is not one this client understands.
    #[error("unknown frame type '{0}'")]
    UnknownType(String),

    /// The frame's `type` is known but its fields do not match.
    #[error("malformed '{frame_type}' frame: {source}")]
    Malformed {
        /// The `type` discriminator of the rejected frame.
        frame_type: String,
        /// Underlying deserialization error.
        #[source]
        source: serde_json::Error,
    },

    /// An outbound frame failed to serialize.
    #[error("failed to encode frame: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Errors surfaced by the session API.
#[derive(Clone, Debug, Error)]
pub enum BridgeError {
    /// The socket is not open; response-tracked sends reject immediately.
    #[error("socket is not connected")]
    NotConnected,

    /// No response arrived within the request timeout.
    #[error("request {message_id} timed out after {timeout_ms}ms")]
    Timeout {
        /// Correlation ID of the expired request.
        message_id: CorrelationId,
        /// The timeout window that elapsed.
        timeout_ms: u64,
    },

    /// The remote side answered with an error payload.
    #[error("request {message_id} failed: {message}")]
    Remote {
        /// Correlation ID of the failed request.
        message_id: CorrelationId,
        /// Error reported by the remote side.
        message: String,
    },

    /// Opening the connection failed.
    #[error("failed to connect to {url}: {reason}")]
    ConnectFailed {
        /// Target URL.
        url: String,
        /// Why it failed.
        reason: String,
    },

    /// The reconnect policy gave up.
    #[error("reconnect abandoned after {attempts} attempts")]
    ReconnectExhausted {
        /// Number of attempts made before giving up.
        attempts: u32,
    },

    /// The outbound queue to the socket writer is full.
    #[error("outbound queue is full")]
    OutboundFull,

    /// An outbound frame could not be encoded.
    #[error("failed to encode frame: {reason}")]
    Encode {
        /// Encoder error message.
        reason: String,
    },

    /// The session task has stopped.
    #[error("session is closed")]
    SessionClosed,
}

impl BridgeError {
    /// Whether this is one of the expected transient failures callers
    /// should tolerate during a reconnect window.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::NotConnected
                | Self::OutboundFull
                | Self::Timeout { .. }
                | Self::ConnectFailed { .. }
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
