//! Outbound frame encoding and delivery to the socket writer.

use domlink_core::{
    ActionId, BridgeError, CorrelationId, DestinationUri, OutboundFrame, ToolPayload,
    encode_outbound,
};
use serde_json::{Map, Value};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::trace;

/// Encodes frames and hands them to the current connection's writer.
///
/// Never queues across connections: with no open socket a send fails with
/// [`BridgeError::NotConnected`].
#[derive(Default)]
pub struct OutboundEncoder {
    socket: Option<mpsc::Sender<String>>,
}

impl OutboundEncoder {
    /// Create a detached encoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Route subsequent frames to `socket`.
    pub fn attach(&mut self, socket: mpsc::Sender<String>) {
        self.socket = Some(socket);
    }

    /// Drop the current socket. Dropping the sender closes the writer.
    pub fn detach(&mut self) {
        self.socket = None;
    }

    /// Whether a writer is attached and still accepting frames.
    pub fn is_open(&self) -> bool {
        self.socket.as_ref().is_some_and(|s| !s.is_closed())
    }

    /// Encode and send one frame without waiting.
    pub fn send(&self, frame: &OutboundFrame) -> Result<(), BridgeError> {
        let Some(socket) = self.socket.as_ref() else {
            return Err(BridgeError::NotConnected);
        };
        let text = encode_outbound(frame).map_err(|e| BridgeError::Encode {
            reason: e.to_string(),
        })?;
        match socket.try_send(text) {
            Ok(()) => {
                trace!(frame = frame_name(frame), "frame queued");
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err(BridgeError::OutboundFull),
            Err(TrySendError::Closed(_)) => Err(BridgeError::NotConnected),
        }
    }
}

/// Build a `tool` frame. `params` gain a `uri` entry naming `uri`.
pub fn tool_frame(
    tool_name: impl Into<String>,
    uri: &DestinationUri,
    params: Map<String, Value>,
    message_id: Option<CorrelationId>,
) -> OutboundFrame {
    OutboundFrame::Tool {
        payload: ToolPayload::new(tool_name, uri, params),
        message_id,
    }
}

/// Build an `action-response` frame.
pub fn action_response_frame(
    action_id: ActionId,
    result: Option<Value>,
    error: Option<String>,
) -> OutboundFrame {
    OutboundFrame::ActionResponse {
        action_id,
        result,
        error,
    }
}

fn frame_name(frame: &OutboundFrame) -> &'static str {
    match frame {
        OutboundFrame::Sync => "sync",
        OutboundFrame::UriActive { .. } => "uri-active",
        OutboundFrame::Tool { .. } => "tool",
        OutboundFrame::ActionResponse { .. } => "action-response",
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn params(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn detached_send_fails_not_connected() {
        let encoder = OutboundEncoder::new();
        assert!(!encoder.is_open());
        assert_matches!(encoder.send(&OutboundFrame::Sync), Err(BridgeError::NotConnected));
    }

    #[test]
    fn tool_frame_wire_shape() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut encoder = OutboundEncoder::new();
        encoder.attach(tx);

        let frame = tool_frame(
            "search",
            &"ui://panel-1".into(),
            params(json!({"q": "rust"})),
            Some(CorrelationId::from("abc")),
        );
        encoder.send(&frame).unwrap();

        let sent: Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(
            sent,
            json!({
                "type": "tool",
                "payload": {"toolName": "search", "params": {"q": "rust", "uri": "ui://panel-1"}},
                "messageId": "abc"
            })
        );
    }

    #[test]
    fn fire_and_forget_tool_has_no_message_id() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut encoder = OutboundEncoder::new();
        encoder.attach(tx);
        encoder
            .send(&tool_frame("ping", &"ui://a".into(), Map::new(), None))
            .unwrap();
        let sent: Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert!(sent.get("messageId").is_none());
    }

    #[test]
    fn action_response_wire_shape() {
        let (tx, mut rx) = mpsc::channel(4);
        let mut encoder = OutboundEncoder::new();
        encoder.attach(tx);
        encoder
            .send(&action_response_frame("a1".into(), None, Some("declined".into())))
            .unwrap();
        let sent: Value = serde_json::from_str(&rx.try_recv().unwrap()).unwrap();
        assert_eq!(
            sent,
            json!({"type": "action-response", "actionId": "a1", "error": "declined"})
        );
    }

    #[test]
    fn full_writer_reports_outbound_full() {
        let (tx, _rx) = mpsc::channel(1);
        let mut encoder = OutboundEncoder::new();
        encoder.attach(tx);
        encoder.send(&OutboundFrame::Sync).unwrap();
        assert_matches!(encoder.send(&OutboundFrame::Sync), Err(BridgeError::OutboundFull));
    }

    #[test]
    fn closed_writer_is_not_open() {
        let (tx, rx) = mpsc::channel(1);
        let mut encoder = OutboundEncoder::new();
        encoder.attach(tx);
        drop(rx);
        assert!(!encoder.is_open());
        assert_matches!(encoder.send(&OutboundFrame::Sync), Err(BridgeError::NotConnected));

        encoder.detach();
        assert!(!encoder.is_open());
    }
}
