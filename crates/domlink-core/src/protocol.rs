//! Wire-format types for the remote-dom bridge protocol.
//!
//! Every frame is one JSON object sent as a single WebSocket text message,
//! discriminated by its `type` field. Field names are camelCase on the wire.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::ProtocolError;
use crate::ids::{ActionId, CorrelationId, DestinationUri};

/// Inbound `type` values this client understands.
const INBOUND_TYPES: &[&str] = &[
    "sync-response",
    "remote-dom",
    "action-queued",
    "ui-message-received",
    "ui-message-response",
];

// ─────────────────────────────────────────────────────────────────────────────
// Inbound
// ─────────────────────────────────────────────────────────────────────────────

/// A frame received from the server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum InboundFrame {
    /// Full-state sync answer. The tree is opaque to this client.
    SyncResponse {
        /// Serialized remote tree.
        #[serde(default)]
        tree: Value,
        /// Server timestamp (ms since epoch).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },
    /// A mutation or method call destined for one receiver.
    RemoteDom {
        /// The embedded remote-dom message.
        message: RemoteDomMessage,
        /// Server timestamp (ms since epoch).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },
    /// The remote side queued an action for silent execution.
    ActionQueued {
        /// The queued action, if the frame carried one.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        action: Option<QueuedAction>,
        /// Server timestamp (ms since epoch).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timestamp: Option<i64>,
    },
    /// Acknowledgment that a tracked message arrived. Informational only.
    UiMessageReceived {
        /// Correlation ID of the acknowledged message.
        #[serde(rename = "messageId", default, skip_serializing_if = "Option::is_none")]
        message_id: Option<CorrelationId>,
    },
    /// Response to a response-tracked tool frame.
    UiMessageResponse {
        /// Correlation ID of the original request.
        #[serde(rename = "messageId")]
        message_id: CorrelationId,
        /// Response or error.
        #[serde(default)]
        payload: ResponsePayload,
    },
}

impl InboundFrame {
    /// The wire `type` of this frame.
    #[must_use]
    pub fn frame_type(&self) -> &'static str {
        match self {
            Self::SyncResponse { .. } => "sync-response",
            Self::RemoteDom { .. } => "remote-dom",
            Self::ActionQueued { .. } => "action-queued",
            Self::UiMessageReceived { .. } => "ui-message-received",
            Self::UiMessageResponse { .. } => "ui-message-response",
        }
    }
}

/// The `message` of a `remote-dom` frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RemoteDomMessage {
    /// Apply a list of tree mutations.
    Mutate {
        /// Mutation records, opaque to the bridge.
        #[serde(default)]
        mutations: Vec<Value>,
        /// Target destination.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        uri: Option<DestinationUri>,
    },
    /// Invoke a named method on a remote node.
    Call {
        /// Node the method is invoked on.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        /// Method name.
        method: String,
        /// Positional arguments.
        #[serde(default)]
        args: Vec<Value>,
        /// Target destination.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        uri: Option<DestinationUri>,
    },
}

impl RemoteDomMessage {
    /// Split into the routing key and the operation to apply.
    #[must_use]
    pub fn into_routed(self) -> (Option<DestinationUri>, DomOp) {
        match self {
            Self::Mutate { mutations, uri } => (uri, DomOp::Mutate { mutations }),
            Self::Call {
                id,
                method,
                args,
                uri,
            } => (uri, DomOp::Call { id, method, args }),
        }
    }
}

/// A routed remote-dom operation, detached from its destination.
///
/// This is the unit stored in the mutation buffer and applied to receivers.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DomOp {
    /// Apply mutations.
    Mutate {
        /// Mutation records.
        mutations: Vec<Value>,
    },
    /// Invoke a method.
    Call {
        /// Target node.
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        /// Method name.
        method: String,
        /// Positional arguments.
        args: Vec<Value>,
    },
}

/// An action queued by the remote side.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedAction {
    /// Action identifier, echoed back in `action-response`.
    pub id: ActionId,
    /// Tool the action wants executed.
    pub tool_name: String,
    /// Tool parameters.
    #[serde(default)]
    pub params: Value,
}

/// Payload of a `ui-message-response` frame.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponsePayload {
    /// Successful result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    /// Error reported by the remote side.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl ResponsePayload {
    /// Resolve the payload: an `error` wins, otherwise the response (or
    /// `null` when absent).
    pub fn into_result(self) -> Result<Value, String> {
        match self.error {
            Some(Value::String(message)) => Err(message),
            Some(other) => Err(other.to_string()),
            None => Ok(self.response.unwrap_or(Value::Null)),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Outbound
// ─────────────────────────────────────────────────────────────────────────────

/// A frame sent to the server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum OutboundFrame {
    /// Request full state.
    Sync,
    /// Announce that a destination is being observed.
    UriActive {
        /// The destination now observed.
        uri: DestinationUri,
    },
    /// Invoke a tool, optionally response-tracked.
    Tool {
        /// Tool name and parameters.
        payload: ToolPayload,
        /// Correlation ID when a response is expected.
        #[serde(rename = "messageId", default, skip_serializing_if = "Option::is_none")]
        message_id: Option<CorrelationId>,
    },
    /// Result of a queued action.
    ActionResponse {
        /// The action being answered.
        #[serde(rename = "actionId")]
        action_id: ActionId,
        /// Result on success.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
        /// Error on failure.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

/// Payload of a `tool` frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolPayload {
    /// Tool to invoke.
    pub tool_name: String,
    /// Parameters, always including the destination `uri`.
    pub params: Map<String, Value>,
}

impl ToolPayload {
    /// Build a payload whose params are `params` plus `uri`.
    ///
    /// A caller-supplied `uri` key is overwritten by the destination.
    #[must_use]
    pub fn new(
        tool_name: impl Into<String>,
        uri: &DestinationUri,
        mut params: Map<String, Value>,
    ) -> Self {
        let _ = params.insert("uri".to_owned(), Value::String(uri.to_string()));
        Self {
            tool_name: tool_name.into(),
            params,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Codec
// ─────────────────────────────────────────────────────────────────────────────

/// Decode one inbound text frame.
pub fn decode_inbound(text: &str) -> Result<InboundFrame, ProtocolError> {
    let value: Value = serde_json::from_str(text).map_err(ProtocolError::InvalidJson)?;
    let frame_type = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(ProtocolError::MissingType)?
        .to_owned();
    if !INBOUND_TYPES.contains(&frame_type.as_str()) {
        return Err(ProtocolError::UnknownType(frame_type));
    }
    serde_json::from_value(value).map_err(|source| ProtocolError::Malformed { frame_type, source })
}

/// Encode one outbound frame as a single-line JSON string.
pub fn encode_outbound(frame: &OutboundFrame) -> Result<String, ProtocolError> {
    serde_json::to_string(frame).map_err(ProtocolError::Encode)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
