//! Server, session and logging settings.

use serde::{Deserialize, Serialize};

/// Remote server endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// WebSocket URL of the bridge server.
    pub url: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:3001/ws".to_string(),
        }
    }
}

/// Session timing and channel sizing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    /// How long a response-tracked request waits before rejecting.
    pub request_timeout_ms: u64,
    /// How long one connect attempt may take, handshake included.
    pub connect_timeout_ms: u64,
    /// Outbound frames buffered between the session and the socket writer.
    pub outbound_capacity: usize,
    /// Commands buffered between handles and the session task.
    pub command_capacity: usize,
    /// Queued-action notifications retained per lagging subscriber.
    pub action_channel_capacity: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            request_timeout_ms: 30_000,
            connect_timeout_ms: 10_000,
            outbound_capacity: 256,
            command_capacity: 64,
            action_channel_capacity: 64,
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Minimum level (`trace`, `debug`, `info`, `warn`, `error`) or a full
    /// `EnvFilter` directive.
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
