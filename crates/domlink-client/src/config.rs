//! Construction-time configuration for a [`Session`](crate::Session).

use std::time::Duration;

use domlink_core::ReconnectPolicy;
use domlink_settings::DomlinkSettings;

use crate::transport::WsConnector;

/// Default response timeout for tracked requests.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default limit on one connect attempt, handshake included.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything a session needs besides its connector.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// WebSocket URL to connect to.
    pub url: String,
    /// How long a response-tracked request waits.
    pub request_timeout: Duration,
    /// How long one connect attempt may take before it counts as failed.
    pub connect_timeout: Duration,
    /// Reconnect strategy after a lost or failed connection.
    pub reconnect: ReconnectPolicy,
    /// Outbound frames buffered ahead of the socket writer.
    ///
    /// The session does not read this. It sizes the writer queue of the
    /// connector, see [`SessionConfig::connector`].
    pub outbound_capacity: usize,
    /// Commands buffered ahead of the session task.
    pub command_capacity: usize,
    /// Actions retained for a lagging subscriber.
    pub action_channel_capacity: usize,
}

impl SessionConfig {
    /// Defaults for `url`: 30s timeout, fixed 3s reconnect, unbounded.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            reconnect: ReconnectPolicy::default(),
            outbound_capacity: 256,
            command_capacity: 64,
            action_channel_capacity: 64,
        }
    }

    /// Build from loaded settings.
    pub fn from_settings(settings: &DomlinkSettings) -> Self {
        Self {
            url: settings.server.url.clone(),
            request_timeout: Duration::from_millis(settings.session.request_timeout_ms),
            connect_timeout: Duration::from_millis(settings.session.connect_timeout_ms),
            reconnect: settings.reconnect.clone(),
            outbound_capacity: settings.session.outbound_capacity,
            command_capacity: settings.session.command_capacity,
            action_channel_capacity: settings.session.action_channel_capacity,
        }
    }

    /// Override the request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Override the connect attempt limit.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// A WebSocket connector sized by `outbound_capacity`.
    pub fn connector(&self) -> WsConnector {
        WsConnector::new(self.outbound_capacity)
    }

    /// Override the reconnect policy.
    #[must_use]
    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }
}
