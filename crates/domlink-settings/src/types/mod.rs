//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]`, so a partial
//! JSON file only needs the keys it overrides.

mod connection;

pub use connection::*;

use domlink_core::ReconnectPolicy;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type for the domlink bridge.
///
/// # JSON Format
///
/// ```json
/// {
///   "server": { "url": "wss://example.com/ws" },
///   "session": { "requestTimeoutMs": 10000 },
///   "reconnect": { "backoff": "exponential", "maxAttempts": 20 }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DomlinkSettings {
    /// Remote server endpoint.
    pub server: ServerSettings,
    /// Session timing and channel sizing.
    pub session: SessionSettings,
    /// Reconnect strategy after the socket drops.
    pub reconnect: ReconnectPolicy,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl DomlinkSettings {
    /// Check values that deserialize fine but cannot work at runtime.
    pub fn validate(&self) -> Result<()> {
        let url = self.server.url.trim();
        if url.is_empty() {
            return Err(SettingsError::InvalidValue("server.url is empty".into()));
        }
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(SettingsError::InvalidValue(format!(
                "server.url must use ws:// or wss://, got '{url}'"
            )));
        }
        if self.session.request_timeout_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "session.requestTimeoutMs must be positive".into(),
            ));
        }
        if self.session.connect_timeout_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "session.connectTimeoutMs must be positive".into(),
            ));
        }
        if self.session.outbound_capacity == 0
            || self.session.command_capacity == 0
            || self.session.action_channel_capacity == 0
        {
            return Err(SettingsError::InvalidValue(
                "session channel capacities must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.reconnect.jitter_factor) {
            return Err(SettingsError::InvalidValue(
                "reconnect.jitterFactor must be within 0.0..=1.0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn partial_json_fills_defaults() {
        let settings: DomlinkSettings =
            serde_json::from_str(r#"{"server": {"url": "wss://host/ws"}}"#).unwrap();
        assert_eq!(settings.server.url, "wss://host/ws");
        assert_eq!(settings.session.request_timeout_ms, 30_000);
    }

    #[test]
    fn rejects_non_websocket_url() {
        let mut settings = DomlinkSettings::default();
        settings.server.url = "http://host".into();
        assert_matches!(settings.validate(), Err(SettingsError::InvalidValue(msg)) if msg.contains("ws://"));
    }

    #[test]
    fn rejects_empty_url() {
        let mut settings = DomlinkSettings::default();
        settings.server.url = "  ".into();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn rejects_zero_timeout() {
        let mut settings = DomlinkSettings::default();
        settings.session.request_timeout_ms = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn rejects_zero_connect_timeout() {
        let mut settings = DomlinkSettings::default();
        settings.session.connect_timeout_ms = 0;
        assert_matches!(settings.validate(), Err(SettingsError::InvalidValue(msg)) if msg.contains("connectTimeoutMs"));
    }

    #[test]
    fn rejects_zero_capacity() {
        let mut settings = DomlinkSettings::default();
        settings.session.outbound_capacity = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_jitter() {
        let mut settings = DomlinkSettings::default();
        settings.reconnect.jitter_factor = 1.5;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn serde_roundtrip() {
        let settings = DomlinkSettings::default();
        let json = serde_json::to_string(&settings).unwrap();
        let back: DomlinkSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, settings);
    }
}
