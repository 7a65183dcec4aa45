//! # domlink-settings
//!
//! Configuration management with layered sources for the domlink bridge.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`DomlinkSettings::default()`]
//! 2. **User file**: `~/.domlink/settings.json`, deep-merged over defaults
//! 3. **Environment variables**: `DOMLINK_*` overrides (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use domlink_settings::load_settings;
//!
//! let settings = load_settings().unwrap_or_default();
//! println!("server: {}", settings.server.url);
//! ```

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_are_valid() {
        let settings = DomlinkSettings::default();
        assert_eq!(settings.server.url, "ws://127.0.0.1:3001/ws");
        assert_eq!(settings.session.request_timeout_ms, 30_000);
        assert_eq!(settings.reconnect.base_delay_ms, 3000);
        assert!(settings.reconnect.max_attempts.is_none());
        assert_eq!(settings.logging.level, "info");
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn deep_merge_re_exported() {
        let a = serde_json::json!({"x": 1});
        let b = serde_json::json!({"y": 2});
        let merged = deep_merge(a, b);
        assert_eq!(merged["x"], 1);
        assert_eq!(merged["y"], 2);
    }
}
