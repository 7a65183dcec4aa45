//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`DomlinkSettings::default()`]
//! 2. If `~/.domlink/settings.json` exists, deep-merge user values over defaults
//! 3. Apply environment variable overrides (highest priority)
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::DomlinkSettings;

/// Resolve the path to the settings file (`~/.domlink/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".domlink").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<DomlinkSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns an error.
pub fn load_settings_from_path(path: &Path) -> Result<DomlinkSettings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Defaults with the file at `path` deep-merged over them. No env overrides.
pub fn load_file_layer(path: &Path) -> Result<DomlinkSettings> {
    let defaults = serde_json::to_value(DomlinkSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// Invalid values are ignored with a warning (fall back to file/default).
pub fn apply_env_overrides(settings: &mut DomlinkSettings) {
    apply_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides from an arbitrary variable source.
///
/// Split out from [`apply_env_overrides`] so the mapping can be tested
/// without mutating the process environment.
pub fn apply_overrides_from(
    settings: &mut DomlinkSettings,
    lookup: impl Fn(&str) -> Option<String>,
) {
    if let Some(v) = read_string(&lookup, "DOMLINK_URL") {
        settings.server.url = v;
    }
    if let Some(v) = read_u64(&lookup, "DOMLINK_REQUEST_TIMEOUT_MS", 1000, 600_000) {
        settings.session.request_timeout_ms = v;
    }
    if let Some(v) = read_u64(&lookup, "DOMLINK_CONNECT_TIMEOUT_MS", 100, 600_000) {
        settings.session.connect_timeout_ms = v;
    }
    if let Some(v) = read_u64(&lookup, "DOMLINK_RECONNECT_DELAY_MS", 100, 600_000) {
        settings.reconnect.base_delay_ms = v;
    }
    if let Some(v) = read_u64(&lookup, "DOMLINK_RECONNECT_MAX_ATTEMPTS", 0, u64::from(u32::MAX)) {
        // 0 means unbounded
        settings.reconnect.max_attempts = u32::try_from(v).ok().filter(|n| *n > 0);
    }
    if let Some(v) = read_string(&lookup, "DOMLINK_LOG_LEVEL") {
        settings.logging.level = v;
    }
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

fn read_string(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).filter(|v| !v.is_empty())
}

fn read_u64(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    min: u64,
    max: u64,
) -> Option<u64> {
    let val = lookup(name)?;
    let result = parse_u64_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
    }
    result
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
