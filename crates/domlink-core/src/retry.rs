//! Reconnect policy and backoff calculation.
//!
//! [`ReconnectPolicy`] is injected into a session at construction and decides
//! how long to wait before each reconnect attempt, and when to give up.
//!
//! The default reproduces the classic behavior: a fixed 3-second delay,
//! unbounded attempts, no jitter.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default delay between reconnect attempts in milliseconds.
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 3000;
/// Default cap for exponential backoff in milliseconds.
pub const DEFAULT_MAX_RECONNECT_DELAY_MS: u64 = 60_000;

/// Shape of the delay curve.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    /// Every attempt waits `base_delay_ms`.
    #[default]
    Fixed,
    /// Attempt `n` waits `base_delay_ms * 2^(n-1)`, capped at `max_delay_ms`.
    Exponential,
}

/// Retry strategy for re-opening a lost connection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReconnectPolicy {
    /// Delay before the first attempt (and every attempt when fixed).
    pub base_delay_ms: u64,
    /// Upper bound on any single delay.
    pub max_delay_ms: u64,
    /// Delay curve.
    pub backoff: Backoff,
    /// Give up after this many consecutive failed attempts. `None` never gives up.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    /// Symmetric jitter range (0.0–1.0). Zero disables randomness.
    pub jitter_factor: f64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_RECONNECT_DELAY_MS,
            backoff: Backoff::Fixed,
            max_attempts: None,
            jitter_factor: 0.0,
        }
    }
}

impl ReconnectPolicy {
    /// A fixed-delay policy with no attempt limit.
    #[must_use]
    pub fn fixed(delay: Duration) -> Self {
        Self {
            base_delay_ms: duration_ms(delay),
            ..Self::default()
        }
    }

    /// An exponential policy starting at `base` and capped at `max`.
    #[must_use]
    pub fn exponential(base: Duration, max: Duration) -> Self {
        Self {
            base_delay_ms: duration_ms(base),
            max_delay_ms: duration_ms(max),
            backoff: Backoff::Exponential,
            ..Self::default()
        }
    }

    /// Limit the number of consecutive attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Delay before reconnect attempt `attempt` (1-based), or `None` when the
    /// policy has given up.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        if self.max_attempts.is_some_and(|max| attempt > max) {
            return None;
        }
        let exponent = match self.backoff {
            Backoff::Fixed => 0,
            Backoff::Exponential => attempt.saturating_sub(1),
        };
        let random = if self.jitter_factor > 0.0 {
            rand::random::<f64>()
        } else {
            0.5
        };
        Some(Duration::from_millis(calculate_backoff_delay(
            exponent,
            self.base_delay_ms,
            self.max_delay_ms,
            self.jitter_factor,
            random,
        )))
    }
}

/// Calculate a backoff delay with explicit randomness.
///
/// Formula: `min(max_delay, base_delay * 2^exponent) * (1 + (random * 2 - 1) * jitter)`.
/// `random` should be in `[0.0, 1.0)`; `0.5` yields the un-jittered value.
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn calculate_backoff_delay(
    exponent: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
    jitter_factor: f64,
    random: f64,
) -> u64 {
    let exponential = base_delay_ms.saturating_mul(1u64 << exponent.min(31));
    let capped = exponential.min(max_delay_ms.max(base_delay_ms));

    let jitter = 1.0 + (random * 2.0 - 1.0) * jitter_factor;
    let with_jitter = (capped as f64) * jitter;

    with_jitter.round().max(0.0) as u64
}

#[allow(clippy::cast_possible_truncation)]
fn duration_ms(d: Duration) -> u64 {
    d.as_millis().min(u128::from(u64::MAX)) as u64
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
