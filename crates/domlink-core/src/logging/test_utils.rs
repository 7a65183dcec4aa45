//! Test utilities for capturing and asserting on tracing events.
//!
//! [`capture_logs`] installs a thread-local subscriber that records events in
//! memory, so tests can check that a dropped frame was actually reported.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::level_filters::LevelFilter;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

/// A captured tracing event.
#[derive(Clone, Debug)]
pub struct CapturedEvent {
    /// The log level.
    pub level: Level,
    /// The target module.
    pub target: String,
    /// The formatted message.
    pub message: String,
    /// Field key-value pairs.
    pub fields: Vec<(String, String)>,
}

impl CapturedEvent {
    /// Value of a recorded field, if present.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Thread-safe store for captured events.
#[derive(Clone, Default)]
pub struct CapturedLogs {
    events: Arc<Mutex<Vec<CapturedEvent>>>,
}

impl CapturedLogs {
    fn with_events<R>(&self, f: impl FnOnce(&mut Vec<CapturedEvent>) -> R) -> R {
        let mut guard = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Get all captured events.
    pub fn events(&self) -> Vec<CapturedEvent> {
        self.with_events(|events| events.clone())
    }

    /// Check if any event contains the given message substring.
    pub fn has_message(&self, message_contains: &str) -> bool {
        self.with_events(|events| events.iter().any(|e| e.message.contains(message_contains)))
    }

    /// Check if any event at the given level contains the message substring.
    pub fn has_event(&self, level: Level, message_contains: &str) -> bool {
        self.with_events(|events| {
            events
                .iter()
                .any(|e| e.level == level && e.message.contains(message_contains))
        })
    }

    /// Count events at a specific level.
    pub fn count_at_level(&self, level: Level) -> usize {
        self.with_events(|events| events.iter().filter(|e| e.level == level).count())
    }

    /// Events filtered by target module prefix.
    pub fn events_for_target(&self, target_prefix: &str) -> Vec<CapturedEvent> {
        self.with_events(|events| {
            events
                .iter()
                .filter(|e| e.target.starts_with(target_prefix))
                .cloned()
                .collect()
        })
    }

    /// Clear all captured events.
    pub fn clear(&self) {
        self.with_events(Vec::clear);
    }
}

struct CaptureLayer {
    logs: CapturedLogs,
}

struct FieldVisitor {
    message: String,
    fields: Vec<(String, String)>,
}

impl tracing::field::Visit for FieldVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        let val = format!("{value:?}");
        if field.name() == "message" {
            self.message = val;
        } else {
            self.fields.push((field.name().to_owned(), val));
        }
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        if field.name() == "message" {
            value.clone_into(&mut self.message);
        } else {
            self.fields.push((field.name().to_owned(), value.to_owned()));
        }
    }

    fn record_u64(&mut self, field: &tracing::field::Field, value: u64) {
        self.fields.push((field.name().to_owned(), value.to_string()));
    }

    fn record_i64(&mut self, field: &tracing::field::Field, value: i64) {
        self.fields.push((field.name().to_owned(), value.to_string()));
    }

    fn record_bool(&mut self, field: &tracing::field::Field, value: bool) {
        self.fields.push((field.name().to_owned(), value.to_string()));
    }
}

impl<S> Layer<S> for CaptureLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let mut visitor = FieldVisitor {
            message: String::new(),
            fields: Vec::new(),
        };
        event.record(&mut visitor);

        let captured = CapturedEvent {
            level: *metadata.level(),
            target: metadata.target().to_owned(),
            message: visitor.message,
            fields: visitor.fields,
        };
        self.logs.with_events(|events| events.push(captured));
    }
}

/// Install a test subscriber that captures all events and returns a handle
/// to the captured logs.
///
/// Uses `set_default`, so it only applies to the current thread. Tests that
/// assert on logs emitted by a spawned task must run on a current-thread
/// runtime (the `#[tokio::test]` default).
///
/// The returned guard must be kept alive for the duration of the test.
pub fn capture_logs() -> (CapturedLogs, tracing::subscriber::DefaultGuard) {
    let logs = CapturedLogs::default();
    let layer = CaptureLayer { logs: logs.clone() };

    let subscriber = tracing_subscriber::registry()
        .with(layer)
        .with(LevelFilter::TRACE);

    let guard = subscriber.set_default();
    (logs, guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_warn_event() {
        let (logs, _guard) = capture_logs();
        tracing::warn!("frame dropped");
        assert!(logs.has_event(Level::WARN, "frame dropped"));
    }

    #[test]
    fn filter_by_level() {
        let (logs, _guard) = capture_logs();
        tracing::info!("info");
        tracing::warn!("warn");
        tracing::warn!("warn again");

        assert_eq!(logs.count_at_level(Level::INFO), 1);
        assert_eq!(logs.count_at_level(Level::WARN), 2);
        assert_eq!(logs.count_at_level(Level::ERROR), 0);
    }

    #[test]
    fn captures_fields() {
        let (logs, _guard) = capture_logs();
        tracing::warn!(uri = "ui://a", attempt = 3_u64, "reconnecting");
        let events = logs.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].field("uri"), Some("ui://a"));
        assert_eq!(events[0].field("attempt"), Some("3"));
    }

    #[test]
    fn filter_by_target() {
        let (logs, _guard) = capture_logs();
        tracing::info!(target: "domlink_client::session", "session event");
        tracing::info!(target: "domlink_cli", "cli event");

        let session_events = logs.events_for_target("domlink_client");
        assert_eq!(session_events.len(), 1);
        assert!(session_events[0].message.contains("session event"));
    }

    #[test]
    fn clear_resets() {
        let (logs, _guard) = capture_logs();
        tracing::info!("one");
        logs.clear();
        assert!(logs.events().is_empty());
    }
}
