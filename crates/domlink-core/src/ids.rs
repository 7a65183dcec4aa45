//! Branded ID newtypes for type safety.
//!
//! Destinations, correlation tokens and queued actions are all strings on the
//! wire. Wrapping each in its own newtype keeps a destination URI from being
//! passed where a correlation ID is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create from an existing string value.
            #[must_use]
            pub fn from_string(s: String) -> Self {
                Self(s)
            }

            /// Return the inner string as a slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

branded_id! {
    /// Key naming a rendering target (e.g. `ui://panel-1`).
    DestinationUri
}

branded_id! {
    /// Token linking a request frame to its eventual response frame.
    CorrelationId
}

branded_id! {
    /// Identifier of an action queued by the remote side.
    ActionId
}

impl CorrelationId {
    /// Generate a fresh random (v4) correlation ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn correlation_id_is_uuid_v4() {
        let id = CorrelationId::new();
        let parsed = Uuid::parse_str(id.as_str()).expect("should be valid UUID");
        assert_eq!(parsed.get_version(), Some(uuid::Version::Random));
    }

    #[test]
    fn correlation_ids_do_not_collide() {
        let ids: HashSet<CorrelationId> = (0..10_000).map(|_| CorrelationId::new()).collect();
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn destination_from_str_ref() {
        let uri = DestinationUri::from("ui://panel-1");
        assert_eq!(uri.as_str(), "ui://panel-1");
    }

    #[test]
    fn deref_to_str() {
        let id = ActionId::from("act-1");
        let s: &str = &id;
        assert_eq!(s, "act-1");
    }

    #[test]
    fn display() {
        let uri = DestinationUri::from("ui://x");
        assert_eq!(format!("{uri}"), "ui://x");
    }

    #[test]
    fn serializes_transparently() {
        let id = CorrelationId::from("abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");
        let back: CorrelationId = serde_json::from_str("\"abc\"").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn borrow_allows_str_lookup() {
        let mut set = HashSet::new();
        let _ = set.insert(DestinationUri::from("ui://a"));
        assert!(set.contains("ui://a"));
    }
}
