//! Identifier and control metadata carried by every message.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque message identifier.
///
/// Requests carry a unique id; responses echo the id of the request they
/// answer. An empty id on an inbound message means it is not addressed to
/// any request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh unique id (ULID).
    pub fn generate() -> Self {
        Self(ulid::Ulid::new().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for MessageId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<u64> for MessageId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

/// Control metadata attached to a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Control {
    /// Inbound only: the message is a broadcast/streamed event and must
    /// bypass correlation.
    #[serde(default)]
    pub relay: bool,
}

impl Control {
    pub fn relayed() -> Self {
        Self { relay: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        let a = MessageId::generate();
        let b = MessageId::generate();
        assert_ne!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn test_id_conversions() {
        assert_eq!(MessageId::from(1u64), MessageId::new("1"));
        assert_eq!(MessageId::from("x").as_str(), "x");
        assert!(MessageId::default().is_empty());
    }

    #[test]
    fn test_control_default_is_not_relay() {
        assert!(!Control::default().relay);
        assert!(Control::relayed().relay);

        let control: Control = serde_json::from_str("{}").unwrap();
        assert!(!control.relay);
    }
}
