//! Identifier newtypes for the engine's entities.
//!
//! Users, platforms, orders, and provider messages each get their own
//! wrapper, so an order id can never stand in for a message id at a call
//! site. Identity hashes have their own type in the identity module.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for the user whose mailbox is being processed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Identifier for an e-commerce platform (vendor) template.
///
/// Platform ids are lowercase slugs ("amazon", "flipkart"). They key the
/// rule registry, so new platforms can be added as data without new types.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlatformId(pub String);

impl PlatformId {
    /// The catch-all platform used when no vendor-specific signal matches
    /// but the email still looks like order mail.
    pub fn generic() -> Self {
        Self("generic".to_owned())
    }
}

impl fmt::Display for PlatformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for PlatformId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PlatformId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Unique identifier for a canonical order record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl OrderId {
    /// Generates a fresh order id.
    pub fn new() -> Self {
        Self(format!("ord-{}", uuid::Uuid::new_v4()))
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Provider-assigned identifier for a raw email message.
///
/// Opaque to the engine; used to link fragments back to their source email
/// and to make re-processing the same message idempotent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProviderMessageId(pub String);

impl fmt::Display for ProviderMessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ProviderMessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ProviderMessageId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_display() {
        let id = UserId("user-1".to_string());
        assert_eq!(id.to_string(), "user-1");
    }

    #[test]
    fn platform_id_equality() {
        let id1 = PlatformId::from("amazon");
        let id2 = PlatformId::from("amazon".to_string());
        assert_eq!(id1, id2);
    }

    #[test]
    fn platform_id_generic() {
        assert_eq!(PlatformId::generic().0, "generic");
    }

    #[test]
    fn order_id_is_unique() {
        let id1 = OrderId::new();
        let id2 = OrderId::new();
        assert_ne!(id1, id2);
        assert!(id1.0.starts_with("ord-"));
    }

    #[test]
    fn message_id_hash() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(ProviderMessageId::from("msg-1"));
        assert!(set.contains(&ProviderMessageId::from("msg-1")));
    }
}
