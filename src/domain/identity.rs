//! Stable order identity hashing.
//!
//! Two fragments describe the same purchase when their identity hashes
//! collide. The hash covers platform, normalized reference, and user, so
//! the same reference seen by two users never merges.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{PlatformId, UserId};
use crate::normalize;

/// Hex-encoded SHA-256 identity of an order reference within a platform
/// and user scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderIdentity(String);

impl OrderIdentity {
    /// Derives the identity for a reference. The reference is normalized
    /// first, so raw and normalized spellings of the same reference hash
    /// identically.
    pub fn derive(platform: &PlatformId, reference: &str, user: &UserId) -> Self {
        let normalized = normalize::normalize_reference(reference);
        let mut hasher = Sha256::new();
        hasher.update(format!("{platform}-{normalized}-{user}").as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    /// The hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OrderIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The identity keys one fragment or order can be correlated by.
///
/// A confirmation usually carries only the order key; a shipping notice
/// often carries both; a bare delivery notice may carry only the tracking
/// key. Sharing either key is sufficient to correlate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FragmentIdentities {
    /// Identity derived from the order reference.
    pub order: Option<OrderIdentity>,
    /// Identity derived from the tracking reference.
    pub tracking: Option<OrderIdentity>,
}

impl FragmentIdentities {
    /// Iterates over the populated identity keys.
    pub fn iter(&self) -> impl Iterator<Item = &OrderIdentity> {
        self.order.iter().chain(self.tracking.iter())
    }

    /// True when no key is populated.
    pub fn is_empty(&self) -> bool {
        self.order.is_none() && self.tracking.is_none()
    }

    /// True when the two sets share at least one key.
    pub fn overlaps(&self, other: &FragmentIdentities) -> bool {
        self.iter().any(|id| other.iter().any(|o| o == id))
    }
}
