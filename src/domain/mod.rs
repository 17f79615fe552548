//! Core domain models.
//!
//! Plain data types shared across the pipeline: identifiers, raw emails,
//! extracted fragments, canonical orders, and identity hashing. Nothing in
//! this module does I/O.

mod email;
mod fragment;
mod identity;
mod order;
mod types;

pub use email::RawEmail;
pub use fragment::{
    EmailType, ExtractedField, ExtractionDiagnostics, FragmentSource, Item, ParsedOrderFragment,
    RejectedCandidate, StrategyUse,
};
pub use identity::{FragmentIdentities, OrderIdentity};
pub use order::{CanonicalOrder, FragmentLink, IntegrityCheck, IntegrityWarning, OrderStatus};
pub use types::{OrderId, PlatformId, ProviderMessageId, UserId};
