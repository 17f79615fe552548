//! Data-driven platform rule tables.
//!
//! Vendor knowledge lives here as data: which sender domains and phrases
//! identify a platform, which regex chains extract its references, and the
//! plausible amount range for validation. The classification and extraction
//! algorithms are shared and vendor-agnostic; supporting a new platform
//! means registering a new [`PlatformSpec`], not writing code.

mod platform;
mod registry;

pub use platform::{AmountRange, PatternSpec, PlatformRules, PlatformSpec, ReferencePattern};
pub use registry::RuleRegistry;

use thiserror::Error;

/// Errors from compiling rule specs.
#[derive(Debug, Error)]
pub enum RulesError {
    /// A spec carried a regex that failed to compile.
    #[error("invalid pattern '{name}' for platform '{platform}': {source}")]
    InvalidPattern {
        /// Platform the spec describes.
        platform: String,
        /// Name of the offending pattern.
        name: String,
        /// The regex compile error.
        #[source]
        source: regex::Error,
    },
}
