//! Engine settings.
//!
//! Tolerances, weights, and limits consumed by the pipeline. Per-platform
//! extraction rules are not settings; they live in [`crate::rules`] as data
//! the registry compiles.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Top-level engine settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Sync batch limits and fetch parallelism.
    pub sync: SyncSettings,
    /// Heuristic order-matching tolerances.
    pub heuristics: HeuristicSettings,
    /// Extraction confidence weights.
    pub confidence: ConfidenceWeights,
    /// Merge-time integrity check tolerances.
    pub reconcile: ReconcileSettings,
    /// Text length bounds.
    pub text: TextLimits,
}

/// Sync batch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Maximum emails processed in one sync batch.
    pub max_emails_per_sync: usize,
    /// Concurrent message fetches when pulling from a mail source.
    pub fetch_concurrency: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            max_emails_per_sync: 500,
            fetch_concurrency: 8,
        }
    }
}

/// Tolerances for the heuristic match rule, which links emails that never
/// share an explicit reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeuristicSettings {
    /// Master switch for heuristic matching.
    pub enabled: bool,
    /// Maximum days between order dates for a heuristic match.
    pub date_window_days: i64,
    /// Maximum absolute amount difference for a heuristic match.
    pub amount_tolerance: Decimal,
}

impl Default for HeuristicSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            date_window_days: 3,
            amount_tolerance: dec!(1.00),
        }
    }
}

/// Weights for the extraction confidence score. The four field weights sum
/// to 1.0; the corroboration bonus is added per additional fragment during
/// reconciliation, capped at `cap`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceWeights {
    /// Weight for an extracted order reference.
    pub order_reference: f64,
    /// Weight for an extracted amount.
    pub amount: f64,
    /// Weight for a non-empty item list.
    pub items: f64,
    /// Weight for a keyword-identified status.
    pub status: f64,
    /// Added per corroborating fragment beyond the first.
    pub corroboration_bonus: f64,
    /// Upper bound on merged confidence, strictly below 1.0.
    pub cap: f64,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            order_reference: 0.35,
            amount: 0.25,
            items: 0.20,
            status: 0.20,
            corroboration_bonus: 0.05,
            cap: 0.99,
        }
    }
}

/// Tolerances for merge-time integrity checks. Violations produce warnings
/// on the order; they never block a merge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileSettings {
    /// Amount disagreement beyond this raises an amount-mismatch warning.
    pub amount_warn_tolerance: Decimal,
    /// Name similarity below this raises a divergence warning.
    pub name_similarity_floor: f64,
}

impl Default for ReconcileSettings {
    fn default() -> Self {
        Self {
            amount_warn_tolerance: dec!(1.00),
            name_similarity_floor: 0.4,
        }
    }
}

/// Length bounds applied while cleaning extracted text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextLimits {
    /// Maximum characters kept in a product name.
    pub product_name_max_chars: usize,
    /// Maximum characters kept in an item name.
    pub item_name_max_chars: usize,
    /// Maximum body characters scanned by the extractors.
    pub body_scan_max_chars: usize,
}

impl Default for TextLimits {
    fn default() -> Self {
        Self {
            product_name_max_chars: 120,
            item_name_max_chars: 120,
            body_scan_max_chars: 50_000,
        }
    }
}
