//! Configuration types.
//!
//! Engine tolerances, weights, and limits as plain serde data. The engine
//! consumes these; it never persists them.

mod settings;

pub use settings::{
    ConfidenceWeights, EngineSettings, HeuristicSettings, ReconcileSettings, SyncSettings,
    TextLimits,
};
