//! Pipeline services layer.
//!
//! This module contains the services that turn classified emails into
//! persisted canonical orders, coordinating between the extraction layer,
//! storage, and domain types.
//!
//! # Architecture
//!
//! Services sit between raw email input and the storage layer:
//!
//! ```text
//! Mail Source (raw emails)
//!          |
//!          v
//! Classify + Extract (fragments)
//!          |
//!          v
//!    Services Layer  <-- You are here
//!          |
//!          v
//! Order Store (canonical orders)
//! ```
//!
//! # Services Overview
//!
//! - [`DedupService`]: Matches fragments to existing orders via the rule cascade
//! - [`ReconcileService`]: Folds fragments into orders under the merge rules
//! - [`SyncService`]: Orchestrates full runs, one email at a time, oldest first

mod dedup_service;
mod reconcile_service;
mod sync_service;

pub use dedup_service::{DedupService, MatchOutcome, MatchRule};
pub use reconcile_service::ReconcileService;
pub use sync_service::{SyncEvent, SyncService, SyncSummary};
