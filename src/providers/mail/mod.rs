//! Mail source implementations.
//!
//! This module contains the [`MailSource`] trait and implementations for
//! mailbox backends:
//!
//! - [`StaticMailSource`] - Fixed in-memory mailbox for tests and replays
//!
//! # Architecture
//!
//! A mail source is the engine's only contact with a mailbox. It exposes
//! two read-only operations: listing message ids within a time window, and
//! fetching one message. Everything else (authentication, pagination,
//! retries) is internal to each implementation. Sources that work with
//! wire-format messages convert them via [`raw_email_from_rfc5322`].

mod fetch;
mod memory;
mod message;
mod traits;

pub use fetch::fetch_all;
pub use memory::StaticMailSource;
pub use message::raw_email_from_rfc5322;
pub use traits::{FetchWindow, MailSource, MailSourceError, Result};
