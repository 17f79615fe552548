//! waybill - An email-to-order extraction and reconciliation engine
//!
//! This crate turns a mailbox full of e-commerce notifications into a
//! de-duplicated set of canonical orders: classification of vendor emails,
//! field extraction with confidence scoring, identity hashing, lifecycle
//! merging, and sync orchestration over pluggable mail sources.

pub mod classify;
pub mod config;
pub mod domain;
pub mod extract;
pub mod normalize;
pub mod providers;
pub mod rules;
pub mod services;
pub mod storage;
