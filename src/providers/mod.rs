//! Mail source providers.
//!
//! This module contains the collaborator traits and implementations that
//! supply raw emails to the engine:
//!
//! - [`mail`] - Read-only mail sources (message listing and retrieval)

pub mod mail;
