//! Order persistence layer.
//!
//! The engine never owns durable storage; it talks to an [`OrderStore`]
//! collaborator. This module defines that trait plus [`MemoryOrderStore`],
//! an in-memory reference implementation used by tests and by embedders
//! that do not need persistence.

mod memory;
mod traits;

pub use memory::MemoryOrderStore;
pub use traits::{OrderStore, Result, StoreError};
