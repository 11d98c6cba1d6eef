//! Catalog store - the authoritative home of lesson definitions, LiveLesson
//! records, and verification tasks.
//!
//! The store is the single source of truth. Scheduler components read and
//! mutate records through the [`CatalogStore`] trait per request and never
//! hold authoritative in-memory copies; anything cached elsewhere is
//! advisory only.

pub mod error;
pub mod memory;
pub mod store;

pub use error::{Result, StateError};
pub use memory::MemoryStore;
pub use store::CatalogStore;
