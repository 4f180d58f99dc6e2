//! Shared domain types for the auto-tracker crates: configuration, the stat
//! address catalog, errors, and structured trace events.

pub mod config;
pub mod error;
pub mod stats;
pub mod trace;

pub use error::{Error, Result};
pub use stats::{AddressRegistry, AddressTable, MemoryRegion, StatAddress};
