//! `bovinext-store`: repository implementations.
//!
//! [`SqliteStore`] is the production store. [`MemoryStore`] keeps the same
//! uniqueness contract in process and adds failure injection for tests.

mod memory;
mod sqlite;

pub use memory::{MemoryStore, Operation};
pub use sqlite::SqliteStore;
