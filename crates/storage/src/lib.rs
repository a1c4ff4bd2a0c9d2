//! Storage abstraction and implementations for goalsync.
//!
//! This crate provides the goal/history store traits, a local JSON
//! implementation, and an optional SQLite database backend.

#![warn(missing_docs)]

pub mod trait_;
pub mod json_storage;
#[cfg(feature = "sqlite")]
pub mod sqlite_storage;
pub mod open;

pub use trait_::{GoalStore, HistoryStore, Store, StoreError, Result};
pub use json_storage::JsonStore;
#[cfg(feature = "sqlite")]
pub use sqlite_storage::SqliteStore;
pub use open::{open_store, StoreConfig};
