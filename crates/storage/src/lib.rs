//! Persistence for learners, study plans, mastery records, attempt history
//! and vocabulary.
//!
//! [`repository::Storage`] bundles the repository traits behind trait objects;
//! [`repository::InMemoryRepository`] and [`sqlite::SqliteRepository`] are the
//! two backends.

pub mod repository;
pub mod sqlite;

pub use repository::{Storage, StorageError};
