//! SQLite persistence for wallets, transactions and deliveries.
//!
//! All writes that must happen once are guarded by primary key or unique
//! constraints. A conflicting insert is reported as
//! [`InsertOutcome::Duplicate`] instead of an error.

pub mod db;
pub mod models;
pub mod schema;

use thiserror::Error;

pub use db::Storage;
pub use models::{InsertOutcome, TransactionDetails, Wallet};

/// Errors raised by the storage layer.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("database lock poisoned: {0}")]
    Lock(String),

    #[error("blocking storage task failed: {0}")]
    Join(String),

    /// A stored value could not be turned back into a domain type.
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

pub type StorageResult<T> = Result<T, StorageError>;
