//! # Storage Error Types
//!
//! Error types for file-backed persistence.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  std::io / csv / serde_json error                                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  StoreError (this module) ← Adds context and categorization            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SyncError::Storage (scanpoint-sync) ← Persistence category            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  add_code → false   /   CLI → non-zero exit                            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use scanpoint_core::{CoreError, ValidationError};
use thiserror::Error;

/// Storage operation errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// File system operation failed.
    ///
    /// ## When This Occurs
    /// - Data directory cannot be created
    /// - Disk full or read-only file system
    /// - Permission denied on the data directory
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV encoding or decoding failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Credential file is not valid JSON or misses a required field.
    #[error("Malformed credential file: {0}")]
    Json(#[from] serde_json::Error),

    /// A queue row could not be turned into a record.
    ///
    /// ## When This Occurs
    /// - Torn trailing line after a crash
    /// - File edited by hand
    #[error("Invalid record at row {row}: {reason}")]
    InvalidRecord { row: u64, reason: String },

    /// Record failed validation at the store boundary.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl StoreError {
    /// Wraps an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid_record(row: u64, reason: impl ToString) -> Self {
        StoreError::InvalidRecord {
            row,
            reason: reason.to_string(),
        }
    }
}

impl From<CoreError> for StoreError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(v) => StoreError::Validation(v),
            other => StoreError::InvalidRecord {
                row: 0,
                reason: other.to_string(),
            },
        }
    }
}

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;
