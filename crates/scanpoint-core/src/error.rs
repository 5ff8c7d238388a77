//! # Error Types
//!
//! Domain-specific error types for scanpoint-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  scanpoint-core errors (this file)                                     │
//! │  ├── CoreError        - Record state / timestamp errors                │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  scanpoint-store errors (separate crate)                               │
//! │  └── StoreError       - CSV / JSON file failures                       │
//! │                                                                         │
//! │  scanpoint-sync errors (separate crate)                                │
//! │  └── SyncError        - Transport, protocol, authorization, ...        │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → StoreError → SyncError            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core domain errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A timestamp string could not be parsed.
    ///
    /// ## When This Occurs
    /// - Corrupted `pending.csv` row
    /// - Server returned an expiration date in an unknown format
    #[error("Invalid timestamp '{value}' for {field}")]
    InvalidTimestamp { field: String, value: String },

    /// A record status string is not one of pending/synced/failed.
    #[error("Unknown record status: {0}")]
    UnknownStatus(String),

    /// The record is already terminal and cannot transition again.
    #[error("Record {id} is already {status}")]
    TerminalRecord { id: String, status: String },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Used for early validation before a scan touches the durable queue.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Invalid format.
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Metadata key collides with a record field.
    #[error("metadata key '{key}' is reserved")]
    ReservedKey { key: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
