//! # scanpoint-core: Pure Domain Types for the Scanpoint Agent
//!
//! This crate holds the domain model shared by the store, the sync engine
//! and the agent binary. It has zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Scanpoint Agent Architecture                       │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │           Event Source (keyboard-wedge scanner / simulated)     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ (code, captured_at)                    │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │        scanpoint-sync: SyncEngine + ActivationManager           │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ scanpoint-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌────────────┐  ┌────────────┐  ┌────────────┐  ┌──────────┐ │   │
//! │  │   │   types    │  │    time    │  │ validation │  │  error   │ │   │
//! │  │   │ SyncRecord │  │   Clock    │  │ barcode    │  │ CoreError│ │   │
//! │  │   │ Credential │  │ ISO 8601   │  │ metadata   │  │          │ │   │
//! │  │   └────────────┘  └────────────┘  └────────────┘  └──────────┘ │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO FILES • NO NETWORK                               │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │        scanpoint-store: pending.csv + token.json                │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - `SyncRecord`, `RecordStatus`, `Metadata`, `Credential`, ...
//! - [`time`] - `Clock` abstraction and lenient ISO 8601 parsing
//! - [`validation`] - Barcode and metadata validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use chrono::Utc;
//! use scanpoint_core::{Metadata, RecordStatus, SyncRecord};
//!
//! let record = SyncRecord::new("ABC123", Utc::now(), "device-1", Metadata::new());
//! assert_eq!(record.status, RecordStatus::Pending);
//! assert_eq!(record.retry_count, 0);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod time;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use time::{Clock, SystemClock};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum accepted barcode length.
///
/// Longer input almost always means two scans ran together without the
/// terminating Enter key.
pub const MAX_CODE_LENGTH: usize = 128;

/// Maximum length of a metadata key.
pub const MAX_METADATA_KEY_LENGTH: usize = 64;

/// Field names a metadata key may not shadow.
pub const RESERVED_FIELDS: &[&str] = &[
    "id",
    "code",
    "timestamp",
    "device_id",
    "retry_count",
    "last_attempt",
    "status",
    "metadata",
];

/// Default retry limit before a record becomes `Failed`.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// A credential is refreshed once fewer than this many hours remain.
pub const REFRESH_THRESHOLD_HOURS: i64 = 24;
