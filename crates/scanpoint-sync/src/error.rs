//! # Sync Error Types
//!
//! Error types for activation and sync operations.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Transport     │  │     Protocol            │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Connection     │  │  HttpStatus             │ │
//! │  │  InvalidUrl     │  │  Timeout        │  │  MalformedResponse      │ │
//! │  │  ConfigLoad     │  │                 │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Authorization  │  │   Activation    │  │  Persistence            │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Unauthorized   │  │  NotActivated   │  │  Storage                │ │
//! │  │  (revokes token)│  │  Rejected       │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │   Exhaustion    │  │   Validation    │  │  Internal               │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │ RetriesExhausted│  │  Validation     │  │  Internal, ShuttingDown │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use scanpoint_core::{CoreError, ValidationError};
use scanpoint_store::StoreError;
use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Sync error type covering all possible activation and delivery failures.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid agent configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid API or probe URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    // =========================================================================
    // Validation Errors
    // =========================================================================
    /// Input rejected before touching disk or network.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// Could not reach the API.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Request did not complete in time.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    // =========================================================================
    // Protocol Errors
    // =========================================================================
    /// API answered with an unexpected HTTP status.
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// API answered 200 with a body we could not use.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    // =========================================================================
    // Authorization Errors
    // =========================================================================
    /// API answered 401. The local credential has been revoked.
    #[error("Credential rejected by server (401)")]
    Unauthorized,

    // =========================================================================
    // Activation Errors
    // =========================================================================
    /// No valid credential.
    #[error("Device is not activated")]
    NotActivated,

    /// Server said `success: false` / `valid: false`.
    #[error("Rejected by server: {0}")]
    Rejected(String),

    // =========================================================================
    // Persistence Errors
    // =========================================================================
    /// Local file could not be read or written.
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    // =========================================================================
    // Exhaustion Errors
    // =========================================================================
    /// Record reached its retry limit.
    #[error("Retries exhausted for record {id}")]
    RetriesExhausted { id: String },

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// Internal engine error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Engine is shutting down.
    #[error("Sync engine is shutting down")]
    ShuttingDown,
}

// =============================================================================
// Error Categories
// =============================================================================

/// Coarse classification used for logging and retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Transport,
    Protocol,
    Authorization,
    Persistence,
    Exhaustion,
    Activation,
    Config,
    Validation,
    Internal,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorCategory::Transport => "transport",
            ErrorCategory::Protocol => "protocol",
            ErrorCategory::Authorization => "authorization",
            ErrorCategory::Persistence => "persistence",
            ErrorCategory::Exhaustion => "exhaustion",
            ErrorCategory::Activation => "activation",
            ErrorCategory::Config => "config",
            ErrorCategory::Validation => "validation",
            ErrorCategory::Internal => "internal",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<CoreError> for SyncError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(v) => SyncError::Validation(v),
            other => SyncError::Internal(other.to_string()),
        }
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<tokio::task::JoinError> for SyncError {
    fn from(err: tokio::task::JoinError) -> Self {
        SyncError::Internal(format!("background task failed: {}", err))
    }
}

// =============================================================================
// Error Categorization (for retry logic)
// =============================================================================

impl SyncError {
    /// Returns the category this error belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            SyncError::InvalidConfig(_)
            | SyncError::InvalidUrl(_)
            | SyncError::ConfigLoadFailed(_) => ErrorCategory::Config,
            SyncError::Validation(_) => ErrorCategory::Validation,
            SyncError::ConnectionFailed(_) | SyncError::Timeout(_) => ErrorCategory::Transport,
            SyncError::HttpStatus { .. } | SyncError::MalformedResponse(_) => {
                ErrorCategory::Protocol
            }
            SyncError::Unauthorized => ErrorCategory::Authorization,
            SyncError::NotActivated | SyncError::Rejected(_) => ErrorCategory::Activation,
            SyncError::Storage(_) => ErrorCategory::Persistence,
            SyncError::RetriesExhausted { .. } => ErrorCategory::Exhaustion,
            SyncError::Internal(_) | SyncError::ShuttingDown => ErrorCategory::Internal,
        }
    }

    /// Returns true if a later attempt could succeed without intervention.
    ///
    /// ## Retryable Errors
    /// - Connection failures and timeouts
    /// - Unexpected HTTP statuses and malformed bodies
    ///
    /// ## Non-Retryable Errors
    /// - 401 (credential is gone)
    /// - Configuration, validation and local storage errors
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Transport | ErrorCategory::Protocol
        )
    }

    /// Returns true if this error means the device must re-activate.
    pub fn requires_activation(&self) -> bool {
        matches!(self, SyncError::Unauthorized | SyncError::NotActivated)
    }
}
