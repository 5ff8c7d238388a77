//! # Validation Module
//!
//! Input validation for scans before they reach the durable queue.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Event source                                                  │
//! │  ├── Drops empty lines and over-long input                              │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: SyncEngine::add_code                                          │
//! │  └── THIS MODULE: barcode + metadata rules                              │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Queue store                                                   │
//! │  └── Re-validates metadata keys on append/rewrite/load                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use scanpoint_core::validation::{validate_code, validate_activation_key};
//!
//! assert_eq!(validate_code("  7891234567895 ").unwrap(), "7891234567895");
//! assert!(validate_code("").is_err());
//! assert!(validate_activation_key("").is_err());
//! ```

use crate::error::ValidationError;
use crate::{MAX_CODE_LENGTH, MAX_METADATA_KEY_LENGTH, RESERVED_FIELDS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validates a scanned barcode.
///
/// ## Rules
/// - Surrounding whitespace is trimmed
/// - Must not be empty
/// - At most [`MAX_CODE_LENGTH`] characters
/// - No control characters (a stray Tab/Enter means a mangled scan)
///
/// ## Returns
/// The trimmed code.
pub fn validate_code(code: &str) -> ValidationResult<String> {
    let code = code.trim();

    if code.is_empty() {
        return Err(ValidationError::Required {
            field: "code".to_string(),
        });
    }

    if code.chars().count() > MAX_CODE_LENGTH {
        return Err(ValidationError::TooLong {
            field: "code".to_string(),
            max: MAX_CODE_LENGTH,
        });
    }

    if code.chars().any(char::is_control) {
        return Err(ValidationError::InvalidFormat {
            field: "code".to_string(),
            reason: "must not contain control characters".to_string(),
        });
    }

    Ok(code.to_string())
}

/// Validates a metadata key.
///
/// ## Rules
/// - Not empty, at most [`MAX_METADATA_KEY_LENGTH`] characters
/// - Only ASCII letters, digits, `_`, `-` and `.`
/// - Must not be one of [`RESERVED_FIELDS`]
pub fn validate_metadata_key(key: &str) -> ValidationResult<()> {
    if key.is_empty() {
        return Err(ValidationError::Required {
            field: "metadata key".to_string(),
        });
    }

    if key.len() > MAX_METADATA_KEY_LENGTH {
        return Err(ValidationError::TooLong {
            field: "metadata key".to_string(),
            max: MAX_METADATA_KEY_LENGTH,
        });
    }

    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
    {
        return Err(ValidationError::InvalidFormat {
            field: "metadata key".to_string(),
            reason: "must contain only letters, numbers, '_', '-' and '.'".to_string(),
        });
    }

    if RESERVED_FIELDS.contains(&key) {
        return Err(ValidationError::ReservedKey {
            key: key.to_string(),
        });
    }

    Ok(())
}

/// Validates an activation key typed in by the operator.
pub fn validate_activation_key(key: &str) -> ValidationResult<String> {
    let key = key.trim();

    if key.is_empty() {
        return Err(ValidationError::Required {
            field: "activation key".to_string(),
        });
    }

    if key.len() > 256 {
        return Err(ValidationError::TooLong {
            field: "activation key".to_string(),
            max: 256,
        });
    }

    Ok(key.to_string())
}

/// Shortens a secret for log output (first 8 characters).
pub fn redact(secret: &str) -> String {
    let prefix: String = secret.chars().take(8).collect();
    format!("{}...", prefix)
}

// =============================================================================
// Unit Tests
// =============================================================================
