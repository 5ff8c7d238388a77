//! # Time
//!
//! The agent never reads the wall clock directly: the system clock on a
//! kiosk is managed by an outside component, and tests need to move time
//! forward to exercise credential expiry. Everything takes a [`Clock`].

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::{CoreError, CoreResult};

/// Source of "now".
pub trait Clock: Send + Sync {
    /// Returns the current time in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Parses an ISO 8601 timestamp.
///
/// Accepts RFC 3339 (`2025-01-01T10:00:00Z`, `...+02:00`) and the naive form
/// without an offset (`2025-01-01T10:00:00`, optionally with fractional
/// seconds), which is interpreted as UTC.
///
/// ## Example
/// ```rust
/// use scanpoint_core::time::parse_timestamp;
///
/// let a = parse_timestamp("expiration_date", "2025-06-01T12:00:00Z").unwrap();
/// let b = parse_timestamp("expiration_date", "2025-06-01T12:00:00").unwrap();
/// assert_eq!(a, b);
/// ```
pub fn parse_timestamp(field: &str, value: &str) -> CoreResult<DateTime<Utc>> {
    let trimmed = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(naive.and_utc());
        }
    }

    Err(CoreError::InvalidTimestamp {
        field: field.to_string(),
        value: value.to_string(),
    })
}

/// Formats a timestamp the way it is stored and sent.
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

/// Serde adapters for timestamps that may arrive without an offset.
pub mod lenient {
    use chrono::{DateTime, Utc};
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&super::format_timestamp(dt))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_timestamp("timestamp", &raw).map_err(D::Error::custom)
    }
}
