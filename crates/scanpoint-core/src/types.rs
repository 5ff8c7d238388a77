//! # Domain Types
//!
//! Core domain types used throughout the scanpoint agent.
//!
//! ## Type Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │   SyncRecord    │   │   Credential    │   │   ScanEvent     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  token          │   │  code           │       │
//! │  │  code           │   │  device_id      │   │  captured_at    │       │
//! │  │  timestamp      │   │  activation_date│   └─────────────────┘       │
//! │  │  device_id      │   │  expiration_date│                             │
//! │  │  retry_count    │   │  device_serial  │   ┌─────────────────┐       │
//! │  │  last_attempt   │   └─────────────────┘   │  RecordStatus   │       │
//! │  │  status         │                         │  Pending        │       │
//! │  │  metadata       │                         │  Synced         │       │
//! │  └─────────────────┘                         │  Failed         │       │
//! │                                              └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Record Lifecycle
//! ```text
//!   add_code ──► Pending ──(200 + success)──► Synced  (removed from store)
//!                  │  ▲
//!                  │  └── failed attempt, retry_count + 1
//!                  │
//!                  └──(retry_count >= max_retries)──► Failed (terminal)
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::time::lenient;
use crate::validation::validate_metadata_key;
use crate::REFRESH_THRESHOLD_HOURS;

// =============================================================================
// Record Status
// =============================================================================

/// Delivery state of a queued scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Waiting for delivery (possibly after failed attempts).
    #[default]
    Pending,
    /// Accepted by the remote API. Never retained in the store.
    Synced,
    /// Retry limit reached. Terminal until explicitly purged.
    Failed,
}

impl RecordStatus {
    /// Returns true for `Synced` and `Failed`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RecordStatus::Synced | RecordStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Pending => "pending",
            RecordStatus::Synced => "synced",
            RecordStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RecordStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(RecordStatus::Pending),
            "synced" => Ok(RecordStatus::Synced),
            "failed" => Ok(RecordStatus::Failed),
            other => Err(CoreError::UnknownStatus(other.to_string())),
        }
    }
}

// =============================================================================
// Metadata
// =============================================================================

/// Extra key/value pairs attached to a scan.
///
/// Keys are validated on insert (see [`validate_metadata_key`]); values are
/// free-form strings. Ordered so the CSV column is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(BTreeMap<String, String>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a validated entry, returning the previous value if any.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Option<String>, ValidationError> {
        let key = key.into();
        validate_metadata_key(&key)?;
        Ok(self.0.insert(key, value.into()))
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Result<Self, ValidationError> {
        self.insert(key, value)?;
        Ok(self)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    /// Re-checks every key. Used when metadata arrives through
    /// deserialization rather than [`Metadata::insert`].
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.0.keys().try_for_each(|k| validate_metadata_key(k))
    }

    /// Encodes as a JSON object string (the CSV column format).
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| "{}".to_string())
    }

    /// Decodes the CSV column format. Blank input is an empty map.
    pub fn from_json(raw: &str) -> Result<Self, ValidationError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(Self::new());
        }

        let map: BTreeMap<String, String> =
            serde_json::from_str(raw).map_err(|e| ValidationError::InvalidFormat {
                field: "metadata".to_string(),
                reason: e.to_string(),
            })?;
        let metadata = Metadata(map);
        metadata.validate()?;
        Ok(metadata)
    }
}

impl TryFrom<BTreeMap<String, String>> for Metadata {
    type Error = ValidationError;

    fn try_from(map: BTreeMap<String, String>) -> Result<Self, Self::Error> {
        let metadata = Metadata(map);
        metadata.validate()?;
        Ok(metadata)
    }
}

// =============================================================================
// Sync Record
// =============================================================================

/// One durably queued scan awaiting delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRecord {
    /// Stable identity. Reconciliation matches records by this id.
    pub id: Uuid,

    /// The scanned barcode.
    pub code: String,

    /// When the scan was captured.
    pub timestamp: DateTime<Utc>,

    /// Device identity at capture time (empty when not yet activated).
    pub device_id: String,

    /// Number of failed delivery attempts.
    pub retry_count: u32,

    /// When delivery was last attempted.
    pub last_attempt: Option<DateTime<Utc>>,

    pub status: RecordStatus,

    #[serde(default)]
    pub metadata: Metadata,
}

impl SyncRecord {
    /// Creates a new pending record with a fresh id.
    pub fn new(
        code: impl Into<String>,
        timestamp: DateTime<Utc>,
        device_id: impl Into<String>,
        metadata: Metadata,
    ) -> Self {
        SyncRecord {
            id: Uuid::new_v4(),
            code: code.into(),
            timestamp,
            device_id: device_id.into(),
            retry_count: 0,
            last_attempt: None,
            status: RecordStatus::Pending,
            metadata,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == RecordStatus::Pending
    }

    /// True once `retry_count` has reached the limit.
    pub fn attempts_exhausted(&self, max_retries: u32) -> bool {
        self.retry_count >= max_retries
    }

    /// Marks the record as delivered.
    pub fn mark_synced(&mut self) -> CoreResult<()> {
        self.ensure_pending()?;
        self.status = RecordStatus::Synced;
        Ok(())
    }

    /// Marks the record as permanently failed.
    pub fn mark_failed(&mut self) -> CoreResult<()> {
        self.ensure_pending()?;
        self.status = RecordStatus::Failed;
        Ok(())
    }

    /// Books one failed delivery attempt.
    ///
    /// Increments `retry_count`, stamps `last_attempt`, and flips to
    /// `Failed` when the limit is reached. Returns the new status.
    pub fn record_failed_attempt(
        &mut self,
        at: DateTime<Utc>,
        max_retries: u32,
    ) -> CoreResult<RecordStatus> {
        self.ensure_pending()?;
        self.retry_count = self.retry_count.saturating_add(1);
        self.last_attempt = Some(at);
        if self.attempts_exhausted(max_retries) {
            self.status = RecordStatus::Failed;
        }
        Ok(self.status)
    }

    fn ensure_pending(&self) -> CoreResult<()> {
        if self.status.is_terminal() {
            return Err(CoreError::TerminalRecord {
                id: self.id.to_string(),
                status: self.status.to_string(),
            });
        }
        Ok(())
    }
}

// =============================================================================
// Credential
// =============================================================================

/// The device's proof of activation.
///
/// Valid only while `now < expiration_date`. Dates are accepted with or
/// without a UTC offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Opaque bearer token.
    pub token: String,

    pub device_id: String,

    #[serde(with = "lenient")]
    pub activation_date: DateTime<Utc>,

    #[serde(with = "lenient")]
    pub expiration_date: DateTime<Utc>,

    /// Hardware identity the credential was issued to.
    #[serde(default)]
    pub device_serial: String,
}

impl Credential {
    /// True while `now` is strictly before the expiration date.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expiration_date
    }

    /// Time left before expiry (zero when already expired).
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        let left = self.expiration_date - now;
        if left < Duration::zero() {
            Duration::zero()
        } else {
            left
        }
    }

    /// Whole days until expiry, never negative.
    pub fn days_until_expiry(&self, now: DateTime<Utc>) -> i64 {
        self.remaining(now).num_days()
    }

    /// True when no more than the refresh threshold (24 h) remains.
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        self.remaining(now) <= Duration::hours(REFRESH_THRESHOLD_HOURS)
    }

    /// Returns a copy carrying a new token and expiry.
    ///
    /// `activation_date`, `device_id` and `device_serial` are preserved.
    pub fn refreshed(&self, token: impl Into<String>, expiration_date: DateTime<Utc>) -> Self {
        Credential {
            token: token.into(),
            expiration_date,
            ..self.clone()
        }
    }
}

/// Read-only projection of activation state for the UI and CLI.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ActivationInfo {
    pub activated: bool,
    pub device_id: Option<String>,
    pub activation_date: Option<DateTime<Utc>>,
    pub expiration_date: Option<DateTime<Utc>>,
    pub days_until_expiry: Option<i64>,
    pub token_exists: bool,
}

impl ActivationInfo {
    /// Projects an optional credential at `now`. Performs no purge.
    pub fn project(credential: Option<&Credential>, now: DateTime<Utc>) -> Self {
        match credential {
            Some(c) => ActivationInfo {
                activated: c.is_valid_at(now),
                device_id: Some(c.device_id.clone()),
                activation_date: Some(c.activation_date),
                expiration_date: Some(c.expiration_date),
                days_until_expiry: Some(c.days_until_expiry(now)),
                token_exists: !c.token.is_empty(),
            },
            None => ActivationInfo::default(),
        }
    }
}

// =============================================================================
// Scan Event
// =============================================================================

/// A barcode as delivered by an event source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanEvent {
    pub code: String,
    pub captured_at: DateTime<Utc>,
}

impl ScanEvent {
    pub fn new(code: impl Into<String>, captured_at: DateTime<Utc>) -> Self {
        ScanEvent {
            code: code.into(),
            captured_at,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap()
    }

    fn credential(expires_in: Duration) -> Credential {
        Credential {
            token: "tok".to_string(),
            device_id: "dev-1".to_string(),
            activation_date: t0(),
            expiration_date: t0() + expires_in,
            device_serial: "00000000abcdef01".to_string(),
        }
    }

    #[test]
    fn test_new_record_is_pending() {
        let r = SyncRecord::new("ABC123", t0(), "dev-1", Metadata::new());
        assert_eq!(r.status, RecordStatus::Pending);
        assert_eq!(r.retry_count, 0);
        assert!(r.last_attempt.is_none());
    }

    #[test]
    fn test_records_with_equal_fields_have_distinct_ids() {
        let a = SyncRecord::new("ABC123", t0(), "dev-1", Metadata::new());
        let b = SyncRecord::new("ABC123", t0(), "dev-1", Metadata::new());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_failed_attempts_reach_failed_at_limit() {
        let mut r = SyncRecord::new("ABC123", t0(), "dev-1", Metadata::new());

        assert_eq!(r.record_failed_attempt(t0(), 3).unwrap(), RecordStatus::Pending);
        assert_eq!(r.record_failed_attempt(t0(), 3).unwrap(), RecordStatus::Pending);
        assert_eq!(r.record_failed_attempt(t0(), 3).unwrap(), RecordStatus::Failed);
        assert_eq!(r.retry_count, 3);
        assert_eq!(r.last_attempt, Some(t0()));

        // Terminal: no further transitions
        assert!(r.record_failed_attempt(t0(), 3).is_err());
        assert!(r.mark_synced().is_err());
        assert_eq!(r.retry_count, 3);
    }

    #[test]
    fn test_synced_is_terminal() {
        let mut r = SyncRecord::new("ABC123", t0(), "dev-1", Metadata::new());
        r.mark_synced().unwrap();
        assert!(r.mark_failed().is_err());
        assert_eq!(r.status, RecordStatus::Synced);
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("pending".parse::<RecordStatus>().unwrap(), RecordStatus::Pending);
        assert_eq!("SYNCED".parse::<RecordStatus>().unwrap(), RecordStatus::Synced);
        assert_eq!(" failed ".parse::<RecordStatus>().unwrap(), RecordStatus::Failed);
        assert!("done".parse::<RecordStatus>().is_err());
    }

    #[test]
    fn test_metadata_rejects_reserved_keys() {
        let mut m = Metadata::new();
        assert!(m.insert("station", "gate-2").is_ok());
        assert!(m.insert("status", "x").is_err());
        assert!(m.insert("", "x").is_err());
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn test_metadata_json_column() {
        let m = Metadata::new().with("station", "gate-2").unwrap();
        assert_eq!(m.to_json(), r#"{"station":"gate-2"}"#);
        assert_eq!(Metadata::from_json(&m.to_json()).unwrap(), m);
        assert!(Metadata::from_json("").unwrap().is_empty());
        assert!(Metadata::from_json(r#"{"code":"x"}"#).is_err());
        assert!(Metadata::from_json("not json").is_err());
    }

    #[test]
    fn test_credential_validity_window() {
        let c = credential(Duration::days(30));
        assert!(c.is_valid_at(t0()));
        assert!(!c.is_valid_at(c.expiration_date));
        assert_eq!(c.days_until_expiry(t0()), 30);
        assert_eq!(c.days_until_expiry(t0() + Duration::days(40)), 0);
    }

    #[test]
    fn test_credential_needs_refresh_inside_24h() {
        assert!(!credential(Duration::hours(25)).needs_refresh(t0()));
        assert!(credential(Duration::hours(24)).needs_refresh(t0()));
        assert!(credential(Duration::hours(2)).needs_refresh(t0()));
    }

    #[test]
    fn test_refreshed_preserves_activation_date() {
        let c = credential(Duration::hours(2));
        let new_exp = t0() + Duration::days(30);
        let r = c.refreshed("tok-2", new_exp);
        assert_eq!(r.token, "tok-2");
        assert_eq!(r.expiration_date, new_exp);
        assert_eq!(r.activation_date, c.activation_date);
        assert_eq!(r.device_id, c.device_id);
        assert_eq!(r.device_serial, c.device_serial);
    }

    #[test]
    fn test_credential_accepts_naive_dates() {
        let json = r#"{
            "token": "abc",
            "device_id": "dev-9",
            "activation_date": "2025-01-01T08:00:00",
            "expiration_date": "2025-02-01T08:00:00.500000"
        }"#;
        let c: Credential = serde_json::from_str(json).unwrap();
        assert_eq!(c.activation_date, t0());
        assert_eq!(c.device_serial, "");
    }

    #[test]
    fn test_credential_missing_field_fails() {
        let json = r#"{"token": "abc", "device_id": "dev-9", "activation_date": "2025-01-01T08:00:00"}"#;
        assert!(serde_json::from_str::<Credential>(json).is_err());
    }

    #[test]
    fn test_activation_info_projection() {
        let c = credential(Duration::days(10));
        let info = ActivationInfo::project(Some(&c), t0());
        assert!(info.activated);
        assert_eq!(info.days_until_expiry, Some(10));
        assert!(info.token_exists);

        let expired = ActivationInfo::project(Some(&c), t0() + Duration::days(11));
        assert!(!expired.activated);
        assert_eq!(expired.days_until_expiry, Some(0));

        assert_eq!(ActivationInfo::project(None, t0()), ActivationInfo::default());
    }
}
