//! # Registration API Client
//!
//! JSON-over-HTTPS client for the remote registration service.
//!
//! ## Endpoints
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Remote API Surface                                 │
//! │                                                                         │
//! │  POST /activate        {activation_key, device_serial, device_type,    │
//! │                         platform, timestamp}                           │
//! │                    ──► {success, token, device_id, activation_date,    │
//! │                         expiration_date} | {success:false, message}    │
//! │                                                                         │
//! │  POST /status     🔑   {device_id, timestamp} ──► {valid, message?}    │
//! │  POST /register   🔑   {code, timestamp, device_id, metadata}          │
//! │                    ──► {success, message?}                             │
//! │  POST /refresh_token 🔑 {device_id, timestamp}                          │
//! │                    ──► {success, token|new_token,                      │
//! │                         expiration_date|new_expiration_date}           │
//! │  POST /deactivate 🔑   {device_id, timestamp} ──► {success, message?}  │
//! │                                                                         │
//! │  🔑 = Authorization: Bearer <token>                                    │
//! │                                                                         │
//! │  HTTP 200  → body decoded                                              │
//! │  HTTP 401  → SyncError::Unauthorized                                   │
//! │  other     → SyncError::HttpStatus                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! This layer only translates HTTP into typed results. Deciding what a
//! rejection means for local state is the caller's job.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use scanpoint_core::time::{format_timestamp, parse_timestamp};
use scanpoint_core::{Credential, Metadata, SyncRecord};

use crate::config::{join_url, ApiSettings, Endpoints};
use crate::error::{SyncError, SyncResult};

/// Longest error body kept in `SyncError::HttpStatus`.
const MAX_ERROR_BODY: usize = 256;

// =============================================================================
// Wire Types
// =============================================================================

#[derive(Debug, Serialize)]
pub struct ActivateRequest<'a> {
    pub activation_key: &'a str,
    pub device_serial: &'a str,
    pub device_type: &'a str,
    pub platform: &'a str,
    pub timestamp: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ActivateResponse {
    #[serde(default)]
    pub success: bool,
    pub token: Option<String>,
    pub device_id: Option<String>,
    pub activation_date: Option<String>,
    pub expiration_date: Option<String>,
    pub message: Option<String>,
}

impl ActivateResponse {
    /// Builds the credential from a successful response.
    ///
    /// Fails with `MalformedResponse` when a required field is absent or a
    /// date cannot be parsed. `activation_date` falls back to `now`.
    pub fn into_credential(self, device_serial: &str, now: DateTime<Utc>) -> SyncResult<Credential> {
        let token = required("token", self.token)?;
        let device_id = required("device_id", self.device_id)?;
        let expiration = required("expiration_date", self.expiration_date)?;

        let expiration_date = parse_timestamp("expiration_date", &expiration)
            .map_err(|e| SyncError::MalformedResponse(e.to_string()))?;
        let activation_date = match self.activation_date {
            Some(raw) => parse_timestamp("activation_date", &raw)
                .map_err(|e| SyncError::MalformedResponse(e.to_string()))?,
            None => now,
        };

        Ok(Credential {
            token,
            device_id,
            activation_date,
            expiration_date,
            device_serial: device_serial.to_string(),
        })
    }
}

/// Body shared by `/status`, `/refresh_token` and `/deactivate`.
#[derive(Debug, Serialize)]
pub struct DeviceRequest<'a> {
    pub device_id: &'a str,
    pub timestamp: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub valid: bool,
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterRequest<'a> {
    pub code: &'a str,
    pub timestamp: String,
    pub device_id: &'a str,
    pub metadata: &'a Metadata,
}

/// Generic `{success, message}` acknowledgement.
#[derive(Debug, Default, Deserialize)]
pub struct AckResponse {
    #[serde(default)]
    pub success: bool,
    pub message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RefreshResponse {
    #[serde(default)]
    pub success: bool,
    pub token: Option<String>,
    pub new_token: Option<String>,
    pub expiration_date: Option<String>,
    pub new_expiration_date: Option<String>,
    pub message: Option<String>,
}

impl RefreshResponse {
    /// Returns the new token and expiry, accepting either field spelling.
    pub fn grant(self) -> SyncResult<(String, DateTime<Utc>)> {
        let token = required("new_token", self.new_token.or(self.token))?;
        let raw = required(
            "new_expiration_date",
            self.new_expiration_date.or(self.expiration_date),
        )?;
        let expiration = parse_timestamp("expiration_date", &raw)
            .map_err(|e| SyncError::MalformedResponse(e.to_string()))?;
        Ok((token, expiration))
    }
}

fn required(field: &str, value: Option<String>) -> SyncResult<String> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| SyncError::MalformedResponse(format!("missing field '{}'", field)))
}

// =============================================================================
// Client
// =============================================================================

/// HTTP client for the registration API.
///
/// Cheap to clone; all clones share one connection pool.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    endpoints: Endpoints,
    request_timeout: Duration,
}

impl ApiClient {
    /// Creates a client from API settings.
    pub fn new(settings: &ApiSettings) -> SyncResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout())
            .user_agent(concat!("scanpoint-agent/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SyncError::InvalidConfig(format!("HTTP client: {}", e)))?;

        Ok(ApiClient {
            http,
            base_url: settings.base_url.clone(),
            endpoints: settings.endpoints.clone(),
            request_timeout: settings.request_timeout(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST /activate
    pub async fn activate(
        &self,
        request: &ActivateRequest<'_>,
    ) -> SyncResult<ActivateResponse> {
        self.post_json(&self.endpoints.activate, None, request).await
    }

    /// POST /status
    pub async fn check_status(
        &self,
        token: &str,
        device_id: &str,
        now: DateTime<Utc>,
    ) -> SyncResult<StatusResponse> {
        let body = DeviceRequest {
            device_id,
            timestamp: format_timestamp(&now),
        };
        self.post_json(&self.endpoints.status, Some(token), &body).await
    }

    /// POST /register
    ///
    /// `device_id` is the record's capture-time identity when present,
    /// otherwise the caller's current one.
    pub async fn register(
        &self,
        token: &str,
        device_id: &str,
        record: &SyncRecord,
    ) -> SyncResult<AckResponse> {
        let body = RegisterRequest {
            code: &record.code,
            timestamp: format_timestamp(&record.timestamp),
            device_id: if record.device_id.is_empty() {
                device_id
            } else {
                &record.device_id
            },
            metadata: &record.metadata,
        };
        self.post_json(&self.endpoints.register, Some(token), &body).await
    }

    /// POST /refresh_token
    pub async fn refresh(
        &self,
        token: &str,
        device_id: &str,
        now: DateTime<Utc>,
    ) -> SyncResult<RefreshResponse> {
        let body = DeviceRequest {
            device_id,
            timestamp: format_timestamp(&now),
        };
        self.post_json(&self.endpoints.refresh, Some(token), &body).await
    }

    /// POST /deactivate
    pub async fn deactivate(
        &self,
        token: &str,
        device_id: &str,
        now: DateTime<Utc>,
    ) -> SyncResult<AckResponse> {
        let body = DeviceRequest {
            device_id,
            timestamp: format_timestamp(&now),
        };
        self.post_json(&self.endpoints.deactivate, Some(token), &body).await
    }

    async fn post_json<B, R>(&self, path: &str, bearer: Option<&str>, body: &B) -> SyncResult<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = join_url(&self.base_url, path);
        debug!(url = %url, "POST");

        let mut request = self.http.post(&url).json(body);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            return Err(SyncError::Unauthorized);
        }

        if status != StatusCode::OK {
            let mut body = response.text().await.unwrap_or_default();
            truncate_at_char_boundary(&mut body, MAX_ERROR_BODY);
            return Err(SyncError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        response.json::<R>().await.map_err(|e| {
            if e.is_timeout() {
                SyncError::Timeout(self.request_timeout.as_secs())
            } else {
                SyncError::MalformedResponse(e.to_string())
            }
        })
    }

    fn transport_error(&self, err: reqwest::Error) -> SyncError {
        if err.is_timeout() {
            SyncError::Timeout(self.request_timeout.as_secs())
        } else {
            SyncError::ConnectionFailed(err.to_string())
        }
    }
}

fn truncate_at_char_boundary(s: &mut String, max: usize) {
    if s.len() <= max {
        return;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s.truncate(end);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_activate_response_into_credential() {
        let resp: ActivateResponse = serde_json::from_str(
            r#"{
                "success": true,
                "token": "tok",
                "device_id": "dev-1",
                "activation_date": "2025-01-01T08:00:00",
                "expiration_date": "2025-01-31T08:00:00Z"
            }"#,
        )
        .unwrap();

        let c = resp.into_credential("serial-1", now()).unwrap();
        assert_eq!(c.token, "tok");
        assert_eq!(c.device_serial, "serial-1");
        assert_eq!(c.activation_date, now());
        assert_eq!(c.days_until_expiry(now()), 30);
    }

    #[test]
    fn test_activate_response_missing_token() {
        let resp: ActivateResponse =
            serde_json::from_str(r#"{"success": true, "device_id": "d", "expiration_date": "2025-02-01T00:00:00"}"#)
                .unwrap();
        assert!(matches!(
            resp.into_credential("s", now()),
            Err(SyncError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_refresh_response_accepts_both_spellings() {
        let a: RefreshResponse = serde_json::from_str(
            r#"{"success": true, "new_token": "n1", "new_expiration_date": "2025-03-01T00:00:00"}"#,
        )
        .unwrap();
        assert_eq!(a.grant().unwrap().0, "n1");

        let b: RefreshResponse = serde_json::from_str(
            r#"{"success": true, "token": "n2", "expiration_date": "2025-03-01T00:00:00+00:00"}"#,
        )
        .unwrap();
        let (token, exp) = b.grant().unwrap();
        assert_eq!(token, "n2");
        assert_eq!(exp, Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap());

        let c: RefreshResponse = serde_json::from_str(r#"{"success": true}"#).unwrap();
        assert!(c.grant().is_err());
    }

    #[test]
    fn test_ack_defaults_to_failure() {
        let ack: AckResponse = serde_json::from_str("{}").unwrap();
        assert!(!ack.success);
    }

    #[test]
    fn test_register_body_shape() {
        let mut metadata = Metadata::new();
        metadata.insert("station", "gate-2").unwrap();
        let body = RegisterRequest {
            code: "ABC",
            timestamp: format_timestamp(&now()),
            device_id: "dev-1",
            metadata: &metadata,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["code"], "ABC");
        assert_eq!(json["device_id"], "dev-1");
        assert_eq!(json["metadata"]["station"], "gate-2");
        assert_eq!(json["timestamp"], "2025-01-01T08:00:00+00:00");
    }

    #[test]
    fn test_truncate_keeps_utf8_valid() {
        let mut s = "é".repeat(200);
        truncate_at_char_boundary(&mut s, 255);
        assert!(s.len() <= 255);
        assert!(s.chars().all(|c| c == 'é'));
    }
}
