mod common;

use chrono::Duration;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, ResponseTemplate};

use common::{Harness, DEVICE_ID, SERIAL, TOKEN};
use scanpoint_sync::SyncError;

fn activation_ok() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "success": true,
        "token": "fresh-token",
        "device_id": "dev-42",
        "activation_date": "2025-01-01T08:00:00",
        "expiration_date": "2025-01-31T08:00:00"
    }))
}

// ── activate ────────────────────────────────────────────────────

#[tokio::test]
async fn activate_persists_credential() {
    let h = Harness::new().await;
    Mock::given(method("POST"))
        .and(path("/activate"))
        .and(body_partial_json(json!({
            "activation_key": "KEY-123",
            "device_serial": SERIAL,
            "device_type": "raspberry_pi",
            "platform": "linux"
        })))
        .respond_with(activation_ok())
        .expect(1)
        .mount(&h.server)
        .await;

    let message = h.activation.activate("  KEY-123 ").await.unwrap();
    assert!(message.contains("dev-42"));
    assert!(h.activation.is_activated().await);

    let info = h.activation.activation_info().await;
    assert_eq!(info.device_id.as_deref(), Some("dev-42"));
    assert_eq!(info.days_until_expiry, Some(30));
    assert!(info.token_exists);

    let stored = h.credentials().load().unwrap().unwrap();
    assert_eq!(stored.token, "fresh-token");
    assert_eq!(stored.device_serial, SERIAL);
}

#[tokio::test]
async fn activated_credential_survives_restart() {
    let h = Harness::new().await;
    Mock::given(method("POST"))
        .and(path("/activate"))
        .respond_with(activation_ok())
        .mount(&h.server)
        .await;
    h.activation.activate("KEY-123").await.unwrap();

    let restarted = scanpoint_sync::ActivationManager::open(
        h.api.clone(),
        h.credentials(),
        scanpoint_sync::DeviceIdentity::with_serial(SERIAL),
        h.clock.clone(),
    )
    .await;
    assert!(restarted.is_activated().await);
    assert_eq!(restarted.device_id().await.as_deref(), Some("dev-42"));
}

#[tokio::test]
async fn rejected_activation_keeps_existing_state() {
    let h = Harness::new().await;
    h.seed_credential(Duration::days(10)).await;
    Mock::given(method("POST"))
        .and(path("/activate"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"success": false, "message": "Invalid key"})),
        )
        .mount(&h.server)
        .await;

    match h.activation.activate("BAD").await {
        Err(SyncError::Rejected(message)) => assert_eq!(message, "Invalid key"),
        other => panic!("expected rejection, got {:?}", other),
    }

    assert_eq!(h.activation.device_id().await.as_deref(), Some(DEVICE_ID));
    assert_eq!(h.credentials().load().unwrap().unwrap().token, TOKEN);
}

#[tokio::test]
async fn activation_failures_are_typed() {
    let h = Harness::new().await;
    Mock::given(method("POST"))
        .and(path("/activate"))
        .and(body_partial_json(json!({"activation_key": "SERVER-DOWN"})))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/activate"))
        .and(body_partial_json(json!({"activation_key": "GARBLED"})))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&h.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/activate"))
        .and(body_partial_json(json!({"activation_key": "NO-TOKEN"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"success": true, "device_id": "d", "expiration_date": "2025-02-01T00:00:00"})),
        )
        .mount(&h.server)
        .await;

    match h.activation.activate("SERVER-DOWN").await {
        Err(SyncError::HttpStatus { status, body }) => {
            assert_eq!(status, 503);
            assert_eq!(body, "maintenance");
        }
        other => panic!("expected HTTP error, got {:?}", other),
    }
    assert!(matches!(
        h.activation.activate("GARBLED").await,
        Err(SyncError::MalformedResponse(_))
    ));
    assert!(matches!(
        h.activation.activate("NO-TOKEN").await,
        Err(SyncError::MalformedResponse(_))
    ));

    assert!(!h.activation.is_activated().await);
    assert!(!h.credentials().exists());
}

#[tokio::test]
async fn activation_times_out() {
    let h = Harness::with_api_settings(|api| api.request_timeout_secs = 1).await;
    Mock::given(method("POST"))
        .and(path("/activate"))
        .respond_with(activation_ok().set_delay(std::time::Duration::from_secs(3)))
        .mount(&h.server)
        .await;

    let err = h.activation.activate("KEY-123").await.unwrap_err();
    assert!(matches!(err, SyncError::Timeout(1)));
    assert!(err.is_retryable());
    assert!(!h.credentials().exists());
}

#[tokio::test]
async fn unreachable_server_is_connection_failure() {
    let h = Harness::with_api_settings(|api| api.base_url = "http://127.0.0.1:9".into()).await;
    let err = h.activation.activate("KEY-123").await.unwrap_err();
    assert!(matches!(err, SyncError::ConnectionFailed(_)));
}

// ── validate_remote ─────────────────────────────────────────────

#[tokio::test]
async fn validate_remote_sends_bearer_and_device_id() {
    let h = Harness::new().await;
    h.seed_credential(Duration::days(10)).await;
    Mock::given(method("POST"))
        .and(path("/status"))
        .and(header("authorization", format!("Bearer {}", TOKEN).as_str()))
        .and(body_partial_json(json!({"device_id": DEVICE_ID})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"valid": true})))
        .expect(1)
        .mount(&h.server)
        .await;

    assert!(h.activation.validate_remote().await.is_ok());
    assert!(h.activation.is_activated().await);
}

#[tokio::test]
async fn invalid_status_keeps_credential() {
    let h = Harness::new().await;
    h.seed_credential(Duration::days(10)).await;
    Mock::given(method("POST"))
        .and(path("/status"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"valid": false, "message": "suspended"})),
        )
        .mount(&h.server)
        .await;

    assert!(matches!(
        h.activation.validate_remote().await,
        Err(SyncError::Rejected(ref m)) if m == "suspended"
    ));
    assert!(h.activation.is_activated().await);
    assert!(h.credentials().exists());
}

#[tokio::test]
async fn unauthorized_status_revokes_credential() {
    let h = Harness::new().await;
    h.seed_credential(Duration::days(10)).await;
    Mock::given(method("POST"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&h.server)
        .await;

    assert!(matches!(
        h.activation.validate_remote().await,
        Err(SyncError::Unauthorized)
    ));
    assert!(!h.activation.is_activated().await);
    assert!(!h.credentials().exists());
}

#[tokio::test]
async fn status_server_error_leaves_state() {
    let h = Harness::new().await;
    h.seed_credential(Duration::days(10)).await;
    Mock::given(method("POST"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&h.server)
        .await;

    assert!(matches!(
        h.activation.validate_remote().await,
        Err(SyncError::HttpStatus { status: 500, .. })
    ));
    assert!(h.activation.is_activated().await);
}

// ── refresh ─────────────────────────────────────────────────────

#[tokio::test]
async fn refresh_replaces_token_and_expiry_only() {
    let h = Harness::new().await;
    h.seed_credential(Duration::hours(12)).await;
    let before = h.credentials().load().unwrap().unwrap();

    Mock::given(method("POST"))
        .and(path("/refresh_token"))
        .and(header("authorization", format!("Bearer {}", TOKEN).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "new_token": "rotated",
            "new_expiration_date": "2025-02-01T08:00:00Z"
        })))
        .expect(1)
        .mount(&h.server)
        .await;

    h.activation.refresh().await.unwrap();

    let after = h.credentials().load().unwrap().unwrap();
    assert_eq!(after.token, "rotated");
    assert_eq!(after.activation_date, before.activation_date);
    assert_eq!(after.device_id, before.device_id);
    assert_eq!(after.device_serial, before.device_serial);
    assert_eq!(h.activation.activation_info().await.days_until_expiry, Some(31));
    assert_eq!(
        h.activation.bearer().await,
        Some(("rotated".to_string(), DEVICE_ID.to_string()))
    );
}

#[tokio::test]
async fn refresh_not_due_makes_no_request() {
    let h = Harness::new().await;
    h.seed_credential(Duration::days(3)).await;
    Mock::given(method("POST"))
        .and(path("/refresh_token"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&h.server)
        .await;

    assert!(h.activation.refresh().await.is_ok());
}

#[tokio::test]
async fn unauthorized_refresh_revokes_credential() {
    let h = Harness::new().await;
    h.seed_credential(Duration::hours(2)).await;
    Mock::given(method("POST"))
        .and(path("/refresh_token"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&h.server)
        .await;

    assert!(matches!(h.activation.refresh().await, Err(SyncError::Unauthorized)));
    assert!(!h.activation.is_activated().await);
    assert!(!h.credentials().exists());
}

// ── deactivate / expiry ─────────────────────────────────────────

#[tokio::test]
async fn deactivate_clears_even_when_server_fails() {
    let h = Harness::new().await;
    h.seed_credential(Duration::days(10)).await;
    Mock::given(method("POST"))
        .and(path("/deactivate"))
        .and(header("authorization", format!("Bearer {}", TOKEN).as_str()))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&h.server)
        .await;

    h.activation.deactivate().await.unwrap();
    assert!(!h.activation.is_activated().await);
    assert!(!h.credentials().exists());
}

#[tokio::test]
async fn deactivate_without_credential_is_local_only() {
    let h = Harness::new().await;
    h.activation.deactivate().await.unwrap();
    assert_eq!(h.requests_to("/deactivate").await, 0);
}

#[tokio::test]
async fn expiry_is_observed_and_purged() {
    let h = Harness::new().await;
    h.seed_credential(Duration::hours(1)).await;
    Mock::given(method("POST"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"valid": true})))
        .expect(0)
        .mount(&h.server)
        .await;

    h.clock.advance(Duration::hours(1));

    // now == expiration_date is already invalid
    assert!(!h.activation.is_activated().await);
    assert!(!h.credentials().exists());
    assert!(matches!(
        h.activation.validate_remote().await,
        Err(SyncError::NotActivated)
    ));
}
