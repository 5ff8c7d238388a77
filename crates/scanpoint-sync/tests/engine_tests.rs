mod common;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;

use chrono::Duration;
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, ResponseTemplate};

use common::{t0, Harness, DEVICE_ID, TOKEN};
use scanpoint_core::{Metadata, RecordStatus};
use scanpoint_store::QueueRepository;
use scanpoint_sync::{ConnectivityProbe, SyncEngineBuilder, SyncSettings};

fn register_ok() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"success": true}))
}

async fn mount_register(h: &Harness, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path("/register"))
        .respond_with(response)
        .mount(&h.server)
        .await;
}

// ── end-to-end scenarios ────────────────────────────────────────

#[tokio::test]
async fn offline_then_online_delivers_and_removes_file() {
    let h = Harness::new().await;
    h.seed_credential(Duration::days(30)).await;
    h.probe.set_reachable(false);
    let engine = h.engine().await;

    assert!(engine.add_code("ABC123", t0(), None).await);
    let queued = engine.pending_codes().await;
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].status, RecordStatus::Pending);
    assert_eq!(queued[0].retry_count, 0);
    assert_eq!(queued[0].device_id, DEVICE_ID);
    assert!(h.queue().exists());

    Mock::given(method("POST"))
        .and(path("/register"))
        .and(header("authorization", format!("Bearer {}", TOKEN).as_str()))
        .and(body_partial_json(json!({
            "code": "ABC123",
            "device_id": DEVICE_ID,
            "timestamp": "2025-01-01T08:00:00+00:00",
            "metadata": {}
        })))
        .respond_with(register_ok())
        .expect(1)
        .mount(&h.server)
        .await;

    h.probe.set_reachable(true);
    let report = engine.sync_all_pending().await;

    assert_eq!(report.synced, 1);
    assert!(report.persisted);
    assert!(engine.pending_codes().await.is_empty());
    assert!(!h.queue().exists());
    assert!(engine.sync_status().await.last_sync.is_some());
}

#[tokio::test]
async fn always_failing_remote_exhausts_retries() {
    let h = Harness::new().await;
    h.seed_credential(Duration::days(30)).await;
    mount_register(&h, ResponseTemplate::new(500)).await;

    let engine = h
        .engine_with(SyncSettings {
            max_retries: 3,
            ..h.sync_settings()
        })
        .await;
    h.probe.set_reachable(false);
    engine.add_code("ABC123", t0(), None).await;
    h.probe.set_reachable(true);

    for pass in 1..=3u32 {
        let report = engine.sync_all_pending().await;
        assert_eq!(report.attempted, 1);
        let record = engine.pending_codes().await[0].clone();
        assert_eq!(record.retry_count, pass);
        assert_eq!(record.last_attempt, Some(t0()));
    }

    let record = engine.pending_codes().await[0].clone();
    assert_eq!(record.status, RecordStatus::Failed);
    assert_eq!(record.retry_count, 3);
    assert_eq!(h.requests_to("/register").await, 3);

    // Terminal: the fourth pass sends nothing
    let report = engine.sync_all_pending().await;
    assert_eq!(report.attempted, 0);
    assert_eq!(h.requests_to("/register").await, 3);

    let status = engine.sync_status().await;
    assert_eq!(status.pending_count, 1);
    assert_eq!(status.failed_count, 1);

    // Failed state is on disk too
    let stored = h.queue().load_all().unwrap();
    assert_eq!(stored[0].status, RecordStatus::Failed);
    assert_eq!(stored[0].retry_count, 3);
}

#[tokio::test]
async fn second_pass_is_a_no_op() {
    let h = Harness::new().await;
    h.seed_credential(Duration::days(30)).await;
    mount_register(&h, register_ok()).await;
    h.probe.set_reachable(false);
    let engine = h.engine().await;
    engine.add_code("A", t0(), None).await;
    engine.add_code("B", t0(), None).await;
    h.probe.set_reachable(true);

    let first = engine.sync_all_pending().await;
    assert_eq!(first.synced, 2);

    let second = engine.sync_all_pending().await;
    assert_eq!(second.attempted, 0);
    assert_eq!(h.requests_to("/register").await, 2);
}

#[tokio::test]
async fn queue_survives_restart() {
    let h = Harness::new().await;
    h.seed_credential(Duration::days(30)).await;
    mount_register(&h, ResponseTemplate::new(502)).await;

    let ids = {
        let engine = h.engine().await;
        h.probe.set_reachable(false);
        engine.add_code("A", t0(), None).await;
        let metadata = Metadata::new().with("station", "gate-2").unwrap();
        engine.add_code("B", t0(), Some(metadata)).await;
        h.probe.set_reachable(true);
        engine.sync_all_pending().await;
        engine
            .pending_codes()
            .await
            .iter()
            .map(|r| r.id)
            .collect::<Vec<_>>()
    };

    let restarted = h.engine().await;
    let records = restarted.pending_codes().await;
    assert_eq!(records.iter().map(|r| r.id).collect::<Vec<_>>(), ids);
    assert!(records.iter().all(|r| r.retry_count == 1));
    assert_eq!(records[1].metadata.get("station"), Some("gate-2"));
}

#[tokio::test]
async fn unauthorized_register_revokes_and_counts_attempt() {
    let h = Harness::new().await;
    h.seed_credential(Duration::days(30)).await;
    mount_register(&h, ResponseTemplate::new(401)).await;
    h.probe.set_reachable(false);
    let engine = h.engine().await;
    engine.add_code("A", t0(), None).await;
    engine.add_code("B", t0(), None).await;
    h.probe.set_reachable(true);

    let report = engine.sync_all_pending().await;

    // Second record finds no credential: not an attempt
    assert_eq!(report.synced, 0);
    assert_eq!(h.requests_to("/register").await, 1);
    assert!(!h.activation.is_activated().await);
    assert!(!h.credentials().exists());

    let retries: Vec<u32> = engine
        .pending_codes()
        .await
        .iter()
        .map(|r| r.retry_count)
        .collect();
    assert_eq!(retries, vec![1, 0]);
}

#[tokio::test]
async fn server_rejection_counts_as_failed_attempt() {
    let h = Harness::new().await;
    h.seed_credential(Duration::days(30)).await;
    mount_register(
        &h,
        ResponseTemplate::new(200).set_body_json(json!({"success": false, "message": "duplicate"})),
    )
    .await;
    let engine = h.engine().await;
    h.probe.set_reachable(false);
    engine.add_code("A", t0(), None).await;
    h.probe.set_reachable(true);

    assert_eq!(engine.force_sync().await, (0, 1));
    assert_eq!(engine.pending_codes().await[0].retry_count, 1);
}

// ── gate ────────────────────────────────────────────────────────

#[tokio::test]
async fn force_sync_respects_gate() {
    let h = Harness::new().await;
    mount_register(&h, register_ok()).await;
    let engine = h.engine().await;

    // Empty set
    assert_eq!(engine.force_sync().await, (0, 0));

    // Not activated
    engine.add_code("A", t0(), None).await;
    engine.add_code("B", t0(), None).await;
    assert_eq!(engine.force_sync().await, (0, 2));

    // Activated but unreachable
    h.seed_credential(Duration::days(30)).await;
    h.probe.set_reachable(false);
    assert_eq!(engine.force_sync().await, (0, 2));
    assert!(!engine.sync_status().await.online);

    assert_eq!(h.requests_to("/register").await, 0);

    h.probe.set_reachable(true);
    assert_eq!(engine.force_sync().await, (2, 0));
    assert!(engine.sync_status().await.online);
}

#[tokio::test]
async fn records_captured_before_activation_use_current_device_id() {
    let h = Harness::new().await;
    Mock::given(method("POST"))
        .and(path("/register"))
        .and(body_partial_json(json!({"device_id": DEVICE_ID})))
        .respond_with(register_ok())
        .expect(1)
        .mount(&h.server)
        .await;
    let engine = h.engine().await;

    engine.add_code("EARLY", t0(), None).await;
    assert_eq!(engine.pending_codes().await[0].device_id, "");

    h.seed_credential(Duration::days(30)).await;
    assert_eq!(engine.sync_all_pending().await.synced, 1);
}

// ── immediate path ──────────────────────────────────────────────

#[tokio::test]
async fn online_capture_is_queued_for_immediate_send() {
    let h = Harness::new().await;
    h.seed_credential(Duration::days(30)).await;
    mount_register(&h, register_ok()).await;
    let engine = h.engine().await;

    engine.add_code("NOW", t0(), None).await;
    assert_eq!(engine.sync_status().await.queue_size, 1);

    let report = engine.drain_immediate().await;
    assert_eq!(report.synced, 1);
    assert_eq!(engine.sync_status().await.queue_size, 0);
    assert!(engine.pending_codes().await.is_empty());
}

/// Reachable, but only after a long wait.
struct SluggishProbe(StdDuration);

#[async_trait]
impl ConnectivityProbe for SluggishProbe {
    async fn is_reachable(&self) -> bool {
        tokio::time::sleep(self.0).await;
        true
    }
}

#[tokio::test]
async fn capture_does_not_wait_for_connectivity_check() {
    let h = Harness::new().await;
    h.seed_credential(Duration::days(30)).await;
    mount_register(&h, register_ok()).await;
    let engine = SyncEngineBuilder::new(h.sync_settings())
        .with_api(h.api.clone())
        .with_activation(h.activation.clone())
        .with_queue(h.queue())
        .with_probe(Arc::new(SluggishProbe(StdDuration::from_secs(3))))
        .with_clock(h.clock.clone())
        .build()
        .await
        .unwrap();

    let started = std::time::Instant::now();
    assert!(engine.add_code("X1", t0(), None).await);
    assert!(started.elapsed() < StdDuration::from_secs(1));

    assert!(h.queue().exists());
    assert_eq!(engine.sync_status().await.queue_size, 1);
    assert_eq!(h.requests_to("/register").await, 0);

    // The gate is applied when the immediate queue is drained
    let report = engine.drain_immediate().await;
    assert_eq!(report.synced, 1);
    assert!(engine.pending_codes().await.is_empty());
}

#[tokio::test]
async fn records_added_during_a_pass_are_kept() {
    let h = Harness::new().await;
    h.seed_credential(Duration::days(30)).await;
    mount_register(&h, register_ok().set_delay(StdDuration::from_millis(300))).await;
    h.probe.set_reachable(false);
    let engine = h.engine().await;
    engine.add_code("FIRST", t0(), None).await;
    h.probe.set_reachable(true);

    let pass = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.sync_all_pending().await })
    };
    tokio::time::sleep(StdDuration::from_millis(100)).await;
    h.probe.set_reachable(false);
    assert!(engine.add_code("SECOND", t0(), None).await);

    let report = pass.await.unwrap();
    assert_eq!(report.synced, 1);

    let remaining: Vec<String> = engine
        .pending_codes()
        .await
        .into_iter()
        .map(|r| r.code)
        .collect();
    assert_eq!(remaining, vec!["SECOND".to_string()]);

    let on_disk: Vec<String> = h
        .queue()
        .load_all()
        .unwrap()
        .into_iter()
        .map(|r| r.code)
        .collect();
    assert_eq!(on_disk, vec!["SECOND".to_string()]);
}

// ── collaborator API ────────────────────────────────────────────

#[tokio::test]
async fn clear_failed_and_export() {
    let h = Harness::new().await;
    h.seed_credential(Duration::days(30)).await;
    mount_register(&h, ResponseTemplate::new(500)).await;
    let engine = h
        .engine_with(SyncSettings {
            max_retries: 1,
            ..h.sync_settings()
        })
        .await;

    h.probe.set_reachable(false);
    engine.add_code("DOOMED", t0(), None).await;
    h.probe.set_reachable(true);
    engine.sync_all_pending().await;

    h.probe.set_reachable(false);
    engine.add_code("KEEP", t0(), None).await;
    assert_eq!(engine.sync_status().await.failed_count, 1);

    let dest = h.dir.path().join("export").join("pending-export.csv");
    assert!(engine.export_pending_data(&dest).await.unwrap());
    assert_eq!(QueueRepository::new(&dest).load_all().unwrap().len(), 2);

    assert_eq!(engine.clear_failed_codes().await.unwrap(), 1);
    let remaining = engine.pending_codes().await;
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].code, "KEEP");
    assert_eq!(h.queue().load_all().unwrap().len(), 1);
}

// ── background loop ─────────────────────────────────────────────

#[tokio::test]
async fn background_loop_syncs_on_startup_and_stops() {
    let h = Harness::new().await;
    h.seed_credential(Duration::days(30)).await;
    mount_register(&h, register_ok()).await;
    h.probe.set_reachable(false);
    let engine = h.engine().await;
    engine.add_code("A", t0(), None).await;
    engine.add_code("B", t0(), None).await;
    h.probe.set_reachable(true);

    engine.start().await.unwrap();
    assert!(engine.sync_status().await.running);

    let mut waited = 0;
    while !engine.pending_codes().await.is_empty() && waited < 50 {
        tokio::time::sleep(StdDuration::from_millis(100)).await;
        waited += 1;
    }
    assert!(engine.pending_codes().await.is_empty());
    assert!(!h.queue().exists());

    engine.stop().await.unwrap();
    assert!(!engine.sync_status().await.running);
}

#[tokio::test]
async fn background_loop_sends_immediate_codes() {
    let h = Harness::new().await;
    h.seed_credential(Duration::days(30)).await;
    mount_register(&h, register_ok()).await;
    let engine = h
        .engine_with(SyncSettings {
            sync_on_startup: false,
            ..h.sync_settings()
        })
        .await;

    engine.start().await.unwrap();
    engine.add_code("LIVE", t0(), None).await;

    let mut waited = 0;
    while !engine.pending_codes().await.is_empty() && waited < 50 {
        tokio::time::sleep(StdDuration::from_millis(100)).await;
        waited += 1;
    }
    assert!(engine.pending_codes().await.is_empty());
    assert_eq!(h.requests_to("/register").await, 1);

    engine.stop().await.unwrap();
}
