//! Shared fixtures for the API-backed integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};
use tempfile::TempDir;
use wiremock::MockServer;

use scanpoint_core::{Clock, Credential};
use scanpoint_store::{CredentialRepository, QueueRepository, Storage, StorageConfig};
use scanpoint_sync::config::ApiSettings;
use scanpoint_sync::{
    ActivationManager, ApiClient, DeviceIdentity, StaticProbe, SyncEngine, SyncEngineBuilder,
    SyncSettings,
};

pub const TOKEN: &str = "tok-abc";
pub const DEVICE_ID: &str = "dev-1";
pub const SERIAL: &str = "serial-1";

/// 2025-01-01T08:00:00Z
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap()
}

/// Clock that only moves when told to.
pub struct TestClock(Mutex<DateTime<Utc>>);

impl TestClock {
    pub fn at(now: DateTime<Utc>) -> Arc<Self> {
        Arc::new(TestClock(Mutex::new(now)))
    }

    pub fn advance(&self, by: Duration) {
        *self.0.lock().unwrap() += by;
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}

/// Mock API, data dir and collaborators wired together.
pub struct Harness {
    pub server: MockServer,
    pub dir: TempDir,
    pub storage: Storage,
    pub clock: Arc<TestClock>,
    pub probe: Arc<StaticProbe>,
    pub api: ApiClient,
    pub activation: Arc<ActivationManager>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_api_settings(|_| {}).await
    }

    pub async fn with_api_settings(tweak: impl FnOnce(&mut ApiSettings)) -> Self {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let storage = Storage::open(StorageConfig::new(dir.path())).unwrap();

        let mut settings = ApiSettings {
            base_url: server.uri(),
            ..Default::default()
        };
        tweak(&mut settings);
        let api = ApiClient::new(&settings).unwrap();

        let clock = TestClock::at(t0());
        let activation = Arc::new(ActivationManager::new(
            api.clone(),
            storage.credentials(),
            DeviceIdentity::with_serial(SERIAL),
            clock.clone(),
        ));

        Harness {
            server,
            dir,
            storage,
            clock,
            probe: Arc::new(StaticProbe::new(true)),
            api,
            activation,
        }
    }

    pub fn credentials(&self) -> CredentialRepository {
        self.storage.credentials()
    }

    pub fn queue(&self) -> QueueRepository {
        self.storage.queue()
    }

    /// Writes a credential expiring `expires_in` after t0 and loads it.
    pub async fn seed_credential(&self, expires_in: Duration) {
        let credential = Credential {
            token: TOKEN.to_string(),
            device_id: DEVICE_ID.to_string(),
            activation_date: t0() - Duration::days(1),
            expiration_date: t0() + expires_in,
            device_serial: SERIAL.to_string(),
        };
        self.credentials().save(&credential).unwrap();
        assert!(self.activation.load().await);
    }

    /// Sync settings with no pause between records.
    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            inter_record_delay_ms: 0,
            ..Default::default()
        }
    }

    pub async fn engine(&self) -> SyncEngine {
        self.engine_with(self.sync_settings()).await
    }

    pub async fn engine_with(&self, settings: SyncSettings) -> SyncEngine {
        SyncEngineBuilder::new(settings)
            .with_api(self.api.clone())
            .with_activation(self.activation.clone())
            .with_queue(self.queue())
            .with_probe(self.probe.clone())
            .with_clock(self.clock.clone())
            .build()
            .await
            .unwrap()
    }

    /// Requests the mock server has seen on `path`.
    pub async fn requests_to(&self, path: &str) -> usize {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter(|r| r.url.path() == path)
            .count()
    }
}
