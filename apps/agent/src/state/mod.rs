//! # Agent State
//!
//! Everything a command needs, assembled once from [`AgentConfig`].
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    AgentState::init(config)                             │
//! │                                                                         │
//! │  Storage::open(data_dir) ──► token.json + pending.csv                  │
//! │         │                                                               │
//! │  ApiClient::new(api) ───────────────┐                                   │
//! │         │                           ▼                                   │
//! │  ActivationManager::open(api, credentials, identity, clock)            │
//! │         │                                                               │
//! │  HttpProbe::from_settings(api)      │                                   │
//! │         ▼                           ▼                                   │
//! │  SyncEngineBuilder ... .with_sink(ConsoleSink) .build()                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod sink;

use std::sync::Arc;

use tracing::{debug, info};

use scanpoint_core::{Clock, SystemClock};
use scanpoint_store::Storage;
use scanpoint_sync::{
    ActivationManager, AgentConfig, ApiClient, DeviceIdentity, HttpProbe, SyncEngine,
    SyncEngineBuilder, SyncEventSink, SyncResult,
};

pub use sink::ConsoleSink;

/// Long-lived collaborators shared by all commands.
pub struct AgentState {
    pub config: AgentConfig,
    pub storage: Storage,
    pub clock: Arc<dyn Clock>,
    pub activation: Arc<ActivationManager>,
    pub engine: SyncEngine,
}

impl AgentState {
    /// Opens storage, loads the credential and the queue.
    pub async fn init(config: AgentConfig) -> SyncResult<Self> {
        Self::init_with_sink(config, Arc::new(ConsoleSink)).await
    }

    /// Same as [`init`](Self::init) with a custom event sink.
    pub async fn init_with_sink(
        config: AgentConfig,
        sink: Arc<dyn SyncEventSink>,
    ) -> SyncResult<Self> {
        let storage = Storage::open(config.storage.storage_config())?;
        debug!(data_dir = %storage.data_dir().display(), "Storage opened");

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let api = ApiClient::new(&config.api)?;
        let identity = DeviceIdentity::detect(&config.device);
        info!(serial = %identity.serial, "Device identity resolved");

        let activation = Arc::new(
            ActivationManager::open(api.clone(), storage.credentials(), identity, clock.clone())
                .await,
        );

        let probe = Arc::new(HttpProbe::from_settings(&config.api)?);
        let engine = SyncEngineBuilder::new(config.sync.clone())
            .with_api(api)
            .with_activation(activation.clone())
            .with_queue(storage.queue())
            .with_probe(probe)
            .with_clock(clock.clone())
            .with_sink(sink)
            .build()
            .await?;

        Ok(AgentState {
            config,
            storage,
            clock,
            activation,
            engine,
        })
    }
}
