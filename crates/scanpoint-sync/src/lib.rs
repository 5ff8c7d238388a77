//! # scanpoint-sync: Activation and Delivery for the Scanpoint Agent
//!
//! Everything that talks to the registration API, and the policy that
//! decides when it may.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Sync Layer Architecture                          │
//! │                                                                         │
//! │  BarcodeSource ──► SyncEngine::add_code ──► QueueRepository (fsync)    │
//! │  (scanner.rs)            │                                              │
//! │                          ▼                                              │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                         SyncEngine                               │  │
//! │  │                                                                  │  │
//! │  │  • Pending set + immediate queue                                 │  │
//! │  │  • Per-record retry bound, terminal `failed` state               │  │
//! │  │  • Background loop with backoff while the gate is closed         │  │
//! │  └─────────────┬───────────────────────────────┬────────────────────┘  │
//! │                │ gate                          │ POST /register         │
//! │                ▼                               ▼                        │
//! │  ┌────────────────────────┐  ┌──────────────────────────────────────┐  │
//! │  │ ActivationManager      │  │ ApiClient                            │  │
//! │  │ + ConnectivityProbe    │  │                                      │  │
//! │  │                        │  │ reqwest, JSON bodies, bearer token   │  │
//! │  │ credential lifecycle,  │──►│ 401 ⇒ SyncError::Unauthorized       │  │
//! │  │ expiry, 401 revocation │  │                                      │  │
//! │  └────────────────────────┘  └──────────────────────────────────────┘  │
//! │                                                                         │
//! │  EVENTS (to the front end via SyncEventSink):                          │
//! │  • status     - pending / failed counts, online flag, last sync        │
//! │  • code_added - a scan reached disk                                    │
//! │  • pass       - per-pass report                                        │
//! │  • error      - operator-visible failures                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`activation`] - Credential lifecycle (`ActivationManager`)
//! - [`api`] - Registration API client and wire types
//! - [`config`] - Agent configuration (TOML + `SCANPOINT_*` env)
//! - [`device`] - Hardware identity
//! - [`engine`] - Offline queue and delivery loop (`SyncEngine`)
//! - [`error`] - Sync error types
//! - [`probe`] - Connectivity probe
//! - [`scanner`] - Barcode sources

// =============================================================================
// Module Declarations
// =============================================================================

pub mod activation;
pub mod api;
pub mod config;
pub mod device;
pub mod engine;
pub mod error;
pub mod probe;
pub mod scanner;

// =============================================================================
// Re-exports
// =============================================================================

pub use activation::ActivationManager;
pub use api::ApiClient;
pub use config::{AgentConfig, ScannerMode, SyncSettings};
pub use device::DeviceIdentity;
pub use engine::{
    NoOpSink, SyncEngine, SyncEngineBuilder, SyncEventSink, SyncReport, SyncStatus,
};
pub use error::{ErrorCategory, SyncError, SyncResult};
pub use probe::{ConnectivityProbe, HttpProbe, StaticProbe};
pub use scanner::{open_source, BarcodeSource, KeyboardWedgeSource, SimulatedSource};
