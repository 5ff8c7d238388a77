//! # scanpoint-store: Durable Local State for the Scanpoint Agent
//!
//! File-backed persistence for the two pieces of state that must survive a
//! power cut: the queue of scans not yet delivered, and the device
//! credential.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Scanpoint Agent Data Flow                          │
//! │                                                                         │
//! │  SyncEngine::add_code / ActivationManager::activate                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  scanpoint-store (THIS CRATE)                   │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────────┐                  │   │
//! │  │   │   Storage     │    │   Repositories     │                  │   │
//! │  │   │  (store.rs)   │    │                    │                  │   │
//! │  │   │               │    │ QueueRepository    │                  │   │
//! │  │   │ data_dir      │◄───│ CredentialRepo     │                  │   │
//! │  │   │ file layout   │    │                    │                  │   │
//! │  │   └───────────────┘    └────────────────────┘                  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │   <data_dir>/pending.csv          <data_dir>/token.json         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`store`] - Data directory and file layout
//! - [`error`] - Storage error types
//! - [`repository`] - Queue and credential repositories
//!
//! ## Usage
//!
//! ```rust,no_run
//! use scanpoint_store::{Storage, StorageConfig};
//!
//! # fn main() -> Result<(), scanpoint_store::StoreError> {
//! let storage = Storage::open(StorageConfig::new("/var/lib/scanpoint"))?;
//!
//! let pending = storage.queue().load_all()?;
//! let credential = storage.credentials().load()?;
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod repository;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{StoreError, StoreResult};
pub use store::{Storage, StorageConfig};

pub use repository::credential::CredentialRepository;
pub use repository::queue::{QueueRepository, QUEUE_HEADER};
