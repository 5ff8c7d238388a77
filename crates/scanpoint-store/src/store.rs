//! # Storage Layout
//!
//! Resolves where the agent's files live and hands out repositories.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Data Directory                                  │
//! │                                                                         │
//! │  Agent Startup                                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  StorageConfig::new(data_dir) ← File names (defaults below)            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Storage::open(config) ← Creates data_dir if missing                   │
//! │       │                                                                 │
//! │       ├──► storage.queue()        → QueueRepository  (pending.csv)     │
//! │       └──► storage.credentials()  → CredentialRepository (token.json)  │
//! │                                                                         │
//! │  Repositories are cheap path handles. They hold no open file, so a     │
//! │  crash between two calls leaves nothing half-open.                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{StoreError, StoreResult};
use crate::repository::credential::CredentialRepository;
use crate::repository::queue::QueueRepository;

/// Default credential file name inside the data directory.
pub const DEFAULT_CREDENTIAL_FILE: &str = "token.json";

/// Default queue file name inside the data directory.
pub const DEFAULT_PENDING_FILE: &str = "pending.csv";

// =============================================================================
// Configuration
// =============================================================================

/// Storage configuration.
///
/// ## Example
/// ```rust
/// use scanpoint_store::StorageConfig;
///
/// let config = StorageConfig::new("/var/lib/scanpoint")
///     .pending_file("queue.csv");
/// assert!(config.pending_path().ends_with("queue.csv"));
/// ```
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory holding all agent state.
    pub data_dir: PathBuf,

    /// Credential file name, relative to `data_dir`.
    /// Default: `token.json`
    pub credential_file: String,

    /// Queue file name, relative to `data_dir`.
    /// Default: `pending.csv`
    pub pending_file: String,
}

impl StorageConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        StorageConfig {
            data_dir: data_dir.into(),
            credential_file: DEFAULT_CREDENTIAL_FILE.to_string(),
            pending_file: DEFAULT_PENDING_FILE.to_string(),
        }
    }

    /// Sets the credential file name.
    pub fn credential_file(mut self, name: impl Into<String>) -> Self {
        self.credential_file = name.into();
        self
    }

    /// Sets the queue file name.
    pub fn pending_file(mut self, name: impl Into<String>) -> Self {
        self.pending_file = name.into();
        self
    }

    pub fn credential_path(&self) -> PathBuf {
        self.data_dir.join(&self.credential_file)
    }

    pub fn pending_path(&self) -> PathBuf {
        self.data_dir.join(&self.pending_file)
    }
}

// =============================================================================
// Storage
// =============================================================================

/// Handle to the agent's data directory.
#[derive(Debug, Clone)]
pub struct Storage {
    config: StorageConfig,
}

impl Storage {
    /// Opens (and if needed creates) the data directory.
    ///
    /// ## Returns
    /// * `Ok(Storage)` - Directory exists and repositories can be handed out
    /// * `Err(StoreError::Io)` - Directory could not be created
    pub fn open(config: StorageConfig) -> StoreResult<Self> {
        std::fs::create_dir_all(&config.data_dir)
            .map_err(|e| StoreError::io(&config.data_dir, e))?;

        info!(
            data_dir = %config.data_dir.display(),
            "Storage opened"
        );

        Ok(Storage { config })
    }

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Returns the pending-queue repository.
    pub fn queue(&self) -> QueueRepository {
        QueueRepository::new(self.config.pending_path())
    }

    /// Returns the credential repository.
    pub fn credentials(&self) -> CredentialRepository {
        CredentialRepository::new(self.config.credential_path())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_creates_nested_data_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("var").join("scanpoint");

        let storage = Storage::open(StorageConfig::new(&dir)).unwrap();

        assert!(dir.is_dir());
        assert_eq!(storage.queue().path(), dir.join("pending.csv"));
        assert_eq!(storage.credentials().path(), dir.join("token.json"));
    }

    #[test]
    fn test_config_builder() {
        let config = StorageConfig::new("/data")
            .credential_file("cred.json")
            .pending_file("q.csv");

        assert_eq!(config.credential_path(), PathBuf::from("/data/cred.json"));
        assert_eq!(config.pending_path(), PathBuf::from("/data/q.csv"));
    }
}
