//! # Credential Repository
//!
//! Persists the device credential as a single JSON object.
//!
//! ```text
//!   {
//!     "token": "…",
//!     "device_id": "dev-42",
//!     "activation_date": "2025-01-01T08:00:00+00:00",
//!     "expiration_date": "2025-01-31T08:00:00+00:00",
//!     "device_serial": "00000000a1b2c3d4"
//!   }
//! ```
//!
//! Expiry is not checked here; the activation manager decides whether a
//! loaded credential may be used.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use scanpoint_core::Credential;
use tracing::debug;

use super::{commit_tmp, ensure_parent, remove_if_exists, tmp_path};
use crate::error::{StoreError, StoreResult};

/// Repository for the credential file.
#[derive(Debug, Clone)]
pub struct CredentialRepository {
    path: PathBuf,
}

impl CredentialRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        CredentialRepository { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Reads the credential.
    ///
    /// ## Returns
    /// * `Ok(None)` - No credential file
    /// * `Ok(Some(_))` - Parsed credential (possibly expired)
    /// * `Err(StoreError::Json)` - File is unparsable or misses a field
    pub fn load(&self) -> StoreResult<Option<Credential>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(&self.path, e)),
        };

        let credential: Credential = serde_json::from_str(&raw)?;
        Ok(Some(credential))
    }

    /// Atomically replaces the credential file.
    pub fn save(&self, credential: &Credential) -> StoreResult<()> {
        ensure_parent(&self.path)?;

        let json = serde_json::to_string_pretty(credential)?;
        let tmp = tmp_path(&self.path);

        let mut file = File::create(&tmp).map_err(|e| StoreError::io(&tmp, e))?;
        file.write_all(json.as_bytes())
            .and_then(|_| file.sync_all())
            .map_err(|e| StoreError::io(&tmp, e))?;
        drop(file);

        commit_tmp(&tmp, &self.path)?;

        debug!(device_id = %credential.device_id, "Credential saved");
        Ok(())
    }

    /// Removes the credential file. A missing file is not an error.
    pub fn clear(&self) -> StoreResult<()> {
        if remove_if_exists(&self.path)? {
            debug!(path = %self.path.display(), "Credential file removed");
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
