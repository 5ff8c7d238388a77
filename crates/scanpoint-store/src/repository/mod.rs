//! # Repository Module
//!
//! File-backed repositories for the agent's durable state.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    File Repositories                                    │
//! │                                                                         │
//! │  SyncEngine                                                            │
//! │       │  storage.queue().append(&record)                               │
//! │       ▼                                                                 │
//! │  QueueRepository                                                       │
//! │  ├── append(&self, record)     one fsync'd row                         │
//! │  ├── rewrite(&self, records)   temp file + rename                      │
//! │  ├── load_all(&self)           skips unreadable rows                   │
//! │  └── export_to(&self, ..)      same format, any path                   │
//! │                                                                         │
//! │  ActivationManager                                                     │
//! │       │  storage.credentials().save(&credential)                       │
//! │       ▼                                                                 │
//! │  CredentialRepository                                                  │
//! │  ├── load / save / clear / exists                                      │
//! │                                                                         │
//! │  Writes that replace a whole file always go through a sibling          │
//! │  `<name>.tmp` followed by rename, so readers see old or new content.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`queue::QueueRepository`] - Pending scan queue (`pending.csv`)
//! - [`credential::CredentialRepository`] - Device credential (`token.json`)

use std::fs::File;
use std::path::{Path, PathBuf};

use crate::error::{StoreError, StoreResult};

pub mod credential;
pub mod queue;

/// Sibling path used for atomic replacement (`pending.csv` → `pending.csv.tmp`).
pub(crate) fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Creates the parent directory of `path` if it is missing.
pub(crate) fn ensure_parent(path: &Path) -> StoreResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }
    Ok(())
}

/// Renames `tmp` over `path` after the caller has synced `tmp`.
pub(crate) fn commit_tmp(tmp: &Path, path: &Path) -> StoreResult<()> {
    std::fs::rename(tmp, path).map_err(|e| StoreError::io(path, e))?;

    // Persist the rename itself. Not every platform lets a directory be
    // opened for sync, so this is best-effort.
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }
    Ok(())
}

/// Removes a file, treating "already gone" as success.
pub(crate) fn remove_if_exists(path: &Path) -> StoreResult<bool> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StoreError::io(path, e)),
    }
}
