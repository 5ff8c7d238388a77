//! # Activation Manager
//!
//! Owns the device credential: obtains it with an activation key, keeps it
//! fresh, and throws it away the moment it stops being trustworthy.
//!
//! ## Credential Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Credential Lifecycle                               │
//! │                                                                         │
//! │   (none) ──activate(key)──► VALID ──refresh()──► VALID (new token)     │
//! │     ▲                         │                                         │
//! │     │                         ├── now >= expiration_date  (observed)   │
//! │     │                         ├── HTTP 401 on any bearer call          │
//! │     │                         └── deactivate()                          │
//! │     │                         │                                         │
//! │     └──── memory cleared + token.json removed ◄─┘                       │
//! │                                                                         │
//! │  RULES:                                                                 │
//! │  • An expired credential is never used, only purged                    │
//! │  • Transport errors leave local state untouched                        │
//! │  • A new credential is written to disk before it is swapped in         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Concurrency
//! The credential lives in one `RwLock<Option<Credential>>` and is always
//! replaced wholesale, so [`ActivationManager::bearer`] never observes a token
//! from one credential paired with the device id of another.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use scanpoint_core::validation::{redact, validate_activation_key};
use scanpoint_core::{ActivationInfo, Clock, Credential};
use scanpoint_store::{CredentialRepository, StoreResult};

use crate::api::{ActivateRequest, ApiClient};
use crate::device::DeviceIdentity;
use crate::error::{SyncError, SyncResult};

/// Device activation and token lifecycle.
pub struct ActivationManager {
    api: ApiClient,
    store: CredentialRepository,
    identity: DeviceIdentity,
    clock: Arc<dyn Clock>,
    credential: Arc<RwLock<Option<Credential>>>,
}

impl ActivationManager {
    /// Creates a manager with no credential loaded. Call [`load`](Self::load)
    /// to pick up a persisted one.
    pub fn new(
        api: ApiClient,
        store: CredentialRepository,
        identity: DeviceIdentity,
        clock: Arc<dyn Clock>,
    ) -> Self {
        ActivationManager {
            api,
            store,
            identity,
            clock,
            credential: Arc::new(RwLock::new(None)),
        }
    }

    /// Creates a manager and loads the persisted credential.
    pub async fn open(
        api: ApiClient,
        store: CredentialRepository,
        identity: DeviceIdentity,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let manager = Self::new(api, store, identity, clock);
        manager.load().await;
        manager
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    /// Loads the persisted credential.
    ///
    /// Fails closed: a missing, unreadable, incomplete or expired file all
    /// leave the device "not activated". An expired file is removed.
    ///
    /// Returns true when a valid credential was loaded.
    pub async fn load(&self) -> bool {
        let loaded = match self.with_store(|store| store.load()).await {
            Ok(Some(credential)) => credential,
            Ok(None) => {
                debug!("No credential file, device not activated");
                *self.credential.write().await = None;
                return false;
            }
            Err(e) => {
                warn!(error = %e, "Credential file unreadable, device not activated");
                *self.credential.write().await = None;
                return false;
            }
        };

        let now = self.clock.now();
        if !loaded.is_valid_at(now) {
            info!(
                device_id = %loaded.device_id,
                expired_at = %loaded.expiration_date,
                "Stored credential expired, removing"
            );
            if let Err(e) = self.with_store(|store| store.clear()).await {
                error!(error = %e, "Failed to remove expired credential");
            }
            *self.credential.write().await = None;
            return false;
        }

        info!(
            device_id = %loaded.device_id,
            days_until_expiry = loaded.days_until_expiry(now),
            "Credential loaded"
        );
        *self.credential.write().await = Some(loaded);
        true
    }

    /// True iff a credential is loaded and unexpired.
    ///
    /// An expired credential is purged (memory and file) when observed here.
    pub async fn is_activated(&self) -> bool {
        let now = self.clock.now();

        {
            let guard = self.credential.read().await;
            match guard.as_ref() {
                None => return false,
                Some(c) if c.is_valid_at(now) => return true,
                Some(_) => {}
            }
        }

        // Expired: re-check under the write lock, another caller may have
        // replaced it in between.
        let mut guard = self.credential.write().await;
        match guard.as_ref() {
            Some(c) if c.is_valid_at(now) => true,
            Some(c) => {
                info!(device_id = %c.device_id, "Credential expired");
                if let Err(e) = self.with_store(|store| store.clear()).await {
                    error!(error = %e, "Failed to remove expired credential");
                }
                *guard = None;
                false
            }
            None => false,
        }
    }

    /// Activates the device with an activation key.
    ///
    /// ## Returns
    /// * `Ok(message)` - Credential persisted and in use
    /// * `Err(Validation)` - Empty key, nothing sent
    /// * `Err(Rejected)` - Server answered `success: false`
    /// * `Err(_)` - Transport, protocol or storage failure; state unchanged
    pub async fn activate(&self, activation_key: &str) -> SyncResult<String> {
        let key = validate_activation_key(activation_key)?;
        let now = self.clock.now();

        info!(key = %redact(&key), serial = %self.identity.serial, "Activating device");

        let request = ActivateRequest {
            activation_key: &key,
            device_serial: &self.identity.serial,
            device_type: &self.identity.device_type,
            platform: &self.identity.platform,
            timestamp: scanpoint_core::time::format_timestamp(&now),
        };

        let response = match self.api.activate(&request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, category = %e.category(), "Activation failed");
                return Err(e);
            }
        };

        if !response.success {
            let message = response
                .message
                .unwrap_or_else(|| "activation rejected".to_string());
            warn!(message = %message, "Activation rejected by server");
            return Err(SyncError::Rejected(message));
        }

        let credential = response.into_credential(&self.identity.serial, now)?;

        // Durable first, then visible.
        let row = credential.clone();
        self.with_store(move |store| store.save(&row)).await?;

        let device_id = credential.device_id.clone();
        let days = credential.days_until_expiry(now);
        *self.credential.write().await = Some(credential);

        info!(device_id = %device_id, days_until_expiry = days, "Device activated");
        Ok(format!("Device activated. ID: {}", device_id))
    }

    /// Asks the server whether the current credential is still valid.
    ///
    /// `valid: false` keeps the credential; HTTP 401 revokes it.
    pub async fn validate_remote(&self) -> SyncResult<String> {
        if !self.is_activated().await {
            return Err(SyncError::NotActivated);
        }
        let (token, device_id) = self.bearer().await.ok_or(SyncError::NotActivated)?;

        match self.api.check_status(&token, &device_id, self.clock.now()).await {
            Ok(status) if status.valid => {
                debug!(device_id = %device_id, "Credential confirmed by server");
                Ok(status.message.unwrap_or_else(|| "Token valid".to_string()))
            }
            Ok(status) => {
                let message = status.message.unwrap_or_else(|| "Token invalid".to_string());
                warn!(message = %message, "Server reports credential invalid");
                Err(SyncError::Rejected(message))
            }
            Err(SyncError::Unauthorized) => {
                self.revoke("status check returned 401").await;
                Err(SyncError::Unauthorized)
            }
            Err(e) => {
                warn!(error = %e, "Credential validation failed");
                Err(e)
            }
        }
    }

    /// Renews the token when 24 h or less remain.
    ///
    /// Only the token and expiration date change; activation date, device id
    /// and serial are carried over.
    pub async fn refresh(&self) -> SyncResult<String> {
        if !self.is_activated().await {
            return Err(SyncError::NotActivated);
        }

        let now = self.clock.now();
        let current = self
            .credential
            .read()
            .await
            .clone()
            .ok_or(SyncError::NotActivated)?;

        if !current.needs_refresh(now) {
            debug!(
                remaining_hours = current.remaining(now).num_hours(),
                "Credential does not need refresh"
            );
            return Ok("Token still valid".to_string());
        }

        info!(device_id = %current.device_id, "Refreshing credential");

        let response = match self.api.refresh(&current.token, &current.device_id, now).await {
            Ok(response) => response,
            Err(SyncError::Unauthorized) => {
                self.revoke("refresh returned 401").await;
                return Err(SyncError::Unauthorized);
            }
            Err(e) => {
                warn!(error = %e, "Credential refresh failed");
                return Err(e);
            }
        };

        if !response.success {
            let message = response
                .message
                .unwrap_or_else(|| "refresh rejected".to_string());
            warn!(message = %message, "Refresh rejected by server");
            return Err(SyncError::Rejected(message));
        }

        let (token, expiration_date) = response.grant()?;
        let refreshed = current.refreshed(token, expiration_date);

        let row = refreshed.clone();
        self.with_store(move |store| store.save(&row)).await?;
        *self.credential.write().await = Some(refreshed);

        info!(expires_at = %expiration_date, "Credential refreshed");
        Ok("Token refreshed".to_string())
    }

    /// Deactivates the device.
    ///
    /// The server is notified best-effort; the local credential is cleared
    /// regardless. Only failing to remove the local file is an error.
    pub async fn deactivate(&self) -> SyncResult<String> {
        if let Some((token, device_id)) = self.bearer().await {
            match self.api.deactivate(&token, &device_id, self.clock.now()).await {
                Ok(ack) if ack.success => debug!("Server acknowledged deactivation"),
                Ok(ack) => warn!(message = ?ack.message, "Server did not confirm deactivation"),
                Err(e) => warn!(error = %e, "Deactivation notice failed, clearing locally"),
            }
        }

        let mut guard = self.credential.write().await;
        self.with_store(|store| store.clear()).await?;
        *guard = None;

        info!("Device deactivated");
        Ok("Device deactivated".to_string())
    }

    /// Clears the credential after the server rejected it.
    pub async fn revoke(&self, reason: &str) {
        let mut guard = self.credential.write().await;
        if guard.take().is_some() {
            warn!(reason = %reason, "Credential revoked");
        }
        if let Err(e) = self.with_store(|store| store.clear()).await {
            error!(error = %e, "Failed to remove revoked credential");
        }
    }

    /// Runs a credential file operation off the async runtime.
    async fn with_store<T, F>(&self, op: F) -> SyncResult<T>
    where
        F: FnOnce(&CredentialRepository) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.store.clone();
        Ok(tokio::task::spawn_blocking(move || op(&store)).await??)
    }

    /// Snapshot of activation state. No I/O, no purge.
    pub async fn activation_info(&self) -> ActivationInfo {
        let guard = self.credential.read().await;
        ActivationInfo::project(guard.as_ref(), self.clock.now())
    }

    /// Token and device id of the current unexpired credential.
    pub async fn bearer(&self) -> Option<(String, String)> {
        let now = self.clock.now();
        self.credential
            .read()
            .await
            .as_ref()
            .filter(|c| c.is_valid_at(now))
            .map(|c| (c.token.clone(), c.device_id.clone()))
    }

    /// Device id of the current unexpired credential.
    pub async fn device_id(&self) -> Option<String> {
        self.bearer().await.map(|(_, device_id)| device_id)
    }

    /// Expiration date of the loaded credential, valid or not.
    pub async fn expiration_date(&self) -> Option<DateTime<Utc>> {
        self.credential
            .read()
            .await
            .as_ref()
            .map(|c| c.expiration_date)
    }
}

impl std::fmt::Debug for ActivationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivationManager")
            .field("identity", &self.identity)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}
