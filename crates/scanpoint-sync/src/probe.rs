//! # Connectivity Probe
//!
//! Answers one question for the sync gate: is there a path to the remote
//! service right now?
//!
//! The HTTP probe does a plain `GET` with a short timeout. Any response
//! below 500 counts as reachable, since a 404 or 405 from the API root still
//! proves the network path works.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::config::ApiSettings;
use crate::error::{SyncError, SyncResult};

/// Reachability check used by the sync gate.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    /// Returns true when the remote service can be reached.
    ///
    /// Must not error: failures are simply "unreachable".
    async fn is_reachable(&self) -> bool;
}

/// Probe that issues a `GET` to a fixed URL.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
    url: String,
}

impl HttpProbe {
    pub fn new(url: impl Into<String>, timeout: Duration) -> SyncResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::InvalidConfig(format!("probe client: {}", e)))?;
        Ok(HttpProbe {
            client,
            url: url.into(),
        })
    }

    /// Probe for the configured target (`probe_url`, else `base_url`).
    pub fn from_settings(settings: &ApiSettings) -> SyncResult<Self> {
        Self::new(settings.probe_target(), settings.probe_timeout())
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ConnectivityProbe for HttpProbe {
    async fn is_reachable(&self) -> bool {
        match self.client.get(&self.url).send().await {
            Ok(response) => {
                let reachable = !response.status().is_server_error();
                debug!(url = %self.url, status = %response.status(), reachable, "Probe");
                reachable
            }
            Err(e) => {
                debug!(url = %self.url, error = %e, "Probe failed");
                false
            }
        }
    }
}

/// Probe with a manually controlled answer.
///
/// For tests, and for deployments where another component owns the network
/// state.
#[derive(Debug, Default)]
pub struct StaticProbe {
    reachable: AtomicBool,
}

impl StaticProbe {
    pub fn new(reachable: bool) -> Self {
        StaticProbe {
            reachable: AtomicBool::new(reachable),
        }
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConnectivityProbe for StaticProbe {
    async fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }
}
