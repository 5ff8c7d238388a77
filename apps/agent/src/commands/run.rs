//! # Run Loop
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  engine.start() ──► background sync loop                               │
//! │                                                                         │
//! │  loop select! {                                                         │
//! │      scan = source.next_scan() ──► engine.add_code(code, captured_at)  │
//! │      shutdown_signal()         ──► break                               │
//! │  }                                                                      │
//! │                                                                         │
//! │  engine.stop() ──► pass in progress persists, loop joins               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::future::Future;

use tracing::{error, info, warn};

use scanpoint_core::ScanEvent;
use scanpoint_sync::{open_source, BarcodeSource, SyncEngine};

use crate::state::AgentState;

pub async fn run(state: &AgentState) -> anyhow::Result<()> {
    if !state.activation.is_activated().await {
        warn!("Device is not activated; scans are queued until `activate` succeeds");
    }

    state.engine.start().await?;
    let source = open_source(&state.config.scanner, state.clock.clone()).await?;

    capture(&state.engine, source, shutdown_signal()).await;

    state.engine.stop().await?;
    info!("Agent stopped");
    Ok(())
}

/// Feeds scans into the engine until `shutdown` resolves.
///
/// An exhausted or absent source leaves the agent syncing until shutdown.
pub async fn capture(
    engine: &SyncEngine,
    mut source: Option<Box<dyn BarcodeSource>>,
    shutdown: impl Future<Output = ()>,
) {
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            scan = next_scan(&mut source) => match scan {
                Some(event) => {
                    engine.add_code(&event.code, event.captured_at, None).await;
                }
                None => {
                    info!("Scanner input closed");
                    source = None;
                }
            },
        }
    }
}

async fn next_scan(source: &mut Option<Box<dyn BarcodeSource>>) -> Option<ScanEvent> {
    match source {
        Some(source) => source.next_scan().await,
        None => std::future::pending().await,
    }
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(?e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(?e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, stopping agent...");
}
