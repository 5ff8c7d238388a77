//! Queue and delivery commands.

use std::path::Path;

use anyhow::{bail, Context};
use serde::Serialize;
use uuid::Uuid;

use scanpoint_core::{Clock, Metadata};

use super::print_json;
use crate::state::AgentState;

#[derive(Debug, Serialize)]
struct PassResult {
    synced: usize,
    failed: usize,
}

#[derive(Debug, Serialize)]
struct ScanResult {
    id: Uuid,
    code: String,
    delivered: bool,
}

pub async fn status(state: &AgentState) -> anyhow::Result<()> {
    // refresh the cached online flag
    state.engine.is_online().await;
    print_json(&state.engine.sync_status().await)
}

pub async fn force(state: &AgentState) -> anyhow::Result<()> {
    let (synced, failed) = state.engine.force_sync().await;
    print_json(&PassResult { synced, failed })
}

pub async fn pending(state: &AgentState) -> anyhow::Result<()> {
    print_json(&state.engine.pending_codes().await)
}

pub async fn clear_failed(state: &AgentState) -> anyhow::Result<()> {
    let removed = state.engine.clear_failed_codes().await?;
    println!("Removed {} failed scan(s)", removed);
    Ok(())
}

pub async fn export(state: &AgentState, path: &Path) -> anyhow::Result<()> {
    let written = state
        .engine
        .export_pending_data(path)
        .await
        .with_context(|| format!("Export to {} failed", path.display()))?;
    if written {
        println!("Exported pending scans to {}", path.display());
    } else {
        println!("Nothing to export");
    }
    Ok(())
}

/// Queues one code, then sends it right away when online.
pub async fn scan(state: &AgentState, code: &str, meta: &[String]) -> anyhow::Result<()> {
    let metadata = parse_metadata(meta)?;
    let record = state
        .engine
        .try_add_code(code, state.clock.now(), metadata)
        .await?;

    state.engine.drain_immediate().await;
    let delivered = !state
        .engine
        .pending_codes()
        .await
        .iter()
        .any(|r| r.id == record.id);

    print_json(&ScanResult {
        id: record.id,
        code: record.code,
        delivered,
    })
}

/// Parses `key=value` pairs into validated metadata.
///
/// Returns `None` for an empty list.
pub fn parse_metadata(pairs: &[String]) -> anyhow::Result<Option<Metadata>> {
    if pairs.is_empty() {
        return Ok(None);
    }

    let mut metadata = Metadata::new();
    for pair in pairs {
        let Some((key, value)) = pair.split_once('=') else {
            bail!("Metadata must be KEY=VALUE, got '{}'", pair);
        };
        metadata
            .insert(key.trim(), value)
            .with_context(|| format!("Invalid metadata key '{}'", key))?;
    }
    Ok(Some(metadata))
}
