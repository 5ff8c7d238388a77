//! Activation lifecycle commands.

use anyhow::Context;
use tracing::warn;

use super::print_json;
use crate::state::AgentState;

pub async fn activate(state: &AgentState, key: &str) -> anyhow::Result<()> {
    let message = state
        .activation
        .activate(key)
        .await
        .context("Activation failed")?;
    println!("{}", message);
    Ok(())
}

pub async fn deactivate(state: &AgentState) -> anyhow::Result<()> {
    let message = state.activation.deactivate().await?;
    println!("{}", message);
    Ok(())
}

pub async fn validate(state: &AgentState) -> anyhow::Result<()> {
    match state.activation.validate_remote().await {
        Ok(message) => {
            println!("{}", message);
            Ok(())
        }
        Err(e) => {
            if e.requires_activation() {
                warn!("Device must be activated again");
            }
            Err(e).context("Token validation failed")
        }
    }
}

pub async fn refresh(state: &AgentState) -> anyhow::Result<()> {
    let message = state
        .activation
        .refresh()
        .await
        .context("Token refresh failed")?;
    println!("{}", message);
    Ok(())
}

/// Local view only, no request is made.
pub async fn info(state: &AgentState) -> anyhow::Result<()> {
    // purges an expired credential before projecting it
    state.activation.is_activated().await;
    print_json(&state.activation.activation_info().await)
}
