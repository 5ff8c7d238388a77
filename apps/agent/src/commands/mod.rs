//! # Agent Commands
//!
//! ```text
//! commands/
//! ├── mod.rs         ◄─── dispatch + JSON output
//! ├── activation.rs  ◄─── activate, deactivate, validate, refresh, info
//! ├── sync.rs        ◄─── status, sync, pending, clear-failed, export, scan
//! └── run.rs         ◄─── scanner + background loop until shutdown
//! ```

mod activation;
mod run;
mod sync;

use serde::Serialize;

use crate::state::AgentState;
use crate::Command;

pub use sync::parse_metadata;

/// Runs one command against an initialized agent.
pub async fn dispatch(state: &AgentState, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Run => run::run(state).await,

        Command::Activate { key } => activation::activate(state, &key).await,
        Command::Deactivate => activation::deactivate(state).await,
        Command::Validate => activation::validate(state).await,
        Command::Refresh => activation::refresh(state).await,
        Command::Info => activation::info(state).await,

        Command::Status => sync::status(state).await,
        Command::Sync => sync::force(state).await,
        Command::Pending => sync::pending(state).await,
        Command::ClearFailed => sync::clear_failed(state).await,
        Command::Export { path } => sync::export(state, &path).await,
        Command::Scan { code, meta } => sync::scan(state, &code, &meta).await,
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
