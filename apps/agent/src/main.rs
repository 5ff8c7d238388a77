//! # Scanpoint Agent Entry Point
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Scanpoint Agent                                  │
//! │                                                                         │
//! │  main.rs ────► parse CLI, install tracing                              │
//! │                                                                         │
//! │  lib.rs ─────► load config, build AgentState, dispatch command         │
//! │                                                                         │
//! │  commands/ ──► run, activate, status, sync, export, ...                │
//! │                                                                         │
//! │  state/ ─────► AgentState (storage, activation, engine), ConsoleSink   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use clap::Parser;

use scanpoint_agent::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    scanpoint_agent::init_tracing(cli.verbose);
    scanpoint_agent::run(cli).await
}
