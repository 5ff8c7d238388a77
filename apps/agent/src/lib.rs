//! # Scanpoint Agent
//!
//! Command-line front end for the kiosk agent: captures barcodes and keeps
//! the offline queue flowing to the registration API.
//!
//! ## Command Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         scanpoint-agent                                 │
//! │                                                                         │
//! │  run            scanner + background sync until Ctrl-C / SIGTERM        │
//! │                                                                         │
//! │  activate KEY   ┐                                                       │
//! │  deactivate     │ ActivationManager                                     │
//! │  validate       │                                                       │
//! │  refresh        │                                                       │
//! │  info           ┘                                                       │
//! │                                                                         │
//! │  status         ┐                                                       │
//! │  sync           │                                                       │
//! │  pending        │ SyncEngine                                            │
//! │  clear-failed   │                                                       │
//! │  export PATH    │                                                       │
//! │  scan CODE      ┘                                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Query commands print JSON on stdout; logs go to stderr.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use scanpoint_sync::AgentConfig;

pub mod commands;
pub mod state;

pub use state::{AgentState, ConsoleSink};

/// Barcode capture and offline sync agent.
#[derive(Parser, Debug)]
#[command(name = "scanpoint-agent", version, about = "Barcode capture and offline sync agent")]
pub struct Cli {
    /// Path to agent.toml (defaults to the platform config dir)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Capture scans and sync in the background until interrupted
    Run,

    /// Activate this device with a one-time key
    Activate {
        /// Activation key issued by the back office
        key: String,
    },

    /// Deactivate this device and remove the local credential
    Deactivate,

    /// Check the credential against the server
    Validate,

    /// Refresh the credential if it expires within 24 hours
    Refresh,

    /// Show local activation state
    Info,

    /// Show queue and sync state
    Status,

    /// Run one sync pass now
    Sync,

    /// List queued scans
    Pending,

    /// Drop scans that exhausted their retries
    ClearFailed,

    /// Write the queue as CSV
    Export {
        /// Destination file
        path: PathBuf,
    },

    /// Queue a single code and try to deliver it
    Scan {
        code: String,

        /// Extra metadata as key=value (repeatable)
        #[arg(short, long = "meta", value_name = "KEY=VALUE")]
        meta: Vec<String>,
    },
}

/// Initializes the tracing subscriber on stderr.
///
/// `RUST_LOG` wins over the built-in default filter; `--verbose` raises the
/// default to debug.
pub fn init_tracing(verbose: bool) {
    let default = if verbose {
        "debug,hyper=info,reqwest=info"
    } else {
        "info,scanpoint=debug,reqwest=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Loads configuration, assembles the agent and dispatches `cli.command`.
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = AgentConfig::load(cli.config)?;
    info!(
        api = %config.api.base_url,
        data_dir = %config.storage.resolved_data_dir().display(),
        "Starting Scanpoint agent"
    );

    let state = AgentState::init(config).await?;
    commands::dispatch(&state, cli.command).await
}
