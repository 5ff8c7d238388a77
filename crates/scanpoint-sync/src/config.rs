//! # Agent Configuration
//!
//! Configuration management for the scanpoint agent.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     SCANPOINT_API_URL=https://api.example.com                          │
//! │     SCANPOINT_DATA_DIR=/var/lib/scanpoint                              │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     --config <path>, or                                                │
//! │     ~/.config/scanpoint/agent.toml (Linux)                             │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # agent.toml
//! [device]
//! serial = "00000000a1b2c3d4"   # optional, detected when absent
//!
//! [api]
//! base_url = "https://api.example.com"
//! request_timeout_secs = 30
//!
//! [api.endpoints]
//! register = "/api/register_code"
//!
//! [sync]
//! max_retries = 3
//! sync_interval_secs = 3600
//!
//! [storage]
//! data_dir = "/var/lib/scanpoint"
//!
//! [scanner]
//! mode = "keyboard"   # keyboard | simulated | disabled
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use scanpoint_core::MAX_CODE_LENGTH;
use scanpoint_store::StorageConfig;

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Device Settings
// =============================================================================

/// Identity reported to the API at activation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSettings {
    /// Hardware serial override. Detected from the board when `None`.
    #[serde(default)]
    pub serial: Option<String>,

    /// Default: `raspberry_pi`
    #[serde(default = "default_device_type")]
    pub device_type: String,

    /// Default: `linux`
    #[serde(default = "default_platform")]
    pub platform: String,
}

fn default_device_type() -> String {
    "raspberry_pi".to_string()
}

fn default_platform() -> String {
    "linux".to_string()
}

impl Default for DeviceSettings {
    fn default() -> Self {
        DeviceSettings {
            serial: None,
            device_type: default_device_type(),
            platform: default_platform(),
        }
    }
}

// =============================================================================
// API Settings
// =============================================================================

/// Paths of the remote API, relative to `base_url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub activate: String,
    pub status: String,
    pub register: String,
    pub refresh: String,
    pub deactivate: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Endpoints {
            activate: "/activate".to_string(),
            status: "/status".to_string(),
            register: "/register".to_string(),
            refresh: "/refresh_token".to_string(),
            deactivate: "/deactivate".to_string(),
        }
    }
}

/// Remote API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Base URL of the registration API (http or https).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub endpoints: Endpoints,

    /// Timeout for every API request (seconds).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// URL fetched by the connectivity probe. Defaults to `base_url`.
    #[serde(default)]
    pub probe_url: Option<String>,

    /// Timeout for the connectivity probe (seconds).
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_probe_timeout() -> u64 {
    5
}

impl Default for ApiSettings {
    fn default() -> Self {
        ApiSettings {
            base_url: default_base_url(),
            endpoints: Endpoints::default(),
            request_timeout_secs: default_request_timeout(),
            probe_url: None,
            probe_timeout_secs: default_probe_timeout(),
        }
    }
}

impl ApiSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }

    /// The URL the connectivity probe should fetch.
    pub fn probe_target(&self) -> &str {
        self.probe_url.as_deref().unwrap_or(&self.base_url)
    }
}

// =============================================================================
// Sync Settings
// =============================================================================

/// Delivery and retry behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncSettings {
    /// Failed attempts before a record becomes `failed`.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Interval between full passes (seconds).
    #[serde(default = "default_sync_interval")]
    pub sync_interval_secs: u64,

    /// Background loop tick (seconds). Immediate sends are drained on each tick.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Pause between two records of one pass (milliseconds).
    #[serde(default = "default_inter_record_delay")]
    pub inter_record_delay_ms: u64,

    /// First backoff step after a pass is skipped (seconds).
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,

    /// Backoff ceiling (seconds).
    #[serde(default = "default_max_retry_delay")]
    pub max_retry_delay_secs: u64,

    /// Run a full pass as soon as the loop starts.
    #[serde(default = "default_true")]
    pub sync_on_startup: bool,

    /// Refresh the credential before each full pass when close to expiry.
    #[serde(default = "default_true")]
    pub auto_token_refresh: bool,

    /// How long `stop()` waits for the loop before aborting it (seconds).
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

fn default_true() -> bool {
    true
}
fn default_max_retries() -> u32 {
    scanpoint_core::DEFAULT_MAX_RETRIES
}
fn default_sync_interval() -> u64 {
    3600
}
fn default_poll_interval() -> u64 {
    60
}
fn default_inter_record_delay() -> u64 {
    100
}
fn default_retry_delay() -> u64 {
    300
}
fn default_max_retry_delay() -> u64 {
    3600
}
fn default_shutdown_timeout() -> u64 {
    5
}

impl Default for SyncSettings {
    fn default() -> Self {
        SyncSettings {
            max_retries: default_max_retries(),
            sync_interval_secs: default_sync_interval(),
            poll_interval_secs: default_poll_interval(),
            inter_record_delay_ms: default_inter_record_delay(),
            retry_delay_secs: default_retry_delay(),
            max_retry_delay_secs: default_max_retry_delay(),
            sync_on_startup: true,
            auto_token_refresh: true,
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl SyncSettings {
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn inter_record_delay(&self) -> Duration {
        Duration::from_millis(self.inter_record_delay_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn max_retry_delay(&self) -> Duration {
        Duration::from_secs(self.max_retry_delay_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

// =============================================================================
// Storage Settings
// =============================================================================

/// Where state files live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    /// Data directory. Defaults to the platform data dir.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    #[serde(default = "default_credential_file")]
    pub credential_file: String,

    #[serde(default = "default_pending_file")]
    pub pending_file: String,
}

fn default_credential_file() -> String {
    scanpoint_store::store::DEFAULT_CREDENTIAL_FILE.to_string()
}

fn default_pending_file() -> String {
    scanpoint_store::store::DEFAULT_PENDING_FILE.to_string()
}

impl Default for StorageSettings {
    fn default() -> Self {
        StorageSettings {
            data_dir: None,
            credential_file: default_credential_file(),
            pending_file: default_pending_file(),
        }
    }
}

impl StorageSettings {
    /// Resolves the data directory: configured, platform default, `./data`.
    pub fn resolved_data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .or_else(|| project_dirs().map(|dirs| dirs.data_dir().to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("data"))
    }

    /// Builds the store configuration.
    pub fn storage_config(&self) -> StorageConfig {
        StorageConfig::new(self.resolved_data_dir())
            .credential_file(self.credential_file.clone())
            .pending_file(self.pending_file.clone())
    }
}

// =============================================================================
// Scanner Settings
// =============================================================================

/// Which event source feeds the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScannerMode {
    /// Keyboard-emulation scanner: one code per line.
    #[default]
    Keyboard,

    /// Synthetic codes on a timer.
    Simulated,

    /// No event source; codes arrive only through the CLI.
    Disabled,
}

impl std::fmt::Display for ScannerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScannerMode::Keyboard => write!(f, "keyboard"),
            ScannerMode::Simulated => write!(f, "simulated"),
            ScannerMode::Disabled => write!(f, "disabled"),
        }
    }
}

impl std::str::FromStr for ScannerMode {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "keyboard" | "wedge" | "hid" => Ok(ScannerMode::Keyboard),
            "simulated" | "sim" => Ok(ScannerMode::Simulated),
            "disabled" | "off" | "none" => Ok(ScannerMode::Disabled),
            other => Err(SyncError::InvalidConfig(format!(
                "Unknown scanner mode: '{}'. Valid options: keyboard, simulated, disabled",
                other
            ))),
        }
    }
}

/// Event source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerSettings {
    #[serde(default)]
    pub mode: ScannerMode,

    /// Longer lines are dropped as garbled input.
    #[serde(default = "default_max_code_length")]
    pub max_code_length: usize,

    /// Read scans from this file/device instead of stdin.
    #[serde(default)]
    pub input_path: Option<PathBuf>,

    /// Codes emitted by the simulated source. Generated when empty.
    #[serde(default)]
    pub simulated_codes: Vec<String>,

    #[serde(default = "default_simulated_interval")]
    pub simulated_interval_ms: u64,
}

fn default_max_code_length() -> usize {
    MAX_CODE_LENGTH
}

fn default_simulated_interval() -> u64 {
    5000
}

impl Default for ScannerSettings {
    fn default() -> Self {
        ScannerSettings {
            mode: ScannerMode::default(),
            max_code_length: default_max_code_length(),
            input_path: None,
            simulated_codes: Vec::new(),
            simulated_interval_ms: default_simulated_interval(),
        }
    }
}

impl ScannerSettings {
    pub fn simulated_interval(&self) -> Duration {
        Duration::from_millis(self.simulated_interval_ms)
    }
}

// =============================================================================
// Main Agent Configuration
// =============================================================================

/// Complete agent configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub device: DeviceSettings,

    #[serde(default)]
    pub api: ApiSettings,

    #[serde(default)]
    pub sync: SyncSettings,

    #[serde(default)]
    pub storage: StorageSettings,

    #[serde(default)]
    pub scanner: ScannerSettings,
}

impl AgentConfig {
    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (agent.toml)
    /// 3. Environment variables
    ///
    /// An explicitly given path must exist; the default path may not.
    pub fn load(config_path: Option<PathBuf>) -> SyncResult<Self> {
        let mut config = Self::default();

        match config_path {
            Some(path) => {
                info!(?path, "Loading agent config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            }
            None => match Self::default_config_path() {
                Some(path) if path.exists() => {
                    info!(?path, "Loading agent config from file");
                    let contents = std::fs::read_to_string(&path)?;
                    config = toml::from_str(&contents)?;
                }
                path => debug!(?path, "Config file not found, using defaults"),
            },
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Parses a TOML document (no environment overrides).
    pub fn from_toml(contents: &str) -> SyncResult<Self> {
        let config: AgentConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> SyncResult<()> {
        validate_http_url("api.base_url", &self.api.base_url)?;
        if let Some(ref probe) = self.api.probe_url {
            validate_http_url("api.probe_url", probe)?;
        }

        if self.api.request_timeout_secs == 0 || self.api.probe_timeout_secs == 0 {
            return Err(SyncError::InvalidConfig(
                "api timeouts must be greater than 0".into(),
            ));
        }

        if self.sync.max_retries == 0 {
            return Err(SyncError::InvalidConfig(
                "max_retries must be greater than 0".into(),
            ));
        }

        if self.sync.sync_interval_secs == 0
            || self.sync.poll_interval_secs == 0
            || self.sync.retry_delay_secs == 0
        {
            return Err(SyncError::InvalidConfig(
                "sync intervals must be greater than 0".into(),
            ));
        }

        if self.sync.max_retry_delay_secs < self.sync.retry_delay_secs {
            return Err(SyncError::InvalidConfig(
                "max_retry_delay_secs must not be smaller than retry_delay_secs".into(),
            ));
        }

        if self.scanner.max_code_length == 0 || self.scanner.max_code_length > MAX_CODE_LENGTH {
            return Err(SyncError::InvalidConfig(format!(
                "scanner.max_code_length must be between 1 and {}",
                MAX_CODE_LENGTH
            )));
        }

        Ok(())
    }

    /// Applies `SCANPOINT_*` environment variable overrides.
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Applies overrides from any key lookup.
    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("SCANPOINT_API_URL") {
            debug!(url = %url, "Overriding API URL from environment");
            self.api.base_url = url;
        }

        if let Some(url) = lookup("SCANPOINT_PROBE_URL") {
            self.api.probe_url = Some(url);
        }

        if let Some(dir) = lookup("SCANPOINT_DATA_DIR") {
            debug!(data_dir = %dir, "Overriding data dir from environment");
            self.storage.data_dir = Some(PathBuf::from(dir));
        }

        if let Some(serial) = lookup("SCANPOINT_DEVICE_SERIAL") {
            self.device.serial = Some(serial);
        }

        if let Some(retries) = lookup("SCANPOINT_MAX_RETRIES") {
            match retries.parse::<u32>() {
                Ok(n) => self.sync.max_retries = n,
                Err(_) => warn!(value = %retries, "Ignoring invalid SCANPOINT_MAX_RETRIES"),
            }
        }

        if let Some(interval) = lookup("SCANPOINT_SYNC_INTERVAL") {
            match interval.parse::<u64>() {
                Ok(n) => self.sync.sync_interval_secs = n,
                Err(_) => warn!(value = %interval, "Ignoring invalid SCANPOINT_SYNC_INTERVAL"),
            }
        }

        if let Some(mode) = lookup("SCANPOINT_SCANNER_MODE") {
            match mode.parse() {
                Ok(parsed) => self.scanner.mode = parsed,
                Err(_) => warn!(mode = %mode, "Unknown scanner mode in environment"),
            }
        }
    }

    /// Returns the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join("agent.toml"))
    }

    /// Full URL of an endpoint path.
    pub fn endpoint_url(&self, path: &str) -> String {
        join_url(&self.api.base_url, path)
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "scanpoint", "agent")
}

fn validate_http_url(field: &str, raw: &str) -> SyncResult<()> {
    let parsed = url::Url::parse(raw)?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(SyncError::InvalidUrl(format!(
            "{} must start with http:// or https://, got: {}",
            field, raw
        )));
    }
    Ok(())
}

/// Joins a base URL and an endpoint path with exactly one slash.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
