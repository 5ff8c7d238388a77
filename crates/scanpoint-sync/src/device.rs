//! # Device Identity
//!
//! What the agent tells the API about the hardware it runs on.
//!
//! Serial lookup order: configured override, the `Serial` line of
//! `/proc/cpuinfo` (Raspberry Pi boards), the hostname, then `"unknown"`.

use std::path::Path;

use tracing::debug;

use crate::config::DeviceSettings;

const CPUINFO_PATH: &str = "/proc/cpuinfo";

/// Hardware identity sent with the activation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub serial: String,
    pub device_type: String,
    pub platform: String,
}

impl DeviceIdentity {
    /// Resolves the identity, detecting the serial when not configured.
    pub fn detect(settings: &DeviceSettings) -> Self {
        DeviceIdentity {
            serial: device_serial(settings.serial.as_deref()),
            device_type: settings.device_type.clone(),
            platform: settings.platform.clone(),
        }
    }

    /// Identity with a fixed serial and default type/platform.
    pub fn with_serial(serial: impl Into<String>) -> Self {
        let defaults = DeviceSettings::default();
        DeviceIdentity {
            serial: serial.into(),
            device_type: defaults.device_type,
            platform: defaults.platform,
        }
    }
}

/// Returns the hardware serial of this device.
pub fn device_serial(configured: Option<&str>) -> String {
    if let Some(serial) = configured.map(str::trim).filter(|s| !s.is_empty()) {
        return serial.to_string();
    }

    if let Some(serial) = read_cpuinfo_serial(Path::new(CPUINFO_PATH)) {
        debug!(serial = %serial, "Device serial from cpuinfo");
        return serial;
    }

    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

fn read_cpuinfo_serial(path: &Path) -> Option<String> {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|contents| parse_cpuinfo_serial(&contents))
}

/// Extracts the value of the `Serial` line from cpuinfo text.
pub fn parse_cpuinfo_serial(contents: &str) -> Option<String> {
    contents
        .lines()
        .find(|line| line.starts_with("Serial"))
        .and_then(|line| line.split_once(':'))
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
