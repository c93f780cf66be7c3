use std::{fs, path::PathBuf};

use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("Can't resolve host {0}")]
    Resolve(String),

    #[error("Can't connect to device: {0}")]
    Connection(String),
}

impl ApiError {
    /// Error key shown on the wizard form.
    pub fn form_error(&self) -> &'static str {
        match self {
            ApiError::Resolve(_) => "resolve_error",
            ApiError::Connection(_) => "connection_error",
        }
    }
}

/// What the device reports about itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub name: String,
    #[serde(default)]
    pub friendly_name: String,
    pub mac_address: String,
    #[serde(default)]
    pub project_name: String,
    #[serde(default)]
    pub project_version: String,
}

impl DeviceInfo {
    pub fn display_name(&self) -> &str {
        if self.friendly_name.is_empty() {
            &self.name
        } else {
            &self.friendly_name
        }
    }
}

/// Connection to a device's native API.
pub trait DeviceApi {
    fn device_info(
        &self,
        host: &str,
        port: u16,
        noise_psk: Option<&str>,
    ) -> Result<DeviceInfo, ApiError>;
}

/// Answers with a device description saved as JSON, for offline setup.
pub struct FileDeviceApi {
    path: PathBuf,
}

impl FileDeviceApi {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DeviceApi for FileDeviceApi {
    fn device_info(
        &self,
        host: &str,
        port: u16,
        _noise_psk: Option<&str>,
    ) -> Result<DeviceInfo, ApiError> {
        if host.trim().is_empty() {
            return Err(ApiError::Resolve(host.to_string()));
        }

        info!(
            "Reading device info for {}:{} from {}",
            host,
            port,
            self.path.display()
        );

        let content = fs::read_to_string(&self.path)
            .map_err(|e| ApiError::Connection(format!("{}: {}", self.path.display(), e)))?;
        serde_json::from_str(&content).map_err(|e| ApiError::Connection(e.to_string()))
    }
}

/// Lowercase, colon separated MAC address.
pub fn format_mac(mac: &str) -> String {
    let hex: String = mac
        .chars()
        .filter(|c| c.is_ascii_hexdigit())
        .collect::<String>()
        .to_ascii_lowercase();

    if hex.len() != 12 {
        return mac.to_string();
    }

    hex.as_bytes()
        .chunks(2)
        .map(|pair| String::from_utf8_lossy(pair).into_owned())
        .collect::<Vec<_>>()
        .join(":")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_mac() {
        assert_eq!(format_mac("A4CF12B3C4D5"), "a4:cf:12:b3:c4:d5");
        assert_eq!(format_mac("a4-cf-12-b3-c4-d5"), "a4:cf:12:b3:c4:d5");
        assert_eq!(format_mac("a4:cf:12:b3:c4:d5"), "a4:cf:12:b3:c4:d5");
        assert_eq!(format_mac("not-a-mac"), "not-a-mac");
    }

    #[test]
    fn test_display_name() {
        let mut info = DeviceInfo {
            name: "smartvanio-rs-4a0afc".to_string(),
            ..Default::default()
        };
        assert_eq!(info.display_name(), "smartvanio-rs-4a0afc");
        info.friendly_name = "Van tanks".to_string();
        assert_eq!(info.display_name(), "Van tanks");
    }

    #[test]
    fn test_file_api_errors() {
        let api = FileDeviceApi::new("/nonexistent/smartvanio-device.json");
        assert_eq!(
            api.device_info("", 6053, None).unwrap_err().form_error(),
            "resolve_error"
        );
        assert_eq!(
            api.device_info("192.168.0.38", 6053, None)
                .unwrap_err()
                .form_error(),
            "connection_error"
        );
    }
}
