use std::path::PathBuf;

use thiserror::Error;

/// Capture facility failures. The `Display` text is what the user sees.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("No network devices found. Make sure libpcap is installed and run with root privileges")]
    NoDevice,

    #[error("Permission denied while opening {device}: {reason}. Run as root/Administrator")]
    Privilege { device: String, reason: String },

    #[error("Failed to open capture on {device}: {reason}")]
    Open { device: String, reason: String },

    #[error("Failed to apply capture filter: {0}")]
    Filter(String),

    #[error("Capture read error: {0}")]
    Read(String),

    #[error("Packet capture is not compiled in; rebuild with `--features capture`")]
    Unsupported,
}

impl CaptureError {
    /// Classifies an open failure, telling privilege problems apart from the rest.
    pub fn open_failed(device: &str, reason: impl ToString) -> Self {
        let reason = reason.to_string();
        let lower = reason.to_lowercase();
        if lower.contains("permission") || lower.contains("not permitted") || lower.contains("access is denied") {
            CaptureError::Privilege { device: device.to_string(), reason }
        } else {
            CaptureError::Open { device: device.to_string(), reason }
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Config file {path} is not valid JSON: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
