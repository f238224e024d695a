//! File-based config loading.
//!
//! Provides [`FileSource`](file_source::FileSource), the
//! [`parse_config_str`] helper for format-specific deserialization
//! (YAML, JSON, TOML gated by feature flags), and working-directory
//! auto-detection.

pub mod file_source;

use std::path::PathBuf;

use sha2::{Digest, Sha256};

use crate::config::model::Config;
use crate::error::ForwarderError;

/// File names probed, in order, when no config path is given.
pub const CANDIDATES: &[&str] = &[
    "forwarder.yaml",
    "forwarder.yml",
    "forwarder.json",
    "forwarder.toml",
];

/// Parse a config string based on file extension.
pub fn parse_config_str(
    ext: &str,
    content: &str,
    path_display: &str,
) -> Result<Config, ForwarderError> {
    match ext {
        #[cfg(feature = "yaml")]
        "yaml" | "yml" => serde_yml::from_str(content).map_err(|e| ForwarderError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        "json" => serde_json::from_str(content).map_err(|e| ForwarderError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        #[cfg(feature = "toml")]
        "toml" => toml::from_str(content).map_err(|e| ForwarderError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        other => Err(ForwarderError::UnsupportedFormat(other.to_string())),
    }
}

/// Compute a lowercase hex-encoded SHA-256 digest.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// First of [`CANDIDATES`] present in the working directory.
pub async fn auto_detect() -> Option<PathBuf> {
    for name in CANDIDATES {
        let path = PathBuf::from(name);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::info!(path = %path.display(), "auto-detected config file");
            return Some(path);
        }
    }
    None
}
