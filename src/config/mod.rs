//! Configuration model, loading, and validation.
//!
//! The configuration is read once at startup, either from a file or from
//! built-in defaults, then frozen for the lifetime of the process.
//! [`LoadedConfig`] pairs it with provenance metadata (source and a
//! content hash) reported by the health endpoint.

pub mod model;
pub mod size;
pub mod sources;
pub mod template;
pub mod validation;

use std::path::Path;
use std::time::Instant;

use crate::error::ForwarderError;
use model::Config;
use sources::file_source::FileSource;

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigVersion {
    /// SHA-256 of the file content.
    Hash(String),
    /// No file; compiled-in defaults plus CLI overrides.
    Builtin,
}

impl ConfigVersion {
    /// Short form for display: first 8 hex chars of the hash.
    #[must_use]
    pub fn short(&self) -> String {
        match self {
            Self::Hash(h) => h.get(..8).unwrap_or(h).to_string(),
            Self::Builtin => "builtin".to_string(),
        }
    }
}

#[derive(Debug)]
pub struct LoadedConfig {
    pub config: Config,
    pub version: ConfigVersion,
    pub source_name: String,
    pub loaded_at: Instant,
}

impl LoadedConfig {
    #[must_use]
    pub fn builtin(config: Config) -> Self {
        Self {
            config,
            version: ConfigVersion::Builtin,
            source_name: "builtin".to_string(),
            loaded_at: Instant::now(),
        }
    }
}

/// Load from `explicit` if given, else from an auto-detected file in the
/// working directory, else fall back to built-in defaults.
pub async fn load(explicit: Option<&Path>) -> Result<LoadedConfig, ForwarderError> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => sources::auto_detect().await,
    };

    let Some(path) = path else {
        tracing::info!("no config file found, using built-in defaults");
        return Ok(LoadedConfig::builtin(Config::default()));
    };

    let source = FileSource::new(path);
    let (config, version) = source.load().await?;
    Ok(LoadedConfig {
        config,
        version,
        source_name: source.name().to_string(),
        loaded_at: Instant::now(),
    })
}
