//! Async file-based config source with SHA-256 versioning.
//!
//! [`FileSource`] reads the file via Tokio, picks the format from the
//! extension, validates the result, and hashes the raw content so the
//! health endpoint can report which revision is running.

use std::path::{Path, PathBuf};

use super::{parse_config_str, sha256_hex};
use crate::config::model::Config;
use crate::config::validation::validate;
use crate::config::ConfigVersion;
use crate::error::ForwarderError;

pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn extension(&self) -> &str {
        self.path.extension().and_then(|e| e.to_str()).unwrap_or("")
    }

    /// Format label, e.g. `"yaml"`.
    #[must_use]
    pub fn name(&self) -> &str {
        match self.extension() {
            "yml" => "yaml",
            other => other,
        }
    }

    async fn read_content(&self) -> Result<String, ForwarderError> {
        tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ForwarderError::ConfigFileNotFound {
                    path: self.path.clone(),
                }
            } else {
                ForwarderError::Io(e)
            }
        })
    }

    pub async fn load(&self) -> Result<(Config, ConfigVersion), ForwarderError> {
        let content = self.read_content().await?;
        let config = parse_config_str(
            self.extension(),
            &content,
            &self.path.display().to_string(),
        )?;

        if let Err(errors) = validate(&config) {
            return Err(ForwarderError::ConfigValidation { errors });
        }

        let hash = sha256_hex(content.as_bytes());
        Ok((config, ConfigVersion::Hash(hash)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("forwarder-{}-{name}", std::process::id()))
    }

    #[tokio::test]
    async fn loads_and_hashes_json() {
        let path = temp_path("load.json");
        let content = r#"{"route": {"upstream": "app:9000"}}"#;
        tokio::fs::write(&path, content).await.unwrap();

        let source = FileSource::new(path.clone());
        let (config, version) = source.load().await.unwrap();
        assert_eq!(config.route.upstream, "app:9000");
        assert_eq!(version, ConfigVersion::Hash(sha256_hex(content.as_bytes())));
        assert_eq!(source.name(), "json");

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn invalid_config_is_rejected() {
        let path = temp_path("invalid.json");
        tokio::fs::write(&path, r#"{"route": {"listen_port": 0}}"#)
            .await
            .unwrap();

        let result = FileSource::new(path.clone()).load().await;
        assert!(matches!(
            result,
            Err(ForwarderError::ConfigValidation { .. })
        ));

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let result = FileSource::new(temp_path("missing.json")).load().await;
        assert!(matches!(
            result,
            Err(ForwarderError::ConfigFileNotFound { .. })
        ));
    }
}
