//! Unified error types for the forwarder.
//!
//! Defines [`ForwarderError`] (the main crate error enum) and
//! [`ValidationError`] for config validation failures. Error messages
//! include contextual hints to guide the user toward a fix.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "  {}: {}", self.field, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, " ({suggestion})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

fn format_errors(errors: &[ValidationError]) -> String {
    use std::fmt::Write;
    let mut buf = String::new();
    for (i, e) in errors.iter().enumerate() {
        if i > 0 {
            buf.push('\n');
        }
        // write! to String is infallible
        let _ = write!(buf, "{e}");
    }
    buf
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ForwarderError {
    #[error("Config file not found: {}", path.display())]
    ConfigFileNotFound { path: PathBuf },

    #[error("Config parse error in {path}:\n  {source}")]
    ConfigParse {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Config validation failed:\n{}", format_errors(.errors))]
    ConfigValidation { errors: Vec<ValidationError> },

    #[error("Unsupported config format: '{0}'")]
    UnsupportedFormat(String),

    #[error("Invalid address: {0}")]
    AddressParse(#[from] std::net::AddrParseError),

    #[error("Invalid URI: {source}")]
    UriParse {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("HTTP request failed: {source}")]
    HttpRequest {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("File already exists: {}", path.display())]
    FileExists { path: PathBuf },

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("Health check failed with status {0}")]
    HealthCheckFailed(hyper::StatusCode),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_display_includes_suggestion() {
        let err = ValidationError {
            field: "upstream".into(),
            message: "missing port".into(),
            suggestion: Some("did you mean 'web:80'?".into()),
        };
        assert_eq!(
            err.to_string(),
            "  upstream: missing port (did you mean 'web:80'?)"
        );
    }

    #[test]
    fn config_validation_lists_every_error() {
        let err = ForwarderError::ConfigValidation {
            errors: vec![
                ValidationError {
                    field: "server_name".into(),
                    message: "cannot be empty".into(),
                    suggestion: None,
                },
                ValidationError {
                    field: "listen_port".into(),
                    message: "cannot be 0".into(),
                    suggestion: None,
                },
            ],
        };
        let text = err.to_string();
        assert!(text.contains("server_name: cannot be empty"));
        assert!(text.contains("listen_port: cannot be 0"));
    }
}
