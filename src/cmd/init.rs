//! `forwarder init`: generate a starter configuration file.
//!
//! Serializes the built-in defaults in the chosen format so every knob
//! is visible and ready to edit. Refuses to overwrite an existing file.

use std::path::PathBuf;

use crate::cli::{ConfigFormat, InitArgs};
use crate::config::model::Config;
use crate::error::ForwarderError;

const HEADER: &str = "forwarder config: single route, fixed upstream.\n\
    Template variables: $host $remote_addr $proxy_add_x_forwarded_for\n\
    $server_name $scheme $connection_upgrade $http_<header>";

pub fn execute(args: &InitArgs) -> Result<(), ForwarderError> {
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("forwarder.{}", args.format.extension())));

    if output.exists() {
        return Err(ForwarderError::FileExists { path: output });
    }

    let content = render_starter(&args.format)?;
    std::fs::write(&output, content)?;
    println!("Created {}", output.display());
    Ok(())
}

/// Serialize the default config, with a comment header where the
/// format allows one.
pub fn render_starter(format: &ConfigFormat) -> Result<String, ForwarderError> {
    let config = Config::default();
    let to_io = |e: &dyn std::fmt::Display| ForwarderError::Io(std::io::Error::other(e.to_string()));

    match format {
        #[cfg(feature = "yaml")]
        ConfigFormat::Yaml => serde_yml::to_string(&config)
            .map(|body| format!("{}\n{body}", comment_block(HEADER)))
            .map_err(|e| to_io(&e)),

        #[cfg(not(feature = "yaml"))]
        ConfigFormat::Yaml => Err(ForwarderError::UnsupportedFormat("yaml".into())),

        ConfigFormat::Json => serde_json::to_string_pretty(&config)
            .map(|body| format!("{body}\n"))
            .map_err(|e| to_io(&e)),

        #[cfg(feature = "toml")]
        ConfigFormat::Toml => toml::to_string_pretty(&config)
            .map(|body| format!("{}\n{body}", comment_block(HEADER)))
            .map_err(|e| to_io(&e)),

        #[cfg(not(feature = "toml"))]
        ConfigFormat::Toml => Err(ForwarderError::UnsupportedFormat("toml".into())),
    }
}

#[cfg_attr(not(any(feature = "yaml", feature = "toml")), allow(dead_code))]
fn comment_block(text: &str) -> String {
    text.lines()
        .map(|line| format!("# {line}\n"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::sources::parse_config_str;
    use crate::config::validation::validate;

    #[test]
    fn json_starter_parses_back_to_defaults() {
        let content = render_starter(&ConfigFormat::Json).unwrap();
        let config = parse_config_str("json", &content, "starter.json").unwrap();
        validate(&config).unwrap();
        assert_eq!(config.route.upstream, "web:5000");
        assert_eq!(config.route.max_body_bytes.as_u64(), 100 << 20);
        assert!(content.contains("\"100M\""));
    }

    #[cfg(feature = "yaml")]
    #[test]
    fn yaml_starter_has_comment_header() {
        let content = render_starter(&ConfigFormat::Yaml).unwrap();
        assert!(content.starts_with("# forwarder config"));
        let config = parse_config_str("yaml", &content, "starter.yaml").unwrap();
        assert_eq!(config.route.header_rewrites.len(), 6);
    }

    #[test]
    fn refuses_to_overwrite() {
        let path = std::env::temp_dir().join(format!("forwarder-init-{}.json", std::process::id()));
        std::fs::write(&path, "{}").unwrap();
        let args = InitArgs {
            format: ConfigFormat::Json,
            output: Some(path.clone()),
        };
        assert!(matches!(
            execute(&args),
            Err(ForwarderError::FileExists { .. })
        ));
        let _ = std::fs::remove_file(&path);
    }
}
