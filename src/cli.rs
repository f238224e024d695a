//! Command-line interface definitions using clap derive macros.
//!
//! Contains the top-level [`Cli`] parser, the [`Commands`] enum for
//! subcommands (run, init, validate, health), and their associated
//! argument structs. Every `run` flag has an environment variable
//! equivalent for container deployments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::config::size::ByteSize;

#[derive(Parser)]
#[command(
    name = "forwarder",
    version,
    about = "Single-upstream HTTP reverse proxy",
    propagate_version = true,
    after_help = "\x1b[1mQuick start:\x1b[0m\n  \
        forwarder run                               Port 80 -> web:5000, 100M body limit\n  \
        forwarder run -p 8080 --upstream app:8000   Override the defaults\n  \
        forwarder init                              Write a starter config"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the proxy server
    Run(Box<RunArgs>),

    /// Generate a starter config file
    Init(InitArgs),

    /// Validate a config file without starting
    Validate(ValidateArgs),

    /// Check health of a running instance
    Health(HealthArgs),
}

#[derive(Args)]
#[command(after_help = "\x1b[1mExamples:\x1b[0m\n  \
        forwarder run                                  Auto-detect ./forwarder.yaml or use defaults\n  \
        forwarder run -c forwarder.yaml                Specific config file\n  \
        forwarder run -p 8080 --max-body 10M --pretty  Local dev mode")]
pub struct RunArgs {
    /// Config file path (.yaml, .json, .toml)
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<PathBuf>,

    /// Listen port [default: 80]
    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,

    /// Listen address [default: 0.0.0.0]
    #[arg(long, env = "HOST")]
    pub host: Option<String>,

    /// Upstream host:port or URL [default: web:5000]
    #[arg(short, long, env = "UPSTREAM")]
    pub upstream: Option<String>,

    /// Name exposed to header templates as $server_name [default: localhost]
    #[arg(long, env = "SERVER_NAME")]
    pub server_name: Option<String>,

    /// Serve a JSON health report on this path instead of forwarding it
    #[arg(long, env = "HEALTH_PATH")]
    pub health_path: Option<String>,

    // -- Logging --
    /// Log level
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: LogLevel,

    /// Force pretty (human-readable) log output
    #[arg(long)]
    pub pretty: bool,

    /// Force JSON log output (overrides TTY detection)
    #[arg(long, conflicts_with = "pretty")]
    pub json: bool,

    // -- Tuning --
    /// Max request body size, e.g. 100M [default: 100M]
    #[arg(long, env = "MAX_BODY_SIZE", help_heading = "Tuning")]
    pub max_body: Option<ByteSize>,

    /// Upstream connect timeout in milliseconds [default: 60000]
    #[arg(long, env = "CONNECT_TIMEOUT_MS", help_heading = "Tuning")]
    pub connect_timeout: Option<u64>,
}

#[derive(Args)]
#[command(after_help = "\x1b[1mExamples:\x1b[0m\n  \
        forwarder init                          Starter config (yaml)\n  \
        forwarder init -f toml -o proxy.toml    TOML format, custom path")]
pub struct InitArgs {
    /// Output format
    #[arg(short, long, default_value = "yaml")]
    pub format: ConfigFormat,

    /// Output file path
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct ValidateArgs {
    /// Config file to validate
    #[arg(default_value = "forwarder.yaml")]
    pub config: PathBuf,

    /// Output format
    #[arg(long, default_value = "text")]
    pub format: ValidateFormat,
}

#[derive(Args)]
pub struct HealthArgs {
    /// Full URL of the instance's health endpoint, i.e. its `health_path`.
    /// Required: the endpoint is off unless configured, and any other path
    /// would be forwarded upstream.
    pub url: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    #[must_use]
    pub const fn to_tracing_level(&self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

#[derive(Clone, Debug, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

impl ConfigFormat {
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Yaml => "yaml",
            Self::Json => "json",
            Self::Toml => "toml",
        }
    }
}

#[derive(Clone, Debug, ValueEnum)]
pub enum ValidateFormat {
    Text,
    Json,
}
