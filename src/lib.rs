//! Forwarder is a single-upstream HTTP reverse proxy.
//!
//! It accepts inbound HTTP/1.1 connections, rejects bodies over a fixed
//! ceiling, rewrites a small ordered set of headers (`Host`, `X-Real-IP`,
//! `X-Forwarded-For`, `X-Forwarded-Host`, `Upgrade`, `Connection`) and
//! relays the request to one upstream. Protocol upgrades such as
//! WebSocket are relayed byte-for-byte until either side closes.
//!
//! # Architecture
//!
//! - [`cli`] -- Command-line argument parsing with clap derive macros.
//! - [`cmd`] -- Subcommand dispatch and execution (run, init, validate, health).
//! - [`config`] -- Config model, byte sizes, header templates, loading, and
//!   validation. The config is frozen at startup.
//! - [`error`] -- Unified error types using `thiserror`.
//! - [`health`] -- Optional JSON health endpoint.
//! - [`logging`] -- Structured tracing setup with JSON and pretty-print output.
//! - [`proxy`] -- Request forwarding, header rewriting, and upgrade relay.
//! - [`server`] -- Axum router, shared state, pooled HTTP client, and
//!   graceful shutdown.
//!
//! # Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `yaml` | YAML config file support _(enabled by default)_ |
//! | `toml` | TOML config file support |
//! | `file-backends` | All file formats |
//! | `full` | All features |
//!
//! JSON config files are always supported.

// Binary crate: public functions are internal, not consumed by external users.
#![allow(clippy::missing_errors_doc)]

pub mod cli;
pub mod cmd;
pub mod config;
pub mod error;
pub mod health;
pub mod logging;
pub mod proxy;
pub mod server;
