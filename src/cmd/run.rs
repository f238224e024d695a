//! `forwarder run`: start the proxy server.
//!
//! Loads configuration from a file (or built-in defaults), applies CLI
//! overrides, validates the result, and serves until SIGTERM / Ctrl+C.
//! The config is never reloaded; restart the process to change it.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use crate::cli::RunArgs;
use crate::config::model::{Config, Route};
use crate::config::{self, validation, ConfigVersion, LoadedConfig};
use crate::error::ForwarderError;
use crate::logging;
use crate::server::{self, AppState};

/// Apply CLI / env overrides on top of the file or default config.
/// Returns true when anything changed.
pub fn apply_overrides(config: &mut Config, args: &RunArgs) -> bool {
    let mut changed = false;
    if let Some(port) = args.port {
        config.route.listen_port = port;
        changed = true;
    }
    if let Some(ref host) = args.host {
        config.route.listen_host.clone_from(host);
        changed = true;
    }
    if let Some(ref upstream) = args.upstream {
        config.route.upstream.clone_from(upstream);
        changed = true;
    }
    if let Some(ref name) = args.server_name {
        config.server_name.clone_from(name);
        changed = true;
    }
    if let Some(ref path) = args.health_path {
        config.health_path = Some(path.clone());
        changed = true;
    }
    if let Some(max_body) = args.max_body {
        config.route.max_body_bytes = max_body;
        changed = true;
    }
    if let Some(timeout) = args.connect_timeout {
        config.route.connect_timeout_ms = timeout;
        changed = true;
    }
    changed
}

/// Socket address to bind. IPv6 hosts such as `::` need no brackets.
pub fn bind_addr(route: &Route) -> Result<SocketAddr, ForwarderError> {
    let ip: IpAddr = route.listen_host.parse()?;
    Ok(SocketAddr::new(ip, route.listen_port))
}

pub async fn execute(args: RunArgs) -> Result<(), ForwarderError> {
    let log_format = logging::resolve_format(args.pretty, args.json);
    logging::init(&args.log_level, log_format);

    let mut loaded = config::load(args.config.as_deref()).await?;
    if apply_overrides(&mut loaded.config, &args) {
        // File hash no longer describes what runs
        if let ConfigVersion::Hash(_) = loaded.version {
            loaded.source_name = format!("{}+cli", loaded.source_name);
        }
        validation::validate(&loaded.config)
            .map_err(|errors| ForwarderError::ConfigValidation { errors })?;
    }

    let addr = bind_addr(&loaded.config.route)?;

    serve(loaded, addr).await
}

async fn serve(loaded: LoadedConfig, addr: SocketAddr) -> Result<(), ForwarderError> {
    let state = Arc::new(AppState::new(loaded)?);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(
        addr = %addr,
        upstream = %state.route.upstream,
        server_name = %state.route.server_name,
        max_body = %state.loaded.config.route.max_body_bytes,
        config_source = %state.loaded.source_name,
        "forwarder started"
    );

    let router = server::build_router(state);
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(server::shutdown_signal())
    .await?;

    tracing::info!("forwarder stopped");
    Ok(())
}
