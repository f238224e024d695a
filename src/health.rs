//! Optional health endpoint handler.
//!
//! Served by the router fallback for `GET`/`HEAD` on `health_path`, when
//! one is configured. Returns a [`HealthResponse`] JSON payload with the
//! build version, uptime, config provenance, the upstream, and cumulative
//! request statistics.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::server::AppState;

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub build: String,
    pub uptime_seconds: u64,
    pub config: ConfigHealth,
    pub stats: StatsResponse,
}

#[derive(Serialize, Deserialize)]
pub struct ConfigHealth {
    pub source: String,
    pub version: String,
    pub loaded_ago_seconds: u64,
    pub server_name: String,
    pub upstream: String,
    pub max_body_bytes: u64,
}

#[derive(Serialize, Deserialize)]
pub struct StatsResponse {
    pub requests_forwarded: u64,
    pub requests_failed: u64,
    pub requests_rejected: u64,
    pub upgrades: u64,
}

pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let loaded = &state.loaded;

    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        build: format!(
            "{} ({})",
            env!("FORWARDER_GIT_SHORT"),
            env!("FORWARDER_BUILD_PROFILE")
        ),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        config: ConfigHealth {
            source: loaded.source_name.clone(),
            version: loaded.version.short(),
            loaded_ago_seconds: loaded.loaded_at.elapsed().as_secs(),
            server_name: state.route.server_name.clone(),
            upstream: state.route.upstream.to_string(),
            max_body_bytes: loaded.config.route.max_body_bytes.as_u64(),
        },
        stats: StatsResponse {
            requests_forwarded: state.stats.forwarded.load(Ordering::Relaxed),
            requests_failed: state.stats.failed.load(Ordering::Relaxed),
            requests_rejected: state.stats.rejected.load(Ordering::Relaxed),
            upgrades: state.stats.upgraded.load(Ordering::Relaxed),
        },
    })
}
