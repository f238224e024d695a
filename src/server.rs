//! Axum server setup, shared application state, and graceful shutdown.
//!
//! Contains [`AppState`] (the `Arc`-shared, immutable state holding the
//! loaded config, compiled route, HTTP client, and stats),
//! [`build_router`] for constructing the Axum router with middleware
//! layers, [`build_http_client`] for the connection-pooled hyper client,
//! and [`shutdown_signal`] for SIGTERM / Ctrl+C handling.

use std::net::SocketAddr;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::Method;
use axum::response::{IntoResponse, Response};
use axum::Router;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::LoadedConfig;
use crate::error::ForwarderError;
use crate::health::health_handler;
use crate::proxy::{self, ProxyRoute};

#[derive(Debug)]
pub struct Stats {
    pub forwarded: AtomicU64,
    pub failed: AtomicU64,
    pub rejected: AtomicU64,
    pub upgraded: AtomicU64,
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl Stats {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            forwarded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            upgraded: AtomicU64::new(0),
        }
    }
}

pub type HttpsConnector = hyper_rustls::HttpsConnector<HttpConnector>;
pub type HttpClient = Client<HttpsConnector, http_body_util::Full<bytes::Bytes>>;

pub struct AppState {
    pub loaded: LoadedConfig,
    pub route: ProxyRoute,
    pub http_client: HttpClient,
    pub start_time: Instant,
    pub stats: Stats,
}

impl AppState {
    /// Compile the route and build the client for a loaded config.
    pub fn new(loaded: LoadedConfig) -> Result<Self, ForwarderError> {
        let route = ProxyRoute::from_config(&loaded.config)?;
        let connect_timeout = Duration::from_millis(loaded.config.route.connect_timeout_ms);
        Ok(Self {
            loaded,
            route,
            http_client: build_http_client(connect_timeout),
            start_time: Instant::now(),
            stats: Stats::new(),
        })
    }
}

#[must_use]
pub fn build_http_client(connect_timeout: Duration) -> HttpClient {
    // Several rustls crypto providers may be compiled in; pin `ring`.
    let _ = rustls::crypto::ring::default_provider().install_default();

    let mut http = HttpConnector::new();
    http.enforce_http(false);
    http.set_connect_timeout(Some(connect_timeout));

    let https = hyper_rustls::HttpsConnectorBuilder::new()
        .with_webpki_roots()
        .https_or_http()
        .enable_http1()
        .wrap_connector(http);
    Client::builder(TokioExecutor::new())
        .pool_idle_timeout(Duration::from_secs(30))
        .build(https)
}

/// Whether a request is answered by the health report rather than
/// forwarded. The path is compared literally; any other method on the
/// same path still goes upstream.
#[must_use]
pub fn is_health_request(health_path: Option<&str>, method: &Method, path: &str) -> bool {
    health_path.is_some_and(|health| health == path)
        && (*method == Method::GET || *method == Method::HEAD)
}

async fn entry_handler(
    State(state): State<Arc<AppState>>,
    connect_info: ConnectInfo<SocketAddr>,
    req: Request,
) -> Response {
    let health_path = state.loaded.config.health_path.as_deref();
    if is_health_request(health_path, req.method(), req.uri().path()) {
        return health_handler(State(state)).await.into_response();
    }
    proxy::forward_handler(State(state), connect_info, req).await
}

pub fn build_router(state: Arc<AppState>) -> Router {
    // Single fallback: no path is ever handed to axum's route matcher
    Router::new()
        .fallback(entry_handler)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}
