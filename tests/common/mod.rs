//! Shared helpers: a recording upstream and a forwarder wired to it.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use hyper_util::rt::TokioIo;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use forwarder::config::model::Config;
use forwarder::config::LoadedConfig;
use forwarder::server::{self, AppState};

/// What the upstream saw, echoed back as JSON.
#[derive(Debug, Serialize, Deserialize)]
pub struct Echo {
    pub method: String,
    pub uri: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Echo {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

pub struct Upstream {
    pub addr: SocketAddr,
    pub hits: Arc<AtomicUsize>,
    shutdown: tokio::sync::oneshot::Sender<()>,
}

impl Upstream {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }

    pub fn stop(self) {
        let _ = self.shutdown.send(());
    }
}

async fn echo(
    State(hits): State<Arc<AtomicUsize>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    hits.fetch_add(1, Ordering::SeqCst);
    let headers = headers
        .iter()
        .map(|(k, v)| {
            (
                k.as_str().to_string(),
                String::from_utf8_lossy(v.as_bytes()).into_owned(),
            )
        })
        .collect();
    (
        StatusCode::CREATED,
        [("x-upstream", "echo")],
        Json(Echo {
            method: method.to_string(),
            uri: uri.to_string(),
            headers,
            body: String::from_utf8_lossy(&body).into_owned(),
        }),
    )
}

/// Switches protocols and echoes bytes until the peer closes or sends
/// `close`.
async fn upgrade_echo(State(hits): State<Arc<AtomicUsize>>, mut req: Request) -> Response {
    hits.fetch_add(1, Ordering::SeqCst);
    let on_upgrade = hyper::upgrade::on(&mut req);
    tokio::spawn(async move {
        let Ok(upgraded) = on_upgrade.await else {
            return;
        };
        let mut io = TokioIo::new(upgraded);
        let mut buf = [0u8; 1024];
        loop {
            let n = match io.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            };
            if &buf[..n] == b"close" {
                break;
            }
            if io.write_all(&buf[..n]).await.is_err() {
                break;
            }
        }
    });

    Response::builder()
        .status(StatusCode::SWITCHING_PROTOCOLS)
        .header(header::UPGRADE, "websocket")
        .header(header::CONNECTION, "upgrade")
        .body(Body::empty())
        .unwrap()
}

pub async fn start_upstream() -> Upstream {
    let hits = Arc::new(AtomicUsize::new(0));
    let router = Router::new()
        .route("/ws", get(upgrade_echo))
        .fallback(echo)
        .with_state(hits.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
            .unwrap();
    });

    Upstream {
        addr,
        hits,
        shutdown,
    }
}

pub fn proxy_config(upstream: &str) -> Config {
    let mut config = Config::default();
    config.server_name = "proxy.test".into();
    config.health_path = Some("/__health".into());
    config.route.upstream = upstream.into();
    config.route.connect_timeout_ms = 2_000;
    config
}

pub async fn start_proxy(config: Config) -> (SocketAddr, tokio::sync::oneshot::Sender<()>) {
    let state = Arc::new(AppState::new(LoadedConfig::builtin(config)).unwrap());
    let router = server::build_router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        })
        .await
        .unwrap();
    });

    (addr, shutdown_tx)
}

/// Read from a raw stream until the end of an HTTP response head.
pub async fn read_head(stream: &mut tokio::net::TcpStream) -> String {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        let n = stream.read(&mut byte).await.unwrap();
        assert!(n > 0, "connection closed before response head");
        head.push(byte[0]);
    }
    String::from_utf8(head).unwrap()
}
