//! Bidirectional relay for upgraded connections (e.g. WebSocket).
//!
//! Once both the client and the upstream have switched protocols, bytes
//! are copied in each direction concurrently. The pair lives until either
//! side closes or errors; then both write halves are shut down.

use hyper::upgrade::OnUpgrade;
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClosedBy {
    Client,
    Upstream,
}

#[derive(Debug)]
pub struct RelaySummary {
    pub closed_by: ClosedBy,
    /// Bytes copied in the direction that finished first.
    pub bytes: u64,
}

/// Wait for both upgrades to complete, then relay until one side closes.
pub async fn relay(client: OnUpgrade, upstream: OnUpgrade, correlation_id: String) {
    let (client, upstream) = match tokio::try_join!(client, upstream) {
        Ok(pair) => pair,
        Err(e) => {
            tracing::warn!(
                correlation_id = %correlation_id,
                error = %e,
                "protocol upgrade failed"
            );
            return;
        }
    };

    tracing::debug!(correlation_id = %correlation_id, "upgrade relay established");

    match pump(TokioIo::new(client), TokioIo::new(upstream)).await {
        Ok(summary) => tracing::info!(
            correlation_id = %correlation_id,
            closed_by = ?summary.closed_by,
            bytes = summary.bytes,
            "upgrade relay closed"
        ),
        Err(e) => tracing::warn!(
            correlation_id = %correlation_id,
            error = %e,
            "upgrade relay failed"
        ),
    }
}

/// Copy `client` <-> `upstream` until either read side reaches EOF.
pub async fn pump<C, U>(client: C, upstream: U) -> std::io::Result<RelaySummary>
where
    C: AsyncRead + AsyncWrite + Unpin,
    U: AsyncRead + AsyncWrite + Unpin,
{
    let (mut client_read, mut client_write) = tokio::io::split(client);
    let (mut upstream_read, mut upstream_write) = tokio::io::split(upstream);

    let result = tokio::select! {
        r = tokio::io::copy(&mut client_read, &mut upstream_write) => {
            r.map(|bytes| RelaySummary { closed_by: ClosedBy::Client, bytes })
        }
        r = tokio::io::copy(&mut upstream_read, &mut client_write) => {
            r.map(|bytes| RelaySummary { closed_by: ClosedBy::Upstream, bytes })
        }
    };

    let _ = upstream_write.shutdown().await;
    let _ = client_write.shutdown().await;

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn relays_both_directions() {
        let (mut client, proxy_client) = tokio::io::duplex(64);
        let (proxy_upstream, mut upstream) = tokio::io::duplex(64);
        let relay = tokio::spawn(pump(proxy_client, proxy_upstream));

        client.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        upstream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        upstream.write_all(b"pong").await.unwrap();
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong");

        drop(client);
        let summary = relay.await.unwrap().unwrap();
        assert_eq!(summary.closed_by, ClosedBy::Client);
        assert_eq!(summary.bytes, 4);
    }

    #[tokio::test]
    async fn upstream_close_terminates_client_side() {
        let (mut client, proxy_client) = tokio::io::duplex(64);
        let (proxy_upstream, upstream) = tokio::io::duplex(64);
        let relay = tokio::spawn(pump(proxy_client, proxy_upstream));

        drop(upstream);
        let summary = relay.await.unwrap().unwrap();
        assert_eq!(summary.closed_by, ClosedBy::Upstream);

        let mut rest = Vec::new();
        let n = client.read_to_end(&mut rest).await.unwrap();
        assert_eq!(n, 0);
    }
}
