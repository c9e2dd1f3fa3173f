//! Minimal HTTP/1 GET client used between the two processes.

use std::time::Duration;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Empty};
use hyper_util::rt::TokioIo;
use thiserror::Error;
use tracing::debug;

use fngrid_core::AutoscalerStatus;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("connect to {address} failed: {source}")]
    Connect {
        address: String,
        source: std::io::Error,
    },

    #[error("http error: {0}")]
    Http(#[from] hyper::Error),

    #[error("invalid request: {0}")]
    Request(#[from] http::Error),

    #[error("request to {0} timed out")]
    Timeout(String),

    #[error("unexpected status {0}")]
    Status(StatusCode),

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}

/// GET `http://{address}{path}` and return status and body.
///
/// The whole exchange (connect, handshake, request, body) is bounded by
/// `timeout`.
pub async fn http_get(
    address: &str,
    path: &str,
    timeout: Duration,
) -> Result<(StatusCode, Bytes), SyncError> {
    let uri = format!("http://{address}{path}");

    let exchange = async {
        let stream = tokio::net::TcpStream::connect(address)
            .await
            .map_err(|source| SyncError::Connect {
                address: address.to_string(),
                source,
            })?;

        let io = TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io).await?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!(error = %e, "connection closed with error");
            }
        });

        let req = http::Request::builder()
            .method("GET")
            .uri(path)
            .header("host", address)
            .header("user-agent", "fngrid-sync/0.1")
            .body(Empty::<Bytes>::new())?;

        let resp = sender.send_request(req).await?;
        let status = resp.status();
        let body = resp.into_body().collect().await?.to_bytes();
        Ok::<_, SyncError>((status, body))
    };

    match tokio::time::timeout(timeout, exchange).await {
        Ok(result) => result,
        Err(_) => Err(SyncError::Timeout(uri)),
    }
}

/// Fetch and decode the autoscaler's `GET /status`.
pub async fn fetch_autoscaler_status(
    address: &str,
    timeout: Duration,
) -> Result<AutoscalerStatus, SyncError> {
    let (status, body) = http_get(address, "/status", timeout).await?;
    if status != StatusCode::OK {
        return Err(SyncError::Status(status));
    }
    Ok(serde_json::from_slice(&body)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_address_fails_fast() {
        // Bind then drop to get a port nothing listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = http_get(&address, "/status", Duration::from_millis(500))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Connect { .. }), "got {err}");
    }

    #[tokio::test]
    async fn silent_server_times_out() {
        // Accepts the connection but never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let err = http_get(&address, "/status", Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Timeout(_)), "got {err}");
    }

    #[tokio::test]
    async fn reads_status_and_body() {
        let app = axum::Router::new().route("/status", axum::routing::get(|| async { "ok" }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let (status, body) = http_get(&address, "/status", Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(&body[..], b"ok");

        let (status, _) = http_get(&address, "/missing", Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
