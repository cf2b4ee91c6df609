//! Shared utilities for integration tests.

#![allow(dead_code)]

use data_gateway::cache::MemoryStore;
use data_gateway::config::{GatewayConfig, UpstreamConfig};
use data_gateway::{AppContext, UpstreamResult};
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub const TEST_API_KEY: &str = "test-admin-key";

/// Upstream settings with fast, deterministic timings.
pub fn upstream(retry_attempts: u32, breaker_threshold: u32) -> UpstreamConfig {
    UpstreamConfig {
        concurrency: 2,
        requests_per_second: 5,
        retry_attempts,
        base_delay_ms: 100,
        max_delay_ms: 1_000,
        jitter: false,
        breaker_threshold,
        breaker_timeout_ms: 5_000,
        timeout_ms: 1_000,
        ..UpstreamConfig::default()
    }
}

/// Context over an in-memory store with a single `defillama` group.
pub fn context_with(upstream_config: UpstreamConfig) -> Arc<AppContext> {
    let mut config = GatewayConfig::default();
    config.admin.api_key = TEST_API_KEY.to_string();
    config.upstreams = BTreeMap::from([("defillama".to_string(), upstream_config)]);
    Arc::new(AppContext::new(config, Arc::new(MemoryStore::new())))
}

/// Fetch function that counts invocations and answers with `respond(n)`,
/// where `n` is the zero-based call number.
pub fn counting_fetch<R, Fut>(
    calls: Arc<AtomicU32>,
    respond: R,
) -> impl Fn(CancellationToken) -> Fut + Send + Sync + 'static
where
    R: Fn(u32) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = UpstreamResult<Value>> + Send + 'static,
{
    move |_token| {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        respond(n)
    }
}

/// Start a programmable JSON backend on an ephemeral port.
///
/// `f` receives the request path and returns a status code and body.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let mut buf = vec![0u8; 4096];
                        let n = socket.read(&mut buf).await.unwrap_or(0);
                        let request = String::from_utf8_lossy(&buf[..n]);
                        let path = request
                            .lines()
                            .next()
                            .and_then(|line| line.split_whitespace().nth(1))
                            .unwrap_or("/")
                            .to_string();

                        let (status, body) = f(path).await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            429 => "429 Too Many Requests",
                            500 => "500 Internal Server Error",
                            502 => "502 Bad Gateway",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}
