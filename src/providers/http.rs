//! Cancellable JSON GET against an upstream URL.
//!
//! # Responsibilities
//! - Issue one GET and decode the body as JSON
//! - Map transport failures, HTTP status codes and cancellation onto
//!   [`UpstreamError`] so the queue can classify them for retry
//! - Optionally wrap a bare scalar response as `{ field: value }`

use futures_util::future::{BoxFuture, FutureExt};
use reqwest::Client;
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::error::{UpstreamError, UpstreamResult};

/// Shared HTTP client for JSON upstreams.
#[derive(Clone)]
pub struct HttpJsonProvider {
    client: Client,
}

impl HttpJsonProvider {
    pub fn new() -> Self {
        Self::with_client(Client::new())
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// GET `url` and decode JSON. Returns `Cancelled` as soon as `token` fires.
    pub async fn fetch_json(
        &self,
        url: &str,
        wrap_field: Option<&str>,
        token: CancellationToken,
    ) -> UpstreamResult<Value> {
        tokio::select! {
            _ = token.cancelled() => Err(UpstreamError::Cancelled),
            result = self.get(url) => result.map(|value| match wrap_field {
                Some(field) => wrap_scalar(value, field),
                None => value,
            }),
        }
    }

    /// A fetch function for the orchestrator bound to one URL.
    pub fn fetcher(
        &self,
        url: impl Into<String>,
        wrap_field: Option<String>,
    ) -> impl Fn(CancellationToken) -> BoxFuture<'static, UpstreamResult<Value>> + Send + Sync + 'static {
        let provider = self.clone();
        let url: Arc<str> = Arc::from(url.into());
        let wrap_field: Option<Arc<str>> = wrap_field.map(Arc::from);
        move |token| {
            let provider = provider.clone();
            let url = url.clone();
            let wrap_field = wrap_field.clone();
            async move { provider.fetch_json(&url, wrap_field.as_deref(), token).await }.boxed()
        }
    }

    async fn get(&self, url: &str) -> UpstreamResult<Value> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| UpstreamError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(UpstreamError::http(status.as_u16(), body));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| UpstreamError::Internal(format!("invalid JSON from upstream: {e}")))
    }
}

impl Default for HttpJsonProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Objects and arrays pass through; anything else becomes `{ field: value }`.
pub fn wrap_scalar(value: Value, field: &str) -> Value {
    match value {
        Value::Object(_) | Value::Array(_) => value,
        scalar => {
            let mut map = Map::new();
            map.insert(field.to_string(), scalar);
            Value::Object(map)
        }
    }
}
