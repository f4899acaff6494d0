use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use crate::{parse, Error, Result, SendError};

/// The three catalog operations the collector relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Product-name autocomplete.
    Autocomplete,
    /// Paginated price search per (name, region).
    PriceSearch,
    /// Pharmacy + product detail lookup.
    Detail,
}

impl Endpoint {
    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Autocomplete => "/observatorio/precios.aspx/GetMedicine",
            Endpoint::PriceSearch => "/observatorio/wsObservatorio.asmx/listPrice",
            Endpoint::Detail => "/observatorio/wsObservatorio.asmx/loadDataPharma",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Endpoint::Autocomplete => "autocomplete",
            Endpoint::PriceSearch => "price search",
            Endpoint::Detail => "detail",
        };
        f.write_str(name)
    }
}

/// A single POST of a JSON body, returning the raw response body.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, endpoint: Endpoint, body: &Value) -> core::result::Result<String, SendError>;
}

pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(HttpTransport {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, endpoint: Endpoint, body: &Value) -> core::result::Result<String, SendError> {
        let url = format!("{}{}", self.base_url, endpoint.path());
        let res = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| SendError::Retryable(e.to_string()))?;

        let status = res.status();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(SendError::Retryable(format!("{url} answered {status}")));
        }
        if !status.is_success() {
            return Err(SendError::Rejected(format!("{url} answered {status}")));
        }
        res.text().await.map_err(|e| SendError::Retryable(e.to_string()))
    }
}

/// Exponential backoff between attempts, doubling from `min_backoff` up to `max_backoff`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub min_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_retries: 10,
            min_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
        }
    }
}

/// Client for the remote catalog. Cheap to clone, the transport is shared.
#[derive(Clone)]
pub struct CatalogClient {
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
}

impl CatalogClient {
    pub fn new(transport: Arc<dyn Transport>, retry: RetryPolicy) -> Self {
        CatalogClient { transport, retry }
    }

    /// Posts `body` to `endpoint` and returns the envelope's fragments.
    ///
    /// Retryable transport failures are retried with backoff. A response that
    /// arrives but can't be decoded is never retried.
    pub async fn post(&self, endpoint: Endpoint, body: &Value) -> Result<Vec<String>> {
        let attempts = self.retry.max_retries.saturating_add(1);
        let mut backoff = self.retry.min_backoff;
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.transport.send(endpoint, body).await {
                Ok(text) => {
                    debug!(%endpoint, attempt, bytes = text.len(), "received response");
                    return parse::envelope(endpoint, &text);
                }
                Err(SendError::Retryable(reason)) if attempt < attempts => {
                    warn!(%endpoint, attempt, %reason, "request failed, retrying in {backoff:?}");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(self.retry.max_backoff);
                }
                Err(err) => {
                    return Err(Error::Transport {
                        endpoint,
                        attempts: attempt,
                        reason: err.to_string(),
                    })
                }
            }
        }
    }
}
