//! Stub transport for unit tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::request::{CatalogClient, Endpoint, RetryPolicy, Transport};
use crate::SendError;

type Handler = dyn Fn(Endpoint, &Value, usize) -> Result<String, SendError> + Send + Sync;

/// Answers every request through `handler`, which also receives the number of
/// earlier calls to the same endpoint. Records every request body.
pub(crate) struct StubTransport {
    handler: Box<Handler>,
    requests: Mutex<HashMap<Endpoint, Vec<Value>>>,
}

impl StubTransport {
    pub(crate) fn new<F>(handler: F) -> Arc<Self>
    where
        F: Fn(Endpoint, &Value, usize) -> Result<String, SendError> + Send + Sync + 'static,
    {
        Arc::new(StubTransport {
            handler: Box::new(handler),
            requests: Mutex::new(HashMap::new()),
        })
    }

    pub(crate) fn calls(&self, endpoint: Endpoint) -> usize {
        self.requests(endpoint).len()
    }

    pub(crate) fn requests(&self, endpoint: Endpoint) -> Vec<Value> {
        self.requests.lock().unwrap().get(&endpoint).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn send(&self, endpoint: Endpoint, body: &Value) -> Result<String, SendError> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            let seen = requests.entry(endpoint).or_default();
            seen.push(body.clone());
            seen.len() - 1
        };
        (self.handler)(endpoint, body, call)
    }
}

/// Client over `stub` with three quick retries.
pub(crate) fn client(stub: &Arc<StubTransport>) -> CatalogClient {
    let retry = RetryPolicy {
        max_retries: 3,
        min_backoff: Duration::ZERO,
        max_backoff: Duration::ZERO,
    };
    CatalogClient::new(stub.clone(), retry)
}

pub(crate) fn envelope(fragments: &[String]) -> String {
    json!({ "d": fragments }).to_string()
}

/// A price-search response with the given entries and page count.
pub(crate) fn price_page(entries: Value, total_pages: u32) -> String {
    envelope(&[entries.to_string(), json!([{ "tpaginas": total_pages }]).to_string()])
}

/// A detail response naming the pharmacy after its id and the product after its id.
pub(crate) fn detail_for(body: &Value) -> String {
    let pharmacy = body["cod_estab"].as_str().unwrap_or_default();
    let product = body["cod_prod"].as_i64().unwrap_or_default();
    envelope(&[
        json!([{ "nombre": format!("BOTICA {pharmacy}"), "ruc": "20100" }]).to_string(),
        json!([{ "b": format!("MARCA {product}"), "c": "500 mg" }]).to_string(),
    ])
}
