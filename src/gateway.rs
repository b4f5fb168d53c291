//! Forwarding gateway to the backend JSON-RPC endpoint.
//!
//! Every forwarded request is a single HTTP POST carrying a JSON-RPC 2.0
//! envelope. The backend owns tool processes and registry data; the bridge
//! only relays. No retries and no timeout beyond the HTTP client default,
//! so a hung backend stalls the corresponding stdio request.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::{BridgeError, BridgeResult};

/// Seam between the dispatcher/builtins and the backend. Implemented by
/// [`HttpGateway`] in production and by recording mocks in tests.
#[async_trait]
pub trait Forward: Send + Sync {
    async fn forward(&self, method: &str, params: Value) -> BridgeResult<Value>;
}

#[derive(Serialize)]
struct JsonRpcEnvelope<'a> {
    jsonrpc: &'static str,
    id: u32,
    method: &'a str,
    params: &'a Value,
}

#[derive(Deserialize)]
struct BackendReply {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<BackendReplyError>,
}

#[derive(Deserialize)]
struct BackendReplyError {
    #[serde(default)]
    message: String,
}

pub struct HttpGateway {
    client: reqwest::Client,
    endpoint: Url,
}

impl HttpGateway {
    pub fn new(endpoint: Url) -> BridgeResult<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| BridgeError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl Forward for HttpGateway {
    async fn forward(&self, method: &str, params: Value) -> BridgeResult<Value> {
        let envelope = JsonRpcEnvelope {
            jsonrpc: crate::protocol::JSONRPC_VERSION,
            id: 1,
            method,
            params: &params,
        };

        debug!(method = %method, "forwarding to backend");
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&envelope)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(BridgeError::Transport {
                status: status.as_u16(),
                body,
            });
        }

        let reply: BackendReply = serde_json::from_str(&body)?;
        if let Some(error) = reply.error {
            return Err(BridgeError::Backend(error.message));
        }

        Ok(reply.result.unwrap_or(Value::Null))
    }
}
