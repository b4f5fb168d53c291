//! Newline-delimited JSON-RPC transport.
//!
//! One frame in, one frame out, in order. The loop is sequential on
//! purpose: response ordering is part of the contract with the client, and
//! post-initialization state is read-only, so there is nothing to pipeline
//! against. Diagnostics go to stderr via `tracing`; stdout carries protocol
//! frames only.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

use crate::{
    dispatch::Dispatcher,
    error::BridgeResult,
    protocol::{JsonRpcError, JsonRpcRequest, JsonRpcResponse},
};

/// Serve requests from `reader` until EOF, answering on `writer`.
pub async fn serve<R, W>(dispatcher: Arc<Dispatcher>, reader: R, mut writer: W) -> BridgeResult<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        let frame = line.trim();
        if frame.is_empty() {
            continue;
        }

        let request: JsonRpcRequest = match serde_json::from_str(frame) {
            Ok(request) => request,
            Err(error) => {
                warn!(error = %error, "dropping unparseable frame");
                let response =
                    JsonRpcResponse::failure(serde_json::Value::Null, JsonRpcError::parse_error());
                write_frame(&mut writer, &response).await?;
                continue;
            }
        };

        if request.is_notification() {
            debug!(method = %request.method, "notification consumed");
            continue;
        }

        let id = request.id.unwrap_or(serde_json::Value::Null);
        debug!(method = %request.method, "handling request");
        let response = match dispatcher.dispatch(&request.method, request.params).await {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => JsonRpcResponse::failure(id, error),
        };
        write_frame(&mut writer, &response).await?;
    }

    debug!("stdin closed; shutting down");
    Ok(())
}

async fn write_frame<W>(writer: &mut W, response: &JsonRpcResponse) -> BridgeResult<()>
where
    W: AsyncWrite + Unpin,
{
    let mut frame = serde_json::to_vec(response)?;
    frame.push(b'\n');
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use tokio::io::AsyncReadExt;

    use super::*;
    use crate::{
        builtin::BuiltinToolset,
        config::FeatureFlags,
        error::BridgeResult,
        gateway::Forward,
        registry::SearchService,
    };

    struct EchoForwarder;

    #[async_trait]
    impl Forward for EchoForwarder {
        async fn forward(&self, method: &str, params: Value) -> BridgeResult<Value> {
            Ok(json!({"method": method, "params": params}))
        }
    }

    fn test_dispatcher() -> Arc<Dispatcher> {
        let gateway: Arc<dyn Forward> = Arc::new(EchoForwarder);
        let search = Arc::new(SearchService::new());
        let builtins =
            BuiltinToolset::new(search.clone(), gateway.clone(), FeatureFlags::default());
        Arc::new(Dispatcher::new(gateway, builtins, search, FeatureFlags::default()))
    }

    async fn run_session(input: &str) -> Vec<Value> {
        let dispatcher = test_dispatcher();
        let reader = std::io::Cursor::new(input.as_bytes().to_vec());
        let (write_half, mut read_half) = tokio::io::duplex(64 * 1024);

        serve(dispatcher, reader, write_half).await.unwrap();

        let mut output = String::new();
        read_half.read_to_string(&mut output).await.unwrap();
        output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_one_response_per_request_in_order() {
        let input = "{\"id\": 1, \"method\": \"ping\"}\n{\"id\": 2, \"method\": \"ping\"}\n";
        let responses = run_session(input).await;
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["id"], 1);
        assert_eq!(responses[1]["id"], 2);
        assert_eq!(responses[0]["result"], json!({}));
    }

    #[tokio::test]
    async fn test_parse_error_answered_with_null_id() {
        let responses = run_session("this is not json\n").await;
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["id"], Value::Null);
        assert_eq!(responses[0]["error"]["code"], crate::protocol::PARSE_ERROR);
    }

    #[tokio::test]
    async fn test_notifications_get_no_response() {
        let input = "{\"method\": \"notifications/initialized\"}\n{\"id\": 7, \"method\": \"ping\"}\n";
        let responses = run_session(input).await;
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["id"], 7);
    }

    #[tokio::test]
    async fn test_blank_lines_skipped_and_eof_terminates() {
        let responses = run_session("\n\n{\"id\": 3, \"method\": \"ping\"}\n\n").await;
        assert_eq!(responses.len(), 1);
    }

    #[tokio::test]
    async fn test_pass_through_response_reaches_client() {
        let input = "{\"id\": 4, \"method\": \"resources/list\", \"params\": {\"cursor\": \"c\"}}\n";
        let responses = run_session(input).await;
        assert_eq!(responses[0]["result"]["method"], "resources/list");
        assert_eq!(responses[0]["result"]["params"]["cursor"], "c");
    }

    #[tokio::test]
    async fn test_unknown_method_yields_error_frame() {
        let responses = run_session("{\"id\": 5, \"method\": \"no/such\"}\n").await;
        assert_eq!(
            responses[0]["error"]["code"],
            crate::protocol::METHOD_NOT_FOUND
        );
    }
}
