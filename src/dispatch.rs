//! Top-level protocol dispatcher.
//!
//! Wires the request kinds to the gateway, the catalog assembler, and the
//! builtin toolset. Pass-through methods swallow gateway failures and
//! answer with an empty result of the right shape so the client session
//! survives backend outages; `tools/call` is the one path that surfaces a
//! structured error back to the caller.

use std::sync::{
    atomic::{AtomicU8, Ordering},
    Arc,
};

use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use crate::{
    builtin::BuiltinToolset,
    catalog::{self, CatalogOptions},
    config::FeatureFlags,
    gateway::Forward,
    protocol::{CallToolContent, JsonRpcError},
    registry::{self, SearchIndex, SearchService},
};

/// One-directional lifecycle; terminal at `Ready`. There is no
/// re-initialization path: a registry refresh requires a process restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Uninitialized,
    Initializing,
    Ready,
}

struct StateCell(AtomicU8);

impl StateCell {
    const UNINITIALIZED: u8 = 0;
    const INITIALIZING: u8 = 1;
    const READY: u8 = 2;

    fn new() -> Self {
        Self(AtomicU8::new(Self::UNINITIALIZED))
    }

    fn load(&self) -> BridgeState {
        match self.0.load(Ordering::Acquire) {
            Self::UNINITIALIZED => BridgeState::Uninitialized,
            Self::INITIALIZING => BridgeState::Initializing,
            _ => BridgeState::Ready,
        }
    }

    fn try_begin_init(&self) -> bool {
        self.0
            .compare_exchange(
                Self::UNINITIALIZED,
                Self::INITIALIZING,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    fn mark_ready(&self) {
        self.0.store(Self::READY, Ordering::Release);
    }
}

pub struct Dispatcher {
    gateway: Arc<dyn Forward>,
    builtins: BuiltinToolset,
    search: Arc<SearchService>,
    options: CatalogOptions,
    state: StateCell,
}

impl Dispatcher {
    pub fn new(
        gateway: Arc<dyn Forward>,
        builtins: BuiltinToolset,
        search: Arc<SearchService>,
        flags: FeatureFlags,
    ) -> Self {
        Self {
            gateway,
            builtins,
            search,
            options: CatalogOptions {
                schema_compat: flags.schema_compat,
            },
            state: StateCell::new(),
        }
    }

    pub fn state(&self) -> BridgeState {
        self.state.load()
    }

    /// One-shot startup: fetch the registry snapshot, build the search
    /// index, and release the builtin gates. A failed fetch still reaches
    /// `Ready` (pass-through must keep working) but leaves the builtins
    /// uninitialized for the process lifetime.
    pub async fn initialize_backend(&self) {
        if !self.state.try_begin_init() {
            debug!("initialization already ran");
            return;
        }

        match self.gateway.forward("registry/list", json!({})).await {
            Ok(snapshot) => {
                let entries = registry::decode_snapshot(&snapshot);
                info!(entries = entries.len(), "registry snapshot loaded");
                self.search.install(SearchIndex::build(entries));
                self.builtins.mark_ready();
            }
            Err(error) => {
                warn!(
                    error = %error,
                    "registry snapshot unavailable; builtin tools stay uninitialized"
                );
            }
        }

        self.state.mark_ready();
    }

    /// Route one request. `Err` becomes a JSON-RPC error frame; everything
    /// else answers with a result, however degraded.
    pub async fn dispatch(&self, method: &str, params: Value) -> Result<Value, JsonRpcError> {
        match method {
            "initialize" => Ok(initialize_result()),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(self.list_tools(params).await),
            "tools/call" => Ok(self.call_tool(params).await),
            "resources/list" => Ok(self.forward_or(method, params, json!({"resources": []})).await),
            "resources/read" => Ok(self.forward_or(method, params, json!({"contents": []})).await),
            "prompts/list" => Ok(self.forward_or(method, params, json!({"prompts": []})).await),
            "prompts/get" => Ok(self.forward_or(method, params, json!({"messages": []})).await),
            _ => Err(JsonRpcError::method_not_found(method)),
        }
    }

    async fn list_tools(&self, params: Value) -> Value {
        let backend_result = match self.gateway.forward("tools/list", params).await {
            Ok(result) => result,
            Err(error) => {
                warn!(error = %error, "tools/list forward failed; serving builtin catalog only");
                Value::Null
            }
        };
        let tools = catalog::assemble(backend_result, self.builtins.descriptors(), self.options);
        json!({"tools": tools})
    }

    async fn call_tool(&self, params: Value) -> Value {
        let Some(name) = params.get("name").and_then(Value::as_str).map(str::to_owned) else {
            return error_content("invalid arguments: tool name is required");
        };

        if self.builtins.contains(&name) {
            let arguments = params
                .get("arguments")
                .cloned()
                .unwrap_or_else(|| Value::Object(Map::new()));
            return match self.builtins.invoke(&name, &arguments).await {
                Ok(content) => content_value(content),
                Err(error) => {
                    warn!(tool = %name, error = %error, "builtin tool failed");
                    error_content(error.to_string())
                }
            };
        }

        match self.gateway.forward("tools/call", params).await {
            Ok(result) => result,
            Err(error) => {
                warn!(tool = %name, error = %error, "tool call forward failed");
                error_content(error.to_string())
            }
        }
    }

    async fn forward_or(&self, method: &str, params: Value, fallback: Value) -> Value {
        match self.gateway.forward(method, params).await {
            Ok(result) => result,
            Err(error) => {
                warn!(method = %method, error = %error, "forward failed; answering with empty result");
                fallback
            }
        }
    }
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": "2024-11-05",
        "capabilities": {"tools": {}, "resources": {}, "prompts": {}},
        "serverInfo": {"name": "mcp-bridge", "version": env!("CARGO_PKG_VERSION")}
    })
}

fn content_value(content: CallToolContent) -> Value {
    serde_json::to_value(&content).unwrap_or_else(|_| {
        json!({
            "content": [{"type": "text", "text": "failed to encode tool result"}],
            "isError": true
        })
    })
}

fn error_content(message: impl Into<String>) -> Value {
    content_value(CallToolContent::error(message))
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::{
        builtin::{CONFIGURE_TOOL_NAME, INSTALL_TOOL_NAME, SEARCH_TOOL_NAME},
        error::{BridgeError, BridgeResult},
    };

    enum Reply {
        Ok(Value),
        Fail,
    }

    struct MockForwarder {
        calls: Mutex<Vec<(String, Value)>>,
        reply: Reply,
    }

    impl MockForwarder {
        fn succeeding(reply: Value) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                reply: Reply::Ok(reply),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                reply: Reply::Fail,
            })
        }

        fn calls(&self) -> Vec<(String, Value)> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl Forward for MockForwarder {
        async fn forward(&self, method: &str, params: Value) -> BridgeResult<Value> {
            self.calls.lock().push((method.to_string(), params));
            match &self.reply {
                Reply::Ok(value) => Ok(value.clone()),
                Reply::Fail => Err(BridgeError::Backend("backend unavailable".to_string())),
            }
        }
    }

    fn dispatcher_with(gateway: Arc<MockForwarder>) -> Dispatcher {
        let search = Arc::new(SearchService::new());
        let builtins = BuiltinToolset::new(
            search.clone(),
            gateway.clone(),
            FeatureFlags::default(),
        );
        Dispatcher::new(gateway, builtins, search, FeatureFlags::default())
    }

    fn registry_snapshot() -> Value {
        json!([
            {"name": "sql-server", "fullDescription": "Query SQL Server databases"},
            {"name": "fetch", "fullDescription": "Fetch web pages"}
        ])
    }

    #[tokio::test]
    async fn test_state_machine_is_one_shot() {
        let gateway = MockForwarder::succeeding(registry_snapshot());
        let dispatcher = dispatcher_with(gateway.clone());
        assert_eq!(dispatcher.state(), BridgeState::Uninitialized);

        dispatcher.initialize_backend().await;
        assert_eq!(dispatcher.state(), BridgeState::Ready);
        assert_eq!(gateway.calls().len(), 1);
        assert_eq!(gateway.calls()[0].0, "registry/list");

        // Second run is a no-op.
        dispatcher.initialize_backend().await;
        assert_eq!(gateway.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_init_failure_still_reaches_ready() {
        let gateway = MockForwarder::failing();
        let dispatcher = dispatcher_with(gateway.clone());

        dispatcher.initialize_backend().await;
        assert_eq!(dispatcher.state(), BridgeState::Ready);

        // Builtins stay gated.
        let result = dispatcher
            .dispatch(
                "tools/call",
                json!({"name": SEARCH_TOOL_NAME, "arguments": {"query": "x"}}),
            )
            .await
            .unwrap();
        assert_eq!(result["isError"], true);
        let text = result["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("not initialized"));
    }

    #[tokio::test]
    async fn test_builtin_call_never_forwarded() {
        let gateway = MockForwarder::succeeding(registry_snapshot());
        let dispatcher = dispatcher_with(gateway.clone());
        dispatcher.initialize_backend().await;
        let calls_after_init = gateway.calls().len();

        let result = dispatcher
            .dispatch(
                "tools/call",
                json!({"name": SEARCH_TOOL_NAME, "arguments": {"query": "sql"}}),
            )
            .await
            .unwrap();
        assert!(result.get("content").is_some());
        assert_eq!(
            gateway.calls().len(),
            calls_after_init,
            "builtin dispatch must not touch the gateway"
        );
    }

    #[tokio::test]
    async fn test_install_call_forwards_registry_install_only() {
        let gateway = MockForwarder::succeeding(registry_snapshot());
        let dispatcher = dispatcher_with(gateway.clone());
        dispatcher.initialize_backend().await;

        dispatcher
            .dispatch(
                "tools/call",
                json!({"name": INSTALL_TOOL_NAME, "arguments": {"tool_id": "fetch"}}),
            )
            .await
            .unwrap();

        let calls = gateway.calls();
        let last = calls.last().unwrap();
        assert_eq!(last.0, "registry/install");
        assert!(calls.iter().all(|(method, _)| method != "tools/call"));
    }

    #[tokio::test]
    async fn test_unmatched_tool_call_forwarded_verbatim() {
        let gateway = MockForwarder::succeeding(json!({"content": [{"type": "text", "text": "ok"}]}));
        let dispatcher = dispatcher_with(gateway.clone());
        dispatcher.initialize_backend().await;

        let params = json!({"name": "backend_tool", "arguments": {"x": 1}});
        let result = dispatcher.dispatch("tools/call", params.clone()).await.unwrap();
        assert_eq!(result["content"][0]["text"], "ok");

        let last = gateway.calls().last().cloned().unwrap();
        assert_eq!(last.0, "tools/call");
        assert_eq!(last.1, params);
    }

    #[tokio::test]
    async fn test_tool_call_failure_becomes_error_content() {
        let gateway = MockForwarder::failing();
        let dispatcher = dispatcher_with(gateway);

        let result = dispatcher
            .dispatch("tools/call", json!({"name": "backend_tool", "arguments": {}}))
            .await
            .unwrap();
        assert_eq!(result["isError"], true);
    }

    #[tokio::test]
    async fn test_tool_call_without_name_is_error_content() {
        let gateway = MockForwarder::succeeding(json!(null));
        let dispatcher = dispatcher_with(gateway.clone());

        let result = dispatcher.dispatch("tools/call", json!({})).await.unwrap();
        assert_eq!(result["isError"], true);
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_degraded_pass_through_shapes() {
        let gateway = MockForwarder::failing();
        let dispatcher = dispatcher_with(gateway);

        let cases = [
            ("resources/list", json!({"resources": []})),
            ("resources/read", json!({"contents": []})),
            ("prompts/list", json!({"prompts": []})),
            ("prompts/get", json!({"messages": []})),
        ];
        for (method, expected) in cases {
            let result = dispatcher.dispatch(method, json!({})).await.unwrap();
            assert_eq!(result, expected, "{method}");
        }
    }

    #[tokio::test]
    async fn test_tools_list_degrades_to_builtins_only() {
        let gateway = MockForwarder::failing();
        let dispatcher = dispatcher_with(gateway);

        let result = dispatcher.dispatch("tools/list", json!({})).await.unwrap();
        let tools = result["tools"].as_array().unwrap();
        let names: Vec<_> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
        assert_eq!(
            names,
            vec![SEARCH_TOOL_NAME, INSTALL_TOOL_NAME, CONFIGURE_TOOL_NAME]
        );
    }

    #[tokio::test]
    async fn test_tools_list_merges_backend_and_builtins() {
        let gateway =
            MockForwarder::succeeding(json!({"tools": [{"name": "backend tool", "is_active": true}]}));
        let dispatcher = dispatcher_with(gateway);

        let result = dispatcher.dispatch("tools/list", json!({})).await.unwrap();
        let names: Vec<_> = result["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "backend_tool".to_string(),
                SEARCH_TOOL_NAME.to_string(),
                INSTALL_TOOL_NAME.to_string(),
                CONFIGURE_TOOL_NAME.to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_ping_answered_locally() {
        let gateway = MockForwarder::failing();
        let dispatcher = dispatcher_with(gateway.clone());

        let result = dispatcher.dispatch("ping", json!({})).await.unwrap();
        assert_eq!(result, json!({}));
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_initialize_answered_locally() {
        let gateway = MockForwarder::failing();
        let dispatcher = dispatcher_with(gateway.clone());

        let result = dispatcher.dispatch("initialize", json!({})).await.unwrap();
        assert_eq!(result["serverInfo"]["name"], "mcp-bridge");
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_method_rejected() {
        let gateway = MockForwarder::succeeding(json!(null));
        let dispatcher = dispatcher_with(gateway);

        let error = dispatcher.dispatch("tools/destroy", json!({})).await.unwrap_err();
        assert_eq!(error.code, crate::protocol::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_pass_through_works_before_ready() {
        let gateway = MockForwarder::succeeding(json!({"resources": [{"uri": "file:///x"}]}));
        let dispatcher = dispatcher_with(gateway);
        assert_eq!(dispatcher.state(), BridgeState::Uninitialized);

        let result = dispatcher.dispatch("resources/list", json!({})).await.unwrap();
        assert_eq!(result["resources"][0]["uri"], "file:///x");
    }
}
