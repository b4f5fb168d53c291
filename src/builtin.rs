//! Builtin tools handled locally by the bridge.
//!
//! Three fixed handlers intercept their tool names before anything is
//! forwarded: registry search, install, and configure. Each is a plain
//! value object constructed at startup and injected into the dispatcher;
//! the one-shot `ready` flag is released by the dispatcher once the
//! registry snapshot has been loaded.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use serde_json::{json, Value};

use crate::{
    config::FeatureFlags,
    error::{BridgeError, BridgeResult},
    gateway::Forward,
    protocol::CallToolContent,
    registry::SearchService,
};

pub const SEARCH_TOOL_NAME: &str = "search_mcp_servers_and_tools";
pub const INSTALL_TOOL_NAME: &str = "install_mcp_servers_and_tools";
pub const CONFIGURE_TOOL_NAME: &str = "configure_mcp_tool";

/// Registry search backed by the in-memory index.
pub struct SearchTool {
    service: Arc<SearchService>,
    ready: AtomicBool,
}

impl SearchTool {
    pub fn new(service: Arc<SearchService>) -> Self {
        Self {
            service,
            ready: AtomicBool::new(false),
        }
    }

    pub fn descriptor() -> Value {
        json!({
            "name": SEARCH_TOOL_NAME,
            "description": "Search the registry of installable MCP servers and tools. \
                Use exact=true to check whether a specific name exists.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Keywords or an exact server/tool name"
                    },
                    "exact": {
                        "type": "boolean",
                        "description": "Match the name exactly instead of ranked search"
                    }
                },
                "required": ["query"]
            }
        })
    }

    pub fn invoke(&self, args: &Value) -> BridgeResult<CallToolContent> {
        if !self.ready.load(Ordering::Acquire) {
            return Err(BridgeError::NotInitialized("search tool"));
        }
        let query = args
            .get("query")
            .and_then(Value::as_str)
            .ok_or_else(|| BridgeError::InvalidArguments("query is required".to_string()))?;
        let exact = args.get("exact").and_then(Value::as_bool).unwrap_or(false);

        if exact {
            return match self.service.lookup_exact(query)? {
                Some(hit) => Ok(CallToolContent::from_json(&serde_json::to_value(vec![hit])?)),
                None => Ok(CallToolContent::text(format!(
                    "No server or tool named '{query}' was found in the registry"
                ))),
            };
        }

        let hits = self.service.search(query)?;
        Ok(CallToolContent::from_json(&serde_json::to_value(hits)?))
    }
}

/// Installation trigger; the backend is the source of truth for
/// installability, so the id is forwarded unvalidated.
pub struct InstallTool {
    gateway: Arc<dyn Forward>,
    ready: AtomicBool,
}

impl InstallTool {
    pub fn new(gateway: Arc<dyn Forward>) -> Self {
        Self {
            gateway,
            ready: AtomicBool::new(false),
        }
    }

    pub fn descriptor() -> Value {
        json!({
            "name": INSTALL_TOOL_NAME,
            "description": "Install an MCP server or tool from the registry by its id.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "tool_id": {
                        "type": "string",
                        "description": "Registry id of the server or tool to install"
                    }
                },
                "required": ["tool_id"]
            }
        })
    }

    pub async fn invoke(&self, args: &Value) -> BridgeResult<CallToolContent> {
        if !self.ready.load(Ordering::Acquire) {
            return Err(BridgeError::NotInitialized("install tool"));
        }
        let tool_id = args
            .get("tool_id")
            .and_then(Value::as_str)
            .ok_or_else(|| BridgeError::InvalidArguments("tool_id is required".to_string()))?;

        let result = self
            .gateway
            .forward("registry/install", json!({"tool_id": tool_id}))
            .await?;
        Ok(CallToolContent::from_json(&result))
    }
}

/// Pushes a configuration object for an installed tool to the backend.
pub struct ConfigureTool {
    gateway: Arc<dyn Forward>,
    ready: AtomicBool,
}

impl ConfigureTool {
    pub fn new(gateway: Arc<dyn Forward>) -> Self {
        Self {
            gateway,
            ready: AtomicBool::new(false),
        }
    }

    pub fn descriptor() -> Value {
        json!({
            "name": CONFIGURE_TOOL_NAME,
            "description": "Set the configuration (for example environment values) \
                of an installed MCP tool.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "tool_id": {
                        "type": "string",
                        "description": "Registry id of the installed tool"
                    },
                    "config": {
                        "type": "object",
                        "description": "Configuration object to apply"
                    }
                },
                "required": ["tool_id", "config"]
            }
        })
    }

    pub async fn invoke(&self, args: &Value) -> BridgeResult<CallToolContent> {
        if !self.ready.load(Ordering::Acquire) {
            return Err(BridgeError::NotInitialized("configure tool"));
        }
        let tool_id = args
            .get("tool_id")
            .and_then(Value::as_str)
            .ok_or_else(|| BridgeError::InvalidArguments("tool_id is required".to_string()))?;
        let config = args
            .get("config")
            .and_then(Value::as_object)
            .ok_or_else(|| BridgeError::InvalidArguments("config object is required".to_string()))?;

        let result = self
            .gateway
            .forward("server/config", json!({"tool_id": tool_id, "config": config}))
            .await?;
        Ok(CallToolContent::from_json(&result))
    }
}

/// Fixed dispatch table over the builtin handlers. `configure` is present
/// only when its feature flag is on.
pub struct BuiltinToolset {
    search: SearchTool,
    install: InstallTool,
    configure: Option<ConfigureTool>,
}

impl BuiltinToolset {
    pub fn new(service: Arc<SearchService>, gateway: Arc<dyn Forward>, flags: FeatureFlags) -> Self {
        Self {
            search: SearchTool::new(service),
            install: InstallTool::new(gateway.clone()),
            configure: flags.configure_tool.then(|| ConfigureTool::new(gateway)),
        }
    }

    /// Descriptors for the catalog assembler; advertised unconditionally.
    pub fn descriptors(&self) -> Vec<Value> {
        let mut descriptors = vec![SearchTool::descriptor(), InstallTool::descriptor()];
        if self.configure.is_some() {
            descriptors.push(ConfigureTool::descriptor());
        }
        descriptors
    }

    pub fn contains(&self, name: &str) -> bool {
        name == INSTALL_TOOL_NAME
            || name == SEARCH_TOOL_NAME
            || (self.configure.is_some() && name == CONFIGURE_TOOL_NAME)
    }

    /// Release the ready gates once the registry snapshot is loaded.
    pub fn mark_ready(&self) {
        self.search.ready.store(true, Ordering::Release);
        self.install.ready.store(true, Ordering::Release);
        if let Some(configure) = &self.configure {
            configure.ready.store(true, Ordering::Release);
        }
    }

    pub fn is_ready(&self) -> bool {
        self.search.ready.load(Ordering::Acquire)
    }

    /// Invoke the builtin matching `name`. Priority is install, search,
    /// configure; callers check [`contains`](Self::contains) first, so the
    /// unknown-tool arm only fires on direct misuse.
    pub async fn invoke(&self, name: &str, args: &Value) -> BridgeResult<CallToolContent> {
        if name == INSTALL_TOOL_NAME {
            return self.install.invoke(args).await;
        }
        if name == SEARCH_TOOL_NAME {
            return self.search.invoke(args);
        }
        if let Some(configure) = &self.configure {
            if name == CONFIGURE_TOOL_NAME {
                return configure.invoke(args).await;
            }
        }
        Err(BridgeError::UnknownTool(name.to_string()))
    }
}
