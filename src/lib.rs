//! Stdio MCP bridge.
//!
//! Exposes a tool-invocation server over newline-delimited JSON-RPC on
//! stdio while the actual tool registry and execution live in a local
//! backend reachable over HTTP/JSON-RPC. Most requests are forwarded
//! transparently; registry search, install, and configure are intercepted
//! and handled locally.
//!
//! ## Modules
//!
//! - [`gateway`]: HTTP forwarding to the backend
//! - [`catalog`]: client-facing tool catalog assembly
//! - [`registry`]: registry snapshot and ranked search
//! - [`builtin`]: locally-handled tools
//! - [`dispatch`]: top-level request routing
//! - [`transport`]: stdio frame loop

pub mod builtin;
pub mod catalog;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod gateway;
pub mod protocol;
pub mod registry;
pub mod transport;

pub use builtin::{
    BuiltinToolset, ConfigureTool, InstallTool, SearchTool, CONFIGURE_TOOL_NAME,
    INSTALL_TOOL_NAME, SEARCH_TOOL_NAME,
};
pub use catalog::{assemble, sanitize_name, CatalogOptions, NAME_MAX_LEN};
pub use config::{BridgeConfig, FeatureFlags};
pub use dispatch::{BridgeState, Dispatcher};
pub use error::{BridgeError, BridgeResult};
pub use gateway::{Forward, HttpGateway};
pub use protocol::{CallToolContent, ContentItem, JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use registry::{
    decode_snapshot, RegistryEntry, SearchIndex, SearchService, ToolSummary, SEARCH_LIMIT,
};
