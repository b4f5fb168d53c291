//! Bridge error types.
//!
//! Defines error variants for forwarding, catalog search, and builtin tool
//! dispatch, plus the propagation policy helpers used by the dispatcher.

use thiserror::Error;

pub type BridgeResult<T> = Result<T, BridgeError>;

#[derive(Debug, Error)]
pub enum BridgeError {
    /// Backend answered with a non-2xx HTTP status.
    #[error("backend returned HTTP {status}: {body}")]
    Transport { status: u16, body: String },

    /// Backend answered 2xx but the JSON-RPC body carried an error.
    #[error("backend error: {0}")]
    Backend(String),

    /// A builtin tool was invoked before the registry snapshot was loaded.
    #[error("not initialized: {0}")]
    NotInitialized(&'static str),

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
