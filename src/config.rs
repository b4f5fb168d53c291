//! Bridge configuration types.

use serde::{Deserialize, Serialize};
use url::Url;

/// Resolved runtime configuration, assembled from CLI flags and environment.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BridgeConfig {
    /// Backend JSON-RPC endpoint (trusted localhost loopback).
    pub backend_url: Url,

    #[serde(default)]
    pub features: FeatureFlags,
}

/// Feature delta between the two historical adapter variants, expressed as
/// flags instead of forked code paths.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
pub struct FeatureFlags {
    /// Advertise and dispatch the `configure_mcp_tool` builtin.
    #[serde(default = "default_true")]
    pub configure_tool: bool,

    /// Apply the single-property `required` compatibility patch to tool
    /// schemas in `tools/list` output.
    #[serde(default = "default_true")]
    pub schema_compat: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            configure_tool: true,
            schema_compat: true,
        }
    }
}

fn default_true() -> bool {
    true
}
