//! Registry snapshot types.
//!
//! The backend's `registry/list` result is decoded once at startup into a
//! read-only set of [`RegistryEntry`] values owned by the search index.
//! Decoding fails closed: malformed entries are skipped with a warning, an
//! unrecognized overall shape yields an empty snapshot.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

/// One installable server/tool as advertised by the backend registry.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistryEntry {
    pub name: String,
    pub description: String,
    pub full_description: String,
    pub categories: Vec<String>,
    pub server_id: String,
    pub installed: bool,
    pub active: bool,
    pub publisher: Publisher,
    pub distribution: Distribution,
    pub license: Option<String>,
    pub runtime: Option<String>,
    pub config: LaunchConfig,
}

impl Default for RegistryEntry {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: String::new(),
            full_description: String::new(),
            categories: Vec::new(),
            server_id: String::new(),
            installed: false,
            // Absence of the flag means active.
            active: true,
            publisher: Publisher::default(),
            distribution: Distribution::default(),
            license: None,
            runtime: None,
            config: LaunchConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Publisher {
    pub id: String,
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Distribution {
    #[serde(rename = "type")]
    pub kind: String,
    pub package: String,
}

/// How the backend launches the tool server once installed. Only `env` is
/// surfaced to search callers; the rest is kept for completeness of the
/// snapshot.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LaunchConfig {
    pub command: String,
    pub args: Vec<String>,
    pub env: Map<String, Value>,
}

/// Decode a `registry/list` result into entries, accepting either a bare
/// array or an object wrapping one under `servers` or `tools`.
pub fn decode_snapshot(value: &Value) -> Vec<RegistryEntry> {
    let empty = Vec::new();
    let items = match value {
        Value::Array(items) => items,
        Value::Object(map) => map
            .get("servers")
            .or_else(|| map.get("tools"))
            .and_then(Value::as_array)
            .unwrap_or(&empty),
        _ => &empty,
    };

    items
        .iter()
        .filter_map(|item| match serde_json::from_value::<RegistryEntry>(item.clone()) {
            Ok(entry) if !entry.name.is_empty() => Some(entry),
            Ok(_) => {
                warn!("skipping registry entry without a name");
                None
            }
            Err(error) => {
                warn!(error = %error, "skipping malformed registry entry");
                None
            }
        })
        .collect()
}
