//! Client-facing tool catalog assembly.
//!
//! Merges the backend's advertised tools with the builtin descriptors,
//! filters disabled entries, applies the single-parameter schema
//! compatibility patch, strips server-internal bookkeeping fields, and
//! sanitizes names. Tool objects stay opaque JSON maps throughout; only the
//! fields touched here are interpreted.

use std::collections::HashSet;

use serde_json::{json, Map, Value};
use tracing::warn;

/// Assembled names are capped at this many characters.
pub const NAME_MAX_LEN: usize = 64;

/// Some client integrations refuse tools with zero required parameters;
/// the patch marks the single parameter required while telling the model it
/// may stay empty.
const OPTIONAL_MARKER: &str = " (Optional) leave it empty if optional";

const STRIPPED_FIELDS: &[&str] = &["proxy_id", "server_id", "categories", "tags", "is_active", "id"];

#[derive(Debug, Clone, Copy)]
pub struct CatalogOptions {
    pub schema_compat: bool,
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self { schema_compat: true }
    }
}

/// Build the `tools/list` catalog from a raw backend result plus the
/// builtin descriptors. Backend order is preserved, builtins come last, and
/// sanitized-name collisions are emitted as-is (warn-logged, never deduped).
pub fn assemble(
    backend_result: Value,
    builtin_descriptors: Vec<Value>,
    options: CatalogOptions,
) -> Vec<Value> {
    let mut raw = normalize(backend_result);
    raw.extend(builtin_descriptors);

    let mut seen: HashSet<String> = HashSet::new();
    let mut assembled = Vec::with_capacity(raw.len());
    for mut tool in raw {
        let Some(map) = tool.as_object_mut() else {
            continue;
        };
        if map.get("is_active").and_then(Value::as_bool) == Some(false) {
            continue;
        }
        if options.schema_compat {
            patch_single_property_schema(map);
        }
        for field in STRIPPED_FIELDS {
            map.remove(*field);
        }
        sanitize_name_field(map);
        if let Some(name) = map.get("name").and_then(Value::as_str) {
            if !seen.insert(name.to_string()) {
                warn!(tool = %name, "duplicate tool name in assembled catalog");
            }
        }
        assembled.push(tool);
    }
    assembled
}

/// Coerce the backend's `tools/list` result into a list of raw tool
/// objects: `{tools: [...]}` or a bare array; anything else is empty.
fn normalize(result: Value) -> Vec<Value> {
    match result {
        Value::Array(tools) => tools,
        Value::Object(mut map) => match map.remove("tools") {
            Some(Value::Array(tools)) => tools,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

/// If the schema has exactly one property and no required entries, mark
/// that property required and annotate its description with the optional
/// marker (unless already present).
fn patch_single_property_schema(tool: &mut Map<String, Value>) {
    let Some(schema) = tool.get_mut("inputSchema").and_then(Value::as_object_mut) else {
        return;
    };
    let required_is_empty = match schema.get("required") {
        None => true,
        Some(Value::Array(required)) => required.is_empty(),
        Some(_) => false,
    };
    if !required_is_empty {
        return;
    }

    let key = {
        let Some(properties) = schema.get_mut("properties").and_then(Value::as_object_mut) else {
            return;
        };
        if properties.len() != 1 {
            return;
        }
        let Some((name, prop)) = properties.iter_mut().next() else {
            return;
        };
        if let Some(prop) = prop.as_object_mut() {
            let description = prop.get("description").and_then(Value::as_str).unwrap_or_default();
            if !description.contains(OPTIONAL_MARKER.trim_start()) {
                let annotated = format!("{description}{OPTIONAL_MARKER}");
                prop.insert("description".to_string(), Value::String(annotated));
            }
        }
        name.clone()
    };

    schema.insert("required".to_string(), json!([key]));
}

fn sanitize_name_field(tool: &mut Map<String, Value>) {
    let sanitized = match tool.get("name").and_then(Value::as_str) {
        Some(name) => {
            let sanitized = sanitize_name(name);
            if sanitized == name {
                return;
            }
            sanitized
        }
        None => return,
    };
    tool.insert("name".to_string(), Value::String(sanitized));
}

/// Replace every character outside `[A-Za-z0-9_-]` with `_`, then cap the
/// length.
pub fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .take(NAME_MAX_LEN)
        .collect()
}
