//! Raw configuration tree with deep merge support
//!
//! Configuration is merged as untyped YAML/JSON first and only deserialized
//! into [`crate::DeploymentConfig`] once every layer has been applied.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::path::Path;

use crate::error::{CoreError, Result};

/// Untyped configuration layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Values(pub JsonValue);

impl Values {
    /// Create an empty mapping
    pub fn new() -> Self {
        Self(JsonValue::Object(serde_json::Map::new()))
    }

    /// Load a layer from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CoreError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse a layer from a YAML string
    ///
    /// An empty document yields an empty mapping rather than `null`, so an
    /// empty override file is a no-op.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let value: JsonValue = serde_yaml::from_str(yaml)?;
        match value {
            JsonValue::Null => Ok(Self::new()),
            JsonValue::Object(_) => Ok(Self(value)),
            other => Err(CoreError::InvalidConfig {
                message: format!("top-level configuration must be a mapping, got {}", kind_of(&other)),
            }),
        }
    }

    /// Deep merge an overlay into this layer
    ///
    /// Rules:
    /// - Mappings: merged key by key
    /// - Scalars and sequences: overlay replaces base
    pub fn merge(&mut self, overlay: &Values) {
        deep_merge(&mut self.0, &overlay.0);
    }

    /// Set a value by dotted path (e.g., "project.environment.region")
    pub fn set(&mut self, path: &str, value: JsonValue) -> Result<()> {
        if path.is_empty() || path.split('.').any(str::is_empty) {
            return Err(CoreError::InvalidOverride {
                message: format!("Invalid key path: '{}'", path),
            });
        }
        let parts: Vec<&str> = path.split('.').collect();
        set_nested(&mut self.0, &parts, value);
        Ok(())
    }

    /// Get a value by dotted path
    pub fn get(&self, path: &str) -> Option<&JsonValue> {
        path.split('.')
            .try_fold(&self.0, |node, key| node.as_object().and_then(|map| map.get(key)))
    }

    /// Convert to JSON value
    pub fn into_inner(self) -> JsonValue {
        self.0
    }
}

fn kind_of(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "a sequence",
        JsonValue::Object(_) => "a mapping",
    }
}

fn deep_merge(base: &mut JsonValue, overlay: &JsonValue) {
    match (base, overlay) {
        (JsonValue::Object(base_map), JsonValue::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => {
                        base_map.insert(key.clone(), overlay_value.clone());
                    }
                }
            }
        }
        (base, overlay) => {
            *base = overlay.clone();
        }
    }
}

fn set_nested(node: &mut JsonValue, path: &[&str], new_value: JsonValue) {
    let Some((key, rest)) = path.split_first() else {
        *node = new_value;
        return;
    };

    if !node.is_object() {
        *node = JsonValue::Object(serde_json::Map::new());
    }

    if let JsonValue::Object(map) = node {
        let child = map
            .entry(key.to_string())
            .or_insert_with(|| JsonValue::Object(serde_json::Map::new()));
        set_nested(child, rest, new_value);
    }
}

/// Parse `--set key=value` overrides into a layer
///
/// Booleans, integers and `null` are typed; everything else stays a string.
pub fn parse_set_values(set_args: &[String]) -> Result<Values> {
    let mut values = Values::new();

    for arg in set_args {
        let (key, raw) = arg.split_once('=').ok_or_else(|| CoreError::InvalidOverride {
            message: format!("Invalid --set format: '{}'. Expected key=value", arg),
        })?;

        let value = match raw {
            "true" => JsonValue::Bool(true),
            "false" => JsonValue::Bool(false),
            "null" => JsonValue::Null,
            _ => raw
                .parse::<i64>()
                .map(|n| JsonValue::Number(n.into()))
                .unwrap_or_else(|_| JsonValue::String(raw.to_string())),
        };

        values.set(key.trim(), value)?;
    }

    Ok(values)
}
