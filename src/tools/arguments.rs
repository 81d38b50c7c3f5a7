//! Typed access to tool call arguments.

use serde::{Deserialize, Serialize};

use crate::error::ToolError;

/// Tool call arguments: always a JSON object once decoded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolArguments {
    map: serde_json::Map<String, serde_json::Value>,
}

impl ToolArguments {
    pub fn new(map: serde_json::Map<String, serde_json::Value>) -> Self {
        Self { map }
    }

    /// Decode a raw payload produced by a model.
    ///
    /// Accepts an object, a string holding a JSON object, or null/empty
    /// (no arguments). Anything else is rejected.
    pub fn decode(tool: &str, value: &serde_json::Value) -> Result<Self, ToolError> {
        match value {
            serde_json::Value::Null => Ok(Self::default()),
            serde_json::Value::Object(map) => Ok(Self::new(map.clone())),
            serde_json::Value::String(raw) => {
                let trimmed = raw.trim();
                if trimmed.is_empty() {
                    return Ok(Self::default());
                }
                let parsed: serde_json::Value =
                    serde_json::from_str(trimmed).map_err(|e| ToolError::InvalidArguments {
                        tool: tool.to_string(),
                        message: format!("arguments must be valid JSON: {e}"),
                    })?;
                match parsed {
                    serde_json::Value::String(_) => Err(ToolError::InvalidArguments {
                        tool: tool.to_string(),
                        message: "arguments must be a JSON object".into(),
                    }),
                    other => Self::decode(tool, &other),
                }
            }
            other => Err(ToolError::InvalidArguments {
                tool: tool.to_string(),
                message: format!("arguments must be a JSON object; got {other}"),
            }),
        }
    }

    /// Normalize a raw payload for storage, decoding stringified objects.
    ///
    /// Payloads that cannot be decoded are kept verbatim so the dispatch
    /// step can report the problem against the right tool call.
    pub fn normalize(value: serde_json::Value) -> serde_json::Value {
        match Self::decode("", &value) {
            Ok(args) => args.into_value(),
            Err(_) => value,
        }
    }

    pub fn as_map(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.map
    }

    pub fn into_map(self) -> serde_json::Map<String, serde_json::Value> {
        self.map
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::Value::Object(self.map.clone())
    }

    pub fn into_value(self) -> serde_json::Value {
        serde_json::Value::Object(self.map)
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.map.get(key)
    }

    /// Get a string argument by key.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.map.get(key).and_then(|v| v.as_str())
    }

    /// Get a float argument.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.map.get(key).and_then(|v| v.as_f64())
    }

    /// Get an integer argument.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.map.get(key).and_then(|v| v.as_i64())
    }

    /// Deserialize the entire arguments into a typed struct.
    pub fn deserialize<T: serde::de::DeserializeOwned>(&self, tool: &str) -> Result<T, ToolError> {
        serde_json::from_value(self.to_value()).map_err(|e| ToolError::InvalidArguments {
            tool: tool.to_string(),
            message: format!("failed to deserialize arguments: {e}"),
        })
    }
}
