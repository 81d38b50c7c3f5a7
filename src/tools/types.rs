//! Tool descriptors, input schemas and tool output.

use serde::{Deserialize, Serialize};

use crate::types::ToolContent;

/// Separator between the server and tool parts of a namespaced name.
pub const NAMESPACE_SEPARATOR: &str = "__";

/// Build the namespaced name under which a server's tool is exposed.
pub fn namespaced_name(server: &str, tool: &str) -> String {
    format!("{server}{NAMESPACE_SEPARATOR}{tool}")
}

/// Description of a callable tool as presented to the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: InputSchema,
}

impl ToolDescriptor {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: InputSchema,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
        }
    }

    /// Copy of this descriptor renamed to `server__name`.
    pub fn namespaced(&self, server: &str) -> Self {
        Self {
            name: namespaced_name(server, &self.name),
            ..self.clone()
        }
    }
}

/// JSON Schema subset describing a tool's input.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InputSchema {
    #[serde(rename = "type", default = "object_type")]
    pub schema_type: String,
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub required: Vec<String>,
}

fn object_type() -> String {
    "object".to_string()
}

impl Default for InputSchema {
    fn default() -> Self {
        Self::empty()
    }
}

impl InputSchema {
    /// An object schema without parameters.
    pub fn empty() -> Self {
        Self {
            schema_type: object_type(),
            properties: serde_json::Map::new(),
            required: Vec::new(),
        }
    }

    /// Read a schema from raw JSON, tolerating missing or mistyped fields.
    pub fn from_json(value: &serde_json::Value) -> Self {
        let schema_type = value
            .get("type")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(object_type);
        let properties = value
            .get("properties")
            .and_then(|v| v.as_object())
            .cloned()
            .unwrap_or_default();
        let required = value
            .get("required")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        Self {
            schema_type,
            properties,
            required,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "type": self.schema_type,
            "properties": self.properties,
            "required": self.required,
        })
    }

    /// Builder: create an object schema with properties.
    pub fn object() -> SchemaBuilder {
        SchemaBuilder {
            properties: serde_json::Map::new(),
            required: Vec::new(),
        }
    }
}

/// Builder for tool input schemas.
pub struct SchemaBuilder {
    properties: serde_json::Map<String, serde_json::Value>,
    required: Vec<String>,
}

impl SchemaBuilder {
    fn property(
        mut self,
        name: impl Into<String>,
        kind: &str,
        description: impl Into<String>,
        required: bool,
    ) -> Self {
        let name = name.into();
        self.properties.insert(
            name.clone(),
            serde_json::json!({
                "type": kind,
                "description": description.into(),
            }),
        );
        if required {
            self.required.push(name);
        }
        self
    }

    pub fn string(self, name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        self.property(name, "string", description, required)
    }

    pub fn number(self, name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        self.property(name, "number", description, required)
    }

    pub fn integer(self, name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        self.property(name, "integer", description, required)
    }

    pub fn boolean(self, name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        self.property(name, "boolean", description, required)
    }

    pub fn build(self) -> InputSchema {
        InputSchema {
            schema_type: object_type(),
            properties: self.properties,
            required: self.required,
        }
    }
}

/// Output of a successful tool call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ToolOutput {
    pub content: Vec<ToolContent>,
}

impl ToolOutput {
    pub fn new(content: Vec<ToolContent>) -> Self {
        Self { content }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ToolContent::text(text)],
        }
    }

    /// Text-typed items only, in order; these are what get streamed.
    pub fn text_fragments(&self) -> impl Iterator<Item = &str> {
        self.content.iter().filter_map(ToolContent::as_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn schema_builder_collects_required_fields() {
        let schema = InputSchema::object()
            .number("a", "left operand", true)
            .number("b", "right operand", true)
            .boolean("verbose", "explain", false)
            .build();
        assert_eq!(schema.schema_type, "object");
        assert_eq!(schema.required, vec!["a", "b"]);
        assert_eq!(schema.to_json()["properties"]["a"]["type"], "number");
    }

    #[test]
    fn from_json_tolerates_missing_fields() {
        let schema = InputSchema::from_json(&json!({ "properties": { "q": { "type": "string" } } }));
        assert_eq!(schema.schema_type, "object");
        assert!(schema.required.is_empty());
        assert!(schema.properties.contains_key("q"));
    }

    #[test]
    fn namespacing_prefixes_server() {
        let descriptor = ToolDescriptor::new("add", "adds", InputSchema::empty());
        assert_eq!(descriptor.namespaced("calc").name, "calc__add");
    }

    #[test]
    fn output_text_fragments_skip_structured_items() {
        let output = ToolOutput::new(vec![
            ToolContent::text("a"),
            ToolContent::Json { value: json!(1) },
            ToolContent::text("b"),
        ]);
        assert_eq!(output.text_fragments().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
