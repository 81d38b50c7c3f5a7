//! Check decoded tool arguments against a tool's input schema.

use super::arguments::ToolArguments;
use super::types::InputSchema;
use crate::error::ToolError;

/// Validate arguments against the top level of an input schema.
///
/// Checks required field presence and the declared type of each supplied
/// property. Fields the schema does not mention are accepted.
pub fn validate_arguments(
    tool: &str,
    args: &ToolArguments,
    schema: &InputSchema,
) -> Result<(), ToolError> {
    let invalid = |message: String| ToolError::InvalidArguments {
        tool: tool.to_string(),
        message,
    };

    if schema.schema_type != "object" {
        return Ok(());
    }

    if let Some(missing) = schema
        .required
        .iter()
        .find(|field| !args.as_map().contains_key(field.as_str()))
    {
        return Err(invalid(format!("missing required field '{missing}'")));
    }

    for (key, value) in args.as_map() {
        let Some(expected) = schema
            .properties
            .get(key)
            .and_then(|prop| prop.get("type"))
            .and_then(|t| t.as_str())
        else {
            continue;
        };
        if !value_matches_type(value, expected) {
            return Err(invalid(format!(
                "field '{key}' expected type '{expected}', got {}",
                json_type_name(value)
            )));
        }
    }

    Ok(())
}

fn value_matches_type(value: &serde_json::Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
