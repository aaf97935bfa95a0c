//! JSON Schema derivation for tool and completion types.

use schemars::JsonSchema;
use serde_json::{json, Value};

use crate::AiError;

/// The schema of `T` as a plain JSON value, without the `$schema` marker.
pub fn schema_value<T: JsonSchema>() -> Value {
    let root = schemars::schema_for!(T);
    let mut value = serde_json::to_value(root).unwrap_or(Value::Bool(true));
    if let Value::Object(map) = &mut value {
        map.remove("$schema");
    }
    value
}

/// True when the schema places no constraint on the value.
pub fn is_any(schema: &Value) -> bool {
    match schema {
        Value::Bool(b) => *b,
        Value::Object(map) => ![
            "type",
            "properties",
            "$ref",
            "allOf",
            "anyOf",
            "oneOf",
            "enum",
            "const",
            "items",
        ]
        .iter()
        .any(|key| map.contains_key(*key)),
        _ => false,
    }
}

fn has_type(schema: &Value, name: &str) -> bool {
    schema.get("type").and_then(Value::as_str) == Some(name)
}

/// An object schema that declares no properties.
pub fn is_empty_object(schema: &Value) -> bool {
    has_type(schema, "object")
        && schema
            .get("properties")
            .and_then(Value::as_object)
            .map_or(true, |props| props.is_empty())
}

/// Input schema for a tool argument type; unconstrained or unit
/// arguments become an open object.
pub fn input_schema<T: JsonSchema>() -> Value {
    let schema = schema_value::<T>();
    if is_any(&schema) || has_type(&schema, "null") {
        json!({ "type": "object" })
    } else {
        schema
    }
}

/// Output schema for a tool result type. Only object results carry one.
pub fn output_schema<T: JsonSchema>() -> Option<Value> {
    let schema = schema_value::<T>();
    has_type(&schema, "object").then_some(schema)
}

/// How a completion's final answer is extracted.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputShape {
    /// The caller discards the answer.
    None,
    /// Plain text.
    Text,
    /// A JSON object matching the schema.
    Structured(Value),
}

impl OutputShape {
    pub fn of<T: JsonSchema>() -> Result<Self, AiError> {
        let schema = schema_value::<T>();
        if has_type(&schema, "null") {
            Ok(OutputShape::None)
        } else if has_type(&schema, "string") {
            Ok(OutputShape::Text)
        } else if has_type(&schema, "object") {
            Ok(OutputShape::Structured(schema))
        } else {
            Err(AiError::UnsupportedOutput(format!(
                "{} (expected a string, struct or map)",
                T::schema_name()
            )))
        }
    }

    pub fn schema(&self) -> Option<&Value> {
        match self {
            OutputShape::Structured(schema) => Some(schema),
            _ => None,
        }
    }
}
