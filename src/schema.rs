//! Response-schema generation for schema-constrained generation.
//!
//! The Gemini API accepts a standard JSON schema via `responseJsonSchema`
//! (and `parametersJsonSchema` for tool declarations), but it does not
//! follow `$ref` indirection. Schemas are generated with `schemars` and
//! post-processed: every `$ref` is inlined and the `$schema`/`definitions`
//! bookkeeping is stripped.

use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;

/// Trait for types the backend can be constrained to produce.
///
/// Automatically implemented for any `JsonSchema + DeserializeOwned` type.
pub trait ResponseSchema: JsonSchema + DeserializeOwned {
    /// Generate a backend-compatible JSON schema for this type.
    fn response_schema() -> serde_json::Value {
        let schema = schema_for!(Self);
        let mut value = serde_json::to_value(schema).unwrap_or_default();

        inline_refs(&mut value);

        if let serde_json::Value::Object(map) = &mut value {
            map.remove("definitions");
            map.remove("$schema");
        }

        value
    }

    /// Schema name for diagnostics.
    fn type_name() -> String {
        <Self as JsonSchema>::schema_name()
    }
}

impl<T: JsonSchema + DeserializeOwned> ResponseSchema for T {}

/// Inline all `$ref` references by replacing them with the referenced
/// definition.
fn inline_refs(value: &mut serde_json::Value) {
    let definitions = if let serde_json::Value::Object(map) = value {
        map.get("definitions").cloned()
    } else {
        None
    };

    if let Some(defs) = definitions {
        inline_refs_recursive(value, &defs);
    }
}

fn inline_refs_recursive(value: &mut serde_json::Value, definitions: &serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            if let Some(serde_json::Value::String(ref_path)) = map.get("$ref").cloned() {
                if let Some(type_name) = ref_path.strip_prefix("#/definitions/") {
                    if let Some(def) = definitions.get(type_name) {
                        *value = def.clone();
                        inline_refs_recursive(value, definitions);
                        return;
                    }
                }
            }

            for (_, v) in map.iter_mut() {
                inline_refs_recursive(v, definitions);
            }
        }
        serde_json::Value::Array(arr) => {
            for item in arr.iter_mut() {
                inline_refs_recursive(item, definitions);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Node;

    #[test]
    fn test_node_list_schema_has_no_refs() {
        let schema = <Vec<Node>>::response_schema();
        let rendered = serde_json::to_string(&schema).unwrap();

        assert!(!rendered.contains("$ref"), "refs must be inlined: {}", rendered);
        assert!(!rendered.contains("definitions"));
        assert!(!rendered.contains("$schema"));
    }

    #[test]
    fn test_node_list_schema_is_an_array_of_objects() {
        let schema = <Vec<Node>>::response_schema();
        assert_eq!(schema["type"], "array");

        let items = &schema["items"];
        assert_eq!(items["type"], "object");

        let properties = items["properties"].as_object().unwrap();
        assert!(properties.contains_key("node_name"));
        assert!(properties.contains_key("absolute_start_utc"));
        assert!(properties.contains_key("expected_value"));

        // Nested Transaction/AccountEntry schemas must be inlined in place.
        let tx_items = &properties["transaction"]["items"];
        assert_eq!(tx_items["type"], "object");
        assert!(tx_items["properties"].as_object().unwrap().contains_key("debits"));
    }

    #[test]
    fn test_required_fields() {
        let schema = <Vec<Node>>::response_schema();
        let required = schema["items"]["required"].as_array().unwrap();
        let required: Vec<&str> = required.iter().filter_map(|v| v.as_str()).collect();

        assert!(required.contains(&"node_name"));
        assert!(required.contains(&"absolute_start_utc"));
        // Defaulted, so the model may omit it.
        assert!(!required.contains(&"expected_value"));
    }

    #[test]
    fn test_string_list_schema() {
        let schema = <Vec<String>>::response_schema();
        assert_eq!(schema["type"], "array");
        assert_eq!(schema["items"]["type"], "string");
    }
}
