//! Recognized JSON Schema keywords
//!
//! Anything outside these lists is an extension key and travels with the
//! generated field or model as opaque metadata.

use serde_json::{Map, Value};

/// Keywords understood on a field (property) schema
pub const STANDARD_FIELD_KEYWORDS: &[&str] = &[
    "type",
    "format",
    "description",
    "default",
    "title",
    "examples",
    "const",
    "enum",
    "multipleOf",
    "maximum",
    "exclusiveMaximum",
    "minimum",
    "exclusiveMinimum",
    "maxLength",
    "minLength",
    "pattern",
    "items",
    "additionalItems",
    "maxItems",
    "minItems",
    "uniqueItems",
    "properties",
    "additionalProperties",
    "required",
    "patternProperties",
    "dependencies",
    "propertyNames",
    "if",
    "then",
    "else",
    "allOf",
    "anyOf",
    "oneOf",
    "not",
    "discriminator",
    "$ref",
    "$defs",
    "definitions",
];

/// Keywords understood on a model (top-level) schema
pub const STANDARD_MODEL_KEYWORDS: &[&str] = &[
    "type",
    "title",
    "description",
    "properties",
    "required",
    "additionalProperties",
    "patternProperties",
    "dependencies",
    "propertyNames",
    "if",
    "then",
    "else",
    "allOf",
    "anyOf",
    "oneOf",
    "not",
    "discriminator",
    "$ref",
    "$defs",
    "definitions",
    "$schema",
    "$id",
    "$comment",
];

/// Root-only keys carried verbatim onto the regenerated document
pub const DOCUMENT_KEYWORDS: &[&str] = &["$schema", "$id", "$comment", "definitions", "$defs"];

/// Keywords accepted but not enforced by the compiler
pub const UNSUPPORTED_KEYWORDS: &[&str] = &[
    "patternProperties",
    "dependencies",
    "propertyNames",
    "if",
    "then",
    "else",
    "not",
    "additionalItems",
];

/// Collect keys outside `standard`, preserving declaration order
pub fn extension_keys(node: &Value, standard: &[&str]) -> Map<String, Value> {
    node.as_object()
        .map(|obj| {
            obj.iter()
                .filter(|(key, _)| !standard.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extension_keys_keep_order() {
        let node = json!({
            "type": "string",
            "x-unit": "kg",
            "description": "weight",
            "ui:widget": "slider"
        });
        let extra = extension_keys(&node, STANDARD_FIELD_KEYWORDS);
        let keys: Vec<&str> = extra.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["x-unit", "ui:widget"]);
    }

    #[test]
    fn test_model_keywords_exclude_field_only_keys() {
        let node = json!({"title": "A", "minLength": 3, "$comment": "c"});
        let extra = extension_keys(&node, STANDARD_MODEL_KEYWORDS);
        assert_eq!(extra.len(), 1);
        assert!(extra.contains_key("minLength"));
    }
}
