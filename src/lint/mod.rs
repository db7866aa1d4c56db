//! Schema Structure Linting
//!
//! A pass over a raw schema document that reports every structural problem at
//! once, without building anything. `create_model` stops at the first defect;
//! the linter is for authoring feedback.
//!
//! ## Lints
//! 1. **Keyword shapes**: `type`, length and bound keywords, `pattern`,
//!    `properties`, `required`, combiner lists
//! 2. **References**: non-local or unresolvable `$ref`, alias cycles
//! 3. **Advisories**: unknown formats, keywords accepted but not enforced,
//!    recursive definitions

use serde_json::Value;

use crate::config::{LintConfig, ModelsConfig};
use crate::constraints::{split_lookaheads, Pattern};
use crate::graph::RefGraph;
use crate::model::{ScalarKind, StringFormat};
use crate::resolver::{ReferenceResolver, ANY_TYPE};
use crate::vocabulary::UNSUPPORTED_KEYWORDS;

/// Result of linting a schema
#[derive(Debug, Default)]
pub struct LintResult {
    pub schema_id: String,
    pub errors: Vec<LintError>,
    pub warnings: Vec<LintWarning>,
}

impl LintResult {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    fn error(&mut self, code: &'static str, path: &str, message: String) {
        tracing::debug!(code, path, %message, "lint error");
        self.errors.push(LintError {
            code,
            message,
            path: path.to_string(),
        });
    }

    fn warn(&mut self, code: &'static str, path: &str, message: String) {
        tracing::debug!(code, path, %message, "lint warning");
        self.warnings.push(LintWarning {
            code,
            message,
            path: path.to_string(),
        });
    }
}

#[derive(Debug)]
pub struct LintError {
    pub code: &'static str,
    pub message: String,
    pub path: String,
}

#[derive(Debug)]
pub struct LintWarning {
    pub code: &'static str,
    pub message: String,
    pub path: String,
}

const LENGTH_KEYWORDS: &[&str] = &["minLength", "maxLength", "minItems", "maxItems"];
const BOUND_KEYWORDS: &[&str] = &["minimum", "maximum", "exclusiveMinimum", "exclusiveMaximum"];
const COMBINER_KEYWORDS: &[&str] = &["allOf", "anyOf", "oneOf"];

/// The schema structure linter
#[derive(Debug, Clone, Default)]
pub struct SchemaLinter {
    config: LintConfig,
    allow_undefined_array_items: bool,
}

impl SchemaLinter {
    pub fn new(config: LintConfig) -> Self {
        Self {
            config,
            allow_undefined_array_items: false,
        }
    }

    /// Lint settings plus the builder flags that relax structural rules
    pub fn from_config(config: &ModelsConfig) -> Self {
        Self {
            config: config.lint.clone(),
            allow_undefined_array_items: config.builder.allow_undefined_array_items,
        }
    }

    /// Lint a schema document
    pub fn lint(&self, schema: &Value) -> LintResult {
        let schema_id = schema
            .get("$id")
            .or_else(|| schema.get("title"))
            .and_then(Value::as_str)
            .unwrap_or("<schema>")
            .to_string();
        let mut result = LintResult {
            schema_id,
            ..Default::default()
        };

        self.lint_node(schema, schema, "", &mut result);
        self.lint_graph(schema, &mut result);

        if !result.is_clean() {
            tracing::warn!(
                schema = %result.schema_id,
                errors = result.errors.len(),
                warnings = result.warnings.len(),
                "schema has lint errors"
            );
        }
        result
    }

    fn lint_node(&self, node: &Value, root: &Value, path: &str, result: &mut LintResult) {
        let obj = match node.as_object() {
            Some(obj) => obj,
            None => {
                result.error("NOT_A_SCHEMA", path, "Schema must be a JSON object".to_string());
                return;
            }
        };

        if let Some(ty) = obj.get("type") {
            self.lint_type(ty, path, result);
        }
        let is_array = obj.get("type").map_or(false, |t| t == "array");

        match obj.get("items") {
            Some(items @ Value::Object(_)) => self.lint_node(items, root, &child(path, "items"), result),
            Some(_) => result.error(
                "TUPLE_ITEMS",
                &child(path, "items"),
                "Tuple-style 'items' arrays are not supported".to_string(),
            ),
            None if is_array && !self.allow_undefined_array_items => result.error(
                "MISSING_ITEMS",
                path,
                "Array type must specify 'items' schema".to_string(),
            ),
            None => {}
        }

        for key in LENGTH_KEYWORDS {
            if let Some(value) = obj.get(*key) {
                if !value.is_u64() {
                    result.error(
                        "INVALID_LENGTH",
                        &child(path, key),
                        format!("{} must be a non-negative integer, got {}", key, value),
                    );
                }
            }
        }
        for key in BOUND_KEYWORDS {
            if let Some(value) = obj.get(*key) {
                if !value.is_number() {
                    result.error("INVALID_BOUND", &child(path, key), format!("{} must be a number, got {}", key, value));
                }
            }
        }
        if let (Some(min), Some(max)) = (
            obj.get("minimum").and_then(Value::as_f64),
            obj.get("maximum").and_then(Value::as_f64),
        ) {
            if min > max {
                result.warn(
                    "EMPTY_RANGE",
                    path,
                    format!("minimum {} exceeds maximum {}; no value can satisfy both", min, max),
                );
            }
        }
        if let Some(step) = obj.get("multipleOf") {
            if !step.as_f64().map_or(false, |n| n > 0.0) {
                result.error(
                    "INVALID_MULTIPLE_OF",
                    &child(path, "multipleOf"),
                    format!("multipleOf must be a number greater than 0, got {}", step),
                );
            }
        }
        if let Some(unique) = obj.get("uniqueItems") {
            if !unique.is_boolean() {
                result.error(
                    "INVALID_UNIQUE_ITEMS",
                    &child(path, "uniqueItems"),
                    format!("uniqueItems must be a boolean, got {}", unique),
                );
            }
        }
        if let Some(pattern) = obj.get("pattern") {
            self.lint_pattern(pattern, &child(path, "pattern"), result);
        }

        if let Some(format) = obj.get("format").and_then(Value::as_str) {
            if !StringFormat::from_keyword(format).is_recognized() {
                let message = format!("Unknown format '{}' is validated as a plain string", format);
                if self.config.strict_formats {
                    result.error("UNKNOWN_FORMAT", &child(path, "format"), message);
                } else {
                    result.warn("UNKNOWN_FORMAT", &child(path, "format"), message);
                }
            }
        }

        if let Some(reference) = obj.get("$ref") {
            match reference.as_str() {
                Some(reference) => {
                    if let Err(err) = ReferenceResolver::lookup(reference, root) {
                        let code = if reference.starts_with('#') { "UNRESOLVED_REF" } else { "NON_LOCAL_REF" };
                        result.error(code, &child(path, "$ref"), err.message().to_string());
                    }
                }
                None => result.error("INVALID_REF", &child(path, "$ref"), "$ref must be a string".to_string()),
            }
        }

        if self.config.warn_unsupported_keywords {
            for key in UNSUPPORTED_KEYWORDS {
                if obj.contains_key(*key) {
                    result.warn(
                        "UNSUPPORTED_KEYWORD",
                        &child(path, key),
                        format!("'{}' is accepted but not enforced", key),
                    );
                }
            }
        }

        match obj.get("properties") {
            Some(Value::Object(props)) => {
                for (name, prop) in props {
                    self.lint_node(prop, root, &child(&child(path, "properties"), name), result);
                }
            }
            Some(_) => result.error(
                "INVALID_PROPERTIES",
                &child(path, "properties"),
                "properties must be an object".to_string(),
            ),
            None => {}
        }
        if let Some(required) = obj.get("required") {
            self.lint_required(required, obj.get("properties"), path, result);
        }
        if let Some(schema @ Value::Object(_)) = obj.get("additionalProperties") {
            self.lint_node(schema, root, &child(path, "additionalProperties"), result);
        }

        for key in COMBINER_KEYWORDS {
            match obj.get(*key) {
                Some(Value::Array(members)) if !members.is_empty() => {
                    for (i, member) in members.iter().enumerate() {
                        self.lint_node(member, root, &format!("{}[{}]", child(path, key), i), result);
                    }
                }
                Some(_) => result.error(
                    "INVALID_COMBINER",
                    &child(path, key),
                    format!("{} must be a non-empty array of schemas", key),
                ),
                None => {}
            }
        }

        for container in ["definitions", "$defs"] {
            if let Some(defs) = obj.get(container).and_then(Value::as_object) {
                for (name, def) in defs {
                    self.lint_node(def, root, &child(&child(path, container), name), result);
                }
            }
        }
    }

    fn lint_type(&self, ty: &Value, path: &str, result: &mut LintResult) {
        let names: Vec<&Value> = match ty {
            Value::Array(names) if !names.is_empty() => names.iter().collect(),
            Value::Array(_) => {
                result.error("INVALID_TYPE", &child(path, "type"), "Type list must not be empty".to_string());
                return;
            }
            other => vec![other],
        };
        for name in names {
            let known = name.as_str().map_or(false, |n| {
                ScalarKind::from_json_type(n).is_some() || matches!(n, "array" | "object" | ANY_TYPE)
            });
            if !known {
                result.error("INVALID_TYPE", &child(path, "type"), format!("Unsupported type: {}", name));
            }
        }
    }

    fn lint_pattern(&self, pattern: &Value, path: &str, result: &mut LintResult) {
        let source = match pattern.as_str() {
            Some(source) => source,
            None => {
                result.error("INVALID_PATTERN", path, format!("pattern must be a string, got {}", pattern));
                return;
            }
        };
        let parts = split_lookaheads(source).unwrap_or_else(|| vec![source.to_string()]);
        for part in parts {
            if let Err(err) = Pattern::new(&part) {
                result.error("INVALID_PATTERN", path, format!("Invalid pattern '{}': {}", part, err));
            }
        }
    }

    fn lint_required(&self, required: &Value, properties: Option<&Value>, path: &str, result: &mut LintResult) {
        let path = child(path, "required");
        let names = match required.as_array() {
            Some(names) => names,
            None => {
                result.error("INVALID_REQUIRED", &path, "required must be an array of strings".to_string());
                return;
            }
        };
        for name in names {
            match name.as_str() {
                Some(name) => {
                    let declared = properties
                        .and_then(Value::as_object)
                        .map_or(false, |props| props.contains_key(name));
                    if !declared {
                        result.error(
                            "UNDECLARED_REQUIRED",
                            &path,
                            format!("Required field '{}' is not declared in properties", name),
                        );
                    }
                }
                None => result.error(
                    "INVALID_REQUIRED",
                    &path,
                    format!("required entries must be strings, got {}", name),
                ),
            }
        }
    }

    fn lint_graph(&self, root: &Value, result: &mut LintResult) {
        let graph = RefGraph::from_root(root);
        for cycle in graph.alias_cycles() {
            result.error(
                "CIRCULAR_REFERENCE",
                &cycle[0],
                format!("Circular reference detected: {}", cycle.join(" -> ")),
            );
        }
        for pointer in graph.recursive_definitions() {
            result.warn(
                "RECURSIVE_DEFINITION",
                pointer,
                "Definition refers to itself and compiles to a self-referencing model".to_string(),
            );
        }
    }
}

/// Lint with the layered configuration
pub fn lint_schema(schema: &Value) -> LintResult {
    match ModelsConfig::load() {
        Ok(config) => SchemaLinter::from_config(&config).lint(schema),
        Err(err) => {
            tracing::warn!(error = %err, "failed to load configuration, linting with defaults");
            SchemaLinter::default().lint(schema)
        }
    }
}

fn child(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn codes(result: &LintResult) -> Vec<&'static str> {
        result.errors.iter().map(|e| e.code).collect()
    }

    #[test]
    fn test_valid_schema() {
        let linter = SchemaLinter::default();
        let schema = json!({
            "$id": "user",
            "type": "object",
            "properties": {
                "name": {"type": "string", "minLength": 1, "pattern": "^[A-Z]"},
                "tags": {"type": "array", "items": {"type": "string"}}
            },
            "required": ["name"]
        });
        let result = linter.lint(&schema);
        assert!(result.is_clean(), "{:?}", result.errors);
        assert_eq!(result.schema_id, "user");
    }

    #[test]
    fn test_structural_errors_all_reported() {
        let linter = SchemaLinter::default();
        let schema = json!({
            "type": "object",
            "properties": {
                "a": {"type": "strnig"},
                "b": {"type": "array"},
                "c": {"type": "string", "minLength": -1, "pattern": "("},
                "d": {"type": "number", "multipleOf": 0}
            },
            "required": ["a", "ghost"],
            "anyOf": []
        });
        let result = linter.lint(&schema);
        assert_eq!(
            codes(&result),
            vec![
                "INVALID_TYPE",
                "MISSING_ITEMS",
                "INVALID_LENGTH",
                "INVALID_PATTERN",
                "INVALID_MULTIPLE_OF",
                "UNDECLARED_REQUIRED",
                "INVALID_COMBINER"
            ]
        );
        assert_eq!(result.errors[0].path, "properties.a.type");
    }

    #[test]
    fn test_lookahead_patterns_split() {
        let result = SchemaLinter::default().lint(&json!({"type": "string", "pattern": "(?=^[A-Z])(?=[0-9]$)"}));
        assert!(result.is_clean());
    }

    #[test]
    fn test_references() {
        let result = SchemaLinter::default().lint(&json!({
            "type": "object",
            "properties": {
                "a": {"$ref": "#/definitions/missing"},
                "b": {"$ref": "http://example.com/schema.json"},
                "c": {"$ref": "#/definitions/x"}
            },
            "definitions": {
                "x": {"$ref": "#/definitions/y"},
                "y": {"$ref": "#/definitions/x"}
            }
        }));
        let codes = codes(&result);
        assert!(codes.contains(&"UNRESOLVED_REF"));
        assert!(codes.contains(&"NON_LOCAL_REF"));
        assert!(codes.contains(&"CIRCULAR_REFERENCE"));
    }

    #[test]
    fn test_advisories() {
        let schema = json!({
            "type": "object",
            "properties": {
                "host": {"type": "string", "format": "hostname"},
                "alt": {"not": {"type": "string"}}
            },
            "definitions": {
                "node": {"type": "object", "properties": {"next": {"$ref": "#/definitions/node"}}}
            }
        });

        let result = SchemaLinter::default().lint(&schema);
        assert!(result.is_clean());
        let warnings: Vec<&str> = result.warnings.iter().map(|w| w.code).collect();
        assert!(warnings.contains(&"UNKNOWN_FORMAT"));
        assert!(warnings.contains(&"UNSUPPORTED_KEYWORD"));
        assert!(warnings.contains(&"RECURSIVE_DEFINITION"));

        let strict = SchemaLinter::new(LintConfig {
            warn_unsupported_keywords: false,
            strict_formats: true,
        });
        let result = strict.lint(&schema);
        assert_eq!(codes(&result), vec!["UNKNOWN_FORMAT"]);
        assert!(!result.warnings.iter().any(|w| w.code == "UNSUPPORTED_KEYWORD"));
    }

    #[test]
    fn test_relaxed_array_items() {
        let mut config = ModelsConfig::default();
        config.builder.allow_undefined_array_items = true;
        let result = SchemaLinter::from_config(&config).lint(&json!({"type": "array"}));
        assert!(result.is_clean());
    }
}
