//! `$ref` resolution against a root document
//!
//! Only local JSON pointers (`#/...`) are supported. [`ReferenceResolver::lookup`]
//! is a single pointer walk; [`ReferenceResolver::resolve_ref`] additionally
//! expands every nested `$ref` in the target and rejects cycles.

use serde_json::{Map, Value};

use crate::builder::SchemaCompiler;
use crate::combiner::CombinerHandler;
use crate::constraints::{constraint_fragments, ConstraintBuilder};
use crate::context::{BuildContext, ReferenceStack};
use crate::error::{Result, SchemaError};
use crate::model::ResolvedType;

/// Split a local JSON pointer into unescaped segments
pub fn parse_pointer(reference: &str) -> Result<Vec<String>> {
    let rest = reference.strip_prefix('#').ok_or_else(|| {
        SchemaError::reference(format!("Only local references supported: '{}'", reference))
    })?;

    if rest.is_empty() {
        return Ok(Vec::new());
    }

    let rest = rest.strip_prefix('/').ok_or_else(|| {
        SchemaError::reference(format!("Invalid reference path: '{}'", reference))
    })?;

    Ok(rest
        .split('/')
        .map(|segment| segment.replace("~1", "/").replace("~0", "~"))
        .collect())
}

/// Last pointer segment, used to name records reached through a `$ref`
pub fn definition_name(reference: &str) -> Option<String> {
    parse_pointer(reference)
        .ok()
        .and_then(|segments| segments.last().cloned())
        .filter(|s| !s.is_empty())
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ReferenceResolver;

impl ReferenceResolver {
    /// Walk `root` along `reference` without following nested refs
    pub fn lookup<'r>(reference: &str, root: &'r Value) -> Result<&'r Value> {
        let segments = parse_pointer(reference)?;
        let mut node = root;
        for segment in &segments {
            node = match node {
                Value::Object(obj) => obj.get(segment),
                Value::Array(arr) => segment.parse::<usize>().ok().and_then(|i| arr.get(i)),
                _ => None,
            }
            .ok_or_else(|| {
                SchemaError::reference(format!(
                    "Invalid reference path: '{}' (no '{}')",
                    reference, segment
                ))
            })?;
        }
        Ok(node)
    }

    /// Resolve `reference` to a raw schema node with all nested refs expanded.
    ///
    /// Sibling keys next to a nested `$ref` are laid over the expanded target.
    pub fn resolve_ref(reference: &str, root: &Value) -> Result<Value> {
        let mut stack = ReferenceStack::new();
        Self::resolve_with(reference, root, &mut stack)
    }

    fn resolve_with(reference: &str, root: &Value, stack: &mut ReferenceStack) -> Result<Value> {
        stack.scoped(reference, |stack| {
            let target = Self::lookup(reference, root)?;
            tracing::trace!(reference, depth = stack.depth(), "expanding reference");
            Self::expand(target, root, stack)
        })
    }

    fn expand(node: &Value, root: &Value, stack: &mut ReferenceStack) -> Result<Value> {
        match node {
            Value::Object(obj) => {
                if let Some(reference) = obj.get("$ref").and_then(Value::as_str) {
                    let mut resolved = Self::resolve_with(reference, root, stack)?;
                    if let Value::Object(target) = &mut resolved {
                        for (key, value) in obj {
                            if key != "$ref" {
                                target.insert(key.clone(), Self::expand(value, root, stack)?);
                            }
                        }
                    }
                    return Ok(resolved);
                }
                let mut out = Map::with_capacity(obj.len());
                for (key, value) in obj {
                    out.insert(key.clone(), Self::expand(value, root, stack)?);
                }
                Ok(Value::Object(out))
            }
            Value::Array(items) => items
                .iter()
                .map(|item| Self::expand(item, root, stack))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            other => Ok(other.clone()),
        }
    }

    /// Resolve a `$ref` to a type.
    ///
    /// Record targets, plain or merged from `allOf`, are registered under
    /// their pointer before their fields are built, so a record may contain
    /// itself. Any other target is resolved in place under the cycle guard.
    pub fn resolve_ref_type(
        reference: &str,
        ctx: &mut BuildContext<'_>,
        compiler: &dyn SchemaCompiler,
    ) -> Result<ResolvedType> {
        let cached = ctx.ref_models.get(reference).copied();
        let target = match cached {
            Some(id) => ResolvedType::Model(id),
            None => {
                let root = ctx.root;
                let node = Self::lookup(reference, root)?;
                let segments = parse_pointer(reference)?;
                ctx.with_reference(reference, |ctx| {
                    ctx.relocated(segments, |ctx| {
                        if let Some(members) = all_of_members(node) {
                            let title = node.get("title").and_then(Value::as_str);
                            let ty = CombinerHandler::handle_referenced_all_of(
                                members, title, reference, ctx, compiler,
                            )?;
                            let mut constraints = ConstraintBuilder::build_constraints(node)
                                .map_err(|e| e.at(&ctx.pointer()))?;
                            if matches!(ty, ResolvedType::Model(_)) {
                                constraints.title = None;
                                constraints.description = None;
                            }
                            return Ok(ty.with_constraints(constraints));
                        }
                        if !is_record_schema(node) {
                            return compiler.resolve_nested(node, ctx);
                        }
                        let (name, titled) = match node.get("title").and_then(Value::as_str) {
                            Some(title) => (title.to_string(), true),
                            None => (
                                definition_name(reference)
                                    .unwrap_or_else(|| ctx.options.default_model_name.clone()),
                                false,
                            ),
                        };
                        let id = ctx.registry.reserve(name, titled);
                        ctx.ref_models.insert(reference.to_string(), id);
                        tracing::debug!(reference, id = id.index(), "registered referenced record");
                        compiler.build_record_into(id, node, ctx)?;
                        Ok(ResolvedType::Model(id))
                    })
                })?
            }
        };

        Ok(ResolvedType::Ref {
            pointer: reference.to_string(),
            target: Box::new(target),
        })
    }
}

/// The members of a node the builder treats as an `allOf` intersection
fn all_of_members(node: &Value) -> Option<&Value> {
    let obj = node.as_object()?;
    if obj.contains_key("$ref") || constraint_fragments(obj).is_some() {
        return None;
    }
    obj.get("allOf")
}

/// An object schema with `properties` and nothing that overrides it
pub(crate) fn is_record_schema(node: &Value) -> bool {
    let obj = match node.as_object() {
        Some(obj) => obj,
        None => return false,
    };
    obj.contains_key("properties")
        && !["$ref", "allOf", "anyOf", "oneOf"]
            .iter()
            .any(|key| obj.contains_key(*key))
        && obj.get("type").map_or(true, |t| t == "object")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_resolve_definition() {
        let root = json!({
            "definitions": {
                "pet": {"type": "object", "properties": {"name": {"type": "string"}}}
            }
        });

        let pet = ReferenceResolver::resolve_ref("#/definitions/pet", &root).unwrap();
        assert_eq!(pet, root["definitions"]["pet"]);
    }

    #[test]
    fn test_invalid_reference_path() {
        let root = json!({"valid": {"field": "value"}});
        let err = ReferenceResolver::resolve_ref("#/invalid/path", &root).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Reference);
        assert!(err.message().contains("Invalid reference path"));
    }

    #[test]
    fn test_non_local_references_rejected() {
        let root = json!({});
        for reference in ["http://example.com/schema", "", "not/a/valid/ref"] {
            let err = ReferenceResolver::resolve_ref(reference, &root).unwrap_err();
            assert!(
                err.message().contains("Only local references supported"),
                "unexpected message for '{}': {}",
                reference,
                err
            );
        }
    }

    #[test]
    fn test_pointer_unescaping() {
        assert_eq!(
            parse_pointer("#/definitions/a~1b/c~0d").unwrap(),
            vec!["definitions", "a/b", "c~d"]
        );
        // ~01 is "~1" literally, not "/"
        assert_eq!(parse_pointer("#/x~01").unwrap(), vec!["x~1"]);

        let root = json!({"definitions": {"a/b": {"type": "string"}}});
        let node = ReferenceResolver::lookup("#/definitions/a~1b", &root).unwrap();
        assert_eq!(node, &json!({"type": "string"}));
    }

    #[test]
    fn test_array_index_segments() {
        let root = json!({"allOf": [{"type": "string"}, {"type": "integer"}]});
        let node = ReferenceResolver::lookup("#/allOf/1", &root).unwrap();
        assert_eq!(node["type"], "integer");

        let err = ReferenceResolver::lookup("#/allOf/5", &root).unwrap_err();
        assert!(err.message().contains("Invalid reference path"));
    }

    #[test]
    fn test_nested_references_are_followed() {
        let root = json!({
            "definitions": {
                "person": {"$ref": "#/definitions/address"},
                "address": {"type": "object", "properties": {"street": {"type": "string"}}}
            }
        });

        let resolved = ReferenceResolver::resolve_ref("#/definitions/person", &root).unwrap();
        assert_eq!(resolved, root["definitions"]["address"]);
    }

    #[test]
    fn test_nested_definitions_are_inlined() {
        let root = json!({
            "definitions": {
                "size": {"type": "string", "enum": ["S", "M", "L"]},
                "shirt": {
                    "type": "object",
                    "properties": {"size": {"$ref": "#/definitions/size"}}
                }
            }
        });

        let shirt = ReferenceResolver::resolve_ref("#/definitions/shirt", &root).unwrap();
        assert_eq!(shirt["properties"]["size"], root["definitions"]["size"]);
    }

    #[test]
    fn test_circular_reference_detected() {
        let root = json!({
            "definitions": {
                "person": {
                    "type": "object",
                    "properties": {"friend": {"$ref": "#/definitions/person"}}
                }
            }
        });

        let err = ReferenceResolver::resolve_ref("#/definitions/person", &root).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Reference);
        assert!(err.message().starts_with("Circular reference detected"));
    }

    #[test]
    fn test_sibling_reuse_is_not_a_cycle() {
        let root = json!({
            "definitions": {
                "name": {"type": "string"},
                "pair": {
                    "type": "object",
                    "properties": {
                        "first": {"$ref": "#/definitions/name"},
                        "second": {"$ref": "#/definitions/name"}
                    }
                }
            }
        });

        let pair = ReferenceResolver::resolve_ref("#/definitions/pair", &root).unwrap();
        assert_eq!(pair["properties"]["second"], json!({"type": "string"}));
    }

    #[test]
    fn test_definition_name() {
        assert_eq!(definition_name("#/$defs/TreeNode").as_deref(), Some("TreeNode"));
        assert_eq!(definition_name("#"), None);
    }
}
