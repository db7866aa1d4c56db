//! Regenerate a JSON Schema document from a compiled [`TypeDefinition`]

use serde_json::{Map, Value};

use crate::model::{
    ExtraFields, FieldDef, ModelKind, ResolvedType, TypeDefinition, TypeId, TypeRegistry,
};

/// Discriminator name that needs no explicit `discriminator` keyword
const IMPLICIT_DISCRIMINATOR: &str = "type";

/// Rebuild the schema `def` was compiled from.
///
/// Referenced records come back as `$ref`s with the root's `definitions`
/// carried over verbatim; allOf comes back in its merged form.
pub fn regenerate_schema(def: &TypeDefinition) -> Value {
    if def.document.contains_key("$ref") {
        return Value::Object(def.document.clone());
    }
    let mut emitter = Emitter {
        registry: &def.registry,
        visiting: Vec::new(),
    };
    let mut out = emitter.model(def.root);
    for (key, value) in &def.document {
        out.insert(key.clone(), value.clone());
    }
    Value::Object(out)
}

impl TypeDefinition {
    pub fn to_schema(&self) -> Value {
        regenerate_schema(self)
    }
}

struct Emitter<'r> {
    registry: &'r TypeRegistry,
    visiting: Vec<TypeId>,
}

impl<'r> Emitter<'r> {
    fn model(&mut self, id: TypeId) -> Map<String, Value> {
        let mut out = Map::new();
        if self.visiting.contains(&id) {
            // Only reachable through a handle with no `$ref` to point at
            out.insert("$ref".into(), Value::String("#".into()));
            return out;
        }
        self.visiting.push(id);

        let registry = self.registry;
        let model = registry.get(id);
        match &model.kind {
            ModelKind::Record {
                fields,
                required,
                extra,
            } => {
                out.insert("type".into(), Value::String("object".into()));
                self.header(&mut out, model.titled.then_some(model.name.as_str()), model.description.as_deref());
                let properties: Map<String, Value> = fields
                    .iter()
                    .map(|f| (f.name.clone(), Value::Object(self.field(f))))
                    .collect();
                out.insert("properties".into(), Value::Object(properties));
                if !required.is_empty() {
                    let names = required.iter().cloned().map(Value::String).collect();
                    out.insert("required".into(), Value::Array(names));
                }
                match extra {
                    ExtraFields::Forbid => {
                        out.insert("additionalProperties".into(), Value::Bool(false));
                    }
                    ExtraFields::Allow => {
                        out.insert("additionalProperties".into(), Value::Bool(true));
                    }
                    ExtraFields::Schema(ty) => {
                        out.insert("additionalProperties".into(), Value::Object(self.ty(ty)));
                    }
                    ExtraFields::Ignore => {}
                }
            }
            ModelKind::Wrapper { inner, constraints } => {
                out = self.ty(inner);
                self.header(&mut out, model.titled.then_some(model.name.as_str()), model.description.as_deref());
                out.extend(constraints.to_keywords(inner.is_container()));
            }
            ModelKind::Pending => {}
        }
        for (key, value) in model.annotations.iter().chain(&model.extensions) {
            out.insert(key.clone(), value.clone());
        }

        self.visiting.pop();
        out
    }

    fn header(&self, out: &mut Map<String, Value>, title: Option<&str>, description: Option<&str>) {
        if let Some(title) = title {
            out.insert("title".into(), Value::String(title.to_string()));
        }
        if let Some(description) = description {
            out.insert("description".into(), Value::String(description.to_string()));
        }
    }

    fn field(&mut self, field: &FieldDef) -> Map<String, Value> {
        let mut out = self.ty(&field.ty);
        out.extend(field.constraints.to_keywords(field.ty.is_container()));
        for (key, value) in &field.extensions {
            out.insert(key.clone(), value.clone());
        }
        out
    }

    fn ty(&mut self, ty: &ResolvedType) -> Map<String, Value> {
        let mut out = Map::new();
        match ty {
            ResolvedType::Any => {}
            ResolvedType::Scalar(kind) => {
                out.insert("type".into(), Value::String(kind.as_json_type().into()));
            }
            ResolvedType::Format(format) => {
                out.insert("type".into(), Value::String("string".into()));
                out.insert("format".into(), Value::String(format.as_keyword().into()));
            }
            ResolvedType::Literal {
                values,
                is_const,
                declared,
            } => {
                if let Some(kind) = declared {
                    out.insert("type".into(), Value::String(kind.as_json_type().into()));
                }
                match (is_const, values.as_slice()) {
                    (true, [value]) => {
                        out.insert("const".into(), value.clone());
                    }
                    _ => {
                        out.insert("enum".into(), Value::Array(values.clone()));
                    }
                }
            }
            ResolvedType::Optional(inner) => {
                if matches!(**inner, ResolvedType::Any) {
                    out.insert("type".into(), Value::String("null".into()));
                    return out;
                }
                out = self.ty(inner);
                let nullable = match out.get("type") {
                    Some(Value::String(name)) => {
                        Some(Value::Array(vec![Value::String(name.clone()), Value::String("null".into())]))
                    }
                    Some(Value::Array(names)) => {
                        let mut names = names.clone();
                        names.push(Value::String("null".into()));
                        Some(Value::Array(names))
                    }
                    _ => None,
                };
                match nullable {
                    Some(types) => {
                        out.insert("type".into(), types);
                    }
                    None => {
                        let members = vec![Value::Object(out), serde_json::json!({"type": "null"})];
                        let mut any_of = Map::new();
                        any_of.insert("anyOf".into(), Value::Array(members));
                        return any_of;
                    }
                }
            }
            ResolvedType::List(inner) | ResolvedType::Set(inner) => {
                out.insert("type".into(), Value::String("array".into()));
                if !matches!(**inner, ResolvedType::Any) {
                    out.insert("items".into(), Value::Object(self.ty(inner)));
                }
                if matches!(ty, ResolvedType::Set(_)) {
                    out.insert("uniqueItems".into(), Value::Bool(true));
                }
            }
            ResolvedType::Map(inner) => {
                out.insert("type".into(), Value::String("object".into()));
                if !matches!(**inner, ResolvedType::Any) {
                    out.insert("additionalProperties".into(), Value::Object(self.ty(inner)));
                }
            }
            ResolvedType::Model(id) => out = self.model(*id),
            ResolvedType::Ref { pointer, .. } => {
                out.insert("$ref".into(), Value::String(pointer.clone()));
            }
            ResolvedType::Union(members) => {
                let members = members.iter().map(|m| Value::Object(self.ty(m))).collect();
                out.insert("anyOf".into(), Value::Array(members));
            }
            ResolvedType::Tagged {
                discriminator,
                variants,
            } => {
                let members = variants
                    .iter()
                    .map(|v| match &v.pointer {
                        Some(pointer) => serde_json::json!({ "$ref": pointer }),
                        None => Value::Object(self.model(v.model)),
                    })
                    .collect();
                out.insert("oneOf".into(), Value::Array(members));
                if discriminator != IMPLICIT_DISCRIMINATOR {
                    out.insert(
                        "discriminator".into(),
                        serde_json::json!({ "propertyName": discriminator }),
                    );
                }
            }
            ResolvedType::Constrained { inner, constraints } => {
                out = self.ty(inner);
                out.extend(constraints.to_keywords(inner.is_container()));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use crate::builder::create_model;
    use serde_json::json;

    #[test]
    fn test_simple_round_trip() {
        let schema = json!({
            "type": "object",
            "title": "User",
            "description": "An account",
            "properties": {
                "name": {"type": "string", "minLength": 1, "description": "Display name"},
                "age": {"type": "integer", "minimum": 0, "maximum": 150},
                "email": {"type": "string", "format": "email"},
                "tags": {"type": "array", "items": {"type": "string"}, "maxItems": 5}
            },
            "required": ["name"]
        });
        let def = create_model(&schema).unwrap();
        assert_eq!(def.to_schema(), schema);
    }

    #[test]
    fn test_property_order_kept() {
        let schema = json!({
            "type": "object",
            "properties": {"z": {"type": "string"}, "a": {"type": "string"}, "m": {"type": "string"}}
        });
        let regenerated = create_model(&schema).unwrap().to_schema();
        let keys: Vec<&String> = regenerated["properties"].as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_refs_and_definitions_round_trip() {
        let schema = json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "type": "object",
            "properties": {
                "pet": {"$ref": "#/definitions/pet"},
                "kind": {"type": ["string", "null"]}
            },
            "definitions": {
                "pet": {"type": "object", "properties": {"name": {"type": "string"}}}
            }
        });
        let def = create_model(&schema).unwrap();
        assert_eq!(def.to_schema(), schema);
    }

    #[test]
    fn test_extensions_and_literals_round_trip() {
        let schema = json!({
            "type": "object",
            "x-table": "users",
            "examples": [{"status": "off", "version": 2}],
            "default": {"status": "on", "version": 2},
            "properties": {
                "status": {"type": "string", "enum": ["on", "off"], "default": "on", "x-label": "State"},
                "version": {"const": 2},
                "meta": {"type": "object", "additionalProperties": {"type": "integer"}}
            },
            "additionalProperties": false
        });
        let def = create_model(&schema).unwrap();
        assert_eq!(def.to_schema(), schema);
    }

    #[test]
    fn test_additional_properties_schema_round_trip() {
        let schema = json!({
            "type": "object",
            "properties": {"a": {"type": "string"}},
            "additionalProperties": {"type": "integer", "minimum": 0}
        });
        let def = create_model(&schema).unwrap();
        assert_eq!(def.to_schema(), schema);
    }

    #[test]
    fn test_wrapper_round_trip() {
        let schema = json!({"type": "array", "items": {"type": "string"}, "uniqueItems": true, "minItems": 1});
        assert_eq!(create_model(&schema).unwrap().to_schema(), schema);

        let schema = json!({
            "oneOf": [
                {"type": "object", "title": "Dog", "properties": {"type": {"const": "dog"}, "bark": {"type": "boolean"}}},
                {"type": "object", "title": "Cat", "properties": {"type": {"const": "cat"}}}
            ]
        });
        assert_eq!(create_model(&schema).unwrap().to_schema(), schema);
    }

    #[test]
    fn test_root_ref_round_trip() {
        let schema = json!({
            "$ref": "#/definitions/Node",
            "definitions": {
                "Node": {
                    "type": "object",
                    "properties": {"next": {"$ref": "#/definitions/Node"}}
                }
            }
        });
        assert_eq!(create_model(&schema).unwrap().to_schema(), schema);
    }

    #[test]
    fn test_all_of_regenerates_merged() {
        let def = create_model(&json!({
            "allOf": [
                {"type": "object", "properties": {"a": {"type": "integer", "minimum": 0}}, "required": ["a"]},
                {"type": "object", "properties": {"a": {"type": "integer", "minimum": 5}, "b": {"type": "string"}}}
            ]
        }))
        .unwrap();

        assert_eq!(
            def.to_schema(),
            json!({
                "type": "object",
                "properties": {
                    "a": {"type": "integer", "minimum": 5},
                    "b": {"type": "string"}
                },
                "required": ["a"]
            })
        );
    }
}
