//! Model builder: the entry point that turns a schema into a [`TypeDefinition`]
//!
//! The builder walks `properties`, asks the resolvers and the combiner
//! handler for each field's type, the constraint builder for its rules, and
//! assembles records in the per-call registry. Top-level arrays, scalars,
//! literals and unions become single-value wrapper models.

use serde_json::{Map, Value};

use crate::combiner::CombinerHandler;
use crate::config::BuildOptions;
use crate::constraints::{constraint_fragments, ConstraintBuilder};
use crate::context::BuildContext;
use crate::error::{Result, SchemaError};
use crate::model::{
    BaseModel, ExtraFields, FieldDef, FieldDefault, ModelDef, ModelKind, ResolvedType, TypeDefinition,
    TypeId,
};
use crate::resolver::{definition_name, ReferenceResolver, TypeResolver};
use crate::vocabulary::{extension_keys, DOCUMENT_KEYWORDS, STANDARD_FIELD_KEYWORDS, STANDARD_MODEL_KEYWORDS};

// =============================================================================
// Compiler seam
// =============================================================================

/// Recursive entry points the resolvers and combiners call back into
pub trait SchemaCompiler {
    /// Resolve a field (property) schema to its type, without its constraints
    fn resolve_field(&self, node: &Value, ctx: &mut BuildContext<'_>) -> Result<ResolvedType>;

    /// Fill the reserved slot `id` with a record built from `node`
    fn build_record_into(&self, id: TypeId, node: &Value, ctx: &mut BuildContext<'_>) -> Result<()>;

    /// Resolve a nested node (array items, union members) with its constraints
    fn resolve_nested(&self, node: &Value, ctx: &mut BuildContext<'_>) -> Result<ResolvedType> {
        let ty = self.resolve_field(node, ctx)?;
        let mut constraints =
            ConstraintBuilder::build_constraints(node).map_err(|e| e.at(&ctx.pointer()))?;
        if matches!(ty.peel(), ResolvedType::Model(_)) {
            // Carried by the record itself
            constraints.title = None;
            constraints.description = None;
        }
        Ok(ty.with_constraints(constraints))
    }

    /// Reserve a slot and build a record into it
    fn build_record(
        &self,
        node: &Value,
        name_hint: Option<&str>,
        ctx: &mut BuildContext<'_>,
    ) -> Result<TypeId> {
        let (name, titled) = match node.get("title").and_then(Value::as_str) {
            Some(title) => (title.to_string(), true),
            None => (
                name_hint
                    .map(String::from)
                    .unwrap_or_else(|| ctx.options.default_model_name.clone()),
                false,
            ),
        };
        let id = ctx.registry.reserve(name, titled);
        self.build_record_into(id, node, ctx)?;
        Ok(id)
    }
}

// =============================================================================
// Model Builder
// =============================================================================

/// Compiles schemas into type definitions
#[derive(Debug, Clone, Default)]
pub struct ModelBuilder {
    options: BuildOptions,
    base: Option<BaseModel>,
}

impl ModelBuilder {
    pub fn new(options: BuildOptions) -> Self {
        Self { options, base: None }
    }

    /// Prepend `base`'s fields to every generated record
    pub fn with_base_model(mut self, base: BaseModel) -> Self {
        self.base = Some(base);
        self
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Compile `schema`, resolving `$ref`s against `root_schema` (or `schema`
    /// itself when absent)
    pub fn create_model(&self, schema: &Value, root_schema: Option<&Value>) -> Result<TypeDefinition> {
        let obj = schema
            .as_object()
            .ok_or_else(|| SchemaError::schema("Schema must be a JSON object at #"))?;
        let root = root_schema.unwrap_or(schema);
        let mut ctx = BuildContext::new(root, &self.options);

        let title = obj
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or(self.options.default_model_name.as_str());
        tracing::debug!(title, "creating model");
        let root_id = self.build_root(schema, &mut ctx)?;

        let document: Map<String, Value> = obj
            .iter()
            .filter(|(key, _)| DOCUMENT_KEYWORDS.contains(&key.as_str()) || key.as_str() == "$ref")
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        tracing::debug!(
            name = %ctx.registry.get(root_id).name,
            models = ctx.registry.len(),
            "created model"
        );
        Ok(TypeDefinition {
            registry: ctx.registry,
            root: root_id,
            document,
        })
    }

    fn build_root(&self, schema: &Value, ctx: &mut BuildContext<'_>) -> Result<TypeId> {
        let title = schema.get("title").and_then(Value::as_str);

        if let Some(reference) = schema.get("$ref") {
            let reference = reference
                .as_str()
                .ok_or_else(|| SchemaError::reference("$ref must be a string at #"))?;
            let ty = ReferenceResolver::resolve_ref_type(reference, ctx, self)?;
            if let ResolvedType::Model(id) = ty.peel() {
                return Ok(*id);
            }
            let name = title.map(String::from).or_else(|| definition_name(reference));
            return self.wrap(schema, ty, name, ctx);
        }

        let fragments_only = schema
            .as_object()
            .map_or(false, |obj| constraint_fragments(obj).is_some());
        if let Some(members) = schema.get("allOf").filter(|_| !fragments_only) {
            let ty = CombinerHandler::handle_all_of(members, title, ctx, self)?;
            if let ResolvedType::Model(id) = ty {
                return Ok(id);
            }
            return self.wrap(schema, ty, None, ctx);
        }
        if let Some(members) = schema.get("anyOf") {
            let ty = CombinerHandler::handle_any_of(members, ctx, self)?;
            return self.wrap(schema, ty, None, ctx);
        }
        if schema.get("oneOf").is_some() {
            let ty = CombinerHandler::handle_one_of(schema, ctx, self)?;
            return self.wrap(schema, ty, None, ctx);
        }

        if Self::is_single_value(schema) {
            let ty = TypeResolver::resolve_type(schema, ctx, self)?;
            return self.wrap(schema, ty, None, ctx);
        }

        self.build_record(schema, None, ctx)
    }

    /// Arrays, scalars, type lists and bare literals at the top level
    fn is_single_value(schema: &Value) -> bool {
        if schema.get("properties").is_some() {
            return false;
        }
        match schema.get("type") {
            Some(Value::String(t)) => t != "object",
            Some(Value::Array(_)) => true,
            Some(_) => false,
            None => schema.get("enum").is_some() || schema.get("const").is_some(),
        }
    }

    /// Register a single-value root model around `inner`
    fn wrap(
        &self,
        schema: &Value,
        inner: ResolvedType,
        name: Option<String>,
        ctx: &mut BuildContext<'_>,
    ) -> Result<TypeId> {
        let mut constraints =
            ConstraintBuilder::build_constraints(schema).map_err(|e| e.at(&ctx.pointer()))?;
        let description = constraints.description.take();
        let title = constraints.title.take();
        let titled = title.is_some();
        let name = title
            .or(name)
            .unwrap_or_else(|| self.options.default_model_name.clone());

        let mut extensions = extension_keys(schema, STANDARD_MODEL_KEYWORDS);
        extensions.retain(|key, _| !STANDARD_FIELD_KEYWORDS.contains(&key.as_str()));

        tracing::debug!(%name, "wrapping single-value root model");
        Ok(ctx.registry.insert(ModelDef {
            name,
            titled,
            description,
            kind: ModelKind::Wrapper { inner, constraints },
            annotations: Map::new(),
            extensions,
        }))
    }

    fn build_field(
        &self,
        name: &str,
        node: &Value,
        required: bool,
        ctx: &mut BuildContext<'_>,
    ) -> Result<FieldDef> {
        if !node.is_object() {
            return Err(SchemaError::schema(ctx.located("Property schema must be an object")));
        }
        let ty = self.resolve_field(node, ctx)?;
        let constraints =
            ConstraintBuilder::build_constraints(node).map_err(|e| e.at(&ctx.pointer()))?;
        let default = match (&constraints.default, required) {
            (Some(value), _) => FieldDefault::Value(value.clone()),
            (None, true) => FieldDefault::Required,
            (None, false) => FieldDefault::Unset,
        };

        tracing::trace!(field = name, ty = ?ty, required, "built field");
        Ok(FieldDef {
            name: name.to_string(),
            ty,
            constraints,
            required,
            default,
            extensions: extension_keys(node, STANDARD_FIELD_KEYWORDS),
        })
    }
}

impl SchemaCompiler for ModelBuilder {
    fn resolve_field(&self, node: &Value, ctx: &mut BuildContext<'_>) -> Result<ResolvedType> {
        let obj = node
            .as_object()
            .ok_or_else(|| SchemaError::schema(ctx.located("Schema must be a JSON object")))?;

        if let Some(reference) = obj.get("$ref") {
            let reference = reference
                .as_str()
                .ok_or_else(|| SchemaError::reference(ctx.located("$ref must be a string")))?;
            return ReferenceResolver::resolve_ref_type(reference, ctx, self);
        }
        if let Some(members) = obj.get("allOf").filter(|_| constraint_fragments(obj).is_none()) {
            return CombinerHandler::handle_all_of(members, None, ctx, self);
        }
        if let Some(members) = obj.get("anyOf") {
            return CombinerHandler::handle_any_of(members, ctx, self);
        }
        if obj.contains_key("oneOf") {
            return CombinerHandler::handle_one_of(node, ctx, self);
        }
        TypeResolver::resolve_type(node, ctx, self)
    }

    fn build_record_into(&self, id: TypeId, node: &Value, ctx: &mut BuildContext<'_>) -> Result<()> {
        let obj = node
            .as_object()
            .ok_or_else(|| SchemaError::schema(ctx.located("Schema must be a JSON object")))?;

        let empty = Map::new();
        let properties = match obj.get("properties") {
            None => &empty,
            Some(Value::Object(props)) => props,
            Some(_) => {
                return Err(SchemaError::schema(ctx.located("properties must be an object")))
            }
        };

        let required: Vec<String> = match obj.get("required") {
            None => Vec::new(),
            Some(Value::Array(names)) => names
                .iter()
                .map(|n| n.as_str().map(String::from))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| {
                    SchemaError::schema(ctx.located("required must be an array of strings"))
                })?,
            Some(_) => {
                return Err(SchemaError::schema(
                    ctx.located("required must be an array of strings"),
                ))
            }
        };
        if let Some(missing) = required.iter().find(|name| !properties.contains_key(*name)) {
            return Err(SchemaError::schema(ctx.located(format!(
                "Required field '{}' is not declared in properties",
                missing
            ))));
        }

        let mut fields = Vec::with_capacity(properties.len());
        if let Some(base) = &self.base {
            fields.extend(
                base.fields
                    .iter()
                    .filter(|f| !properties.contains_key(&f.name))
                    .cloned(),
            );
        }
        for (name, prop) in properties {
            let is_required = required.contains(name);
            let field = ctx.at(&["properties", name.as_str()], |ctx| {
                self.build_field(name, prop, is_required, ctx)
            })?;
            fields.push(field);
        }

        let extra = match obj.get("additionalProperties") {
            None => ExtraFields::Ignore,
            Some(Value::Bool(false)) => ExtraFields::Forbid,
            Some(Value::Object(schema)) if schema.is_empty() => {
                ExtraFields::Schema(ResolvedType::Any)
            }
            Some(schema @ Value::Object(_)) => {
                let ty = ctx.at(&["additionalProperties"], |ctx| self.resolve_nested(schema, ctx))?;
                ExtraFields::Schema(ty)
            }
            Some(_) => ExtraFields::Allow,
        };

        let description = obj
            .get("description")
            .and_then(Value::as_str)
            .map(String::from);
        let annotations: Map<String, Value> = ["default", "examples"]
            .iter()
            .filter_map(|key| obj.get(*key).map(|value| (key.to_string(), value.clone())))
            .collect();
        let mut extensions = extension_keys(node, STANDARD_MODEL_KEYWORDS);
        extensions.retain(|key, _| !STANDARD_FIELD_KEYWORDS.contains(&key.as_str()));

        let reserved = ctx.registry.get(id);
        let model = ModelDef {
            name: reserved.name.clone(),
            titled: reserved.titled,
            description,
            kind: ModelKind::Record {
                fields,
                required,
                extra,
            },
            annotations,
            extensions,
        };
        tracing::debug!(name = %model.name, fields = model.fields().len(), "built record");
        ctx.registry.complete(id, model);
        Ok(())
    }
}

/// Compile `schema` with default options
pub fn create_model(schema: &Value) -> Result<TypeDefinition> {
    ModelBuilder::default().create_model(schema, None)
}

/// Compile `schema` against an explicit root with the given options
pub fn create_model_with(
    schema: &Value,
    root_schema: Option<&Value>,
    options: BuildOptions,
) -> Result<TypeDefinition> {
    ModelBuilder::new(options).create_model(schema, root_schema)
}

// =============================================================================
// Naming
// =============================================================================

/// Convert a discriminator value or definition key to a type name
pub fn to_pascal_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut capitalize_next = true;
    let is_all_caps = s
        .chars()
        .all(|c| c.is_ascii_uppercase() || c == '_' || c == '-' || c == ' ');

    for c in s.chars() {
        if c == '_' || c == '-' || c == ' ' || c == '.' {
            capitalize_next = true;
        } else if capitalize_next {
            result.push(c.to_ascii_uppercase());
            capitalize_next = false;
        } else if is_all_caps {
            result.push(c.to_ascii_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::model::{ScalarKind, StringFormat};
    use serde_json::json;

    #[test]
    fn test_simple_record() {
        let def = create_model(&json!({
            "title": "User",
            "description": "A user account",
            "type": "object",
            "properties": {
                "name": {"type": "string", "description": "Display name"},
                "age": {"type": "integer", "minimum": 0},
                "email": {"type": "string", "format": "email"}
            },
            "required": ["name"]
        }))
        .unwrap();

        assert_eq!(def.name(), "User");
        assert_eq!(def.description(), Some("A user account"));
        assert_eq!(def.field_names(), vec!["name", "age", "email"]);

        let name = def.field("name").unwrap();
        assert!(name.required);
        assert_eq!(name.default, FieldDefault::Required);
        assert_eq!(name.description(), Some("Display name"));

        let age = def.field("age").unwrap();
        assert!(!age.required);
        assert_eq!(age.default, FieldDefault::Unset);
        assert_eq!(age.ty, ResolvedType::Scalar(ScalarKind::Integer));

        assert_eq!(def.field("email").unwrap().ty, ResolvedType::Format(StringFormat::Email));
    }

    #[test]
    fn test_default_title_and_defaults() {
        let def = create_model(&json!({
            "type": "object",
            "properties": {"status": {"type": "string", "default": "active"}}
        }))
        .unwrap();

        assert_eq!(def.name(), "DynamicModel");
        assert_eq!(def.field("status").unwrap().default, FieldDefault::Value(json!("active")));
    }

    #[test]
    fn test_required_must_be_declared() {
        let err = create_model(&json!({
            "type": "object",
            "properties": {"name": {"type": "string"}},
            "required": ["name", "ghost"]
        }))
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Schema);
        assert!(err.message().contains("'ghost'"));
    }

    #[test]
    fn test_non_object_schema() {
        let err = create_model(&json!(["not", "a", "schema"])).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);
    }

    #[test]
    fn test_nested_record() {
        let def = create_model(&json!({
            "type": "object",
            "properties": {
                "address": {
                    "type": "object",
                    "title": "Address",
                    "properties": {"street": {"type": "string"}},
                    "required": ["street"]
                }
            }
        }))
        .unwrap();

        let address = def.model_of(&def.field("address").unwrap().ty).unwrap();
        assert_eq!(address.name, "Address");
        assert!(address.field("street").unwrap().required);
    }

    #[test]
    fn test_extension_keys_preserved() {
        let def = create_model(&json!({
            "type": "object",
            "x-owner": "billing",
            "properties": {"amount": {"type": "number", "x-unit": "EUR"}}
        }))
        .unwrap();

        assert_eq!(def.extensions().get("x-owner"), Some(&json!("billing")));
        assert_eq!(def.field("amount").unwrap().extensions.get("x-unit"), Some(&json!("EUR")));
    }

    #[test]
    fn test_error_names_the_path() {
        let err = create_model(&json!({
            "type": "object",
            "properties": {"tags": {"type": "array"}}
        }))
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Type);
        assert!(err.message().contains("#/properties/tags"), "{}", err);
    }

    #[test]
    fn test_top_level_wrappers() {
        let def = create_model(&json!({"type": "array", "items": {"type": "string"}, "minItems": 1})).unwrap();
        assert!(def.is_wrapper());
        let (inner, constraints) = def.wrapped().unwrap();
        assert_eq!(*inner, ResolvedType::List(Box::new(ResolvedType::Scalar(ScalarKind::String))));
        assert_eq!(constraints.min_length, Some(1));

        let def = create_model(&json!({"type": "integer", "title": "Count"})).unwrap();
        assert_eq!(def.name(), "Count");
        assert!(def.is_wrapper());

        let def = create_model(&json!({"enum": ["a", "b"]})).unwrap();
        assert!(matches!(def.wrapped(), Some((ResolvedType::Literal { .. }, _))));
    }

    #[test]
    fn test_base_model_fields() {
        let base = BaseModel {
            name: "Tracked".into(),
            fields: vec![FieldDef::new("trace_id", ResolvedType::Format(StringFormat::Uuid))],
        };
        let builder = ModelBuilder::default().with_base_model(base);
        let def = builder
            .create_model(
                &json!({"type": "object", "properties": {"name": {"type": "string"}}}),
                None,
            )
            .unwrap();

        assert_eq!(def.field_names(), vec!["trace_id", "name"]);
    }

    #[test]
    fn test_self_reference_uses_handle() {
        let def = create_model(&json!({
            "$ref": "#/definitions/TreeNode",
            "definitions": {
                "TreeNode": {
                    "type": "object",
                    "properties": {
                        "value": {"type": "integer"},
                        "children": {"type": "array", "items": {"$ref": "#/definitions/TreeNode"}}
                    }
                }
            }
        }))
        .unwrap();

        assert_eq!(def.name(), "TreeNode");
        let children = def.field("children").unwrap();
        match &children.ty {
            ResolvedType::List(items) => match items.peel() {
                ResolvedType::Model(id) => assert_eq!(*id, def.root()),
                other => panic!("Expected Model handle, got {:?}", other),
            },
            other => panic!("Expected List, got {:?}", other),
        }
    }

    #[test]
    fn test_alias_cycle_is_rejected() {
        let err = create_model(&json!({
            "type": "object",
            "properties": {"a": {"$ref": "#/definitions/a"}},
            "definitions": {
                "a": {"$ref": "#/definitions/b"},
                "b": {"$ref": "#/definitions/a"}
            }
        }))
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Reference);
        assert!(err.message().starts_with("Circular reference detected"));
    }

    #[test]
    fn test_pascal_case() {
        assert_eq!(to_pascal_case("dog"), "Dog");
        assert_eq!(to_pascal_case("credit_card"), "CreditCard");
        assert_eq!(to_pascal_case("BANK-TRANSFER"), "BankTransfer");
    }
}
