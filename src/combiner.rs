//! allOf / anyOf / oneOf
//!
//! - `allOf` is an intersection: members are flattened (following `$ref` and
//!   nested `allOf`) and merged into one synthetic schema, then built like
//!   any other node.
//! - `anyOf` is an untagged union tried in declared order.
//! - `oneOf` is a discriminated union keyed by a const-valued property.

use serde_json::{Map, Value};

use crate::builder::{to_pascal_case, SchemaCompiler};
use crate::constraints::{constraint_fragments, ConstraintBuilder, CONSTRAINT_KEYWORDS};
use crate::context::BuildContext;
use crate::error::{Result, SchemaError};
use crate::model::{ResolvedType, TaggedVariant};
use crate::resolver::refs::is_record_schema;
use crate::resolver::{definition_name, parse_pointer, ReferenceResolver};

#[derive(Debug, Default, Clone, Copy)]
pub struct CombinerHandler;

impl CombinerHandler {
    // =========================================================================
    // allOf
    // =========================================================================

    /// Merge the members of an `allOf` list into one type.
    ///
    /// Object members become a single record named `title` (or the default
    /// model name); scalar members collapse into one constrained scalar.
    pub fn handle_all_of(
        schemas: &Value,
        title: Option<&str>,
        ctx: &mut BuildContext<'_>,
        compiler: &dyn SchemaCompiler,
    ) -> Result<ResolvedType> {
        Self::merge_all_of(schemas, title, None, ctx, compiler)
    }

    /// An `allOf` definition reached through `reference`.
    ///
    /// When the members merge into a record it is registered under the
    /// pointer before its fields are built, so it may refer to itself.
    pub fn handle_referenced_all_of(
        schemas: &Value,
        title: Option<&str>,
        reference: &str,
        ctx: &mut BuildContext<'_>,
        compiler: &dyn SchemaCompiler,
    ) -> Result<ResolvedType> {
        Self::merge_all_of(schemas, title, Some(reference), ctx, compiler)
    }

    fn merge_all_of(
        schemas: &Value,
        title: Option<&str>,
        reference: Option<&str>,
        ctx: &mut BuildContext<'_>,
        compiler: &dyn SchemaCompiler,
    ) -> Result<ResolvedType> {
        let members = combiner_members("allOf", schemas, ctx)?;

        let mut flat = Vec::new();
        for (i, member) in members.iter().enumerate() {
            let index = i.to_string();
            ctx.at(&["allOf", index.as_str()], |ctx| Self::flatten_member(member, ctx, &mut flat))?;
        }

        let object_like = flat.iter().all(|m| match m.get("type") {
            None => true,
            Some(t) => t == "object",
        }) && flat
            .iter()
            .any(|m| m.contains_key("properties") || m.get("type").map_or(false, |t| t == "object"));

        if object_like {
            let mut merged = Self::merge_objects(&flat, ctx)?;
            if let Some(title) = title {
                merged.insert("title".into(), Value::String(title.to_string()));
            }
            let properties = merged
                .get("properties")
                .and_then(Value::as_object)
                .map_or(0, |p| p.len());
            tracing::debug!(members = flat.len(), properties, "merged allOf into record");
            let id = match reference {
                None => compiler.build_record(&Value::Object(merged), title, ctx)?,
                Some(reference) => {
                    let (name, titled) = match merged.get("title").and_then(Value::as_str) {
                        Some(title) => (title.to_string(), true),
                        None => (
                            definition_name(reference)
                                .unwrap_or_else(|| ctx.options.default_model_name.clone()),
                            false,
                        ),
                    };
                    let id = ctx.registry.reserve(name, titled);
                    ctx.ref_models.insert(reference.to_string(), id);
                    tracing::debug!(reference, id = id.index(), "registered referenced allOf record");
                    compiler.build_record_into(id, &Value::Object(merged), ctx)?;
                    id
                }
            };
            return Ok(ResolvedType::Model(id));
        }

        let mut merged = Value::Object(Map::new());
        for member in &flat {
            if let (Some(a), Some(b)) = (merged.get("type"), member.get("type")) {
                if a != b {
                    return Err(SchemaError::combiner(ctx.located(format!(
                        "allOf members declare incompatible types {} and {}",
                        a, b
                    ))));
                }
            }
            merged = Self::merge_schemas(&merged, &Value::Object(member.clone()), ctx)?;
        }
        compiler.resolve_nested(&merged, ctx)
    }

    fn flatten_member(
        member: &Value,
        ctx: &mut BuildContext<'_>,
        out: &mut Vec<Map<String, Value>>,
    ) -> Result<()> {
        let obj = member.as_object().ok_or_else(|| {
            SchemaError::combiner(ctx.located("allOf member must be a schema object"))
        })?;

        if let Some(reference) = obj.get("$ref") {
            let reference = reference.as_str().ok_or_else(|| {
                SchemaError::reference(ctx.located("$ref must be a string"))
            })?;
            let root = ctx.root;
            let target = ReferenceResolver::lookup(reference, root)?;
            let segments = parse_pointer(reference)?;
            ctx.with_reference(reference, |ctx| {
                ctx.relocated(segments, |ctx| Self::flatten_member(target, ctx, out))
            })?;
            let rest = without(obj, "$ref");
            if !rest.is_empty() {
                out.push(rest);
            }
            return Ok(());
        }

        if obj.contains_key("anyOf") || obj.contains_key("oneOf") {
            return Err(SchemaError::combiner(
                ctx.located("allOf members using anyOf/oneOf cannot be merged"),
            ));
        }

        if let Some(nested) = obj.get("allOf") {
            let nested = combiner_members("allOf", nested, ctx)?;
            for (i, member) in nested.iter().enumerate() {
                let index = i.to_string();
                ctx.at(&["allOf", index.as_str()], |ctx| Self::flatten_member(member, ctx, out))?;
            }
            let rest = without(obj, "allOf");
            if !rest.is_empty() {
                out.push(rest);
            }
            return Ok(());
        }

        out.push(obj.clone());
        Ok(())
    }

    /// Union the properties and required lists of object members
    fn merge_objects(
        members: &[Map<String, Value>],
        ctx: &mut BuildContext<'_>,
    ) -> Result<Map<String, Value>> {
        let mut merged = Map::new();
        merged.insert("type".into(), Value::String("object".into()));
        let mut properties = Map::new();
        let mut required: Vec<Value> = Vec::new();

        for member in members {
            for (key, value) in member {
                match key.as_str() {
                    "type" => {}
                    "properties" => {
                        let props = value.as_object().ok_or_else(|| {
                            SchemaError::schema(ctx.located("properties must be an object"))
                        })?;
                        for (name, prop) in props {
                            let next = match properties.get(name) {
                                Some(existing) => ctx.at(&["properties", name.as_str()], |ctx| {
                                    Self::merge_schemas(existing, prop, ctx)
                                })?,
                                None => prop.clone(),
                            };
                            properties.insert(name.clone(), next);
                        }
                    }
                    "required" => {
                        let names = value.as_array().ok_or_else(|| {
                            SchemaError::schema(ctx.located("required must be an array of strings"))
                        })?;
                        for name in names {
                            if !name.is_string() {
                                return Err(SchemaError::schema(
                                    ctx.located("required must be an array of strings"),
                                ));
                            }
                            if !required.contains(name) {
                                required.push(name.clone());
                            }
                        }
                    }
                    "title" | "description" => {
                        merged.entry(key.clone()).or_insert_with(|| value.clone());
                    }
                    "additionalProperties" => {
                        if value == &Value::Bool(false) || !merged.contains_key(key) {
                            merged.insert(key.clone(), value.clone());
                        }
                    }
                    _ => {
                        merged.insert(key.clone(), value.clone());
                    }
                }
            }
        }

        merged.insert("properties".into(), Value::Object(properties));
        if !required.is_empty() {
            merged.insert("required".into(), Value::Array(required));
        }
        Ok(merged)
    }

    /// Intersect two schemas for the same node
    fn merge_schemas(a: &Value, b: &Value, ctx: &mut BuildContext<'_>) -> Result<Value> {
        if a == b {
            return Ok(a.clone());
        }
        let a = inline_ref(a, ctx)?;
        let b = inline_ref(b, ctx)?;
        let (a_obj, b_obj) = match (a.as_object(), b.as_object()) {
            (Some(x), Some(y)) => (x, y),
            _ => {
                return Err(SchemaError::schema(
                    ctx.located("allOf can only merge schema objects"),
                ))
            }
        };

        if let (Some(ta), Some(tb)) = (a_obj.get("type"), b_obj.get("type")) {
            if ta != tb {
                return Err(SchemaError::combiner(ctx.located(format!(
                    "Incompatible types in allOf: {} and {}",
                    ta, tb
                ))));
            }
        }

        let mut out = a_obj.clone();
        for (key, value) in b_obj {
            if CONSTRAINT_KEYWORDS.contains(&key.as_str()) {
                continue;
            }
            match (key.as_str(), out.get(key)) {
                ("properties", Some(Value::Object(existing))) => {
                    let mut props = existing.clone();
                    if let Value::Object(incoming) = value {
                        for (name, prop) in incoming {
                            let next = match props.get(name) {
                                Some(current) => ctx.at(&["properties", name.as_str()], |ctx| {
                                    Self::merge_schemas(current, prop, ctx)
                                })?,
                                None => prop.clone(),
                            };
                            props.insert(name.clone(), next);
                        }
                    }
                    out.insert(key.clone(), Value::Object(props));
                }
                ("required", Some(Value::Array(existing))) => {
                    let mut names = existing.clone();
                    for name in value.as_array().into_iter().flatten() {
                        if !names.contains(name) {
                            names.push(name.clone());
                        }
                    }
                    out.insert(key.clone(), Value::Array(names));
                }
                _ => {
                    out.insert(key.clone(), value.clone());
                }
            }
        }

        let pointer = ctx.pointer();
        let left = ConstraintBuilder::build_constraints(&a).map_err(|e| e.at(&pointer))?;
        let right = ConstraintBuilder::build_constraints(&b).map_err(|e| e.at(&pointer))?;
        let constraints = ConstraintBuilder::merge_constraints(&left, &right);

        for key in CONSTRAINT_KEYWORDS {
            out.remove(*key);
        }
        if constraint_fragments(&out).is_some() {
            out.remove("allOf");
        }
        let container = out.get("type").map_or(false, |t| t == "array");
        out.extend(constraints.to_keywords(container));
        Ok(Value::Object(out))
    }

    // =========================================================================
    // anyOf
    // =========================================================================

    /// Resolve each member into an untagged union, in declared order
    pub fn handle_any_of(
        schemas: &Value,
        ctx: &mut BuildContext<'_>,
        compiler: &dyn SchemaCompiler,
    ) -> Result<ResolvedType> {
        let members = combiner_members("anyOf", schemas, ctx)?;
        let mut types = Vec::with_capacity(members.len());
        for (i, member) in members.iter().enumerate() {
            let index = i.to_string();
            types.push(ctx.at(&["anyOf", index.as_str()], |ctx| compiler.resolve_nested(member, ctx))?);
        }
        tracing::debug!(members = types.len(), "resolved anyOf union");
        Ok(ResolvedType::Union(types))
    }

    // =========================================================================
    // oneOf
    // =========================================================================

    /// Build a discriminated union.
    ///
    /// Accepts the node holding `oneOf` (which may name its discriminator via
    /// `discriminator.propertyName`) or the bare member list.
    pub fn handle_one_of(
        schema_or_list: &Value,
        ctx: &mut BuildContext<'_>,
        compiler: &dyn SchemaCompiler,
    ) -> Result<ResolvedType> {
        let (list, discriminator) = match schema_or_list {
            Value::Array(_) => (schema_or_list, ctx.options.default_discriminator.clone()),
            Value::Object(obj) => {
                let list = obj.get("oneOf").ok_or_else(|| {
                    SchemaError::combiner(ctx.located("Expected a schema with 'oneOf'"))
                })?;
                let discriminator = obj
                    .get("discriminator")
                    .and_then(|d| d.get("propertyName"))
                    .and_then(Value::as_str)
                    .map(String::from)
                    .unwrap_or_else(|| ctx.options.default_discriminator.clone());
                (list, discriminator)
            }
            _ => {
                return Err(SchemaError::combiner(
                    ctx.located("oneOf must be a schema object or a list of schemas"),
                ))
            }
        };

        let members = combiner_members("oneOf", list, ctx)?;
        let mut variants: Vec<TaggedVariant> = Vec::with_capacity(members.len());
        for (i, member) in members.iter().enumerate() {
            let index = i.to_string();
            let variant = ctx.at(&["oneOf", index.as_str()], |ctx| {
                Self::one_of_variant(member, &discriminator, ctx, compiler)
            })?;
            if variants.iter().any(|v| v.tag == variant.tag) {
                return Err(SchemaError::combiner(ctx.located(format!(
                    "Duplicate discriminator value {} in oneOf",
                    variant.tag
                ))));
            }
            variants.push(variant);
        }

        tracing::debug!(discriminator = %discriminator, variants = variants.len(), "built discriminated union");
        Ok(ResolvedType::Tagged {
            discriminator,
            variants,
        })
    }

    fn one_of_variant(
        member: &Value,
        discriminator: &str,
        ctx: &mut BuildContext<'_>,
        compiler: &dyn SchemaCompiler,
    ) -> Result<TaggedVariant> {
        let obj = member.as_object().ok_or_else(|| {
            SchemaError::combiner(ctx.located("oneOf member must be an object schema"))
        })?;

        if let Some(reference) = obj.get("$ref").and_then(Value::as_str) {
            let root = ctx.root;
            let target = ReferenceResolver::lookup(reference, root)?;
            let tag = discriminator_tag(target, discriminator).ok_or_else(|| missing_discriminator(ctx, discriminator))?;
            let ty = ReferenceResolver::resolve_ref_type(reference, ctx, compiler)?;
            return match ty.peel() {
                ResolvedType::Model(id) => Ok(TaggedVariant {
                    tag,
                    model: *id,
                    pointer: Some(reference.to_string()),
                }),
                _ => Err(SchemaError::combiner(ctx.located(format!(
                    "oneOf member '{}' must be an object schema",
                    reference
                )))),
            };
        }

        if !is_record_schema(member) {
            return Err(SchemaError::combiner(
                ctx.located("oneOf member must be an object schema"),
            ));
        }
        let tag = discriminator_tag(member, discriminator).ok_or_else(|| missing_discriminator(ctx, discriminator))?;
        let hint = match &tag {
            Value::String(s) => to_pascal_case(s),
            other => format!("{}{}", ctx.options.default_model_name, other),
        };
        let model = compiler.build_record(member, Some(&hint), ctx)?;
        Ok(TaggedVariant {
            tag,
            model,
            pointer: None,
        })
    }
}

fn missing_discriminator(ctx: &BuildContext<'_>, discriminator: &str) -> SchemaError {
    SchemaError::combiner(ctx.located(format!(
        "oneOf member lacks a '{}' discriminator with a const value",
        discriminator
    )))
}

/// Validate that a combiner value is a non-empty list
fn combiner_members<'v>(
    keyword: &str,
    schemas: &'v Value,
    ctx: &BuildContext<'_>,
) -> Result<&'v [Value]> {
    match schemas.as_array() {
        Some(list) if !list.is_empty() => Ok(list),
        Some(_) => Err(SchemaError::combiner(ctx.located(format!(
            "{} must contain at least one schema",
            keyword
        )))),
        None => Err(SchemaError::combiner(
            ctx.located(format!("{} must be an array", keyword)),
        )),
    }
}

/// The const value of the discriminator property, if the member declares one
fn discriminator_tag(member: &Value, discriminator: &str) -> Option<Value> {
    let prop = member.get("properties")?.get(discriminator)?;
    if let Some(value) = prop.get("const") {
        return Some(value.clone());
    }
    match prop.get("enum").and_then(Value::as_array) {
        Some(values) if values.len() == 1 => Some(values[0].clone()),
        _ => None,
    }
}

fn without(obj: &Map<String, Value>, key: &str) -> Map<String, Value> {
    obj.iter()
        .filter(|(k, _)| k.as_str() != key)
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Replace a `$ref` node by its target, keeping sibling keys on top
fn inline_ref(node: &Value, ctx: &BuildContext<'_>) -> Result<Value> {
    let reference = match node.get("$ref").and_then(Value::as_str) {
        Some(reference) => reference,
        None => return Ok(node.clone()),
    };
    let mut target = ReferenceResolver::lookup(reference, ctx.root)?.clone();
    if let (Value::Object(target_obj), Some(obj)) = (&mut target, node.as_object()) {
        for (key, value) in obj {
            if key != "$ref" {
                target_obj.insert(key.clone(), value.clone());
            }
        }
    }
    Ok(target)
}
