//! Type resolution for a single schema node
//!
//! Maps `const`/`enum`/`format`/`type` onto a [`ResolvedType`]. Arrays recurse
//! into their items and objects with `properties` are handed back to the
//! compiler to become records. `$ref` and combiners are handled before a node
//! gets here.

use serde_json::{Map, Value};

use crate::builder::SchemaCompiler;
use crate::context::BuildContext;
use crate::error::{Result, SchemaError};
use crate::model::{ResolvedType, ScalarKind, StringFormat};

/// Name accepted as an explicit "anything" type
pub const ANY_TYPE: &str = "anyType";

#[derive(Debug, Default, Clone, Copy)]
pub struct TypeResolver;

impl TypeResolver {
    pub fn resolve_type(
        node: &Value,
        ctx: &mut BuildContext<'_>,
        compiler: &dyn SchemaCompiler,
    ) -> Result<ResolvedType> {
        let obj = node.as_object().ok_or_else(|| {
            SchemaError::schema(ctx.located("Schema must be a JSON object"))
        })?;

        let declared = obj
            .get("type")
            .and_then(Value::as_str)
            .and_then(ScalarKind::from_json_type);

        // =====================================================================
        // Literals
        // =====================================================================

        if let Some(value) = obj.get("const") {
            if value.is_null() {
                return Ok(ResolvedType::Optional(Box::new(ResolvedType::Any)));
            }
            return Ok(ResolvedType::Literal {
                values: vec![value.clone()],
                is_const: true,
                declared,
            });
        }

        if let Some(values) = obj.get("enum") {
            let values = values
                .as_array()
                .filter(|v| !v.is_empty())
                .ok_or_else(|| SchemaError::schema(ctx.located("enum must be a non-empty array")))?;
            return Ok(ResolvedType::Literal {
                values: values.clone(),
                is_const: false,
                declared,
            });
        }

        // =====================================================================
        // Type lists (nullable unions)
        // =====================================================================

        if let Some(Value::Array(names)) = obj.get("type") {
            return Self::resolve_type_list(obj, names, ctx, compiler);
        }

        // =====================================================================
        // Formats
        // =====================================================================

        let type_name = match obj.get("type") {
            None => None,
            Some(Value::String(s)) => Some(s.as_str()),
            Some(other) => {
                return Err(SchemaError::type_error(
                    ctx.located(format!("Unsupported type: {}", other)),
                ))
            }
        };

        if let Some(format) = obj.get("format").and_then(Value::as_str) {
            if matches!(type_name, None | Some("string")) {
                let format = StringFormat::from_keyword(format);
                if !format.is_recognized() {
                    tracing::trace!(format = format.as_keyword(), "unrecognized format, using string");
                }
                return Ok(ResolvedType::Format(format));
            }
        }

        // =====================================================================
        // Containers, records and scalars
        // =====================================================================

        match type_name {
            Some("array") => Self::resolve_array(obj, ctx, compiler),
            Some("object") => {
                if obj.contains_key("properties") {
                    Ok(ResolvedType::Model(compiler.build_record(node, None, ctx)?))
                } else {
                    Self::resolve_map(obj, ctx, compiler)
                }
            }
            Some(ANY_TYPE) => Ok(ResolvedType::Any),
            Some(name) => ScalarKind::from_json_type(name)
                .map(ResolvedType::Scalar)
                .ok_or_else(|| {
                    SchemaError::type_error(ctx.located(format!("Unsupported type: '{}'", name)))
                }),
            None if obj.contains_key("properties") => {
                Ok(ResolvedType::Model(compiler.build_record(node, None, ctx)?))
            }
            None if ctx.options.allow_undefined_type => Ok(ResolvedType::Any),
            None => Err(SchemaError::type_error(ctx.located(
                "Schema must specify a type. Set allow_undefined_type=True to allow",
            ))),
        }
    }

    fn resolve_type_list(
        obj: &Map<String, Value>,
        names: &[Value],
        ctx: &mut BuildContext<'_>,
        compiler: &dyn SchemaCompiler,
    ) -> Result<ResolvedType> {
        let mut nullable = false;
        let mut members = Vec::new();
        for name in names {
            match name.as_str() {
                Some("null") => nullable = true,
                Some(name) => {
                    let mut single = obj.clone();
                    single.insert("type".into(), Value::String(name.to_string()));
                    members.push(Self::resolve_type(&Value::Object(single), ctx, compiler)?);
                }
                None => {
                    return Err(SchemaError::type_error(
                        ctx.located(format!("Unsupported type: {}", name)),
                    ))
                }
            }
        }

        let inner = match members.len() {
            0 if nullable => return Ok(ResolvedType::Optional(Box::new(ResolvedType::Any))),
            0 => return Err(SchemaError::type_error(ctx.located("Type list must not be empty"))),
            1 => members.remove(0),
            _ => ResolvedType::Union(members),
        };

        Ok(if nullable {
            ResolvedType::Optional(Box::new(inner))
        } else {
            inner
        })
    }

    fn resolve_array(
        obj: &Map<String, Value>,
        ctx: &mut BuildContext<'_>,
        compiler: &dyn SchemaCompiler,
    ) -> Result<ResolvedType> {
        let item = match obj.get("items") {
            None if ctx.options.allow_undefined_array_items => ResolvedType::Any,
            None => {
                return Err(SchemaError::type_error(
                    ctx.located("Array type must specify 'items' schema"),
                ))
            }
            Some(items @ Value::Object(_)) => {
                ctx.at(&["items"], |ctx| compiler.resolve_nested(items, ctx))?
            }
            Some(_) => {
                return Err(SchemaError::type_error(
                    ctx.located("Tuple-style 'items' arrays are not supported"),
                ))
            }
        };

        let unique = obj.get("uniqueItems").and_then(Value::as_bool).unwrap_or(false);
        Ok(if unique {
            ResolvedType::Set(Box::new(item))
        } else {
            ResolvedType::List(Box::new(item))
        })
    }

    fn resolve_map(
        obj: &Map<String, Value>,
        ctx: &mut BuildContext<'_>,
        compiler: &dyn SchemaCompiler,
    ) -> Result<ResolvedType> {
        let value = match obj.get("additionalProperties") {
            Some(schema @ Value::Object(_)) => ctx.at(&["additionalProperties"], |ctx| {
                compiler.resolve_nested(schema, ctx)
            })?,
            _ => ResolvedType::Any,
        };
        Ok(ResolvedType::Map(Box::new(value)))
    }
}
