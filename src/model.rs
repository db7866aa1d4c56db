//! Resolved types and the type definitions they assemble into
//!
//! Composite records live in a [`TypeRegistry`] arena and are referred to by
//! [`TypeId`] handles, which is what lets a record contain itself.

use serde_json::{Map, Value};
use std::fmt;

use crate::constraints::ConstraintSet;

// =============================================================================
// Scalars and Formats
// =============================================================================

/// JSON scalar type names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    String,
    Integer,
    Number,
    Boolean,
    Null,
}

impl ScalarKind {
    pub fn from_json_type(s: &str) -> Option<Self> {
        match s {
            "string" => Some(Self::String),
            "integer" => Some(Self::Integer),
            "number" => Some(Self::Number),
            "boolean" => Some(Self::Boolean),
            "null" => Some(Self::Null),
            _ => None,
        }
    }

    pub fn as_json_type(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Null => "null",
        }
    }
}

/// Semantic string formats
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StringFormat {
    Email,
    DateTime,
    Date,
    Time,
    Uri,
    Uuid,
    /// Unrecognized format, validated as a plain string
    Other(String),
}

impl StringFormat {
    pub fn from_keyword(s: &str) -> Self {
        match s {
            "email" => Self::Email,
            "date-time" => Self::DateTime,
            "date" => Self::Date,
            "time" => Self::Time,
            "uri" => Self::Uri,
            "uuid" => Self::Uuid,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_keyword(&self) -> &str {
        match self {
            Self::Email => "email",
            Self::DateTime => "date-time",
            Self::Date => "date",
            Self::Time => "time",
            Self::Uri => "uri",
            Self::Uuid => "uuid",
            Self::Other(s) => s,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

// =============================================================================
// Resolved Type
// =============================================================================

/// Handle to a model in a [`TypeRegistry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub(crate) usize);

impl TypeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// One member of a discriminated union
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedVariant {
    /// The discriminator's const value
    pub tag: Value,
    pub model: TypeId,
    /// `$ref` the member was declared through, if any
    pub pointer: Option<String>,
}

/// What a schema node resolves to
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedType {
    Any,
    Scalar(ScalarKind),
    Format(StringFormat),
    /// `const` (one value) or `enum` (value set)
    Literal {
        values: Vec<Value>,
        is_const: bool,
        /// Scalar `type` declared alongside the literal
        declared: Option<ScalarKind>,
    },
    Optional(Box<ResolvedType>),
    List(Box<ResolvedType>),
    Set(Box<ResolvedType>),
    /// Object without `properties`
    Map(Box<ResolvedType>),
    Model(TypeId),
    Ref {
        pointer: String,
        target: Box<ResolvedType>,
    },
    /// anyOf, tried in declared order
    Union(Vec<ResolvedType>),
    /// oneOf, dispatched on the discriminator field
    Tagged {
        discriminator: String,
        variants: Vec<TaggedVariant>,
    },
    /// Nested node carrying its own constraints
    Constrained {
        inner: Box<ResolvedType>,
        constraints: ConstraintSet,
    },
}

impl ResolvedType {
    /// Wrap in `Constrained` only when there is something to carry
    pub fn with_constraints(self, constraints: ConstraintSet) -> Self {
        if constraints.is_empty() {
            self
        } else {
            Self::Constrained {
                inner: Box::new(self),
                constraints,
            }
        }
    }

    /// Strip `Ref` and `Constrained` layers
    pub fn peel(&self) -> &ResolvedType {
        match self {
            Self::Ref { target, .. } => target.peel(),
            Self::Constrained { inner, .. } => inner.peel(),
            other => other,
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self.peel(), Self::List(_) | Self::Set(_))
    }

    /// Short human-readable name used in validation messages
    pub fn describe(&self, registry: &TypeRegistry) -> String {
        match self {
            Self::Any => "any".to_string(),
            Self::Scalar(kind) => kind.as_json_type().to_string(),
            Self::Format(format) => format!("string<{}>", format.as_keyword()),
            Self::Literal { values, .. } => {
                let parts: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                format!("literal[{}]", parts.join(", "))
            }
            Self::Optional(inner) => format!("optional<{}>", inner.describe(registry)),
            Self::List(inner) => format!("list<{}>", inner.describe(registry)),
            Self::Set(inner) => format!("set<{}>", inner.describe(registry)),
            Self::Map(inner) => format!("map<{}>", inner.describe(registry)),
            Self::Model(id) => registry.get(*id).name.clone(),
            Self::Ref { target, .. } => target.describe(registry),
            Self::Union(members) => members
                .iter()
                .map(|m| m.describe(registry))
                .collect::<Vec<_>>()
                .join(" | "),
            Self::Tagged { variants, .. } => variants
                .iter()
                .map(|v| registry.get(v.model).name.clone())
                .collect::<Vec<_>>()
                .join(" | "),
            Self::Constrained { inner, .. } => inner.describe(registry),
        }
    }
}

// =============================================================================
// Fields and Models
// =============================================================================

/// Default behavior of a field when absent from the input
#[derive(Debug, Clone, PartialEq)]
pub enum FieldDefault {
    /// Mandatory; no default
    Required,
    /// Optional with no declared default; absent means `null`
    Unset,
    Value(Value),
}

/// A field of a composite record
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub ty: ResolvedType,
    pub constraints: ConstraintSet,
    pub required: bool,
    pub default: FieldDefault,
    /// Non-standard keys from the property schema
    pub extensions: Map<String, Value>,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, ty: ResolvedType) -> Self {
        Self {
            name: name.into(),
            ty,
            constraints: ConstraintSet::default(),
            required: false,
            default: FieldDefault::Unset,
            extensions: Map::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self.default = FieldDefault::Required;
        self
    }

    pub fn description(&self) -> Option<&str> {
        self.constraints.description.as_deref()
    }
}

/// What to do with input keys not declared as fields
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ExtraFields {
    /// Dropped silently (no `additionalProperties`)
    #[default]
    Ignore,
    /// Kept on the output (`additionalProperties: true`)
    Allow,
    /// Kept once they match the schema given as `additionalProperties`
    Schema(ResolvedType),
    /// Rejected (`additionalProperties: false`)
    Forbid,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ModelKind {
    /// Placeholder while a recursive record is being built
    Pending,
    Record {
        fields: Vec<FieldDef>,
        /// `required` in declared order
        required: Vec<String>,
        extra: ExtraFields,
    },
    /// Single-value root model around a non-record type
    Wrapper {
        inner: ResolvedType,
        constraints: ConstraintSet,
    },
}

/// A named model in the registry
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDef {
    pub name: String,
    /// Whether `name` came from an explicit `title`
    pub titled: bool,
    pub description: Option<String>,
    pub kind: ModelKind,
    /// Record-level `default` and `examples`
    pub annotations: Map<String, Value>,
    pub extensions: Map<String, Value>,
}

impl ModelDef {
    pub fn fields(&self) -> &[FieldDef] {
        match &self.kind {
            ModelKind::Record { fields, .. } => fields,
            _ => &[],
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields().iter().find(|f| f.name == name)
    }

    pub fn is_record(&self) -> bool {
        matches!(self.kind, ModelKind::Record { .. })
    }
}

/// Base type whose fields are prepended to every generated record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BaseModel {
    pub name: String,
    pub fields: Vec<FieldDef>,
}

// =============================================================================
// Registry
// =============================================================================

/// Arena of models for one `create_model` call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeRegistry {
    models: Vec<ModelDef>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a placeholder that [`TypeRegistry::complete`] fills in later
    pub fn reserve(&mut self, name: impl Into<String>, titled: bool) -> TypeId {
        self.insert(ModelDef {
            name: name.into(),
            titled,
            description: None,
            kind: ModelKind::Pending,
            annotations: Map::new(),
            extensions: Map::new(),
        })
    }

    pub fn insert(&mut self, model: ModelDef) -> TypeId {
        self.models.push(model);
        TypeId(self.models.len() - 1)
    }

    pub fn complete(&mut self, id: TypeId, model: ModelDef) {
        self.models[id.0] = model;
    }

    pub fn get(&self, id: TypeId) -> &ModelDef {
        &self.models[id.0]
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TypeId, &ModelDef)> {
        self.models.iter().enumerate().map(|(i, m)| (TypeId(i), m))
    }

    /// Look a model up by name (first match)
    pub fn find(&self, name: &str) -> Option<TypeId> {
        self.iter().find(|(_, m)| m.name == name).map(|(id, _)| id)
    }
}

// =============================================================================
// Type Definition
// =============================================================================

/// The result of compiling a schema: a root model plus everything it uses
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDefinition {
    pub(crate) registry: TypeRegistry,
    pub(crate) root: TypeId,
    /// `$schema`, `$id`, `$comment`, `definitions`, `$defs` from the root,
    /// plus its `$ref` when the root model was reached through one
    pub(crate) document: Map<String, Value>,
}

impl TypeDefinition {
    pub fn root(&self) -> TypeId {
        self.root
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn model(&self) -> &ModelDef {
        self.registry.get(self.root)
    }

    pub fn name(&self) -> &str {
        &self.model().name
    }

    pub fn description(&self) -> Option<&str> {
        self.model().description.as_deref()
    }

    pub fn fields(&self) -> &[FieldDef] {
        self.model().fields()
    }

    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.model().field(name)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields().iter().map(|f| f.name.as_str()).collect()
    }

    pub fn extensions(&self) -> &Map<String, Value> {
        &self.model().extensions
    }

    /// True for single-value root models (arrays, scalars, unions)
    pub fn is_wrapper(&self) -> bool {
        matches!(self.model().kind, ModelKind::Wrapper { .. })
    }

    /// The wrapped type of a single-value root model
    pub fn wrapped(&self) -> Option<(&ResolvedType, &ConstraintSet)> {
        match &self.model().kind {
            ModelKind::Wrapper { inner, constraints } => Some((inner, constraints)),
            _ => None,
        }
    }

    /// Resolve a type's model handle, following `Ref` layers
    pub fn model_of(&self, ty: &ResolvedType) -> Option<&ModelDef> {
        match ty.peel() {
            ResolvedType::Model(id) => Some(self.registry.get(*id)),
            _ => None,
        }
    }
}

impl fmt::Display for TypeDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let model = self.model();
        match &model.kind {
            ModelKind::Record { fields, .. } => {
                write!(f, "{} {{", model.name)?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    let marker = if field.required { "" } else { "?" };
                    write!(f, " {}{}: {}", field.name, marker, field.ty.describe(&self.registry))?;
                }
                write!(f, " }}")
            }
            ModelKind::Wrapper { inner, .. } => {
                write!(f, "{}({})", model.name, inner.describe(&self.registry))
            }
            ModelKind::Pending => write!(f, "{}(<pending>)", model.name),
        }
    }
}
