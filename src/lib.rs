//! Familiar Models
//!
//! Compiles JSON Schema documents into runtime-checked type definitions: named
//! records with typed, constrained fields that validate instances and
//! regenerate the schema they came from.
//!
//! ## Features
//!
//! - **Type Resolution**: scalars, formats, literals, nullable type lists,
//!   arrays, sets and maps
//! - **Constraints**: length, range, `multipleOf`, patterns, uniqueness
//! - **References**: local JSON pointers, recursive records, cycle detection
//! - **Combiners**: `allOf` merge, `anyOf` unions, discriminated `oneOf`
//! - **Round-trip**: regenerate an equivalent schema from a compiled model
//!
//! ## Architecture
//!
//! ```text
//! schema ──► ModelBuilder ──┬─► TypeResolver ──────► ResolvedType
//!                           ├─► ConstraintBuilder ─► ConstraintSet
//!                           ├─► ReferenceResolver ─► Model handle / inline type
//!                           └─► CombinerHandler ───► merged record / union
//!                                        │
//!                                        ▼
//!                                  TypeDefinition ──► validate / to_schema
//! ```
//!
//! ```
//! use familiar_models::create_model;
//! use serde_json::json;
//!
//! let user = create_model(&json!({
//!     "type": "object",
//!     "properties": {"name": {"type": "string"}, "age": {"type": "integer"}},
//!     "required": ["name"]
//! }))?;
//!
//! assert!(user.validate(&json!({"name": "Ada"})).is_ok());
//! assert!(user.validate(&json!({"age": 36})).is_err());
//! # Ok::<(), familiar_models::SchemaError>(())
//! ```

pub mod builder;
pub mod combiner;
pub mod config;
pub mod constraints;
pub mod context;
pub mod emit;
pub mod error;
pub mod graph;
pub mod lint;
pub mod model;
pub mod resolver;
pub mod validate;
pub mod vocabulary;

pub use builder::{create_model, create_model_with, ModelBuilder, SchemaCompiler};
pub use combiner::CombinerHandler;
pub use config::{BuildOptions, LintConfig, ModelsConfig};
pub use constraints::{ConstraintBuilder, ConstraintSet};
pub use context::BuildContext;
pub use emit::regenerate_schema;
pub use error::{ErrorKind, Result, SchemaError};
pub use graph::RefGraph;
pub use lint::{lint_schema, LintResult, SchemaLinter};
pub use model::{
    BaseModel, FieldDef, FieldDefault, ModelDef, ModelKind, ResolvedType, TypeDefinition, TypeId,
};
pub use resolver::{ReferenceResolver, TypeResolver};
pub use validate::{Validated, ValidationErrors, ValidationIssue};
