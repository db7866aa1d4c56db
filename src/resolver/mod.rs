//! Node-level resolution: scalar/container types and `$ref` pointers

pub mod refs;
pub mod types;

pub use refs::{definition_name, parse_pointer, ReferenceResolver};
pub use types::{TypeResolver, ANY_TYPE};
