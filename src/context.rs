//! Per-call build state
//!
//! Everything mutable during one `create_model` call lives here and is
//! threaded through the recursion by `&mut`, so independent calls share
//! nothing.

use serde_json::Value;
use std::collections::HashMap;

use crate::config::BuildOptions;
use crate::error::{Result, SchemaError};
use crate::model::{TypeId, TypeRegistry};

/// In-flight `$ref` strings for cycle detection
#[derive(Debug, Default, Clone)]
pub struct ReferenceStack {
    in_flight: Vec<String>,
}

impl ReferenceStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push `reference`, failing if it is already being resolved
    pub fn enter(&mut self, reference: &str) -> Result<()> {
        if self.contains(reference) {
            let chain = self
                .in_flight
                .iter()
                .map(String::as_str)
                .chain(std::iter::once(reference))
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(SchemaError::reference(format!(
                "Circular reference detected: {}",
                chain
            )));
        }
        self.in_flight.push(reference.to_string());
        Ok(())
    }

    pub fn exit(&mut self, reference: &str) {
        if let Some(pos) = self.in_flight.iter().rposition(|r| r == reference) {
            self.in_flight.remove(pos);
        }
    }

    pub fn contains(&self, reference: &str) -> bool {
        self.in_flight.iter().any(|r| r == reference)
    }

    pub fn depth(&self) -> usize {
        self.in_flight.len()
    }

    /// Run `f` with `reference` pushed; it is popped whether `f` succeeds or not
    pub fn scoped<T>(
        &mut self,
        reference: &str,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        self.guarded(reference, f)
    }
}

/// Owners of the in-flight reference stack
pub(crate) trait InFlight: Sized {
    fn stack(&mut self) -> &mut ReferenceStack;

    fn guarded<T>(&mut self, reference: &str, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.stack().enter(reference)?;
        let result = f(self);
        self.stack().exit(reference);
        result
    }
}

impl InFlight for ReferenceStack {
    fn stack(&mut self) -> &mut ReferenceStack {
        self
    }
}

impl InFlight for BuildContext<'_> {
    fn stack(&mut self) -> &mut ReferenceStack {
        &mut self.references
    }
}

/// Resolution context for one top-level build
#[derive(Debug)]
pub struct BuildContext<'a> {
    pub root: &'a Value,
    pub options: &'a BuildOptions,
    pub registry: TypeRegistry,
    pub references: ReferenceStack,
    /// Records already registered under their `$ref` pointer
    pub ref_models: HashMap<String, TypeId>,
    path: Vec<String>,
}

impl<'a> BuildContext<'a> {
    pub fn new(root: &'a Value, options: &'a BuildOptions) -> Self {
        Self {
            root,
            options,
            registry: TypeRegistry::new(),
            references: ReferenceStack::new(),
            ref_models: HashMap::new(),
            path: Vec::new(),
        }
    }

    /// JSON pointer of the node being built, for error messages
    pub fn pointer(&self) -> String {
        if self.path.is_empty() {
            return "#".to_string();
        }
        let segments: Vec<String> = self
            .path
            .iter()
            .map(|s| s.replace('~', "~0").replace('/', "~1"))
            .collect();
        format!("#/{}", segments.join("/"))
    }

    /// Run `f` with `segments` appended to the current path
    pub fn at<T>(
        &mut self,
        segments: &[&str],
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let depth = self.path.len();
        self.path.extend(segments.iter().map(|s| s.to_string()));
        let result = f(self);
        self.path.truncate(depth);
        result
    }

    /// Run `f` with the path replaced by `segments`, as when following a `$ref`
    pub fn relocated<T>(
        &mut self,
        segments: Vec<String>,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let saved = std::mem::replace(&mut self.path, segments);
        let result = f(self);
        self.path = saved;
        result
    }

    /// Build an error message suffixed with the current location
    pub fn located(&self, message: impl AsRef<str>) -> String {
        format!("{} at {}", message.as_ref(), self.pointer())
    }

    /// Run `build` with `reference` marked in flight
    pub fn with_reference<T>(
        &mut self,
        reference: &str,
        build: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        self.guarded(reference, build)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_reference_stack_detects_reentry() {
        let mut stack = ReferenceStack::new();
        stack.enter("#/definitions/a").unwrap();
        stack.enter("#/definitions/b").unwrap();

        let err = stack.enter("#/definitions/a").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Reference);
        assert!(err.message().starts_with("Circular reference detected"));
        assert!(err.message().contains("#/definitions/a -> #/definitions/b -> #/definitions/a"));
    }

    #[test]
    fn test_scoped_pops_on_failure() {
        let mut stack = ReferenceStack::new();
        let result: Result<()> = stack.scoped("#/x", |_| Err(SchemaError::schema("boom")));
        assert!(result.is_err());
        assert_eq!(stack.depth(), 0);

        // Sibling reuse is fine once the first use completed
        stack.scoped("#/x", |_| Ok(())).unwrap();
        stack.scoped("#/x", |_| Ok(())).unwrap();
    }

    #[test]
    fn test_with_reference_pops_on_failure() {
        let root = json!({});
        let options = BuildOptions::default();
        let mut ctx = BuildContext::new(&root, &options);

        let err = ctx
            .with_reference("#/a", |ctx| ctx.with_reference("#/a", |_| Ok(())))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Reference);
        assert_eq!(ctx.references.depth(), 0);
    }

    #[test]
    fn test_pointer_escapes_segments() {
        let root = json!({});
        let options = BuildOptions::default();
        let mut ctx = BuildContext::new(&root, &options);
        assert_eq!(ctx.pointer(), "#");

        let pointer = ctx
            .at(&["properties", "a/b"], |ctx| Ok(ctx.pointer()))
            .unwrap();
        assert_eq!(pointer, "#/properties/a~1b");
        assert_eq!(ctx.pointer(), "#");
    }
}
