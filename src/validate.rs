//! Instance validation against a compiled [`TypeDefinition`]
//!
//! Walks a JSON value alongside its resolved type, collecting every violation
//! instead of stopping at the first one. Successful validation returns the
//! normalized value: defaults filled in, sets deduplicated, undeclared keys
//! dropped or kept per the record's extra-field policy.

use regex::Regex;
use serde_json::{Map, Number, Value};
use std::cmp::Ordering;
use std::fmt;
use std::sync::OnceLock;
use thiserror::Error;

use crate::constraints::{compare_numbers, ConstraintSet, Decimal};
use crate::model::{
    ExtraFields, FieldDefault, ModelKind, ResolvedType, ScalarKind, StringFormat, TypeDefinition,
    TypeId, TypeRegistry,
};

const EMAIL_PATTERN: &str = r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$";

static EMAIL_REGEX: OnceLock<Option<Regex>> = OnceLock::new();

// =============================================================================
// Results
// =============================================================================

/// One violated rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Dotted path into the input, e.g. `items[1].name`; empty at the root
    pub path: String,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "<root>: {}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Every violation found while validating one value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", render_issues(.model, .issues))]
pub struct ValidationErrors {
    pub model: String,
    pub issues: Vec<ValidationIssue>,
}

impl ValidationErrors {
    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    /// Issues reported at `path`
    pub fn at<'s>(&'s self, path: &'s str) -> impl Iterator<Item = &'s ValidationIssue> + 's {
        self.issues.iter().filter(move |i| i.path == path)
    }
}

fn render_issues(model: &str, issues: &[ValidationIssue]) -> String {
    let noun = if issues.len() == 1 { "error" } else { "errors" };
    let mut out = format!("{} validation {} for {}", issues.len(), noun, model);
    for issue in issues {
        out.push_str("\n  ");
        out.push_str(&issue.to_string());
    }
    out
}

/// A value accepted by a type definition
#[derive(Debug, Clone, PartialEq)]
pub struct Validated {
    /// The model the value was validated as; for a discriminated union this
    /// is the selected member
    pub type_name: String,
    pub value: Value,
}

impl Validated {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.value.get(field)
    }
}

// =============================================================================
// Entry points
// =============================================================================

impl TypeDefinition {
    /// Validate `value` against the root model
    pub fn validate(&self, value: &Value) -> Result<Validated, ValidationErrors> {
        let mut validator = Validator::new(&self.registry);
        let output = validator.check_model(self.root, value, "");
        match output {
            Some(value) if validator.issues.is_empty() => {
                let type_name = self.selected_name(&value).to_string();
                tracing::trace!(model = %type_name, "validated instance");
                Ok(Validated { type_name, value })
            }
            _ => Err(ValidationErrors {
                model: self.name().to_string(),
                issues: validator.issues,
            }),
        }
    }

    /// Construct an instance from field values
    pub fn instantiate(&self, fields: Map<String, Value>) -> Result<Validated, ValidationErrors> {
        self.validate(&Value::Object(fields))
    }

    fn selected_name(&self, value: &Value) -> &str {
        if let Some((inner, _)) = self.wrapped() {
            if let ResolvedType::Tagged {
                discriminator,
                variants,
            } = inner.peel()
            {
                let tag = value.get(discriminator);
                if let Some(variant) = variants.iter().find(|v| Some(&v.tag) == tag) {
                    return &self.registry.get(variant.model).name;
                }
            }
        }
        self.name()
    }
}

// =============================================================================
// Validator
// =============================================================================

struct Validator<'r> {
    registry: &'r TypeRegistry,
    issues: Vec<ValidationIssue>,
}

impl<'r> Validator<'r> {
    fn new(registry: &'r TypeRegistry) -> Self {
        Self {
            registry,
            issues: Vec::new(),
        }
    }

    fn fail(&mut self, path: &str, message: impl Into<String>) -> Option<Value> {
        self.issues.push(ValidationIssue {
            path: path.to_string(),
            message: message.into(),
        });
        None
    }

    fn check_model(&mut self, id: TypeId, value: &Value, path: &str) -> Option<Value> {
        let registry = self.registry;
        let model = registry.get(id);
        match &model.kind {
            ModelKind::Record {
                fields, extra, ..
            } => {
                let input = match value.as_object() {
                    Some(obj) => obj,
                    None => {
                        return self.fail(
                            path,
                            format!("Input should be a valid object for {}", model.name),
                        )
                    }
                };

                let before = self.issues.len();
                let mut out = Map::new();
                for field in fields {
                    let field_path = join_key(path, &field.name);
                    let checked = match input.get(&field.name) {
                        None => match &field.default {
                            FieldDefault::Value(default) => Some(default.clone()),
                            FieldDefault::Unset => Some(Value::Null),
                            FieldDefault::Required => self.fail(&field_path, "Field required"),
                        },
                        Some(given) => self
                            .check(&field.ty, given, &field_path)
                            .and_then(|v| self.check_constraints(&field.constraints, v, &field_path)),
                    };
                    if let Some(v) = checked {
                        out.insert(field.name.clone(), v);
                    }
                }

                for (key, given) in input {
                    if fields.iter().any(|f| &f.name == key) {
                        continue;
                    }
                    match extra {
                        ExtraFields::Forbid => {
                            self.fail(&join_key(path, key), "Extra inputs are not permitted");
                        }
                        ExtraFields::Allow => {
                            out.insert(key.clone(), given.clone());
                        }
                        ExtraFields::Schema(ty) => {
                            if let Some(v) = self.check(ty, given, &join_key(path, key)) {
                                out.insert(key.clone(), v);
                            }
                        }
                        ExtraFields::Ignore => {}
                    }
                }

                (self.issues.len() == before).then_some(Value::Object(out))
            }
            ModelKind::Wrapper { inner, constraints } => self
                .check(inner, value, path)
                .and_then(|v| self.check_constraints(constraints, v, path)),
            ModelKind::Pending => self.fail(path, format!("Model {} was never completed", model.name)),
        }
    }

    fn check(&mut self, ty: &ResolvedType, value: &Value, path: &str) -> Option<Value> {
        match ty {
            ResolvedType::Any => Some(value.clone()),
            ResolvedType::Scalar(kind) => self.check_scalar(*kind, value, path),
            ResolvedType::Format(format) => self.check_format(format, value, path),
            ResolvedType::Literal { values, .. } => {
                if values.contains(value) {
                    Some(value.clone())
                } else {
                    let expected: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                    self.fail(path, format!("Input should be {}", expected.join(" or ")))
                }
            }
            ResolvedType::Optional(inner) => match value {
                Value::Null => Some(Value::Null),
                other => self.check(inner, other, path),
            },
            ResolvedType::List(inner) => {
                let items = self.expect_array(value, path)?;
                self.check_items(inner, items, path).map(Value::Array)
            }
            ResolvedType::Set(inner) => {
                let items = self.expect_array(value, path)?;
                let checked = self.check_items(inner, items, path)?;
                let mut unique: Vec<Value> = Vec::with_capacity(checked.len());
                for item in checked {
                    if !unique.contains(&item) {
                        unique.push(item);
                    }
                }
                Some(Value::Array(unique))
            }
            ResolvedType::Map(inner) => {
                let obj = match value.as_object() {
                    Some(obj) => obj,
                    None => return self.fail(path, "Input should be a valid dictionary"),
                };
                let before = self.issues.len();
                let mut out = Map::new();
                for (key, item) in obj {
                    if let Some(v) = self.check(inner, item, &join_key(path, key)) {
                        out.insert(key.clone(), v);
                    }
                }
                (self.issues.len() == before).then_some(Value::Object(out))
            }
            ResolvedType::Model(id) => self.check_model(*id, value, path),
            ResolvedType::Ref { target, .. } => self.check(target, value, path),
            ResolvedType::Union(members) => {
                for member in members {
                    let mut trial = Validator::new(self.registry);
                    if let Some(v) = trial.check(member, value, path) {
                        if trial.issues.is_empty() {
                            return Some(v);
                        }
                    }
                }
                let tried: Vec<String> = members.iter().map(|m| m.describe(self.registry)).collect();
                self.fail(path, format!("Input does not match any of: {}", tried.join(", ")))
            }
            ResolvedType::Tagged {
                discriminator,
                variants,
            } => {
                let tag = match value.as_object() {
                    Some(obj) => obj.get(discriminator),
                    None => return self.fail(path, "Input should be a valid object"),
                };
                let tag = match tag {
                    Some(tag) => tag,
                    None => {
                        return self.fail(
                            path,
                            format!(
                                "Unable to extract tag using discriminator '{}'",
                                discriminator
                            ),
                        )
                    }
                };
                match variants.iter().find(|v| &v.tag == tag) {
                    Some(variant) => self.check_model(variant.model, value, path),
                    None => {
                        let expected: Vec<String> = variants.iter().map(|v| v.tag.to_string()).collect();
                        self.fail(
                            &join_key(path, discriminator),
                            format!(
                                "Input tag {} found using '{}' does not match any of the expected tags: {}",
                                tag,
                                discriminator,
                                expected.join(", ")
                            ),
                        )
                    }
                }
            }
            ResolvedType::Constrained { inner, constraints } => self
                .check(inner, value, path)
                .and_then(|v| self.check_constraints(constraints, v, path)),
        }
    }

    fn expect_array<'v>(&mut self, value: &'v Value, path: &str) -> Option<&'v Vec<Value>> {
        match value.as_array() {
            Some(items) => Some(items),
            None => {
                self.fail(path, "Input should be a valid list");
                None
            }
        }
    }

    fn check_items(&mut self, inner: &ResolvedType, items: &[Value], path: &str) -> Option<Vec<Value>> {
        let before = self.issues.len();
        let checked: Vec<Value> = items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| self.check(inner, item, &format!("{}[{}]", path, i)))
            .collect();
        (self.issues.len() == before).then_some(checked)
    }

    fn check_scalar(&mut self, kind: ScalarKind, value: &Value, path: &str) -> Option<Value> {
        match (kind, value) {
            (ScalarKind::String, Value::String(_))
            | (ScalarKind::Boolean, Value::Bool(_))
            | (ScalarKind::Null, Value::Null)
            | (ScalarKind::Number, Value::Number(_)) => Some(value.clone()),
            (ScalarKind::Integer, Value::Number(n)) => {
                if n.is_i64() || n.is_u64() {
                    return Some(value.clone());
                }
                match n.as_f64() {
                    Some(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                        Some(Value::from(f as i64))
                    }
                    _ => self.fail(path, "Input should be a valid integer"),
                }
            }
            (ScalarKind::String, _) => self.fail(path, "Input should be a valid string"),
            (ScalarKind::Integer, _) => self.fail(path, "Input should be a valid integer"),
            (ScalarKind::Number, _) => self.fail(path, "Input should be a valid number"),
            (ScalarKind::Boolean, _) => self.fail(path, "Input should be a valid boolean"),
            (ScalarKind::Null, _) => self.fail(path, "Input should be null"),
        }
    }

    fn check_format(&mut self, format: &StringFormat, value: &Value, path: &str) -> Option<Value> {
        let s = match value.as_str() {
            Some(s) => s,
            None => return self.fail(path, "Input should be a valid string"),
        };
        let valid = match format {
            StringFormat::Email => EMAIL_REGEX
                .get_or_init(|| Regex::new(EMAIL_PATTERN).ok())
                .as_ref()
                .map_or(false, |re| re.is_match(s)),
            StringFormat::DateTime => chrono::DateTime::parse_from_rfc3339(s).is_ok(),
            StringFormat::Date => chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok(),
            StringFormat::Time => {
                let t = s.trim_end_matches('Z');
                chrono::NaiveTime::parse_from_str(t, "%H:%M:%S%.f").is_ok()
                    || chrono::NaiveTime::parse_from_str(t, "%H:%M:%S%.f%:z").is_ok()
            }
            StringFormat::Uri => url::Url::parse(s).is_ok(),
            StringFormat::Uuid => uuid::Uuid::parse_str(s).is_ok(),
            StringFormat::Other(_) => true,
        };
        if valid {
            Some(value.clone())
        } else {
            self.fail(path, format!("Input should be a valid {}", format.as_keyword()))
        }
    }

    fn check_constraints(
        &mut self,
        constraints: &ConstraintSet,
        value: Value,
        path: &str,
    ) -> Option<Value> {
        if !constraints.has_rules() {
            return Some(value);
        }
        let before = self.issues.len();

        let (length, unit) = match &value {
            Value::String(s) => (Some(s.chars().count() as u64), "String should have"),
            Value::Array(items) => (Some(items.len() as u64), "List should have"),
            _ => (None, ""),
        };
        let noun = if matches!(value, Value::String(_)) { "character" } else { "item" };
        if let Some(len) = length {
            if let Some(min) = constraints.min_length.filter(|min| len < *min) {
                self.fail(path, format!("{} at least {} {}{}", unit, min, noun, plural(min)));
            }
            if let Some(max) = constraints.max_length.filter(|max| len > *max) {
                self.fail(path, format!("{} at most {} {}{}", unit, max, noun, plural(max)));
            }
        }

        if let Value::String(s) = &value {
            for pattern in &constraints.patterns {
                if !pattern.is_match(s) {
                    self.fail(path, format!("String should match pattern '{}'", pattern.as_str()));
                }
            }
        }

        if let Value::Number(n) = &value {
            let bounds: [(&Option<Number>, &[Ordering], &str); 4] = [
                (&constraints.ge, &[Ordering::Greater, Ordering::Equal][..], "greater than or equal to"),
                (&constraints.gt, &[Ordering::Greater][..], "greater than"),
                (&constraints.le, &[Ordering::Less, Ordering::Equal][..], "less than or equal to"),
                (&constraints.lt, &[Ordering::Less][..], "less than"),
            ];
            for (bound, allowed, phrase) in bounds {
                if let Some(bound) = bound {
                    if !allowed.contains(&compare_numbers(n, bound)) {
                        self.fail(path, format!("Input should be {} {}", phrase, bound));
                    }
                }
            }
            for step in &constraints.multiple_of {
                if !is_multiple_of(n, step) {
                    self.fail(path, format!("Input should be a multiple of {}", step));
                }
            }
        }

        (self.issues.len() == before).then_some(value)
    }
}

fn plural(n: u64) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

fn join_key(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path, key)
    }
}

fn is_multiple_of(value: &Number, step: &Number) -> bool {
    if let (Some(v), Some(s)) = (value.as_i64(), step.as_i64()) {
        return s != 0 && v % s == 0;
    }
    let exact = Decimal::from_number(value)
        .zip(Decimal::from_number(step))
        .and_then(|(v, s)| v.is_multiple_of(s));
    if let Some(exact) = exact {
        return exact;
    }
    match (value.as_f64(), step.as_f64()) {
        (Some(v), Some(s)) if s != 0.0 => {
            let quotient = v / s;
            (quotient - quotient.round()).abs() <= 1e-9 * quotient.abs().max(1.0)
        }
        _ => false,
    }
}
