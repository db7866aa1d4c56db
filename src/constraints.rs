//! Constraint extraction and intersection
//!
//! A [`ConstraintSet`] is the declarative bundle of rules attached to a field
//! (or to a nested node such as array items). Building is pure extraction;
//! merging implements allOf intersection: the more restrictive bound wins per
//! kind and patterns accumulate so every one of them must match.

use regex::Regex;
use serde_json::{Map, Number, Value};
use std::cmp::Ordering;
use std::fmt;

use crate::error::{Result, SchemaError};

/// Keywords owned by [`ConstraintSet`]
pub const CONSTRAINT_KEYWORDS: &[&str] = &[
    "minLength",
    "maxLength",
    "minItems",
    "maxItems",
    "minimum",
    "maximum",
    "exclusiveMinimum",
    "exclusiveMaximum",
    "multipleOf",
    "pattern",
    "uniqueItems",
    "default",
    "examples",
    "description",
    "title",
];

// =============================================================================
// Pattern
// =============================================================================

/// A compiled `pattern` keyword
#[derive(Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    pub fn new(source: &str) -> std::result::Result<Self, regex::Error> {
        Ok(Self {
            source: source.to_string(),
            regex: Regex::new(source)?,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// JSON Schema search semantics (unanchored)
    pub fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pattern({:?})", self.source)
    }
}

// =============================================================================
// Constraint Set
// =============================================================================

/// Declarative validation rules for one node.
///
/// `min_length`/`max_length` hold string lengths for scalars and item counts
/// for containers, mirroring how `minItems`/`maxItems` fold into them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstraintSet {
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    /// Inclusive lower bound (`minimum`)
    pub ge: Option<Number>,
    /// Exclusive lower bound (`exclusiveMinimum`)
    pub gt: Option<Number>,
    /// Inclusive upper bound (`maximum`)
    pub le: Option<Number>,
    /// Exclusive upper bound (`exclusiveMaximum`)
    pub lt: Option<Number>,
    /// Every step must divide the value; one entry unless two steps have no
    /// exact common multiple
    pub multiple_of: Vec<Number>,
    /// All patterns must match
    pub patterns: Vec<Pattern>,
    pub unique_items: Option<bool>,
    pub default: Option<Value>,
    pub description: Option<String>,
    pub title: Option<String>,
    pub examples: Option<Value>,
}

impl ConstraintSet {
    /// True when no validation rule is present (metadata ignored)
    pub fn has_rules(&self) -> bool {
        self.min_length.is_some()
            || self.max_length.is_some()
            || self.ge.is_some()
            || self.gt.is_some()
            || self.le.is_some()
            || self.lt.is_some()
            || !self.multiple_of.is_empty()
            || !self.patterns.is_empty()
            || self.unique_items.is_some()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_rules()
            && self.default.is_none()
            && self.description.is_none()
            && self.title.is_none()
            && self.examples.is_none()
    }

    /// All patterns folded into one expression: `(?=p1)(?=p2)`.
    ///
    /// A single pattern is returned unchanged. The lookahead form is for
    /// export only; validation checks each pattern on its own.
    pub fn combined_pattern(&self) -> Option<String> {
        match self.patterns.as_slice() {
            [] => None,
            [only] => Some(only.as_str().to_string()),
            many => Some(
                many.iter()
                    .map(|p| format!("(?={})", p.as_str()))
                    .collect::<String>(),
            ),
        }
    }

    /// Render back into JSON Schema keywords.
    ///
    /// `container` selects `minItems`/`maxItems` over `minLength`/`maxLength`.
    pub fn to_keywords(&self, container: bool) -> Map<String, Value> {
        let mut out = Map::new();
        if let Some(title) = &self.title {
            out.insert("title".into(), Value::String(title.clone()));
        }
        if let Some(description) = &self.description {
            out.insert("description".into(), Value::String(description.clone()));
        }
        let (min_key, max_key) = if container {
            ("minItems", "maxItems")
        } else {
            ("minLength", "maxLength")
        };
        if let Some(n) = self.min_length {
            out.insert(min_key.into(), Value::from(n));
        }
        if let Some(n) = self.max_length {
            out.insert(max_key.into(), Value::from(n));
        }
        for (key, bound) in [
            ("minimum", &self.ge),
            ("exclusiveMinimum", &self.gt),
            ("maximum", &self.le),
            ("exclusiveMaximum", &self.lt),
        ] {
            if let Some(n) = bound {
                out.insert(key.into(), Value::Number(n.clone()));
            }
        }
        if let Some((step, rest)) = self.multiple_of.split_first() {
            out.insert("multipleOf".into(), Value::Number(step.clone()));
            if !rest.is_empty() {
                let fragments = rest
                    .iter()
                    .map(|n| {
                        let mut fragment = Map::new();
                        fragment.insert("multipleOf".into(), Value::Number(n.clone()));
                        Value::Object(fragment)
                    })
                    .collect();
                out.insert("allOf".into(), Value::Array(fragments));
            }
        }
        if let Some(pattern) = self.combined_pattern() {
            out.insert("pattern".into(), Value::String(pattern));
        }
        if let Some(unique) = self.unique_items {
            out.insert("uniqueItems".into(), Value::Bool(unique));
        }
        if let Some(default) = &self.default {
            out.insert("default".into(), default.clone());
        }
        if let Some(examples) = &self.examples {
            out.insert("examples".into(), examples.clone());
        }
        out
    }
}

// =============================================================================
// Constraint Builder
// =============================================================================

/// Extracts and merges constraint sets
#[derive(Debug, Default, Clone, Copy)]
pub struct ConstraintBuilder;

impl ConstraintBuilder {
    /// Copy the constraint keywords present on `node`.
    ///
    /// Keys with the wrong JSON type and patterns that do not compile are
    /// schema errors.
    pub fn build_constraints(node: &Value) -> Result<ConstraintSet> {
        let mut set = ConstraintSet::default();
        let obj = match node.as_object() {
            Some(obj) => obj,
            None => return Ok(set),
        };

        set.min_length = count(obj, "minLength")?;
        set.max_length = count(obj, "maxLength")?;
        if let Some(n) = count(obj, "minItems")? {
            set.min_length = Some(n);
        }
        if let Some(n) = count(obj, "maxItems")? {
            set.max_length = Some(n);
        }

        set.ge = number(obj, "minimum")?;
        set.le = number(obj, "maximum")?;
        set.gt = number(obj, "exclusiveMinimum")?;
        set.lt = number(obj, "exclusiveMaximum")?;
        if let Some(m) = number(obj, "multipleOf")? {
            if m.as_f64().map_or(true, |v| v <= 0.0) {
                return Err(SchemaError::schema(format!(
                    "multipleOf must be greater than 0, got {}",
                    m
                )));
            }
            set.multiple_of.push(m);
        }

        if let Some(pattern) = obj.get("pattern") {
            let source = pattern
                .as_str()
                .ok_or_else(|| SchemaError::schema("pattern must be a string"))?;
            let parts = split_lookaheads(source).unwrap_or_else(|| vec![source.to_string()]);
            for part in parts {
                let compiled = Pattern::new(&part).map_err(|e| {
                    SchemaError::schema(format!("pattern '{}' does not compile: {}", part, e))
                })?;
                if !set.patterns.contains(&compiled) {
                    set.patterns.push(compiled);
                }
            }
        }

        if let Some(unique) = obj.get("uniqueItems") {
            set.unique_items = Some(
                unique
                    .as_bool()
                    .ok_or_else(|| SchemaError::schema("uniqueItems must be a boolean"))?,
            );
        }

        set.default = obj.get("default").cloned();
        set.examples = obj.get("examples").cloned();
        set.description = text(obj, "description")?;
        set.title = text(obj, "title")?;

        if let Some(fragments) = constraint_fragments(obj) {
            for fragment in fragments {
                let extra = Self::build_constraints(fragment)?;
                set = Self::merge_constraints(&set, &extra);
            }
        }
        Ok(set)
    }

    /// Intersect two constraint sets; `b` wins for metadata.
    pub fn merge_constraints(a: &ConstraintSet, b: &ConstraintSet) -> ConstraintSet {
        let mut patterns = a.patterns.clone();
        for p in &b.patterns {
            if !patterns.contains(p) {
                patterns.push(p.clone());
            }
        }

        ConstraintSet {
            min_length: pick(a.min_length, b.min_length, u64::max),
            max_length: pick(a.max_length, b.max_length, u64::min),
            ge: pick_number(&a.ge, &b.ge, Ordering::Greater),
            gt: pick_number(&a.gt, &b.gt, Ordering::Greater),
            le: pick_number(&a.le, &b.le, Ordering::Less),
            lt: pick_number(&a.lt, &b.lt, Ordering::Less),
            multiple_of: merge_multiple_of(&a.multiple_of, &b.multiple_of),
            patterns,
            unique_items: match (a.unique_items, b.unique_items) {
                (None, None) => None,
                (x, y) => Some(x.unwrap_or(false) || y.unwrap_or(false)),
            },
            default: b.default.clone().or_else(|| a.default.clone()),
            description: b.description.clone().or_else(|| a.description.clone()),
            title: b.title.clone().or_else(|| a.title.clone()),
            examples: b.examples.clone().or_else(|| a.examples.clone()),
        }
    }
}

/// `allOf` members that only carry constraint keywords.
///
/// They tighten their sibling type instead of forming an intersection of
/// their own; this is how steps with no exact common multiple are written.
pub(crate) fn constraint_fragments(obj: &Map<String, Value>) -> Option<&[Value]> {
    let members = obj.get("allOf")?.as_array()?;
    let only_constraints = !members.is_empty()
        && members.iter().all(|m| {
            m.as_object().map_or(false, |o| {
                o.keys().all(|k| CONSTRAINT_KEYWORDS.contains(&k.as_str()))
            })
        });
    only_constraints.then_some(members.as_slice())
}

/// Split `(?=a)(?=b)` into `["a", "b"]`.
///
/// Returns `None` unless the whole source is two or more top-level
/// lookaheads. The regex engine has no lookaround, so conjunctions are
/// checked one pattern at a time.
pub(crate) fn split_lookaheads(source: &str) -> Option<Vec<String>> {
    let chars: Vec<char> = source.chars().collect();
    let mut parts = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        if chars.get(i..i + 3) != Some(&['(', '?', '='][..]) {
            return None;
        }
        let start = i + 3;
        let mut depth = 1;
        let mut in_class = false;
        let mut j = start;
        while j < chars.len() {
            match chars[j] {
                '\\' => {
                    j += 2;
                    continue;
                }
                '[' if !in_class => in_class = true,
                ']' if in_class => in_class = false,
                '(' if !in_class => depth += 1,
                ')' if !in_class => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                }
                _ => {}
            }
            j += 1;
        }
        if j >= chars.len() {
            return None;
        }
        parts.push(chars[start..j].iter().collect());
        i = j + 1;
    }
    (parts.len() >= 2).then_some(parts)
}

/// Compare two JSON numbers numerically
pub(crate) fn compare_numbers(a: &Number, b: &Number) -> Ordering {
    match (a.as_i64(), b.as_i64()) {
        (Some(x), Some(y)) => x.cmp(&y),
        _ => {
            let x = a.as_f64().unwrap_or(f64::NAN);
            let y = b.as_f64().unwrap_or(f64::NAN);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
    }
}

fn pick<T: Copy>(a: Option<T>, b: Option<T>, choose: fn(T, T) -> T) -> Option<T> {
    match (a, b) {
        (Some(x), Some(y)) => Some(choose(x, y)),
        (x, y) => x.or(y),
    }
}

/// Keep whichever bound compares as `prefer` against the other
fn pick_number(a: &Option<Number>, b: &Option<Number>, prefer: Ordering) -> Option<Number> {
    match (a, b) {
        (Some(x), Some(y)) => {
            if compare_numbers(y, x) == prefer {
                Some(y.clone())
            } else {
                Some(x.clone())
            }
        }
        (x, y) => x.clone().or_else(|| y.clone()),
    }
}

/// Fold `b`'s steps into `a`'s, replacing a pair by its least common
/// multiple when that is exactly representable
fn merge_multiple_of(a: &[Number], b: &[Number]) -> Vec<Number> {
    let mut steps = a.to_vec();
    for step in b {
        if steps.contains(step) {
            continue;
        }
        let combined = steps
            .iter()
            .enumerate()
            .find_map(|(i, current)| common_multiple(current, step).map(|n| (i, n)));
        match combined {
            Some((i, n)) => steps[i] = n,
            None => steps.push(step.clone()),
        }
    }
    steps
}

fn common_multiple(a: &Number, b: &Number) -> Option<Number> {
    Decimal::from_number(a)?
        .lcm(Decimal::from_number(b)?)?
        .to_number()
}

/// The magnitude of a JSON number as `digits / 10^scale`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Decimal {
    digits: u128,
    scale: u32,
}

impl Decimal {
    /// Exact reading of `n`'s shortest decimal form; `None` past `u128`
    pub(crate) fn from_number(n: &Number) -> Option<Self> {
        if let Some(u) = n.as_u64() {
            return Some(Self {
                digits: u128::from(u),
                scale: 0,
            });
        }
        let text = n.to_string();
        let (mantissa, exponent) = match text.split_once(|c: char| c == 'e' || c == 'E') {
            Some((m, e)) => (m, e.parse::<i32>().ok()?),
            None => (text.as_str(), 0),
        };
        let mantissa = mantissa.trim_start_matches('-');
        let (int, frac) = mantissa.split_once('.').unwrap_or((mantissa, ""));
        let digits: u128 = format!("{}{}", int, frac).parse().ok()?;
        let scale = i32::try_from(frac.len()).ok()?.checked_sub(exponent)?;
        match u32::try_from(scale) {
            Ok(scale) => Some(Self { digits, scale }.normalized()),
            Err(_) => {
                let factor = 10u128.checked_pow(scale.unsigned_abs())?;
                Some(Self {
                    digits: digits.checked_mul(factor)?,
                    scale: 0,
                })
            }
        }
    }

    fn normalized(mut self) -> Self {
        while self.scale > 0 && self.digits % 10 == 0 {
            self.digits /= 10;
            self.scale -= 1;
        }
        self
    }

    /// Digits at a finer `scale`
    fn rescale(self, scale: u32) -> Option<u128> {
        let factor = 10u128.checked_pow(scale.checked_sub(self.scale)?)?;
        self.digits.checked_mul(factor)
    }

    fn lcm(self, other: Self) -> Option<Self> {
        let scale = self.scale.max(other.scale);
        let (a, b) = (self.rescale(scale)?, other.rescale(scale)?);
        if a == 0 || b == 0 {
            return None;
        }
        let digits = (a / gcd(a, b)).checked_mul(b)?;
        Some(Self { digits, scale }.normalized())
    }

    /// `None` when the two cannot be brought to one scale
    pub(crate) fn is_multiple_of(self, step: Self) -> Option<bool> {
        let scale = self.scale.max(step.scale);
        let (value, step) = (self.rescale(scale)?, step.rescale(scale)?);
        Some(step != 0 && value % step == 0)
    }

    /// Back to a JSON number, if it reads back as the same decimal
    fn to_number(self) -> Option<Number> {
        if self.scale == 0 {
            return u64::try_from(self.digits).ok().map(Number::from);
        }
        let scale = usize::try_from(self.scale).ok()?;
        let padded = format!("{:0>width$}", self.digits, width = scale + 1);
        let (int, frac) = padded.split_at(padded.len() - scale);
        let value: f64 = format!("{}.{}", int, frac).parse().ok()?;
        let n = Number::from_f64(value)?;
        (Self::from_number(&n)? == self).then_some(n)
    }
}

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

fn count(obj: &Map<String, Value>, key: &str) -> Result<Option<u64>> {
    match obj.get(key) {
        None => Ok(None),
        Some(v) => v
            .as_u64()
            .map(Some)
            .ok_or_else(|| SchemaError::schema(format!("{} must be a non-negative integer", key))),
    }
}

fn number(obj: &Map<String, Value>, key: &str) -> Result<Option<Number>> {
    match obj.get(key) {
        None => Ok(None),
        Some(Value::Number(n)) => Ok(Some(n.clone())),
        Some(_) => Err(SchemaError::schema(format!("{} must be a number", key))),
    }
}

fn text(obj: &Map<String, Value>, key: &str) -> Result<Option<String>> {
    match obj.get(key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(SchemaError::schema(format!("{} must be a string", key))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_build_string_constraints() {
        let set = ConstraintBuilder::build_constraints(&json!({
            "type": "string",
            "minLength": 3,
            "maxLength": 10,
            "pattern": "^[a-z]+$",
            "description": "A slug"
        }))
        .unwrap();

        assert_eq!(set.min_length, Some(3));
        assert_eq!(set.max_length, Some(10));
        assert_eq!(set.combined_pattern().as_deref(), Some("^[a-z]+$"));
        assert_eq!(set.description.as_deref(), Some("A slug"));
    }

    #[test]
    fn test_build_numeric_constraints() {
        let set = ConstraintBuilder::build_constraints(&json!({
            "type": "number",
            "minimum": 0,
            "exclusiveMaximum": 100.5,
            "multipleOf": 0.5
        }))
        .unwrap();

        assert_eq!(set.ge, Some(Number::from(0)));
        assert_eq!(set.lt.as_ref().and_then(|n| n.as_f64()), Some(100.5));
        assert_eq!(set.multiple_of.first().and_then(|n| n.as_f64()), Some(0.5));
        assert!(set.le.is_none());
    }

    #[test]
    fn test_item_counts_fold_into_lengths() {
        let set = ConstraintBuilder::build_constraints(&json!({
            "type": "array",
            "minItems": 1,
            "maxItems": 4,
            "uniqueItems": true
        }))
        .unwrap();

        assert_eq!(set.min_length, Some(1));
        assert_eq!(set.max_length, Some(4));
        assert_eq!(set.unique_items, Some(true));

        let keywords = set.to_keywords(true);
        assert_eq!(keywords.get("minItems"), Some(&json!(1)));
        assert!(keywords.get("minLength").is_none());
    }

    #[test]
    fn test_invalid_constraint_values() {
        let err = ConstraintBuilder::build_constraints(&json!({"multipleOf": 0})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Schema);

        let err = ConstraintBuilder::build_constraints(&json!({"minLength": "3"})).unwrap_err();
        assert!(err.message().contains("minLength"));

        let err = ConstraintBuilder::build_constraints(&json!({"pattern": "(unclosed"})).unwrap_err();
        assert!(err.message().contains("does not compile"));
    }

    #[test]
    fn test_merge_takes_most_restrictive_bounds() {
        let a = ConstraintBuilder::build_constraints(&json!({"minimum": 10, "maximum": 70})).unwrap();
        let b = ConstraintBuilder::build_constraints(&json!({"minimum": 30, "maximum": 90})).unwrap();

        let merged = ConstraintBuilder::merge_constraints(&a, &b);
        assert_eq!(merged.ge, Some(Number::from(30)));
        assert_eq!(merged.le, Some(Number::from(70)));

        let a = ConstraintBuilder::build_constraints(&json!({"minLength": 2, "maxLength": 20})).unwrap();
        let b = ConstraintBuilder::build_constraints(&json!({"minLength": 5})).unwrap();
        let merged = ConstraintBuilder::merge_constraints(&a, &b);
        assert_eq!(merged.min_length, Some(5));
        assert_eq!(merged.max_length, Some(20));
    }

    #[test]
    fn test_merge_monotonic_over_grid() {
        let values = [-5i64, 0, 3, 12];
        for a in values {
            for b in values {
                for c in values {
                    for d in values {
                        let x = ConstraintBuilder::build_constraints(&json!({"minimum": a, "maximum": b})).unwrap();
                        let y = ConstraintBuilder::build_constraints(&json!({"minimum": c, "maximum": d})).unwrap();
                        let merged = ConstraintBuilder::merge_constraints(&x, &y);
                        assert_eq!(merged.ge, Some(Number::from(a.max(c))));
                        assert_eq!(merged.le, Some(Number::from(b.min(d))));
                    }
                }
            }
        }
    }

    #[test]
    fn test_merge_combines_patterns_with_lookahead() {
        let a = ConstraintBuilder::build_constraints(&json!({"pattern": "^[A-Z]"})).unwrap();
        let b = ConstraintBuilder::build_constraints(&json!({"pattern": "[0-9]$"})).unwrap();

        let merged = ConstraintBuilder::merge_constraints(&a, &b);
        assert_eq!(merged.patterns.len(), 2);
        let combined = merged.combined_pattern().unwrap();
        assert!(combined.contains("(?=^[A-Z])(?=[0-9]$)"));
    }

    #[test]
    fn test_lookahead_conjunction_is_split() {
        assert_eq!(
            split_lookaheads("(?=^[A-Z])(?=[0-9]$)"),
            Some(vec!["^[A-Z]".to_string(), "[0-9]$".to_string()])
        );
        assert_eq!(
            split_lookaheads(r"(?=.*\))(?=[()]+)"),
            Some(vec![r".*\)".to_string(), "[()]+".to_string()])
        );
        assert_eq!(split_lookaheads("(?=abc)"), None);
        assert_eq!(split_lookaheads("^(?=a)b"), None);

        let set = ConstraintBuilder::build_constraints(&json!({"pattern": "(?=^[A-Z])(?=[0-9]$)"})).unwrap();
        assert_eq!(set.patterns.len(), 2);
        assert!(set.patterns[0].is_match("A12"));
        assert!(!set.patterns[1].is_match("A1x"));
        assert_eq!(set.combined_pattern().as_deref(), Some("(?=^[A-Z])(?=[0-9]$)"));
    }

    #[test]
    fn test_merge_is_idempotent() {
        let a = ConstraintBuilder::build_constraints(&json!({
            "minLength": 1,
            "pattern": "^x",
            "multipleOf": 3,
            "description": "same"
        }))
        .unwrap();
        assert_eq!(ConstraintBuilder::merge_constraints(&a, &a), a);
    }

    #[test]
    fn test_merge_multiple_of() {
        let a = ConstraintBuilder::build_constraints(&json!({"multipleOf": 4})).unwrap();
        let b = ConstraintBuilder::build_constraints(&json!({"multipleOf": 6})).unwrap();
        let merged = ConstraintBuilder::merge_constraints(&a, &b);
        assert_eq!(merged.multiple_of, vec![Number::from(12)]);
    }

    #[test]
    fn test_merge_decimal_multiple_of_is_exact() {
        let a = ConstraintBuilder::build_constraints(&json!({"multipleOf": 0.4})).unwrap();
        let b = ConstraintBuilder::build_constraints(&json!({"multipleOf": 0.6})).unwrap();
        let merged = ConstraintBuilder::merge_constraints(&a, &b);
        assert_eq!(merged.multiple_of.len(), 1);
        assert_eq!(merged.multiple_of[0].as_f64(), Some(1.2));

        let a = ConstraintBuilder::build_constraints(&json!({"multipleOf": 0.5})).unwrap();
        let b = ConstraintBuilder::build_constraints(&json!({"multipleOf": 0.4})).unwrap();
        let merged = ConstraintBuilder::merge_constraints(&a, &b);
        assert_eq!(merged.multiple_of, vec![Number::from(2)]);
    }

    #[test]
    fn test_merge_large_coprime_steps_keeps_both() {
        let a = ConstraintBuilder::build_constraints(&json!({"multipleOf": 4294967311u64})).unwrap();
        let b = ConstraintBuilder::build_constraints(&json!({"multipleOf": 4294967357u64})).unwrap();
        let merged = ConstraintBuilder::merge_constraints(&a, &b);
        assert_eq!(
            merged.multiple_of,
            vec![Number::from(4294967311u64), Number::from(4294967357u64)]
        );

        let keywords = merged.to_keywords(false);
        assert_eq!(keywords.get("multipleOf"), Some(&json!(4294967311u64)));
        assert_eq!(keywords.get("allOf"), Some(&json!([{"multipleOf": 4294967357u64}])));

        let rebuilt = ConstraintBuilder::build_constraints(&Value::Object(keywords)).unwrap();
        assert_eq!(rebuilt.multiple_of, merged.multiple_of);
    }

    #[test]
    fn test_decimal_multiples() {
        let step = Decimal::from_number(&Number::from_f64(0.1).unwrap()).unwrap();
        let value = Decimal::from_number(&Number::from_f64(0.3).unwrap()).unwrap();
        assert_eq!(value.is_multiple_of(step), Some(true));

        let step = Decimal::from_number(&Number::from_f64(1.2).unwrap()).unwrap();
        let value = Decimal::from_number(&Number::from_f64(0.48).unwrap()).unwrap();
        assert_eq!(value.is_multiple_of(step), Some(false));

        let negative = Decimal::from_number(&Number::from(-24)).unwrap();
        assert_eq!(negative.is_multiple_of(Decimal::from_number(&Number::from(12)).unwrap()), Some(true));
    }
}
