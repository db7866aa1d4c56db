//! Definition Reference Graph
//!
//! petgraph view of the `$ref` edges between a document's `definitions` and
//! `$defs` entries. Strongly connected components separate legitimate
//! recursive records from alias cycles the builder cannot resolve.

use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

use crate::resolver::refs::is_record_schema;
use crate::resolver::{parse_pointer, ReferenceResolver};

/// Definition containers addressable by a local `$ref`
const DEFINITION_CONTAINERS: &[&str] = &["definitions", "$defs"];

/// How a reference was reached from its source definition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EdgeKind {
    Ref,
    AllOf,
    AnyOf,
    OneOf,
}

/// Reference graph over one document's definitions
#[derive(Debug, Clone)]
pub struct RefGraph {
    graph: DiGraph<String, EdgeKind>,
    node_indices: HashMap<String, NodeIndex>,
    /// Pointers of definitions that compile to records
    records: HashSet<String>,
    /// Components that contain a cycle, in discovery order
    cycles: Vec<Vec<String>>,
}

impl RefGraph {
    /// Build the graph from a root document
    pub fn from_root(root: &Value) -> Self {
        let mut graph = DiGraph::new();
        let mut node_indices = HashMap::new();
        let mut records = HashSet::new();
        let mut bodies = Vec::new();

        for container in DEFINITION_CONTAINERS {
            let Some(defs) = root.get(*container).and_then(Value::as_object) else {
                continue;
            };
            for (name, body) in defs {
                let pointer = format!("#/{}/{}", container, escape(name));
                let idx = graph.add_node(pointer.clone());
                node_indices.insert(pointer.clone(), idx);
                if compiles_to_record(body, root) {
                    records.insert(pointer.clone());
                }
                bodies.push((pointer, body));
            }
        }

        let mut pending = Vec::new();
        for (pointer, body) in &bodies {
            collect_refs(body, pointer, EdgeKind::Ref, &mut pending);
        }
        for (from, to, kind) in pending {
            if let (Some(&from_idx), Some(&to_idx)) = (node_indices.get(&from), node_indices.get(&to)) {
                graph.add_edge(from_idx, to_idx, kind);
            }
        }

        let cycles: Vec<Vec<String>> = kosaraju_scc(&graph)
            .into_iter()
            .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
            .map(|scc| {
                scc.into_iter()
                    .filter_map(|idx| graph.node_weight(idx).cloned())
                    .collect()
            })
            .collect();

        tracing::debug!(
            definitions = graph.node_count(),
            edges = graph.edge_count(),
            cycles = cycles.len(),
            "built reference graph"
        );
        Self {
            graph,
            node_indices,
            records,
            cycles,
        }
    }

    pub fn definition_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains(&self, pointer: &str) -> bool {
        self.node_indices.contains_key(pointer)
    }

    /// Definitions referenced from `pointer`
    pub fn refs_out(&self, pointer: &str) -> Vec<(&str, EdgeKind)> {
        let Some(&idx) = self.node_indices.get(pointer) else {
            return Vec::new();
        };
        let mut out: Vec<(&str, EdgeKind)> = self
            .graph
            .edges(idx)
            .map(|e| (self.graph[e.target()].as_str(), *e.weight()))
            .collect();
        out.sort();
        out.dedup();
        out
    }

    /// Every cyclic component
    pub fn cycles(&self) -> &[Vec<String>] {
        &self.cycles
    }

    /// Definitions on a cycle that passes through a record; these compile to
    /// self-referencing models
    pub fn recursive_definitions(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self
            .cycles
            .iter()
            .filter(|scc| scc.iter().any(|p| self.records.contains(p)))
            .flatten()
            .map(String::as_str)
            .collect();
        out.sort_unstable();
        out
    }

    /// Cycles made only of non-record definitions; these can never be built
    pub fn alias_cycles(&self) -> Vec<&[String]> {
        self.cycles
            .iter()
            .filter(|scc| !scc.iter().any(|p| self.records.contains(p)))
            .map(Vec::as_slice)
            .collect()
    }
}

/// Plain records, and `allOf` definitions whose members merge into one
fn compiles_to_record(body: &Value, root: &Value) -> bool {
    if is_record_schema(body) {
        return true;
    }
    let Some(members) = body.get("allOf").and_then(Value::as_array) else {
        return false;
    };
    members.iter().any(|member| {
        let member = match member.get("$ref").and_then(Value::as_str) {
            Some(reference) => ReferenceResolver::lookup(reference, root).unwrap_or(member),
            None => member,
        };
        member.get("properties").is_some() || member.get("type").map_or(false, |t| t == "object")
    })
}

/// Collect `(source, target definition, kind)` for every local `$ref` under `json`
fn collect_refs(json: &Value, source: &str, kind: EdgeKind, refs: &mut Vec<(String, String, EdgeKind)>) {
    match json {
        Value::Object(obj) => {
            if let Some(target) = obj.get("$ref").and_then(Value::as_str).and_then(definition_pointer) {
                refs.push((source.to_string(), target, kind));
            }
            for (key, value) in obj {
                if key == "properties" {
                    for prop in value.as_object().into_iter().flat_map(|p| p.values()) {
                        collect_refs(prop, source, kind, refs);
                    }
                    continue;
                }
                let next = match key.as_str() {
                    "allOf" => EdgeKind::AllOf,
                    "anyOf" => EdgeKind::AnyOf,
                    "oneOf" => EdgeKind::OneOf,
                    // Values, not schemas
                    "const" | "enum" | "default" | "examples" => continue,
                    _ => kind,
                };
                collect_refs(value, source, next, refs);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_refs(item, source, kind, refs);
            }
        }
        _ => {}
    }
}

/// Reduce a `$ref` to the definition entry it lands in
fn definition_pointer(reference: &str) -> Option<String> {
    let segments = parse_pointer(reference).ok()?;
    match segments.as_slice() {
        [container, name, ..] if DEFINITION_CONTAINERS.contains(&container.as_str()) => {
            Some(format!("#/{}/{}", container, escape(name)))
        }
        _ => None,
    }
}

fn escape(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}
