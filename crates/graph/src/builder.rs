//! Dependency graph construction
//!
//! Orchestrates lookup building and overload resolution over the complete
//! object list. Nodes are keyed by object ID and carry the [`CodeObject`];
//! edges are unlabelled, deduplicated per ordered pair, and never
//! self-loops. Calls that resolve nowhere land in the out-of-scope set,
//! with a placeholder node created for qualified names so downstream
//! analyses still see the external dependency.
//!
//! Construction is deterministic: objects are processed sorted by ID and
//! call sites in source order, so identical inputs serialise identically.

use crate::lookup::LookupTables;
use crate::resolve::resolve_overloaded_call;
use oradep_core::ident::fold;
use oradep_core::{CallSite, CodeObject};
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, trace, warn};

/// Directed dependency graph over code objects.
///
/// Nodes live in the petgraph arena; `ids` maps object IDs to node
/// indices. Edges carry no payload.
#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    pub graph: DiGraph<CodeObject, ()>,
    ids: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node unless its ID is already present. Returns its index.
    pub fn add_object(&mut self, object: CodeObject) -> NodeIndex {
        debug_assert!(!object.id.is_empty());
        if let Some(&idx) = self.ids.get(&object.id) {
            trace!(id = object.id.as_str(), "node already present");
            return idx;
        }
        let id = object.id.clone();
        let idx = self.graph.add_node(object);
        self.ids.insert(id, idx);
        idx
    }

    /// Add one `source -> target` edge, suppressing self-loops and
    /// duplicates.
    pub fn add_edge(&mut self, source: NodeIndex, target: NodeIndex) {
        if source == target {
            trace!("self-loop suppressed");
            return;
        }
        if self.graph.find_edge(source, target).is_none() {
            self.graph.add_edge(source, target, ());
        }
    }

    pub fn node_index(&self, id: &str) -> Option<NodeIndex> {
        self.ids.get(id).copied()
    }

    pub fn node(&self, id: &str) -> Option<&CodeObject> {
        self.node_index(id).map(|idx| &self.graph[idx])
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Node IDs in sorted order.
    pub fn node_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.ids.keys().map(String::as_str).collect();
        ids.sort();
        ids
    }

    /// Edges as `(source_id, target_id)` pairs in sorted order.
    pub fn edge_ids(&self) -> Vec<(&str, &str)> {
        let mut edges: Vec<(&str, &str)> = self
            .graph
            .edge_indices()
            .filter_map(|e| self.graph.edge_endpoints(e))
            .map(|(a, b)| (self.graph[a].id.as_str(), self.graph[b].id.as_str()))
            .collect();
        edges.sort();
        edges
    }

    pub fn has_edge(&self, source_id: &str, target_id: &str) -> bool {
        match (self.node_index(source_id), self.node_index(target_id)) {
            (Some(s), Some(t)) => self.graph.find_edge(s, t).is_some(),
            _ => false,
        }
    }

    pub fn degrees(&self, id: &str) -> Option<(usize, usize)> {
        let idx = self.node_index(id)?;
        Some((
            self.graph.neighbors_directed(idx, Direction::Incoming).count(),
            self.graph.neighbors_directed(idx, Direction::Outgoing).count(),
        ))
    }
}

/// Build the dependency graph from the full object list.
///
/// Returns the graph and the out-of-scope set: call names (and overload
/// failure descriptions) that resolved to nothing inside the corpus.
pub fn build_graph(mut objects: Vec<CodeObject>) -> (DependencyGraph, BTreeSet<String>) {
    objects.sort_by(|a, b| a.id.cmp(&b.id));
    info!(count = objects.len(), "building dependency graph");

    let tables = LookupTables::build(&objects);
    let mut graph = DependencyGraph::new();
    for object in &objects {
        graph.add_object(object.clone());
    }

    let mut out_of_scope: BTreeSet<String> = BTreeSet::new();
    for object in &objects {
        if object.clean_code.is_none() {
            trace!(id = object.id.as_str(), "no source, skipping call resolution");
            continue;
        }
        for call in &object.calls {
            resolve_call(&tables, &objects, &mut graph, &mut out_of_scope, object, call);
        }
    }

    info!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        out_of_scope = out_of_scope.len(),
        "graph construction complete"
    );
    (graph, out_of_scope)
}

/// Resolution order for a call name `n` from package `P`:
/// 1. global normal `n`
/// 2. package-local normal `n` under `P`
/// 3. global normal `P.n`
/// 4. global overload set `n`
/// 5. package-local overload set `n` under `P`
/// 6. global overload set `P.n`
/// The first path that yields anything wins.
fn resolve_call(
    tables: &LookupTables,
    objects: &[CodeObject],
    graph: &mut DependencyGraph,
    out_of_scope: &mut BTreeSet<String>,
    source: &CodeObject,
    call: &CallSite,
) {
    let name = fold(&call.call_name);
    let package = source.package_name.as_str();
    trace!(
        call = name.as_str(),
        from = source.id.as_str(),
        package,
        "resolving call"
    );

    if tables.skip.contains(&name) {
        debug!(call = name.as_str(), "name is ambiguous, treated as out of scope");
        record_out_of_scope(graph, out_of_scope, source, &name);
        return;
    }

    let contextual = if package.is_empty() {
        None
    } else {
        Some(format!("{package}.{name}"))
    };

    // Normal paths (1-3).
    let normal_target = tables
        .global_normal
        .get(&name)
        .or_else(|| {
            tables
                .package_local
                .get(package)
                .and_then(|local| local.normal.get(&name))
        })
        .or_else(|| {
            contextual
                .as_ref()
                .and_then(|fqn| tables.global_normal.get(fqn))
        });
    if let Some(&target_idx) = normal_target {
        let target_id = objects[target_idx].id.clone();
        trace!(call = name.as_str(), target = target_id.as_str(), "resolved via normal maps");
        add_resolved_edge(graph, source, &target_id);
        return;
    }

    // Overload paths (4-6).
    let candidate_set = tables
        .global_over
        .get(&name)
        .or_else(|| {
            tables
                .package_local
                .get(package)
                .and_then(|local| local.overloaded.get(&name))
        })
        .or_else(|| {
            contextual
                .as_ref()
                .and_then(|fqn| tables.global_over.get(fqn))
        });
    if let Some(set) = candidate_set {
        let candidates: Vec<&CodeObject> = set.iter().map(|&i| &objects[i]).collect();
        match resolve_overloaded_call(&candidates, call) {
            Some(target) => {
                let target_id = target.id.clone();
                debug!(
                    call = name.as_str(),
                    target = target_id.as_str(),
                    "overload resolved"
                );
                add_resolved_edge(graph, source, &target_id);
            }
            None => {
                let named: Vec<&str> = call.named.keys().map(String::as_str).collect();
                let description = format!(
                    "{name} (overloaded, no match: positional={}, named=[{}])",
                    call.positional.len(),
                    named.join(", ")
                );
                warn!(
                    call = name.as_str(),
                    from = source.id.as_str(),
                    "overload resolution failed"
                );
                out_of_scope.insert(description);
            }
        }
        return;
    }

    record_out_of_scope(graph, out_of_scope, source, &name);
}

fn add_resolved_edge(graph: &mut DependencyGraph, source: &CodeObject, target_id: &str) {
    let Some(source_idx) = graph.node_index(&source.id) else {
        warn!(id = source.id.as_str(), "source object missing from graph");
        return;
    };
    let Some(target_idx) = graph.node_index(target_id) else {
        warn!(id = target_id, "resolved target missing from graph");
        return;
    };
    graph.add_edge(source_idx, target_idx);
}

/// Record an unresolved call. Qualified names additionally get a
/// placeholder node and an edge to it, so external dependencies stay
/// visible in the graph.
fn record_out_of_scope(
    graph: &mut DependencyGraph,
    out_of_scope: &mut BTreeSet<String>,
    source: &CodeObject,
    name: &str,
) {
    debug!(call = name, from = source.id.as_str(), "call is out of scope");
    out_of_scope.insert(name.to_string());

    if name.contains('.') {
        let target_idx = match graph.node_index(name) {
            Some(idx) => idx,
            None => {
                info!(id = name, "creating placeholder node for external call");
                graph.add_object(CodeObject::placeholder(name))
            }
        };
        if let Some(source_idx) = graph.node_index(&source.id) {
            graph.add_edge(source_idx, target_idx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oradep_core::{ObjectKind, Parameter};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn call(name: &str) -> CallSite {
        CallSite {
            call_name: name.into(),
            line_no: 1,
            start_idx: 0,
            end_idx: name.len(),
            positional: Vec::new(),
            named: BTreeMap::new(),
        }
    }

    fn call_with(name: &str, positional: &[&str], named: &[(&str, &str)]) -> CallSite {
        let mut c = call(name);
        c.positional = positional.iter().map(|s| s.to_string()).collect();
        c.named = named
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        c
    }

    fn object(name: &str, pkg: &str, calls: Vec<CallSite>) -> CodeObject {
        let mut o = CodeObject::new(name, pkg, ObjectKind::Procedure);
        o.clean_code = Some(String::new());
        o.calls = calls;
        o.generate_id();
        o
    }

    #[test]
    fn test_simple_package_local_call() {
        let objects = vec![
            object("a", "pkg", vec![call("b")]),
            object("b", "pkg", vec![]),
        ];
        let (graph, out_of_scope) = build_graph(objects);

        assert_eq!(graph.node_ids(), vec!["pkg.a", "pkg.b"]);
        assert_eq!(graph.edge_ids(), vec![("pkg.a", "pkg.b")]);
        assert!(out_of_scope.is_empty());
    }

    #[test]
    fn test_qualified_out_of_scope_call_gets_placeholder() {
        let objects = vec![object("p", "mypkg", vec![call_with("dbms_external.foo", &["1"], &[])])];
        let (graph, out_of_scope) = build_graph(objects);

        assert_eq!(graph.node_ids(), vec!["dbms_external.foo", "mypkg.p"]);
        assert!(graph.has_edge("mypkg.p", "dbms_external.foo"));
        let placeholder = graph.node("dbms_external.foo").unwrap();
        assert_eq!(placeholder.kind, ObjectKind::Unknown);
        assert_eq!(placeholder.package_name, "dbms_external");
        assert!(out_of_scope.contains("dbms_external.foo"));
    }

    #[test]
    fn test_unqualified_unresolved_gets_no_edge() {
        let objects = vec![object("p", "pkg", vec![call("mystery")])];
        let (graph, out_of_scope) = build_graph(objects);

        assert_eq!(graph.node_ids(), vec!["pkg.p"]);
        assert_eq!(graph.edge_count(), 0);
        assert!(out_of_scope.contains("mystery"));
    }

    #[test]
    fn test_ambiguous_global_name_out_of_scope() {
        let objects = vec![
            object("global_dup", "", vec![]),
            object("global_dup", "", vec![]),
            object("caller", "", vec![call("global_dup")]),
        ];
        let (graph, out_of_scope) = build_graph(objects);

        assert!(out_of_scope.contains("global_dup"));
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_contextual_fqn_resolution() {
        // `sub.proc` called from pkg.main resolves to pkg.sub.proc via the
        // contextual fully-qualified path.
        let objects = vec![
            object("main", "pkg", vec![call("sub.proc")]),
            object("proc", "pkg.sub", vec![]),
        ];
        let (graph, out_of_scope) = build_graph(objects);

        assert!(graph.has_edge("pkg.main", "pkg.sub.proc"));
        assert!(out_of_scope.is_empty());
    }

    #[test]
    fn test_overload_resolution_by_named_argument() {
        let mut text = CodeObject::new("f", "pkg", ObjectKind::Function);
        text.overloaded = true;
        text.parameters = vec![Parameter::new("p_text", "VARCHAR2")];
        text.generate_id();

        let mut num = CodeObject::new("f", "pkg", ObjectKind::Function);
        num.overloaded = true;
        num.parameters = vec![Parameter::new("p_num", "NUMBER"), {
            let mut p = Parameter::new("p_flag", "BOOLEAN");
            p.default = Some("TRUE".into());
            p
        }];
        num.generate_id();

        let caller = object("main", "pkg", vec![call_with("pkg.f", &[], &[("p_num", "1")])]);
        let num_id = num.id.clone();
        let (graph, out_of_scope) = build_graph(vec![text, num, caller]);

        assert!(graph.has_edge("pkg.main", &num_id));
        assert!(out_of_scope.is_empty());
    }

    #[test]
    fn test_overload_failure_recorded_with_shape() {
        let mut a = CodeObject::new("f", "pkg", ObjectKind::Function);
        a.overloaded = true;
        a.parameters = vec![Parameter::new("x", "NUMBER")];
        a.generate_id();
        let mut b = CodeObject::new("f", "pkg", ObjectKind::Function);
        b.overloaded = true;
        b.parameters = vec![Parameter::new("y", "NUMBER")];
        b.generate_id();

        let caller = object(
            "main",
            "pkg",
            vec![call_with("pkg.f", &["1", "2", "3"], &[])],
        );
        let (graph, out_of_scope) = build_graph(vec![a, b, caller]);

        assert_eq!(graph.edge_count(), 0);
        assert!(
            out_of_scope
                .iter()
                .any(|e| e.starts_with("pkg.f (overloaded") && e.contains("positional=3")),
            "{out_of_scope:?}"
        );
    }

    #[test]
    fn test_self_loop_suppressed() {
        let objects = vec![object("p", "pkg", vec![call("p")])];
        let (graph, _) = build_graph(objects);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_duplicate_calls_collapse_to_one_edge() {
        let objects = vec![
            object("a", "pkg", vec![call("b"), call("b"), call("B")]),
            object("b", "pkg", vec![]),
        ];
        let (graph, _) = build_graph(objects);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_normal_resolution_beats_overload_paths() {
        // A standalone object wins step 1 before any overload set with the
        // same simple name under the caller's package is consulted.
        let solo = object("util", "", vec![]);
        let mut over_a = CodeObject::new("util", "pkg", ObjectKind::Procedure);
        over_a.overloaded = true;
        over_a.parameters = vec![Parameter::new("x", "NUMBER")];
        over_a.generate_id();
        let mut over_b = CodeObject::new("util", "pkg", ObjectKind::Procedure);
        over_b.overloaded = true;
        over_b.parameters = vec![Parameter::new("y", "NUMBER")];
        over_b.generate_id();
        let caller = object("main", "pkg", vec![call("util")]);

        let (graph, out_of_scope) = build_graph(vec![solo, over_a, over_b, caller]);
        assert!(graph.has_edge("pkg.main", "util"));
        assert!(out_of_scope.is_empty());
    }

    #[test]
    fn test_case_insensitive_call_names() {
        let objects = vec![
            object("a", "pkg", vec![call("PKG.B")]),
            object("b", "pkg", vec![]),
        ];
        let (graph, _) = build_graph(objects);
        assert!(graph.has_edge("pkg.a", "pkg.b"));
    }

    #[test]
    fn test_deterministic_construction() {
        let make = || {
            vec![
                object("a", "pkg", vec![call("b"), call("ext.thing")]),
                object("b", "pkg", vec![call("a")]),
                object("c", "", vec![call("pkg.a")]),
            ]
        };
        let (g1, o1) = build_graph(make());
        let mut reversed = make();
        reversed.reverse();
        let (g2, o2) = build_graph(reversed);

        assert_eq!(g1.node_ids(), g2.node_ids());
        assert_eq!(g1.edge_ids(), g2.edge_ids());
        assert_eq!(o1, o2);
    }

    #[test]
    fn test_placeholder_nodes_have_no_outgoing_edges() {
        let objects = vec![object("p", "pkg", vec![call("ext.helper")])];
        let (graph, _) = build_graph(objects);
        let idx = graph.node_index("ext.helper").unwrap();
        assert_eq!(
            graph.graph.neighbors_directed(idx, Direction::Outgoing).count(),
            0
        );
    }
}
