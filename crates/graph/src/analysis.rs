//! Analyses over the finished dependency graph
//!
//! Read-only consumers of [`DependencyGraph`]: cycle detection, entry and
//! terminal nodes, degree queries, reachability, and a coarse role
//! classification. All results come back sorted by node ID so reports are
//! stable across runs.

use crate::builder::DependencyGraph;
use oradep_core::ObjectKind;
use petgraph::Direction;
use petgraph::algo::tarjan_scc;
use petgraph::visit::{Bfs, Reversed};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Strongly connected components that represent real recursion cycles:
/// multi-node components, plus single nodes that call themselves.
///
/// Each cycle's members are sorted; cycles are ordered by their first
/// member.
pub fn find_cycles(graph: &DependencyGraph) -> Vec<Vec<String>> {
    let mut cycles: Vec<Vec<String>> = tarjan_scc(&graph.graph)
        .into_iter()
        .filter(|scc| {
            scc.len() > 1
                || scc
                    .first()
                    .is_some_and(|&n| graph.graph.find_edge(n, n).is_some())
        })
        .map(|scc| {
            let mut ids: Vec<String> =
                scc.iter().map(|&n| graph.graph[n].id.clone()).collect();
            ids.sort();
            ids
        })
        .collect();
    cycles.sort();
    debug!(count = cycles.len(), "cycle detection complete");
    cycles
}

/// Nodes nothing calls but that call something: the roots of the call
/// forest.
pub fn entry_points(graph: &DependencyGraph) -> Vec<String> {
    nodes_where(graph, |inc, out| inc == 0 && out > 0)
}

/// Nodes that call nothing but are called: the leaves.
pub fn terminal_nodes(graph: &DependencyGraph) -> Vec<String> {
    nodes_where(graph, |inc, out| out == 0 && inc > 0)
}

/// Known (non-placeholder) objects no analysed code calls.
pub fn unused_objects(graph: &DependencyGraph) -> Vec<String> {
    let mut ids: Vec<String> = graph
        .graph
        .node_indices()
        .filter(|&n| {
            graph.graph[n].kind != ObjectKind::Unknown
                && graph
                    .graph
                    .neighbors_directed(n, Direction::Incoming)
                    .count()
                    == 0
        })
        .map(|n| graph.graph[n].id.clone())
        .collect();
    ids.sort();
    ids
}

/// `(in_degree, out_degree)` per node ID.
pub fn node_degrees(graph: &DependencyGraph) -> BTreeMap<String, (usize, usize)> {
    graph
        .graph
        .node_indices()
        .map(|n| {
            (
                graph.graph[n].id.clone(),
                (
                    graph.graph.neighbors_directed(n, Direction::Incoming).count(),
                    graph.graph.neighbors_directed(n, Direction::Outgoing).count(),
                ),
            )
        })
        .collect()
}

/// Everything reachable downstream from `id`, excluding the node itself.
pub fn descendants(graph: &DependencyGraph, id: &str) -> Option<BTreeSet<String>> {
    let start = graph.node_index(id)?;
    let mut reached = BTreeSet::new();
    let mut bfs = Bfs::new(&graph.graph, start);
    while let Some(node) = bfs.next(&graph.graph) {
        if node != start {
            reached.insert(graph.graph[node].id.clone());
        }
    }
    Some(reached)
}

/// Everything that can reach `id`, excluding the node itself.
pub fn ancestors(graph: &DependencyGraph, id: &str) -> Option<BTreeSet<String>> {
    let start = graph.node_index(id)?;
    let reversed = Reversed(&graph.graph);
    let mut reached = BTreeSet::new();
    let mut bfs = Bfs::new(reversed, start);
    while let Some(node) = bfs.next(reversed) {
        if node != start {
            reached.insert(graph.graph[node].id.clone());
        }
    }
    Some(reached)
}

/// Coarse structural role of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    /// No edges at all.
    Isolated,
    /// Calls others, called by nobody.
    Entry,
    /// Called by others, calls nobody.
    Terminal,
    /// Total degree at or above the hub threshold.
    Hub,
    /// Anything else.
    Internal,
}

impl std::fmt::Display for NodeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            NodeRole::Isolated => "isolated",
            NodeRole::Entry => "entry",
            NodeRole::Terminal => "terminal",
            NodeRole::Hub => "hub",
            NodeRole::Internal => "internal",
        };
        f.write_str(s)
    }
}

/// Classify every node by its degrees. A node can be both an entry/
/// terminal and a hub.
pub fn classify_nodes(
    graph: &DependencyGraph,
    hub_threshold: usize,
) -> BTreeMap<String, Vec<NodeRole>> {
    node_degrees(graph)
        .into_iter()
        .map(|(id, (inc, out))| {
            let mut roles = Vec::new();
            if inc == 0 && out == 0 {
                roles.push(NodeRole::Isolated);
            } else if inc == 0 {
                roles.push(NodeRole::Entry);
            } else if out == 0 {
                roles.push(NodeRole::Terminal);
            }
            if inc + out >= hub_threshold && hub_threshold > 0 {
                roles.push(NodeRole::Hub);
            }
            if roles.is_empty() {
                roles.push(NodeRole::Internal);
            }
            (id, roles)
        })
        .collect()
}

fn nodes_where(graph: &DependencyGraph, pred: impl Fn(usize, usize) -> bool) -> Vec<String> {
    let mut ids: Vec<String> = graph
        .graph
        .node_indices()
        .filter(|&n| {
            let inc = graph.graph.neighbors_directed(n, Direction::Incoming).count();
            let out = graph.graph.neighbors_directed(n, Direction::Outgoing).count();
            pred(inc, out)
        })
        .map(|n| graph.graph[n].id.clone())
        .collect();
    ids.sort();
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build_graph;
    use oradep_core::{CallSite, CodeObject};
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

    fn object(name: &str, calls: Vec<CallSite>) -> CodeObject {
        let mut o = CodeObject::new(name, "pkg", ObjectKind::Procedure);
        o.clean_code = Some(String::new());
        o.calls = calls;
        o.generate_id();
        o
    }

    fn graph_of(objects: Vec<CodeObject>) -> DependencyGraph {
        build_graph(objects).0
    }

    #[test]
    fn test_no_cycles() {
        let graph = graph_of(vec![
            object("main", vec![call("helper")]),
            object("helper", vec![]),
        ]);
        assert!(find_cycles(&graph).is_empty());
    }

    #[test]
    fn test_mutual_recursion_pair() {
        let graph = graph_of(vec![
            object("ping", vec![call("pong")]),
            object("pong", vec![call("ping")]),
            object("main", vec![call("ping")]),
        ]);
        let cycles = find_cycles(&graph);
        assert_eq!(cycles, vec![vec!["pkg.ping".to_string(), "pkg.pong".to_string()]]);
    }

    #[test]
    fn test_multiple_independent_cycles() {
        let graph = graph_of(vec![
            object("a", vec![call("b")]),
            object("b", vec![call("a")]),
            object("x", vec![call("y")]),
            object("y", vec![call("x")]),
        ]);
        assert_eq!(find_cycles(&graph).len(), 2);
    }

    #[test]
    fn test_self_recursion_not_visible() {
        // Self-loops are suppressed at edge level, so direct recursion
        // cannot appear as a cycle.
        let graph = graph_of(vec![object("selfy", vec![call("selfy")])]);
        assert!(find_cycles(&graph).is_empty());
    }

    #[test]
    fn test_entry_and_terminal_nodes() {
        let graph = graph_of(vec![
            object("main", vec![call("mid")]),
            object("mid", vec![call("leaf")]),
            object("leaf", vec![]),
            object("loner", vec![]),
        ]);
        assert_eq!(entry_points(&graph), vec!["pkg.main"]);
        assert_eq!(terminal_nodes(&graph), vec!["pkg.leaf"]);
    }

    #[test]
    fn test_unused_objects_excludes_placeholders() {
        let graph = graph_of(vec![object("main", vec![call("ext.thing")])]);
        // ext.thing is a placeholder with in-degree 1; main is uncalled.
        assert_eq!(unused_objects(&graph), vec!["pkg.main"]);
    }

    #[test]
    fn test_degrees() {
        let graph = graph_of(vec![
            object("main", vec![call("mid")]),
            object("mid", vec![call("leaf")]),
            object("leaf", vec![]),
        ]);
        let degrees = node_degrees(&graph);
        assert_eq!(degrees["pkg.main"], (0, 1));
        assert_eq!(degrees["pkg.mid"], (1, 1));
        assert_eq!(degrees["pkg.leaf"], (1, 0));
    }

    #[test]
    fn test_descendants_and_ancestors() {
        let graph = graph_of(vec![
            object("main", vec![call("mid")]),
            object("mid", vec![call("leaf")]),
            object("leaf", vec![]),
            object("other", vec![]),
        ]);
        let down = descendants(&graph, "pkg.main").unwrap();
        assert_eq!(
            down.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["pkg.leaf", "pkg.mid"]
        );
        let up = ancestors(&graph, "pkg.leaf").unwrap();
        assert_eq!(
            up.iter().map(String::as_str).collect::<Vec<_>>(),
            vec!["pkg.main", "pkg.mid"]
        );
        assert!(descendants(&graph, "missing").is_none());
    }

    #[test]
    fn test_classify_nodes() {
        let graph = graph_of(vec![
            object("main", vec![call("hub")]),
            object("second", vec![call("hub")]),
            object("hub", vec![call("leaf_a"), call("leaf_b")]),
            object("leaf_a", vec![]),
            object("leaf_b", vec![]),
            object("loner", vec![]),
        ]);
        let roles = classify_nodes(&graph, 4);
        assert_eq!(roles["pkg.main"], vec![NodeRole::Entry]);
        assert_eq!(roles["pkg.hub"], vec![NodeRole::Hub]);
        assert_eq!(roles["pkg.leaf_a"], vec![NodeRole::Terminal]);
        assert_eq!(roles["pkg.loner"], vec![NodeRole::Isolated]);
    }
}
