//! Graph persistence
//!
//! Saves a constructed graph as node-link JSON, GraphML, GEXF, or a native
//! binary document, inferring the format from the file extension when not
//! told. JSON and binary round-trip; the XML dialects are export-only
//! feeds for visualisation tools.
//!
//! Nodes always carry `{id, name, package_name, kind}`. The full
//! [`CodeObject`] payload may be elided ("structure-only") and rehydrated
//! later from an ID-to-object map.

use crate::builder::DependencyGraph;
use crate::GraphError;
use oradep_core::{CodeObject, ObjectKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::Path;
use std::str::FromStr;
use tracing::{info, warn};

/// Supported on-disk graph formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphFormat {
    /// Node-link JSON.
    Json,
    /// GraphML XML (export only).
    Graphml,
    /// GEXF XML for Gephi (export only).
    Gexf,
    /// Native bincode document.
    Binary,
}

impl GraphFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(|e| e.to_lowercase().parse().ok())
    }
}

impl FromStr for GraphFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(GraphFormat::Json),
            "graphml" => Ok(GraphFormat::Graphml),
            "gexf" => Ok(GraphFormat::Gexf),
            "bin" | "graphbin" => Ok(GraphFormat::Binary),
            other => Err(format!("unknown graph format: {other}")),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct NodeRecord {
    id: String,
    name: String,
    package_name: String,
    kind: ObjectKind,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    object: Option<CodeObject>,
}

#[derive(Debug, Serialize, Deserialize)]
struct EdgeRecord {
    source: String,
    target: String,
}

/// Serialised graph document shared by the JSON and binary formats.
#[derive(Debug, Serialize, Deserialize)]
struct GraphDocument {
    directed: bool,
    nodes: Vec<NodeRecord>,
    edges: Vec<EdgeRecord>,
}

/// Save `graph` to `path`. `format` falls back to the file extension.
/// With `structure_only`, node payloads are dropped and only the ID,
/// name, package, and kind survive.
pub fn save_graph(
    graph: &DependencyGraph,
    path: &Path,
    format: Option<GraphFormat>,
    structure_only: bool,
) -> Result<(), GraphError> {
    let format = resolve_format(path, format)?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|source| GraphError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    }

    let document = to_document(graph, structure_only);
    info!(
        path = %path.display(),
        format = ?format,
        nodes = document.nodes.len(),
        edges = document.edges.len(),
        "saving graph"
    );

    let bytes = match format {
        GraphFormat::Json => serde_json::to_vec_pretty(&document)?,
        GraphFormat::Binary => bincode::serialize(&document)?,
        GraphFormat::Graphml => write_graphml(&document).into_bytes(),
        GraphFormat::Gexf => write_gexf(&document).into_bytes(),
    };
    std::fs::write(path, bytes).map_err(|source| GraphError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Load a graph saved by [`save_graph`]. Only the JSON and binary formats
/// can be read back.
pub fn load_graph(path: &Path, format: Option<GraphFormat>) -> Result<DependencyGraph, GraphError> {
    let format = resolve_format(path, format)?;
    let bytes = std::fs::read(path).map_err(|source| GraphError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let document: GraphDocument = match format {
        GraphFormat::Json => serde_json::from_slice(&bytes)?,
        GraphFormat::Binary => bincode::deserialize(&bytes)?,
        GraphFormat::Graphml => return Err(GraphError::ExportOnly("graphml")),
        GraphFormat::Gexf => return Err(GraphError::ExportOnly("gexf")),
    };

    let mut graph = DependencyGraph::new();
    for node in document.nodes {
        let object = node.object.unwrap_or_else(|| {
            let mut o = CodeObject::new(&node.name, &node.package_name, node.kind);
            o.id = node.id.clone();
            o
        });
        graph.add_object(object);
    }
    for edge in &document.edges {
        match (graph.node_index(&edge.source), graph.node_index(&edge.target)) {
            (Some(s), Some(t)) => graph.add_edge(s, t),
            _ => warn!(
                source = edge.source.as_str(),
                target = edge.target.as_str(),
                "edge references unknown node, dropped"
            ),
        }
    }
    info!(
        path = %path.display(),
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        "graph loaded"
    );
    Ok(graph)
}

/// Fill structure-only nodes with full objects from `object_map`, keyed by
/// node ID. Returns how many nodes were populated.
pub fn rehydrate(graph: &mut DependencyGraph, object_map: &HashMap<String, CodeObject>) -> usize {
    let mut populated = 0;
    for idx in graph.graph.node_indices().collect::<Vec<_>>() {
        let id = graph.graph[idx].id.clone();
        if let Some(object) = object_map.get(&id) {
            graph.graph[idx] = object.clone();
            populated += 1;
        } else {
            warn!(id = id.as_str(), "no stored object for node");
        }
    }
    info!(populated, "graph rehydrated");
    populated
}

fn resolve_format(path: &Path, format: Option<GraphFormat>) -> Result<GraphFormat, GraphError> {
    format
        .or_else(|| GraphFormat::from_path(path))
        .ok_or_else(|| GraphError::UnknownFormat(path.display().to_string()))
}

fn to_document(graph: &DependencyGraph, structure_only: bool) -> GraphDocument {
    let mut nodes: Vec<NodeRecord> = graph
        .graph
        .node_indices()
        .map(|idx| {
            let object = &graph.graph[idx];
            NodeRecord {
                id: object.id.clone(),
                name: object.name.clone(),
                package_name: object.package_name.clone(),
                kind: object.kind,
                object: (!structure_only).then(|| object.clone()),
            }
        })
        .collect();
    nodes.sort_by(|a, b| a.id.cmp(&b.id));

    let mut edges: Vec<EdgeRecord> = graph
        .edge_ids()
        .into_iter()
        .map(|(source, target)| EdgeRecord {
            source: source.to_string(),
            target: target.to_string(),
        })
        .collect();
    edges.sort_by(|a, b| (&a.source, &a.target).cmp(&(&b.source, &b.target)));

    GraphDocument { directed: true, nodes, edges }
}

fn xml_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn write_graphml(document: &GraphDocument) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str("<graphml xmlns=\"http://graphml.graphdrawing.org/xmlns\">\n");
    out.push_str("  <key id=\"d0\" for=\"node\" attr.name=\"name\" attr.type=\"string\"/>\n");
    out.push_str("  <key id=\"d1\" for=\"node\" attr.name=\"package_name\" attr.type=\"string\"/>\n");
    out.push_str("  <key id=\"d2\" for=\"node\" attr.name=\"kind\" attr.type=\"string\"/>\n");
    out.push_str("  <graph edgedefault=\"directed\">\n");
    for node in &document.nodes {
        let _ = writeln!(
            out,
            "    <node id=\"{}\"><data key=\"d0\">{}</data><data key=\"d1\">{}</data><data key=\"d2\">{}</data></node>",
            xml_escape(&node.id),
            xml_escape(&node.name),
            xml_escape(&node.package_name),
            node.kind
        );
    }
    for edge in &document.edges {
        let _ = writeln!(
            out,
            "    <edge source=\"{}\" target=\"{}\"/>",
            xml_escape(&edge.source),
            xml_escape(&edge.target)
        );
    }
    out.push_str("  </graph>\n</graphml>\n");
    out
}

fn write_gexf(document: &GraphDocument) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str("<gexf xmlns=\"http://gexf.net/1.3\" version=\"1.3\">\n");
    out.push_str("  <graph defaultedgetype=\"directed\">\n");
    out.push_str("    <attributes class=\"node\">\n");
    out.push_str("      <attribute id=\"0\" title=\"package_name\" type=\"string\"/>\n");
    out.push_str("      <attribute id=\"1\" title=\"kind\" type=\"string\"/>\n");
    out.push_str("    </attributes>\n    <nodes>\n");
    for node in &document.nodes {
        let _ = writeln!(
            out,
            "      <node id=\"{}\" label=\"{}\"><attvalues><attvalue for=\"0\" value=\"{}\"/><attvalue for=\"1\" value=\"{}\"/></attvalues></node>",
            xml_escape(&node.id),
            xml_escape(&node.name),
            xml_escape(&node.package_name),
            node.kind
        );
    }
    out.push_str("    </nodes>\n    <edges>\n");
    for (i, edge) in document.edges.iter().enumerate() {
        let _ = writeln!(
            out,
            "      <edge id=\"{}\" source=\"{}\" target=\"{}\"/>",
            i,
            xml_escape(&edge.source),
            xml_escape(&edge.target)
        );
    }
    out.push_str("    </edges>\n  </graph>\n</gexf>\n");
    out
}
