//! Dependency graph construction for extracted PL/SQL objects
//!
//! Consumes the [`CodeObject`]s the analyzer stored and produces a simple
//! directed graph:
//!
//! 1. [`lookup`] builds the global and package-local name tables under the
//!    strict-cleaner scoping rule, flagging ambiguous names,
//! 2. [`resolve`] picks the matching overload for one call site,
//! 3. [`builder`] walks every object's call sites in deterministic order
//!    and emits nodes, edges, placeholders, and the out-of-scope set,
//! 4. [`storage`] saves and loads graphs (node-link JSON, GraphML, GEXF,
//!    native binary),
//! 5. [`analysis`] answers downstream questions (cycles, entry points,
//!    reachability, roles) over the finished graph.
//!
//! [`CodeObject`]: oradep_core::CodeObject

pub mod analysis;
pub mod builder;
pub mod lookup;
pub mod resolve;
pub mod storage;

pub use builder::{DependencyGraph, build_graph};
pub use lookup::LookupTables;
pub use resolve::resolve_overloaded_call;
pub use storage::{GraphFormat, load_graph, save_graph};

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON graph serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("binary graph serialization error: {0}")]
    Binary(#[from] bincode::Error),
    #[error("cannot determine graph format for {0}")]
    UnknownFormat(String),
    #[error("format {0} supports export only")]
    ExportOnly(&'static str),
}
