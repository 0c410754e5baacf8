//! PL/SQL source extraction library
//!
//! Turns a tree of PL/SQL source files into stored [`CodeObject`] records:
//!
//! 1. [`cleaner`] strips comments and swaps string literals for
//!    `<LITERAL_N>` placeholders,
//! 2. [`structure`] finds every procedure/function definition and its line
//!    span (dropping forward declarations),
//! 3. [`signature`] parses each object's header into typed parameters,
//! 4. [`calls`] extracts every call site from the object's body,
//! 5. [`store`] persists the resulting objects keyed by stable ID, with
//!    per-file invalidation by content hash.
//!
//! [`workflow::ExtractionWorkflow`] drives the pipeline over a configured
//! source root; no error escapes a file boundary during a batch run.
//!
//! [`CodeObject`]: oradep_core::CodeObject

pub mod calls;
pub mod cleaner;
pub mod config;
pub mod files;
pub mod signature;
pub mod store;
pub mod structure;
pub mod workflow;

pub use calls::CallExtractor;
pub use cleaner::clean;
pub use config::AnalyzerConfig;
pub use signature::Signature;
pub use store::{ObjectStore, StoreError};
pub use structure::{ObjectSpan, StructuralOutcome, StructuralParser};
pub use workflow::{ExtractionStats, ExtractionWorkflow};

use std::path::PathBuf;

/// Errors surfaced by the extraction pipeline.
///
/// During batch processing these are logged and converted to per-file
/// skips; they only propagate out of entry points the caller invoked for
/// one specific resource (config loading, store opening).
#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}
