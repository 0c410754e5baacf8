//! Shared data model for the oradep toolkit
//!
//! Everything the analyzer and graph crates exchange lives here: the
//! [`CodeObject`] record extracted from PL/SQL source, its parameters and
//! call sites, the literal placeholder map produced by code cleaning, and
//! the identifier folding rules that make name comparisons uniform across
//! the whole pipeline.
//!
//! Names are case-folded exactly once, at ingestion. Every lookup further
//! down the pipeline compares the folded forms directly.

pub mod ident;
pub mod literal;
pub mod object;

pub use ident::{fold, strip_quotes};
pub use literal::LiteralMap;
pub use object::{CallSite, CodeObject, ObjectKind, ParamMode, Parameter};
