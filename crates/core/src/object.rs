//! Code object records extracted from PL/SQL source
//!
//! A [`CodeObject`] is one procedure or function definition (or a
//! placeholder for an unresolved external callee). Its identity is a stable
//! string ID derived from the qualified name, extended with a digest of the
//! formal parameter set when the name is overloaded, so reformatting a file
//! never changes IDs and distinct overloads never collide.

use crate::ident::{fold, strip_quotes};
use crate::literal::LiteralMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Kind of extracted object. `Unknown` is reserved for placeholder nodes
/// created for unresolved external calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ObjectKind {
    Procedure,
    Function,
    Package,
    Trigger,
    Type,
    #[default]
    Unknown,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ObjectKind::Procedure => "PROCEDURE",
            ObjectKind::Function => "FUNCTION",
            ObjectKind::Package => "PACKAGE",
            ObjectKind::Trigger => "TRIGGER",
            ObjectKind::Type => "TYPE",
            ObjectKind::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

impl FromStr for ObjectKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PROCEDURE" => Ok(ObjectKind::Procedure),
            "FUNCTION" => Ok(ObjectKind::Function),
            "PACKAGE" => Ok(ObjectKind::Package),
            "TRIGGER" => Ok(ObjectKind::Trigger),
            "TYPE" => Ok(ObjectKind::Type),
            "UNKNOWN" => Ok(ObjectKind::Unknown),
            other => Err(format!("unknown object kind: {other}")),
        }
    }
}

/// Parameter passing mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamMode {
    #[default]
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "OUT")]
    Out,
    #[serde(rename = "IN OUT")]
    InOut,
}

impl fmt::Display for ParamMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ParamMode::In => "IN",
            ParamMode::Out => "OUT",
            ParamMode::InOut => "IN OUT",
        };
        f.write_str(s)
    }
}

/// One formal parameter of a procedure or function header.
///
/// The type is kept as the verbatim (whitespace-normalised) source
/// expression; `VARCHAR2(100 BYTE)` and `pkg.t_rec%ROWTYPE` are stored
/// as written, never resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: String,
    pub mode: ParamMode,
    pub default: Option<String>,
}

impl Parameter {
    pub fn new(name: &str, param_type: &str) -> Self {
        Parameter {
            name: name.to_string(),
            param_type: param_type.to_string(),
            mode: ParamMode::In,
            default: None,
        }
    }
}

/// One call site found in an object's cleaned body.
///
/// Indices refer to the cleaned text the call was extracted from. The call
/// name keeps its original casing; comparisons elsewhere use folded forms.
/// Parameter values have literals restored to their source form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSite {
    pub call_name: String,
    pub line_no: usize,
    pub start_idx: usize,
    pub end_idx: usize,
    pub positional: Vec<String>,
    pub named: BTreeMap<String, String>,
}

/// A PL/SQL procedure or function definition, or a placeholder node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeObject {
    /// Stable ID; empty until [`generate_id`](Self::generate_id) runs.
    pub id: String,
    /// Simple object name, case-folded.
    pub name: String,
    /// Dotted package qualifier, case-folded; empty for standalone objects.
    pub package_name: String,
    pub kind: ObjectKind,
    /// True iff at least two objects in the same file share this
    /// (package, name) pair.
    pub overloaded: bool,
    pub parameters: Vec<Parameter>,
    /// Present iff `kind` is `Function`.
    pub return_type: Option<String>,
    /// Cleaned source of the whole file this object was defined in.
    /// `None` for placeholder nodes.
    pub clean_code: Option<String>,
    pub literal_map: LiteralMap,
    pub calls: Vec<CallSite>,
    /// 1-based inclusive line span in the defining file.
    pub start_line: usize,
    pub end_line: usize,
}

impl CodeObject {
    /// Build a new object, folding both names and cleaning the package
    /// qualifier. A package path that ends in the object's own simple name
    /// (common when the qualifier was derived from the file name of a
    /// standalone object) loses that trailing segment.
    pub fn new(name: &str, package_name: &str, kind: ObjectKind) -> Self {
        let name = fold(&strip_quotes(name));
        let mut package_name = fold(&strip_quotes(package_name));
        if package_name == name {
            package_name.clear();
        } else if let Some(prefix) = package_name.strip_suffix(&format!(".{name}")) {
            package_name = prefix.to_string();
        }
        CodeObject {
            name,
            package_name,
            kind,
            ..CodeObject::default()
        }
    }

    /// Minimal UNKNOWN-kind node standing in for an unresolved qualified
    /// call target. The dotted call name becomes the ID verbatim.
    pub fn placeholder(id: &str) -> Self {
        let (package_name, name) = match id.rsplit_once('.') {
            Some((pkg, simple)) => (pkg.to_string(), simple.to_string()),
            None => (String::new(), id.to_string()),
        };
        CodeObject {
            id: id.to_string(),
            name,
            package_name,
            kind: ObjectKind::Unknown,
            ..CodeObject::default()
        }
    }

    /// Qualified name: `package.name`, or the simple name when standalone.
    pub fn qualified_name(&self) -> String {
        if self.package_name.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.package_name, self.name)
        }
    }

    /// Compute and set the stable ID.
    ///
    /// Non-overloaded objects (and overloads without parameters) use the
    /// qualified name. Overloads with parameters append a SHA-256 digest of
    /// the canonical parameter JSON, sorted by parameter name, so two
    /// overloads share an ID iff their formal parameter sets are identical
    /// by name regardless of declaration order.
    pub fn generate_id(&mut self) {
        let base = self.qualified_name();
        self.id = if self.overloaded && !self.parameters.is_empty() {
            format!("{base}-{}", self.parameter_digest())
        } else {
            base
        };
    }

    fn parameter_digest(&self) -> String {
        let mut params = self.parameters.clone();
        params.sort_by(|a, b| a.name.cmp(&b.name));

        // serde_json's map is key-ordered, which makes this JSON canonical.
        let canonical: Vec<Value> = params
            .iter()
            .map(|p| {
                let mut m = Map::new();
                m.insert(
                    "default".into(),
                    p.default.clone().map_or(Value::Null, Value::String),
                );
                m.insert("mode".into(), Value::String(p.mode.to_string()));
                m.insert("name".into(), Value::String(p.name.clone()));
                m.insert("type".into(), Value::String(p.param_type.clone()));
                Value::Object(m)
            })
            .collect();
        let json = serde_json::to_string(&Value::Array(canonical))
            .unwrap_or_default();
        hex::encode(Sha256::digest(json.as_bytes()))
    }
}
