//! Signature parsing for procedure/function headers
//!
//! Extracts `{kind, name, parameters, return_type}` from one object's
//! source text. Header recognition is regex-driven; the parameter list is
//! scanned by hand so nested parentheses in sizes (`NUMBER(10,2)`) and
//! defaulted expressions (`DEFAULT f(1,2)`) split correctly on top-level
//! commas only.
//!
//! The input may contain more than the header (typically the whole object
//! body). Every `PROCEDURE <name>`/`FUNCTION <name>` occurrence is tried
//! and the longest successful parse wins, ties going to the earliest.

use oradep_core::ident::strip_quotes;
use oradep_core::{ObjectKind, ParamMode, Parameter};
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, trace, warn};

const IDENT: &str = r#"(?:[A-Za-z_][A-Za-z0-9_#$]*|"(?:[^"]|"")*")"#;

static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r#"(?i)(?:\bCREATE\s+(?:OR\s+REPLACE\s+)?(?:(?:NON)?EDITIONABLE\s+)?)?\b(PROCEDURE|FUNCTION)\s+({IDENT}(?:\.{IDENT})*)"#
    ))
    .unwrap()
});

static PARAM_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"^(?i){IDENT}")).unwrap());

static MODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?i)\s*\b(IN\s+OUT|IN|OUT)\b").unwrap());

static NOCOPY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(?i)\s*\bNOCOPY\b").unwrap());

static RETURN_TYPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^\s*RETURN\s+(.*?)\s*(?:\b(?:IS|AS)\b|;|$)").unwrap()
});

static TRAILER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(?:\bIS\b|\bAS\b|;)").unwrap());

/// Parsed object header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub kind: ObjectKind,
    /// Qualified name as written, quotes stripped.
    pub name: String,
    pub parameters: Vec<Parameter>,
    /// Verbatim (whitespace-normalised) return type; functions only.
    pub return_type: Option<String>,
}

/// Parse the best procedure/function signature found in `text`.
///
/// Returns `None` when no header parses; callers record the object anyway
/// with an empty parameter list.
pub fn parse(text: &str) -> Option<Signature> {
    if text.trim().is_empty() {
        warn!("attempted to parse an empty signature");
        return None;
    }

    let mut best: Option<(usize, Signature)> = None;
    for caps in HEADER_RE.captures_iter(text) {
        let whole = caps.get(0).unwrap();
        let kind = if caps[1].eq_ignore_ascii_case("FUNCTION") {
            ObjectKind::Function
        } else {
            ObjectKind::Procedure
        };
        let name = strip_quotes(caps[2].trim());

        match parse_rest(kind, &text[whole.end()..]) {
            Some((consumed, parameters, return_type)) => {
                let len = whole.end() - whole.start() + consumed;
                trace!(name = name.as_str(), len, "signature candidate parsed");
                if best.as_ref().is_none_or(|(best_len, _)| len > *best_len) {
                    best = Some((len, Signature { kind, name, parameters, return_type }));
                }
            }
            None => {
                trace!(name = name.as_str(), "signature candidate rejected");
            }
        }
    }

    match best {
        Some((_, sig)) => {
            debug!(
                name = sig.name.as_str(),
                params = sig.parameters.len(),
                has_return = sig.return_type.is_some(),
                "signature parsed"
            );
            Some(sig)
        }
        None => {
            warn!("no parsable signature found");
            None
        }
    }
}

/// Parse everything after the object name. Returns the number of bytes
/// consumed, the parameters, and the return type.
fn parse_rest(
    kind: ObjectKind,
    rest: &str,
) -> Option<(usize, Vec<Parameter>, Option<String>)> {
    let mut cursor = skip_ws(rest, 0);
    let mut parameters = Vec::new();

    if rest[cursor..].starts_with('(') {
        let (raw_params, after) = split_parameter_list(&rest[cursor..])?;
        for raw in raw_params {
            if raw.trim().is_empty() {
                continue;
            }
            parameters.push(parse_parameter(&raw)?);
        }
        cursor += after;
    }

    let return_type = match kind {
        ObjectKind::Function => {
            let caps = RETURN_TYPE_RE.captures(&rest[cursor..])?;
            let ty = normalise_ws(&caps[1]);
            if ty.is_empty() {
                return None;
            }
            cursor += caps.get(0).unwrap().end();
            Some(ty)
        }
        _ => {
            if let Some(m) = TRAILER_RE.find(&rest[cursor..]) {
                cursor += m.end();
            }
            None
        }
    };

    Some((cursor, parameters, return_type))
}

/// Split the text starting at `(` into raw parameter strings at top-level
/// commas. Returns the pieces and the byte offset just past the closing
/// parenthesis. `None` when the list never closes.
fn split_parameter_list(text: &str) -> Option<(Vec<String>, usize)> {
    debug_assert!(text.starts_with('('));
    let mut depth = 1usize;
    let mut current = String::new();
    let mut pieces = Vec::new();

    let mut iter = text.char_indices();
    iter.next(); // consume '('
    for (idx, c) in iter {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth -= 1;
                if depth == 0 {
                    pieces.push(std::mem::take(&mut current));
                    return Some((pieces, idx + 1));
                }
                current.push(c);
            }
            ',' if depth == 1 => pieces.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    None
}

/// Parse one raw parameter: `ident [mode] [NOCOPY] type [default]`.
fn parse_parameter(raw: &str) -> Option<Parameter> {
    let text = raw.trim();
    let name_match = PARAM_NAME_RE.find(text)?;
    let name = strip_quotes(name_match.as_str());
    let mut rest = &text[name_match.end()..];

    let mut mode = ParamMode::In;
    if let Some(caps) = MODE_RE.captures(rest) {
        let m = caps[1].to_uppercase();
        mode = if m.starts_with("IN") && m.contains("OUT") {
            ParamMode::InOut
        } else if m == "OUT" {
            ParamMode::Out
        } else {
            ParamMode::In
        };
        rest = &rest[caps.get(0).unwrap().end()..];
    }
    if let Some(m) = NOCOPY_RE.find(rest) {
        rest = &rest[m.end()..];
    }

    let (type_text, default_text) = split_default(rest);
    let param_type = normalise_ws(&type_text);
    if param_type.is_empty() {
        return None;
    }
    let default = default_text
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());

    Some(Parameter { name, param_type, mode, default })
}

/// Split a parameter tail at the top-level `DEFAULT` keyword or `:=`
/// operator, whichever comes first.
fn split_default(text: &str) -> (String, Option<String>) {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut idx = 0;
    while idx < bytes.len() {
        match bytes[idx] {
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            b':' if depth == 0 && bytes.get(idx + 1) == Some(&b'=') => {
                return (
                    text[..idx].to_string(),
                    Some(text[idx + 2..].to_string()),
                );
            }
            b'D' | b'd' if depth == 0 && is_default_keyword(text, idx) => {
                return (
                    text[..idx].to_string(),
                    Some(text[idx + 7..].to_string()),
                );
            }
            _ => {}
        }
        idx += 1;
    }
    (text.to_string(), None)
}

fn is_default_keyword(text: &str, idx: usize) -> bool {
    let bytes = text.as_bytes();
    if idx + 7 > bytes.len() || !bytes[idx..idx + 7].eq_ignore_ascii_case(b"DEFAULT") {
        return false;
    }
    let before_ok = idx == 0
        || !text[..idx]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_' || c == '#' || c == '$');
    let after_ok = !bytes
        .get(idx + 7)
        .is_some_and(|&b| b.is_ascii_alphanumeric() || b == b'_' || b == b'#' || b == b'$');
    before_ok && after_ok
}

fn skip_ws(text: &str, from: usize) -> usize {
    text[from..]
        .char_indices()
        .find(|(_, c)| !c.is_whitespace())
        .map(|(i, _)| from + i)
        .unwrap_or(text.len())
}

fn normalise_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
