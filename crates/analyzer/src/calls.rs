//! Call-site extraction from cleaned object bodies
//!
//! Candidates are dotted identifier sequences followed by `(` or `;`.
//! After keyword filtering, each candidate's argument list is scanned by
//! hand with a nesting counter: commas split parameters at depth 1 only, a
//! `=>` at depth 1 turns the accumulated text into a named-argument key,
//! and a stray `;` aborts the list. Committed values get their
//! `<LITERAL_N>` placeholders restored from the file's literal map.

use oradep_core::ident::is_ident_part;
use oradep_core::{CallSite, LiteralMap};
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;
use tracing::{debug, trace, warn};

static CANDIDATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    const IDENT: &str = r#"(?:[A-Za-z_][A-Za-z0-9_#$]*|"(?:[^"]|"")*")"#;
    Regex::new(&format!(r"({IDENT}(?:\.{IDENT})*)\s*([(;])")).unwrap()
});

/// Extracts call sites from cleaned PL/SQL bodies.
///
/// One extractor per configuration; reusable across files.
pub struct CallExtractor {
    keywords_to_drop: HashSet<String>,
    allow_parameterless: bool,
    strict_lpar_only: bool,
}

impl CallExtractor {
    pub fn new<I, S>(keywords_to_drop: I, allow_parameterless: bool, strict_lpar_only: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        CallExtractor {
            keywords_to_drop: keywords_to_drop
                .into_iter()
                .map(|k| k.as_ref().to_uppercase())
                .collect(),
            allow_parameterless,
            strict_lpar_only,
        }
    }

    /// Extract every call site from `cleaned`, in source order.
    pub fn extract(&self, cleaned: &str, literals: &LiteralMap) -> Vec<CallSite> {
        if cleaned.trim().is_empty() {
            return Vec::new();
        }

        // Newline offsets once, so line numbers are a binary search away.
        let newline_offsets: Vec<usize> = cleaned
            .bytes()
            .enumerate()
            .filter_map(|(i, b)| (b == b'\n').then_some(i))
            .collect();

        let mut calls = Vec::new();
        for caps in CANDIDATE_RE.captures_iter(cleaned) {
            let name_match = caps.get(1).unwrap();
            let call_name = name_match.as_str();
            let terminator = &caps[2];

            // The match must begin at an identifier boundary, not inside a
            // longer name or a qualified tail.
            if cleaned[..name_match.start()]
                .chars()
                .next_back()
                .is_some_and(|c| is_ident_part(c) || c == '.' || c == '"')
            {
                continue;
            }

            // `END my_proc;` closes a scope, it is not a call.
            if preceded_by_end(cleaned, name_match.start()) {
                trace!(name = call_name, "candidate follows END, skipping");
                continue;
            }

            if self.keywords_to_drop.contains(&call_name.to_uppercase()) {
                trace!(name = call_name, "candidate is a blacklisted keyword");
                continue;
            }

            if self.strict_lpar_only && terminator == ";" {
                trace!(name = call_name, "semicolon form dropped in strict mode");
                continue;
            }

            let Some((positional, named)) =
                self.extract_params(cleaned, call_name, name_match.end(), literals)
            else {
                continue;
            };

            let line_no = newline_offsets.partition_point(|&p| p < name_match.start()) + 1;
            calls.push(CallSite {
                call_name: call_name.to_string(),
                line_no,
                start_idx: name_match.start(),
                end_idx: name_match.start() + call_name.len(),
                positional,
                named,
            });
        }

        debug!(count = calls.len(), "call extraction complete");
        calls
    }

    /// Scan the argument list following a call name. `from` points just
    /// past the name. Returns `None` when the call has no parentheses and
    /// parameterless calls are disallowed.
    fn extract_params(
        &self,
        cleaned: &str,
        call_name: &str,
        from: usize,
        literals: &LiteralMap,
    ) -> Option<(Vec<String>, BTreeMap<String, String>)> {
        let mut positional = Vec::new();
        let mut named = BTreeMap::new();

        let rest = &cleaned[from..];
        let open = rest
            .char_indices()
            .find(|(_, c)| !c.is_whitespace())
            .filter(|&(_, c)| c == '(')
            .map(|(i, _)| i);
        let Some(open) = open else {
            if !self.allow_parameterless {
                trace!(name = call_name, "no parenthesis and parameterless calls disallowed");
                return None;
            }
            return Some((positional, named));
        };

        let mut depth = 1usize;
        let mut value = String::new();
        let mut name = String::new();
        let mut is_named = false;

        let mut commit =
            |value: &mut String, name: &mut String, is_named: &mut bool| {
                let v = value.trim().to_string();
                if *is_named {
                    let n = name.trim().to_string();
                    if n.is_empty() {
                        warn!(call = call_name, value = v.as_str(), "named argument with empty name");
                    } else {
                        named.insert(n, literals.restore(&v));
                    }
                } else if !v.is_empty() {
                    positional.push(literals.restore(&v));
                }
                value.clear();
                name.clear();
                *is_named = false;
            };

        let tail = &rest[open + 1..];
        let mut chars = tail.char_indices().peekable();
        let mut closed = false;
        while let Some((_, c)) = chars.next() {
            match c {
                '(' => {
                    depth += 1;
                    value.push(c);
                }
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        closed = true;
                        break;
                    }
                    value.push(c);
                }
                ';' if depth <= 1 => {
                    // Malformed list; keep what was already committed.
                    value.clear();
                    name.clear();
                    is_named = false;
                    break;
                }
                ',' if depth == 1 => commit(&mut value, &mut name, &mut is_named),
                '=' if depth == 1
                    && !is_named
                    && chars.peek().is_some_and(|&(_, n)| n == '>') =>
                {
                    is_named = true;
                    name = std::mem::take(&mut value);
                    chars.next();
                }
                _ => value.push(c),
            }
        }

        if !value.trim().is_empty() || is_named {
            commit(&mut value, &mut name, &mut is_named);
        }

        if !closed && depth > 0 {
            warn!(
                call = call_name,
                depth, "argument list ended with unbalanced parentheses"
            );
        }

        Some((positional, named))
    }
}

/// True when the text before `pos` ends with an END token.
fn preceded_by_end(text: &str, pos: usize) -> bool {
    let before = text[..pos].trim_end();
    let bytes = before.as_bytes();
    if bytes.len() < 3 || !bytes[bytes.len() - 3..].eq_ignore_ascii_case(b"END") {
        return false;
    }
    let boundary = bytes.len() - 3;
    boundary == 0 || !before[..boundary].chars().next_back().is_some_and(is_ident_part)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cleaner::clean;
    use pretty_assertions::assert_eq;

    fn extractor() -> CallExtractor {
        CallExtractor::new(["BEGIN", "END", "IF", "RETURN", "DBMS_OUTPUT.PUT_LINE"], true, false)
    }

    fn extract(src: &str) -> Vec<CallSite> {
        let (cleaned, literals) = clean(src);
        extractor().extract(&cleaned, &literals)
    }

    #[test]
    fn test_simple_call_with_args() {
        let calls = extract("BEGIN my_proc(1, x); END;");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].call_name, "my_proc");
        assert_eq!(calls[0].positional, vec!["1", "x"]);
        assert!(calls[0].named.is_empty());
    }

    #[test]
    fn test_parameterless_semicolon_call() {
        let calls = extract("BEGIN do_it; END;");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].call_name, "do_it");
        assert!(calls[0].positional.is_empty());
    }

    #[test]
    fn test_strict_lpar_drops_semicolon_form() {
        let (cleaned, literals) = clean("BEGIN do_it; run(1); END;");
        let strict = CallExtractor::new(["BEGIN", "END"], true, true);
        let calls = strict.extract(&cleaned, &literals);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].call_name, "run");
    }

    #[test]
    fn test_disallow_parameterless() {
        let (cleaned, literals) = clean("BEGIN do_it; run(1); END;");
        let no_bare = CallExtractor::new(["BEGIN", "END"], false, false);
        let calls = no_bare.extract(&cleaned, &literals);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].call_name, "run");
    }

    #[test]
    fn test_qualified_name() {
        let calls = extract("BEGIN pkg.sub.proc(1); END;");
        assert_eq!(calls[0].call_name, "pkg.sub.proc");
    }

    #[test]
    fn test_keyword_blacklist() {
        let calls = extract("BEGIN DBMS_OUTPUT.PUT_LINE('x'); worker(); END;");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].call_name, "worker");
    }

    #[test]
    fn test_end_name_not_a_call() {
        let calls = extract("BEGIN helper; END my_proc;");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].call_name, "helper");
    }

    #[test]
    fn test_named_params() {
        let calls = extract("BEGIN f(p_num => 1, p_flag => TRUE); END;");
        assert_eq!(calls.len(), 1);
        let named = &calls[0].named;
        assert_eq!(named.get("p_num").map(String::as_str), Some("1"));
        assert_eq!(named.get("p_flag").map(String::as_str), Some("TRUE"));
        assert!(calls[0].positional.is_empty());
    }

    #[test]
    fn test_mixed_positional_and_named() {
        let calls = extract("BEGIN f('a', p_n => 2); END;");
        assert_eq!(calls[0].positional, vec!["'a'"]);
        assert_eq!(calls[0].named.get("p_n").map(String::as_str), Some("2"));
    }

    #[test]
    fn test_nested_parens_stay_in_value() {
        let calls = extract("BEGIN f(g(1,2), 3); END;");
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].call_name, "f");
        assert_eq!(calls[0].positional, vec!["g(1,2)", "3"]);
        // The inner call is also a candidate in its own right.
        assert_eq!(calls[1].call_name, "g");
        assert_eq!(calls[1].positional, vec!["1", "2"]);
    }

    #[test]
    fn test_literals_restored() {
        let calls = extract("BEGIN log('it''s', msg => 'done'); END;");
        assert_eq!(calls[0].positional, vec!["'it''s'"]);
        assert_eq!(calls[0].named.get("msg").map(String::as_str), Some("'done'"));
    }

    #[test]
    fn test_named_with_empty_value_at_end() {
        let calls = extract("BEGIN f(p => ); END;");
        assert_eq!(calls[0].named.get("p").map(String::as_str), Some(""));
    }

    #[test]
    fn test_semicolon_aborts_argument_list() {
        // Unbalanced list: the semicolon cuts collection short, keeping
        // only previously committed parameters.
        let calls = extract("BEGIN f(1, 2; END;");
        assert_eq!(calls[0].positional, vec!["1"]);
    }

    #[test]
    fn test_multiline_call() {
        let calls = extract("BEGIN\n  f(1,\n    2);\nEND;");
        assert_eq!(calls[0].line_no, 2);
        assert_eq!(calls[0].positional, vec!["1", "2"]);
    }

    #[test]
    fn test_line_numbers_and_spans() {
        let src = "BEGIN\n  alpha;\n  beta(1);\nEND;";
        let calls = extract(src);
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].line_no, 2);
        assert_eq!(calls[1].line_no, 3);
        let (cleaned, _) = clean(src);
        let c = &calls[1];
        assert_eq!(&cleaned[c.start_idx..c.end_idx], "beta");
    }

    #[test]
    fn test_space_before_paren() {
        let calls = extract("BEGIN f (1); END;");
        assert_eq!(calls[0].call_name, "f");
        assert_eq!(calls[0].positional, vec!["1"]);
    }

    #[test]
    fn test_comparison_operator_not_named() {
        // `>=` after `=` must not trigger named-argument mode; `a => b` is
        // named, `a >= b` inside an expression is not.
        let calls = extract("BEGIN f(x >= 1); END;");
        assert_eq!(calls[0].positional, vec!["x >= 1"]);
        assert!(calls[0].named.is_empty());
    }

    #[test]
    fn test_empty_body() {
        let (cleaned, literals) = clean("   \n  ");
        assert!(extractor().extract(&cleaned, &literals).is_empty());
    }

    #[test]
    fn test_call_name_preserves_casing() {
        let calls = extract("BEGIN MyPkg.DoThing(1); END;");
        assert_eq!(calls[0].call_name, "MyPkg.DoThing");
    }
}
