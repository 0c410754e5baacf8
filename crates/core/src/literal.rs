//! String-literal placeholder map
//!
//! The code cleaner replaces every string literal's content with a numbered
//! `<LITERAL_N>` token. The map records the original content (surrounding
//! quotes excluded, internal `''` escapes preserved) so the call extractor
//! can restore parameter values to their source form.
//!
//! One map per source file; placeholder numbers are sequential from 0.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<LITERAL_(\d+)>").unwrap());

/// Ordered store of literal contents keyed by placeholder index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiteralMap {
    entries: Vec<String>,
}

impl LiteralMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a literal's content and return the placeholder token that
    /// stands in for it in the cleaned code.
    pub fn push(&mut self, content: String) -> String {
        let token = Self::token(self.entries.len());
        self.entries.push(content);
        token
    }

    /// The placeholder token for index `n`.
    pub fn token(n: usize) -> String {
        format!("<LITERAL_{n}>")
    }

    /// Look up the content behind a placeholder token.
    pub fn get(&self, token: &str) -> Option<&str> {
        let caps = PLACEHOLDER_RE.captures(token)?;
        if caps.get(0)?.as_str() != token {
            return None;
        }
        let idx: usize = caps[1].parse().ok()?;
        self.entries.get(idx).map(String::as_str)
    }

    /// Substitute every `<LITERAL_N>` occurrence in `text` with the stored
    /// content. Tokens with no entry are left untouched.
    pub fn restore(&self, text: &str) -> String {
        PLACEHOLDER_RE
            .replace_all(text, |caps: &regex::Captures<'_>| {
                let idx: usize = caps[1].parse().unwrap_or(usize::MAX);
                match self.entries.get(idx) {
                    Some(content) => content.clone(),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_push_numbers_sequentially() {
        let mut map = LiteralMap::new();
        assert_eq!(map.push("first".into()), "<LITERAL_0>");
        assert_eq!(map.push("second".into()), "<LITERAL_1>");
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_get() {
        let mut map = LiteralMap::new();
        map.push("hello".into());
        assert_eq!(map.get("<LITERAL_0>"), Some("hello"));
        assert_eq!(map.get("<LITERAL_1>"), None);
        assert_eq!(map.get("LITERAL_0"), None);
    }

    #[test]
    fn test_restore_replaces_all_occurrences() {
        let mut map = LiteralMap::new();
        map.push("a".into());
        map.push("it''s".into());
        assert_eq!(
            map.restore("x := '<LITERAL_0>' || '<LITERAL_1>';"),
            "x := 'a' || 'it''s';"
        );
    }

    #[test]
    fn test_restore_leaves_unknown_tokens() {
        let map = LiteralMap::new();
        assert_eq!(map.restore("'<LITERAL_7>'"), "'<LITERAL_7>'");
    }
}
