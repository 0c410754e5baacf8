//! Code cleaning: comment removal and literal substitution
//!
//! Single left-to-right character scan with four states: normal, inside a
//! string, inside a `--` line comment, inside a `/* */` block comment.
//! String literal content is replaced by a `<LITERAL_N>` placeholder (the
//! surrounding quotes stay in the output) and recorded in a [`LiteralMap`].
//!
//! Newlines outside string literals are never removed, including those
//! inside block comments, so comment elision never shifts line numbers:
//! positions computed against the cleaned text match the original file.
//! A newline inside a literal is part of the literal's content and moves
//! into the map with the rest of it.
//!
//! q-quoted literals (`q'[...]'`) are not recognised; the leading `q` is
//! ordinary text and the quote after it opens a regular literal.

use oradep_core::LiteralMap;
use tracing::debug;

/// Strip comments and map string literals out of `source`.
///
/// Returns the cleaned text and the per-file literal map. Placeholders are
/// numbered sequentially from 0. An unterminated literal at end of input
/// still produces a placeholder; an unterminated block comment is dropped
/// silently.
pub fn clean(source: &str) -> (String, LiteralMap) {
    let chars: Vec<char> = source.chars().collect();
    let mut cleaned = String::with_capacity(source.len());
    let mut literals = LiteralMap::new();
    let mut current_literal = String::new();

    let mut in_quote = false;
    let mut in_line_comment = false;
    let mut in_block_comment = false;

    let mut idx = 0;
    while idx < chars.len() {
        let c = chars[idx];
        let next = chars.get(idx + 1).copied();

        if in_line_comment {
            if c == '\n' {
                in_line_comment = false;
                cleaned.push('\n');
            }
            idx += 1;
            continue;
        }

        if in_block_comment {
            if c == '*' && next == Some('/') {
                in_block_comment = false;
                idx += 2;
            } else {
                // Keep line structure intact across multi-line comments.
                if c == '\n' {
                    cleaned.push('\n');
                }
                idx += 1;
            }
            continue;
        }

        if !in_quote && c == '/' && next == Some('*') {
            in_block_comment = true;
            idx += 2;
            continue;
        }

        if !in_quote && c == '-' && next == Some('-') {
            in_line_comment = true;
            idx += 2;
            continue;
        }

        // '' inside a literal is an escaped quote, kept verbatim.
        if in_quote && c == '\'' && next == Some('\'') {
            current_literal.push_str("''");
            idx += 2;
            continue;
        }

        if c == '\'' {
            in_quote = !in_quote;
            if !in_quote {
                let token = literals.push(std::mem::take(&mut current_literal));
                cleaned.push_str(&token);
                cleaned.push('\'');
            } else {
                cleaned.push('\'');
            }
            idx += 1;
            continue;
        }

        if in_quote {
            current_literal.push(c);
        } else {
            cleaned.push(c);
        }
        idx += 1;
    }

    if in_quote {
        debug!("input ended inside a string literal");
        let token = literals.push(std::mem::take(&mut current_literal));
        cleaned.push_str(&token);
    }

    debug!(
        source_len = source.len(),
        cleaned_len = cleaned.len(),
        literals = literals.len(),
        "code cleaning complete"
    );
    (cleaned, literals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn line_count(s: &str) -> usize {
        s.matches('\n').count()
    }

    #[test]
    fn test_line_comment_removed_newline_kept() {
        let (cleaned, map) = clean("a := 1; -- trailing note\nb := 2;");
        assert_eq!(cleaned, "a := 1; \nb := 2;");
        assert!(map.is_empty());
    }

    #[test]
    fn test_block_comment_removed() {
        let (cleaned, _) = clean("a /* note */ b");
        assert_eq!(cleaned, "a  b");
    }

    #[test]
    fn test_multiline_block_comment_keeps_line_count() {
        let src = "a;\n/* one\ntwo\nthree */\nb;\n";
        let (cleaned, _) = clean(src);
        assert_eq!(line_count(&cleaned), line_count(src));
        assert_eq!(cleaned, "a;\n\n\n\nb;\n");
    }

    #[test]
    fn test_literal_replaced_with_placeholder() {
        let (cleaned, map) = clean("x := 'hello';");
        assert_eq!(cleaned, "x := '<LITERAL_0>';");
        assert_eq!(map.get("<LITERAL_0>"), Some("hello"));
    }

    #[test]
    fn test_placeholders_sequential() {
        let (cleaned, map) = clean("a('x'); b('y');");
        assert_eq!(cleaned, "a('<LITERAL_0>'); b('<LITERAL_1>');");
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_escaped_quote_preserved_in_content() {
        let (cleaned, map) = clean("msg := 'it''s fine';");
        assert_eq!(cleaned, "msg := '<LITERAL_0>';");
        assert_eq!(map.get("<LITERAL_0>"), Some("it''s fine"));
    }

    #[test]
    fn test_comment_markers_inside_literal_ignored() {
        let (cleaned, map) = clean("x := '-- not /* a comment */';");
        assert_eq!(cleaned, "x := '<LITERAL_0>';");
        assert_eq!(map.get("<LITERAL_0>"), Some("-- not /* a comment */"));
    }

    #[test]
    fn test_quote_inside_comment_ignored() {
        let (cleaned, map) = clean("a; -- don't\nb;");
        assert_eq!(cleaned, "a; \nb;");
        assert!(map.is_empty());
    }

    #[test]
    fn test_unclosed_literal_at_eof() {
        let (cleaned, map) = clean("x := 'dangling");
        assert_eq!(cleaned, "x := '<LITERAL_0>");
        assert_eq!(map.get("<LITERAL_0>"), Some("dangling"));
    }

    #[test]
    fn test_unclosed_block_comment_dropped() {
        let (cleaned, _) = clean("a; /* never ends\nstill comment");
        assert_eq!(cleaned, "a; \n");
    }

    #[test]
    fn test_q_quote_not_recognised() {
        // The q prefix is plain text; the literal starts at the first '.
        let (cleaned, map) = clean("x := q'[abc]';");
        assert_eq!(cleaned, "x := q'<LITERAL_0>';");
        assert_eq!(map.get("<LITERAL_0>"), Some("[abc]"));
    }

    #[test]
    fn test_restore_round_trip() {
        let src = "BEGIN log('a'); log('b''c'); END;";
        let (cleaned, map) = clean(src);
        assert_eq!(map.restore(&cleaned), src);
    }

    #[test]
    fn test_line_count_always_preserved() {
        for src in [
            "",
            "just text",
            "a -- c\nb",
            "'lit'\nmore",
            "/* x */ y",
            "a /* b\nc */ d\n",
            "x; -- unterminated\n/*",
        ] {
            let (cleaned, _) = clean(src);
            assert_eq!(line_count(&cleaned), line_count(src), "{src:?}");
        }
    }
}
