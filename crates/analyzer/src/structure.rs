//! Structural parsing of cleaned PL/SQL source
//!
//! A line-oriented scanner over cleaner output. It tracks two explicit
//! stacks: control blocks (`IF`/`CASE`/`FOR`/`WHILE`/`LOOP`/`BEGIN`) and
//! scopes (package body, procedure, function). Every `END` closes the most
//! recent block, or the current scope when no block is open. The scanner
//! emits one [`ObjectSpan`] per surviving definition, keyed by the folded
//! simple name, plus the package-body name when the file declares one.
//!
//! Forward declarations (`PROCEDURE p;` headers with no body) are detected
//! while a scope is still before its `BEGIN` and removed once confirmed by
//! the next object header or the enclosing scope's `END`, so they never
//! reach the object store.
//!
//! Mismatched `END`s, unclosed scopes, and similar anomalies are logged and
//! scanning continues; the scanner always returns whatever it collected.

use oradep_core::ObjectKind;
use oradep_core::ident::{fold, is_ident_part, strip_quotes};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::{debug, error, info, trace, warn};

static PACKAGE_BODY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)\bCREATE\s+(?:OR\s+REPLACE\s+)?(?:(?:NON)?EDITIONABLE\s+)?PACKAGE\s+BODY\s+([A-Za-z0-9_".]+)"#,
    )
    .unwrap()
});

static OBJECT_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(PROCEDURE|FUNCTION)\b\s+([A-Za-z0-9_"./]+)"#).unwrap()
});

/// A line ending in a bare PROCEDURE/FUNCTION keyword carries its name on
/// the next non-empty line.
static OBJECT_KEYWORD_EOL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(PROCEDURE|FUNCTION)\s*$").unwrap());

static STRUCT_KEYWORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(IF|CASE|FOR|WHILE|LOOP|BEGIN|END)\b").unwrap());

static FOR_UPDATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bFOR\s+UPDATE\b").unwrap());

static OPEN_FOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bOPEN\s+\S+\s+FOR\b").unwrap());

/// `RETURN <type> ;` on one line marks a function forward declaration when
/// nothing between RETURN and the semicolon reads IS/AS.
static RETURN_DECL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bRETURN\b([^;]*);").unwrap());

static IS_AS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\b(?:IS|AS)\b").unwrap());

static AS_LANGUAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bAS\s+LANGUAGE\b").unwrap());

/// Line span of one object occurrence in the cleaned file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSpan {
    /// 1-based line of the header.
    pub start_line: usize,
    /// 1-based line of the closing END; `None` if never closed.
    pub end_line: Option<usize>,
    pub kind: ObjectKind,
}

/// Result of scanning one file.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StructuralOutcome {
    /// Package body name declared in the file, if any (quotes stripped,
    /// original casing).
    pub package_name: Option<String>,
    /// Folded simple name to the spans of its definitions, in source order.
    /// Two or more spans under one name mean the name is overloaded.
    pub objects: BTreeMap<String, Vec<ObjectSpan>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    If,
    Case,
    For,
    While,
    Loop,
    Begin,
}

impl BlockKind {
    fn as_str(self) -> &'static str {
        match self {
            BlockKind::If => "IF",
            BlockKind::Case => "CASE",
            BlockKind::For => "FOR",
            BlockKind::While => "WHILE",
            BlockKind::Loop => "LOOP",
            BlockKind::Begin => "BEGIN",
        }
    }
}

#[derive(Debug, Clone)]
struct Scope {
    start_line: usize,
    kind: ObjectKind,
    /// Quote-stripped name, original casing.
    name: String,
    has_seen_begin: bool,
    is_package: bool,
}

/// Stateful line scanner for one cleaned file. Create, call
/// [`parse`](Self::parse), discard.
pub struct StructuralParser {
    lines: Vec<String>,
    line_num: usize,
    package_name: Option<String>,
    objects: BTreeMap<String, Vec<ObjectSpan>>,
    block_stack: Vec<(usize, BlockKind)>,
    scope_stack: Vec<Scope>,
    awaiting_loop_for: bool,
    awaiting_loop_while: bool,
    /// (scope start line, kind, name) of a suspected forward declaration.
    forward_candidate: Option<(usize, ObjectKind, String)>,
    /// Bare PROCEDURE/FUNCTION keyword waiting for a name on the next line.
    pending_object_keyword: Option<String>,
    in_block_comment: bool,
    in_quote: bool,
}

impl Default for StructuralParser {
    fn default() -> Self {
        Self::new()
    }
}

impl StructuralParser {
    pub fn new() -> Self {
        StructuralParser {
            lines: Vec::new(),
            line_num: 0,
            package_name: None,
            objects: BTreeMap::new(),
            block_stack: Vec::new(),
            scope_stack: Vec::new(),
            awaiting_loop_for: false,
            awaiting_loop_while: false,
            forward_candidate: None,
            pending_object_keyword: None,
            in_block_comment: false,
            in_quote: false,
        }
    }

    /// Scan cleaned source and collect object spans.
    pub fn parse(mut self, cleaned: &str) -> StructuralOutcome {
        self.lines = cleaned.split('\n').map(str::to_string).collect();

        for i in 0..self.lines.len() {
            self.line_num = i + 1;
            let line = self.lines[i].clone();
            self.process_line(&line);
        }
        self.finish()
    }

    fn process_line(&mut self, raw: &str) {
        let Some(processed) = self.strip_comments_and_strings(raw) else {
            return;
        };
        if processed.trim().is_empty() {
            return;
        }
        trace!(line = self.line_num, text = processed.trim(), "processing line");

        // Forward-declaration shape check runs against the accumulated text
        // of the current scope while it is still before its BEGIN.
        if self.forward_candidate.is_none()
            && let Some(top) = self.scope_stack.last()
            && !top.has_seen_begin
            && !top.is_package
        {
            let (start, kind, name) = (top.start_line, top.kind, top.name.clone());
            self.check_forward_candidate(&processed, start, kind, &name);
        }

        // Package body declaration. Checked before PROCEDURE/FUNCTION since
        // those keywords can appear later on the same line.
        if let Some(caps) = PACKAGE_BODY_RE.captures(&processed) {
            let name = strip_quotes(caps[1].trim());
            if let Some(prev) = &self.package_name {
                error!(
                    line = self.line_num,
                    previous = prev.as_str(),
                    new = name.as_str(),
                    "multiple PACKAGE BODY declarations in one file"
                );
            }
            info!(line = self.line_num, package = name.as_str(), "found PACKAGE BODY");
            self.package_name = Some(name.clone());
            self.clear_forward_candidate("package scope started");
            self.scope_stack.push(Scope {
                start_line: self.line_num,
                kind: ObjectKind::Package,
                name,
                has_seen_begin: false,
                is_package: true,
            });
        }

        // Object header, possibly completed by a keyword left over from the
        // previous line.
        let line_for_object = match self.pending_object_keyword.take() {
            Some(kw) => format!("{kw} {processed}"),
            None => processed.clone(),
        };
        if let Some(caps) = OBJECT_HEADER_RE.captures(&line_for_object) {
            if self.forward_candidate.is_some() {
                self.confirm_forward_declaration();
            }
            let kind = if caps[1].eq_ignore_ascii_case("FUNCTION") {
                ObjectKind::Function
            } else {
                ObjectKind::Procedure
            };
            let name = strip_quotes(&caps[2]);
            info!(line = self.line_num, kind = %kind, name = name.as_str(), "found object header");
            self.push_object_scope(kind, &name, &line_for_object);
        } else if OBJECT_KEYWORD_EOL_RE.is_match(processed.trim_end()) {
            let kw = OBJECT_KEYWORD_EOL_RE
                .captures(processed.trim_end())
                .map(|c| c[1].to_uppercase());
            trace!(
                line = self.line_num,
                "object keyword at end of line, name expected on next line"
            );
            self.pending_object_keyword = kw;
            return;
        }

        self.scan_structural_keywords(&processed);
    }

    /// Push a procedure/function scope, record its span entry, and probe
    /// the fresh header for a forward-declaration shape.
    fn push_object_scope(&mut self, kind: ObjectKind, name: &str, header_line: &str) {
        self.clear_forward_candidate("new object header");
        let start = self.line_num;
        self.scope_stack.push(Scope {
            start_line: start,
            kind,
            name: name.to_string(),
            has_seen_begin: false,
            is_package: false,
        });
        debug!(line = start, kind = %kind, name, "push scope");
        self.objects.entry(fold(name)).or_default().push(ObjectSpan {
            start_line: start,
            end_line: None,
            kind,
        });
        self.check_forward_candidate(header_line, start, kind, name);
    }

    /// Walk the structural keywords of a line in textual order. One-line
    /// constructs (`IF ... END IF;` on a single line, `IS BEGIN ... END;`)
    /// fall out of the ordering for free.
    fn scan_structural_keywords(&mut self, line: &str) {
        for m in STRUCT_KEYWORD_RE.find_iter(line) {
            let kw = m.as_str().to_uppercase();

            // A keyword directly after END (`END IF`, `END LOOP`, `END
            // CASE`) belongs to that END.
            if kw != "END" && Self::preceded_by_end(line, m.start()) {
                continue;
            }

            match kw.as_str() {
                "BEGIN" => self.handle_begin(),
                "IF" => self.push_block(BlockKind::If),
                "CASE" => self.push_block(BlockKind::Case),
                "FOR" => {
                    if FOR_UPDATE_RE.is_match(line) || OPEN_FOR_RE.is_match(line) {
                        trace!(line = self.line_num, "FOR belongs to UPDATE/OPEN, ignoring");
                        continue;
                    }
                    self.push_block(BlockKind::For);
                    self.awaiting_loop_for = true;
                }
                "WHILE" => {
                    self.push_block(BlockKind::While);
                    self.awaiting_loop_while = true;
                }
                "LOOP" => {
                    if self.awaiting_loop_for {
                        self.awaiting_loop_for = false;
                        trace!(line = self.line_num, "LOOP matches pending FOR");
                    } else if self.awaiting_loop_while {
                        self.awaiting_loop_while = false;
                        trace!(line = self.line_num, "LOOP matches pending WHILE");
                    } else {
                        self.push_block(BlockKind::Loop);
                    }
                }
                "END" => self.handle_end(),
                _ => unreachable!("keyword regex emits a fixed set"),
            }
        }
    }

    fn handle_begin(&mut self) {
        match self.scope_stack.last_mut() {
            Some(scope) if !scope.has_seen_begin => {
                scope.has_seen_begin = true;
                debug!(
                    line = self.line_num,
                    scope = scope.name.as_str(),
                    "BEGIN opens scope body"
                );
                self.clear_forward_candidate("BEGIN found");
            }
            _ => self.push_block(BlockKind::Begin),
        }
    }

    fn handle_end(&mut self) {
        if let Some((start, kind)) = self.block_stack.pop() {
            if kind == BlockKind::For && self.awaiting_loop_for {
                error!(line = self.line_num, "END FOR before its LOOP");
                self.awaiting_loop_for = false;
            }
            if kind == BlockKind::While && self.awaiting_loop_while {
                error!(line = self.line_num, "END WHILE before its LOOP");
                self.awaiting_loop_while = false;
            }
            debug!(start, end = self.line_num, block = kind.as_str(), "pop block");
            return;
        }

        // No open block: this END closes a scope. A pending forward
        // declaration sitting on top of the stack is confirmed first; the
        // END then applies to the scope underneath (typically the package).
        if self
            .forward_candidate
            .as_ref()
            .zip(self.scope_stack.last())
            .is_some_and(|(cand, top)| cand.0 == top.start_line)
        {
            self.confirm_forward_declaration();
        }

        match self.scope_stack.pop() {
            Some(scope) => {
                if !scope.is_package {
                    if !scope.has_seen_begin {
                        error!(
                            line = self.line_num,
                            scope = scope.name.as_str(),
                            "END closes a scope that never saw BEGIN"
                        );
                    }
                    self.set_scope_end(&scope);
                }
                info!(
                    start = scope.start_line,
                    end = self.line_num,
                    kind = %scope.kind,
                    name = scope.name.as_str(),
                    "END of scope"
                );
            }
            None => {
                error!(line = self.line_num, "END with no open block or scope");
            }
        }
    }

    fn set_scope_end(&mut self, scope: &Scope) {
        let key = fold(&scope.name);
        let Some(entries) = self.objects.get_mut(&key) else {
            warn!(name = scope.name.as_str(), "no collected entry for ended scope");
            return;
        };
        for entry in entries.iter_mut().rev() {
            if entry.start_line == scope.start_line && entry.end_line.is_none() {
                entry.end_line = Some(self.line_num);
                return;
            }
        }
        warn!(
            name = scope.name.as_str(),
            start = scope.start_line,
            "no open entry matched ended scope"
        );
    }

    fn push_block(&mut self, kind: BlockKind) {
        debug!(line = self.line_num, block = kind.as_str(), "push block");
        self.block_stack.push((self.line_num, kind));
    }

    /// True when the text before `pos` ends with an END token.
    fn preceded_by_end(line: &str, pos: usize) -> bool {
        let before = line[..pos].trim_end();
        let bytes = before.as_bytes();
        if bytes.len() < 3 || !bytes[bytes.len() - 3..].eq_ignore_ascii_case(b"END") {
            return false;
        }
        let boundary = bytes.len() - 3;
        boundary == 0 || !before[..boundary].chars().next_back().is_some_and(is_ident_part)
    }

    /// Probe whether the scope opened at `start` looks like a forward
    /// declaration, given the text seen so far.
    fn check_forward_candidate(
        &mut self,
        processed_line: &str,
        start: usize,
        kind: ObjectKind,
        name: &str,
    ) {
        let matched = match kind {
            ObjectKind::Procedure => {
                let since_def = self.lines[start - 1..self.line_num].join("\n");
                Self::procedure_decl_shape(&since_def, name)
            }
            ObjectKind::Function => RETURN_DECL_RE
                .captures(processed_line)
                .is_some_and(|caps| !IS_AS_RE.is_match(&caps[1])),
            _ => false,
        };
        if matched {
            trace!(
                line = start,
                name,
                "forward declaration candidate selected"
            );
            self.forward_candidate = Some((start, kind, name.to_string()));
        }
    }

    /// `PROCEDURE name [ ( ... ) ] ;` with no IS/AS before the semicolon,
    /// or `PROCEDURE name [ ( ... ) ] AS LANGUAGE ... ;`.
    fn procedure_decl_shape(text: &str, name: &str) -> bool {
        let header = Regex::new(&format!(r"(?i)\bPROCEDURE\s+{}", regex::escape(name)));
        let Ok(header) = header else { return false };
        for m in header.find_iter(text) {
            let rest = &text[m.end()..];
            // The name must end here, not be a prefix of a longer one.
            if rest.chars().next().is_some_and(|c| is_ident_part(c) || c == '.') {
                continue;
            }
            let Some(semi) = rest.find(';') else { continue };
            let segment = &rest[..semi];
            if !IS_AS_RE.is_match(segment) || AS_LANGUAGE_RE.is_match(segment) {
                return true;
            }
        }
        false
    }

    fn clear_forward_candidate(&mut self, reason: &str) {
        if let Some((line, _, name)) = self.forward_candidate.take() {
            trace!(line, name = name.as_str(), reason, "forward declaration candidate dropped");
        }
    }

    /// Remove a confirmed forward declaration from both the scope stack and
    /// the collected objects.
    fn confirm_forward_declaration(&mut self) {
        let Some((start, kind, name)) = self.forward_candidate.take() else {
            return;
        };
        info!(
            start,
            confirmed_at = self.line_num,
            name = name.as_str(),
            "confirmed forward declaration, removing"
        );

        let on_top = self
            .scope_stack
            .last()
            .is_some_and(|s| s.start_line == start && s.name == name);
        if on_top {
            self.scope_stack.pop();
        } else {
            warn!(name = name.as_str(), "forward declaration not on top of scope stack");
        }

        let key = fold(&name);
        if let Some(entries) = self.objects.get_mut(&key) {
            if let Some(pos) = entries
                .iter()
                .rposition(|e| e.start_line == start && e.kind == kind)
            {
                entries.remove(pos);
            }
            if entries.is_empty() {
                self.objects.remove(&key);
            }
        }
    }

    /// Defensive comment/string handling. Cleaner output normally contains
    /// neither, but the scanner survives raw input. Returns `None` when the
    /// whole line is swallowed by a block comment.
    fn strip_comments_and_strings(&mut self, raw: &str) -> Option<String> {
        let mut line = raw.to_string();

        if self.in_block_comment {
            match line.find("*/") {
                Some(pos) => {
                    self.in_block_comment = false;
                    line = line[pos + 2..].to_string();
                }
                None => return None,
            }
        }
        while let Some(pos) = line.find("/*") {
            match line[pos + 2..].find("*/") {
                Some(end) => {
                    let after = line[pos + 2 + end + 2..].to_string();
                    line.truncate(pos);
                    line.push_str(&after);
                }
                None => {
                    self.in_block_comment = true;
                    line.truncate(pos);
                    break;
                }
            }
        }

        let mut out = String::with_capacity(line.len());
        let chars: Vec<char> = line.chars().collect();
        let mut idx = 0;
        while idx < chars.len() {
            let c = chars[idx];
            let next = chars.get(idx + 1).copied();
            if self.in_quote {
                if c == '\'' && next == Some('\'') {
                    idx += 2;
                    continue;
                }
                if c == '\'' {
                    out.push(c);
                    self.in_quote = false;
                }
            } else if c == '\'' {
                out.push(c);
                self.in_quote = true;
            } else if c == '-' && next == Some('-') {
                break;
            } else {
                out.push(c);
            }
            idx += 1;
        }
        Some(out)
    }

    fn finish(mut self) -> StructuralOutcome {
        if self.in_block_comment {
            error!("file ended inside a block comment");
        }
        if self.in_quote {
            error!("file ended inside a string literal");
        }
        if !self.block_stack.is_empty() {
            error!(open = self.block_stack.len(), "file ended with unclosed blocks");
        }
        if self.awaiting_loop_for {
            error!("file ended while awaiting LOOP for a FOR");
        }
        if self.awaiting_loop_while {
            error!("file ended while awaiting LOOP for a WHILE");
        }

        // A forward declaration pending at EOF (package never closed) is
        // still elided.
        if self.forward_candidate.is_some() {
            self.confirm_forward_declaration();
        }

        let open_scopes: Vec<&Scope> =
            self.scope_stack.iter().filter(|s| !s.is_package).collect();
        if !open_scopes.is_empty() {
            error!(open = open_scopes.len(), "file ended with unclosed scopes");
        } else if !self.scope_stack.is_empty() {
            info!(
                package = self.scope_stack[0].name.as_str(),
                "package scope implicitly closed by end of file"
            );
        }

        StructuralOutcome {
            package_name: self.package_name,
            objects: self.objects,
        }
    }
}
