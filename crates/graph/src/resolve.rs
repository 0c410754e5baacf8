//! Overload resolution
//!
//! Matches one call site against a set of candidate signatures. A
//! candidate survives when every named argument hits a formal, positional
//! arguments fit into the formals left unsupplied, and every remaining
//! formal has a default. Exactly one survivor wins; none or several is a
//! failed resolution and the caller records the call as out of scope.
//! Parameter types are never consulted.

use oradep_core::ident::fold;
use oradep_core::{CallSite, CodeObject};
use tracing::{debug, trace, warn};

/// Pick the unique candidate whose signature accepts `call`'s arguments.
///
/// Returns `None` when no candidate matches or more than one does
/// (ambiguity is not tie-broken).
pub fn resolve_overloaded_call<'a>(
    candidates: &[&'a CodeObject],
    call: &CallSite,
) -> Option<&'a CodeObject> {
    trace!(
        call = call.call_name.as_str(),
        positional = call.positional.len(),
        named = call.named.len(),
        candidates = candidates.len(),
        "resolving overloaded call"
    );

    let mut matching: Vec<&CodeObject> = Vec::new();
    for candidate in candidates {
        if accepts(candidate, call) {
            debug!(
                call = call.call_name.as_str(),
                candidate = candidate.id.as_str(),
                "candidate accepts call"
            );
            matching.push(candidate);
        }
    }

    match matching.as_slice() {
        [] => {
            warn!(
                call = call.call_name.as_str(),
                "no overload candidate matches the call"
            );
            None
        }
        [winner] => {
            debug!(
                call = call.call_name.as_str(),
                resolved = winner.id.as_str(),
                "overload resolved"
            );
            Some(*winner)
        }
        several => {
            // Ambiguity stays ambiguous; no fewer-defaults preference.
            warn!(
                call = call.call_name.as_str(),
                matches = several.len(),
                "overload call is ambiguous"
            );
            None
        }
    }
}

fn accepts(candidate: &CodeObject, call: &CallSite) -> bool {
    let formals = &candidate.parameters;
    let mut supplied = vec![false; formals.len()];

    // Named pass: every named argument must name a formal, each at most
    // once.
    for arg_name in call.named.keys() {
        let folded = fold(arg_name);
        let Some(pos) = formals.iter().position(|p| fold(&p.name) == folded) else {
            trace!(
                candidate = candidate.id.as_str(),
                arg = arg_name.as_str(),
                "named argument has no matching formal"
            );
            return false;
        };
        if supplied[pos] {
            trace!(
                candidate = candidate.id.as_str(),
                arg = arg_name.as_str(),
                "formal supplied twice by name"
            );
            return false;
        }
        supplied[pos] = true;
    }

    // Positional pass: left to right into the formals still unsupplied,
    // in declaration order.
    let mut cursor = 0;
    for _ in &call.positional {
        while cursor < supplied.len() && supplied[cursor] {
            cursor += 1;
        }
        if cursor >= supplied.len() {
            trace!(candidate = candidate.id.as_str(), "too many positional arguments");
            return false;
        }
        supplied[cursor] = true;
        cursor += 1;
    }

    // Default pass: whatever was not supplied needs a default.
    for (formal, was_supplied) in formals.iter().zip(&supplied) {
        if !was_supplied && formal.default.is_none() {
            trace!(
                candidate = candidate.id.as_str(),
                formal = formal.name.as_str(),
                "unsupplied formal has no default"
            );
            return false;
        }
    }
    true
}
