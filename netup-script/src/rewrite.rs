//! Emits text edits for rewritable literals in a parsed script.
//!
//! A literal qualifies when the version-tag algebra or the portability graph
//! reports an actual change for its value; everything else is left alone.
//! Replacements are re-wrapped in the literal's original quote style.

use crate::parser::{QuoteStyle, ScriptTree, Span, Word, WordPart};
use netup_edit::TextEdit;
use netup_rid::PortabilityGraph;
use netup_types::Channel;
use tracing::trace;

/// Collect edits for every rewritable literal in `tree`.
///
/// Inspected sites: command invocation operands, simple assignment
/// right-hand sides, and `${VAR:-default}` / `${VAR:=default}` operands.
pub fn collect_edits(
    tree: &ScriptTree,
    target: Channel,
    rids: &PortabilityGraph,
) -> Vec<TextEdit> {
    let mut edits = Vec::new();

    for stmt in &tree.statements {
        for assignment in &stmt.assignments {
            visit_word(&assignment.value, target, rids, &mut edits);
        }
        for word in &stmt.words {
            visit_word(word, target, rids, &mut edits);
        }
    }

    edits
}

fn visit_word(word: &Word, target: Channel, rids: &PortabilityGraph, edits: &mut Vec<TextEdit>) {
    // Every literal segment is a candidate, so a quoted tag list glued to a
    // bare `/p:Name=` prefix still rewrites; parameter defaults are
    // inspected wherever they appear.
    for part in &word.parts {
        match part {
            WordPart::Literal { value, quote, span } => {
                push_if_changed(value, *quote, *span, target, rids, edits);
            }
            WordPart::Expansion {
                default: Some(default),
                ..
            } => {
                push_if_changed(
                    &default.value,
                    default.quote,
                    default.span,
                    target,
                    rids,
                    edits,
                );
            }
            _ => {}
        }
    }
}

fn push_if_changed(
    value: &str,
    quote: QuoteStyle,
    span: Span,
    target: Channel,
    rids: &PortabilityGraph,
    edits: &mut Vec<TextEdit>,
) {
    let Some(replacement) = rewritten_value(value, target, rids) else {
        return;
    };
    trace!(value, %replacement, "literal rewrite");
    edits.push(TextEdit {
        line: span.line,
        start_col: span.start_col,
        end_col: span.end_col,
        replacement: quote.wrap(&replacement),
    });
}

/// The new spelling for a literal, or `None` when nothing should change.
fn rewritten_value(value: &str, target: Channel, rids: &PortabilityGraph) -> Option<String> {
    if let Ok(upgraded) = netup_tfm::try_upgrade(value, target) {
        return upgraded.changed.then_some(upgraded.value);
    }
    if let Some(equivalent) = rids.portable_equivalent(value)
        && equivalent != value
    {
        return Some(equivalent.to_string());
    }
    None
}
