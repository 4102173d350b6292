//! Embedded-script discovery and rewriting.
//!
//! Three stages, kept separate so each is testable in isolation:
//! 1. [`locator`] finds script fragments embedded in a host document
//!    (CI workflow files) and records where they live.
//! 2. [`parser`] parses a fragment as a standalone shell script into a
//!    small syntax tree with per-token positions and quote styles.
//! 3. [`rewrite`] walks the tree and emits [`netup_edit::TextEdit`]s for
//!    literal tokens the version algebra or the portability graph wants to
//!    change.
//!
//! Fragment-local edit coordinates are translated back into host-file
//! coordinates through the enclosing [`EmbeddedDocument`].

pub mod locator;
pub mod parser;
pub mod rewrite;

pub use locator::locate_workflow_scripts;
pub use parser::{ScriptTree, parse, parse_lenient};
pub use rewrite::collect_edits;

use netup_edit::TextEdit;

/// A sub-document discovered inside a host file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedDocument {
    /// Host line of the fragment's first line (zero-based).
    pub line_offset: usize,
    /// Byte column every fragment line is shifted right by in the host
    /// (the block-scalar indent, or the inline scalar's start column).
    pub column_offset: usize,
    /// Byte range of the fragment within the host document.
    pub byte_range: std::ops::Range<usize>,
    /// Fragment text with the host indent stripped.
    pub text: String,
}

impl EmbeddedDocument {
    /// Translate a fragment-local edit into host coordinates.
    pub fn to_host_edit(&self, edit: &TextEdit) -> TextEdit {
        TextEdit {
            line: edit.line + self.line_offset,
            start_col: edit.start_col + self.column_offset,
            end_col: edit.end_col + self.column_offset,
            replacement: edit.replacement.clone(),
        }
    }
}

/// A parse problem, positioned within the fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDiagnostic {
    pub line: usize,
    pub col: usize,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("script failed to parse: {}", first_message(diagnostics))]
    Parse { diagnostics: Vec<ParseDiagnostic> },
}

fn first_message(diagnostics: &[ParseDiagnostic]) -> String {
    diagnostics
        .first()
        .map(|d| format!("{} at {}:{}", d.message, d.line + 1, d.col + 1))
        .unwrap_or_else(|| "unknown error".to_string())
}
