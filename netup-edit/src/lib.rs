//! Surgical text edits for netup.
//!
//! Responsibilities:
//! - Apply non-overlapping, position-addressed edits to an in-memory line
//!   buffer without disturbing anything else on the line.
//! - Read/write files while preserving the original encoding (BOM included)
//!   and newline convention, so a rewritten file differs only where an edit
//!   landed.
//!
//! Every file mutation in the workspace goes through this crate; steps never
//! write file contents directly.

mod snapshot;

pub use snapshot::{Encoding, FileSnapshot, Newline, SnapshotError, read_lines, write_lines};

/// A single replacement inside one line.
///
/// Columns are byte offsets into the line (lines never contain a terminator).
/// `start_col == end_col` inserts without removing anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEdit {
    /// Zero-based line index.
    pub line: usize,
    pub start_col: usize,
    pub end_col: usize,
    pub replacement: String,
}

impl TextEdit {
    pub fn new(line: usize, start_col: usize, end_col: usize, replacement: impl Into<String>) -> Self {
        Self {
            line,
            start_col,
            end_col,
            replacement: replacement.into(),
        }
    }
}

/// Apply `edits` to `lines` in place. Returns whether anything changed.
///
/// Same-line edits must be non-overlapping once sorted by start column
/// (`end[i] <= start[i+1]`). An overlap is a bug in the caller, not a
/// runtime condition, and panics.
pub fn apply_edits(lines: &mut [String], edits: &[TextEdit]) -> bool {
    if edits.is_empty() {
        return false;
    }

    let mut by_line: Vec<(usize, Vec<&TextEdit>)> = Vec::new();
    for edit in edits {
        assert!(
            edit.line < lines.len(),
            "edit targets line {} but buffer has {} lines",
            edit.line,
            lines.len()
        );
        match by_line.iter_mut().find(|(l, _)| *l == edit.line) {
            Some((_, v)) => v.push(edit),
            None => by_line.push((edit.line, vec![edit])),
        }
    }

    let mut changed = false;
    for (line_idx, mut line_edits) in by_line {
        line_edits.sort_by_key(|e| e.start_col);

        let original = &lines[line_idx];
        let mut rebuilt = String::with_capacity(original.len());
        let mut cursor = 0usize;

        for edit in line_edits {
            assert!(
                edit.start_col <= edit.end_col,
                "edit has start_col {} past end_col {} on line {line_idx}",
                edit.start_col,
                edit.end_col
            );
            assert!(
                edit.start_col >= cursor,
                "overlapping edits on line {line_idx}: next starts at {} but cursor is at {cursor}",
                edit.start_col
            );
            assert!(
                edit.end_col <= original.len(),
                "edit ends at {} past line length {} on line {line_idx}",
                edit.end_col,
                original.len()
            );

            rebuilt.push_str(&original[cursor..edit.start_col]);
            rebuilt.push_str(&edit.replacement);
            cursor = edit.end_col;
        }
        rebuilt.push_str(&original[cursor..]);

        if rebuilt != *original {
            lines[line_idx] = rebuilt;
            changed = true;
        }
    }

    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lines(src: &[&str]) -> Vec<String> {
        src.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn zero_edits_leaves_lines_untouched() {
        let mut buf = lines(&["alpha", "beta"]);
        let before = buf.clone();
        assert!(!apply_edits(&mut buf, &[]));
        assert_eq!(buf, before);
    }

    #[test]
    fn single_edit_replaces_span() {
        let mut buf = lines(&["FROM sdk:6.0 AS build"]);
        let changed = apply_edits(&mut buf, &[TextEdit::new(0, 9, 12, "8.0")]);
        assert!(changed);
        assert_eq!(buf[0], "FROM sdk:8.0 AS build");
    }

    #[test]
    fn multiple_edits_on_one_line_match_manual_splice() {
        let original = "net6.0 plus net7.0 and done";
        let mut buf = lines(&[original]);
        let edits = [
            TextEdit::new(0, 0, 6, "net8.0"),
            TextEdit::new(0, 12, 18, "net8.0"),
        ];
        assert!(apply_edits(&mut buf, &edits));

        // Manual splice-by-splice reconstruction.
        let manual = format!(
            "{}{}{}{}{}",
            "",
            "net8.0",
            &original[6..12],
            "net8.0",
            &original[18..]
        );
        assert_eq!(buf[0], manual);
    }

    #[test]
    fn edits_out_of_order_are_sorted_before_applying() {
        let mut buf = lines(&["aa bb cc"]);
        let edits = [TextEdit::new(0, 6, 8, "C"), TextEdit::new(0, 0, 2, "A")];
        assert!(apply_edits(&mut buf, &edits));
        assert_eq!(buf[0], "A bb C");
    }

    #[test]
    fn untouched_lines_stay_byte_identical() {
        let mut buf = lines(&["one", "two\t trailing  ", "three"]);
        assert!(apply_edits(&mut buf, &[TextEdit::new(0, 0, 3, "ONE")]));
        assert_eq!(buf[1], "two\t trailing  ");
        assert_eq!(buf[2], "three");
    }

    #[test]
    fn identity_replacement_reports_unchanged() {
        let mut buf = lines(&["net8.0"]);
        assert!(!apply_edits(&mut buf, &[TextEdit::new(0, 0, 6, "net8.0")]));
    }

    #[test]
    fn insertion_at_equal_columns() {
        let mut buf = lines(&["ab"]);
        assert!(apply_edits(&mut buf, &[TextEdit::new(0, 1, 1, "-")]));
        assert_eq!(buf[0], "a-b");
    }

    #[test]
    #[should_panic(expected = "overlapping edits")]
    fn overlapping_edits_panic() {
        let mut buf = lines(&["abcdef"]);
        let edits = [TextEdit::new(0, 0, 4, "x"), TextEdit::new(0, 2, 6, "y")];
        apply_edits(&mut buf, &edits);
    }
}
