//! Finds script fragments embedded in CI workflow documents.
//!
//! The locator understands the workflow shape of `steps:` sequences whose
//! items optionally declare a `shell:` and carry a `run:` body, either as an
//! inline scalar or as a block scalar (`|` / `>`, with chomping/indentation
//! indicators). Only steps whose shell is absent or in the recognized set
//! are considered. Scanning is line-oriented so every fragment keeps exact
//! host coordinates; `serde_yaml` is used up front as a shape gate so
//! non-YAML files are skipped rather than mis-scanned.

use crate::EmbeddedDocument;
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

const RECOGNIZED_SHELLS: &[&str] = &["bash", "sh"];

fn key_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([A-Za-z_][A-Za-z0-9_.-]*):(?:[ \t]+(.*))?$").expect("key regex")
    })
}

fn block_indicator_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[|>][0-9]?[+-]?$").expect("block indicator regex"))
}

struct Line<'a> {
    /// Byte offset of the line start within the host.
    offset: usize,
    /// Content without the line terminator.
    content: &'a str,
}

fn split_lines(host: &str) -> Vec<Line<'_>> {
    let mut lines = Vec::new();
    let mut offset = 0usize;
    for piece in host.split_inclusive('\n') {
        let content = piece
            .strip_suffix('\n')
            .map(|c| c.strip_suffix('\r').unwrap_or(c))
            .unwrap_or(piece);
        lines.push(Line { offset, content });
        offset += piece.len();
    }
    lines
}

fn indent_of(content: &str) -> usize {
    content.len() - content.trim_start_matches(' ').len()
}

fn is_blank_or_comment(content: &str) -> bool {
    let trimmed = content.trim_start();
    trimmed.is_empty() || trimmed.starts_with('#')
}

/// Locate every rewritable script body in a workflow document.
///
/// Returns an empty list when the host is not YAML-shaped at all; a file
/// that fails to parse is skipped, never an error.
pub fn locate_workflow_scripts(host: &str) -> Vec<EmbeddedDocument> {
    match serde_yaml::from_str::<serde_yaml::Value>(host) {
        Ok(serde_yaml::Value::Mapping(_)) => {}
        Ok(_) | Err(_) => {
            debug!("host document is not a YAML mapping; no scripts located");
            return Vec::new();
        }
    }

    let lines = split_lines(host);
    let mut docs = Vec::new();
    // Mapping-key stack used to tell `steps:` items from other sequences.
    let mut stack: Vec<(usize, String)> = Vec::new();

    let mut i = 0usize;
    while i < lines.len() {
        let content = lines[i].content;
        if is_blank_or_comment(content) {
            i += 1;
            continue;
        }
        let indent = indent_of(content);
        let trimmed = &content[indent..];

        if trimmed == "-" || trimmed.starts_with("- ") {
            let in_steps = stack
                .iter()
                .rev()
                .find(|(ki, _)| *ki <= indent)
                .is_some_and(|(_, key)| key == "steps");
            if in_steps {
                i = scan_step_item(&lines, i, indent, &mut docs);
                continue;
            }
            i += 1;
            continue;
        }

        if let Some(caps) = key_re().captures(trimmed) {
            stack.retain(|(ki, _)| *ki < indent);
            stack.push((indent, caps[1].to_string()));
        }
        i += 1;
    }

    docs
}

struct RunBody {
    line_offset: usize,
    column_offset: usize,
    byte_range: std::ops::Range<usize>,
    text: String,
}

/// Scan one `- ...` step item starting at `start`; returns the index of the
/// first line past the item.
fn scan_step_item(
    lines: &[Line<'_>],
    start: usize,
    dash_indent: usize,
    docs: &mut Vec<EmbeddedDocument>,
) -> usize {
    let mut shell: Option<String> = None;
    let mut run: Option<RunBody> = None;
    let mut key_indent: Option<usize> = None;

    let mut i = start;
    while i < lines.len() {
        let content = lines[i].content;
        if is_blank_or_comment(content) {
            i += 1;
            continue;
        }
        let indent = indent_of(content);

        // Item boundary: a dedent, or the next sequence item.
        if i > start {
            let trimmed = &content[indent..];
            let next_item = indent == dash_indent && (trimmed == "-" || trimmed.starts_with("- "));
            if indent <= dash_indent && (next_item || indent < dash_indent || key_re().is_match(trimmed))
            {
                break;
            }
        }

        // Virtual key position: on the dash line keys sit past the dash.
        let (key_col, key_text) = if i == start {
            let past_dash = &content[dash_indent + 1..];
            let extra = past_dash.len() - past_dash.trim_start_matches(' ').len();
            let col = dash_indent + 1 + extra;
            (col, &content[col..])
        } else {
            (indent, &content[indent..])
        };

        if let Some(caps) = key_re().captures(key_text)
            && key_col == *key_indent.get_or_insert(key_col)
        {
            let key = &caps[1];
            // Untrimmed: the inline-run column math needs the capture to
            // run exactly to the end of the line.
            let value = caps.get(2).map(|m| m.as_str());
            match key {
                "shell" => {
                    shell = value.map(unquote);
                }
                "run" if run.is_none() => {
                    let (body, next) = scan_run_value(lines, i, key_col, value);
                    run = body;
                    i = next;
                    continue;
                }
                _ => {}
            }
        }
        i += 1;
    }

    let shell_ok = match shell.as_deref() {
        None => true,
        Some(declared) => {
            let program = declared.split_whitespace().next().unwrap_or("");
            RECOGNIZED_SHELLS.contains(&program)
        }
    };
    if shell_ok && let Some(body) = run {
        docs.push(EmbeddedDocument {
            line_offset: body.line_offset,
            column_offset: body.column_offset,
            byte_range: body.byte_range,
            text: body.text,
        });
    }

    i
}

/// Interpret a `run:` value starting on line `i`; returns the body (if
/// usable) and the first line index past it.
fn scan_run_value(
    lines: &[Line<'_>],
    i: usize,
    key_col: usize,
    value: Option<&str>,
) -> (Option<RunBody>, usize) {
    match value {
        Some(v) if block_indicator_re().is_match(v.trim_end()) => {
            scan_block_scalar(lines, i, key_col)
        }
        Some(v) if !v.trim_end().is_empty() => {
            // Quoted inline scalars would need YAML re-escaping; leave them.
            if v.starts_with('"') || v.starts_with('\'') {
                return (None, i + 1);
            }
            let line = &lines[i];
            let col = line.content.len() - v.len();
            let body = RunBody {
                line_offset: i,
                column_offset: col,
                byte_range: line.offset + col..line.offset + line.content.len(),
                text: format!("{v}\n"),
            };
            (Some(body), i + 1)
        }
        _ => (None, i + 1),
    }
}

fn scan_block_scalar(
    lines: &[Line<'_>],
    run_line: usize,
    key_col: usize,
) -> (Option<RunBody>, usize) {
    // Body: subsequent lines indented past the key, blanks allowed.
    let mut body_end = run_line + 1;
    let mut first_body: Option<usize> = None;
    let mut j = run_line + 1;
    while j < lines.len() {
        let content = lines[j].content;
        if content.trim().is_empty() {
            j += 1;
            continue;
        }
        if indent_of(content) <= key_col {
            break;
        }
        if first_body.is_none() {
            first_body = Some(j);
        }
        body_end = j + 1;
        j += 1;
    }

    let Some(first) = first_body else {
        return (None, run_line + 1);
    };
    let common_indent = indent_of(lines[first].content);

    let mut text = String::new();
    for line in &lines[first..body_end] {
        if line.content.len() > common_indent {
            text.push_str(&line.content[common_indent..]);
        }
        text.push('\n');
    }

    let last = &lines[body_end - 1];
    let body = RunBody {
        line_offset: first,
        column_offset: common_indent,
        byte_range: lines[first].offset + common_indent..last.offset + last.content.len(),
        text,
    };
    (Some(body), body_end)
}

fn unquote(value: &str) -> String {
    let v = value.trim();
    for q in ['"', '\''] {
        if let Some(inner) = v.strip_prefix(q).and_then(|r| r.strip_suffix(q)) {
            return inner.to_string();
        }
    }
    v.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const WORKFLOW: &str = "\
name: ci
on: push
jobs:
  build:
    runs-on: ubuntu-latest
    steps:
      - uses: actions/checkout@v4
      - name: Build
        run: dotnet build -f net6.0
      - name: Publish
        shell: bash
        run: |
          dotnet publish \\
            -r ubuntu.22.04-x64
      - name: Windows only
        shell: pwsh
        run: dotnet test
";

    #[test]
    fn finds_inline_and_block_scripts_and_skips_unrecognized_shells() {
        let docs = locate_workflow_scripts(WORKFLOW);
        assert_eq!(docs.len(), 2);

        let inline = &docs[0];
        assert_eq!(inline.text, "dotnet build -f net6.0\n");
        assert_eq!(inline.line_offset, 8);
        assert_eq!(inline.column_offset, 13);

        let block = &docs[1];
        assert_eq!(block.text, "dotnet publish \\\n  -r ubuntu.22.04-x64\n");
        assert_eq!(block.line_offset, 12);
        assert_eq!(block.column_offset, 10);
    }

    #[test]
    fn byte_ranges_point_at_the_script_text() {
        let docs = locate_workflow_scripts(WORKFLOW);
        let inline = &docs[0];
        assert_eq!(
            &WORKFLOW[inline.byte_range.clone()],
            "dotnet build -f net6.0"
        );
        let block = &docs[1];
        assert_eq!(
            &WORKFLOW[block.byte_range.clone()],
            "dotnet publish \\\n            -r ubuntu.22.04-x64"
        );
    }

    #[test]
    fn block_scalar_indicators_are_advanced_past() {
        let host = "\
steps:
  - run: |-
      echo one
  - run: >+
      echo two
";
        let docs = locate_workflow_scripts(host);
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].text, "echo one\n");
        assert_eq!(docs[1].text, "echo two\n");
    }

    #[test]
    fn sequences_outside_steps_are_ignored() {
        let host = "\
jobs:
  build:
    strategy:
      matrix:
        tfm:
          - net6.0
    steps:
      - run: echo hi
";
        let docs = locate_workflow_scripts(host);
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].text, "echo hi\n");
    }

    #[test]
    fn shell_declared_after_run_still_gates_the_step() {
        let host = "\
steps:
  - run: echo hi
    shell: pwsh
";
        assert!(locate_workflow_scripts(host).is_empty());
    }

    #[test]
    fn sh_shell_is_recognized_with_arguments() {
        let host = "\
steps:
  - shell: bash -e {0}
    run: echo hi
";
        assert_eq!(locate_workflow_scripts(host).len(), 1);
    }

    #[test]
    fn non_yaml_hosts_are_skipped() {
        assert!(locate_workflow_scripts("#!/bin/sh\necho hi\n").is_empty());
        assert!(locate_workflow_scripts("just scalar text").is_empty());
    }

    #[test]
    fn blank_lines_inside_block_bodies_are_preserved() {
        let host = "\
steps:
  - run: |
      echo one

      echo two
";
        let docs = locate_workflow_scripts(host);
        assert_eq!(docs[0].text, "echo one\n\necho two\n");
    }
}
