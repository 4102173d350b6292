//! Minimal POSIX-shell parser.
//!
//! The tree only models what the rewriter consumes: command invocations,
//! leading simple assignments, and `${VAR:-default}` / `${VAR:=default}`
//! parameter defaults, with byte-accurate spans and quote styles for literal
//! tokens. Control flow keywords, redirections and substitutions are walked
//! over, not modeled; their words simply never qualify as rewritable
//! literals.

use crate::{ParseDiagnostic, ScriptError};

/// Byte-addressed location of a token within the fragment.
///
/// Spans never cross a line; a literal that does is demoted to an opaque
/// part and is not rewritable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub line: usize,
    pub start_col: usize,
    pub end_col: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteStyle {
    Bare,
    Single,
    Double,
}

impl QuoteStyle {
    /// Re-wrap a replacement value in this literal's original quoting.
    pub fn wrap(self, value: &str) -> String {
        match self {
            QuoteStyle::Bare => value.to_string(),
            QuoteStyle::Single => format!("'{value}'"),
            QuoteStyle::Double => format!("\"{value}\""),
        }
    }
}

/// A pure-literal default inside a parameter expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultValue {
    pub value: String,
    pub quote: QuoteStyle,
    /// Covers the default text including its quotes, if any.
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WordPart {
    /// A literal run with no expansions or escapes; `span` covers the raw
    /// text including quotes.
    Literal {
        value: String,
        quote: QuoteStyle,
        span: Span,
    },
    /// `$NAME` or `${NAME...}`; `default` is set only for `:-`/`:=` (and
    /// their no-colon forms) with a pure-literal operand.
    Expansion {
        name: String,
        default: Option<DefaultValue>,
    },
    /// Anything the rewriter must step over: substitutions, escapes,
    /// multi-line literals, template expressions.
    Opaque,
}

/// One whitespace-delimited word, possibly concatenated from several parts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Word {
    pub parts: Vec<WordPart>,
}

impl Word {
    /// The word's single literal part, when the whole word is one literal.
    pub fn as_literal(&self) -> Option<(&str, QuoteStyle, Span)> {
        match self.parts.as_slice() {
            [WordPart::Literal { value, quote, span }] => Some((value, *quote, *span)),
            _ => None,
        }
    }
}

/// A leading `NAME=value` assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub name: String,
    pub value: Word,
}

/// One pipeline-free statement: optional leading assignments, then words.
/// A bare assignment statement has no words.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Statement {
    pub assignments: Vec<Assignment>,
    pub words: Vec<Word>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScriptTree {
    pub statements: Vec<Statement>,
    pub diagnostics: Vec<ParseDiagnostic>,
}

/// Strict parse; any diagnostic fails the whole fragment.
pub fn parse(text: &str) -> Result<ScriptTree, ScriptError> {
    let tree = parse_internal(text);
    if tree.diagnostics.is_empty() {
        Ok(tree)
    } else {
        Err(ScriptError::Parse {
            diagnostics: tree.diagnostics,
        })
    }
}

/// Best-effort parse for fragments that cannot be guaranteed complete in
/// isolation (templated CI scripts). Problems are recorded, not fatal.
pub fn parse_lenient(text: &str) -> ScriptTree {
    parse_internal(text)
}

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
    col: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            line: 0,
            col: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn at(&self, s: &str) -> bool {
        self.src[self.pos..].starts_with(s)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.col = 0;
        } else {
            self.col += c.len_utf8();
        }
        Some(c)
    }

    fn bump_n(&mut self, n: usize) {
        for _ in 0..n {
            self.bump();
        }
    }
}

fn is_word_delimiter(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | ';' | '&' | '|' | '<' | '>' | '(' | ')')
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn parse_internal(text: &str) -> ScriptTree {
    let mut cur = Cursor::new(text);
    let mut tree = ScriptTree::default();
    let mut stmt = Statement::default();
    let mut at_command_position = true;

    loop {
        // Inter-word whitespace and line continuations.
        loop {
            match cur.peek() {
                Some(' ') | Some('\t') => {
                    cur.bump();
                }
                Some('\\') if cur.at("\\\n") => {
                    cur.bump_n(2);
                }
                _ => break,
            }
        }

        match cur.peek() {
            None => {
                flush(&mut tree, &mut stmt);
                break;
            }
            Some('\n') | Some(';') | Some('&') | Some('|') | Some('(') | Some(')') => {
                cur.bump();
                flush(&mut tree, &mut stmt);
                at_command_position = true;
            }
            Some('<') | Some('>') => {
                // Redirection operator; the filename that follows is lexed
                // as an ordinary word and never matches a rewrite pattern.
                cur.bump();
            }
            Some('#') => {
                while let Some(c) = cur.peek() {
                    if c == '\n' {
                        break;
                    }
                    cur.bump();
                }
            }
            Some(_) => {
                if at_command_position
                    && let Some(name) = scan_assignment_name(&cur)
                {
                    cur.bump_n(name.chars().count() + 1);
                    let value = lex_word(&mut cur, &mut tree.diagnostics);
                    stmt.assignments.push(Assignment { name, value });
                } else {
                    let word = lex_word(&mut cur, &mut tree.diagnostics);
                    if !word.parts.is_empty() {
                        stmt.words.push(word);
                        at_command_position = false;
                    }
                }
            }
        }
    }

    tree
}

fn flush(tree: &mut ScriptTree, stmt: &mut Statement) {
    if !stmt.assignments.is_empty() || !stmt.words.is_empty() {
        tree.statements.push(std::mem::take(stmt));
    }
}

/// `NAME=` lookahead at the cursor, without consuming.
fn scan_assignment_name(cur: &Cursor<'_>) -> Option<String> {
    let rest = &cur.src[cur.pos..];
    let mut chars = rest.chars();
    let first = chars.next()?;
    if !is_ident_start(first) {
        return None;
    }
    let mut name = String::new();
    name.push(first);
    for c in chars {
        if c == '=' {
            return Some(name);
        }
        if !is_ident_continue(c) {
            return None;
        }
        name.push(c);
    }
    None
}

fn lex_word(cur: &mut Cursor<'_>, diagnostics: &mut Vec<ParseDiagnostic>) -> Word {
    let mut word = Word::default();
    let mut bare = String::new();
    let mut bare_span: Option<Span> = None;

    macro_rules! flush_bare {
        () => {
            if let Some(span) = bare_span.take() {
                word.parts.push(WordPart::Literal {
                    value: std::mem::take(&mut bare),
                    quote: QuoteStyle::Bare,
                    span,
                });
            }
        };
    }

    while let Some(c) = cur.peek() {
        if is_word_delimiter(c) {
            break;
        }
        match c {
            '\'' => {
                flush_bare!();
                word.parts.push(lex_single_quoted(cur, diagnostics));
            }
            '"' => {
                flush_bare!();
                word.parts.push(lex_double_quoted(cur, diagnostics));
            }
            '$' => {
                flush_bare!();
                word.parts.push(lex_dollar(cur, diagnostics));
            }
            '`' => {
                flush_bare!();
                word.parts.push(lex_backtick(cur, diagnostics));
            }
            '\\' => {
                if cur.at("\\\n") {
                    break;
                }
                // Escaped character: keep walking, but the word segment is
                // no longer a clean literal we can requote.
                flush_bare!();
                cur.bump();
                cur.bump();
                word.parts.push(WordPart::Opaque);
            }
            _ => {
                if bare_span.is_none() {
                    bare_span = Some(Span {
                        line: cur.line,
                        start_col: cur.col,
                        end_col: cur.col,
                    });
                }
                bare.push(c);
                cur.bump();
                if let Some(span) = bare_span.as_mut() {
                    span.end_col = cur.col;
                }
            }
        }
    }

    flush_bare!();
    word
}

fn lex_single_quoted(cur: &mut Cursor<'_>, diagnostics: &mut Vec<ParseDiagnostic>) -> WordPart {
    let start_line = cur.line;
    let start_col = cur.col;
    cur.bump(); // opening quote

    let mut value = String::new();
    loop {
        match cur.peek() {
            None => {
                diagnostics.push(ParseDiagnostic {
                    line: start_line,
                    col: start_col,
                    message: "unterminated single-quoted string".to_string(),
                });
                return WordPart::Opaque;
            }
            Some('\'') => {
                cur.bump();
                break;
            }
            Some(c) => {
                value.push(c);
                cur.bump();
            }
        }
    }

    if cur.line != start_line {
        return WordPart::Opaque;
    }
    WordPart::Literal {
        value,
        quote: QuoteStyle::Single,
        span: Span {
            line: start_line,
            start_col,
            end_col: cur.col,
        },
    }
}

fn lex_double_quoted(cur: &mut Cursor<'_>, diagnostics: &mut Vec<ParseDiagnostic>) -> WordPart {
    let start_line = cur.line;
    let start_col = cur.col;
    cur.bump();

    let mut value = String::new();
    let mut pure = true;
    loop {
        match cur.peek() {
            None => {
                diagnostics.push(ParseDiagnostic {
                    line: start_line,
                    col: start_col,
                    message: "unterminated double-quoted string".to_string(),
                });
                return WordPart::Opaque;
            }
            Some('"') => {
                cur.bump();
                break;
            }
            Some('\\') => {
                cur.bump();
                if let Some(escaped) = cur.bump() {
                    value.push(escaped);
                }
                pure = false;
            }
            Some('$') | Some('`') => {
                pure = false;
                value.push(cur.bump().expect("peeked"));
            }
            Some(c) => {
                value.push(c);
                cur.bump();
            }
        }
    }

    if !pure || cur.line != start_line {
        return WordPart::Opaque;
    }
    WordPart::Literal {
        value,
        quote: QuoteStyle::Double,
        span: Span {
            line: start_line,
            start_col,
            end_col: cur.col,
        },
    }
}

fn lex_backtick(cur: &mut Cursor<'_>, diagnostics: &mut Vec<ParseDiagnostic>) -> WordPart {
    let start_line = cur.line;
    let start_col = cur.col;
    cur.bump();
    loop {
        match cur.peek() {
            None => {
                diagnostics.push(ParseDiagnostic {
                    line: start_line,
                    col: start_col,
                    message: "unterminated command substitution".to_string(),
                });
                return WordPart::Opaque;
            }
            Some('`') => {
                cur.bump();
                return WordPart::Opaque;
            }
            Some(_) => {
                cur.bump();
            }
        }
    }
}

fn lex_dollar(cur: &mut Cursor<'_>, diagnostics: &mut Vec<ParseDiagnostic>) -> WordPart {
    let start_line = cur.line;
    let start_col = cur.col;

    if cur.at("$((") {
        cur.bump_n(3);
        return scan_until(cur, "))", start_line, start_col, diagnostics, "arithmetic expansion");
    }
    if cur.at("$(") {
        cur.bump_n(2);
        return scan_balanced_parens(cur, start_line, start_col, diagnostics);
    }
    if cur.at("${{") {
        // Workflow template expression; not shell. The lenient path walks
        // over it, the strict path reports it.
        cur.bump_n(3);
        diagnostics.push(ParseDiagnostic {
            line: start_line,
            col: start_col,
            message: "template expression is not valid shell".to_string(),
        });
        return scan_until(cur, "}}", start_line, start_col, diagnostics, "template expression");
    }
    if cur.at("${") {
        cur.bump_n(2);
        return lex_braced_expansion(cur, start_line, start_col, diagnostics);
    }

    cur.bump(); // '$'
    let mut name = String::new();
    while let Some(c) = cur.peek() {
        if is_ident_continue(c) {
            name.push(c);
            cur.bump();
        } else {
            break;
        }
    }
    if name.is_empty() {
        // A lone '$' is literal in practice; nothing rewritable either way.
        return WordPart::Opaque;
    }
    WordPart::Expansion {
        name,
        default: None,
    }
}

fn lex_braced_expansion(
    cur: &mut Cursor<'_>,
    start_line: usize,
    start_col: usize,
    diagnostics: &mut Vec<ParseDiagnostic>,
) -> WordPart {
    let mut name = String::new();
    while let Some(c) = cur.peek() {
        if is_ident_continue(c) {
            name.push(c);
            cur.bump();
        } else {
            break;
        }
    }

    match cur.peek() {
        Some('}') => {
            cur.bump();
            return WordPart::Expansion {
                name,
                default: None,
            };
        }
        Some(_) => {}
        None => {
            diagnostics.push(ParseDiagnostic {
                line: start_line,
                col: start_col,
                message: "unterminated parameter expansion".to_string(),
            });
            return WordPart::Opaque;
        }
    }

    // Operator: `:-` `:=` `:+` `:?` and the no-colon forms.
    let mut op = String::new();
    if cur.peek() == Some(':') {
        op.push(cur.bump().expect("peeked"));
    }
    match cur.peek() {
        Some(c @ ('-' | '=' | '+' | '?')) => {
            op.push(c);
            cur.bump();
        }
        _ => {
            // `${#VAR}`, `${VAR%suffix}` and friends: walk to the brace.
            return scan_until(cur, "}", start_line, start_col, diagnostics, "parameter expansion");
        }
    }
    let takes_default = matches!(op.as_str(), ":-" | ":=" | "-" | "=");

    // Raw default text, up to the closing brace.
    let raw_start_line = cur.line;
    let raw_start_col = cur.col;
    let mut raw = String::new();
    loop {
        match cur.peek() {
            None => {
                diagnostics.push(ParseDiagnostic {
                    line: start_line,
                    col: start_col,
                    message: "unterminated parameter expansion".to_string(),
                });
                return WordPart::Opaque;
            }
            Some('}') => {
                break;
            }
            Some(c) => {
                raw.push(c);
                cur.bump();
            }
        }
    }
    let raw_end_line = cur.line;
    let raw_end_col = cur.col;
    cur.bump(); // '}'

    if !takes_default {
        return WordPart::Expansion {
            name,
            default: None,
        };
    }

    let default = pure_default(&raw).map(|(value, quote)| DefaultValue {
        value,
        quote,
        span: Span {
            line: raw_start_line,
            start_col: raw_start_col,
            end_col: raw_end_col,
        },
    });
    // Multi-line defaults cannot be addressed by a single-line span.
    let default = if raw_start_line == raw_end_line {
        default
    } else {
        None
    };

    WordPart::Expansion { name, default }
}

/// A default operand is rewritable only when it is one clean literal:
/// entirely bare, or entirely wrapped in one pair of quotes, with no
/// expansions or escapes inside.
fn pure_default(raw: &str) -> Option<(String, QuoteStyle)> {
    if raw.is_empty() {
        return None;
    }
    let impure = |s: &str| s.chars().any(|c| matches!(c, '$' | '`' | '\\' | '\'' | '"'));

    for (quote_char, style) in [('\'', QuoteStyle::Single), ('"', QuoteStyle::Double)] {
        if let Some(inner) = raw
            .strip_prefix(quote_char)
            .and_then(|r| r.strip_suffix(quote_char))
        {
            if impure(inner) {
                return None;
            }
            return Some((inner.to_string(), style));
        }
    }

    if impure(raw) {
        return None;
    }
    Some((raw.to_string(), QuoteStyle::Bare))
}

fn scan_until(
    cur: &mut Cursor<'_>,
    terminator: &str,
    start_line: usize,
    start_col: usize,
    diagnostics: &mut Vec<ParseDiagnostic>,
    what: &str,
) -> WordPart {
    loop {
        if cur.at(terminator) {
            cur.bump_n(terminator.chars().count());
            return WordPart::Opaque;
        }
        if cur.bump().is_none() {
            diagnostics.push(ParseDiagnostic {
                line: start_line,
                col: start_col,
                message: format!("unterminated {what}"),
            });
            return WordPart::Opaque;
        }
    }
}

fn scan_balanced_parens(
    cur: &mut Cursor<'_>,
    start_line: usize,
    start_col: usize,
    diagnostics: &mut Vec<ParseDiagnostic>,
) -> WordPart {
    let mut depth = 1usize;
    loop {
        match cur.bump() {
            None => {
                diagnostics.push(ParseDiagnostic {
                    line: start_line,
                    col: start_col,
                    message: "unterminated command substitution".to_string(),
                });
                return WordPart::Opaque;
            }
            Some('(') => depth += 1,
            Some(')') => {
                depth -= 1;
                if depth == 0 {
                    return WordPart::Opaque;
                }
            }
            Some(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn literal(word: &Word) -> (&str, QuoteStyle) {
        let (value, quote, _) = word.as_literal().expect("single literal word");
        (value, quote)
    }

    #[test]
    fn lexes_commands_and_operands() {
        let tree = parse("dotnet build -f net6.0\n").expect("parse");
        assert_eq!(tree.statements.len(), 1);
        let words = &tree.statements[0].words;
        assert_eq!(words.len(), 4);
        assert_eq!(literal(&words[0]), ("dotnet", QuoteStyle::Bare));
        assert_eq!(literal(&words[3]), ("net6.0", QuoteStyle::Bare));
    }

    #[test]
    fn quotes_are_recorded_with_style_and_span() {
        let tree = parse(r#"run --rid 'ubuntu.22.04-x64' --tfm "net6.0""#).expect("parse");
        let words = &tree.statements[0].words;

        let (value, quote, span) = words[2].as_literal().expect("literal");
        assert_eq!(value, "ubuntu.22.04-x64");
        assert_eq!(quote, QuoteStyle::Single);
        assert_eq!((span.start_col, span.end_col), (10, 28));

        let (value, quote, _) = words[4].as_literal().expect("literal");
        assert_eq!(value, "net6.0");
        assert_eq!(quote, QuoteStyle::Double);
    }

    #[test]
    fn leading_assignments_are_collected() {
        let tree = parse("TFM=net6.0 RID=linux-x64 dotnet publish\n").expect("parse");
        let stmt = &tree.statements[0];
        assert_eq!(stmt.assignments.len(), 2);
        assert_eq!(stmt.assignments[0].name, "TFM");
        assert_eq!(literal(&stmt.assignments[0].value), ("net6.0", QuoteStyle::Bare));
        assert_eq!(stmt.words.len(), 2);
    }

    #[test]
    fn assignment_after_command_position_is_a_word() {
        let tree = parse("echo TFM=net6.0\n").expect("parse");
        let stmt = &tree.statements[0];
        assert!(stmt.assignments.is_empty());
        assert_eq!(stmt.words.len(), 2);
    }

    #[test]
    fn parameter_defaults_are_extracted() {
        let tree = parse(r#"echo "${FRAMEWORK:-net6.0}" ${RID:=ubuntu-x64}"#).expect("parse");
        let stmt = &tree.statements[0];

        // The quoted expansion is impure as a literal, so the word is
        // opaque, but the bare one carries its default.
        let parts = &stmt.words[2].parts;
        match &parts[0] {
            WordPart::Expansion { name, default } => {
                assert_eq!(name, "RID");
                let d = default.as_ref().expect("default");
                assert_eq!(d.value, "ubuntu-x64");
                assert_eq!(d.quote, QuoteStyle::Bare);
            }
            other => panic!("expected expansion, got {other:?}"),
        }
    }

    #[test]
    fn quoted_default_keeps_quote_style() {
        let tree = parse("echo ${TFM:-'net6.0'}\n").expect("parse");
        match &tree.statements[0].words[1].parts[0] {
            WordPart::Expansion { default, .. } => {
                let d = default.as_ref().expect("default");
                assert_eq!(d.value, "net6.0");
                assert_eq!(d.quote, QuoteStyle::Single);
                // Span covers the quotes.
                assert_eq!(d.span.end_col - d.span.start_col, 8);
            }
            other => panic!("expected expansion, got {other:?}"),
        }
    }

    #[test]
    fn alternate_and_error_operators_take_no_default() {
        let tree = parse("echo ${A:+net6.0} ${B:?msg}\n").expect("parse");
        for word in &tree.statements[0].words[1..] {
            match &word.parts[0] {
                WordPart::Expansion { default, .. } => assert!(default.is_none()),
                other => panic!("expected expansion, got {other:?}"),
            }
        }
    }

    #[test]
    fn statements_split_on_separators() {
        let tree = parse("a one; b two && c three | d four\n").expect("parse");
        assert_eq!(tree.statements.len(), 4);
    }

    #[test]
    fn comments_are_ignored() {
        let tree = parse("# heading\ndotnet build # trailing\n").expect("parse");
        assert_eq!(tree.statements.len(), 1);
        assert_eq!(tree.statements[0].words.len(), 2);
    }

    #[test]
    fn template_expression_fails_strict_but_not_lenient() {
        let text = "dotnet build -f ${{ matrix.tfm }}\n";
        assert!(parse(text).is_err());

        let tree = parse_lenient(text);
        assert_eq!(tree.statements.len(), 1);
        assert_eq!(tree.diagnostics.len(), 1);
    }

    #[test]
    fn unterminated_quote_is_a_diagnostic() {
        assert!(parse("echo 'oops\n").is_err());
        let tree = parse_lenient("echo 'oops\n");
        assert_eq!(tree.diagnostics.len(), 1);
    }

    #[test]
    fn substitutions_are_opaque_not_errors() {
        let tree = parse("echo $(date) `hostname` $((1+2))\n").expect("parse");
        let words = &tree.statements[0].words;
        assert!(words[1].as_literal().is_none());
        assert!(words[2].as_literal().is_none());
        assert!(words[3].as_literal().is_none());
    }

    #[test]
    fn concatenated_word_is_not_a_single_literal() {
        let tree = parse("echo net\"6.0\"\n").expect("parse");
        assert!(tree.statements[0].words[1].as_literal().is_none());
        assert_eq!(tree.statements[0].words[1].parts.len(), 2);
    }

    #[test]
    fn line_continuation_joins_statements() {
        let tree = parse("dotnet build \\\n  -f net6.0\n").expect("parse");
        assert_eq!(tree.statements.len(), 1);
        assert_eq!(tree.statements[0].words.len(), 4);
    }
}
