//! Lightweight structural scanner for decompiled template text.
//!
//! This is not a parser. It tracks block delimiters (`{`, `[`, `(`) while
//! skipping string literals (including `'''` multi-line strings and `${...}`
//! interpolations) and `//` comments, which is enough to find where a
//! top-level declaration begins and ends and which list a line belongs to.
//! Unknown syntax is carried through untouched.

/// Kind of a top-level declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    /// `param name type`
    Param,
    /// `var name = ...`
    Var,
    /// `resource name 'Type@version' = ...`
    Resource,
    /// `module name 'path' = ...`
    Module,
    /// `output name type = ...`
    Output,
}

/// A top-level declaration located in the text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// Declaration kind
    pub kind: DeclarationKind,
    /// Symbolic name
    pub identifier: String,
    /// Parameter/output type, or resource type without its API version
    pub declared_type: Option<String>,
    /// First line of the declaration, decorators included
    pub start: usize,
    /// Line holding the keyword
    pub header: usize,
    /// Last line of the declaration (inclusive)
    pub end: usize,
}

impl Declaration {
    /// Whether `line` lies inside this declaration (decorators included).
    #[must_use]
    pub const fn contains(&self, line: usize) -> bool {
        line >= self.start && line <= self.end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Code,
    String,
    Multiline,
    /// Inside `${ ... }` of a string, with brace depth
    Interpolation(usize),
    /// A string literal nested inside an interpolation
    NestedString(usize),
}

/// Delimiter stack fed line by line.
#[derive(Debug, Clone)]
pub struct DelimiterState {
    stack: Vec<char>,
    mode: Mode,
}

impl Default for DelimiterState {
    fn default() -> Self {
        Self {
            stack: Vec::new(),
            mode: Mode::Code,
        }
    }
}

impl DelimiterState {
    /// Number of currently open delimiters.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// No delimiter or multi-line string is open.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.stack.is_empty() && self.mode != Mode::Multiline
    }

    /// Innermost open delimiter.
    #[must_use]
    pub fn innermost(&self) -> Option<char> {
        self.stack.last().copied()
    }

    /// Consume one line.
    pub fn feed(&mut self, line: &str) {
        let chars: Vec<char> = line.chars().collect();
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            let triple = chars[i..].starts_with(&['\'', '\'', '\'']);
            match self.mode {
                Mode::Multiline => {
                    if triple {
                        self.mode = Mode::Code;
                        i += 2;
                    }
                }
                Mode::Code => match c {
                    '/' if chars.get(i + 1) == Some(&'/') => return,
                    '\'' if triple => {
                        self.mode = Mode::Multiline;
                        i += 2;
                    }
                    '\'' => self.mode = Mode::String,
                    '{' | '[' | '(' => self.stack.push(c),
                    '}' | ']' | ')' => {
                        self.stack.pop();
                    }
                    _ => {}
                },
                Mode::String => match c {
                    '\\' => i += 1,
                    '\'' => self.mode = Mode::Code,
                    '$' if chars.get(i + 1) == Some(&'{') => {
                        self.mode = Mode::Interpolation(1);
                        i += 1;
                    }
                    _ => {}
                },
                Mode::Interpolation(depth) => match c {
                    '{' => self.mode = Mode::Interpolation(depth + 1),
                    '}' if depth == 1 => self.mode = Mode::String,
                    '}' => self.mode = Mode::Interpolation(depth - 1),
                    '\'' => self.mode = Mode::NestedString(depth),
                    _ => {}
                },
                Mode::NestedString(depth) => match c {
                    '\\' => i += 1,
                    '\'' => self.mode = Mode::Interpolation(depth),
                    _ => {}
                },
            }
            i += 1;
        }
        // Single-quoted strings never span lines.
        if matches!(self.mode, Mode::String | Mode::Interpolation(_) | Mode::NestedString(_)) {
            self.mode = Mode::Code;
        }
    }
}

/// Split text into owned lines.
#[must_use]
pub fn split_lines(text: &str) -> Vec<String> {
    text.lines().map(str::to_string).collect()
}

/// Join lines back into text with a trailing newline.
#[must_use]
pub fn join_lines(lines: &[String]) -> String {
    let mut text = lines.join("\n");
    text.push('\n');
    text
}

/// Last line of the balanced block starting at `start`.
///
/// A line that opens nothing is a block on its own. An unterminated block
/// runs to the end of the text.
#[must_use]
pub fn block_end<S: AsRef<str>>(lines: &[S], start: usize) -> usize {
    let mut state = DelimiterState::default();
    for (i, line) in lines.iter().enumerate().skip(start) {
        state.feed(line.as_ref());
        if state.is_settled() {
            return i;
        }
    }
    lines.len().saturating_sub(1)
}

/// Innermost open delimiter at the start of every line.
#[must_use]
pub fn line_contexts<S: AsRef<str>>(lines: &[S]) -> Vec<Option<char>> {
    let mut state = DelimiterState::default();
    lines
        .iter()
        .map(|line| {
            let context = state.innermost();
            state.feed(line.as_ref());
            context
        })
        .collect()
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn leading_identifier(text: &str) -> Option<&str> {
    let end = text.find(|c: char| !is_identifier_char(c)).unwrap_or(text.len());
    let ident = &text[..end];
    (!ident.is_empty() && !ident.starts_with(|c: char| c.is_ascii_digit())).then_some(ident)
}

fn parse_header(trimmed: &str) -> Option<(DeclarationKind, String, Option<String>)> {
    let (keyword, rest) = trimmed.split_once(char::is_whitespace)?;
    let kind = match keyword {
        "param" => DeclarationKind::Param,
        "var" => DeclarationKind::Var,
        "resource" => DeclarationKind::Resource,
        "module" => DeclarationKind::Module,
        "output" => DeclarationKind::Output,
        _ => return None,
    };
    let rest = rest.trim_start();
    let identifier = leading_identifier(rest)?.to_string();
    let after = rest[identifier.len()..].trim_start();

    let declared_type = match kind {
        DeclarationKind::Resource => after
            .strip_prefix('\'')
            .and_then(|s| s.split('\'').next())
            .map(|t| t.split('@').next().unwrap_or(t).to_string()),
        DeclarationKind::Param | DeclarationKind::Output => {
            leading_identifier(after).map(str::to_string)
        }
        DeclarationKind::Var | DeclarationKind::Module => None,
    };
    Some((kind, identifier, declared_type))
}

/// Locate every top-level declaration.
#[must_use]
pub fn scan<S: AsRef<str>>(lines: &[S]) -> Vec<Declaration> {
    let mut declarations = Vec::new();
    let mut decorator_start: Option<usize> = None;
    let mut i = 0;

    while i < lines.len() {
        let trimmed = lines[i].as_ref().trim_start();
        let end = block_end(lines, i);

        if trimmed.starts_with('@') {
            decorator_start.get_or_insert(i);
        } else if let Some((kind, identifier, declared_type)) = parse_header(trimmed) {
            declarations.push(Declaration {
                kind,
                identifier,
                declared_type,
                start: decorator_start.take().unwrap_or(i),
                header: i,
                end,
            });
        } else if !trimmed.is_empty() {
            decorator_start = None;
        }
        i = end + 1;
    }

    declarations
}

/// Value of a direct property (`key: value`) of a declaration's body.
///
/// Only lines at nesting depth 1 inside the declaration are considered.
#[must_use]
pub fn block_property<S: AsRef<str>>(lines: &[S], decl: &Declaration, key: &str) -> Option<String> {
    let mut state = DelimiterState::default();
    for line in &lines[decl.header..=decl.end] {
        let line = line.as_ref();
        if state.depth() == 1 {
            let trimmed = line.trim_start();
            if let Some(value) = trimmed.strip_prefix(key).and_then(|r| r.strip_prefix(':')) {
                return Some(value.trim().to_string());
            }
        }
        state.feed(line);
    }
    None
}

/// Byte offsets of every whole-identifier occurrence of `ident` in `line`.
#[must_use]
pub fn find_identifier(line: &str, ident: &str) -> Vec<usize> {
    if ident.is_empty() {
        return Vec::new();
    }
    let mut found = Vec::new();
    let mut start = 0;
    while let Some(offset) = line[start..].find(ident) {
        let begin = start + offset;
        let end = begin + ident.len();
        let left_ok = line[..begin].chars().next_back().is_none_or(|c| !is_identifier_char(c));
        let right_ok = line[end..].chars().next().is_none_or(|c| !is_identifier_char(c));
        if left_ok && right_ok {
            found.push(begin);
        }
        start = end;
    }
    found
}

/// Whether `ident` is used on `line` as a value (object keys are skipped).
#[must_use]
pub fn references_identifier(line: &str, ident: &str) -> bool {
    let key_offset = line.len() - line.trim_start().len();
    find_identifier(line, ident).into_iter().any(|pos| {
        let is_key = pos == key_offset && line[pos + ident.len()..].starts_with(':');
        !is_key
    })
}

/// Unquote a single-quoted literal without interpolation.
#[must_use]
pub fn string_literal_value(expr: &str) -> Option<String> {
    let inner = expr.trim().strip_prefix('\'')?.strip_suffix('\'')?;
    if inner.contains("${") {
        return None;
    }
    Some(inner.replace("\\'", "'").replace("\\\\", "\\"))
}

/// Render text as a single-quoted literal, escaping interpolation.
#[must_use]
pub fn bicep_string(value: &str) -> String {
    format!("'{}'", escape_string_content(value))
}

/// Escape text for use inside a single-quoted literal.
#[must_use]
pub fn escape_string_content(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace("${", "\\${")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}

/// Leading whitespace of a line.
#[must_use]
pub fn indentation(line: &str) -> &str {
    &line[..line.len() - line.trim_start().len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &str = r"@description('Name of the site')
@allowed([
  'app-dev'
])
param sites_app_dev_name string = 'app-dev'
param unused string

var label = 'brace { in string'

resource sites_app_dev_name_resource 'Microsoft.Web/sites@2022-09-01' = {
  name: sites_app_dev_name
  properties: {
    // comment with } brace
    enabled: true
  }
}

output siteId string = sites_app_dev_name_resource.id
";

    #[test]
    fn test_scan_finds_declarations_with_decorators() {
        let lines = split_lines(TEMPLATE);
        let decls = scan(&lines);
        let summary: Vec<(DeclarationKind, &str, usize, usize, usize)> = decls
            .iter()
            .map(|d| (d.kind, d.identifier.as_str(), d.start, d.header, d.end))
            .collect();
        assert_eq!(
            summary,
            vec![
                (DeclarationKind::Param, "sites_app_dev_name", 0, 4, 4),
                (DeclarationKind::Param, "unused", 5, 5, 5),
                (DeclarationKind::Var, "label", 7, 7, 7),
                (DeclarationKind::Resource, "sites_app_dev_name_resource", 9, 9, 15),
                (DeclarationKind::Output, "siteId", 17, 17, 17),
            ]
        );
        assert_eq!(decls[0].declared_type.as_deref(), Some("string"));
        assert_eq!(decls[3].declared_type.as_deref(), Some("Microsoft.Web/sites"));
    }

    #[test]
    fn test_block_property_reads_direct_children_only() {
        let lines = split_lines(TEMPLATE);
        let decls = scan(&lines);
        assert_eq!(block_property(&lines, &decls[3], "name").as_deref(), Some("sites_app_dev_name"));
        assert_eq!(block_property(&lines, &decls[3], "enabled"), None);
    }

    #[test]
    fn test_interpolation_and_multiline_strings() {
        let lines = split_lines(
            "var a = '${b ? '}' : '{'}'\nvar c = '''\n{ not a block\n'''\nvar d = {\n}\n",
        );
        let decls = scan(&lines);
        let ends: Vec<usize> = decls.iter().map(|d| d.end).collect();
        assert_eq!(ends, vec![0, 3, 5]);
    }

    #[test]
    fn test_line_contexts() {
        let lines = split_lines("x: {\n  deps: [\n    a\n  ]\n}\n");
        assert_eq!(line_contexts(&lines), vec![None, Some('{'), Some('['), Some('['), Some('{')]);
    }

    #[test]
    fn test_find_identifier_respects_word_boundaries() {
        assert_eq!(find_identifier("a_b a a_b_c (a.id)", "a"), vec![4, 13]);
        assert!(find_identifier("subnetA2", "subnetA").is_empty());
    }

    #[test]
    fn test_references_identifier_skips_keys() {
        assert!(!references_identifier("  location: 'eastus'", "location"));
        assert!(references_identifier("  location: location", "location"));
        assert!(references_identifier("  name: location", "location"));
    }

    #[test]
    fn test_string_helpers() {
        assert_eq!(bicep_string("it's ${x}"), r"'it\'s \${x}'");
        assert_eq!(string_literal_value(r"'it\'s'").as_deref(), Some("it's"));
        assert_eq!(string_literal_value("'${a}/b'"), None);
        assert_eq!(string_literal_value("ident"), None);
    }
}
