//! HTML pretty-printer for rendered templates.
//!
//! Reflows markup to a fixed indentation policy: configurable space indent
//! (tabs are never emitted), one block-level element per line, and a fixed
//! list of inline elements kept in the text flow instead of being broken
//! onto their own lines. Consecutive blank lines are collapsed down to
//! `max_preserve_newlines - 1` empty lines between elements.
//!
//! The contents of `<script>`, `<style>` and `<pre>` are passed through
//! verbatim — reindenting them would change meaning (`pre`) or invite
//! breakage (inline JS).
//!
//! The printer is lenient by design: it never fails. Unbalanced markup is
//! emitted as-is with a best-effort indent, because the rendered file must
//! still reach the output tree.

/// Elements kept inline with surrounding text rather than reflowed onto
/// their own lines.
const INLINE_ELEMENTS: &[&str] = &[
    "b", "big", "i", "small", "tt", "abbr", "acronym", "cite", "code", "dfn", "em", "kbd",
    "strong", "samp", "time", "var", "a", "bdo", "br", "img", "map", "object", "q", "span",
    "sub", "sup", "button", "input", "label", "select", "textarea",
];

/// Elements with no closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
    "source", "track", "wbr",
];

/// Elements whose text content is emitted verbatim.
const RAW_ELEMENTS: &[&str] = &["script", "style", "pre"];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrettyOptions {
    pub indent_size: usize,
    pub max_preserve_newlines: usize,
}

impl Default for PrettyOptions {
    fn default() -> Self {
        Self {
            indent_size: 2,
            max_preserve_newlines: 1,
        }
    }
}

#[derive(Debug, PartialEq)]
enum Token {
    /// `<name ...>` — carries the raw tag text and lowercase name.
    Open(String, String),
    /// `</name>`
    Close(String, String),
    /// `<name ... />`, void elements, comments, doctype.
    Standalone(String, String),
    /// Text between tags.
    Text(String),
    /// Verbatim body of a raw element (script/style/pre).
    Raw(String),
}

fn is_inline(name: &str) -> bool {
    INLINE_ELEMENTS.contains(&name)
}

fn is_void(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name)
}

fn is_raw(name: &str) -> bool {
    RAW_ELEMENTS.contains(&name)
}

/// Extract the element name following `<` or `</`.
fn tag_name(tag: &str) -> String {
    tag.trim_start_matches('<')
        .trim_start_matches('/')
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Find the end of a tag starting at `start` (index of `<`), respecting
/// quoted attribute values. Returns the index just past `>`.
fn tag_end(input: &[u8], start: usize) -> usize {
    let mut i = start;
    let mut quote: Option<u8> = None;
    while i < input.len() {
        let c = input[i];
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                b'"' | b'\'' => quote = Some(c),
                b'>' => return i + 1,
                _ => {}
            },
        }
        i += 1;
    }
    input.len()
}

fn tokenize(input: &str) -> Vec<Token> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] == b'<' {
            if input[i..].starts_with("<!--") {
                let end = input[i..]
                    .find("-->")
                    .map(|p| i + p + 3)
                    .unwrap_or(bytes.len());
                let raw = input[i..end].to_string();
                tokens.push(Token::Standalone(raw, String::new()));
                i = end;
            } else if input[i..].starts_with("<!") {
                let end = tag_end(bytes, i);
                tokens.push(Token::Standalone(input[i..end].to_string(), String::new()));
                i = end;
            } else if input[i..].starts_with("</") {
                let end = tag_end(bytes, i);
                let raw = input[i..end].to_string();
                let name = tag_name(&raw);
                tokens.push(Token::Close(raw, name));
                i = end;
            } else {
                let end = tag_end(bytes, i);
                let raw = input[i..end].to_string();
                let name = tag_name(&raw);
                if raw.ends_with("/>") || is_void(&name) {
                    tokens.push(Token::Standalone(raw, name));
                    i = end;
                } else if is_raw(&name) {
                    // Capture the body verbatim up to the matching close tag.
                    let close = format!("</{name}");
                    let rest = &input[end..];
                    let body_len = rest
                        .to_ascii_lowercase()
                        .find(&close)
                        .unwrap_or(rest.len());
                    tokens.push(Token::Open(raw, name));
                    tokens.push(Token::Raw(rest[..body_len].to_string()));
                    i = end + body_len;
                } else {
                    tokens.push(Token::Open(raw, name));
                    i = end;
                }
            }
        } else {
            let end = input[i..].find('<').map(|p| i + p).unwrap_or(bytes.len());
            tokens.push(Token::Text(input[i..end].to_string()));
            i = end;
        }
    }
    tokens
}

/// Pretty-print an HTML document.
pub fn prettify(input: &str, opts: &PrettyOptions) -> String {
    let allowed_blanks = opts.max_preserve_newlines.saturating_sub(1);
    let mut lines: Vec<String> = Vec::new();
    let mut depth: usize = 0;
    let mut inline: String = String::new();
    let mut pending_space = false;
    let mut pending_blanks: usize = 0;

    let indent = |depth: usize| " ".repeat(depth * opts.indent_size);

    // Flush the accumulated inline run as one indented line.
    macro_rules! flush {
        () => {
            if !inline.is_empty() {
                lines.push(format!("{}{}", indent(depth), inline));
                inline.clear();
                pending_space = false;
            }
        };
    }
    macro_rules! emit_blanks {
        () => {
            if !lines.is_empty() {
                for _ in 0..pending_blanks.min(allowed_blanks) {
                    lines.push(String::new());
                }
            }
            pending_blanks = 0;
        };
    }

    for token in tokenize(input) {
        match token {
            Token::Text(text) => {
                let blank_run = text.matches('\n').count();
                if text.trim().is_empty() {
                    if blank_run >= 2 && inline.is_empty() {
                        pending_blanks = pending_blanks.max(blank_run - 1);
                    }
                    if !inline.is_empty() && !text.is_empty() {
                        pending_space = true;
                    }
                    continue;
                }
                let mut first = true;
                for word in text.split_whitespace() {
                    let separated =
                        !first || pending_space || text.starts_with(char::is_whitespace);
                    if separated && !inline.is_empty() {
                        inline.push(' ');
                    }
                    inline.push_str(word);
                    first = false;
                }
                pending_space = text.ends_with(char::is_whitespace);
            }
            Token::Open(raw, name) => {
                if is_inline(&name) {
                    if pending_space && !inline.is_empty() {
                        inline.push(' ');
                        pending_space = false;
                    }
                    inline.push_str(&raw);
                } else {
                    flush!();
                    emit_blanks!();
                    lines.push(format!("{}{}", indent(depth), raw));
                    depth += 1;
                }
            }
            Token::Close(raw, name) => {
                if is_inline(&name) {
                    inline.push_str(&raw);
                } else {
                    flush!();
                    emit_blanks!();
                    depth = depth.saturating_sub(1);
                    lines.push(format!("{}{}", indent(depth), raw));
                }
            }
            Token::Standalone(raw, name) => {
                if is_inline(&name) {
                    if pending_space && !inline.is_empty() {
                        inline.push(' ');
                        pending_space = false;
                    }
                    inline.push_str(&raw);
                } else {
                    flush!();
                    emit_blanks!();
                    lines.push(format!("{}{}", indent(depth), raw));
                }
            }
            Token::Raw(body) => {
                flush!();
                for line in body.trim_matches('\n').lines() {
                    lines.push(line.trim_end().to_string());
                }
            }
        }
    }
    flush!();

    let mut out = lines.join("\n");
    out.push('\n');
    out
}
