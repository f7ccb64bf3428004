//! Minify stage: compacts bundled scripts into the package tree.
//!
//! Runs only in the production sequence, after the dist tree is complete:
//! every file in the dist script directory (the directory of
//! `scripts.bundle`, `dist/js/` by default) is minified into the same
//! relative location under the package tree (`build/js/`).
//!
//! The minifier is conservative by design: it strips comments, trims and
//! collapses insignificant whitespace, and drops blank lines — but keeps
//! every newline between statements, so automatic-semicolon-insertion
//! behavior is untouched. String, template and regex literals pass through
//! byte-for-byte.

use crate::config::Config;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum MinifyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("No script output at {0} — run the build stages first")]
    MissingInput(PathBuf),
}

#[derive(Debug, Default)]
pub struct MinifyReport {
    /// (input path, bytes before, bytes after)
    pub minified: Vec<(PathBuf, usize, usize)>,
}

/// Minify `dist/<script dir>/*` into `build/<script dir>/`.
pub fn run(root: &Path, config: &Config) -> Result<MinifyReport, MinifyError> {
    let script_dir = Path::new(&config.scripts.bundle)
        .parent()
        .unwrap_or(Path::new(""))
        .to_path_buf();
    let input_dir = root.join(&config.paths.dist).join(&script_dir);
    let output_dir = root.join(&config.paths.build).join(&script_dir);

    if !input_dir.is_dir() {
        return Err(MinifyError::MissingInput(input_dir));
    }
    fs::create_dir_all(&output_dir)?;

    let mut report = MinifyReport::default();
    let mut files: Vec<PathBuf> = WalkDir::new(&input_dir)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().to_path_buf())
        .collect();
    files.sort();

    for file in files {
        let code = fs::read_to_string(&file)?;
        let small = minify_js(&code);
        let name = file.file_name().map(PathBuf::from).unwrap_or_default();
        fs::write(output_dir.join(&name), &small)?;
        debug!(file = %name.display(), before = code.len(), after = small.len(), "minified");
        report.minified.push((name, code.len(), small.len()));
    }
    Ok(report)
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    Code,
    LineComment,
    BlockComment,
    Str(char),
    Template,
    Regex { in_class: bool },
}

/// Strip comments and collapse whitespace, preserving literals and
/// statement-separating newlines.
pub fn minify_js(code: &str) -> String {
    let mut out = String::with_capacity(code.len());
    let mut state = State::Code;
    // Last significant char emitted — drives regex-vs-division detection.
    let mut last: Option<char> = None;
    let mut pending_ws = false;
    let mut pending_newline = false;
    let mut chars = code.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            State::LineComment => {
                if c == '\n' {
                    state = State::Code;
                    pending_newline = true;
                }
            }
            State::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    state = State::Code;
                    pending_ws = true;
                }
            }
            State::Str(quote) => {
                out.push(c);
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                } else if c == quote {
                    state = State::Code;
                    last = Some(quote);
                }
            }
            State::Template => {
                out.push(c);
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                } else if c == '`' {
                    state = State::Code;
                    last = Some('`');
                }
            }
            State::Regex { in_class } => {
                out.push(c);
                match c {
                    '\\' => {
                        if let Some(escaped) = chars.next() {
                            out.push(escaped);
                        }
                    }
                    '[' => state = State::Regex { in_class: true },
                    ']' if in_class => state = State::Regex { in_class: false },
                    '/' if !in_class => {
                        state = State::Code;
                        last = Some('/');
                    }
                    _ => {}
                }
            }
            State::Code => match c {
                '/' if chars.peek() == Some(&'/') => {
                    chars.next();
                    state = State::LineComment;
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    state = State::BlockComment;
                }
                '/' if regex_position(last) => {
                    flush_ws(&mut out, &mut pending_ws, &mut pending_newline);
                    out.push(c);
                    state = State::Regex { in_class: false };
                }
                '\n' => {
                    pending_newline = true;
                    pending_ws = false;
                }
                c if c.is_whitespace() => pending_ws = true,
                '\'' | '"' => {
                    flush_ws(&mut out, &mut pending_ws, &mut pending_newline);
                    out.push(c);
                    state = State::Str(c);
                }
                '`' => {
                    flush_ws(&mut out, &mut pending_ws, &mut pending_newline);
                    out.push(c);
                    state = State::Template;
                }
                _ => {
                    flush_ws(&mut out, &mut pending_ws, &mut pending_newline);
                    out.push(c);
                    last = Some(c);
                }
            },
        }
    }

    if !out.ends_with('\n') && !out.is_empty() {
        out.push('\n');
    }
    out
}

/// Emit at most one pending separator: a newline if any was seen (keeps
/// ASI intact), otherwise a single collapsed space.
fn flush_ws(out: &mut String, pending_ws: &mut bool, pending_newline: &mut bool) {
    if *pending_newline {
        if !out.is_empty() {
            out.push('\n');
        }
    } else if *pending_ws && !out.is_empty() {
        out.push(' ');
    }
    *pending_ws = false;
    *pending_newline = false;
}

/// A `/` starts a regex literal (not division) when the previous
/// significant char cannot end an expression.
fn regex_position(last: Option<char>) -> bool {
    match last {
        None => true,
        Some(c) => matches!(
            c,
            '(' | ',' | '=' | ':' | '[' | '!' | '&' | '|' | '?' | '{' | '}' | ';' | '\n' | '<'
                | '>' | '+' | '-' | '*' | '%' | '~' | '^'
        ),
    }
}
