//! Lint stage: static analysis over script sources.
//!
//! A small fixed rule set. The stage collects violations into a report;
//! printing them (eslint-like single-line format) is the caller's job, so
//! each violation reaches the console exactly once. When `lint.notify` is
//! on, the stage raises a desktop notification. Linting runs independently
//! of the build sequences and never halts them; the CLI exits nonzero only
//! when an error-severity violation exists.
//!
//! Rules:
//!
//! | Rule          | Severity | Trigger                         |
//! |---------------|----------|---------------------------------|
//! | `no-debugger` | error    | `debugger` statement            |
//! | `no-eval`     | error    | `eval(...)` call                |
//! | `no-alert`    | error    | `alert(...)` call               |
//! | `no-console`  | warning  | `console.*` call (configurable) |
//!
//! Partials are linted too: underscore-prefixed scripts are still code.
//! String and comment contents are ignored — `"use debugger"` in a string
//! is not a violation.

use crate::config::Config;
use crate::paths::{Ownership, StageId};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum LintError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

/// One rule violation at a source position.
#[derive(Debug, Clone)]
pub struct Violation {
    pub file: PathBuf,
    pub line: usize,
    pub column: usize,
    pub severity: Severity,
    pub rule: &'static str,
    pub message: &'static str,
}

#[derive(Debug, Default)]
pub struct LintReport {
    pub violations: Vec<Violation>,
}

impl LintReport {
    pub fn has_errors(&self) -> bool {
        self.violations
            .iter()
            .any(|v| v.severity == Severity::Error)
    }
}

struct Rule {
    name: &'static str,
    message: &'static str,
    severity: Severity,
    pattern: Regex,
}

fn rules(config: &Config) -> Vec<Rule> {
    let mut rules = vec![
        Rule {
            name: "no-debugger",
            message: "Unexpected 'debugger' statement.",
            severity: Severity::Error,
            pattern: Regex::new(r"\bdebugger\b").unwrap(),
        },
        Rule {
            name: "no-eval",
            message: "eval can be harmful.",
            severity: Severity::Error,
            pattern: Regex::new(r"\beval\s*\(").unwrap(),
        },
        Rule {
            name: "no-alert",
            message: "Unexpected alert.",
            severity: Severity::Error,
            pattern: Regex::new(r"\balert\s*\(").unwrap(),
        },
    ];
    if config.lint.no_console {
        rules.push(Rule {
            name: "no-console",
            message: "Unexpected console statement.",
            severity: Severity::Warning,
            pattern: Regex::new(r"\bconsole\s*\.\s*\w+").unwrap(),
        });
    }
    rules
}

/// Lint every script under the source tree (partials included).
pub fn run(root: &Path, config: &Config) -> Result<LintReport, LintError> {
    let source = root.join(&config.paths.source);
    let ownership = Ownership::new();
    let rules = rules(config);

    let mut scripts: Vec<PathBuf> = WalkDir::new(&source)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.path().strip_prefix(&source).ok().map(Path::to_path_buf))
        .filter(|rel| ownership.owner(rel) == StageId::Scripts)
        .collect();
    scripts.sort();

    let mut report = LintReport::default();
    for rel in scripts {
        let code = fs::read_to_string(source.join(&rel))?;
        lint_source(&rel, &code, &rules, &mut report);
    }

    // Console reporting belongs to the caller; the stage only raises the
    // desktop notification.
    if config.lint.notify && !report.violations.is_empty() {
        notify(&report);
    }
    Ok(report)
}

fn lint_source(rel: &Path, code: &str, rules: &[Rule], report: &mut LintReport) {
    let mut in_template = false;
    for (idx, line) in code.lines().enumerate() {
        let (stripped, still_open) = strip_literals(line, in_template);
        in_template = still_open;
        for rule in rules {
            if let Some(m) = rule.pattern.find(&stripped) {
                report.violations.push(Violation {
                    file: rel.to_path_buf(),
                    line: idx + 1,
                    column: m.start() + 1,
                    severity: rule.severity,
                    rule: rule.name,
                    message: rule.message,
                });
            }
        }
    }
}

/// Blank out string contents and trailing line comments so rule patterns
/// don't fire inside them. Column positions are preserved because every
/// masked character is replaced one-for-one. Template literals span lines,
/// so the open-backtick state carries between calls; `'` and `"` strings
/// end at the newline regardless.
fn strip_literals(line: &str, in_template: bool) -> (String, bool) {
    let mut out = String::with_capacity(line.len());
    let mut quote: Option<char> = if in_template { Some('`') } else { None };
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                if c == '\\' {
                    out.push(' ');
                    if chars.next().is_some() {
                        out.push(' ');
                    }
                } else if c == q {
                    quote = None;
                    out.push(c);
                } else {
                    out.push(' ');
                }
            }
            None => match c {
                '\'' | '"' | '`' => {
                    quote = Some(c);
                    out.push(c);
                }
                '/' if chars.peek() == Some(&'/') => {
                    // mask the rest of the line
                    out.push(' ');
                    for _ in chars.by_ref() {
                        out.push(' ');
                    }
                }
                _ => out.push(c),
            },
        }
    }
    (out, quote == Some('`'))
}

/// eslint "stylish"-adjacent single-line format:
/// `src/js/main.js:3:1  error  Unexpected 'debugger' statement.  no-debugger`
pub fn format_violation(v: &Violation) -> String {
    format!(
        "{}:{}:{}  {}  {}  {}",
        v.file.display(),
        v.line,
        v.column,
        v.severity,
        v.message,
        v.rule
    )
}

/// Raise a desktop notification summarizing the violations. Failures to
/// reach a notification daemon are logged and otherwise ignored — linting
/// still reported to the console.
fn notify(report: &LintReport) {
    let first = &report.violations[0];
    let body = format!(
        "{} ({} violation{})",
        format_violation(first),
        report.violations.len(),
        if report.violations.len() == 1 { "" } else { "s" }
    );
    if let Err(e) = notify_rust::Notification::new()
        .summary("[task] lint")
        .body(&body)
        .timeout(notify_rust::Timeout::Milliseconds(3000))
        .show()
    {
        warn!(error = %e, "desktop notification failed");
    }
}
