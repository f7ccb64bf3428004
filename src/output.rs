//! CLI output formatting for pipeline runs.
//!
//! Output is file-centric: every stage lists what it produced as
//! `input → output` lines under a stage header, so a run reads as an
//! inventory of the generated tree. Per-file failures are shown inline
//! under the stage that hit them; a failed step shows its error where
//! its listing would be.
//!
//! ```text
//! templates
//!     index.html → index.html
//!     guides/setup.html → guides/setup.html
//! styles
//!     css/site.css → css/site.css
//! scripts
//!     3 modules → js/bundle.js
//! copy
//!     2 files
//! sitemap
//!     2 pages → sitemap.xml
//! Done: 5 steps, 0 errors
//! ```
//!
//! Each piece has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure.

use crate::paths;
use crate::pipeline::{PipelineReport, StageReport};
use std::path::Path;

fn indent(line: impl AsRef<str>) -> String {
    format!("    {}", line.as_ref())
}

fn arrow(from: &Path, to: &Path) -> String {
    format!("{} \u{2192} {}", paths::slash(from), paths::slash(to))
}

/// Format one stage's report as display lines (header + detail lines).
pub fn format_stage_report(report: &StageReport) -> Vec<String> {
    let mut lines = vec![report.name().to_string()];
    match report {
        StageReport::Templates(r) => {
            for (input, output) in &r.rendered {
                lines.push(indent(arrow(input, output)));
            }
            for (input, err) in &r.failures {
                lines.push(indent(format!("{}: {}", paths::slash(input), err)));
            }
        }
        StageReport::Styles(r) => {
            for (input, output) in &r.compiled {
                lines.push(indent(arrow(input, output)));
            }
            for (input, err) in &r.failures {
                lines.push(indent(format!("{}: {}", paths::slash(input), err)));
            }
        }
        StageReport::Scripts(r) => {
            lines.push(indent(format!(
                "{} module{} \u{2192} {}",
                r.modules.len(),
                if r.modules.len() == 1 { "" } else { "s" },
                paths::slash(&r.output)
            )));
        }
        StageReport::Copy(r) | StageReport::Package(r) => {
            lines.push(indent(format!(
                "{} file{}",
                r.copied.len(),
                if r.copied.len() == 1 { "" } else { "s" }
            )));
        }
        StageReport::Sitemap(r) => {
            lines.push(indent(format!(
                "{} page{} \u{2192} sitemap.xml",
                r.urls.len(),
                if r.urls.len() == 1 { "" } else { "s" }
            )));
        }
        StageReport::Minify(r) => {
            for (name, before, after) in &r.minified {
                lines.push(indent(format!(
                    "{}: {} \u{2192} {} bytes",
                    name.display(),
                    before,
                    after
                )));
            }
        }
        StageReport::Clean(tree) => {
            lines.push(indent(format!("removed {tree:?}").to_lowercase()));
        }
    }
    lines
}

/// Format a whole pipeline run: every step in run order plus a summary.
pub fn format_pipeline_report(report: &PipelineReport) -> Vec<String> {
    let mut lines = Vec::new();
    let mut errors = 0;
    for (name, outcome) in &report.steps {
        match outcome {
            Ok(stage) => lines.extend(format_stage_report(stage)),
            Err(e) => {
                errors += 1;
                lines.push((*name).to_string());
                lines.push(indent(format!("FAILED: {e}")));
            }
        }
    }
    lines.push(format!(
        "Done: {} step{}, {} error{}",
        report.steps.len(),
        if report.steps.len() == 1 { "" } else { "s" },
        errors,
        if errors == 1 { "" } else { "s" }
    ));
    lines
}

/// Print a pipeline run to stdout.
pub fn print_pipeline_report(report: &PipelineReport) {
    for line in format_pipeline_report(report) {
        println!("{}", line);
    }
}

/// Print a single stage's report to stdout.
pub fn print_stage_report(report: &StageReport) {
    for line in format_stage_report(report) {
        println!("{}", line);
    }
}
