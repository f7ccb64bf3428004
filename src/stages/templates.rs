//! Template stage: renders HTML templates into the output tree.
//!
//! Every `*.html` file under the source tree is a Tera template. Files (or
//! directories) prefixed with `_` are partials: they are loaded into the
//! engine so `{% include %}` and `{% import %}` resolve, but they never
//! produce an output file of their own.
//!
//! Rendered markup is passed through the pretty-printer ([`crate::html`])
//! before being written, so generated pages are consistently indented no
//! matter how the templates are formatted.
//!
//! ## The `asset()` helper
//!
//! Templates reference static files through `{{ asset(path="img/x.png") }}`.
//! With `templates.rootpath = false` (default) the path is emitted
//! file-relative — exactly as written, resolved by the browser against the
//! page's own directory. With `rootpath = true` it is normalized against
//! the page's directory and emitted root-relative (`/img/x.png`), which
//! survives pages being served from nested URLs.
//!
//! ## Failure isolation
//!
//! A template that fails to render is logged and skipped; the stage
//! continues with the remaining templates and reports per-file failures in
//! its [`TemplateReport`].

use crate::config::Config;
use crate::html::{self, PrettyOptions};
use crate::paths::{self, Ownership, StageId};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tera::{Context, Tera, Value};
use thiserror::Error;
use tracing::{debug, error};
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Template engine error: {0}")]
    Engine(#[from] tera::Error),
}

/// What the stage did: one entry per rendered page, one per failed source.
#[derive(Debug, Default)]
pub struct TemplateReport {
    /// (source-relative input, dist-relative output)
    pub rendered: Vec<(PathBuf, PathBuf)>,
    /// (source-relative input, render error)
    pub failures: Vec<(PathBuf, String)>,
}

/// The `asset()` template function. One instance per page render, carrying
/// that page's directory.
struct AssetPath {
    rootpath: bool,
    page_dir: String,
}

impl tera::Function for AssetPath {
    fn call(&self, args: &HashMap<String, Value>) -> tera::Result<Value> {
        let path = args
            .get("path")
            .and_then(|v| v.as_str())
            .ok_or_else(|| tera::Error::msg("asset() requires a `path` string argument"))?;
        if self.rootpath {
            Ok(Value::String(root_relative(&self.page_dir, path)))
        } else {
            // File-relative mode: emit as written; the browser resolves it
            // against the page's own location.
            Ok(Value::String(path.to_string()))
        }
    }

    fn is_safe(&self) -> bool {
        true
    }
}

/// Normalize `page_dir/path` against the site root: `about/../img/x.png`
/// becomes `/img/x.png`. `..` never escapes the root.
fn root_relative(page_dir: &str, path: &str) -> String {
    let joined = if path.starts_with('/') {
        path.trim_start_matches('/').to_string()
    } else if page_dir.is_empty() {
        path.to_string()
    } else {
        format!("{page_dir}/{path}")
    };
    let mut parts: Vec<&str> = Vec::new();
    for part in joined.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    format!("/{}", parts.join("/"))
}

/// Render all templates under the source tree into the dist tree.
pub fn run(root: &Path, config: &Config) -> Result<TemplateReport, TemplateError> {
    let source = root.join(&config.paths.source);
    let dist = root.join(&config.paths.dist);
    let ownership = Ownership::new();

    // Load every template — partials included — so includes resolve.
    let mut engine = Tera::default();
    let mut all: Vec<(PathBuf, Option<String>)> = WalkDir::new(&source)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            let rel = e.path().strip_prefix(&source).ok()?.to_path_buf();
            (ownership.owner(&rel) == StageId::Templates)
                .then(|| (e.path().to_path_buf(), Some(paths::slash(&rel))))
        })
        .collect();
    all.sort();
    engine.add_template_files(all)?;

    let pretty = PrettyOptions {
        indent_size: config.templates.indent_size,
        max_preserve_newlines: config.templates.max_preserve_newlines,
    };

    let mut report = TemplateReport::default();
    for rel in paths::stage_inputs(&source, &ownership, StageId::Templates) {
        let name = paths::slash(&rel);
        let page_dir = rel
            .parent()
            .map(paths::slash)
            .unwrap_or_default();
        engine.register_function(
            "asset",
            AssetPath {
                rootpath: config.templates.rootpath,
                page_dir,
            },
        );

        let mut context = Context::new();
        context.insert("page", &name);

        match engine.render(&name, &context) {
            Ok(markup) => {
                let out = dist.join(&rel);
                if let Some(parent) = out.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::write(&out, html::prettify(&markup, &pretty))?;
                debug!(template = %name, "rendered");
                report.rendered.push((rel.clone(), rel));
            }
            Err(e) => {
                // Per-file isolation: a malformed template aborts only its
                // own output.
                error!(template = %name, error = %e, "template render failed");
                report.failures.push((rel, e.to_string()));
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn project(config: &Config) -> TempDir {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join(&config.paths.source)).unwrap();
        tmp
    }

    fn write_src(tmp: &TempDir, config: &Config, rel: &str, content: &str) {
        let path = tmp.path().join(&config.paths.source).join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn renders_template_with_partial_inlined() {
        let config = Config::default();
        let tmp = project(&config);
        write_src(&tmp, &config, "_header.html", "<header>site</header>");
        write_src(
            &tmp,
            &config,
            "index.html",
            "<div>{% include \"_header.html\" %}</div>",
        );

        let report = run(tmp.path(), &config).unwrap();
        assert_eq!(report.rendered.len(), 1);
        assert!(report.failures.is_empty());

        let out = fs::read_to_string(tmp.path().join("dist/index.html")).unwrap();
        assert!(out.contains("<header>"));
        assert!(out.contains("site"));
        // the partial itself was not rendered to a file
        assert!(!tmp.path().join("dist/_header.html").exists());
    }

    #[test]
    fn malformed_template_fails_alone() {
        let config = Config::default();
        let tmp = project(&config);
        write_src(&tmp, &config, "bad.html", "{% include \"missing.html\" %}");
        write_src(&tmp, &config, "good.html", "<p>fine</p>");

        let report = run(tmp.path(), &config).unwrap();
        assert_eq!(report.rendered.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert!(tmp.path().join("dist/good.html").exists());
        assert!(!tmp.path().join("dist/bad.html").exists());
    }

    #[test]
    fn asset_file_relative_passes_through() {
        let config = Config::default();
        let tmp = project(&config);
        write_src(
            &tmp,
            &config,
            "about/index.html",
            "<img src=\"{{ asset(path=\"../img/logo.png\") }}\">",
        );

        run(tmp.path(), &config).unwrap();
        let out = fs::read_to_string(tmp.path().join("dist/about/index.html")).unwrap();
        assert!(out.contains("src=\"../img/logo.png\""));
    }

    #[test]
    fn asset_rootpath_normalizes_against_site_root() {
        let mut config = Config::default();
        config.templates.rootpath = true;
        let tmp = project(&config);
        write_src(
            &tmp,
            &config,
            "about/index.html",
            "<img src=\"{{ asset(path=\"../img/logo.png\") }}\">",
        );

        run(tmp.path(), &config).unwrap();
        let out = fs::read_to_string(tmp.path().join("dist/about/index.html")).unwrap();
        assert!(out.contains("src=\"/img/logo.png\""));
    }

    #[test]
    fn output_mirrors_source_layout() {
        let config = Config::default();
        let tmp = project(&config);
        write_src(&tmp, &config, "docs/deep/page.html", "<p>x</p>");

        run(tmp.path(), &config).unwrap();
        assert!(tmp.path().join("dist/docs/deep/page.html").exists());
    }

    #[test]
    fn root_relative_clamps_at_root() {
        assert_eq!(root_relative("", "img/x.png"), "/img/x.png");
        assert_eq!(root_relative("about", "../img/x.png"), "/img/x.png");
        assert_eq!(root_relative("a/b", "../../../../x.png"), "/x.png");
        assert_eq!(root_relative("a", "/already/rooted.png"), "/already/rooted.png");
    }
}
