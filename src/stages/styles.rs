//! Style stage: compiles stylesheets into the output tree.
//!
//! Sources are `*.css` files under the source tree, minus partials.
//! Compilation is lightningcss end to end:
//!
//! - `@import` resolution through the bundler, so `_vars.css` partials are
//!   inlined and never emitted as their own file
//! - nesting and other modern syntax lowered for the configured browser
//!   matrix (`[styles.targets]` in `weft.toml`)
//! - vendor prefixes for the same matrix
//! - minified output in both modes (the original pipeline compressed dev
//!   CSS too)
//!
//! ## Modes
//!
//! | | source map | media-query grouping |
//! |-----------|-----------|-----------|
//! | [`StyleMode::Dev`] | written to the sourcemaps dir | off |
//! | [`StyleMode::Release`] | none | equal `@media` preludes merged |
//!
//! ## Failure isolation
//!
//! A stylesheet that fails to compile is logged and skipped; the rest of
//! the run continues (no cascading abort).

use crate::config::Config;
use crate::paths::{self, Ownership, StageId};
use lightningcss::bundler::{Bundler, FileProvider};
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions};
use lightningcss::targets::Targets;
use parcel_sourcemap::SourceMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error};

#[derive(Error, Debug)]
pub enum StyleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config error: {0}")]
    Config(#[from] crate::config::ConfigError),
    #[error("CSS error in {file}: {message}")]
    Css { file: PathBuf, message: String },
    #[error("Source map error: {0}")]
    SourceMap(String),
}

/// Dev keeps source maps and skips media-query grouping; release is the
/// inverse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleMode {
    Dev,
    Release,
}

#[derive(Debug, Default)]
pub struct StyleReport {
    /// (source-relative input, dist-relative output)
    pub compiled: Vec<(PathBuf, PathBuf)>,
    /// (source-relative input, compile error)
    pub failures: Vec<(PathBuf, String)>,
}

/// Compile all stylesheets under the source tree into the dist tree.
pub fn run(root: &Path, config: &Config, mode: StyleMode) -> Result<StyleReport, StyleError> {
    let source = root.join(&config.paths.source);
    let dist = root.join(&config.paths.dist);
    let ownership = Ownership::new();
    let browsers = config.styles.targets.browsers()?;
    let targets = Targets {
        browsers: Some(browsers),
        ..Targets::default()
    };

    let mut report = StyleReport::default();
    for rel in paths::stage_inputs(&source, &ownership, StageId::Styles) {
        let input = source.join(&rel);
        match compile_one(&input, &rel, targets, mode) {
            Ok(compiled) => {
                let out = dist.join(&rel);
                if let Some(parent) = out.parent() {
                    fs::create_dir_all(parent)?;
                }
                match compiled.map {
                    Some(map_json) => {
                        // Dev mode: map lands in the sourcemaps subtree and
                        // the stylesheet gets an annotation pointing at it.
                        let map_rel = config.paths.sourcemaps.join(&rel);
                        let map_path = dist.join(&map_rel).with_extension("css.map");
                        if let Some(parent) = map_path.parent() {
                            fs::create_dir_all(parent)?;
                        }
                        fs::write(&map_path, map_json)?;
                        let url = map_url(&rel, &config.paths.sourcemaps);
                        let annotated =
                            format!("{}\n/*# sourceMappingURL={} */", compiled.code, url);
                        fs::write(&out, annotated)?;
                    }
                    None => fs::write(&out, compiled.code)?,
                }
                debug!(stylesheet = %paths::slash(&rel), "compiled");
                report.compiled.push((rel.clone(), rel));
            }
            Err(message) => {
                // No cascading abort: the other stylesheets still compile.
                error!(stylesheet = %paths::slash(&rel), error = %message, "css compile failed");
                report.failures.push((rel, message));
            }
        }
    }
    Ok(report)
}

struct Compiled {
    code: String,
    map: Option<String>,
}

fn compile_one(
    input: &Path,
    rel: &Path,
    targets: Targets,
    mode: StyleMode,
) -> Result<Compiled, String> {
    let provider = FileProvider::new();
    let mut bundler = Bundler::new(&provider, None, ParserOptions::default());
    let mut sheet = bundler.bundle(input).map_err(|e| e.to_string())?;

    sheet
        .minify(MinifyOptions {
            targets,
            ..MinifyOptions::default()
        })
        .map_err(|e| e.to_string())?;

    let mut map = (mode == StyleMode::Dev).then(|| SourceMap::new("/"));
    let result = sheet
        .to_css(PrinterOptions {
            minify: true,
            targets,
            source_map: map.as_mut(),
            ..PrinterOptions::default()
        })
        .map_err(|e| e.to_string())?;

    let code = match mode {
        StyleMode::Dev => result.code,
        StyleMode::Release => group_media_queries(&result.code),
    };
    let map = match map {
        Some(mut sm) => Some(sm.to_json(None).map_err(|e| e.to_string())?),
        None => None,
    };
    debug!(stylesheet = %rel.display(), bytes = code.len(), "printed");
    Ok(Compiled { code, map })
}

/// Annotation URL from a stylesheet's directory to its map under the
/// sourcemaps subtree: `css/site.css` → `../sourcemaps/css/site.css.map`.
fn map_url(rel: &Path, sourcemaps: &Path) -> String {
    let ups = rel.components().count().saturating_sub(1);
    let mut url = "../".repeat(ups);
    url.push_str(&paths::slash(sourcemaps));
    url.push('/');
    url.push_str(&paths::slash(&rel.with_extension("css.map")));
    url
}

/// Merge equal top-level `@media` preludes, appending the merged blocks
/// after all other rules in first-occurrence order.
///
/// Operates on printed (minified) CSS, so matching preludes compare
/// byte-equal. Strings inside values are respected; nested braces are
/// balanced.
pub fn group_media_queries(css: &str) -> String {
    let bytes = css.as_bytes();
    let mut plain = String::new();
    let mut groups: Vec<(String, String)> = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if css[i..].starts_with("@media") {
            let Some(open) = find_unquoted(css, i, b'{') else {
                plain.push_str(&css[i..]);
                break;
            };
            let prelude = css[i..open].trim().to_string();
            let close = match_brace(css, open);
            let body = &css[open + 1..close.saturating_sub(1).max(open + 1)];
            match groups.iter_mut().find(|(p, _)| *p == prelude) {
                Some((_, merged)) => merged.push_str(body),
                None => groups.push((prelude, body.to_string())),
            }
            i = close;
        } else {
            let Some(next) = css[i..].find("@media") else {
                plain.push_str(&css[i..]);
                break;
            };
            plain.push_str(&css[i..i + next]);
            i += next;
        }
    }

    let mut out = plain.trim_end().to_string();
    for (prelude, body) in groups {
        out.push_str(&prelude);
        out.push('{');
        out.push_str(&body);
        out.push('}');
    }
    out
}

/// Index of the first occurrence of `needle` at or after `from`, outside
/// string literals.
fn find_unquoted(css: &str, from: usize, needle: u8) -> Option<usize> {
    let bytes = css.as_bytes();
    let mut quote: Option<u8> = None;
    for (offset, &c) in bytes[from..].iter().enumerate() {
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                b'"' | b'\'' => quote = Some(c),
                c2 if c2 == needle => return Some(from + offset),
                _ => {}
            },
        }
    }
    None
}

/// Index just past the brace matching the one at `open`.
fn match_brace(css: &str, open: usize) -> usize {
    let bytes = css.as_bytes();
    let mut depth = 0usize;
    let mut quote: Option<u8> = None;
    let mut i = open;
    while i < bytes.len() {
        let c = bytes[i];
        match quote {
            Some(q) => {
                if c == q {
                    quote = None;
                }
            }
            None => match c {
                b'"' | b'\'' => quote = Some(c),
                b'{' => depth += 1,
                b'}' => {
                    depth -= 1;
                    if depth == 0 {
                        return i + 1;
                    }
                }
                _ => {}
            },
        }
        i += 1;
    }
    bytes.len()
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
    fn compiles_and_minifies() {
        let config = Config::default();
        let tmp = project(&config);
        write_src(
            &tmp,
            &config,
            "css/site.css",
            "body {\n  color: #ff0000;\n  margin: 0px;\n}\n",
        );

        let report = run(tmp.path(), &config, StyleMode::Release).unwrap();
        assert_eq!(report.compiled.len(), 1);
        let out = fs::read_to_string(tmp.path().join("dist/css/site.css")).unwrap();
        assert!(out.contains("body"));
        // minified: no double newlines, shortened color
        assert!(!out.contains("  color"));
        assert!(out.contains("red") || out.contains("#f00"));
    }

    #[test]
    fn import_partial_is_inlined_not_emitted() {
        let config = Config::default();
        let tmp = project(&config);
        write_src(&tmp, &config, "css/_vars.css", ":root { --gap: 1rem; }\n");
        write_src(
            &tmp,
            &config,
            "css/site.css",
            "@import \"_vars.css\";\nmain { padding: var(--gap); }\n",
        );

        let report = run(tmp.path(), &config, StyleMode::Release).unwrap();
        assert_eq!(report.compiled.len(), 1);
        let out = fs::read_to_string(tmp.path().join("dist/css/site.css")).unwrap();
        assert!(out.contains("--gap"));
        assert!(!tmp.path().join("dist/css/_vars.css").exists());
    }

    #[test]
    fn malformed_sheet_does_not_abort_the_rest() {
        let config = Config::default();
        let tmp = project(&config);
        write_src(&tmp, &config, "css/bad.css", "body { color: }");
        write_src(&tmp, &config, "css/good.css", "p { margin: 0; }");

        let report = run(tmp.path(), &config, StyleMode::Release).unwrap();
        assert_eq!(report.compiled.len(), 1);
        assert_eq!(report.failures.len(), 1);
        assert!(tmp.path().join("dist/css/good.css").exists());
    }

    #[test]
    fn dev_mode_writes_sourcemap_with_annotation() {
        let config = Config::default();
        let tmp = project(&config);
        write_src(&tmp, &config, "css/site.css", "p { margin: 0; }\n");

        run(tmp.path(), &config, StyleMode::Dev).unwrap();
        let out = fs::read_to_string(tmp.path().join("dist/css/site.css")).unwrap();
        assert!(out.contains("sourceMappingURL=../sourcemaps/css/site.css.map"));
        assert!(tmp.path().join("dist/sourcemaps/css/site.css.map").exists());
    }

    #[test]
    fn release_mode_has_no_sourcemap() {
        let config = Config::default();
        let tmp = project(&config);
        write_src(&tmp, &config, "css/site.css", "p { margin: 0; }\n");

        run(tmp.path(), &config, StyleMode::Release).unwrap();
        let out = fs::read_to_string(tmp.path().join("dist/css/site.css")).unwrap();
        assert!(!out.contains("sourceMappingURL"));
        assert!(!tmp.path().join("dist/sourcemaps").exists());
    }

    #[test]
    fn grouping_merges_equal_preludes() {
        let css = "a{color:red}@media (min-width:600px){a{color:blue}}b{margin:0}@media (min-width:600px){b{margin:1px}}";
        let grouped = group_media_queries(css);
        assert_eq!(
            grouped,
            "a{color:red}b{margin:0}@media (min-width:600px){a{color:blue}b{margin:1px}}"
        );
    }

    #[test]
    fn grouping_keeps_distinct_preludes_apart() {
        let css = "@media print{a{display:none}}@media screen{b{color:red}}";
        let grouped = group_media_queries(css);
        assert!(grouped.contains("@media print{a{display:none}}"));
        assert!(grouped.contains("@media screen{b{color:red}}"));
    }

    #[test]
    fn grouping_ignores_braces_in_strings() {
        let css = "a{content:\"}\"}@media screen{b{color:red}}@media screen{c{color:blue}}";
        let grouped = group_media_queries(css);
        assert!(grouped.contains("a{content:\"}\"}"));
        assert!(grouped.contains("@media screen{b{color:red}c{color:blue}}"));
    }

    #[test]
    fn map_url_walks_up_from_nested_dirs() {
        let sourcemaps = PathBuf::from("sourcemaps");
        assert_eq!(
            map_url(Path::new("css/site.css"), &sourcemaps),
            "../sourcemaps/css/site.css.map"
        );
        assert_eq!(
            map_url(Path::new("top.css"), &sourcemaps),
            "sourcemaps/top.css.map"
        );
    }
}
