//! Copy stages: verbatim asset copying between trees.
//!
//! Two operations share this module:
//!
//! - [`run`] — the dev copy stage: every source file not owned by the
//!   template, style, or script globs is copied byte-identical to the
//!   mirrored path under `dist/`.
//! - [`package`] — the production copy: `dist/**` is copied into `build/`
//!   excluding the script output directory, whose contents enter the
//!   package separately through the minify stage.
//!
//! No transformation, no conflict resolution: last write wins.

use crate::config::Config;
use crate::paths::{self, Ownership, StageId};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum CopyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Nothing to package at {0} — run the build stages first")]
    MissingDist(PathBuf),
}

#[derive(Debug, Default)]
pub struct CopyReport {
    /// Relative paths copied.
    pub copied: Vec<PathBuf>,
}

/// Copy all unowned (asset) files from the source tree into the dist tree.
pub fn run(root: &Path, config: &Config) -> Result<CopyReport, CopyError> {
    let source = root.join(&config.paths.source);
    let dist = root.join(&config.paths.dist);
    let ownership = Ownership::new();

    let mut report = CopyReport::default();
    for rel in paths::stage_inputs(&source, &ownership, StageId::Copy) {
        let to = dist.join(&rel);
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(source.join(&rel), &to)?;
        debug!(asset = %paths::slash(&rel), "copied");
        report.copied.push(rel);
    }
    Ok(report)
}

/// Copy the dist tree into the package tree, excluding the script output
/// directory.
pub fn package(root: &Path, config: &Config) -> Result<CopyReport, CopyError> {
    let dist = root.join(&config.paths.dist);
    let build = root.join(&config.paths.build);
    if !dist.is_dir() {
        return Err(CopyError::MissingDist(dist));
    }
    let script_dir = Path::new(&config.scripts.bundle)
        .parent()
        .unwrap_or(Path::new(""))
        .to_path_buf();

    let mut files: Vec<PathBuf> = WalkDir::new(&dist)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.path().strip_prefix(&dist).ok().map(Path::to_path_buf))
        .filter(|rel| !(!script_dir.as_os_str().is_empty() && rel.starts_with(&script_dir)))
        .collect();
    files.sort();

    let mut report = CopyReport::default();
    for rel in files {
        let to = build.join(&rel);
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(dist.join(&rel), &to)?;
        report.copied.push(rel);
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &[u8]) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn copies_assets_byte_identical() {
        let config = Config::default();
        let tmp = TempDir::new().unwrap();
        let payload: Vec<u8> = (0u8..=255).collect();
        write(&tmp.path().join("src"), "img/logo.png", &payload);
        write(&tmp.path().join("src"), "fonts/a.woff2", b"font");

        let report = run(tmp.path(), &config).unwrap();
        assert_eq!(report.copied.len(), 2);
        assert_eq!(
            fs::read(tmp.path().join("dist/img/logo.png")).unwrap(),
            payload
        );
    }

    #[test]
    fn skips_files_owned_by_other_stages() {
        let config = Config::default();
        let tmp = TempDir::new().unwrap();
        write(&tmp.path().join("src"), "index.html", b"<p>");
        write(&tmp.path().join("src"), "css/site.css", b"a{}");
        write(&tmp.path().join("src"), "js/main.js", b"1;");
        write(&tmp.path().join("src"), "robots.txt", b"ok");

        let report = run(tmp.path(), &config).unwrap();
        assert_eq!(report.copied, vec![PathBuf::from("robots.txt")]);
        assert!(!tmp.path().join("dist/index.html").exists());
    }

    #[test]
    fn package_excludes_script_directory() {
        let config = Config::default();
        let tmp = TempDir::new().unwrap();
        write(&tmp.path().join("dist"), "index.html", b"<p>");
        write(&tmp.path().join("dist"), "css/site.css", b"a{}");
        write(&tmp.path().join("dist"), "js/bundle.js", b"1;");

        let report = package(tmp.path(), &config).unwrap();
        assert_eq!(report.copied.len(), 2);
        assert!(tmp.path().join("build/index.html").exists());
        assert!(tmp.path().join("build/css/site.css").exists());
        assert!(!tmp.path().join("build/js").exists());
    }

    #[test]
    fn package_without_dist_is_an_error() {
        let config = Config::default();
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            package(tmp.path(), &config),
            Err(CopyError::MissingDist(_))
        ));
    }
}
