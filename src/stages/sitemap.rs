//! Sitemap stage: emits `sitemap.xml` from the generated HTML.
//!
//! Scans the dist tree for `*.html`, excludes the configured listing page
//! (`sitemap.exclude`, `_filelist.html` by default), joins each page path
//! to `sitemap.site_url`, and writes a sitemaps.org urlset at the dist
//! root. Always a full regeneration; entries are sorted so the output is
//! deterministic. No `<lastmod>` — mtimes would make otherwise-identical
//! release builds differ.

use crate::config::Config;
use crate::paths;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

const URLSET_XMLNS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

#[derive(Error, Debug)]
pub enum SitemapError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("No output tree at {0} — run the build stages first")]
    MissingDist(PathBuf),
}

#[derive(Debug, Default)]
pub struct SitemapReport {
    /// Page URLs written to the sitemap, in file order.
    pub urls: Vec<String>,
}

/// Generate `dist/sitemap.xml` from the HTML files under the dist tree.
pub fn run(root: &Path, config: &Config) -> Result<SitemapReport, SitemapError> {
    let dist = root.join(&config.paths.dist);
    if !dist.is_dir() {
        return Err(SitemapError::MissingDist(dist));
    }

    let mut pages: Vec<String> = WalkDir::new(&dist)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "html"))
        .filter(|e| {
            e.path()
                .file_name()
                .and_then(|n| n.to_str())
                .is_none_or(|n| n != config.sitemap.exclude)
        })
        .filter_map(|e| e.path().strip_prefix(&dist).ok().map(paths::slash))
        .collect();
    pages.sort();

    let urls: Vec<String> = pages
        .iter()
        .map(|page| join_url(&config.sitemap.site_url, page))
        .collect();

    let mut xml = String::new();
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str(&format!("<urlset xmlns=\"{URLSET_XMLNS}\">\n"));
    for url in &urls {
        xml.push_str(&format!("  <url>\n    <loc>{}</loc>\n  </url>\n", escape(url)));
    }
    xml.push_str("</urlset>\n");

    fs::write(dist.join("sitemap.xml"), xml)?;
    debug!(pages = urls.len(), "sitemap written");
    Ok(SitemapReport { urls })
}

fn join_url(base: &str, page: &str) -> String {
    if base.ends_with('/') {
        format!("{base}{page}")
    } else {
        format!("{base}/{page}")
    }
}

/// Minimal XML text escaping for `<loc>` content.
fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn lists_all_html_pages_sorted() {
        let config = Config::default();
        let tmp = TempDir::new().unwrap();
        write(&tmp.path().join("dist"), "b.html", "x");
        write(&tmp.path().join("dist"), "a.html", "x");
        write(&tmp.path().join("dist"), "sub/c.html", "x");
        write(&tmp.path().join("dist"), "style.css", "x");

        let report = run(tmp.path(), &config).unwrap();
        assert_eq!(report.urls, vec!["./a.html", "./b.html", "./sub/c.html"]);

        let xml = fs::read_to_string(tmp.path().join("dist/sitemap.xml")).unwrap();
        assert!(xml.contains("<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">"));
        assert!(xml.contains("<loc>./a.html</loc>"));
        assert!(!xml.contains("style.css"));
    }

    #[test]
    fn excluded_listing_page_left_out() {
        let config = Config::default();
        let tmp = TempDir::new().unwrap();
        write(&tmp.path().join("dist"), "index.html", "x");
        write(&tmp.path().join("dist"), "_filelist.html", "x");

        let report = run(tmp.path(), &config).unwrap();
        assert_eq!(report.urls, vec!["./index.html"]);
    }

    #[test]
    fn site_url_without_trailing_slash_gets_one() {
        let mut config = Config::default();
        config.sitemap.site_url = "https://example.com".into();
        let tmp = TempDir::new().unwrap();
        write(&tmp.path().join("dist"), "index.html", "x");

        let report = run(tmp.path(), &config).unwrap();
        assert_eq!(report.urls, vec!["https://example.com/index.html"]);
    }

    #[test]
    fn regeneration_replaces_previous_sitemap() {
        let config = Config::default();
        let tmp = TempDir::new().unwrap();
        write(&tmp.path().join("dist"), "old.html", "x");
        run(tmp.path(), &config).unwrap();

        fs::remove_file(tmp.path().join("dist/old.html")).unwrap();
        write(&tmp.path().join("dist"), "new.html", "x");
        let report = run(tmp.path(), &config).unwrap();
        assert_eq!(report.urls, vec!["./new.html"]);
        let xml = fs::read_to_string(tmp.path().join("dist/sitemap.xml")).unwrap();
        assert!(!xml.contains("old.html"));
    }

    #[test]
    fn missing_dist_is_an_error() {
        let config = Config::default();
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            run(tmp.path(), &config),
            Err(SitemapError::MissingDist(_))
        ));
    }
}
