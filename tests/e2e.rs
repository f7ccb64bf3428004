//! End-to-end pipeline tests against a small fixture site built in a
//! temp directory: both sequences from source tree to output tree,
//! partial handling, and determinism.

use std::fs;
use std::path::Path;
use tempfile::TempDir;
use weft::clean::{self, Tree};
use weft::config::Config;
use weft::pipeline;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

/// A site exercising every stage: a page including a partial, a
/// stylesheet importing a partial, a two-module script, and an asset.
fn seed_site(root: &Path) {
    write(
        root,
        "src/index.html",
        "<!DOCTYPE html>\n<html><head><title>Home</title></head>\n\
         <body>{% include \"_nav.html\" %}<p>welcome</p>\n\
         <img src=\"{{ asset(path='img/logo.png') }}\"></body></html>\n",
    );
    write(root, "src/_nav.html", "<nav><a href=\"index.html\">home</a></nav>");
    write(
        root,
        "src/css/site.css",
        "@import \"_vars.css\";\nbody { color: var(--fg); }\n\
         @media (min-width: 600px) { body { margin: 2em; } }\n",
    );
    write(root, "src/css/_vars.css", ":root { --fg: #222; }\n");
    write(
        root,
        "src/js/main.js",
        "import { greet } from \"./_util.js\";\ngreet();\n",
    );
    write(
        root,
        "src/js/_util.js",
        "export function greet() { document.title = \"hi\"; }\n",
    );
    write(root, "src/img/logo.png", "not-really-a-png");
}

#[test]
fn dev_sequence_builds_complete_dist_tree() {
    let config = Config::default();
    let tmp = TempDir::new().unwrap();
    seed_site(tmp.path());

    let report = pipeline::dev(tmp.path(), &config);
    assert!(report.ok(), "steps: {:?}", report.steps);

    let page = fs::read_to_string(tmp.path().join("dist/index.html")).unwrap();
    assert!(page.contains("<nav>"), "partial not included:\n{page}");
    assert!(page.contains("img/logo.png"));

    let css = fs::read_to_string(tmp.path().join("dist/css/site.css")).unwrap();
    assert!(css.contains("--fg"), "partial import not inlined:\n{css}");
    assert!(css.contains("sourceMappingURL"));
    assert!(tmp.path().join("dist/sourcemaps/css/site.css.map").exists());

    let bundle = fs::read_to_string(tmp.path().join("dist/js/bundle.js")).unwrap();
    assert!(bundle.contains("greet"));

    assert_eq!(
        fs::read(tmp.path().join("dist/img/logo.png")).unwrap(),
        b"not-really-a-png"
    );

    let sitemap = fs::read_to_string(tmp.path().join("dist/sitemap.xml")).unwrap();
    assert!(sitemap.contains("<loc>./index.html</loc>"));
}

#[test]
fn partials_are_never_emitted() {
    let config = Config::default();
    let tmp = TempDir::new().unwrap();
    seed_site(tmp.path());

    pipeline::dev(tmp.path(), &config);
    assert!(!tmp.path().join("dist/_nav.html").exists());
    assert!(!tmp.path().join("dist/css/_vars.css").exists());
    assert!(!tmp.path().join("dist/js/_util.js").exists());
    assert!(!tmp.path().join("dist/js/main.js").exists());
}

#[test]
fn build_sequence_produces_the_package_only() {
    let config = Config::default();
    let tmp = TempDir::new().unwrap();
    seed_site(tmp.path());

    let report = pipeline::build(tmp.path(), &config).unwrap();
    assert!(report.ok());

    assert!(!tmp.path().join("dist").exists());
    assert!(tmp.path().join("build/index.html").exists());
    assert!(tmp.path().join("build/img/logo.png").exists());
    assert!(tmp.path().join("build/js/bundle.js").exists());

    let css = fs::read_to_string(tmp.path().join("build/css/site.css")).unwrap();
    assert!(!css.contains("sourceMappingURL"));
    assert!(!tmp.path().join("build/sourcemaps").exists());
    assert!(!tmp.path().join("build/sitemap.xml").exists());
}

#[test]
fn dev_output_is_deterministic() {
    let config = Config::default();
    let tmp = TempDir::new().unwrap();
    seed_site(tmp.path());

    pipeline::dev(tmp.path(), &config);
    let first_page = fs::read_to_string(tmp.path().join("dist/index.html")).unwrap();
    let first_css = fs::read_to_string(tmp.path().join("dist/css/site.css")).unwrap();
    let first_bundle = fs::read_to_string(tmp.path().join("dist/js/bundle.js")).unwrap();
    let first_sitemap = fs::read_to_string(tmp.path().join("dist/sitemap.xml")).unwrap();

    clean::clean(tmp.path(), &config, Tree::Dist).unwrap();
    pipeline::dev(tmp.path(), &config);

    assert_eq!(
        fs::read_to_string(tmp.path().join("dist/index.html")).unwrap(),
        first_page
    );
    assert_eq!(
        fs::read_to_string(tmp.path().join("dist/css/site.css")).unwrap(),
        first_css
    );
    assert_eq!(
        fs::read_to_string(tmp.path().join("dist/js/bundle.js")).unwrap(),
        first_bundle
    );
    assert_eq!(
        fs::read_to_string(tmp.path().join("dist/sitemap.xml")).unwrap(),
        first_sitemap
    );
}

/// Every file under a tree, keyed by slash-relative path.
fn snapshot(dir: &Path) -> std::collections::BTreeMap<String, Vec<u8>> {
    walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let rel = e
                .path()
                .strip_prefix(dir)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/");
            (rel, fs::read(e.path()).unwrap())
        })
        .collect()
}

#[test]
fn build_output_is_deterministic() {
    let config = Config::default();
    let tmp = TempDir::new().unwrap();
    seed_site(tmp.path());

    pipeline::build(tmp.path(), &config).unwrap();
    let first = snapshot(&tmp.path().join("build"));
    assert!(first.contains_key("js/bundle.js"), "files: {:?}", first.keys());

    // The production sequence cleans both trees itself, so a rerun starts
    // from the same state. The release-only paths — media query grouping,
    // packaging, script minification — must all reproduce byte-for-byte.
    pipeline::build(tmp.path(), &config).unwrap();
    let second = snapshot(&tmp.path().join("build"));
    assert_eq!(first, second);
}

#[test]
fn broken_template_fails_that_page_only() {
    let config = Config::default();
    let tmp = TempDir::new().unwrap();
    seed_site(tmp.path());
    write(tmp.path(), "src/broken.html", "{% include \"_missing.html\" %}");

    let report = pipeline::dev(tmp.path(), &config);
    // The template stage records the failure but the rest of the tree is
    // complete.
    assert!(tmp.path().join("dist/index.html").exists());
    assert!(!tmp.path().join("dist/broken.html").exists());
    assert!(tmp.path().join("dist/css/site.css").exists());
    // The sitemap only lists pages that rendered.
    let sitemap = fs::read_to_string(tmp.path().join("dist/sitemap.xml")).unwrap();
    assert!(!sitemap.contains("broken.html"));
    drop(report);
}

#[test]
fn clean_is_idempotent() {
    let config = Config::default();
    let tmp = TempDir::new().unwrap();
    seed_site(tmp.path());
    pipeline::dev(tmp.path(), &config);

    clean::clean(tmp.path(), &config, Tree::Dist).unwrap();
    clean::clean(tmp.path(), &config, Tree::Dist).unwrap();
    assert!(!tmp.path().join("dist").exists());
    // Source tree untouched.
    assert!(tmp.path().join("src/index.html").exists());
}
