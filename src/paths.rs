//! Glob ownership table: which stage owns which source file.
//!
//! Every file under the source tree belongs to exactly one stage:
//!
//! | Pattern        | Owner     |
//! |----------------|-----------|
//! | `**/*.html`    | Templates |
//! | `**/*.css`     | Styles    |
//! | `**/*.js`      | Scripts   |
//! | everything else| Assets    |
//!
//! The same table drives three things: selecting each stage's inputs for a
//! full build, routing a changed path to the stage that must re-run during
//! watch, and excluding already-handled files from the copy stage. Having a
//! single table is what guarantees stages never write overlapping outputs.
//!
//! Partials (any path component starting with `_`) stay owned by their
//! stage — editing `_vars.css` re-triggers the style stage — but are
//! filtered out of direct stage input by [`is_partial`].

use crate::config::PARTIAL_PREFIX;
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One build stage, as known to the scheduler and the watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageId {
    Templates,
    Styles,
    Scripts,
    Copy,
    Sitemap,
}

impl StageId {
    pub fn name(&self) -> &'static str {
        match self {
            StageId::Templates => "templates",
            StageId::Styles => "styles",
            StageId::Scripts => "scripts",
            StageId::Copy => "copy",
            StageId::Sitemap => "sitemap",
        }
    }
}

impl std::fmt::Display for StageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Maps source-relative paths to their owning stage.
pub struct Ownership {
    templates: GlobSet,
    styles: GlobSet,
    scripts: GlobSet,
}

impl Ownership {
    pub fn new() -> Self {
        let set = |pattern: &str| {
            let mut builder = GlobSetBuilder::new();
            // Patterns are fixed; a failure here is a programming error.
            builder.add(Glob::new(pattern).unwrap_or_else(|_| Glob::new("**").unwrap()));
            builder.build().unwrap_or_else(|_| GlobSet::empty())
        };
        Self {
            templates: set("**/*.html"),
            styles: set("**/*.css"),
            scripts: set("**/*.js"),
        }
    }

    /// The stage that owns a source-relative path.
    pub fn owner(&self, rel: &Path) -> StageId {
        if self.templates.is_match(rel) {
            StageId::Templates
        } else if self.styles.is_match(rel) {
            StageId::Styles
        } else if self.scripts.is_match(rel) {
            StageId::Scripts
        } else {
            StageId::Copy
        }
    }
}

impl Default for Ownership {
    fn default() -> Self {
        Self::new()
    }
}

/// True when any component of the path carries the partial prefix.
///
/// `js/_helpers/util.js` is a partial even though the file name itself
/// doesn't start with `_`: everything under an underscore directory is
/// private to its importer.
pub fn is_partial(rel: &Path) -> bool {
    rel.components().any(|c| {
        c.as_os_str()
            .to_str()
            .is_some_and(|s| s.starts_with(PARTIAL_PREFIX))
    })
}

/// Walk the source tree and return the files a stage processes directly:
/// owned by `stage`, partials excluded, paths source-relative and sorted
/// for deterministic stage output.
pub fn stage_inputs(source: &Path, ownership: &Ownership, stage: StageId) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(source)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.path().strip_prefix(source).ok().map(Path::to_path_buf))
        .filter(|rel| ownership.owner(rel) == stage && !is_partial(rel))
        .collect();
    files.sort();
    files
}

/// Convert a source-relative path to the forward-slash form used for
/// template names, module ids, and URLs.
pub fn slash(rel: &Path) -> String {
    rel.components()
        .filter_map(|c| c.as_os_str().to_str())
        .collect::<Vec<_>>()
        .join("/")
}
