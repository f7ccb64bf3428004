//! Deletion of the generated trees.
//!
//! Both output trees (`dist/` and `build/`) are disposable: every file in
//! them is derived from the source tree, so removing them is always safe
//! and the production sequence does it twice. Removal is idempotent, an
//! absent tree is success, and a path that exists but is not a directory
//! is refused rather than deleted.

use crate::config::Config;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum CleanError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Refusing to remove {0}: not a directory")]
    NotADirectory(PathBuf),
}

/// Which generated tree to remove.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tree {
    Dist,
    Build,
}

/// Remove one generated tree. Succeeds if the tree is already gone.
pub fn clean(root: &Path, config: &Config, tree: Tree) -> Result<(), CleanError> {
    let dir = match tree {
        Tree::Dist => root.join(&config.paths.dist),
        Tree::Build => root.join(&config.paths.build),
    };
    match fs::symlink_metadata(&dir) {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
        Ok(meta) if !meta.is_dir() => Err(CleanError::NotADirectory(dir)),
        Ok(_) => {
            fs::remove_dir_all(&dir)?;
            debug!(dir = %dir.display(), "removed");
            Ok(())
        }
    }
}
