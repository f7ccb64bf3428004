//! Source tree watching: change → owning stage → rebuild → reload.
//!
//! A debounced recursive watch on the source tree. Each batch of changes
//! is routed through the ownership table to the set of stages that must
//! re-run; each stage runs at most once per batch, behind a per-stage
//! lock so a long rebuild and a manual CLI invocation never interleave
//! writes to the same outputs. Partials route like any other file, so
//! editing `_vars.css` rebuilds the style stage that imports it. After
//! every batch the sitemap is refreshed and one reload signal goes out to
//! the dev server.
//!
//! Stage failures during watch are logged and swallowed: a typo in a
//! template must not kill the feedback loop, the next save simply
//! triggers another rebuild.

use crate::config::Config;
use crate::paths::{Ownership, StageId};
use crate::pipeline::{self, Mode};
use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_full::{DebounceEventResult, Debouncer, RecommendedCache, new_debouncer};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{info, warn};

const DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Watch error: {0}")]
    Notify(#[from] notify::Error),
    #[error("Source directory {0} does not exist")]
    MissingSource(PathBuf),
}

/// Per-stage rebuild locks. Watch batches run stages one at a time, but
/// the locks also exclude a concurrent CLI run touching the same stage.
#[derive(Default)]
pub struct StageLocks {
    locks: [Mutex<()>; 5],
}

impl StageLocks {
    fn index(stage: StageId) -> usize {
        match stage {
            StageId::Templates => 0,
            StageId::Styles => 1,
            StageId::Scripts => 2,
            StageId::Copy => 3,
            StageId::Sitemap => 4,
        }
    }

    fn run_locked<R>(&self, stage: StageId, f: impl FnOnce() -> R) -> R {
        let _guard = match self.locks[Self::index(stage)].lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f()
    }
}

/// A running watch. Dropping it stops the underlying watcher.
pub struct Watcher {
    _debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
}

/// Start watching the source tree. Rebuilds happen on the debouncer's
/// thread; `reload_tx` is signalled once per batch that rebuilt anything.
pub fn watch(
    root: &Path,
    config: &Config,
    reload_tx: broadcast::Sender<()>,
) -> Result<Watcher, WatchError> {
    let source = root.join(&config.paths.source);
    if !source.is_dir() {
        return Err(WatchError::MissingSource(source));
    }

    let root = root.to_path_buf();
    let config = config.clone();
    let ownership = Ownership::new();
    let locks = Arc::new(StageLocks::default());
    let watch_source = source.clone();

    let mut debouncer = new_debouncer(DEBOUNCE, None, move |result: DebounceEventResult| {
        match result {
            Ok(events) => {
                let changed: Vec<PathBuf> = events
                    .iter()
                    .flat_map(|e| e.paths.iter())
                    .filter_map(|p| p.strip_prefix(&watch_source).ok())
                    .map(Path::to_path_buf)
                    .collect();
                let stages = stages_for(&ownership, &changed);
                if stages.is_empty() {
                    return;
                }
                rebuild(&root, &config, &locks, &stages);
                let _ = reload_tx.send(());
            }
            Err(errors) => {
                for e in errors {
                    warn!(error = %e, "watch event error");
                }
            }
        }
    })?;
    debouncer.watch(&source, RecursiveMode::Recursive)?;
    info!(source = %source.display(), "watching");

    Ok(Watcher {
        _debouncer: debouncer,
    })
}

/// The stages a batch of source-relative changed paths requires, deduped,
/// in fixed pipeline order.
pub fn stages_for(ownership: &Ownership, changed: &[PathBuf]) -> Vec<StageId> {
    let order = [
        StageId::Styles,
        StageId::Templates,
        StageId::Scripts,
        StageId::Copy,
    ];
    order
        .into_iter()
        .filter(|stage| changed.iter().any(|rel| ownership.owner(rel) == *stage))
        .collect()
}

fn rebuild(root: &Path, config: &Config, locks: &StageLocks, stages: &[StageId]) {
    for &stage in stages {
        let outcome = locks.run_locked(stage, || {
            pipeline::run_stage(root, config, stage, Mode::Dev)
        });
        if let Err(e) = outcome {
            warn!(stage = stage.name(), error = %e, "rebuild failed");
        }
    }
    // Pages may have come or gone; keep the sitemap in step.
    let outcome = locks.run_locked(StageId::Sitemap, || {
        pipeline::run_stage(root, config, StageId::Sitemap, Mode::Dev)
    });
    if let Err(e) = outcome {
        warn!(stage = "sitemap", error = %e, "rebuild failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn changed_paths_route_to_their_stages() {
        let ownership = Ownership::new();
        let changed = vec![
            PathBuf::from("css/_vars.css"),
            PathBuf::from("index.html"),
            PathBuf::from("img/logo.png"),
        ];
        assert_eq!(
            stages_for(&ownership, &changed),
            vec![StageId::Styles, StageId::Templates, StageId::Copy]
        );
    }

    #[test]
    fn duplicate_owners_collapse_to_one_run() {
        let ownership = Ownership::new();
        let changed = vec![
            PathBuf::from("a.html"),
            PathBuf::from("b.html"),
            PathBuf::from("sub/c.html"),
        ];
        assert_eq!(stages_for(&ownership, &changed), vec![StageId::Templates]);
    }

    #[test]
    fn empty_batch_runs_nothing() {
        let ownership = Ownership::new();
        assert!(stages_for(&ownership, &[]).is_empty());
    }

    #[test]
    fn missing_source_is_an_error() {
        let config = Config::default();
        let tmp = tempfile::TempDir::new().unwrap();
        let (tx, _rx) = broadcast::channel(8);
        assert!(matches!(
            watch(tmp.path(), &config, tx),
            Err(WatchError::MissingSource(_))
        ));
    }
}
