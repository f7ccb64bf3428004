//! Stage sequencing: the task graph as data, plus its scheduler.
//!
//! The two shipped sequences are plain values built by [`dev_plan`] and
//! [`build_plan`] and interpreted by [`execute`], so the ordering
//! constraints live in one inspectable structure instead of a call chain:
//!
//! ```text
//! dev:    [styles templates scripts copy]  →  sitemap
//!          (parallel fan-out)
//!
//! build:  clean dist
//!         [styles templates scripts copy]   (parallel, release mode)
//!         clean build
//!         package        dist → build, minus the script directory
//!         minify         dist/js → build/js
//!         clean dist
//! ```
//!
//! Parallel steps fan out on the rayon pool and join before the next step;
//! the fan-out stages are independent by construction, each owning a
//! disjoint slice of the source tree. Failure policy is per plan: the dev
//! plan records stage errors and keeps going, so one broken input never
//! takes the whole feedback loop down; the build plan aborts on the first
//! error, a package with missing pieces being worse than no package.
//! Clean failures always abort — they gate the correctness of whatever
//! runs after them.

use crate::clean::{self, CleanError, Tree};
use crate::config::Config;
use crate::paths::StageId;
use crate::stages::copy::{self, CopyError, CopyReport};
use crate::stages::minify::{self, MinifyError, MinifyReport};
use crate::stages::scripts::{self, ScriptError, ScriptReport};
use crate::stages::sitemap::{self, SitemapError, SitemapReport};
use crate::stages::styles::{self, StyleError, StyleMode, StyleReport};
use crate::stages::templates::{self, TemplateError, TemplateReport};
use rayon::prelude::*;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};

/// Any stage's failure, unified for scheduling and reporting.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("templates: {0}")]
    Template(#[from] TemplateError),
    #[error("styles: {0}")]
    Style(#[from] StyleError),
    #[error("scripts: {0}")]
    Script(#[from] ScriptError),
    #[error("copy: {0}")]
    Copy(#[from] CopyError),
    #[error("sitemap: {0}")]
    Sitemap(#[from] SitemapError),
    #[error("minify: {0}")]
    Minify(#[from] MinifyError),
    #[error("clean: {0}")]
    Clean(#[from] CleanError),
}

/// Dev builds keep sourcemaps; release builds group media queries and
/// drop the maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Dev,
    Release,
}

/// One schedulable unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    Stage(StageId),
    Package,
    Minify,
    Clean(Tree),
}

impl Task {
    pub fn name(&self) -> &'static str {
        match self {
            Task::Stage(stage) => stage.name(),
            Task::Package => "package",
            Task::Minify => "minify",
            Task::Clean(_) => "clean",
        }
    }
}

/// A plan step: one task, or a fan-out group joined before the next step.
#[derive(Debug, Clone)]
pub enum Step {
    Serial(Task),
    Parallel(Vec<Task>),
}

/// What to do when a task in the plan fails. Clean failures abort
/// regardless.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Record the error and run the remaining steps.
    Continue,
    /// Stop at the first error, leaving prior outputs in place.
    Abort,
}

/// An ordered sequence of steps with its mode and failure policy.
#[derive(Debug, Clone)]
pub struct Plan {
    pub name: &'static str,
    pub mode: Mode,
    pub policy: FailurePolicy,
    pub steps: Vec<Step>,
}

fn fan_out() -> Step {
    Step::Parallel(vec![
        Task::Stage(StageId::Styles),
        Task::Stage(StageId::Templates),
        Task::Stage(StageId::Scripts),
        Task::Stage(StageId::Copy),
    ])
}

/// The development sequence: full fan-out into dist, then the sitemap.
pub fn dev_plan() -> Plan {
    Plan {
        name: "dev",
        mode: Mode::Dev,
        policy: FailurePolicy::Continue,
        steps: vec![fan_out(), Step::Serial(Task::Stage(StageId::Sitemap))],
    }
}

/// The production sequence, ending with only the package tree on disk.
pub fn build_plan() -> Plan {
    Plan {
        name: "build",
        mode: Mode::Release,
        policy: FailurePolicy::Abort,
        steps: vec![
            Step::Serial(Task::Clean(Tree::Dist)),
            fan_out(),
            Step::Serial(Task::Clean(Tree::Build)),
            Step::Serial(Task::Package),
            Step::Serial(Task::Minify),
            Step::Serial(Task::Clean(Tree::Dist)),
        ],
    }
}

/// What one executed task produced.
#[derive(Debug)]
pub enum StageReport {
    Templates(TemplateReport),
    Styles(StyleReport),
    Scripts(ScriptReport),
    Copy(CopyReport),
    Package(CopyReport),
    Sitemap(SitemapReport),
    Minify(MinifyReport),
    Clean(Tree),
}

impl StageReport {
    pub fn name(&self) -> &'static str {
        match self {
            StageReport::Templates(_) => "templates",
            StageReport::Styles(_) => "styles",
            StageReport::Scripts(_) => "scripts",
            StageReport::Copy(_) => "copy",
            StageReport::Package(_) => "package",
            StageReport::Sitemap(_) => "sitemap",
            StageReport::Minify(_) => "minify",
            StageReport::Clean(_) => "clean",
        }
    }
}

/// An executed plan: every task in run order with its outcome.
#[derive(Debug, Default)]
pub struct PipelineReport {
    pub steps: Vec<(&'static str, Result<StageReport, StageError>)>,
}

impl PipelineReport {
    pub fn ok(&self) -> bool {
        self.steps.iter().all(|(_, outcome)| outcome.is_ok())
    }
}

/// Run one source-tree stage. The watcher and the per-stage CLI commands
/// dispatch through here so they agree with the plans on semantics.
pub fn run_stage(
    root: &Path,
    config: &Config,
    stage: StageId,
    mode: Mode,
) -> Result<StageReport, StageError> {
    info!(stage = stage.name(), "running");
    match stage {
        StageId::Templates => Ok(StageReport::Templates(templates::run(root, config)?)),
        StageId::Styles => {
            let style_mode = match mode {
                Mode::Dev => StyleMode::Dev,
                Mode::Release => StyleMode::Release,
            };
            Ok(StageReport::Styles(styles::run(root, config, style_mode)?))
        }
        StageId::Scripts => Ok(StageReport::Scripts(scripts::run(root, config)?)),
        StageId::Copy => Ok(StageReport::Copy(copy::run(root, config)?)),
        StageId::Sitemap => Ok(StageReport::Sitemap(sitemap::run(root, config)?)),
    }
}

fn run_task(root: &Path, config: &Config, task: Task, mode: Mode) -> Result<StageReport, StageError> {
    match task {
        Task::Stage(stage) => run_stage(root, config, stage, mode),
        Task::Package => Ok(StageReport::Package(copy::package(root, config)?)),
        Task::Minify => Ok(StageReport::Minify(minify::run(root, config)?)),
        Task::Clean(tree) => {
            clean::clean(root, config, tree)?;
            Ok(StageReport::Clean(tree))
        }
    }
}

/// Interpret a plan step by step. Under [`FailurePolicy::Continue`] errors
/// are recorded in the report; under [`FailurePolicy::Abort`] (and for any
/// clean failure) the first error is returned and the report dropped.
pub fn execute(root: &Path, config: &Config, plan: &Plan) -> Result<PipelineReport, StageError> {
    info!(plan = plan.name, "starting");
    let mut report = PipelineReport::default();

    for step in &plan.steps {
        let outcomes: Vec<(Task, Result<StageReport, StageError>)> = match step {
            Step::Serial(task) => vec![(*task, run_task(root, config, *task, plan.mode))],
            Step::Parallel(tasks) => tasks
                .par_iter()
                .map(|&task| (task, run_task(root, config, task, plan.mode)))
                .collect(),
        };

        let mut first_err = None;
        for (task, outcome) in outcomes {
            match outcome {
                Ok(produced) => report.steps.push((task.name(), Ok(produced))),
                Err(e) => {
                    error!(task = task.name(), error = %e, "task failed");
                    let fatal =
                        plan.policy == FailurePolicy::Abort || matches!(task, Task::Clean(_));
                    if fatal && first_err.is_none() {
                        first_err = Some(e);
                    } else {
                        report.steps.push((task.name(), Err(e)));
                    }
                }
            }
        }
        if let Some(e) = first_err {
            error!(plan = plan.name, "aborting");
            return Err(e);
        }
    }
    Ok(report)
}

/// The development sequence: never fails outright except on a clean error
/// (and the dev plan has none); stage errors land in the report.
pub fn dev(root: &Path, config: &Config) -> PipelineReport {
    match execute(root, config, &dev_plan()) {
        Ok(report) => report,
        // Unreachable with the dev plan's policy, but the scheduler's
        // signature is honest about clean failures.
        Err(e) => {
            let mut report = PipelineReport::default();
            report.steps.push(("dev", Err(e)));
            report
        }
    }
}

/// The production sequence. Strict: the first failing task aborts and the
/// partially-built trees are left in place for inspection.
pub fn build(root: &Path, config: &Config) -> Result<PipelineReport, StageError> {
    execute(root, config, &build_plan())
}
