use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::sync::broadcast;
use weft::pipeline::Mode;
use weft::stages::{lint, minify, sitemap};
use weft::{clean, config, output, paths, pipeline, serve, watch};

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup — trivial, called exactly once
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "weft")]
#[command(about = "Asset pipeline and dev server for hand-built static sites")]
#[command(long_about = "\
Asset pipeline and dev server for hand-built static sites

Your source tree is the data source. Every file belongs to one stage,
decided by extension; files and directories prefixed '_' are partials:
compiled into their importers, never emitted themselves.

Source structure:

  src/
  ├── index.html               # Template → rendered to dist/index.html
  ├── _header.html             # Partial → available to {% include %}
  ├── css/
  │   ├── site.css             # Stylesheet → compiled to dist/css/site.css
  │   └── _vars.css            # Partial → inlined where @imported
  ├── js/
  │   ├── main.js              # Bundle entry → dist/js/bundle.js
  │   └── _util.js             # Module → bundled where imported
  └── img/logo.png             # Asset → copied byte-identical

Sequences:
  dev     full build into dist/, then serve with live reload and watch
  build   production package in build/: grouped media queries, minified
          scripts, no sourcemaps; dist/ is removed afterwards

Run 'weft gen-config' to generate a documented weft.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Project root (where weft.toml lives)
    #[arg(long, default_value = ".", env = "WEFT_ROOT", global = true)]
    root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Clone)]
struct CleanArgs {
    /// Remove only the dist tree
    #[arg(long)]
    dist: bool,
    /// Remove only the build tree
    #[arg(long)]
    build: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Full dev build, then serve dist/ with live reload and watch src/
    Dev,
    /// Production build: minified package in build/
    Build,
    /// Render HTML templates into dist/
    Templates,
    /// Compile stylesheets into dist/
    Styles {
        /// Release mode: group media queries, skip sourcemaps
        #[arg(long)]
        release: bool,
    },
    /// Bundle scripts from the entry into dist/
    Scripts,
    /// Copy plain assets into dist/
    Copy,
    /// Generate dist/sitemap.xml from rendered pages
    Sitemap,
    /// Minify dist scripts into the build tree
    Minify,
    /// Copy dist/ into build/, excluding the script directory
    Package,
    /// Serve dist/ without watching
    Serve,
    /// Watch src/ and rebuild changed stages
    Watch,
    /// Remove the generated trees (both, unless --dist or --build)
    Clean(CleanArgs),
    /// Lint script sources
    Lint,
    /// Print a stock weft.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let root = cli.root;

    match cli.command {
        Command::Dev => {
            let config = config::load_config(&root)?;
            let report = pipeline::dev(&root, &config);
            output::print_pipeline_report(&report);

            let (reload_tx, _) = broadcast::channel(16);
            let _watcher = watch::watch(&root, &config, reload_tx.clone())?;
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(serve::serve(&root, &config, reload_tx))?;
        }
        Command::Build => {
            let config = config::load_config(&root)?;
            let report = pipeline::build(&root, &config)?;
            output::print_pipeline_report(&report);
            println!("==> Package complete: {}", root.join(&config.paths.build).display());
        }
        Command::Templates => run_one(&root, paths::StageId::Templates, Mode::Dev)?,
        Command::Styles { release } => {
            let mode = if release { Mode::Release } else { Mode::Dev };
            run_one(&root, paths::StageId::Styles, mode)?;
        }
        Command::Scripts => run_one(&root, paths::StageId::Scripts, Mode::Dev)?,
        Command::Copy => run_one(&root, paths::StageId::Copy, Mode::Dev)?,
        Command::Sitemap => {
            let config = config::load_config(&root)?;
            let report = sitemap::run(&root, &config)?;
            output::print_stage_report(&pipeline::StageReport::Sitemap(report));
        }
        Command::Minify => {
            let config = config::load_config(&root)?;
            let report = minify::run(&root, &config)?;
            output::print_stage_report(&pipeline::StageReport::Minify(report));
        }
        Command::Package => {
            let config = config::load_config(&root)?;
            let report = weft::stages::copy::package(&root, &config)?;
            output::print_stage_report(&pipeline::StageReport::Package(report));
        }
        Command::Serve => {
            let config = config::load_config(&root)?;
            let (reload_tx, _) = broadcast::channel(16);
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(serve::serve(&root, &config, reload_tx))?;
        }
        Command::Watch => {
            let config = config::load_config(&root)?;
            let (reload_tx, _) = broadcast::channel(16);
            let _watcher = watch::watch(&root, &config, reload_tx)?;
            loop {
                std::thread::park();
            }
        }
        Command::Clean(args) => {
            let config = config::load_config(&root)?;
            // No flag means both trees.
            let both = !args.dist && !args.build;
            if args.dist || both {
                clean::clean(&root, &config, clean::Tree::Dist)?;
                println!("removed {}", config.paths.dist.display());
            }
            if args.build || both {
                clean::clean(&root, &config, clean::Tree::Build)?;
                println!("removed {}", config.paths.build.display());
            }
        }
        Command::Lint => {
            let config = config::load_config(&root)?;
            let report = lint::run(&root, &config)?;
            for violation in &report.violations {
                println!("{}", lint::format_violation(violation));
            }
            let errors = report
                .violations
                .iter()
                .filter(|v| v.severity == lint::Severity::Error)
                .count();
            let warnings = report.violations.len() - errors;
            if !report.violations.is_empty() {
                println!(
                    "{} problem{} ({} error{}, {} warning{})",
                    report.violations.len(),
                    if report.violations.len() == 1 { "" } else { "s" },
                    errors,
                    if errors == 1 { "" } else { "s" },
                    warnings,
                    if warnings == 1 { "" } else { "s" }
                );
            }
            if report.has_errors() {
                std::process::exit(1);
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Run one fan-out stage on its own, as the watch loop would.
fn run_one(
    root: &std::path::Path,
    stage: paths::StageId,
    mode: Mode,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = config::load_config(root)?;
    let report = pipeline::run_stage(root, &config, stage, mode)?;
    output::print_stage_report(&report);
    Ok(())
}
