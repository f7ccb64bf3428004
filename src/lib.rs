//! # Weft
//!
//! An asset pipeline and dev server for hand-built static sites. Your
//! source tree is the data source: HTML templates, stylesheets, scripts
//! and plain assets live side by side under `src/`, and weft turns them
//! into a servable `dist/` tree during development or a minified `build/`
//! package for deployment.
//!
//! # Architecture: Stage Fan-Out
//!
//! Every source file belongs to exactly one stage, decided by extension:
//!
//! ```text
//! src/**/*.html   →  templates   render, prettify        →  dist/
//! src/**/*.css    →  styles      bundle, prefix, minify  →  dist/
//! src/**/*.js     →  scripts     bundle from the entry   →  dist/
//! src/**  (rest)  →  copy        byte-identical copy     →  dist/
//! ```
//!
//! Because the stages own disjoint slices of the tree they run in
//! parallel, and the watcher can map any changed file to the one stage
//! that must re-run. Files and directories prefixed `_` are partials:
//! inputs to their stage (imported, included) but never outputs.
//!
//! The production sequence adds a packaging tail: `dist/` is copied to
//! `build/`, scripts are minified on the way, and `dist/` is removed so
//! only the deployable tree remains.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | `weft.toml` loading, defaults, validation, browser targets |
//! | [`paths`] | the ownership table: extension globs, partials, stage inputs |
//! | [`pipeline`] | the task plans and their scheduler: parallel fan-out, failure policy |
//! | [`stages`] | the stages themselves: templates, styles, scripts, copy, sitemap, minify, lint |
//! | [`html`] | HTML prettifier applied to rendered pages |
//! | [`clean`] | removal of the generated trees |
//! | [`serve`] | dev HTTP server with WebSocket live reload |
//! | [`watch`] | debounced source watching, change-to-stage routing |
//! | [`output`] | CLI output formatting — per-stage `input → output` listings |
//!
//! # Design Decisions
//!
//! ## Two Output Trees
//!
//! `dist/` is the development tree: readable output, sourcemaps, a
//! sitemap, served with live reload. `build/` is the deployable package:
//! media queries grouped, scripts minified, no maps. Keeping them apart
//! means a dev server can stay up while a production build runs, and a
//! deployment can never accidentally ship sourcemaps.
//!
//! ## No Transpilation
//!
//! The script bundler resolves ES module syntax into a single
//! CommonJS-style file but does not rewrite the JavaScript itself. What
//! you write is what ships; the configured browser targets drive CSS
//! prefixing only.
//!
//! ## Errors Are Scoped to Their File
//!
//! During development a broken template or stylesheet fails that one
//! file: the stage logs it, finishes its other inputs, and the watcher
//! keeps running. Only the production sequence treats a stage error as
//! fatal, because a package with holes in it is worse than none.

pub mod clean;
pub mod config;
pub mod html;
pub mod output;
pub mod paths;
pub mod pipeline;
pub mod serve;
pub mod stages;
pub mod watch;
