//! The build stages.
//!
//! Each stage is a module with a `run(root, config)` entry point that
//! returns a stage-specific report, plus a stage-specific error enum.
//! Stages read from the source tree and write to the dist tree (or, for
//! the production-only stages, from dist into the package tree); none of
//! them touches another stage's outputs. Sequencing lives in
//! [`crate::pipeline`].

pub mod copy;
pub mod lint;
pub mod minify;
pub mod scripts;
pub mod sitemap;
pub mod styles;
pub mod templates;
