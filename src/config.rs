//! Project configuration module.
//!
//! Handles loading and validating `weft.toml`. Every option has a stock
//! default, so a project with no config file at all still builds: `src/`
//! in, `dist/` out, `build/` for the packaged deliverable.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [paths]
//! source = "src"            # Source tree root
//! dist = "dist"             # Development output tree
//! build = "build"           # Packaged deliverable tree
//! sourcemaps = "sourcemaps" # CSS source map subdirectory (under dist)
//!
//! [templates]
//! rootpath = false          # asset(): false = file-relative, true = root-relative
//! indent_size = 2           # Pretty-printer indent width (spaces, never tabs)
//! max_preserve_newlines = 1 # Max consecutive newlines kept between elements
//!
//! [styles.targets]          # Minimum browser versions for vendor prefixing
//! ie = "11"
//! android = "4"
//! ios_saf = "8"
//! chrome = "109"
//! firefox = "102"
//! safari = "15.6"
//! edge = "109"
//!
//! [scripts]
//! entry = "js/main.js"      # Bundle entry point (source-relative)
//! bundle = "js/bundle.js"   # Bundle output (dist-relative)
//!
//! [server]
//! port = 3000
//! # start_path = "/about.html"    # Optional: where / redirects during development
//!
//! [sitemap]
//! site_url = "./"
//! exclude = "_filelist.html"      # Listing page left out of the sitemap
//!
//! [lint]
//! no_console = true         # Warn on console.* calls
//! notify = true             # Raise a desktop notification on violations
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse — override just the values you want. Unknown keys
//! are rejected to catch typos early.

use lightningcss::targets::Browsers;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Filename of the project configuration file.
pub const CONFIG_FILE: &str = "weft.toml";

/// Source files whose name starts with this prefix are partials: consumed
/// only via template includes or stylesheet imports, never rendered to an
/// output file of their own.
pub const PARTIAL_PREFIX: &str = "_";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Project configuration loaded from `weft.toml`.
///
/// All fields have sensible defaults. User config files need only specify
/// the values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub paths: PathsConfig,
    pub templates: TemplatesConfig,
    pub styles: StylesConfig,
    pub scripts: ScriptsConfig,
    pub server: ServerConfig,
    pub sitemap: SitemapConfig,
    pub lint: LintConfig,
}

impl Config {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.templates.indent_size == 0 || self.templates.indent_size > 8 {
            return Err(ConfigError::Validation(
                "templates.indent_size must be 1-8".into(),
            ));
        }
        if self.scripts.entry.trim().is_empty() {
            return Err(ConfigError::Validation(
                "scripts.entry must not be empty".into(),
            ));
        }
        if self.server.port == 0 {
            return Err(ConfigError::Validation("server.port must be non-zero".into()));
        }
        self.styles.targets.browsers().map(|_| ())
    }
}

/// Directory layout: where sources live and where the two output trees go.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    /// Source tree root, relative to the project root.
    pub source: PathBuf,
    /// Development output tree.
    pub dist: PathBuf,
    /// Packaged deliverable tree (produced only by `weft build`).
    pub build: PathBuf,
    /// Subdirectory of `dist` receiving CSS source maps in dev mode.
    pub sourcemaps: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            source: PathBuf::from("src"),
            dist: PathBuf::from("dist"),
            build: PathBuf::from("build"),
            sourcemaps: PathBuf::from("sourcemaps"),
        }
    }
}

/// Template stage settings: path helper mode and pretty-printer policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TemplatesConfig {
    /// `asset()` resolution mode: `false` emits file-relative paths
    /// (resolved by the browser against the page's own directory), `true`
    /// emits root-relative paths (`/` + path normalized against the site
    /// root).
    pub rootpath: bool,
    /// Pretty-printer indent width in spaces.
    pub indent_size: usize,
    /// Maximum consecutive newlines preserved between elements. The stock
    /// value of 1 collapses all blank lines.
    pub max_preserve_newlines: usize,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            rootpath: false,
            indent_size: 2,
            max_preserve_newlines: 1,
        }
    }
}

/// Style stage settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StylesConfig {
    /// Minimum browser versions driving vendor prefixing and syntax
    /// lowering.
    pub targets: BrowserTargets,
}

/// Minimum browser versions, as `"major"` or `"major.minor"` strings.
///
/// Absent browsers are not targeted. The stock matrix mirrors a
/// conservative agency support list: IE 11, Android 4, iOS Safari 8, plus
/// pinned evergreen versions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrowserTargets {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub android: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chrome: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edge: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firefox: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ie: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ios_saf: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub opera: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub safari: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub samsung: Option<String>,
}

impl Default for BrowserTargets {
    fn default() -> Self {
        Self {
            android: Some("4".into()),
            chrome: Some("109".into()),
            edge: Some("109".into()),
            firefox: Some("102".into()),
            ie: Some("11".into()),
            ios_saf: Some("8".into()),
            opera: None,
            safari: Some("15.6".into()),
            samsung: None,
        }
    }
}

impl BrowserTargets {
    /// Convert to lightningcss's packed-version target set.
    pub fn browsers(&self) -> Result<Browsers, ConfigError> {
        let parse = |name: &str, v: &Option<String>| -> Result<Option<u32>, ConfigError> {
            match v {
                None => Ok(None),
                Some(s) => parse_browser_version(s).map(Some).ok_or_else(|| {
                    ConfigError::Validation(format!(
                        "styles.targets.{name}: invalid version \"{s}\""
                    ))
                }),
            }
        };
        Ok(Browsers {
            android: parse("android", &self.android)?,
            chrome: parse("chrome", &self.chrome)?,
            edge: parse("edge", &self.edge)?,
            firefox: parse("firefox", &self.firefox)?,
            ie: parse("ie", &self.ie)?,
            ios_saf: parse("ios_saf", &self.ios_saf)?,
            opera: parse("opera", &self.opera)?,
            safari: parse("safari", &self.safari)?,
            samsung: parse("samsung", &self.samsung)?,
        })
    }
}

/// Parse `"major"`, `"major.minor"` or `"major.minor.patch"` into the
/// packed `major << 16 | minor << 8 | patch` form lightningcss expects.
fn parse_browser_version(s: &str) -> Option<u32> {
    let mut parts = s.split('.');
    let major: u32 = parts.next()?.trim().parse().ok()?;
    let minor: u32 = match parts.next() {
        Some(p) => p.trim().parse().ok()?,
        None => 0,
    };
    let patch: u32 = match parts.next() {
        Some(p) => p.trim().parse().ok()?,
        None => 0,
    };
    if parts.next().is_some() || minor > 255 || patch > 255 {
        return None;
    }
    Some((major << 16) | (minor << 8) | patch)
}

/// Script stage settings: the single bundle entry and its output name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScriptsConfig {
    /// Bundle entry point, relative to the source root.
    pub entry: String,
    /// Bundle output path, relative to the dist root.
    pub bundle: String,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            entry: "js/main.js".into(),
            bundle: "js/bundle.js".into(),
        }
    }
}

/// Dev server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub port: u16,
    /// Optional: where `/` redirects during development. Unset, `/` serves
    /// `index.html` like any other directory request. Point it at a project
    /// landing or listing page if you ship one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_path: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            start_path: None,
        }
    }
}

/// Sitemap stage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SitemapConfig {
    /// Base URL joined in front of every page path.
    pub site_url: String,
    /// File name excluded from the sitemap (the dev listing page).
    pub exclude: String,
}

impl Default for SitemapConfig {
    fn default() -> Self {
        Self {
            site_url: "./".into(),
            exclude: "_filelist.html".into(),
        }
    }
}

/// Lint stage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LintConfig {
    /// Warn on `console.*` calls (warning severity, never fails the stage).
    pub no_console: bool,
    /// Raise a desktop notification when violations are found.
    pub notify: bool,
}

impl Default for LintConfig {
    fn default() -> Self {
        Self {
            no_console: true,
            notify: true,
        }
    }
}

/// Load `weft.toml` from the project root, falling back to stock defaults
/// when the file doesn't exist.
pub fn load_config(root: &Path) -> Result<Config, ConfigError> {
    let path = root.join(CONFIG_FILE);
    if !path.exists() {
        return Ok(Config::default());
    }
    let content = fs::read_to_string(&path)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// A stock `weft.toml` with every option documented, for `weft gen-config`.
pub fn stock_config_toml() -> String {
    let body = toml::to_string_pretty(&Config::default()).unwrap_or_default();
    // Serialized defaults, prefixed with a usage header. Keeps the printed
    // file in lockstep with the real defaults.
    format!(
        "# weft project configuration\n\
         #\n\
         # Every option is optional; the values below are the defaults.\n\
         # Delete anything you don't want to override.\n\n{body}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_config_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.paths.source, PathBuf::from("src"));
        assert_eq!(config.scripts.entry, "js/main.js");
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn stock_server_has_no_start_redirect() {
        // With no start_path, / falls through to dist/index.html — the
        // stock config must never redirect to a page no stage produces.
        assert_eq!(ServerConfig::default().start_path, None);
        let printed = stock_config_toml();
        assert!(!printed.contains("start_path"));
    }

    #[test]
    fn partial_config_overrides_only_named_values() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_FILE),
            "[server]\nport = 8080\n\n[templates]\nrootpath = true\n",
        )
        .unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.server.port, 8080);
        assert!(config.templates.rootpath);
        // untouched sections keep their defaults
        assert_eq!(config.paths.dist, PathBuf::from("dist"));
        assert_eq!(config.templates.indent_size, 2);
    }

    #[test]
    fn unknown_keys_rejected() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(CONFIG_FILE), "[server]\nprot = 8080\n").unwrap();
        assert!(load_config(tmp.path()).is_err());
    }

    #[test]
    fn browser_versions_pack_major_minor_patch() {
        assert_eq!(parse_browser_version("11"), Some(11 << 16));
        assert_eq!(parse_browser_version("15.6"), Some((15 << 16) | (6 << 8)));
        assert_eq!(
            parse_browser_version("1.2.3"),
            Some((1 << 16) | (2 << 8) | 3)
        );
        assert_eq!(parse_browser_version("nope"), None);
        assert_eq!(parse_browser_version("1.999"), None);
    }

    #[test]
    fn default_targets_build_browsers() {
        let browsers = BrowserTargets::default().browsers().unwrap();
        assert_eq!(browsers.ie, Some(11 << 16));
        assert_eq!(browsers.android, Some(4 << 16));
        assert_eq!(browsers.ios_saf, Some(8 << 16));
        assert_eq!(browsers.opera, None);
    }

    #[test]
    fn stock_config_parses_back() {
        let printed = stock_config_toml();
        let parsed: Config = toml::from_str(&printed).unwrap();
        assert_eq!(parsed.sitemap.exclude, "_filelist.html");
    }

    #[test]
    fn validation_catches_bad_indent() {
        let config = Config {
            templates: TemplatesConfig {
                indent_size: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
