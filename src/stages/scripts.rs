//! Script stage: bundles the JS entry point into a single file.
//!
//! A deliberately small bundler in the classic CommonJS-wrapper style: the
//! configured entry (`scripts.entry`, `js/main.js` by default) is walked
//! depth-first through its statically-resolvable relative imports, each
//! module is wrapped in a `function (module, exports, require)` closure,
//! and the whole graph is emitted as one self-executing bundle at
//! `scripts.bundle` under the dist tree.
//!
//! Supported import forms (rewritten to `require()` against resolved
//! module ids):
//!
//! - `import x from './m'` / `import * as ns from './m'`
//! - `import { a, b as c } from './m'`
//! - `import './m'` (side effect only)
//! - `export { a } from './m'`
//! - `require('./m')`
//!
//! `export` declarations become `exports.*` assignments; `export default`
//! becomes `module.exports`. Only relative specifiers are allowed — there
//! is no package resolution, no code splitting and no tree shaking. A bare
//! specifier or an unresolvable path fails the stage; nothing is partially
//! written.

use crate::config::Config;
use crate::paths;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Entry script not found: {0}")]
    EntryMissing(PathBuf),
    #[error("Cannot resolve import \"{spec}\" from {from}")]
    Unresolved { from: PathBuf, spec: String },
    #[error("Bare import \"{spec}\" in {from}: only relative imports are bundled")]
    Bare { from: PathBuf, spec: String },
    #[error("Circular import involving {0}")]
    Cycle(String),
}

#[derive(Debug, Default)]
pub struct ScriptReport {
    /// Module ids in emission (post-)order; the entry is last.
    pub modules: Vec<String>,
    /// Dist-relative bundle path.
    pub output: PathBuf,
}

struct ImportScanner {
    import_from: Regex,
    import_side_effect: Regex,
    export_from: Regex,
    export_decl: Regex,
    export_default: Regex,
    export_names: Regex,
    require: Regex,
}

impl ImportScanner {
    fn new() -> Self {
        // Line-anchored statement forms; require() is matched anywhere.
        Self {
            import_from: Regex::new(
                r#"(?m)^[ \t]*import\s+(?P<bind>[\w$]+|\*\s+as\s+[\w$]+|\{[^}]*\})\s+from\s+['"](?P<spec>[^'"]+)['"];?[ \t]*$"#,
            )
            .unwrap(),
            import_side_effect: Regex::new(
                r#"(?m)^[ \t]*import\s+['"](?P<spec>[^'"]+)['"];?[ \t]*$"#,
            )
            .unwrap(),
            export_from: Regex::new(
                r#"(?m)^[ \t]*export\s+\{(?P<names>[^}]*)\}\s+from\s+['"](?P<spec>[^'"]+)['"];?[ \t]*$"#,
            )
            .unwrap(),
            export_decl: Regex::new(
                r"(?m)^[ \t]*export\s+(?P<kind>const|let|var|function|class)\s+(?P<name>[\w$]+)",
            )
            .unwrap(),
            export_default: Regex::new(r"(?m)^[ \t]*export\s+default\s+").unwrap(),
            export_names: Regex::new(r"(?m)^[ \t]*export\s+\{(?P<names>[^}]*)\};?[ \t]*$").unwrap(),
            require: Regex::new(r#"require\(\s*['"](?P<spec>[^'"]+)['"]\s*\)"#).unwrap(),
        }
    }
}

/// Bundle the configured entry point into `dist/<scripts.bundle>`.
pub fn run(root: &Path, config: &Config) -> Result<ScriptReport, ScriptError> {
    let source = root.join(&config.paths.source);
    let dist = root.join(&config.paths.dist);

    let entry_rel = PathBuf::from(&config.scripts.entry);
    if !source.join(&entry_rel).is_file() {
        return Err(ScriptError::EntryMissing(entry_rel));
    }

    let scanner = ImportScanner::new();
    let mut modules: HashMap<String, String> = HashMap::new();
    let mut order: Vec<String> = Vec::new();
    let mut in_stack: HashSet<String> = HashSet::new();
    visit(
        &source,
        &entry_rel,
        &scanner,
        &mut modules,
        &mut order,
        &mut in_stack,
    )?;

    let entry_id = paths::slash(&entry_rel);
    let bundle = emit(&entry_id, &order, &modules);

    let out_rel = PathBuf::from(&config.scripts.bundle);
    let out = dist.join(&out_rel);
    if let Some(parent) = out.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&out, bundle)?;
    debug!(entry = %entry_id, modules = order.len(), "bundled");

    Ok(ScriptReport {
        modules: order,
        output: out_rel,
    })
}

/// Depth-first, post-order module walk with cycle detection.
fn visit(
    source: &Path,
    rel: &Path,
    scanner: &ImportScanner,
    modules: &mut HashMap<String, String>,
    order: &mut Vec<String>,
    in_stack: &mut HashSet<String>,
) -> Result<(), ScriptError> {
    let id = paths::slash(rel);
    if modules.contains_key(&id) {
        return Ok(());
    }
    if !in_stack.insert(id.clone()) {
        return Err(ScriptError::Cycle(id));
    }

    let code = fs::read_to_string(source.join(rel))?;

    // Resolve every specifier first so dependencies are emitted before the
    // importer, then rewrite the module body against the resolved ids.
    let mut resolved: HashMap<String, String> = HashMap::new();
    for spec in scan_specs(scanner, &code) {
        let dep_rel = resolve(source, rel, &spec)?;
        visit(source, &dep_rel, scanner, modules, order, in_stack)?;
        resolved.insert(spec, paths::slash(&dep_rel));
    }

    let body = rewrite(scanner, &code, &resolved);
    modules.insert(id.clone(), body);
    order.push(id.clone());
    in_stack.remove(&id);
    Ok(())
}

fn scan_specs(scanner: &ImportScanner, code: &str) -> Vec<String> {
    let mut specs = Vec::new();
    for re in [
        &scanner.import_from,
        &scanner.import_side_effect,
        &scanner.export_from,
        &scanner.require,
    ] {
        for caps in re.captures_iter(code) {
            specs.push(caps["spec"].to_string());
        }
    }
    specs.sort();
    specs.dedup();
    specs
}

/// Resolve a specifier relative to the importing module. Tries the exact
/// path, then `.js`, then `/index.js`.
fn resolve(source: &Path, from: &Path, spec: &str) -> Result<PathBuf, ScriptError> {
    if !spec.starts_with("./") && !spec.starts_with("../") {
        return Err(ScriptError::Bare {
            from: from.to_path_buf(),
            spec: spec.to_string(),
        });
    }
    let base = from.parent().unwrap_or(Path::new(""));
    let target = normalize(&base.join(spec));
    let candidates = [
        target.clone(),
        PathBuf::from(format!("{}.js", target.display())),
        target.join("index.js"),
    ];
    for candidate in candidates {
        if source.join(&candidate).is_file() {
            return Ok(candidate);
        }
    }
    Err(ScriptError::Unresolved {
        from: from.to_path_buf(),
        spec: spec.to_string(),
    })
}

/// Collapse `.` and `..` components without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut parts: Vec<std::ffi::OsString> = Vec::new();
    for component in path.components() {
        match component {
            std::path::Component::CurDir => {}
            std::path::Component::ParentDir => {
                parts.pop();
            }
            other => parts.push(other.as_os_str().to_os_string()),
        }
    }
    parts.iter().collect()
}

/// Rewrite import/export statements into the CommonJS wrapper dialect.
fn rewrite(scanner: &ImportScanner, code: &str, resolved: &HashMap<String, String>) -> String {
    let id_of = |spec: &str| -> String {
        resolved.get(spec).cloned().unwrap_or_else(|| spec.to_string())
    };

    let mut out = scanner
        .import_from
        .replace_all(code, |caps: &regex::Captures| {
            let bind = caps["bind"].trim();
            let id = id_of(&caps["spec"]);
            if let Some(ns) = bind.strip_prefix('*') {
                let name = ns.trim().trim_start_matches("as").trim();
                format!("var {name} = require(\"{id}\");")
            } else if bind.starts_with('{') {
                let pattern = bind.replace(" as ", ": ");
                format!("var {pattern} = require(\"{id}\");")
            } else {
                format!("var {bind} = require(\"{id}\");")
            }
        })
        .into_owned();

    out = scanner
        .import_side_effect
        .replace_all(&out, |caps: &regex::Captures| {
            format!("require(\"{}\");", id_of(&caps["spec"]))
        })
        .into_owned();

    out = scanner
        .export_from
        .replace_all(&out, |caps: &regex::Captures| {
            let id = id_of(&caps["spec"]);
            reexports(&caps["names"], &format!("require(\"{id}\")"))
        })
        .into_owned();

    // Collect declared export names before stripping the keyword.
    let mut named: Vec<String> = scanner
        .export_decl
        .captures_iter(&out)
        .map(|c| c["name"].to_string())
        .collect();
    out = scanner.export_decl.replace_all(&out, "$kind $name").into_owned();

    out = scanner
        .export_names
        .replace_all(&out, |caps: &regex::Captures| {
            let mut lines = Vec::new();
            for name in caps["names"].split(',') {
                let name = name.trim();
                if name.is_empty() {
                    continue;
                }
                match name.split_once(" as ") {
                    Some((local, exported)) => {
                        lines.push(format!("exports.{} = {};", exported.trim(), local.trim()))
                    }
                    None => lines.push(format!("exports.{name} = {name};")),
                }
            }
            lines.join(" ")
        })
        .into_owned();

    out = scanner
        .export_default
        .replace_all(&out, "module.exports = ")
        .into_owned();

    // Rewrite require specifiers last so hand-written require('./x') also
    // points at resolved ids.
    out = scanner
        .require
        .replace_all(&out, |caps: &regex::Captures| {
            format!("require(\"{}\")", id_of(&caps["spec"]))
        })
        .into_owned();

    named.sort();
    named.dedup();
    if !named.is_empty() {
        out.push('\n');
        for name in named {
            out.push_str(&format!("exports.{name} = {name};\n"));
        }
    }
    out
}

fn reexports(names: &str, require_expr: &str) -> String {
    let mut lines = Vec::new();
    for name in names.split(',') {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        match name.split_once(" as ") {
            Some((remote, local)) => lines.push(format!(
                "exports.{} = {}.{};",
                local.trim(),
                require_expr,
                remote.trim()
            )),
            None => lines.push(format!("exports.{name} = {require_expr}.{name};")),
        }
    }
    lines.join(" ")
}

/// Emit the self-executing bundle: a module table keyed by id, a tiny
/// require cache, and a kick-off call for the entry.
fn emit(entry: &str, order: &[String], modules: &HashMap<String, String>) -> String {
    let mut out = String::new();
    out.push_str("(function (modules) {\n");
    out.push_str("  var installed = {};\n");
    out.push_str("  function require(id) {\n");
    out.push_str("    if (installed[id]) { return installed[id].exports; }\n");
    out.push_str("    var module = (installed[id] = { exports: {} });\n");
    out.push_str("    modules[id](module, module.exports, require);\n");
    out.push_str("    return module.exports;\n");
    out.push_str("  }\n");
    out.push_str(&format!("  require(\"{entry}\");\n"));
    out.push_str("})({\n");
    for id in order {
        out.push_str(&format!(
            "\"{id}\": function (module, exports, require) {{\n{}\n}},\n",
            modules[id]
        ));
    }
    out.push_str("});\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn project(config: &Config) -> TempDir {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join(&config.paths.source)).unwrap();
        tmp
    }

    fn write_src(tmp: &TempDir, config: &Config, rel: &str, content: &str) {
        let path = tmp.path().join(&config.paths.source).join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn bundle_of(tmp: &TempDir, config: &Config) -> String {
        fs::read_to_string(tmp.path().join("dist").join(&config.scripts.bundle)).unwrap()
    }

    #[test]
    fn bundles_entry_with_relative_import() {
        let config = Config::default();
        let tmp = project(&config);
        write_src(&tmp, &config, "js/util.js", "export function greet() { return 'hi'; }\n");
        write_src(
            &tmp,
            &config,
            "js/main.js",
            "import { greet } from './util';\ndocument.title = greet();\n",
        );

        let report = run(tmp.path(), &config).unwrap();
        assert_eq!(report.modules, vec!["js/util.js", "js/main.js"]);

        let bundle = bundle_of(&tmp, &config);
        assert!(bundle.contains("\"js/util.js\": function (module, exports, require)"));
        assert!(bundle.contains("var { greet } = require(\"js/util.js\");"));
        assert!(bundle.contains("exports.greet = greet;"));
        assert!(bundle.contains("require(\"js/main.js\");"));
    }

    #[test]
    fn default_export_becomes_module_exports() {
        let config = Config::default();
        let tmp = project(&config);
        write_src(&tmp, &config, "js/answer.js", "export default 42;\n");
        write_src(
            &tmp,
            &config,
            "js/main.js",
            "import answer from './answer.js';\nuse(answer);\n",
        );

        run(tmp.path(), &config).unwrap();
        let bundle = bundle_of(&tmp, &config);
        assert!(bundle.contains("module.exports = 42;"));
        assert!(bundle.contains("var answer = require(\"js/answer.js\");"));
    }

    #[test]
    fn commonjs_require_is_resolved() {
        let config = Config::default();
        let tmp = project(&config);
        write_src(&tmp, &config, "js/lib/index.js", "module.exports = 1;\n");
        write_src(&tmp, &config, "js/main.js", "var one = require('./lib');\n");

        let report = run(tmp.path(), &config).unwrap();
        assert_eq!(report.modules, vec!["js/lib/index.js", "js/main.js"]);
        let bundle = bundle_of(&tmp, &config);
        assert!(bundle.contains("var one = require(\"js/lib/index.js\");"));
    }

    #[test]
    fn shared_dependency_emitted_once() {
        let config = Config::default();
        let tmp = project(&config);
        write_src(&tmp, &config, "js/shared.js", "export var n = 1;\n");
        write_src(&tmp, &config, "js/a.js", "import { n } from './shared';\nexport var a = n;\n");
        write_src(
            &tmp,
            &config,
            "js/main.js",
            "import { a } from './a';\nimport { n } from './shared';\n",
        );

        let report = run(tmp.path(), &config).unwrap();
        let shared_count = report.modules.iter().filter(|m| *m == "js/shared.js").count();
        assert_eq!(shared_count, 1);
    }

    #[test]
    fn bare_import_is_an_error() {
        let config = Config::default();
        let tmp = project(&config);
        write_src(&tmp, &config, "js/main.js", "import _ from 'lodash';\n");
        let err = run(tmp.path(), &config).unwrap_err();
        assert!(matches!(err, ScriptError::Bare { .. }));
    }

    #[test]
    fn missing_entry_is_an_error() {
        let config = Config::default();
        let tmp = project(&config);
        let err = run(tmp.path(), &config).unwrap_err();
        assert!(matches!(err, ScriptError::EntryMissing(_)));
    }

    #[test]
    fn circular_import_is_an_error() {
        let config = Config::default();
        let tmp = project(&config);
        write_src(&tmp, &config, "js/a.js", "import './b';\n");
        write_src(&tmp, &config, "js/b.js", "import './a';\n");
        write_src(&tmp, &config, "js/main.js", "import './a';\n");
        let err = run(tmp.path(), &config).unwrap_err();
        assert!(matches!(err, ScriptError::Cycle(_)));
    }

    #[test]
    fn alias_imports_and_exports() {
        let config = Config::default();
        let tmp = project(&config);
        write_src(
            &tmp,
            &config,
            "js/m.js",
            "var inner = 1;\nexport { inner as outer };\n",
        );
        write_src(
            &tmp,
            &config,
            "js/main.js",
            "import { outer as renamed } from './m';\n",
        );

        run(tmp.path(), &config).unwrap();
        let bundle = bundle_of(&tmp, &config);
        assert!(bundle.contains("exports.outer = inner;"));
        assert!(bundle.contains("var { outer: renamed } = require(\"js/m.js\");"));
    }
}
