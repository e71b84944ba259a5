//! Script and style bundling.
//!
//! Scripts under the source tree are lowered to the configured syntax
//! baseline with oxc and written under `js/` in the staging tree,
//! preserving their relative layout (TypeScript inputs come out as
//! `.js`). Development builds emit a source map sibling per script.
//!
//! Styles are parsed with lightningcss, lowered for the oldest supported
//! browser, and concatenated in path order into a single `css/app.css`.
//!
//! A failing entry script fails the build; any other asset that fails to
//! transform is reported and skipped so the rest of the tree still lands.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use lightningcss::{
    stylesheet::{ParserOptions, PrinterOptions, StyleSheet},
    targets::{Browsers, Targets},
};
use oxc::allocator::Allocator;
use oxc::codegen::{Codegen, CodegenOptions};
use oxc::parser::Parser;
use oxc::semantic::SemanticBuilder;
use oxc::span::SourceType;
use oxc::transformer::{TransformOptions, Transformer};

use crate::{
    config::ProjectConfig, core::BuildMode, debug, error::BuildError, log, paths::PathRegistry,
};

/// Oldest browser the packaged app supports (Chrome 48, the original
/// WebVOWL floor). lightningcss encodes versions as `major << 16`.
const OLDEST_CHROME: u32 = 48 << 16;

/// What the bundle stage produced.
#[derive(Debug, Default)]
pub struct BundleOutcome {
    /// Scripts written under `js/`.
    pub scripts: usize,
    /// Style sources merged into `css/app.css`.
    pub styles: usize,
    /// Per-asset failures that did not abort the stage.
    pub errors: Vec<BuildError>,
}

/// Run the bundle stage.
///
/// Fatal only when the configured entry script cannot be transformed;
/// every other per-asset failure is collected in the outcome.
pub(super) fn bundle(
    mode: BuildMode,
    config: &ProjectConfig,
    paths: &PathRegistry,
) -> Result<BundleOutcome> {
    let options = TransformOptions::from_target(&config.build.target)
        .map_err(|e| anyhow!("invalid build.target `{}`: {e}", config.build.target))?;

    let mut outcome = BundleOutcome::default();
    bundle_scripts(mode, config, paths, &options, &mut outcome)?;
    bundle_styles(paths, &mut outcome)?;
    Ok(outcome)
}

fn bundle_scripts(
    mode: BuildMode,
    config: &ProjectConfig,
    paths: &PathRegistry,
    options: &TransformOptions,
    outcome: &mut BundleOutcome,
) -> Result<()> {
    let entry = &config.build.entry;
    let mut entry_seen = false;

    for source_path in collect_sources(paths, &["js", "mjs", "ts"]) {
        let rel = source_path
            .strip_prefix(paths.source_dir())
            .unwrap_or(&source_path)
            .to_path_buf();
        let is_entry = rel == *entry;
        entry_seen |= is_entry;

        let out_path = paths.staging_dir().join("js").join(script_output_name(&rel));
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }

        match transform_script(&source_path, &out_path, options, mode) {
            Ok(output) => {
                fs::write(&out_path, output.code)
                    .with_context(|| format!("Failed to write {}", out_path.display()))?;
                if let Some(map) = output.map {
                    let map_path = sibling_map_path(&out_path);
                    fs::write(&map_path, map)
                        .with_context(|| format!("Failed to write {}", map_path.display()))?;
                }
                outcome.scripts += 1;
                debug!("build"; "bundled {}", rel.display());
            }
            Err(err) if is_entry => {
                return Err(anyhow!(err).context("entry script failed to bundle"));
            }
            Err(err) => {
                log!("error"; "{err}");
                outcome.errors.push(err);
            }
        }
    }

    // The generated markup references the entry unconditionally; a tree
    // without it would ship a dangling script reference.
    if !entry_seen {
        return Err(anyhow!(BuildError::Bundle {
            path: entry.clone(),
            reason: format!("entry script not found under {}", paths.source_dir().display()),
        }));
    }

    Ok(())
}

struct ScriptOutput {
    code: String,
    map: Option<String>,
}

/// Parse, lower to the target baseline, and print one script.
fn transform_script(
    source_path: &Path,
    out_path: &Path,
    options: &TransformOptions,
    mode: BuildMode,
) -> Result<ScriptOutput, BuildError> {
    let bundle_err = |reason: String| BuildError::Bundle {
        path: source_path.to_path_buf(),
        reason,
    };

    let source = fs::read_to_string(source_path).map_err(|e| bundle_err(e.to_string()))?;
    let source_type =
        SourceType::from_path(source_path).map_err(|e| bundle_err(e.to_string()))?;

    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, &source, source_type).parse();
    if !ret.errors.is_empty() {
        let reasons: Vec<String> = ret.errors.iter().map(|e| e.to_string()).collect();
        return Err(bundle_err(reasons.join("; ")));
    }
    let mut program = ret.program;

    let scoping = SemanticBuilder::new()
        .build(&program)
        .semantic
        .into_scoping();
    let ret = Transformer::new(&allocator, source_path, options)
        .build_with_scoping(scoping, &mut program);
    if !ret.errors.is_empty() {
        let reasons: Vec<String> = ret.errors.iter().map(|e| e.to_string()).collect();
        return Err(bundle_err(reasons.join("; ")));
    }

    let codegen_options = CodegenOptions {
        source_map_path: mode
            .source_maps()
            .then(|| source_path.to_path_buf()),
        ..CodegenOptions::default()
    };
    let ret = Codegen::new().with_options(codegen_options).build(&program);

    let mut code = ret.code;
    let map = ret.map.map(|map| map.to_json_string());
    if map.is_some() {
        let map_name = sibling_map_name(out_path);
        code.push_str(&format!("\n//# sourceMappingURL={map_name}\n"));
    }

    Ok(ScriptOutput { code, map })
}

fn bundle_styles(paths: &PathRegistry, outcome: &mut BundleOutcome) -> Result<()> {
    let sources = collect_sources(paths, &["css"]);
    if sources.is_empty() {
        return Ok(());
    }

    let targets = Targets::from(Browsers {
        chrome: Some(OLDEST_CHROME),
        ..Browsers::default()
    });

    let mut merged = String::new();
    for source_path in &sources {
        match transform_style(source_path, targets) {
            Ok(css) => {
                merged.push_str(&css);
                merged.push('\n');
                outcome.styles += 1;
            }
            Err(err) => {
                log!("error"; "{err}");
                outcome.errors.push(err);
            }
        }
    }

    let css_dir = paths.staging_dir().join("css");
    fs::create_dir_all(&css_dir)?;
    let out_path = css_dir.join("app.css");
    fs::write(&out_path, merged)
        .with_context(|| format!("Failed to write {}", out_path.display()))?;
    Ok(())
}

fn transform_style(source_path: &Path, targets: Targets) -> Result<String, BuildError> {
    let bundle_err = |reason: String| BuildError::Bundle {
        path: source_path.to_path_buf(),
        reason,
    };

    let source = fs::read_to_string(source_path).map_err(|e| bundle_err(e.to_string()))?;
    let stylesheet = StyleSheet::parse(&source, ParserOptions::default())
        .map_err(|e| bundle_err(e.to_string()))?;
    let result = stylesheet
        .to_css(PrinterOptions {
            targets,
            ..PrinterOptions::default()
        })
        .map_err(|e| bundle_err(e.to_string()))?;
    Ok(result.code)
}

/// Source files with one of the given extensions, in stable path order.
/// Static assets are copied verbatim elsewhere and never transformed.
fn collect_sources(paths: &PathRegistry, extensions: &[&str]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = jwalk::WalkDir::new(paths.source_dir())
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path())
        .filter(|p| !p.starts_with(paths.static_dir()))
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| extensions.contains(&ext))
        })
        .collect();
    files.sort();
    files
}

/// TypeScript inputs produce `.js` outputs; everything else keeps its name.
pub(super) fn script_output_name(rel: &Path) -> PathBuf {
    if rel.extension().and_then(|e| e.to_str()) == Some("ts") {
        rel.with_extension("js")
    } else {
        rel.to_path_buf()
    }
}

fn sibling_map_name(path: &Path) -> String {
    format!(
        "{}.map",
        path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default()
    )
}

fn sibling_map_path(out_path: &Path) -> PathBuf {
    let mut name = out_path.as_os_str().to_owned();
    name.push(".map");
    PathBuf::from(name)
}
