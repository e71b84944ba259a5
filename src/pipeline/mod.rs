//! The build pipeline.
//!
//! Stages run as a fixed sequence over a staging tree:
//!
//! ```text
//! clean -> { compile-wasm || bundle } -> copy -> markup
//!       -> minify (production) -> compress (production) -> swap
//! ```
//!
//! Wasm compilation and script/style bundling are independent and run
//! concurrently. Everything is written into a staging directory next to
//! the deploy tree; only after every fatal stage succeeds is staging
//! swapped into place, so a failed build always leaves the previous
//! deploy tree intact.

mod assets;
mod bundle;
mod compress;
mod markup;
mod minify;
mod wasm;

pub use markup::display_name;

use std::{fs, path::Path, time::Instant};

use anyhow::{Context, Result};

use crate::{
    config::ProjectConfig, core::BuildMode, debug, error::BuildError, log, paths::PathRegistry,
};

/// Summary of a completed build.
#[derive(Debug, Default)]
pub struct BuildReport {
    pub scripts: usize,
    pub styles: usize,
    pub copied: usize,
    pub minified: usize,
    pub compressed: usize,
    /// Per-asset failures that did not abort the build.
    pub skipped: Vec<BuildError>,
}

/// Run a full build. On success the deploy tree holds the new artifact
/// set; on failure the previous deploy tree is untouched.
pub fn run(mode: BuildMode, config: &ProjectConfig, paths: &PathRegistry) -> Result<BuildReport> {
    let started = Instant::now();
    log!("build"; "building {} ({})", config.package.name, mode.as_str());

    prepare_staging(paths)?;

    let report = match run_stages(mode, config, paths) {
        Ok(report) => report,
        Err(err) => {
            // Leave no trace of the failed attempt.
            let _ = fs::remove_dir_all(paths.staging_dir());
            return Err(err);
        }
    };

    swap_into_place(paths)?;

    log!(
        "build";
        "done in {:.2}s ({} scripts, {} styles, {} copied)",
        started.elapsed().as_secs_f32(),
        report.scripts,
        report.styles,
        report.copied,
    );
    if !report.skipped.is_empty() {
        log!("warn"; "{} asset(s) skipped", report.skipped.len());
    }

    Ok(report)
}

fn run_stages(
    mode: BuildMode,
    config: &ProjectConfig,
    paths: &PathRegistry,
) -> Result<BuildReport> {
    let (wasm_result, bundle_result) = rayon::join(
        || wasm::compile_wasm(mode, paths),
        || bundle::bundle(mode, config, paths),
    );
    let compiled = wasm_result?;
    let bundled = bundle_result?;
    debug!(
        "build";
        "module {} loaded via {}",
        compiled.module.display(),
        compiled.loader.display(),
    );

    let copies = assets::copy_passthrough(paths);

    let entry = entry_reference(&config.build.entry);
    markup::generate_entry_markup(mode, config, paths, &entry)?;

    let mut report = BuildReport {
        scripts: bundled.scripts,
        styles: bundled.styles,
        copied: copies.copied,
        ..BuildReport::default()
    };
    report.skipped.extend(bundled.errors);
    report.skipped.extend(copies.errors);

    (report.minified, report.compressed) = optimize_artifacts(mode, config, paths)?;

    Ok(report)
}

/// Production-only tail of the pipeline: minify in place, then write
/// brotli siblings. Development trees get neither.
fn optimize_artifacts(
    mode: BuildMode,
    config: &ProjectConfig,
    paths: &PathRegistry,
) -> Result<(usize, usize)> {
    if !mode.is_production() {
        return Ok((0, 0));
    }
    let minified = minify::minify_staging(paths)?;
    let compressed =
        compress::compress_staging(paths.staging_dir(), config.build.keep_uncompressed)?;
    debug!("build"; "{} minified, {} compressed", minified, compressed);
    Ok((minified, compressed))
}

/// Clean stage: a stale staging tree from an interrupted build is
/// removed, never the deploy tree itself.
fn prepare_staging(paths: &PathRegistry) -> Result<()> {
    let staging = paths.staging_dir();
    if staging.exists() {
        fs::remove_dir_all(staging)
            .with_context(|| format!("Failed to clean {}", staging.display()))?;
    }
    for sub in ["js", "css", "wasm"] {
        fs::create_dir_all(staging.join(sub))?;
    }
    Ok(())
}

/// Atomically-ish replace the deploy tree with the staging tree. The old
/// tree is moved aside first so a rename failure can be rolled back.
fn swap_into_place(paths: &PathRegistry) -> Result<()> {
    let deploy = paths.deploy_dir();
    let staging = paths.staging_dir();
    let old = previous_tree_path(staging);

    let had_previous = deploy.exists();
    if had_previous {
        if old.exists() {
            fs::remove_dir_all(&old)?;
        }
        fs::rename(deploy, &old)
            .with_context(|| format!("Failed to move aside {}", deploy.display()))?;
    }

    if let Err(err) = fs::rename(staging, deploy) {
        if had_previous {
            let _ = fs::rename(&old, deploy);
        }
        return Err(err).with_context(|| format!("Failed to publish {}", deploy.display()));
    }

    if had_previous {
        let _ = fs::remove_dir_all(&old);
    }
    Ok(())
}

fn previous_tree_path(staging: &Path) -> std::path::PathBuf {
    let mut name = staging.as_os_str().to_owned();
    name.push(".old");
    std::path::PathBuf::from(name)
}

/// Staging-relative script reference for the generated markup.
fn entry_reference(entry: &Path) -> String {
    let name = bundle::script_output_name(entry);
    format!("js/{}", name.to_string_lossy().replace('\\', "/"))
}
