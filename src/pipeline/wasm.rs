//! Wasm compilation via `wasm-pack`.
//!
//! Runs `wasm-pack build --target web` inside the wasm crate, then places
//! the compiled module under `wasm/` in the staging tree with a content
//! hash in its name, and the loader glue under `js/` with its module
//! reference rewritten to the hashed location. Any failure here is fatal;
//! the packaged app is unusable without its module.

use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use jwalk::WalkDir;

use crate::{
    core::BuildMode,
    error::BuildError,
    log,
    paths::PathRegistry,
    utils::{exec::Cmd, hash},
};

/// Artifacts produced by the wasm stage, as staging-relative paths.
#[derive(Debug)]
pub struct CompiledWasm {
    /// Hashed module under `wasm/`.
    pub module: PathBuf,
    /// Loader glue under `js/`.
    pub loader: PathBuf,
}

/// Run the wasm compile stage.
pub(super) fn compile_wasm(mode: BuildMode, paths: &PathRegistry) -> Result<CompiledWasm> {
    if which::which("wasm-pack").is_err() {
        return Err(BuildError::ToolchainMissing {
            tool: "wasm-pack",
            hint: "install it with `cargo install wasm-pack`",
        }
        .into());
    }

    log!("build"; "compiling wasm crate ({})", mode.as_str());

    let mut cmd = Cmd::new("wasm-pack")
        .args(["build", "--target", "web", "--out-dir"])
        .arg(paths.wasm_pkg_dir())
        .cwd(paths.wasm_crate_dir())
        .pty(true);
    if !mode.is_production() {
        cmd = cmd.arg("--dev");
    }
    cmd.run()
        .map_err(|e| BuildError::Compile(format!("{e:#}")))?;

    place_artifacts(paths)
}

/// Copy the compiled module and loader glue into the staging tree.
fn place_artifacts(paths: &PathRegistry) -> Result<CompiledWasm> {
    let module_src = locate_module(paths).ok_or_else(|| {
        BuildError::Compile(format!(
            "no `*_bg.wasm` produced under {}",
            paths.wasm_pkg_dir().display()
        ))
    })?;

    let module_bytes = fs::read(&module_src)
        .with_context(|| format!("Failed to read {}", module_src.display()))?;
    let module_name = hashed_module_name(
        &module_src.file_stem().unwrap_or_default().to_string_lossy(),
        &hash::content_key(&module_bytes),
    );

    let module_rel = PathBuf::from("wasm").join(&module_name);
    let module_dst = paths.staging_dir().join(&module_rel);
    fs::create_dir_all(module_dst.parent().unwrap_or(paths.staging_dir()))?;
    fs::write(&module_dst, &module_bytes)
        .with_context(|| format!("Failed to write {}", module_dst.display()))?;

    // wasm-pack names the glue after the crate: `<name>.js` next to
    // `<name>_bg.wasm`.
    let loader_src = loader_for(&module_src);
    let glue = fs::read_to_string(&loader_src)
        .with_context(|| format!("Failed to read {}", loader_src.display()))?;
    let original_name = module_src
        .file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .into_owned();
    let rewritten = rewrite_loader(&glue, &original_name, &module_name);

    let loader_rel =
        PathBuf::from("js").join(loader_src.file_name().unwrap_or_default());
    let loader_dst = paths.staging_dir().join(&loader_rel);
    fs::create_dir_all(loader_dst.parent().unwrap_or(paths.staging_dir()))?;
    fs::write(&loader_dst, rewritten)
        .with_context(|| format!("Failed to write {}", loader_dst.display()))?;

    log!("build"; "wasm module -> {}", module_rel.display());
    Ok(CompiledWasm {
        module: module_rel,
        loader: loader_rel,
    })
}

/// The wasm-pack output directory contains exactly one compiled module.
fn locate_module(paths: &PathRegistry) -> Option<PathBuf> {
    WalkDir::new(paths.wasm_pkg_dir())
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path())
        .find(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with("_bg.wasm"))
        })
}

fn loader_for(module_src: &std::path::Path) -> PathBuf {
    let stem = module_src
        .file_stem()
        .unwrap_or_default()
        .to_string_lossy();
    let glue_name = format!("{}.js", stem.trim_end_matches("_bg"));
    module_src.with_file_name(glue_name)
}

/// `app_bg` + content key -> `app_bg.1a2b3c4d5e6f7a8b.wasm`
fn hashed_module_name(stem: &str, key: &str) -> String {
    format!("{stem}.{key}.wasm")
}

/// Point the glue at the hashed module location. The loader lives under
/// `js/`, the module under `wasm/`, hence the relative prefix.
fn rewrite_loader(glue: &str, original_name: &str, hashed_name: &str) -> String {
    glue.replace(original_name, &format!("../wasm/{hashed_name}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProjectConfig;

    #[test]
    fn hashed_name_keeps_stem_and_extension() {
        let name = hashed_module_name("viewer_bg", "0011223344556677");
        assert_eq!(name, "viewer_bg.0011223344556677.wasm");
    }

    #[test]
    fn loader_references_are_rewritten() {
        let glue = "input = new URL('viewer_bg.wasm', import.meta.url);";
        let out = rewrite_loader(glue, "viewer_bg.wasm", "viewer_bg.aabb.wasm");
        assert!(out.contains("'../wasm/viewer_bg.aabb.wasm'"));
        assert!(!out.contains("'viewer_bg.wasm'"));
    }

    #[test]
    fn module_is_found_among_pkg_noise() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ProjectConfig::default();
        config.root = dir.path().to_path_buf();
        let paths = PathRegistry::new(&config);

        fs::create_dir_all(paths.wasm_pkg_dir()).unwrap();
        fs::write(paths.wasm_pkg_dir().join("package.json"), "{}").unwrap();
        fs::write(paths.wasm_pkg_dir().join("viewer.js"), "").unwrap();
        fs::write(paths.wasm_pkg_dir().join("viewer_bg.wasm"), [0u8; 4]).unwrap();

        let found = locate_module(&paths).unwrap();
        assert_eq!(
            found.file_name().and_then(|n| n.to_str()),
            Some("viewer_bg.wasm")
        );
    }

    #[test]
    fn artifacts_land_in_staging_under_their_reported_paths() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ProjectConfig::default();
        config.root = dir.path().to_path_buf();
        let paths = PathRegistry::new(&config);

        fs::create_dir_all(paths.wasm_pkg_dir()).unwrap();
        fs::write(paths.wasm_pkg_dir().join("viewer_bg.wasm"), b"\x00asm").unwrap();
        fs::write(
            paths.wasm_pkg_dir().join("viewer.js"),
            "input = new URL('viewer_bg.wasm', import.meta.url);",
        )
        .unwrap();
        fs::create_dir_all(paths.staging_dir()).unwrap();

        let compiled = place_artifacts(&paths).unwrap();
        assert!(paths.staging_dir().join(&compiled.module).is_file());
        assert!(paths.staging_dir().join(&compiled.loader).is_file());
        assert!(compiled.module.starts_with("wasm"));
        assert_eq!(compiled.loader, PathBuf::from("js/viewer.js"));

        let glue =
            fs::read_to_string(paths.staging_dir().join(&compiled.loader)).unwrap();
        let module_name = compiled.module.file_name().unwrap().to_string_lossy();
        assert!(glue.contains(&format!("../wasm/{module_name}")));
    }

    #[test]
    fn loader_path_derives_from_module_path() {
        let loader = loader_for(std::path::Path::new("/pkg/viewer_bg.wasm"));
        assert_eq!(loader, PathBuf::from("/pkg/viewer.js"));
    }
}
