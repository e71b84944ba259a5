//! Resolved filesystem locations for the build pipeline and dev server.
//!
//! `PathRegistry` is an immutable value constructed once from the validated
//! `[paths]` config constants and handed explicitly to every component that
//! touches the filesystem. Pure joins, no I/O.

use std::path::{Path, PathBuf};

use crate::config::ProjectConfig;

/// Directory name for the staged build, a sibling of the deploy tree.
///
/// All stages write here; the deploy tree is swapped in only after every
/// fatal stage has succeeded, so a failed build never destroys a
/// previously good deployable tree.
const STAGING_SUFFIX: &str = ".staging";

/// Resolved project locations.
#[derive(Debug, Clone)]
pub struct PathRegistry {
    root: PathBuf,
    source: PathBuf,
    static_assets: PathBuf,
    ontology: PathBuf,
    deploy: PathBuf,
    staging: PathBuf,
    wasm_crate: PathBuf,
    wasm_pkg: PathBuf,
    dependencies: PathBuf,
}

impl PathRegistry {
    /// Resolve all locations against the project root.
    ///
    /// Malformed constants were already rejected by config validation, so
    /// this cannot fail.
    pub fn new(config: &ProjectConfig) -> Self {
        let root = config.root.clone();
        let deploy = root.join(&config.paths.deploy);

        let staging_name = deploy
            .file_name()
            .map(|n| format!("{}{STAGING_SUFFIX}", n.to_string_lossy()))
            .unwrap_or_else(|| format!("deploy{STAGING_SUFFIX}"));
        let staging = deploy.with_file_name(staging_name);

        Self {
            source: root.join(&config.paths.source),
            static_assets: root.join(&config.paths.static_assets),
            ontology: root.join(&config.paths.ontology),
            staging,
            deploy,
            wasm_crate: root.join(&config.paths.wasm_crate),
            wasm_pkg: root.join(&config.paths.wasm_pkg),
            dependencies: root.join(&config.paths.dependencies),
            root,
        }
    }

    /// Project root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Source code root.
    pub fn source_dir(&self) -> &Path {
        &self.source
    }

    /// Static assets (favicon, markup templates).
    pub fn static_dir(&self) -> &Path {
        &self.static_assets
    }

    /// Built-in ontology data files.
    pub fn ontology_dir(&self) -> &Path {
        &self.ontology
    }

    /// Deployable output tree.
    pub fn deploy_dir(&self) -> &Path {
        &self.deploy
    }

    /// Staging tree for in-progress builds.
    pub fn staging_dir(&self) -> &Path {
        &self.staging
    }

    /// Wasm crate root (the project root when `paths.wasm_crate` is empty).
    pub fn wasm_crate_dir(&self) -> &Path {
        &self.wasm_crate
    }

    /// Compiled wasm package output (binary + loader glue).
    pub fn wasm_pkg_dir(&self) -> &Path {
        &self.wasm_pkg
    }

    /// Dependency cache directory.
    pub fn dependency_dir(&self) -> &Path {
        &self.dependencies
    }
}
