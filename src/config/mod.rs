//! Project configuration management for `vowlpack.toml`.
//!
//! # Sections
//!
//! | Section     | Purpose                                         |
//! |-------------|-------------------------------------------------|
//! | `[package]` | Packaged app identity (name, version, blurb)    |
//! | `[paths]`   | Logical locations consumed by `PathRegistry`    |
//! | `[build]`   | Entry point, script baseline, compress policy   |
//! | `[serve]`   | Dev server (port, watch, overlay, reconnect)    |
//!
//! The loaded value is immutable and passed explicitly into the pipeline
//! and dev server; there is no ambient global configuration.

mod error;
pub mod section;

pub use error::ConfigError;
pub use section::{BuildConfig, OverlayConfig, PackageConfig, PathsConfig, ServeConfig};

use crate::log;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Root configuration structure representing `vowlpack.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Absolute path to the config file (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Project root directory - parent of config file (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    /// Packaged application metadata
    pub package: PackageConfig,

    /// Logical filesystem locations
    pub paths: PathsConfig,

    /// Build pipeline settings
    pub build: BuildConfig,

    /// Development server settings
    pub serve: ServeConfig,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::new(),
            root: PathBuf::new(),
            package: PackageConfig::default(),
            paths: PathsConfig::default(),
            build: BuildConfig::default(),
            serve: ServeConfig::default(),
        }
    }
}

impl ProjectConfig {
    /// Load configuration from a `vowlpack.toml` path.
    ///
    /// A missing file yields the defaults rooted at the file's parent
    /// directory. Unknown keys are warned about, not rejected.
    pub fn load(config_path: &Path) -> Result<Self, ConfigError> {
        let root = project_root(config_path);

        let mut config = if config_path.is_file() {
            let raw = fs::read_to_string(config_path)
                .map_err(|e| ConfigError::Io(config_path.to_path_buf(), e))?;
            parse(&raw)?
        } else {
            Self::default()
        };

        config.config_path = config_path.to_path_buf();
        config.root = root;
        config.validate()?;
        Ok(config)
    }

    /// Reject malformed path constants early, before any stage reads them.
    fn validate(&self) -> Result<(), ConfigError> {
        let named = [
            ("paths.source", &self.paths.source),
            ("paths.static_assets", &self.paths.static_assets),
            ("paths.ontology", &self.paths.ontology),
            ("paths.deploy", &self.paths.deploy),
            ("paths.wasm_crate", &self.paths.wasm_crate),
            ("paths.wasm_pkg", &self.paths.wasm_pkg),
            ("paths.dependencies", &self.paths.dependencies),
        ];

        for (field, path) in named {
            if path.is_absolute() {
                return Err(ConfigError::Validation(format!(
                    "`{field}` must be relative to the project root, got `{}`",
                    path.display()
                )));
            }
            if path.components().any(|c| matches!(c, std::path::Component::ParentDir)) {
                return Err(ConfigError::Validation(format!(
                    "`{field}` must not escape the project root (`..` in `{}`)",
                    path.display()
                )));
            }
        }

        if self.package.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "`package.name` must not be empty".into(),
            ));
        }

        Ok(())
    }
}

/// Parse config content, warning about unknown keys.
fn parse(raw: &str) -> Result<ProjectConfig, ConfigError> {
    let de = toml::de::Deserializer::new(raw);
    let mut unknown = Vec::new();
    let config: ProjectConfig = serde_ignored::deserialize(de, |path| {
        unknown.push(path.to_string());
    })?;

    for key in unknown {
        log!("config"; "unknown key `{key}` ignored");
    }

    Ok(config)
}

/// Project root is the parent of the config file.
fn project_root(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Parse a config snippet for section tests.
#[cfg(test)]
pub(crate) fn test_parse_config(raw: &str) -> ProjectConfig {
    parse(raw).expect("test config should parse")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProjectConfig::load(&dir.path().join("vowlpack.toml")).unwrap();
        assert_eq!(config.root, dir.path());
        assert_eq!(config.package.name, "webvowl-reimagined");
    }

    #[test]
    fn absolute_path_constant_is_rejected() {
        let result = parse("[paths]\ndeploy = \"/var/www\"").unwrap().validate();
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn escaping_path_constant_is_rejected() {
        let result = parse("[paths]\nsource = \"../elsewhere\"")
            .unwrap()
            .validate();
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn loads_sections_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vowlpack.toml");
        fs::write(
            &path,
            "[package]\nname = \"webvowl-next\"\nversion = \"2.0.0\"\n[serve]\nport = 9000\n",
        )
        .unwrap();

        let config = ProjectConfig::load(&path).unwrap();
        assert_eq!(config.package.name, "webvowl-next");
        assert_eq!(config.package.version, "2.0.0");
        assert_eq!(config.serve.port, 9000);
    }

    #[test]
    fn empty_package_name_is_rejected() {
        let result = parse("[package]\nname = \"\"").unwrap().validate();
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }
}
