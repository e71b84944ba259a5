//! Configuration section definitions for `vowlpack.toml`.

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ============================================================================
// [package]
// ============================================================================

/// Packaged application metadata.
///
/// The `name` identifier feeds the display-name derivation used for the
/// generated markup title and the injected `PROJECT_NAME` literal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageConfig {
    /// Package identifier (e.g. `webvowl-reimagined`).
    pub name: String,

    /// Version string injected into the bundle as `VERSION`.
    pub version: String,

    /// Description suffix for the generated `<meta name="description">`.
    pub description: String,
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            name: "webvowl-reimagined".into(),
            version: "0.1.0".into(),
            description: "A performant and scalable WebVOWL".into(),
        }
    }
}

// ============================================================================
// [paths]
// ============================================================================

/// Logical filesystem locations, all relative to the project root.
///
/// Consumed by `PathRegistry`; no component reads these directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Source code root.
    pub source: PathBuf,

    /// Static assets (favicon, markup templates).
    pub static_assets: PathBuf,

    /// Built-in ontology data files.
    pub ontology: PathBuf,

    /// Deployable output tree.
    pub deploy: PathBuf,

    /// Wasm crate root. Empty means the project root itself.
    pub wasm_crate: PathBuf,

    /// Compiled wasm package output (binary + loader glue).
    pub wasm_pkg: PathBuf,

    /// Dependency cache directory.
    pub dependencies: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            source: "src".into(),
            static_assets: "src/static".into(),
            ontology: "src/static/ontology".into(),
            deploy: "deploy".into(),
            wasm_crate: "".into(),
            wasm_pkg: "target/pkg".into(),
            dependencies: "node_modules".into(),
        }
    }
}

// ============================================================================
// [build]
// ============================================================================

/// Build pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Script entry point, relative to the source root.
    pub entry: PathBuf,

    /// ECMAScript baseline the bundler lowers scripts to.
    pub target: String,

    /// Keep uncompressed originals next to their `.br` siblings.
    ///
    /// Set to `false` when the production server maps `.br` files itself
    /// and the uncompressed fallback is not wanted.
    pub keep_uncompressed: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            entry: "app.js".into(),
            target: "es2017".into(),
            keep_uncompressed: true,
        }
    }
}

// ============================================================================
// [serve]
// ============================================================================

/// Development server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServeConfig {
    /// Network interface to bind.
    /// - `127.0.0.1` (default): localhost only
    /// - `0.0.0.0`: all interfaces (LAN accessible)
    pub interface: IpAddr,

    /// Base HTTP port. The server retries upward when it is taken.
    pub port: u16,

    /// Base WebSocket port for live reload.
    pub ws_port: u16,

    /// Watch the source tree and rebuild on change.
    pub watch: bool,

    /// Open a browser tab once the server is listening.
    pub open: bool,

    /// Reconnect attempts the livereload client makes after transport
    /// loss before reporting a terminal disconnected state.
    pub reconnect: u32,

    /// Client overlay channel selection.
    pub overlay: OverlayConfig,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            interface: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            port: 8080,
            ws_port: 35729,
            watch: true,
            open: true,
            reconnect: 3,
            overlay: OverlayConfig::default(),
        }
    }
}

/// Which channels the client-facing overlay surfaces.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    /// Surface compile errors.
    pub errors: bool,

    /// Surface compile warnings.
    pub warnings: bool,

    /// Surface runtime errors caught in the browser.
    pub runtime_errors: bool,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            errors: true,
            warnings: false,
            runtime_errors: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::test_parse_config;
    use std::net::{IpAddr, Ipv4Addr};

    #[test]
    fn package_defaults() {
        let config = test_parse_config("");
        assert_eq!(config.package.name, "webvowl-reimagined");
        assert_eq!(config.package.version, "0.1.0");
    }

    #[test]
    fn paths_defaults_follow_project_layout() {
        let config = test_parse_config("");
        assert_eq!(config.paths.source, std::path::PathBuf::from("src"));
        assert_eq!(config.paths.wasm_pkg, std::path::PathBuf::from("target/pkg"));
        assert!(config.paths.wasm_crate.as_os_str().is_empty());
    }

    #[test]
    fn serve_config_overrides() {
        let config =
            test_parse_config("[serve]\ninterface = \"0.0.0.0\"\nport = 3000\nreconnect = 5");
        assert_eq!(config.serve.interface, IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        assert_eq!(config.serve.port, 3000);
        assert_eq!(config.serve.reconnect, 5);
        // untouched fields keep defaults
        assert!(config.serve.watch);
        assert!(config.serve.open);
    }

    #[test]
    fn overlay_defaults_hide_warnings() {
        let config = test_parse_config("");
        assert!(config.serve.overlay.errors);
        assert!(!config.serve.overlay.warnings);
        assert!(config.serve.overlay.runtime_errors);
    }

    #[test]
    fn build_compress_policy_is_explicit() {
        let config = test_parse_config("[build]\nkeep_uncompressed = false");
        assert!(!config.build.keep_uncompressed);

        let config = test_parse_config("");
        assert!(config.build.keep_uncompressed);
    }
}
