//! Embedded static resources.
//!
//! - `template` - Template types for typed variable injection
//! - `build` - fallback entry markup template
//! - `serve` - livereload client script
//!
//! # Usage
//!
//! ```ignore
//! use embed::serve::{LIVERELOAD_JS, LivereloadVars};
//!
//! let js = LIVERELOAD_JS.render(&LivereloadVars { ws_port: 35729, .. });
//! ```

mod template;

pub use template::{Template, TemplateVars};

pub mod build {
    use super::Template;

    /// Marker for templates without variables.
    pub struct NoVars;

    impl super::TemplateVars for NoVars {
        fn apply(&self, content: &str) -> String {
            content.to_string()
        }
    }

    /// Fallback entry markup skeleton, used when the static assets
    /// directory carries no `index.html` template.
    pub const DEFAULT_INDEX_HTML: Template<NoVars> =
        Template::new(include_str!("build/index.html"));
}

pub mod serve {
    use super::{Template, TemplateVars};
    use crate::config::OverlayConfig;

    /// URL the dev server serves the rendered client script from.
    pub const LIVERELOAD_URL: &str = "/__vowlpack/livereload.js";

    /// Variables for livereload.js.
    pub struct LivereloadVars {
        pub ws_port: u16,
        pub max_reconnect: u32,
        pub overlay: OverlayConfig,
    }

    impl TemplateVars for LivereloadVars {
        fn apply(&self, content: &str) -> String {
            content
                .replace("__VOWL_WS_PORT__", &self.ws_port.to_string())
                .replace("__VOWL_MAX_RECONNECT__", &self.max_reconnect.to_string())
                .replace("__VOWL_OVERLAY_ERRORS__", bool_js(self.overlay.errors))
                .replace("__VOWL_OVERLAY_WARNINGS__", bool_js(self.overlay.warnings))
                .replace(
                    "__VOWL_OVERLAY_RUNTIME__",
                    bool_js(self.overlay.runtime_errors),
                )
        }
    }

    fn bool_js(value: bool) -> &'static str {
        if value { "true" } else { "false" }
    }

    /// Livereload client with WebSocket port and reconnect policy injection.
    pub const LIVERELOAD_JS: Template<LivereloadVars> =
        Template::new(include_str!("serve/livereload.js"));
}

#[cfg(test)]
mod tests {
    use super::serve::{LIVERELOAD_JS, LivereloadVars};
    use crate::config::OverlayConfig;

    #[test]
    fn livereload_renders_reconnect_policy() {
        let js = LIVERELOAD_JS.render(&LivereloadVars {
            ws_port: 35729,
            max_reconnect: 3,
            overlay: OverlayConfig::default(),
        });

        assert!(js.contains("var WS_PORT = 35729;"));
        assert!(js.contains("var MAX_RECONNECT = 3;"));
        assert!(!js.contains("__VOWL_"));
    }

    #[test]
    fn livereload_overlay_defaults() {
        let js = LIVERELOAD_JS.render(&LivereloadVars {
            ws_port: 1,
            max_reconnect: 1,
            overlay: OverlayConfig::default(),
        });

        // errors and runtime errors surface by default, warnings do not
        assert!(js.contains("var SHOW_ERRORS = true;"));
        assert!(js.contains("var SHOW_WARNINGS = false;"));
        assert!(js.contains("var SHOW_RUNTIME = true;"));
    }
}
