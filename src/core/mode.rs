//! Build mode selection for production/development builds.

/// Build mode, selected once per invocation and immutable for its duration.
///
/// Determines whether the minify/compress stages run and whether script
/// source maps are emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildMode {
    /// Development: source maps, no minification, no compression.
    Development,
    /// Production: minified and brotli-compressed artifacts, no source maps.
    Production,
}

impl BuildMode {
    /// Check if this is a production build.
    #[inline]
    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }

    /// Whether script bundling should emit external source maps.
    #[inline]
    pub const fn source_maps(self) -> bool {
        matches!(self, Self::Development)
    }

    /// Literal injected into generated markup (`BUILD_TYPE`).
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_switches_optional_stages() {
        assert!(BuildMode::Production.is_production());
        assert!(!BuildMode::Production.source_maps());
        assert!(!BuildMode::Development.is_production());
        assert!(BuildMode::Development.source_maps());
    }

    #[test]
    fn mode_literals() {
        assert_eq!(BuildMode::Development.as_str(), "development");
        assert_eq!(BuildMode::Production.as_str(), "production");
    }
}
