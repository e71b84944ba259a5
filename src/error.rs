//! Build pipeline error taxonomy.
//!
//! Propagation policy (per stage):
//! - `Compile` - fatal, aborts the pipeline, previous deploy tree preserved
//! - `Bundle` - fatal for the failing asset; a failed script entry fails
//!   the build, independent assets continue
//! - `Copy` - logged and skipped, never aborts the pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by pipeline stages.
#[derive(Debug, Error)]
pub enum BuildError {
    /// Wasm toolchain failure. Fail-fast.
    #[error("wasm compilation failed: {0}")]
    Compile(String),

    /// Required build toolchain is not installed.
    #[error("`{tool}` not found in PATH ({hint})")]
    ToolchainMissing {
        tool: &'static str,
        hint: &'static str,
    },

    /// Per-asset script/style transform failure.
    #[error("failed to bundle `{path}`: {reason}")]
    Bundle { path: PathBuf, reason: String },

    /// Passthrough copy failure. Best-effort; callers log and continue.
    #[error("failed to copy `{path}`")]
    Copy {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BuildError {
    /// Whether this error may be logged and skipped without aborting
    /// the remaining stages.
    pub const fn is_best_effort(&self) -> bool {
        matches!(self, Self::Copy { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_copy_errors_are_best_effort() {
        let copy = BuildError::Copy {
            path: "favicon.ico".into(),
            source: std::io::Error::other("denied"),
        };
        assert!(copy.is_best_effort());

        let compile = BuildError::Compile("exit code 101".into());
        assert!(!compile.is_best_effort());

        let bundle = BuildError::Bundle {
            path: "src/app.js".into(),
            reason: "parse error".into(),
        };
        assert!(!bundle.is_best_effort());
    }
}
