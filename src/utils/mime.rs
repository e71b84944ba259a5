//! MIME type detection for the deploy tree.

use std::path::Path;

/// Common MIME type constants.
pub mod types {
    pub const HTML: &str = "text/html; charset=utf-8";
    pub const PLAIN: &str = "text/plain; charset=utf-8";
    pub const CSS: &str = "text/css; charset=utf-8";
    pub const JAVASCRIPT: &str = "text/javascript; charset=utf-8";
    pub const JSON: &str = "application/json";
    pub const WASM: &str = "application/wasm";
    pub const OCTET_STREAM: &str = "application/octet-stream";
    pub const PNG: &str = "image/png";
    pub const SVG: &str = "image/svg+xml";
    pub const ICO: &str = "image/x-icon";
}

/// Detect MIME type from a file path extension.
pub fn from_path(path: &Path) -> &'static str {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return types::OCTET_STREAM;
    };

    match ext.to_ascii_lowercase().as_str() {
        "html" | "htm" => types::HTML,
        "txt" => types::PLAIN,
        "css" => types::CSS,
        "js" | "mjs" => types::JAVASCRIPT,
        "json" | "map" => types::JSON,
        "wasm" => types::WASM,
        "png" => types::PNG,
        "svg" => types::SVG,
        "ico" => types::ICO,
        _ => types::OCTET_STREAM,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn wasm_and_html() {
        assert_eq!(from_path(&PathBuf::from("wasm/app.1234.wasm")), types::WASM);
        assert_eq!(from_path(&PathBuf::from("index.html")), types::HTML);
        assert_eq!(from_path(&PathBuf::from("LICENSE")), types::OCTET_STREAM);
    }
}
