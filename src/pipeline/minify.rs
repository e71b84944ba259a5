//! Artifact minification for production builds.
//!
//! oxc for JavaScript, lightningcss for CSS, and a whitespace/comment
//! collapsing pass for the generated markup. Operates in place on the
//! staging tree; inputs are the pipeline's own generated outputs, so a
//! file that fails to re-parse is kept unminified and logged.

use std::{fs, path::PathBuf};

use anyhow::Result;
use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};
use oxc::allocator::Allocator;
use oxc::codegen::{Codegen, CodegenOptions, CommentOptions};
use oxc::mangler::MangleOptions;
use oxc::minifier::{CompressOptions, Minifier, MinifierOptions};
use oxc::parser::Parser;
use oxc::span::SourceType;
use rayon::prelude::*;

use crate::{debug, paths::PathRegistry};

/// Minify JavaScript source code.
pub fn minify_js(source: &str) -> Option<String> {
    let allocator = Allocator::default();
    let source_type = SourceType::mjs();
    let ret = Parser::new(&allocator, source, source_type).parse();
    if !ret.errors.is_empty() {
        return None;
    }
    let mut program = ret.program;
    let options = MinifierOptions {
        mangle: Some(MangleOptions::default()),
        compress: Some(CompressOptions::smallest()),
    };
    let ret = Minifier::new(options).minify(&allocator, &mut program);
    let code = Codegen::new()
        .with_options(CodegenOptions {
            minify: true,
            comments: CommentOptions::disabled(),
            ..CodegenOptions::default()
        })
        .with_scoping(ret.scoping)
        .build(&program)
        .code;
    Some(code)
}

/// Minify CSS source code.
pub fn minify_css(source: &str) -> Option<String> {
    let stylesheet = StyleSheet::parse(source, ParserOptions::default()).ok()?;
    let result = stylesheet
        .to_css(PrinterOptions {
            minify: true,
            ..PrinterOptions::default()
        })
        .ok()?;
    Some(result.code)
}

/// Minify HTML: strip comments and collapse inter-tag whitespace.
pub fn minify_html(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut rest = source;

    // Strip comments first.
    let mut stripped = String::with_capacity(source.len());
    while let Some(start) = rest.find("<!--") {
        stripped.push_str(&rest[..start]);
        match rest[start..].find("-->") {
            Some(end) => rest = &rest[start + end + 3..],
            None => {
                rest = "";
                break;
            }
        }
    }
    stripped.push_str(rest);

    // Collapse whitespace runs; whitespace between two tags drops entirely.
    let mut pending_ws = false;
    for c in stripped.chars() {
        if c.is_whitespace() {
            pending_ws = true;
            continue;
        }
        if pending_ws {
            let after_tag = out.ends_with('>');
            if !(after_tag && c == '<') && !out.is_empty() {
                out.push(' ');
            }
            pending_ws = false;
        }
        out.push(c);
    }
    out
}

/// Minify content based on file extension.
pub fn minify_by_ext(path: &std::path::Path, content: &str) -> Option<String> {
    let ext = path.extension()?.to_str()?;
    match ext {
        "js" | "mjs" => minify_js(content),
        "css" => minify_css(content),
        "html" => Some(minify_html(content)),
        _ => None,
    }
}

/// Run the minify stage over the staging tree (production only).
///
/// Returns the number of files rewritten.
pub(super) fn minify_staging(paths: &PathRegistry) -> Result<usize> {
    let files = collect_minifiable(paths);

    let minified = files
        .par_iter()
        .filter_map(|path| {
            let content = fs::read_to_string(path).ok()?;
            match minify_by_ext(path, &content) {
                Some(out) => fs::write(path, out).ok().map(|_| ()),
                None => {
                    debug!("minify"; "kept as-is: {}", path.display());
                    None
                }
            }
        })
        .count();

    Ok(minified)
}

fn collect_minifiable(paths: &PathRegistry) -> Vec<PathBuf> {
    jwalk::WalkDir::new(paths.staging_dir())
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path())
        .filter(|p| {
            matches!(
                p.extension().and_then(|e| e.to_str()),
                Some("js" | "mjs" | "css" | "html")
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn js_minification_drops_whitespace() {
        let out = minify_js("const answer = 1 + 1;\nconsole.log( answer );").unwrap();
        assert!(out.len() < "const answer = 1 + 1;\nconsole.log( answer );".len());
        assert!(!out.contains('\n'));
    }

    #[test]
    fn invalid_js_is_left_alone() {
        assert!(minify_js("const = broken ((").is_none());
    }

    #[test]
    fn css_minification() {
        let out = minify_css("body {\n  color: #ffffff;\n}\n").unwrap();
        assert!(out.len() < "body {\n  color: #ffffff;\n}\n".len());
    }

    #[test]
    fn html_minification_strips_comments_and_gaps() {
        let html = "<html>\n  <!-- generated -->\n  <head>\n  </head>\n</html>";
        let out = minify_html(html);
        assert!(!out.contains("<!--"));
        assert!(!out.contains('\n'));
        assert_eq!(out, "<html><head></head></html>");
    }

    #[test]
    fn html_minification_keeps_text_spacing() {
        let out = minify_html("<p>hello\n   world</p>");
        assert_eq!(out, "<p>hello world</p>");
    }
}
