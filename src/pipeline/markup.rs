//! Entry markup generation.
//!
//! Produces the single `index.html` of the deploy tree from the static
//! template (or an embedded fallback), injecting the page title, meta
//! block, the three isolation directives, exactly one module script entry,
//! and the build-time constants consumed by the bundle.

use std::fs;

use anyhow::{Context, Result};

use crate::{
    config::ProjectConfig,
    core::{BuildMode, ISOLATION_HEADERS},
    embed::build::{DEFAULT_INDEX_HTML, NoVars},
    paths::PathRegistry,
};

/// Canonical mixed-case form of the product's own brand token.
pub const BRAND: &str = "WebVOWL";

/// Derive the human-facing project name from a package identifier.
///
/// Tokens matching the brand case-insensitively become the canonical
/// `WebVOWL`; every other token gets only its first character lowercased.
/// `webvowl-reimagined` -> `WebVOWL reimagined`.
pub fn display_name(identifier: &str) -> String {
    identifier
        .split(['-', '_', ' '])
        .filter(|token| !token.is_empty())
        .map(|token| {
            if token.eq_ignore_ascii_case(BRAND) {
                BRAND.to_string()
            } else {
                let mut chars = token.chars();
                match chars.next() {
                    Some(first) => first.to_lowercase().chain(chars).collect(),
                    None => String::new(),
                }
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Values baked into the generated document.
pub struct MarkupVars<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub version: &'a str,
    pub mode: BuildMode,
    /// Path of the single script entry bundle, relative to the output root.
    pub entry: &'a str,
    /// Path of the style bundle, relative to the output root.
    pub style: &'a str,
}

/// Generate the entry document from a template.
///
/// The head gains title, meta block, isolation directives and the style
/// reference; the body gains the constants script and exactly one module
/// script entry.
pub fn generate(template: &str, vars: &MarkupVars<'_>) -> String {
    let title = format!("<title>{}</title>", vars.name);
    let description = format!(
        r#"<meta name="description" content="{} - {}">"#,
        vars.name, vars.description
    );

    let mut head = String::new();
    head.push_str(&title);
    head.push('\n');
    head.push_str(&description);
    head.push('\n');
    head.push_str(r#"<meta name="robots" content="noindex,nofollow">"#);
    head.push('\n');
    head.push_str(
        r#"<meta name="viewport" content="width=device-width, initial-scale=1.0, maximum-scale=1.0, user-scalable=no">"#,
    );
    head.push('\n');
    head.push_str(r#"<meta name="apple-mobile-web-app-capable" content="yes">"#);
    head.push('\n');
    for (name, value) in ISOLATION_HEADERS {
        head.push_str(&format!(r#"<meta http-equiv="{name}" content="{value}">"#));
        head.push('\n');
    }
    head.push_str(&format!(
        r#"<link rel="icon" href="favicon.ico"><link rel="stylesheet" href="{}">"#,
        vars.style
    ));
    head.push('\n');

    // Build-time constants, injected as literal values.
    let constants = format!(
        "<script>const PROJECT_NAME={},BUILD_TYPE={},VERSION={};</script>",
        json_str(vars.name),
        json_str(vars.mode.as_str()),
        json_str(vars.version),
    );
    let entry = format!(r#"<script type="module" src="{}"></script>"#, vars.entry);

    let html = insert_before(template, "</head>", &head);
    insert_before(&html, "</body>", &format!("{constants}\n{entry}\n"))
}

/// Run the markup stage: read the template, generate, write into staging.
pub(super) fn generate_entry_markup(
    mode: BuildMode,
    config: &ProjectConfig,
    paths: &PathRegistry,
    entry: &str,
) -> Result<()> {
    let template_path = paths.static_dir().join("index.html");
    let template = if template_path.is_file() {
        fs::read_to_string(&template_path)
            .with_context(|| format!("Failed to read {}", template_path.display()))?
    } else {
        DEFAULT_INDEX_HTML.render(&NoVars)
    };

    let name = display_name(&config.package.name);
    let vars = MarkupVars {
        name: &name,
        description: &config.package.description,
        version: &config.package.version,
        mode,
        entry,
        style: "css/app.css",
    };

    let out = paths.staging_dir().join("index.html");
    fs::write(&out, generate(&template, &vars))
        .with_context(|| format!("Failed to write {}", out.display()))?;
    Ok(())
}

/// Insert `block` before the last case-insensitive occurrence of `tag`,
/// or append when the tag is absent (browsers recover from that).
fn insert_before(html: &str, tag: &str, block: &str) -> String {
    let bytes = html.as_bytes();
    let pattern = tag.as_bytes();

    if let Some(pos) = bytes
        .windows(pattern.len())
        .rposition(|w| w.eq_ignore_ascii_case(pattern))
    {
        let mut out = String::with_capacity(html.len() + block.len());
        out.push_str(&html[..pos]);
        out.push_str(block);
        out.push_str(&html[pos..]);
        out
    } else {
        let mut out = String::with_capacity(html.len() + block.len());
        out.push_str(html);
        out.push_str(block);
        out
    }
}

fn json_str(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(mode: BuildMode) -> MarkupVars<'static> {
        MarkupVars {
            name: "WebVOWL reimagined",
            description: "A performant and scalable WebVOWL",
            version: "0.1.0",
            mode,
            entry: "js/app.js",
            style: "css/app.css",
        }
    }

    fn template() -> String {
        crate::embed::build::DEFAULT_INDEX_HTML
            .render(&crate::embed::build::NoVars)
    }

    #[test]
    fn display_name_brand_token() {
        assert_eq!(display_name("webvowl-reimagined"), "WebVOWL reimagined");
        assert_eq!(display_name("WEBVOWL"), "WebVOWL");
        assert_eq!(display_name("My-Fancy-Tool"), "my fancy tool");
        assert_eq!(display_name("webvowl_next-gen"), "WebVOWL next gen");
    }

    #[test]
    fn markup_has_exactly_one_entry_in_every_mode() {
        for mode in [BuildMode::Development, BuildMode::Production] {
            let html = generate(&template(), &vars(mode));
            assert_eq!(html.matches(r#"<script type="module""#).count(), 1);
            assert!(html.contains(r#"src="js/app.js""#));
        }
    }

    #[test]
    fn markup_has_all_three_isolation_directives() {
        for mode in [BuildMode::Development, BuildMode::Production] {
            let html = generate(&template(), &vars(mode));
            for (name, value) in ISOLATION_HEADERS {
                assert!(
                    html.contains(&format!(r#"http-equiv="{name}" content="{value}""#)),
                    "missing {name} in {mode:?} markup"
                );
            }
        }
    }

    #[test]
    fn markup_bakes_build_constants_as_literals() {
        let html = generate(&template(), &vars(BuildMode::Production));
        assert!(html.contains(r#"const PROJECT_NAME="WebVOWL reimagined""#));
        assert!(html.contains(r#"BUILD_TYPE="production""#));
        assert!(html.contains(r#"VERSION="0.1.0""#));
        assert!(html.contains("<title>WebVOWL reimagined</title>"));
    }

    #[test]
    fn insertion_survives_template_without_head() {
        let html = generate("<p>bare</p>", &vars(BuildMode::Development));
        assert_eq!(html.matches(r#"<script type="module""#).count(), 1);
    }
}
