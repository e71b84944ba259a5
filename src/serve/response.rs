//! HTTP response handlers.
//!
//! Every response carries the cross-origin isolation headers; the packaged
//! app's thread pool needs `SharedArrayBuffer`, and browsers only grant it
//! to isolated pages. Served markup additionally gets the livereload
//! client script injected when watch mode is on.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use tiny_http::{Header, Request, Response, StatusCode};

use crate::{
    config::OverlayConfig,
    core::ISOLATION_HEADERS,
    embed::serve::{LIVERELOAD_JS, LIVERELOAD_URL, LivereloadVars},
    utils::mime::{self, types},
};

/// Livereload parameters; `None` when watch mode is off.
#[derive(Clone, Copy)]
pub(super) struct Livereload {
    pub ws_port: u16,
    pub max_reconnect: u32,
    pub overlay: OverlayConfig,
}

/// Respond with a file from the deploy tree.
pub(super) fn respond_file(
    request: Request,
    path: &Path,
    livereload: Option<Livereload>,
) -> Result<()> {
    let content_type = mime::from_path(path);
    let mut body =
        fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;

    if content_type == types::HTML && livereload.is_some() {
        body = inject_livereload(body);
    }

    send(request, 200, content_type, body)
}

/// Respond with the rendered livereload client from memory.
pub(super) fn respond_livereload_js(request: Request, livereload: Livereload) -> Result<()> {
    let body = LIVERELOAD_JS.render(&LivereloadVars {
        ws_port: livereload.ws_port,
        max_reconnect: livereload.max_reconnect,
        overlay: livereload.overlay,
    });
    send(request, 200, types::JAVASCRIPT, body.into_bytes())
}

pub(super) fn respond_not_found(request: Request) -> Result<()> {
    send(request, 404, types::PLAIN, b"404 Not Found".to_vec())
}

/// 503 while shutting down.
pub(super) fn respond_unavailable(request: Request) -> Result<()> {
    send(request, 503, types::PLAIN, b"503 Service Unavailable".to_vec())
}

fn send(request: Request, status: u16, content_type: &'static str, body: Vec<u8>) -> Result<()> {
    let mut response = Response::from_data(body)
        .with_status_code(StatusCode(status))
        .with_header(make_header("Content-Type", content_type));
    for (key, value) in ISOLATION_HEADERS {
        response = response.with_header(make_header(key, value));
    }
    request.respond(response)?;
    Ok(())
}

fn make_header(key: &str, value: &str) -> Header {
    // Both sides are fixed ASCII strings.
    Header::from_bytes(key.as_bytes(), value.as_bytes()).unwrap()
}

/// Insert the livereload script tag before `</body>`, or append when the
/// markup has no body close tag.
pub(super) fn inject_livereload(body: Vec<u8>) -> Vec<u8> {
    let html = match String::from_utf8(body) {
        Ok(html) => html,
        Err(e) => return e.into_bytes(),
    };
    let tag = format!(r#"<script src="{LIVERELOAD_URL}"></script>"#);

    let insert_at = find_last_ignore_case(&html, "</body>").unwrap_or(html.len());
    let mut out = String::with_capacity(html.len() + tag.len());
    out.push_str(&html[..insert_at]);
    out.push_str(&tag);
    out.push_str(&html[insert_at..]);
    out.into_bytes()
}

fn find_last_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    let h = haystack.as_bytes();
    let n = needle.as_bytes();
    if n.is_empty() || h.len() < n.len() {
        return None;
    }
    (0..=h.len() - n.len())
        .rev()
        .find(|&i| h[i..i + n.len()].eq_ignore_ascii_case(n))
}
