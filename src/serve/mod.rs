//! Development server with live reload.
//!
//! Serves the deploy tree over HTTP with the cross-origin isolation
//! headers on every response, binds with automatic port retry, and in
//! watch mode rebuilds on source changes and pushes reload/overlay
//! messages to connected browsers over a WebSocket side channel.

mod reload;
mod response;
mod watch;

pub use reload::{ReloadHub, ReloadMessage};

use std::{
    net::SocketAddr,
    path::{Component, Path, PathBuf},
    sync::Arc,
    thread,
    time::Duration,
};

use anyhow::Result;
use tiny_http::{Request, Server};

use crate::{
    config::ProjectConfig,
    core::{self, BuildMode, is_shutdown},
    debug,
    embed::serve::LIVERELOAD_URL,
    log,
    paths::PathRegistry,
    pipeline,
    utils::exec::Cmd,
};

/// Maximum number of port binding attempts.
const MAX_PORT_RETRIES: u16 = 10;

/// Run the dev server. Blocks until Ctrl+C.
pub fn serve(config: ProjectConfig, paths: PathRegistry) -> Result<()> {
    let config = Arc::new(config);

    // Initial development build. A failure is not fatal here: the watcher
    // can recover once the source is fixed, and a previous deploy tree
    // may still be serveable.
    if let Err(e) = pipeline::run(BuildMode::Development, &config, &paths) {
        log!("error"; "initial build failed: {:#}", e);
    }

    let (server, addr) = bind_with_retry(config.serve.interface, config.serve.port)?;
    let server = Arc::new(server);

    core::register_server(Arc::clone(&server));
    log!("serve"; "http://{}", addr);

    let livereload = if config.serve.watch {
        let (hub, ws_port) = reload::ReloadHub::start(config.serve.ws_port, config.serve.overlay)?;
        watch::spawn_watcher(Arc::clone(&config), paths.clone(), hub);
        Some(response::Livereload {
            ws_port,
            max_reconnect: config.serve.reconnect,
            overlay: config.serve.overlay,
        })
    } else {
        None
    };

    if config.serve.open {
        open_browser(addr);
    }

    run_request_loop(&server, &paths, livereload);
    // give background threads a beat to observe the shutdown flag
    thread::sleep(Duration::from_millis(100));
    Ok(())
}

/// Bind to the interface and port, walking up through the next ports
/// when the requested one is taken.
fn bind_with_retry(interface: std::net::IpAddr, base_port: u16) -> Result<(Server, SocketAddr)> {
    for offset in 0..MAX_PORT_RETRIES {
        let port = base_port.saturating_add(offset);
        let addr = SocketAddr::new(interface, port);

        match Server::http(addr) {
            Ok(server) => {
                if offset > 0 {
                    log!("serve"; "port {} in use, using {} instead", base_port, port);
                }
                return Ok((server, addr));
            }
            Err(_) if offset + 1 < MAX_PORT_RETRIES => continue,
            Err(e) => {
                return Err(anyhow::anyhow!(
                    "Failed to bind after {} attempts (ports {}-{}): {}",
                    MAX_PORT_RETRIES,
                    base_port,
                    port,
                    e
                ));
            }
        }
    }
    unreachable!()
}

fn run_request_loop(server: &Server, paths: &PathRegistry, livereload: Option<response::Livereload>) {
    // Requests are handled on a small pool so a slow read never blocks
    // the reload channel or other requests.
    let pool = match rayon::ThreadPoolBuilder::new().num_threads(4).build() {
        Ok(pool) => pool,
        Err(e) => {
            log!("error"; "failed to create request pool: {}", e);
            return;
        }
    };

    for request in server.incoming_requests() {
        let deploy = paths.deploy_dir().to_path_buf();
        pool.spawn(move || {
            if let Err(e) = handle_request(request, &deploy, livereload) {
                debug!("serve"; "request error: {:#}", e);
            }
        });
    }
}

fn handle_request(
    request: Request,
    deploy: &Path,
    livereload: Option<response::Livereload>,
) -> Result<()> {
    if is_shutdown() {
        return response::respond_unavailable(request);
    }

    if let Some(livereload) = livereload
        && request.url() == LIVERELOAD_URL
    {
        return response::respond_livereload_js(request, livereload);
    }

    match resolve_path(request.url(), deploy) {
        Some(path) => response::respond_file(request, &path, livereload),
        None => response::respond_not_found(request),
    }
}

/// Map a request URL onto a file in the deploy tree. Directory requests
/// fall through to their `index.html`. Traversal components never escape
/// the tree.
fn resolve_path(url: &str, deploy: &Path) -> Option<PathBuf> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let rel = path.trim_start_matches('/');

    let rel_path = Path::new(rel);
    if rel_path
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return None;
    }

    let mut candidate = deploy.join(rel_path);
    if candidate.is_dir() || rel.is_empty() {
        candidate = candidate.join("index.html");
    }
    candidate.is_file().then_some(candidate)
}

/// Best-effort `open` of the served address in the default browser.
fn open_browser(addr: SocketAddr) {
    let url = format!("http://{addr}");
    thread::spawn(move || {
        #[cfg(target_os = "macos")]
        let cmd = Cmd::new("open").arg(&url);
        #[cfg(target_os = "windows")]
        let cmd = Cmd::new("cmd").args(["/C", "start", &url]);
        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        let cmd = Cmd::new("xdg-open").arg(&url);

        if let Err(e) = cmd.run() {
            debug!("serve"; "could not open browser: {:#}", e);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn urls_resolve_inside_the_deploy_tree() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("js")).unwrap();
        fs::write(dir.path().join("index.html"), "<html/>").unwrap();
        fs::write(dir.path().join("js/app.js"), "").unwrap();

        assert_eq!(
            resolve_path("/", dir.path()),
            Some(dir.path().join("index.html"))
        );
        assert_eq!(
            resolve_path("/js/app.js?v=1", dir.path()),
            Some(dir.path().join("js/app.js"))
        );
        assert_eq!(resolve_path("/missing.js", dir.path()), None);
    }

    #[test]
    fn traversal_components_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("index.html"), "<html/>").unwrap();

        assert_eq!(resolve_path("/../index.html", dir.path()), None);
        assert_eq!(resolve_path("/js/../../etc/passwd", dir.path()), None);
    }
}
