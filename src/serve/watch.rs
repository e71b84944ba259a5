//! File watcher driving development rebuilds.
//!
//! Raw notify events are debounced on a short window, filtered down to
//! paths the build actually reads, then turned into a development rebuild.
//! A green rebuild broadcasts a page reload; a failed one broadcasts an
//! error overlay and leaves the deploy tree as it was.

use std::{
    path::{Path, PathBuf},
    sync::{Arc, mpsc},
    thread::JoinHandle,
    time::Duration,
};

use notify::{RecursiveMode, Watcher};
use rustc_hash::FxHashSet;

use crate::{
    config::ProjectConfig,
    core::{BuildMode, is_shutdown},
    debug, log,
    paths::PathRegistry,
    pipeline,
    serve::reload::{ReloadHub, ReloadMessage},
};

const DEBOUNCE_MS: u64 = 300;

/// Spawn the watcher thread. Returns `None` when no watch root exists yet.
pub(super) fn spawn_watcher(
    config: Arc<ProjectConfig>,
    paths: PathRegistry,
    hub: ReloadHub,
) -> Option<JoinHandle<()>> {
    let (notify_tx, notify_rx) = mpsc::channel();

    let mut watcher = match notify::recommended_watcher(move |res| {
        let _ = notify_tx.send(res);
    }) {
        Ok(w) => w,
        Err(e) => {
            log!("watch"; "failed to start watcher: {}", e);
            return None;
        }
    };

    let mut attached = 0;
    for root in watch_roots(&paths) {
        match watcher.watch(&root, RecursiveMode::Recursive) {
            Ok(()) => {
                debug!("watch"; "watching {}", root.display());
                attached += 1;
            }
            Err(e) => debug!("watch"; "cannot watch {}: {}", root.display(), e),
        }
    }
    if attached == 0 {
        log!("watch"; "nothing to watch");
        return None;
    }

    Some(std::thread::spawn(move || {
        // keep the watcher alive for the lifetime of the loop
        let _watcher = watcher;
        event_loop(&notify_rx, &config, &paths, &hub);
    }))
}

fn event_loop(
    notify_rx: &mpsc::Receiver<notify::Result<notify::Event>>,
    config: &ProjectConfig,
    paths: &PathRegistry,
    hub: &ReloadHub,
) {
    loop {
        if is_shutdown() {
            return;
        }

        let first = match notify_rx.recv_timeout(Duration::from_millis(200)) {
            Ok(Ok(event)) => event,
            Ok(Err(e)) => {
                log!("watch"; "notify error: {}", e);
                continue;
            }
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => return,
        };

        // Debounce: collect everything that arrives inside the window.
        let mut changed = FxHashSet::default();
        collect_paths(&first, paths, &mut changed);
        let deadline = std::time::Instant::now() + Duration::from_millis(DEBOUNCE_MS);
        while let Ok(result) = notify_rx.recv_timeout(
            deadline.saturating_duration_since(std::time::Instant::now()),
        ) {
            if let Ok(event) = result {
                collect_paths(&event, paths, &mut changed);
            }
        }

        if changed.is_empty() {
            continue;
        }

        let reason = describe_change(&changed, paths);
        log!("watch"; "{} changed, rebuilding", reason);
        rebuild(config, paths, hub, &reason);
    }
}

fn rebuild(config: &ProjectConfig, paths: &PathRegistry, hub: &ReloadHub, reason: &str) {
    match pipeline::run(BuildMode::Development, config, paths) {
        Ok(report) => {
            hub.broadcast(&ReloadMessage::Clear);
            hub.broadcast(&ReloadMessage::Reload {
                reason: reason.to_string(),
            });
            if !report.skipped.is_empty() {
                // give reloaded pages a moment to reconnect
                std::thread::sleep(Duration::from_millis(500));
                for err in &report.skipped {
                    hub.broadcast(&warning_for(err));
                }
            }
        }
        Err(e) => {
            log!("error"; "rebuild failed: {:#}", e);
            hub.broadcast(&ReloadMessage::Error {
                path: reason.to_string(),
                message: format!("{e:#}"),
            });
        }
    }
}

fn warning_for(err: &crate::error::BuildError) -> ReloadMessage {
    use crate::error::BuildError;
    let path = match err {
        BuildError::Bundle { path, .. } | BuildError::Copy { path, .. } => {
            path.display().to_string()
        }
        _ => String::new(),
    };
    ReloadMessage::Warning {
        path,
        message: err.to_string(),
    }
}

/// Watch the source tree and, when it is a separate directory, the wasm
/// crate's own `src/`.
fn watch_roots(paths: &PathRegistry) -> Vec<PathBuf> {
    let mut roots = vec![paths.source_dir().to_path_buf()];
    let wasm_src = paths.wasm_crate_dir().join("src");
    if !wasm_src.starts_with(paths.source_dir()) && wasm_src.is_dir() {
        roots.push(wasm_src);
    }
    roots.retain(|r| r.is_dir());
    roots
}

/// Keep only paths a rebuild would read; output trees and editor
/// temporaries would otherwise loop the watcher forever.
fn collect_paths(event: &notify::Event, paths: &PathRegistry, out: &mut FxHashSet<PathBuf>) {
    use notify::EventKind;
    use notify::event::ModifyKind;

    match event.kind {
        EventKind::Create(_) | EventKind::Remove(_) => {}
        EventKind::Modify(modify) => {
            // mtime/chmod noise would loop the rebuild
            if matches!(modify, ModifyKind::Metadata(_)) {
                return;
            }
        }
        _ => return,
    }

    for path in &event.paths {
        if is_relevant(path, paths) {
            out.insert(path.clone());
        }
    }
}

fn is_relevant(path: &Path, paths: &PathRegistry) -> bool {
    if path.starts_with(paths.deploy_dir())
        || path.starts_with(paths.staging_dir())
        || path.starts_with(paths.wasm_pkg_dir())
        || path.starts_with(paths.dependency_dir())
    {
        return false;
    }
    if path
        .components()
        .any(|c| c.as_os_str() == "target" || c.as_os_str() == ".git")
    {
        return false;
    }
    !is_temp_file(path)
}

fn is_temp_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return true;
    };
    name.ends_with('~') || name.ends_with(".swp") || name.ends_with(".tmp") || name.starts_with('.')
}

fn describe_change(changed: &FxHashSet<PathBuf>, paths: &PathRegistry) -> String {
    let mut names: Vec<String> = changed
        .iter()
        .map(|p| {
            p.strip_prefix(paths.root())
                .unwrap_or(p)
                .display()
                .to_string()
        })
        .collect();
    names.sort();
    match names.as_slice() {
        [one] => one.clone(),
        [first, ..] => format!("{} (+{} more)", first, names.len() - 1),
        [] => String::new(),
    }
}
