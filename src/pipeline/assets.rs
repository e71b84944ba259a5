//! Passthrough asset copying.
//!
//! Fixed files move into the staging tree verbatim: the icon, the
//! license, markup templates other than the entry page (which the markup
//! stage generates), and the bundled ontology data. Every copy is
//! best-effort; a missing or unreadable file is reported and skipped.

use std::{fs, path::Path};

use crate::{debug, error::BuildError, log, paths::PathRegistry};

/// What the passthrough stage copied.
#[derive(Debug, Default)]
pub struct CopyOutcome {
    pub copied: usize,
    pub errors: Vec<BuildError>,
}

/// Run the passthrough copy stage. Never fails the build.
pub(super) fn copy_passthrough(paths: &PathRegistry) -> CopyOutcome {
    let mut outcome = CopyOutcome::default();
    let staging = paths.staging_dir();

    copy_if_present(
        &paths.static_dir().join("favicon.ico"),
        &staging.join("favicon.ico"),
        &mut outcome,
    );
    copy_if_present(
        &paths.root().join("LICENSE"),
        &staging.join("LICENSE"),
        &mut outcome,
    );

    // Markup templates ship verbatim, except the entry page the markup
    // stage generates itself.
    if let Ok(entries) = fs::read_dir(paths.static_dir()) {
        for entry in entries.filter_map(Result::ok) {
            let path = entry.path();
            let is_template = path.extension().and_then(|e| e.to_str()) == Some("html")
                && path.file_name().and_then(|n| n.to_str()) != Some("index.html");
            if is_template {
                let dst = staging.join(entry.file_name());
                copy_one(&path, &dst, &mut outcome);
            }
        }
    }

    copy_tree(
        paths.ontology_dir(),
        &staging.join("ontology"),
        &mut outcome,
    );

    outcome
}

fn copy_if_present(src: &Path, dst: &Path, outcome: &mut CopyOutcome) {
    if src.is_file() {
        copy_one(src, dst, outcome);
    } else {
        debug!("build"; "no passthrough source at {}", src.display());
    }
}

fn copy_one(src: &Path, dst: &Path, outcome: &mut CopyOutcome) {
    let result = dst
        .parent()
        .map_or(Ok(()), fs::create_dir_all)
        .and_then(|()| fs::copy(src, dst).map(|_| ()));

    match result {
        Ok(()) => outcome.copied += 1,
        Err(source) => {
            let err = BuildError::Copy {
                path: src.to_path_buf(),
                source,
            };
            log!("warn"; "{err}, skipping");
            outcome.errors.push(err);
        }
    }
}

/// Recursively copy a directory, file by file, each one best-effort.
fn copy_tree(src_root: &Path, dst_root: &Path, outcome: &mut CopyOutcome) {
    if !src_root.is_dir() {
        return;
    }
    for entry in jwalk::WalkDir::new(src_root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
    {
        let src = entry.path();
        let rel = src.strip_prefix(src_root).unwrap_or(&src).to_path_buf();
        copy_one(&src, &dst_root.join(rel), outcome);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProjectConfig;

    fn project(root: &Path) -> PathRegistry {
        let mut config = ProjectConfig::default();
        config.root = root.to_path_buf();
        let paths = PathRegistry::new(&config);
        fs::create_dir_all(paths.static_dir()).unwrap();
        fs::create_dir_all(paths.staging_dir()).unwrap();
        paths
    }

    #[test]
    fn fixed_files_and_templates_are_copied() {
        let dir = tempfile::tempdir().unwrap();
        let paths = project(dir.path());
        fs::write(paths.static_dir().join("favicon.ico"), [0u8; 8]).unwrap();
        fs::write(dir.path().join("LICENSE"), "MIT").unwrap();
        fs::write(paths.static_dir().join("license.html"), "<html/>").unwrap();
        fs::write(paths.static_dir().join("index.html"), "<html/>").unwrap();

        let outcome = copy_passthrough(&paths);
        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.copied, 3);
        assert!(paths.staging_dir().join("favicon.ico").exists());
        assert!(paths.staging_dir().join("LICENSE").exists());
        assert!(paths.staging_dir().join("license.html").exists());
        // the entry page belongs to the markup stage
        assert!(!paths.staging_dir().join("index.html").exists());
    }

    #[test]
    fn ontology_data_keeps_its_layout() {
        let dir = tempfile::tempdir().unwrap();
        let paths = project(dir.path());
        fs::create_dir_all(paths.ontology_dir().join("foaf")).unwrap();
        fs::write(paths.ontology_dir().join("foaf/foaf.json"), "{}").unwrap();

        let outcome = copy_passthrough(&paths);
        assert!(
            paths
                .staging_dir()
                .join("ontology/foaf/foaf.json")
                .exists()
        );
        assert_eq!(outcome.copied, 1);
    }

    #[test]
    fn missing_sources_do_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let paths = project(dir.path());

        let outcome = copy_passthrough(&paths);
        assert_eq!(outcome.copied, 0);
        assert!(outcome.errors.is_empty());
    }
}
