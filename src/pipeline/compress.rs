//! Brotli compression for production artifacts.
//!
//! Every script, style, markup, and wasm artifact in the staging tree
//! gains a `.br` sibling. Whether the uncompressed original survives is
//! an explicit config choice (`[build] keep_uncompressed`).

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use rayon::prelude::*;

/// Brotli quality 11 matches the original deploy setup; these artifacts
/// are compressed once and served many times.
const QUALITY: u32 = 11;
const LG_WINDOW: u32 = 22;

/// Extensions that receive a compressed sibling.
const COMPRESSIBLE: &[&str] = &["js", "mjs", "css", "html", "wasm"];

/// Compress the staging tree. Returns the number of `.br` siblings written.
pub(super) fn compress_staging(staging: &Path, keep_uncompressed: bool) -> Result<usize> {
    let files = collect_compressible(staging);

    files
        .par_iter()
        .map(|path| {
            compress_file(path)?;
            if !keep_uncompressed {
                fs::remove_file(path)
                    .with_context(|| format!("Failed to remove {}", path.display()))?;
            }
            Ok(())
        })
        .collect::<Result<Vec<()>>>()?;

    Ok(files.len())
}

/// Write `<path>.br` next to the original.
fn compress_file(path: &Path) -> Result<()> {
    let input = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;

    let sibling = br_sibling(path);
    let file = fs::File::create(&sibling)
        .with_context(|| format!("Failed to create {}", sibling.display()))?;

    let mut writer = brotli::CompressorWriter::new(file, 4096, QUALITY, LG_WINDOW);
    writer
        .write_all(&input)
        .with_context(|| format!("Failed to compress {}", path.display()))?;
    writer.flush()?;
    Ok(())
}

/// `js/app.js` -> `js/app.js.br`
fn br_sibling(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".br");
    PathBuf::from(name)
}

fn collect_compressible(staging: &Path) -> Vec<PathBuf> {
    jwalk::WalkDir::new(staging)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|ext| COMPRESSIBLE.contains(&ext))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn siblings_are_created_and_originals_kept() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("js")).unwrap();
        fs::write(dir.path().join("js/app.js"), "console.log(1);".repeat(50)).unwrap();
        fs::write(dir.path().join("index.html"), "<html></html>").unwrap();
        fs::write(dir.path().join("favicon.ico"), [0u8; 16]).unwrap();

        let count = compress_staging(dir.path(), true).unwrap();
        assert_eq!(count, 2);
        assert!(dir.path().join("js/app.js.br").exists());
        assert!(dir.path().join("index.html.br").exists());
        // originals kept, non-compressible untouched
        assert!(dir.path().join("js/app.js").exists());
        assert!(!dir.path().join("favicon.ico.br").exists());
    }

    #[test]
    fn originals_removed_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("app.css"), "body{color:red}").unwrap();

        compress_staging(dir.path(), false).unwrap();
        assert!(dir.path().join("app.css.br").exists());
        assert!(!dir.path().join("app.css").exists());
    }

    #[test]
    fn compressed_output_is_smaller_for_redundant_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.js");
        fs::write(&path, "var x = 0; // padding\n".repeat(500)).unwrap();

        compress_staging(dir.path(), true).unwrap();
        let original = fs::metadata(&path).unwrap().len();
        let compressed = fs::metadata(dir.path().join("big.js.br")).unwrap().len();
        assert!(compressed < original);
    }
}
