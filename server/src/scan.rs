//! Directory scanning – finds recordings below a directory.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::warn;

use replay_common::protocol::RecordingDescriptor;

/// Which files count as recordings.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Lower-case extensions including the leading dot.
    pub extensions: Vec<String>,
    /// Minimum size for files without an extension.
    pub min_size: u64,
}

fn is_recording(path: &Path, size: u64, opts: &ScanOptions) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => {
            let ext = format!(".{}", ext.to_ascii_lowercase());
            opts.extensions.iter().any(|e| *e == ext)
        }
        // Extensionless captures (e.g. UUID-named files) are recordings
        // unless they are too small to hold anything.
        None => size >= opts.min_size,
    }
}

/// Recursively list recordings in `dir`, sorted by name.
///
/// Paths are relative to `base` when `dir` lies below it, otherwise relative
/// to `dir`; either way they start with `/`.  Names are relative to `dir`.
/// Hidden entries are skipped, and unreadable entries are skipped with a
/// warning.
pub fn list_recordings(dir: &Path, base: &Path, opts: &ScanOptions) -> Vec<RecordingDescriptor> {
    let root = if dir.starts_with(base) { base } else { dir };
    let mut recordings = Vec::new();
    walk(dir, dir, root, opts, &mut recordings);
    recordings.sort_by(|a, b| a.name.cmp(&b.name));
    recordings
}

fn walk(
    current: &Path,
    listed: &Path,
    root: &Path,
    opts: &ScanOptions,
    out: &mut Vec<RecordingDescriptor>,
) {
    let entries = match std::fs::read_dir(current) {
        Ok(e) => e,
        Err(e) => {
            warn!("Cannot read {}: {e}", current.display());
            return;
        }
    };

    for entry in entries.flatten() {
        if entry.file_name().to_string_lossy().starts_with('.') {
            continue;
        }
        let path = entry.path();
        let Ok(meta) = entry.metadata() else {
            continue;
        };

        if meta.is_dir() {
            walk(&path, listed, root, opts, out);
            continue;
        }
        if !meta.is_file() || !is_recording(&path, meta.len(), opts) {
            continue;
        }

        let modified = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(SystemTime::UNIX_EPOCH).ok())
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();

        out.push(RecordingDescriptor {
            path: format!("/{}", relative(&path, root)),
            name: Some(relative(&path, listed)),
            size: meta.len(),
            modified,
        });
    }
}

/// `path` relative to `root`, with `/` separators.
fn relative(path: &Path, root: &Path) -> String {
    let rel: PathBuf = path.strip_prefix(root).unwrap_or(path).to_path_buf();
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
