//! Utility functions for output resolution and file cleanup

use std::path::{Path, PathBuf};

/// Extensions tried, in order, when resolving a finished download's output file
const CANDIDATE_EXTENSIONS: [&str; 6] = ["mp4", "mkv", "webm", "m4a", "mp3", "pdf"];

/// Build the ordered candidate list for a destination base path.
///
/// The bare base path (extension stripped) comes first, then the requested
/// path as given when it carried an extension, then the base with each known
/// media extension appended.
pub(crate) fn output_candidates(dest: &Path) -> Vec<PathBuf> {
    let base = dest.with_extension("");
    let mut candidates = vec![base.clone()];
    if dest.extension().is_some() {
        candidates.push(dest.to_path_buf());
    }
    for ext in CANDIDATE_EXTENSIONS {
        candidates.push(base.with_extension(ext));
    }
    candidates
}

/// Resolve the output file produced by a finished downloader run.
///
/// Checks the ordered candidate list first; if no candidate exists as a
/// regular file, scans the destination directory for any regular file whose
/// name starts with the base's file-name prefix. Returns `None` when nothing
/// matches.
pub fn resolve_output(dest: &Path) -> Option<PathBuf> {
    for candidate in output_candidates(dest) {
        if candidate.is_file() {
            return Some(candidate);
        }
    }

    // Fallback: directory scan by file-name prefix. The downloader may have
    // appended format ids or an unexpected extension.
    let base = dest.with_extension("");
    let prefix = base.file_name()?.to_str()?.to_string();
    let directory = match base.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let entries = std::fs::read_dir(&directory).ok()?;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if name.starts_with(&prefix) {
            let path = entry.path();
            if path.is_file() {
                return Some(path);
            }
        }
    }
    None
}

/// Delete a file if it exists, swallowing any error.
///
/// Cleanup is best-effort and must tolerate the file already having been
/// removed by a previous step.
pub async fn safe_remove(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "removed temporary file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::debug!(path = %path.display(), error = %e, "could not remove file"),
    }
}
