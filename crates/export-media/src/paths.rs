// crates/export-media/src/paths.rs
//
// Resolves and validates input file paths against the single recordings
// directory contract (§6): any resolved path that escapes that directory is
// rejected before use, and filenames must match the capture subsystem's
// naming pattern.
//
// Follows the `app_ffmpeg_dir()` style of resolving an app-owned directory
// from the environment before trusting anything under it.

use std::path::{Path, PathBuf};

use export_core::error::{ExportError, ExportResult};

const FILENAME_PREFIXES: &[&str] = &["recording", "camera", "mic", "system-audio"];

/// Validates that `name` matches `(recording|camera|mic|system-audio)-\d{13,14}\.[a-z0-9]+`
/// without pulling in a regex dependency — the donor's own path helpers are
/// plain string/stdlib code, and this grammar is simple enough to check by hand.
pub fn matches_capture_filename(name: &str) -> bool {
    let Some(dot) = name.rfind('.') else { return false };
    let (stem, ext) = (&name[..dot], &name[dot + 1..]);
    if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()) {
        return false;
    }
    let Some(dash) = stem.rfind('-') else { return false };
    let (prefix, digits) = (&stem[..dash], &stem[dash + 1..]);
    if !FILENAME_PREFIXES.contains(&prefix) {
        return false;
    }
    matches!(digits.len(), 13 | 14) && digits.chars().all(|c| c.is_ascii_digit())
}

/// Resolves `file_name` against `recordings_dir`, rejecting the result if it
/// escapes the directory (symlink traversal, `..` components, absolute
/// overrides) or fails the naming contract.
pub fn resolve_recording_path(recordings_dir: &Path, file_name: &str) -> ExportResult<PathBuf> {
    if !matches_capture_filename(file_name) {
        return Err(ExportError::PathRejected(file_name.to_string()));
    }

    let candidate = recordings_dir.join(file_name);
    let canonical_dir = recordings_dir
        .canonicalize()
        .map_err(|_| ExportError::PathRejected(recordings_dir.display().to_string()))?;

    // The file need not exist yet for the escape check (a caller may resolve
    // a path before writing), so canonicalize the parent directory and
    // rejoin rather than requiring the candidate itself to exist.
    let canonical_candidate = match candidate.canonicalize() {
        Ok(p) => p,
        Err(_) => canonical_dir.join(file_name),
    };

    if !canonical_candidate.starts_with(&canonical_dir) {
        return Err(ExportError::PathRejected(candidate.display().to_string()));
    }

    Ok(canonical_candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_names() {
        assert!(matches_capture_filename("recording-1700000000000.webm"));
        assert!(matches_capture_filename("camera-1700000000000.mp4"));
        assert!(matches_capture_filename("mic-1700000000000.webm"));
        assert!(matches_capture_filename("system-audio-17000000000000.webm"));
    }

    #[test]
    fn rejects_malformed_names() {
        assert!(!matches_capture_filename("recording-123.webm")); // too few digits
        assert!(!matches_capture_filename("notaprefix-1700000000000.webm"));
        assert!(!matches_capture_filename("recording-1700000000000"));
        assert!(!matches_capture_filename("../etc/passwd"));
    }

    #[test]
    fn rejects_path_escaping_recordings_dir() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_recording_path(dir.path(), "../evil-1700000000000.webm").unwrap_err();
        assert_eq!(err.kind(), "PathRejected");
    }

    #[test]
    fn resolves_well_formed_name_inside_dir() {
        let dir = tempfile::tempdir().unwrap();
        let name = "recording-1700000000000.webm";
        std::fs::write(dir.path().join(name), b"x").unwrap();
        let resolved = resolve_recording_path(dir.path(), name).unwrap();
        assert!(resolved.starts_with(dir.path().canonicalize().unwrap()));
    }
}
