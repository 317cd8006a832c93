//! Candidate file enumeration for a category directory.

use std::path::Path;
use walkdir::WalkDir;

use crate::model;

/// Extensions accepted by the scanner (compared case-insensitively).
pub const AUDIO_EXTENSIONS: [&str; 5] = ["mp3", "flac", "wav", "ogg", "m4a"];

/// Check if a path has an audio file extension
pub fn is_audio_file(path: &Path) -> bool {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase());
    matches!(ext.as_deref(), Some(e) if AUDIO_EXTENSIONS.contains(&e))
}

/// Recursively lists audio files under `root`.
///
/// Returns forward-slash paths relative to `root`, sorted so repeated
/// scans of an unchanged tree produce the same order. Unreadable entries
/// and names that are not valid UTF-8 are skipped. A missing `root`
/// yields an empty list.
pub fn collect_audio_files(root: &Path) -> Vec<String> {
    let mut files: Vec<String> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| is_audio_file(e.path()))
        .filter_map(|e| model::relative_to(root, e.path()))
        .collect();
    files.sort();
    files
}
