//! Core data model for the music library.
//!
//! Defines the [`Track`] record served by the listing endpoint and stored
//! in the metadata cache, the fixed set of library [`CATEGORIES`], and the
//! identifier scheme that keys both.
//!
//! # Identifiers
//!
//! A track id is `<category>/<relative path>` with forward slashes only.
//! It doubles as the cache key and as the tail of the stream URL, so the
//! same logical file must map to the same id regardless of which separator
//! the host platform (or the client) used.

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

/// Top-level library partitions. Each is a subdirectory of the music root.
pub const CATEGORIES: [&str; 2] = ["yedits", "personal"];

/// Artist label used when the file carries no artist tag.
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// MIME type for extensions missing from [`mime_for_extension`]'s table.
pub const DEFAULT_MIME: &str = "audio/mpeg";

/// Returns true if `name` is one of the configured categories.
pub fn is_category(name: &str) -> bool {
    CATEGORIES.contains(&name)
}

/// One audio file's listing record.
///
/// `album`, `year` and `genre` are always serialized (as `null` when
/// absent) so a snapshot round-trip keeps the absent/empty distinction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: String,
    pub category: String,
    /// Forward-slash path relative to the category directory
    pub relative_path: String,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub year: Option<u32>,
    pub genre: Option<String>,
    pub mime_type: String,
    /// File size in bytes when this record was built
    pub size: u64,
}

/// Tag data returned by a metadata reader. Every field is optional;
/// fallbacks are applied by [`Track::from_tags`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackTags {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub year: Option<u32>,
    pub genre: Option<String>,
}

impl Track {
    /// Builds a track from extracted tags, applying the display fallbacks:
    /// title falls back to the file stem, artist to [`UNKNOWN_ARTIST`],
    /// everything else stays `None`. Empty strings and a zero year count
    /// as missing.
    pub fn from_tags(category: &str, relative_path: &str, tags: TrackTags, size: u64) -> Self {
        let relative_path = normalize_relative(relative_path);
        let title = non_empty(tags.title).unwrap_or_else(|| file_stem(&relative_path).to_string());
        let artist = non_empty(tags.artist).unwrap_or_else(|| UNKNOWN_ARTIST.to_string());

        Self {
            id: track_id(category, &relative_path),
            category: category.to_string(),
            mime_type: mime_for_path(&relative_path).to_string(),
            relative_path,
            title,
            artist,
            album: non_empty(tags.album),
            year: tags.year.filter(|y| *y != 0),
            genre: non_empty(tags.genre),
            size,
        }
    }

    /// Builds a track carrying only fallback fields, used when tag
    /// extraction fails.
    pub fn placeholder(category: &str, relative_path: &str, size: u64) -> Self {
        Self::from_tags(category, relative_path, TrackTags::default(), size)
    }

    /// Absolute location of this track's file under `root`.
    pub fn absolute_path(&self, root: &Path) -> PathBuf {
        absolute_path(root, &self.category, &self.relative_path)
    }
}

/// Derives the stable track id for a file.
///
/// Both `/` and `\` are treated as separators; empty and `.` segments are
/// dropped so `a//b.mp3`, `./a/b.mp3` and `a\b.mp3` all yield the same id.
pub fn track_id(category: &str, relative_path: &str) -> String {
    format!("{}/{}", category, normalize_relative(relative_path))
}

/// Canonical forward-slash form of a relative path.
pub fn normalize_relative(relative_path: &str) -> String {
    relative_path
        .split(['/', '\\'])
        .filter(|seg| !seg.is_empty() && *seg != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Joins a normalised relative path onto `<root>/<category>` using the
/// host's separator.
pub fn absolute_path(root: &Path, category: &str, relative_path: &str) -> PathBuf {
    let mut path = root.join(category);
    for seg in normalize_relative(relative_path).split('/') {
        path.push(seg);
    }
    path
}

/// Converts a path below `base` into its normalised relative form.
///
/// Returns `None` when `path` is not under `base` or contains components
/// that cannot appear in an id (`..`, roots, non-UTF-8 names).
pub fn relative_to(base: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(base).ok()?;
    let mut segments = Vec::new();
    for component in rel.components() {
        match component {
            Component::Normal(seg) => segments.push(seg.to_str()?),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if segments.is_empty() {
        return None;
    }
    Some(segments.join("/"))
}

/// MIME type for a lower-cased file extension.
pub fn mime_for_extension(ext: &str) -> &'static str {
    match ext {
        "flac" => "audio/flac",
        "ogg" => "audio/ogg",
        "wav" => "audio/wav",
        "m4a" => "audio/mp4",
        _ => DEFAULT_MIME,
    }
}

/// MIME type derived from the file name's extension (case-insensitive).
pub fn mime_for_path(relative_path: &str) -> &'static str {
    let ext = Path::new(relative_path)
        .extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default();
    mime_for_extension(&ext)
}

fn file_stem(relative_path: &str) -> &str {
    Path::new(relative_path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(relative_path)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}
