//! Audio file metadata reading.
//!
//! Uses the lofty crate for format-independent tag access across MP3,
//! FLAC, OGG, M4A and WAV files. Reads are blocking and may be slow on
//! large files, so the library scanner runs them on the blocking pool.
//!
//! The [`TagReader`] trait is the seam between the scanner and the tag
//! library; tests substitute a fake that counts calls.

use lofty::file::TaggedFileExt;
use lofty::probe::Probe;
use lofty::tag::Accessor;
use std::path::Path;

use crate::error::{Error, Result};
use crate::model::TrackTags;

/// Reads display tags from an audio file.
///
/// Implementations are called from blocking threads and must be safe to
/// call concurrently.
pub trait TagReader: Send + Sync {
    /// Read whatever tags the file carries. Missing tags are `None`;
    /// an unreadable or unrecognised file is an error.
    fn read(&self, path: &Path) -> Result<TrackTags>;
}

/// Production reader backed by lofty.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoftyReader;

impl TagReader for LoftyReader {
    fn read(&self, path: &Path) -> Result<TrackTags> {
        read(path)
    }
}

/// Reads tags from `path` with lofty.
pub fn read(path: &Path) -> Result<TrackTags> {
    // Probe the file to determine format and read tags
    let tagged_file = Probe::open(path)
        .map_err(|e| Error::metadata(path, format!("failed to open file for probing: {e}")))?
        .read()
        .map_err(|e| Error::metadata(path, format!("failed to read file metadata: {e}")))?;

    // Get the primary tag, or fall back to the first available tag
    let Some(tag) = tagged_file
        .primary_tag()
        .or_else(|| tagged_file.first_tag())
    else {
        return Ok(TrackTags::default());
    };

    Ok(TrackTags {
        title: tag.title().map(|s| s.to_string()),
        artist: tag.artist().map(|s| s.to_string()),
        album: tag.album().map(|s| s.to_string()),
        year: tag.year(),
        genre: tag.genre().map(|s| s.to_string()),
    })
}
