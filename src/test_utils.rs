//! Test utilities and fixtures for music-streamer tests.
//!
//! Provides mock factories, a counting [`TagReader`] double and helpers
//! for laying out a throwaway music library on disk.
//!
//! # Example
//!
//! ```ignore
//! use crate::test_utils::{FakeReader, temp_library};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let dir = temp_library(&[("yedits", "a.mp3", 1000)]);
//!     let reader = FakeReader::new();
//!     // ... test logic
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tempfile::TempDir;

use crate::error::{Error, Result};
use crate::metadata::TagReader;
use crate::model::{Track, TrackTags};

/// Creates a mock Track with fallback metadata and a fixed size.
pub fn mock_track(category: &str, relative_path: &str) -> Track {
    Track::placeholder(category, relative_path, 1000)
}

/// Creates a temporary music root containing `(category, relative path,
/// size)` files filled with zero bytes.
///
/// Keep the TempDir alive for the duration of your test.
pub fn temp_library(files: &[(&str, &str, usize)]) -> TempDir {
    let dir = tempfile::tempdir().expect("Failed to create temp directory");
    for (category, rel, size) in files {
        write_file(dir.path(), category, rel, *size);
    }
    dir
}

/// Writes a zero-filled file at `<root>/<category>/<rel>`.
pub fn write_file(root: &Path, category: &str, rel: &str, size: usize) {
    let path = crate::model::absolute_path(root, category, rel);
    std::fs::create_dir_all(path.parent().expect("file has a parent"))
        .expect("Failed to create directories");
    std::fs::write(&path, vec![0u8; size]).expect("Failed to write file");
}

/// Writes a file whose bytes are `0, 1, 2, ... 255, 0, 1, ...`, so any
/// byte window can be checked against its offset.
pub fn write_patterned_file(root: &Path, category: &str, rel: &str, size: usize) -> Vec<u8> {
    let path = crate::model::absolute_path(root, category, rel);
    std::fs::create_dir_all(path.parent().expect("file has a parent"))
        .expect("Failed to create directories");
    let bytes: Vec<u8> = (0..size).map(|i| (i % 256) as u8).collect();
    std::fs::write(&path, &bytes).expect("Failed to write file");
    bytes
}

/// A [`TagReader`] that serves canned tags, counts calls and records the
/// highest number of reads in flight at once.
#[derive(Clone, Default)]
pub struct FakeReader {
    inner: Arc<FakeReaderState>,
}

#[derive(Default)]
struct FakeReaderState {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    delay: Mutex<Option<Duration>>,
    tags: Mutex<HashMap<String, TrackTags>>,
    failing: Mutex<Vec<String>>,
}

impl FakeReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every read sleeps for `delay` before returning.
    pub fn with_delay(self, delay: Duration) -> Self {
        *self.inner.delay.lock() = Some(delay);
        self
    }

    /// Reads of a file named `file_name` return `tags`.
    pub fn with_tags(self, file_name: &str, tags: TrackTags) -> Self {
        self.inner.tags.lock().insert(file_name.to_string(), tags);
        self
    }

    /// Reads of a file named `file_name` fail.
    pub fn failing_on(self, file_name: &str) -> Self {
        self.inner.failing.lock().push(file_name.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.inner.max_in_flight.load(Ordering::SeqCst)
    }
}

impl TagReader for FakeReader {
    fn read(&self, path: &Path) -> Result<TrackTags> {
        let state = &self.inner;
        state.calls.fetch_add(1, Ordering::SeqCst);
        let now = state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        state.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = *state.delay.lock();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }

        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        let result = if state.failing.lock().contains(&name) {
            Err(Error::metadata(path, "fake read failure"))
        } else {
            Ok(state.tags.lock().get(&name).cloned().unwrap_or_default())
        };

        state.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_library_writes_sized_files() {
        let dir = temp_library(&[("yedits", "sub/a.mp3", 10), ("personal", "b.flac", 3)]);
        let a = dir.path().join("yedits").join("sub").join("a.mp3");
        assert_eq!(std::fs::metadata(a).unwrap().len(), 10);
        let b = dir.path().join("personal").join("b.flac");
        assert_eq!(std::fs::metadata(b).unwrap().len(), 3);
    }

    #[test]
    fn test_fake_reader_counts_and_fails() {
        let reader = FakeReader::new()
            .with_tags("a.mp3", TrackTags {
                title: Some("A".into()),
                ..Default::default()
            })
            .failing_on("bad.mp3");

        let tags = reader.read(Path::new("/x/a.mp3")).unwrap();
        assert_eq!(tags.title.as_deref(), Some("A"));
        assert!(reader.read(Path::new("/x/bad.mp3")).is_err());
        assert_eq!(reader.read(Path::new("/x/other.mp3")).unwrap(), TrackTags::default());
        assert_eq!(reader.calls(), 3);
        assert_eq!(reader.max_in_flight(), 1);
    }

    #[test]
    fn test_mock_track_defaults() {
        let track = mock_track("yedits", "dir/song.mp3");
        assert_eq!(track.id, "yedits/dir/song.mp3");
        assert_eq!(track.title, "song");
        assert_eq!(track.size, 1000);
    }
}
