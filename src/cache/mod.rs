//! Durable track metadata cache.
//!
//! Maps track id to [`Track`] and is the only persisted state. The whole
//! map is written as one JSON snapshot; there is no per-entry storage.
//!
//! - [`TrackCache::load`] never fails: an absent or corrupt snapshot is a
//!   cold start.
//! - [`TrackCache::put`] only touches memory.
//! - [`TrackCache::flush`] writes the full map to a fresh temp file, syncs
//!   it and renames it over the snapshot, so a crash mid-write leaves the
//!   previous snapshot intact.
//!
//! Entries are never evicted implicitly. [`TrackCache::remove`] and
//! [`TrackCache::retain_existing`] are the explicit ways to shrink it.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Result, ResultExt};
use crate::model::Track;

/// In-memory track map bound to its snapshot file.
#[derive(Debug, Clone)]
pub struct TrackCache {
    path: PathBuf,
    tracks: BTreeMap<String, Track>,
}

impl TrackCache {
    /// Create an empty cache that will flush to `path`.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            tracks: BTreeMap::new(),
        }
    }

    /// Load the snapshot at `path`, starting empty on any failure.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();

        let contents = match std::fs::read(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No cache snapshot found, starting cold");
                return Self::empty(path);
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read cache snapshot, starting cold");
                return Self::empty(path);
            }
        };

        match serde_json::from_slice::<BTreeMap<String, Track>>(&contents) {
            Ok(tracks) => {
                tracing::info!(path = %path.display(), entries = tracks.len(), "Loaded cache snapshot");
                Self { path, tracks }
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Cache snapshot is corrupt, starting cold");
                Self::empty(path)
            }
        }
    }

    /// Snapshot file location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up a track by id.
    pub fn get(&self, id: &str) -> Option<&Track> {
        self.tracks.get(id)
    }

    /// Check if a track id is cached.
    pub fn contains(&self, id: &str) -> bool {
        self.tracks.contains_key(id)
    }

    /// Insert or overwrite a track. Does not persist.
    pub fn put(&mut self, id: impl Into<String>, track: Track) {
        self.tracks.insert(id.into(), track);
    }

    /// Remove a single entry. Does not persist.
    pub fn remove(&mut self, id: &str) -> Option<Track> {
        self.tracks.remove(id)
    }

    /// Drop every entry whose file is no longer under `root`.
    ///
    /// Returns the ids that were removed. Does not persist.
    pub fn retain_existing(&mut self, root: &Path) -> Vec<String> {
        let mut removed = Vec::new();
        self.tracks.retain(|id, track| {
            let keep = track.absolute_path(root).is_file();
            if !keep {
                removed.push(id.clone());
            }
            keep
        });
        removed
    }

    /// Number of cached tracks.
    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// Serialize the full map as the snapshot body.
    pub fn to_snapshot(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(&self.tracks)?)
    }

    /// Write the full map to disk, replacing the previous snapshot.
    pub fn flush(&self) -> Result<()> {
        write_snapshot(&self.path, &self.to_snapshot()?)
    }
}

/// Write snapshot bytes atomically.
///
/// The bytes go to a uniquely named temp file beside `path`, are synced
/// to disk, and the temp file is then renamed over `path`. Concurrent
/// writers never share a temp file, so the snapshot on disk is always
/// one writer's complete output.
pub fn write_snapshot(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)
        .with_context(format!("creating cache directory {}", dir.display()))?;

    let mut temp = tempfile::Builder::new()
        .prefix(".snapshot-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .with_context(format!("creating temp file in {}", dir.display()))?;
    temp.write_all(contents)
        .with_context(format!("writing {}", temp.path().display()))?;
    temp.as_file()
        .sync_all()
        .with_context(format!("syncing {}", temp.path().display()))?;
    temp.persist(path)
        .map_err(|e| e.error)
        .with_context(format!("replacing {}", path.display()))?;

    tracing::debug!(path = %path.display(), bytes = contents.len(), "Flushed cache snapshot");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TrackTags;
    use crate::test_utils::mock_track;
    use tempfile::TempDir;

    #[test]
    fn test_put_and_get() {
        let temp = TempDir::new().unwrap();
        let mut cache = TrackCache::empty(temp.path().join("cache.json"));
        let track = mock_track("yedits", "a.mp3");

        cache.put(track.id.clone(), track.clone());

        assert!(cache.contains("yedits/a.mp3"));
        assert_eq!(cache.get("yedits/a.mp3"), Some(&track));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_get_nonexistent_returns_none() {
        let temp = TempDir::new().unwrap();
        let cache = TrackCache::empty(temp.path().join("cache.json"));
        assert!(cache.get("yedits/missing.mp3").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_missing_snapshot_loads_empty() {
        let temp = TempDir::new().unwrap();
        let cache = TrackCache::load(temp.path().join("cache.json"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_corrupt_snapshot_loads_empty() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cache.json");
        std::fs::write(&path, "{ not json").unwrap();

        let cache = TrackCache::load(&path);
        assert!(cache.is_empty());
        assert_eq!(cache.path(), path);
    }

    #[test]
    fn test_snapshot_roundtrip_preserves_every_field() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cache.json");

        let tagged = Track::from_tags(
            "yedits",
            "sub/full.flac",
            TrackTags {
                title: Some("Full".into()),
                artist: Some("Someone".into()),
                album: Some("Record".into()),
                year: Some(2004),
                genre: Some("Jungle".into()),
            },
            12345,
        );
        let bare = Track::placeholder("personal", "bare.mp3", 1000);

        let mut cache = TrackCache::empty(&path);
        cache.put(tagged.id.clone(), tagged.clone());
        cache.put(bare.id.clone(), bare.clone());
        cache.flush().unwrap();

        let loaded = TrackCache::load(&path);
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.get(&tagged.id), Some(&tagged));
        assert_eq!(loaded.get(&bare.id), Some(&bare));
        assert_eq!(loaded.get(&bare.id).unwrap().album, None);
    }

    #[test]
    fn test_flush_leaves_no_temp_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("cache.json");

        let mut cache = TrackCache::empty(&path);
        let track = mock_track("yedits", "a.mp3");
        cache.put(track.id.clone(), track);
        cache.flush().unwrap();

        let entries: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("cache.json")]);
    }

    #[test]
    fn test_concurrent_writers_never_interleave() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cache.json");

        let mut small = TrackCache::empty(&path);
        let a = mock_track("yedits", "a.mp3");
        small.put(a.id.clone(), a);

        let mut large = TrackCache::empty(&path);
        for i in 0..200 {
            let track = mock_track("personal", &format!("album/{i:03}.flac"));
            large.put(track.id.clone(), track);
        }

        std::thread::scope(|s| {
            for cache in [&small, &large] {
                s.spawn(move || {
                    for _ in 0..50 {
                        cache.flush().unwrap();
                    }
                });
            }
        });

        let contents = std::fs::read(&path).unwrap();
        let on_disk: BTreeMap<String, Track> = serde_json::from_slice(&contents).unwrap();
        assert!(on_disk.len() == 1 || on_disk.len() == 200);
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_flush_overwrites_previous_snapshot() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("cache.json");

        let mut cache = TrackCache::empty(&path);
        let a = mock_track("yedits", "a.mp3");
        cache.put(a.id.clone(), a.clone());
        cache.flush().unwrap();

        cache.remove(&a.id);
        let b = mock_track("yedits", "b.mp3");
        cache.put(b.id.clone(), b.clone());
        cache.flush().unwrap();

        let loaded = TrackCache::load(&path);
        assert!(!loaded.contains(&a.id));
        assert!(loaded.contains(&b.id));
    }

    #[test]
    fn test_flush_to_unwritable_location_fails() {
        let temp = TempDir::new().unwrap();
        // A regular file where the parent directory should be
        let blocker = temp.path().join("blocker");
        std::fs::write(&blocker, b"x").unwrap();

        let cache = TrackCache::empty(blocker.join("cache.json"));
        assert!(cache.flush().is_err());
    }

    #[test]
    fn test_retain_existing_drops_deleted_files() {
        let temp = TempDir::new().unwrap();
        let root = temp.path();
        std::fs::create_dir_all(root.join("yedits")).unwrap();
        std::fs::write(root.join("yedits").join("kept.mp3"), b"x").unwrap();

        let mut cache = TrackCache::empty(root.join("cache.json"));
        let kept = mock_track("yedits", "kept.mp3");
        let gone = mock_track("yedits", "gone.mp3");
        cache.put(kept.id.clone(), kept.clone());
        cache.put(gone.id.clone(), gone.clone());

        let removed = cache.retain_existing(root);

        assert_eq!(removed, vec![gone.id.clone()]);
        assert!(cache.contains(&kept.id));
        assert!(!cache.contains(&gone.id));
    }
}
