//! Library index and category scanning.
//!
//! [`Library`] is the state holder shared by the CLI and the HTTP layer.
//! It owns the [`TrackCache`] and the per-category index, and is the only
//! code path that mutates either.
//!
//! A category scan enumerates audio files, reuses cached tracks by id,
//! extracts tags for cache misses with at most `concurrency` reads in
//! flight, then flushes the cache snapshot once. A rebuild scans every
//! category and swaps the index in one step, so readers only ever see a
//! complete index.
//!
//! Rebuilds (and the explicit cache maintenance operations) are serialised
//! by an async mutex: a rescan requested while another is running waits
//! for it and then runs its own pass over the now-warm cache.

use futures::{StreamExt, stream};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cache::{self, TrackCache};
use crate::error::{Error, Result, ResultExt};
use crate::metadata::TagReader;
use crate::model::{self, CATEGORIES, Track};
use crate::scanner;

/// Default number of tag reads allowed in flight during a scan.
pub const DEFAULT_SCAN_CONCURRENCY: usize = 4;

/// Per-category outcome of a scan.
#[derive(Debug, Clone, Default)]
pub struct CategoryScan {
    pub tracks: Vec<Track>,
    /// Tracks reused from the cache
    pub cached: usize,
    /// Tracks whose tags were read successfully
    pub extracted: usize,
    /// Tracks stored with fallback fields after a failed read
    pub placeholders: usize,
}

/// Result of a full rebuild.
#[derive(Debug, Clone)]
pub struct RebuildSummary {
    pub counts: BTreeMap<String, usize>,
    pub scanned_at: String,
}

/// Everything a stream response needs, resolved once per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamTarget {
    pub id: String,
    pub path: PathBuf,
    pub mime_type: String,
}

/// How one candidate file was resolved.
enum Resolved {
    Cached(Track),
    Extracted(Track),
    Placeholder(Track),
    /// Disappeared between enumeration and stat
    Vanished,
}

/// Shared library state: cache, index and scan configuration.
pub struct Library {
    root: PathBuf,
    cache: RwLock<TrackCache>,
    index: RwLock<HashMap<String, Arc<[Track]>>>,
    rescan: tokio::sync::Mutex<()>,
    reader: Arc<dyn TagReader>,
    concurrency: usize,
}

impl Library {
    /// Create a library over `root` with an already-loaded cache. The
    /// index starts empty until [`Library::rebuild`] runs.
    pub fn new(
        root: impl Into<PathBuf>,
        cache: TrackCache,
        reader: Arc<dyn TagReader>,
        concurrency: usize,
    ) -> Self {
        Self {
            root: root.into(),
            cache: RwLock::new(cache),
            index: RwLock::new(HashMap::new()),
            rescan: tokio::sync::Mutex::new(()),
            reader,
            concurrency: concurrency.max(1),
        }
    }

    /// Music root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Number of entries in the track cache.
    pub fn cached_tracks(&self) -> usize {
        self.cache.read().len()
    }

    /// Tracks from the most recent completed rebuild.
    ///
    /// A configured category that has not been scanned yet lists empty.
    pub fn listing(&self, category: &str) -> Result<Arc<[Track]>> {
        if !model::is_category(category) {
            return Err(Error::UnknownCategory(category.to_string()));
        }
        Ok(self
            .index
            .read()
            .get(category)
            .cloned()
            .unwrap_or_else(|| Arc::from(Vec::new())))
    }

    /// Resolve a stream request to a file path and MIME type.
    ///
    /// Only ids present in the cache are served, which also keeps
    /// requests from reaching files outside the category directories.
    pub fn resolve_stream(&self, category: &str, relative_path: &str) -> Result<StreamTarget> {
        if !model::is_category(category) {
            return Err(Error::UnknownCategory(category.to_string()));
        }
        let id = model::track_id(category, relative_path);
        let cache = self.cache.read();
        let track = cache
            .get(&id)
            .ok_or_else(|| Error::not_found(model::absolute_path(&self.root, category, relative_path)))?;

        Ok(StreamTarget {
            path: track.absolute_path(&self.root),
            mime_type: track.mime_type.clone(),
            id,
        })
    }

    /// Scan every category and replace the index.
    ///
    /// All-or-nothing: if any category fails, the previous index stays in
    /// place and the error is returned.
    pub async fn rebuild(&self) -> Result<RebuildSummary> {
        let _guard = self.rescan.lock().await;

        let mut next: HashMap<String, Arc<[Track]>> = HashMap::new();
        let mut counts = BTreeMap::new();
        for category in CATEGORIES {
            let scan = self
                .scan_category(category)
                .await
                .with_context(format!("scanning category {category}"))?;

            info!(
                category,
                tracks = scan.tracks.len(),
                cached = scan.cached,
                extracted = scan.extracted,
                placeholders = scan.placeholders,
                "Category scanned"
            );
            counts.insert(category.to_string(), scan.tracks.len());
            next.insert(category.to_string(), Arc::from(scan.tracks));
        }

        *self.index.write() = next;

        let summary = RebuildSummary {
            counts,
            scanned_at: chrono::Utc::now().to_rfc3339(),
        };
        info!(root = %self.root.display(), counts = ?summary.counts, "Library index rebuilt");
        Ok(summary)
    }

    /// Scan one category directory, update the cache and flush it.
    async fn scan_category(&self, category: &str) -> Result<CategoryScan> {
        let dir = self.root.join(category);
        if !tokio::fs::metadata(&dir).await.is_ok_and(|m| m.is_dir()) {
            warn!(category, dir = %dir.display(), "Category directory missing, listing empty");
            return Ok(CategoryScan::default());
        }

        let files = {
            let dir = dir.clone();
            tokio::task::spawn_blocking(move || scanner::collect_audio_files(&dir)).await?
        };

        // Cache lookups all happen before the flush at the end
        let candidates: Vec<(String, Option<Track>)> = {
            let cache = self.cache.read();
            files
                .into_iter()
                .map(|rel| {
                    let hit = cache.get(&model::track_id(category, &rel)).cloned();
                    (rel, hit)
                })
                .collect()
        };

        let resolved: Vec<Resolved> = stream::iter(candidates)
            .map(|(rel, hit)| async move {
                match hit {
                    Some(track) => Resolved::Cached(track),
                    None => self.extract(category, rel).await,
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut scan = CategoryScan::default();
        let mut fresh = Vec::new();
        for outcome in resolved {
            match outcome {
                Resolved::Cached(track) => {
                    scan.cached += 1;
                    scan.tracks.push(track);
                }
                Resolved::Extracted(track) => {
                    scan.extracted += 1;
                    fresh.push(track.clone());
                    scan.tracks.push(track);
                }
                Resolved::Placeholder(track) => {
                    scan.placeholders += 1;
                    fresh.push(track.clone());
                    scan.tracks.push(track);
                }
                Resolved::Vanished => {}
            }
        }

        let (path, snapshot) = {
            let mut cache = self.cache.write();
            for track in fresh {
                cache.put(track.id.clone(), track);
            }
            (cache.path().to_path_buf(), cache.to_snapshot()?)
        };
        tokio::task::spawn_blocking(move || cache::write_snapshot(&path, &snapshot)).await??;

        Ok(scan)
    }

    /// Read tags and size for a cache miss.
    async fn extract(&self, category: &str, rel: String) -> Resolved {
        let path = model::absolute_path(&self.root, category, &rel);
        let reader = Arc::clone(&self.reader);
        let task_path = path.clone();

        let outcome = tokio::task::spawn_blocking(move || {
            let size = std::fs::metadata(&task_path).map(|m| m.len());
            let tags = reader.read(&task_path);
            (size, tags)
        })
        .await;

        let (size, tags) = match outcome {
            Ok(pair) => pair,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Tag reader task failed");
                return match tokio::fs::metadata(&path).await {
                    Ok(meta) => Resolved::Placeholder(Track::placeholder(category, &rel, meta.len())),
                    Err(_) => Resolved::Vanished,
                };
            }
        };

        let size = match size {
            Ok(size) => size,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "File vanished during scan, skipping");
                return Resolved::Vanished;
            }
        };

        match tags {
            Ok(tags) => {
                debug!(path = %path.display(), "Extracted tags");
                Resolved::Extracted(Track::from_tags(category, &rel, tags, size))
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Tag extraction failed, storing fallback metadata");
                Resolved::Placeholder(Track::placeholder(category, &rel, size))
            }
        }
    }

    /// Remove one cache entry and flush. The file is re-extracted on the
    /// next rescan if it still exists.
    pub async fn evict(&self, id: &str) -> Result<Option<Track>> {
        let _guard = self.rescan.lock().await;

        let (removed, path, snapshot) = {
            let mut cache = self.cache.write();
            let removed = cache.remove(id);
            (removed, cache.path().to_path_buf(), cache.to_snapshot()?)
        };
        if removed.is_some() {
            tokio::task::spawn_blocking(move || cache::write_snapshot(&path, &snapshot)).await??;
            info!(id, "Evicted cache entry");
        }
        Ok(removed)
    }

    /// Drop cache entries whose files no longer exist, then flush.
    ///
    /// Returns the removed ids. The index is left as is until the next
    /// rebuild.
    pub async fn prune(&self) -> Result<Vec<String>> {
        let _guard = self.rescan.lock().await;

        let mut pruned = self.cache.read().clone();
        let root = self.root.clone();
        let (pruned, removed) = tokio::task::spawn_blocking(move || -> Result<_> {
            let removed = pruned.retain_existing(&root);
            if !removed.is_empty() {
                pruned.flush()?;
            }
            Ok((pruned, removed))
        })
        .await??;

        if !removed.is_empty() {
            info!(removed = removed.len(), "Pruned stale cache entries");
        }
        *self.cache.write() = pruned;
        Ok(removed)
    }
}
