//! Library scanning and cache maintenance commands.

use tokio::runtime::Runtime;

use super::open_library;
use crate::config::Settings;
use crate::server::client::ServerClient;

/// Scan every category and print the resulting counts
pub fn cmd_scan(rt: &Runtime, settings: &Settings) -> anyhow::Result<()> {
    rt.block_on(async {
        let library = open_library(settings);
        println!("Scanning library: {}", settings.root.display());

        let summary = library.rebuild().await?;
        for (category, count) in &summary.counts {
            println!("  {category}: {count} tracks");
        }
        println!("Scan complete. {} tracks in cache.", library.cached_tracks());
        Ok(())
    })
}

/// List the tracks of one category
pub fn cmd_list(rt: &Runtime, settings: &Settings, category: &str) -> anyhow::Result<()> {
    rt.block_on(async {
        let library = open_library(settings);
        library.rebuild().await?;

        for track in library.listing(category)?.iter() {
            println!("{}  {} - {}", track.id, track.artist, track.title);
        }
        Ok(())
    })
}

/// Drop cache entries for files that were deleted
///
/// A running server does the pruning itself; otherwise the snapshot file
/// is edited directly.
pub fn cmd_prune(rt: &Runtime, settings: &Settings) -> anyhow::Result<()> {
    rt.block_on(async {
        let server = ServerClient::new(&settings.bind, settings.port)?;
        let removed = match server.prune().await? {
            Some(removed) => {
                println!("Pruned through the running server on port {}", settings.port);
                removed
            }
            None => open_library(settings).prune().await?,
        };

        for id in &removed {
            println!("Removed {id}");
        }
        println!("Pruned {} stale entries.", removed.len());
        Ok(())
    })
}

/// Remove one cache entry
///
/// Goes through a running server when there is one, so its in-memory
/// cache cannot write the entry back on the next rescan.
pub fn cmd_evict(rt: &Runtime, settings: &Settings, id: &str) -> anyhow::Result<()> {
    rt.block_on(async {
        let server = ServerClient::new(&settings.bind, settings.port)?;
        if let Some(evicted) = server.evict(id).await? {
            if evicted {
                println!("Evicted {id} through the running server");
            } else {
                println!("No cache entry for {id}");
            }
            return Ok(());
        }

        match open_library(settings).evict(id).await? {
            Some(track) => println!("Evicted {} ({} - {})", track.id, track.artist, track.title),
            None => println!("No cache entry for {id}"),
        }
        Ok(())
    })
}
