//! CLI command definitions and dispatch.
//!
//! Each subcommand is implemented in its own submodule:
//! - `serve`: initial scan followed by the HTTP API (the default)
//! - `scan`: one-shot scan, listing and cache maintenance

mod scan;
mod serve;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Runtime;

use crate::cache::TrackCache;
use crate::config::{self, Overrides, Settings};
use crate::library::Library;
use crate::metadata::LoftyReader;

pub use scan::{cmd_evict, cmd_list, cmd_prune, cmd_scan};
pub use serve::cmd_serve;

/// Music Streamer CLI
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Music library root (one subdirectory per category)
    #[arg(long, env = "MUSIC_ROOT", global = true)]
    pub root: Option<PathBuf>,

    /// Metadata cache snapshot file
    #[arg(long, env = "MUSIC_CACHE", global = true)]
    pub cache: Option<PathBuf>,

    /// Config file (defaults to the OS config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Port for the HTTP API
    #[arg(short, long, env = "PORT", global = true)]
    pub port: Option<u16>,

    /// Address for the HTTP API to bind
    #[arg(long, global = true)]
    pub bind: Option<String>,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Scan the library and serve the HTTP API (default)
    Serve,
    /// Scan the library once and print per-category counts
    Scan,
    /// Scan the library and list the tracks of one category
    List {
        /// Category name
        category: String,
    },
    /// Drop cache entries whose files no longer exist (via the running server if any)
    Prune,
    /// Remove one track from the cache so its tags are read again (via the running server if any)
    Evict {
        /// Track id, e.g. "personal/album/song.mp3"
        id: String,
    },
}

/// Run the specified CLI command, or the server if none was given.
pub fn run_command(cli: &Cli) -> anyhow::Result<()> {
    let settings = resolve_settings(cli)?;
    tracing::info!(
        root = %settings.root.display(),
        cache = %settings.cache_file.display(),
        "Music library settings"
    );

    let rt = Runtime::new()?;

    match &cli.command {
        None | Some(Commands::Serve) => cmd_serve(&rt, &settings),
        Some(Commands::Scan) => cmd_scan(&rt, &settings),
        Some(Commands::List { category }) => cmd_list(&rt, &settings, category),
        Some(Commands::Prune) => cmd_prune(&rt, &settings),
        Some(Commands::Evict { id }) => cmd_evict(&rt, &settings, id),
    }
}

// ============================================================================
// Shared helper functions
// ============================================================================

/// Merge flags, config file and defaults.
fn resolve_settings(cli: &Cli) -> anyhow::Result<Settings> {
    let config = match &cli.config {
        Some(path) => config::load_from(path),
        None => config::load(),
    };
    let overrides = Overrides {
        root: cli.root.clone(),
        cache_file: cli.cache.clone(),
        bind: cli.bind.clone(),
        port: cli.port,
    };
    let cwd = std::env::current_dir()?;
    Ok(Settings::resolve(&config, &overrides, &cwd))
}

/// Load the cache snapshot and build the library state holder.
pub(crate) fn open_library(settings: &Settings) -> Arc<Library> {
    let cache = TrackCache::load(&settings.cache_file);
    Arc::new(Library::new(
        &settings.root,
        cache,
        Arc::new(LoftyReader),
        settings.scan_concurrency,
    ))
}
