//! Music Streamer - indexes a categorised music library and streams it
//! over HTTP.
//!
//! On start the metadata cache is loaded, every category is scanned
//! (reading tags only for files not already cached) and the JSON API is
//! served. Tracks are streamed with byte-range support so players can
//! seek. One-shot CLI commands cover scanning and cache maintenance.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod library;
pub mod metadata;
pub mod model;
pub mod scanner;
pub mod server;
pub mod stream;
#[cfg(test)]
pub mod test_utils;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("music_streamer=info"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();

    cli::run_command(&args)
}
