//! Command-line interface for music-streamer.
//!
//! Runs the HTTP server by default, and provides one-shot commands for
//! scanning, listing and maintaining the metadata cache.

mod commands;

pub use commands::{Cli, Commands, run_command};
