//! HTTP server command.

use tokio::runtime::Runtime;
use tracing::{error, info};

use super::open_library;
use crate::config::Settings;
use crate::server;

/// Build the index, then serve the API until Ctrl-C.
///
/// A failed initial scan is logged and the server still starts with an
/// empty index, so the library can be fixed and rescanned over HTTP.
pub fn cmd_serve(rt: &Runtime, settings: &Settings) -> anyhow::Result<()> {
    rt.block_on(async {
        let library = open_library(settings);
        info!(cached = library.cached_tracks(), "Building library index");

        if let Err(e) = library.rebuild().await {
            error!(error = %e, "Initial scan failed, serving empty index");
        }

        server::serve(library, &settings.bind, settings.port).await?;
        Ok(())
    })
}
