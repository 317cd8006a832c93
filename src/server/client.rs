//! Client for the cache maintenance routes.
//!
//! A `serve` process keeps the cache in memory and flushes it after every
//! rescan, so an edit made to the snapshot file by another process would
//! be overwritten. Maintenance commands therefore ask the running server
//! to do the work, and only touch the file themselves when no server
//! answers.

use reqwest::{Client, Url};
use serde::Deserialize;
use std::time::Duration;

use crate::error::{Error, Result};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Deserialize)]
struct EvictReply {
    evicted: bool,
}

#[derive(Debug, Deserialize)]
struct PruneReply {
    removed: Vec<String>,
}

/// Handle on a server's HTTP API.
#[derive(Debug, Clone)]
pub struct ServerClient {
    base: Url,
    http: Client,
}

impl ServerClient {
    /// Client for the server listening on `bind:port`. Wildcard bind
    /// addresses are reached over loopback.
    pub fn new(bind: &str, port: u16) -> Result<Self> {
        let host = match bind {
            "0.0.0.0" | "" => "127.0.0.1".to_string(),
            "::" | "[::]" => "[::1]".to_string(),
            h if h.contains(':') && !h.starts_with('[') => format!("[{h}]"),
            h => h.to_string(),
        };
        let base = Url::parse(&format!("http://{host}:{port}/"))
            .map_err(|e| Error::Protocol(format!("bad server address {host}:{port}: {e}")))?;
        let http = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;
        Ok(Self { base, http })
    }

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Protocol(format!("{} cannot carry a path", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Ask the server to evict `id`.
    ///
    /// `Ok(None)` means no server is listening; otherwise whether an entry
    /// was removed.
    pub async fn evict(&self, id: &str) -> Result<Option<bool>> {
        let mut segments = vec!["api", "evict"];
        segments.extend(id.split('/').filter(|s| !s.is_empty()));
        let url = self.url(&segments)?;

        Ok(self
            .post::<EvictReply>(url)
            .await?
            .map(|reply| reply.evicted))
    }

    /// Ask the server to prune deleted files from its cache.
    ///
    /// `Ok(None)` means no server is listening; otherwise the removed ids.
    pub async fn prune(&self) -> Result<Option<Vec<String>>> {
        let url = self.url(&["api", "prune"])?;
        Ok(self.post::<PruneReply>(url).await?.map(|reply| reply.removed))
    }

    async fn post<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<Option<T>> {
        let response = match self.http.post(url).send().await {
            Ok(response) => response,
            Err(e) if e.is_connect() => {
                tracing::debug!(base = %self.base, error = %e, "No server listening");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Protocol(format!("{status}: {body}")));
        }
        Ok(Some(response.json().await?))
    }
}
