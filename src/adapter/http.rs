//! HTTP adapters: entry/asset fetching and the round-trip latency probe.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::error::{Error, PreloadError, Result};
use crate::port::fetcher::ResourceFetcher;
use crate::port::probe::LatencyProbe;

/// Fetches entry documents and warms assets over HTTP.
pub struct HttpResourceFetcher {
    client: Client,
}

impl HttpResourceFetcher {
    pub fn new(timeout_ms: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ResourceFetcher for HttpResourceFetcher {
    async fn fetch_entry(&self, url: &Url) -> Result<String> {
        debug!(%url, "fetching entry document");
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|err| {
                Error::from(PreloadError::FetchFailed {
                    url: url.to_string(),
                    reason: err.to_string(),
                })
            })?;
        Ok(response.text().await?)
    }

    async fn prefetch(&self, url: &Url) -> Result<()> {
        debug!(%url, "prefetching asset");
        // The body is drained and discarded; warming the HTTP cache is the
        // whole point.
        self.client
            .get(url.clone())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|err| {
                Error::from(PreloadError::FetchFailed {
                    url: url.to_string(),
                    reason: err.to_string(),
                })
            })?;
        Ok(())
    }
}

/// Measures round-trip time with a HEAD request against a small endpoint.
pub struct HttpLatencyProbe {
    client: Client,
    url: Url,
}

impl HttpLatencyProbe {
    pub fn new(url: &str, timeout_ms: u64) -> Result<Self> {
        let url = Url::parse(url)?;
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl LatencyProbe for HttpLatencyProbe {
    async fn probe(&self) -> Result<Duration> {
        let started = Instant::now();
        self.client
            .head(self.url.clone())
            .send()
            .await
            .map_err(|err| {
                Error::from(PreloadError::FetchFailed {
                    url: self.url.to_string(),
                    reason: err.to_string(),
                })
            })?;
        let rtt = started.elapsed();
        debug!(rtt_ms = rtt.as_millis() as u64, "probe round trip");
        Ok(rtt)
    }
}
