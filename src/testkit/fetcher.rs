//! Scripted resource fetcher for preload tests.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use url::Url;

use crate::error::{Error, PreloadError, Result};
use crate::port::fetcher::ResourceFetcher;

/// Fetcher that serves canned entry documents and records every prefetch.
///
/// Unscripted entries resolve to an empty document, so the happy path needs
/// no setup.
#[derive(Default)]
pub struct ScriptedFetcher {
    entries: Mutex<HashMap<String, String>>,
    entry_failures: Mutex<HashMap<String, String>>,
    prefetch_failures: Mutex<HashMap<String, String>>,
    fetch_delay: Mutex<Option<Duration>>,
    fetched: Mutex<Vec<String>>,
    prefetched: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `html` for the given entry URL.
    pub fn entry(self, url: &str, html: &str) -> Self {
        self.entries
            .lock()
            .insert(url.to_string(), html.to_string());
        self
    }

    pub fn fail_entry(self, url: &str, reason: &str) -> Self {
        self.entry_failures
            .lock()
            .insert(url.to_string(), reason.to_string());
        self
    }

    pub fn fail_prefetch(self, url: &str, reason: &str) -> Self {
        self.prefetch_failures
            .lock()
            .insert(url.to_string(), reason.to_string());
        self
    }

    /// Delay every entry fetch; pairs with paused-clock tests.
    pub fn fetch_delay(self, delay: Duration) -> Self {
        *self.fetch_delay.lock() = Some(delay);
        self
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().clone()
    }

    pub fn prefetched(&self) -> Vec<String> {
        self.prefetched.lock().clone()
    }
}

#[async_trait]
impl ResourceFetcher for ScriptedFetcher {
    async fn fetch_entry(&self, url: &Url) -> Result<String> {
        let key = url.to_string();
        self.fetched.lock().push(key.clone());
        let delay = *self.fetch_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(reason) = self.entry_failures.lock().get(&key) {
            return Err(Error::from(PreloadError::FetchFailed {
                url: key,
                reason: reason.clone(),
            }));
        }
        Ok(self
            .entries
            .lock()
            .get(&key)
            .cloned()
            .unwrap_or_else(|| "<html></html>".to_string()))
    }

    async fn prefetch(&self, url: &Url) -> Result<()> {
        let key = url.to_string();
        self.prefetched.lock().push(key.clone());
        if let Some(reason) = self.prefetch_failures.lock().get(&key) {
            return Err(Error::from(PreloadError::FetchFailed {
                url: key,
                reason: reason.clone(),
            }));
        }
        Ok(())
    }
}
