//! Resource warm-up contract used by the preload scheduler.

use async_trait::async_trait;
use url::Url;

use crate::error::Result;

/// Fetches entry documents and issues prefetch hints for their assets.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    /// Fetch the application's entry document.
    async fn fetch_entry(&self, url: &Url) -> Result<String>;

    /// Warm one asset (stylesheet or script) referenced by the entry.
    async fn prefetch(&self, url: &Url) -> Result<()>;
}
