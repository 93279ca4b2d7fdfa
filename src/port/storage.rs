//! Local key-value persistence for session history.

use async_trait::async_trait;

use crate::error::Result;

/// Minimal key-value store. Callers treat every error as recoverable: a
/// failed read degrades to empty state, a failed write is dropped with a
/// warning.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;
}
