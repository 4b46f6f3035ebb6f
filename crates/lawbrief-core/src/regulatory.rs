use anyhow::Result;
use async_trait::async_trait;

use crate::types::{FeedEntry, RegulatoryUpdate, StoreReport};

/// Fetches the most recent regulatory items from one upstream site.
/// Markup-specific parsing stays behind this trait.
#[async_trait]
pub trait RegulatorySource: Send + Sync {
    async fn fetch_recent(&self, limit: usize) -> Result<Vec<RegulatoryUpdate>>;
}

/// Fetches the latest headlines from a regulatory news feed.
#[async_trait]
pub trait HeadlineSource: Send + Sync {
    async fn latest(&self, limit: usize) -> Result<Vec<FeedEntry>>;
}

/// Persists fetched updates somewhere outside the process.
#[async_trait]
pub trait UpdateSink: Send + Sync {
    async fn store(&self, updates: &[RegulatoryUpdate]) -> Result<StoreReport>;
}
