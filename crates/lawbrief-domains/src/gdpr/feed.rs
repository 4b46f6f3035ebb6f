use anyhow::{Context, Result};
use async_trait::async_trait;
use lawbrief_core::{regulatory::HeadlineSource, FeedEntry};
use tracing::info;

/// Latest headlines from the site's RSS/Atom feed.
pub struct GdprFeedSource {
    feed_url: String,
    http: reqwest::Client,
}

impl GdprFeedSource {
    pub fn new(feed_url: &str) -> Result<Self> {
        Ok(Self {
            feed_url: feed_url.to_string(),
            http: crate::http_client(30)?,
        })
    }
}

/// First `limit` entries of an RSS or Atom document, in feed order.
pub fn parse_feed(body: &[u8], limit: usize) -> Result<Vec<FeedEntry>> {
    let feed = feed_rs::parser::parse(body).context("parsing feed")?;
    Ok(feed
        .entries
        .into_iter()
        .take(limit)
        .map(|entry| FeedEntry {
            title: entry
                .title
                .map(|t| t.content.trim().to_string())
                .unwrap_or_default(),
            link: entry
                .links
                .into_iter()
                .next()
                .map(|l| l.href)
                .unwrap_or_default(),
        })
        .collect())
}

#[async_trait]
impl HeadlineSource for GdprFeedSource {
    async fn latest(&self, limit: usize) -> Result<Vec<FeedEntry>> {
        let body = self
            .http
            .get(&self.feed_url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        let entries = parse_feed(&body, limit)?;
        info!(url = %self.feed_url, entries = entries.len(), "feed fetched");
        Ok(entries)
    }
}
