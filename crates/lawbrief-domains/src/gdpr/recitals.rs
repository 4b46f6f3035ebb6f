use anyhow::{Context, Result};
use async_trait::async_trait;
use lawbrief_core::{regulatory::RegulatorySource, RegulatoryUpdate};
use reqwest::Url;
use scraper::Html;
use tracing::{info, warn};

use crate::selector;

pub const DATE_NOT_AVAILABLE: &str = "Date not available";

/// One entry of the recitals index, before its page is fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecitalLink {
    pub number: String,
    pub title: String,
    pub link: String,
}

/// Scrapes recitals from the gdpr-info.eu index page and each recital's page.
pub struct GdprRecitalsSource {
    index_url: String,
    http: reqwest::Client,
}

impl GdprRecitalsSource {
    pub fn new(index_url: &str) -> Result<Self> {
        Ok(Self {
            index_url: index_url.to_string(),
            http: crate::http_client(30)?,
        })
    }

    async fn get_html(&self, url: &str) -> Result<String> {
        Ok(self
            .http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?)
    }

    async fn fetch_one(&self, entry: &RecitalLink) -> Result<RegulatoryUpdate> {
        let html = self.get_html(&entry.link).await?;
        let (content, release_date) = parse_recital_page(&html)?;
        Ok(RegulatoryUpdate {
            number: entry.number.clone(),
            title: entry.title.clone(),
            content,
            release_date,
            link: entry.link.clone(),
        })
    }
}

/// Parse the recitals index. Blocks without a link are ignored; relative
/// links are resolved against `base_url`.
pub fn parse_recital_index(html: &str, base_url: &str) -> Result<Vec<RecitalLink>> {
    let doc = Html::parse_document(html);
    let article = selector("div.artikel")?;
    let anchor = selector("a[href]")?;
    let number_sel = selector("span.nummer")?;
    let title_sel = selector("span.titel")?;
    let base = Url::parse(base_url).ok();

    let mut links = Vec::new();
    for block in doc.select(&article) {
        let Some(href) = block
            .select(&anchor)
            .next()
            .and_then(|a| a.value().attr("href"))
        else {
            continue;
        };
        let link = match base.as_ref().and_then(|b| b.join(href).ok()) {
            Some(url) => url.to_string(),
            None => href.to_string(),
        };
        let number = block
            .select(&number_sel)
            .next()
            .map(|n| {
                n.text()
                    .collect::<String>()
                    .trim()
                    .trim_matches(|c| c == '(' || c == ')')
                    .to_string()
            })
            .unwrap_or_default();
        let title = block
            .select(&title_sel)
            .next()
            .map(|t| t.text().collect::<String>().trim().to_string())
            .unwrap_or_default();
        links.push(RecitalLink {
            number,
            title,
            link,
        });
    }
    Ok(links)
}

/// Content text and release date of a single recital page.
pub fn parse_recital_page(html: &str) -> Result<(String, String)> {
    let doc = Html::parse_document(html);
    let entry = selector("div.entry-content")?;
    let time = selector("time")?;

    let content = doc
        .select(&entry)
        .next()
        .map(|div| {
            div.text()
                .map(str::trim)
                .filter(|piece| !piece.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .context("recital page has no entry content")?;

    let release_date = doc
        .select(&time)
        .next()
        .and_then(|t| t.value().attr("datetime"))
        .map(str::to_string)
        .unwrap_or_else(|| DATE_NOT_AVAILABLE.to_string());

    Ok((content, release_date))
}

#[async_trait]
impl RegulatorySource for GdprRecitalsSource {
    async fn fetch_recent(&self, limit: usize) -> Result<Vec<RegulatoryUpdate>> {
        let html = self
            .get_html(&self.index_url)
            .await
            .with_context(|| format!("fetching recitals index {}", self.index_url))?;
        let index = parse_recital_index(&html, &self.index_url)?;

        let mut updates = Vec::new();
        for entry in index.iter().take(limit) {
            match self.fetch_one(entry).await {
                Ok(update) => updates.push(update),
                Err(e) => warn!(
                    number = %entry.number,
                    link = %entry.link,
                    "failed to fetch recital: {e:#}"
                ),
            }
        }

        info!(
            listed = index.len(),
            fetched = updates.len(),
            limit,
            "gdpr recitals fetched"
        );
        Ok(updates)
    }
}
