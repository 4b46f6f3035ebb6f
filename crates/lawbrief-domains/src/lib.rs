pub mod gdpr;
pub mod sheets;

pub use gdpr::{GdprFeedSource, GdprRecitalsSource};
pub use sheets::GoogleSheetsSink;

use anyhow::{anyhow, Result};
use scraper::Selector;

// ── Shared helpers ───────────────────────────────────────────────────────

pub(crate) fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("invalid selector {css:?}: {e}"))
}

pub(crate) fn http_client(timeout_secs: u64) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .user_agent(concat!("lawbrief/", env!("CARGO_PKG_VERSION")))
        .build()?)
}
