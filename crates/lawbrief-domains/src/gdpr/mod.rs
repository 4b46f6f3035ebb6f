//! gdpr-info.eu: numbered recitals and the site news feed.

mod feed;
mod recitals;

pub use feed::{parse_feed, GdprFeedSource};
pub use recitals::{parse_recital_index, parse_recital_page, GdprRecitalsSource, RecitalLink};
