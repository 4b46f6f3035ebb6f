use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

// ── Detection ────────────────────────────────────────────────────────────

/// Category name → distinct matched substrings. Categories with no match are absent.
pub type Detections = BTreeMap<String, BTreeSet<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    High,
    Medium,
    Low,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 3] = [RiskLevel::High, RiskLevel::Medium, RiskLevel::Low];

    /// Contribution of one finding of this tier to the overall score.
    pub fn weight(self) -> u32 {
        match self {
            RiskLevel::High => 3,
            RiskLevel::Medium => 2,
            RiskLevel::Low => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::High => "High",
            RiskLevel::Medium => "Medium",
            RiskLevel::Low => "Low",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A configured risk phrase found in a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskFinding {
    pub phrase: String,
    /// Canned explanation of why the phrase matters.
    pub explanation: String,
    /// Text window around the first occurrence in the document; empty when
    /// the phrase only appeared in the summary.
    pub context: String,
    pub level: RiskLevel,
}

impl RiskFinding {
    /// First sentence of the context window.
    pub fn short_context(&self) -> String {
        let trimmed = self.context.trim();
        if trimmed.is_empty() {
            return String::new();
        }
        let first = trimmed.split(". ").next().unwrap_or(trimmed);
        if first.ends_with('.') {
            first.to_string()
        } else {
            format!("{first}.")
        }
    }
}

// ── Regulatory updates ───────────────────────────────────────────────────

/// One numbered regulatory item (e.g. a GDPR recital).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegulatoryUpdate {
    pub number: String,
    pub title: String,
    pub content: String,
    pub release_date: String,
    pub link: String,
}

/// A headline from the regulatory site's news feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
}

/// Outcome of writing a batch of updates to an external store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreReport {
    pub stored: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}
