use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::llm::CompletionBackend;

pub const NO_SUMMARY: &str = "No summary available.";

pub fn summary_prompt(text: &str) -> String {
    format!("Please summarize the following content:\n\n{text}")
}

/// Final summary plus bookkeeping on how many chunks contributed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub text: String,
    pub chunks_total: usize,
    pub chunks_failed: usize,
}

/// Summarize one chunk. An empty completion becomes a fixed placeholder.
pub async fn summarize_chunk(backend: &dyn CompletionBackend, chunk: &str) -> Result<String> {
    let reply = backend.complete(&summary_prompt(chunk)).await?;
    let reply = reply.trim();
    if reply.is_empty() {
        Ok(NO_SUMMARY.to_string())
    } else {
        Ok(reply.to_string())
    }
}

/// Summarize chunks in order and join the results with a space.
///
/// A chunk whose request fails is logged and skipped; the call only errors
/// when no chunk produced a summary.
pub async fn summarize_document(
    backend: &dyn CompletionBackend,
    chunks: &[String],
) -> Result<DocumentSummary> {
    if chunks.is_empty() {
        bail!("document has no text to summarize");
    }

    let mut parts = Vec::with_capacity(chunks.len());
    let mut failed = 0usize;
    let mut last_error = None;
    for (i, chunk) in chunks.iter().enumerate() {
        match summarize_chunk(backend, chunk).await {
            Ok(summary) => parts.push(summary),
            Err(e) => {
                warn!(
                    backend = backend.name(),
                    chunk = i,
                    total = chunks.len(),
                    "chunk summary failed, skipping: {e:#}"
                );
                failed += 1;
                last_error = Some(e);
            },
        }
    }

    if parts.is_empty() {
        let reason = last_error
            .map(|e| format!("{e:#}"))
            .unwrap_or_else(|| "no output".into());
        bail!("summarization failed for all {} chunk(s): {reason}", chunks.len());
    }

    info!(
        backend = backend.name(),
        chunks = chunks.len(),
        failed,
        "document summarized"
    );

    Ok(DocumentSummary {
        text: parts.join(" "),
        chunks_total: chunks.len(),
        chunks_failed: failed,
    })
}

/// Single request over the whole text, for the quick-summary flow.
pub async fn quick_summary(backend: &dyn CompletionBackend, text: &str) -> Result<String> {
    if text.trim().is_empty() {
        bail!("document has no text to summarize");
    }
    summarize_chunk(backend, text).await
}
