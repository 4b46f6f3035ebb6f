use anyhow::Result;
use chrono::Utc;
use tracing::info;

use crate::{
    chunk::split_into_chunks,
    detect::{detect_clauses, detect_obligations, detect_risks, risk_score},
    extract::extract_text,
    llm::CompletionBackend,
    session::{new_session_id, Session},
    summarize::summarize_document,
};

/// Full analysis of an uploaded PDF: extract, chunk, summarize, detect.
pub async fn analyze_document(
    backend: &dyn CompletionBackend,
    file_name: &str,
    bytes: &[u8],
    max_tokens: usize,
) -> Result<Session> {
    let doc = extract_text(bytes)?;
    let chunks = split_into_chunks(&doc.text, max_tokens);
    info!(
        file = %file_name,
        pages = doc.page_count(),
        chunks = chunks.len(),
        "analyzing document"
    );

    let summary = summarize_document(backend, &chunks).await?;

    let clauses = detect_clauses(&doc.text);
    let obligations = detect_obligations(&doc.text);
    let risks = detect_risks(&doc.text, &summary.text);
    let score = risk_score(&risks);

    info!(
        file = %file_name,
        clauses = clauses.len(),
        obligations = obligations.len(),
        risks = risks.len(),
        risk_score = score,
        "analysis complete"
    );

    Ok(Session {
        id: new_session_id(),
        file_name: file_name.to_string(),
        page_count: doc.page_count(),
        chunk_count: chunks.len(),
        text: doc.text,
        summary: summary.text,
        chunks_failed: summary.chunks_failed,
        clauses,
        obligations,
        risks,
        risk_score: score,
        updates: Vec::new(),
        created_at: Utc::now(),
    })
}
