use anyhow::{bail, Result};
use tracing::info;

use crate::llm::CompletionBackend;

pub const NO_ANSWER: &str = "No answer available.";

pub fn question_prompt(document_text: &str, question: &str) -> String {
    format!(
        "The following is a legal document:\n\n{document_text}\n\n\
         Based on this document, answer the following question: {question}"
    )
}

/// Single-turn question answering over the full document text.
pub async fn answer_question(
    backend: &dyn CompletionBackend,
    document_text: &str,
    question: &str,
) -> Result<String> {
    let question = question.trim();
    if question.is_empty() {
        bail!("question is empty");
    }

    let reply = backend
        .complete(&question_prompt(document_text, question))
        .await?;
    let reply = reply.trim();
    info!(backend = backend.name(), answer_len = reply.len(), "question answered");

    if reply.is_empty() {
        Ok(NO_ANSWER.to_string())
    } else {
        Ok(reply.to_string())
    }
}
