use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("the PDF is encrypted and cannot be read")]
    Encrypted,
    #[error("failed to parse PDF: {0}")]
    Parse(String),
    #[error("no extractable text found in the PDF")]
    NoText,
}

/// Text pulled out of an uploaded PDF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedDocument {
    /// Per-page text in page order.
    pub pages: Vec<String>,
    /// All pages concatenated, each followed by a newline.
    pub text: String,
}

impl ExtractedDocument {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Extract the text of every page of an in-memory PDF.
pub fn extract_text(bytes: &[u8]) -> Result<ExtractedDocument, ExtractError> {
    let doc = lopdf::Document::load_mem(bytes).map_err(|e| {
        if declares_encryption(bytes) {
            ExtractError::Encrypted
        } else {
            ExtractError::Parse(e.to_string())
        }
    })?;
    if doc.trailer.get(b"Encrypt").is_ok() {
        warn!("rejecting encrypted PDF");
        return Err(ExtractError::Encrypted);
    }

    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| ExtractError::Parse(e.to_string()))?;

    let mut text = String::new();
    for page in &pages {
        text.push_str(page);
        text.push('\n');
    }

    if text.trim().is_empty() {
        return Err(ExtractError::NoText);
    }

    debug!(pages = pages.len(), chars = text.len(), "extracted PDF text");
    Ok(ExtractedDocument { pages, text })
}

/// Raw check for an `/Encrypt` entry, used when the parser gives up on an
/// encrypted file before the trailer can be inspected.
fn declares_encryption(bytes: &[u8]) -> bool {
    bytes.windows(b"/Encrypt".len()).any(|w| w == b"/Encrypt")
}
