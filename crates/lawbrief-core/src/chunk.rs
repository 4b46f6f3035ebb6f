/// Default per-chunk budget, in estimated tokens.
pub const DEFAULT_MAX_TOKENS: usize = 2000;

/// Naive token estimate: the number of whitespace-separated words.
pub fn estimate_tokens(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Split text into space-joined chunks of whole words whose estimated token
/// count stays within `max_tokens`. A single word that alone exceeds the
/// budget still gets its own chunk.
pub fn split_into_chunks(text: &str, max_tokens: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut current_tokens = 0usize;

    for word in text.split_whitespace() {
        let estimate = estimate_tokens(word);
        if current_tokens + estimate > max_tokens && !current.is_empty() {
            chunks.push(current.join(" "));
            current.clear();
            current_tokens = 0;
        }
        current.push(word);
        current_tokens += estimate;
    }

    if !current.is_empty() {
        chunks.push(current.join(" "));
    }

    chunks
}
