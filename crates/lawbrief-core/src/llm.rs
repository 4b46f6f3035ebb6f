use anyhow::Result;
use async_trait::async_trait;

/// A hosted language model that turns one prompt into one completion.
/// One blocking request per call; implementations do not retry.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Short identifier used in logs.
    fn name(&self) -> &str;
}
