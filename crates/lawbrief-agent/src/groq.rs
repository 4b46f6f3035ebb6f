use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use lawbrief_core::llm::CompletionBackend;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Calls a hosted model through Groq's OpenAI-compatible chat completions API.
///
/// Every prompt is sent as a single non-streaming user message; no history is
/// kept between calls.
pub struct GroqBackend {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout_secs: u64,
    client: reqwest::Client,
}

impl GroqBackend {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            timeout_secs: 120,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Request body for one single-turn completion.
pub fn chat_request(model: &str, prompt: &str) -> ChatRequest {
    ChatRequest {
        model: model.to_string(),
        messages: vec![ChatMessage {
            role: "user".into(),
            content: prompt.to_string(),
        }],
        stream: false,
    }
}

/// Text of the first choice. A missing or null `content` reads as empty.
pub fn parse_completion(body: &str) -> Result<String> {
    let parsed: ChatResponse =
        serde_json::from_str(body).context("failed to parse chat completion response")?;
    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("chat completion response has no choices"))?;
    Ok(choice.message.content.unwrap_or_default())
}

#[async_trait]
impl CompletionBackend for GroqBackend {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let request_body = chat_request(&self.model, prompt);

        info!(
            model = %self.model,
            prompt_len = prompt.len(),
            "calling groq chat API"
        );

        let response = match self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .timeout(std::time::Duration::from_secs(self.timeout_secs))
            .json(&request_body)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                warn!(timeout_secs = self.timeout_secs, "groq request timed out");
                bail!("Groq request timed out after {}s", self.timeout_secs);
            },
            Err(e) => {
                warn!("groq request failed: {}", e);
                bail!("Groq request failed: {e}");
            },
        };

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            warn!(status = %status, "groq returned non-200: {}", body);
            bail!("Groq error {status}: {body}");
        }

        let output = parse_completion(&body)?;

        info!(output_len = output.len(), "groq response received");
        Ok(output)
    }

    fn name(&self) -> &str {
        "groq"
    }
}
