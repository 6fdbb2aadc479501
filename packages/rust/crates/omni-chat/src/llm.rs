//! Reply generation: the `ReplyGenerator` seam and its OpenAI-compatible chat-completions client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::GenerationError;
use crate::session::Turn;

/// Hugging Face router, the default OpenAI-compatible endpoint.
pub const DEFAULT_INFERENCE_URL: &str = "https://router.huggingface.co/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "meta-llama/Llama-3.1-8B-Instruct";
pub const DEFAULT_MAX_TOKENS: u32 = 1024;
pub const DEFAULT_TEMPERATURE: f32 = 0.6;

/// Produces the assistant reply for a conversation.
///
/// `history` is oldest-first and may end with more than one user turn when an earlier
/// generation failed; implementations must accept that shape.
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn generate(&self, history: &[Turn], instructions: &str)
    -> Result<String, GenerationError>;
}

/// One message in OpenAI-compatible chat format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role: "system", "user", "assistant".
    pub role: String,
    pub content: String,
}

/// Instructions as the system message, followed by the history in order.
#[must_use]
pub fn build_chat_messages(history: &[Turn], instructions: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    if !instructions.trim().is_empty() {
        messages.push(ChatMessage {
            role: "system".to_string(),
            content: instructions.to_string(),
        });
    }
    messages.extend(history.iter().map(|turn| ChatMessage {
        role: turn.role.as_str().to_string(),
        content: turn.content.clone(),
    }));
    messages
}

/// Request body for chat completions (OpenAI format).
#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

/// Response: choices[0].message.
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

/// HTTP client for chat completions.
pub struct LlmClient {
    client: reqwest::Client,
    inference_url: String,
    model: String,
    api_key: Option<String>,
    max_tokens: u32,
    temperature: f32,
}

impl LlmClient {
    pub fn new(inference_url: String, model: String, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            inference_url,
            model,
            api_key,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    #[must_use]
    pub fn with_sampling(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn inference_url(&self) -> &str {
        &self.inference_url
    }
}

#[async_trait]
impl ReplyGenerator for LlmClient {
    async fn generate(
        &self,
        history: &[Turn],
        instructions: &str,
    ) -> Result<String, GenerationError> {
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: build_chat_messages(history, instructions),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };
        let mut req = self
            .client
            .post(&self.inference_url)
            .json(&body)
            .header("Content-Type", "application/json");
        if let Some(ref key) = self.api_key {
            req = req.header("Authorization", format!("Bearer {key}"));
        }
        let res = req.send().await?;
        let status = res.status();
        let text = res.text().await?;
        if !status.is_success() {
            return Err(GenerationError::Rejected {
                status: status.as_u16(),
                body: text,
            });
        }
        parse_reply(&text)
    }
}

fn parse_reply(body: &str) -> Result<String, GenerationError> {
    let parsed: ChatCompletionResponse = serde_json::from_str(body)
        .map_err(|e| GenerationError::Malformed(format!("{e}; body: {body}")))?;
    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| GenerationError::Malformed("response has no choices".to_string()))?;
    let reply = choice.message.content.unwrap_or_default();
    let reply = reply.trim();
    if reply.is_empty() {
        return Err(GenerationError::EmptyReply);
    }
    Ok(reply.to_string())
}
