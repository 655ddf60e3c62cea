pub mod classify;
pub mod extract;
pub mod groq;
pub mod insights;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

pub use classify::LlmClassifier;
pub use groq::GroqClient;
pub use insights::{topic_histogram, Faq, InsightReport, InsightSummarizer, TopicCount};

/// A chat-completions endpoint running in JSON mode.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Sends one system + user exchange and returns the parsed JSON answer.
    ///
    /// Errors follow the classification taxonomy: `ClassificationUnavailable` on rate limits,
    /// `ClassificationError` on other failures, `MalformedResponse` when the answer is not JSON.
    async fn complete_json(&self, system: &str, user: &str) -> AppResult<serde_json::Value>;
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PromptUsage {
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ModelLength,
    Error,
    ToolCalls,
    #[serde(other)]
    Other,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatChoice {
    pub index: i32,
    pub message: ChatMessage,
    pub finish_reason: Option<FinishReason>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatApiResponse {
    pub choices: Vec<ChatChoice>,
    pub usage: Option<PromptUsage>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatApiError {
    pub message: String,
    #[serde(rename = "type")]
    pub error_type: Option<String>,
    pub code: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatApiErrorEnvelope {
    pub error: ChatApiError,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatApiResponseOrError {
    Response(ChatApiResponse),
    Error(ChatApiErrorEnvelope),
    BareError(ChatApiError),
}

/// Models in JSON mode still sometimes wrap the object in a markdown fence.
pub fn parse_json_content(content: &str) -> AppResult<serde_json::Value> {
    let trimmed = content.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed);

    serde_json::from_str(unfenced.trim()).map_err(|e| {
        AppError::MalformedResponse(format!("content is not JSON ({}): {}", e, content))
    })
}
