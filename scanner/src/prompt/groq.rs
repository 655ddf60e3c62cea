use async_trait::async_trait;
use serde_json::json;

use crate::{
    app_config::ModelConfig,
    error::{is_rate_limit_message, AppError, AppResult},
    rate_limiters::RateLimiters,
    HttpClient,
};

use super::{parse_json_content, ChatApiResponseOrError, ChatBackend};

/// OpenAI-compatible chat completions client (Groq by default).
#[derive(Clone)]
pub struct GroqClient {
    http_client: HttpClient,
    rate_limiters: RateLimiters,
    api_base: String,
    api_key: String,
    model: String,
    temperature: f64,
    max_tokens: u32,
}

impl GroqClient {
    pub fn new(
        http_client: HttpClient,
        rate_limiters: RateLimiters,
        config: &ModelConfig,
        api_key: &str,
    ) -> Self {
        Self {
            http_client,
            rate_limiters,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: config.id.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

#[async_trait]
impl ChatBackend for GroqClient {
    async fn complete_json(&self, system: &str, user: &str) -> AppResult<serde_json::Value> {
        self.rate_limiters.acquire_one().await;

        let resp = self
            .http_client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&json!(
              {
                "model": &self.model,
                "temperature": self.temperature,
                "max_tokens": self.max_tokens,
                "messages": [
                  {
                    "role": "system",
                    "content": system
                  },
                  {
                    "role": "user",
                    "content": user
                  }
                ],
                "response_format": { "type": "json_object" }
              }
            ))
            .send()
            .await
            .map_err(AppError::classification)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::from_chat_status(status, &body));
        }

        let body = resp
            .json::<serde_json::Value>()
            .await
            .map_err(|e| AppError::MalformedResponse(format!("response body is not JSON: {}", e)))?;

        let parsed = serde_json::from_value::<ChatApiResponseOrError>(body.clone())
            .map_err(|e| {
                AppError::MalformedResponse(format!("Could not parse chat response ({}): {}", e, body))
            })?;

        let parsed = match parsed {
            ChatApiResponseOrError::Response(parsed) => parsed,
            ChatApiResponseOrError::Error(envelope) => return Err(api_error(envelope.error.message)),
            ChatApiResponseOrError::BareError(error) => return Err(api_error(error.message)),
        };

        if let Some(usage) = &parsed.usage {
            tracing::debug!(
                "Chat completion used {} tokens ({} prompt, {} completion)",
                usage.total_tokens,
                usage.prompt_tokens,
                usage.completion_tokens
            );
        }

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| AppError::MalformedResponse("No choices in response".to_string()))?;

        parse_json_content(&content)
    }
}

fn api_error(message: String) -> AppError {
    if is_rate_limit_message(&message) {
        AppError::ClassificationUnavailable(message)
    } else {
        AppError::ClassificationError(format!("Chat API error: {}", message))
    }
}
