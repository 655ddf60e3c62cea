use reqwest::StatusCode;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    /// The comment source could not be reached or rejected the request.
    #[error("Comment source unavailable: {0}")]
    SourceUnavailable(String),

    /// The classification backend signalled a rate limit.
    #[error("Classification service rate limited: {0}")]
    ClassificationUnavailable(String),

    #[error("Classification failed: {0}")]
    ClassificationError(String),

    /// The classification backend answered, but the payload could not be used.
    #[error("Malformed classification response: {0}")]
    MalformedResponse(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Could not load configuration: {0}")]
    Config(#[from] config::ConfigError),
}

impl AppError {
    /// Map a transport error from the comment source. Every failure on this path is fatal.
    pub fn source(error: reqwest::Error) -> Self {
        tracing::error!("Comment source request failed: {:?}", error);
        match error.status() {
            Some(status) => AppError::SourceUnavailable(format!("HTTP {}: {}", status, error)),
            None => AppError::SourceUnavailable(error.to_string()),
        }
    }

    /// Map a transport error from the chat backend, keeping rate limits distinguishable.
    pub fn classification(error: reqwest::Error) -> Self {
        tracing::warn!("Chat backend request failed: {:?}", error);
        match error.status() {
            Some(StatusCode::TOO_MANY_REQUESTS) => {
                AppError::ClassificationUnavailable(error.to_string())
            }
            _ => AppError::ClassificationError(error.to_string()),
        }
    }

    /// Map a non-success HTTP answer from the chat backend.
    pub fn from_chat_status(status: StatusCode, body: &str) -> Self {
        if status == StatusCode::TOO_MANY_REQUESTS || is_rate_limit_message(body) {
            AppError::ClassificationUnavailable(format!("HTTP {}: {}", status.as_u16(), body))
        } else {
            AppError::ClassificationError(format!("HTTP {}: {}", status.as_u16(), body))
        }
    }

    /// Errors that end a run. Everything on the classification path degrades instead.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AppError::SourceUnavailable(_) | AppError::InvalidConfiguration(_) | AppError::Config(_)
        )
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, AppError::ClassificationUnavailable(_))
    }
}

/// Providers word this differently ("Requests rate limit exceeded", "rate_limit_exceeded", ...).
pub fn is_rate_limit_message(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("rate limit")
        || message.contains("rate_limit")
        || message.contains("too many requests")
}
