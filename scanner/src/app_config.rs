use config::{Config, Environment, File};
use serde::Deserialize;
use std::{
    env,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{
    error::{AppError, AppResult},
    pipeline::{runner::RetryPolicy, PipelineSettings},
};

pub const DEFAULT_YOUTUBE_API_BASE: &str = "https://www.googleapis.com/youtube/v3";
pub const DEFAULT_MODEL_API_BASE: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_MODEL_ID: &str = "llama-3.3-70b-versatile";

/// The backoff schedule grows as 2^attempt, anything above this is a misconfiguration.
const MAX_RETRY_ATTEMPTS: u32 = 10;

#[derive(Debug, Clone, Deserialize)]
pub struct YoutubeConfig {
    pub api_base: String,
    pub page_size: usize,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    pub api_base: String,
    pub id: String,
    pub temperature: f64,
    pub max_tokens: u32,
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    pub max_comments: usize,
    pub batch_size: usize,
    pub max_concurrent_batches: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_jitter_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    pub max_requests: usize,
    pub refill_interval_ms: u64,
    pub refill_amount: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InsightsConfig {
    pub enabled: bool,
    pub max_doubts: usize,
    pub max_faqs: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub youtube: YoutubeConfig,
    pub model: ModelConfig,
    pub pipeline: PipelineConfig,
    pub retry: RetryConfig,
    pub rate_limits: RateLimitConfig,
    pub insights: InsightsConfig,
}

/// `APP_DIR/config.toml` when set, otherwise the `config/` directory next to the crate.
pub fn default_config_path() -> PathBuf {
    if let Ok(dir) = env::var("APP_DIR") {
        return Path::new(&dir).join("config.toml");
    }
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .map(|root| root.join("config").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("config/config.toml"))
}

impl AppConfig {
    /// Layers built-in defaults, the TOML file (optional) and `SCANNER__*` env vars.
    /// API keys fall back to `YOUTUBE_API_KEY` / `GROQ_API_KEY`.
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(default_config_path);
        tracing::debug!("Loading config from {}", path.display());

        let mut cfg: AppConfig = Config::builder()
            .set_default("youtube.api_base", DEFAULT_YOUTUBE_API_BASE)?
            .set_default("youtube.page_size", 50_i64)?
            .set_default("model.api_base", DEFAULT_MODEL_API_BASE)?
            .set_default("model.id", DEFAULT_MODEL_ID)?
            .set_default("model.temperature", 0.0_f64)?
            .set_default("model.max_tokens", 4096_i64)?
            .set_default("pipeline.max_comments", 200_i64)?
            .set_default("pipeline.batch_size", 25_i64)?
            .set_default("pipeline.max_concurrent_batches", 1_i64)?
            .set_default("retry.max_attempts", 4_i64)?
            .set_default("retry.base_delay_ms", 1000_i64)?
            .set_default("retry.max_jitter_ms", 1000_i64)?
            .set_default("rate_limits.max_requests", 30_i64)?
            .set_default("rate_limits.refill_interval_ms", 2000_i64)?
            .set_default("rate_limits.refill_amount", 1_i64)?
            .set_default("insights.enabled", true)?
            .set_default("insights.max_doubts", 30_i64)?
            .set_default("insights.max_faqs", 3_i64)?
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix("SCANNER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        if cfg.youtube.api_key.is_none() {
            cfg.youtube.api_key = env::var("YOUTUBE_API_KEY").ok();
        }
        if cfg.model.api_key.is_none() {
            cfg.model.api_key = env::var("GROQ_API_KEY").ok();
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> AppResult<()> {
        let invalid = |msg: &str| Err(AppError::InvalidConfiguration(msg.to_string()));

        if self.youtube.page_size == 0 {
            return invalid("youtube.page_size must be positive");
        }
        if self.pipeline.max_comments == 0 {
            return invalid("pipeline.max_comments must be positive");
        }
        if self.pipeline.batch_size == 0 {
            return invalid("pipeline.batch_size must be positive");
        }
        if self.pipeline.max_concurrent_batches == 0 {
            return invalid("pipeline.max_concurrent_batches must be positive");
        }
        if self.retry.max_attempts == 0 || self.retry.max_attempts > MAX_RETRY_ATTEMPTS {
            return Err(AppError::InvalidConfiguration(format!(
                "retry.max_attempts must be between 1 and {}",
                MAX_RETRY_ATTEMPTS
            )));
        }
        if self.rate_limits.max_requests == 0 || self.rate_limits.refill_amount == 0 {
            return invalid("rate_limits.max_requests and rate_limits.refill_amount must be positive");
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
            max_jitter: Duration::from_millis(self.retry.max_jitter_ms),
        }
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            target_limit: self.pipeline.max_comments,
            page_size: self.youtube.page_size,
            batch_size: self.pipeline.batch_size,
            max_concurrent_batches: self.pipeline.max_concurrent_batches,
        }
    }
}

impl std::fmt::Display for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Scanner Config:\nYouTube: {} (page size {}, key set: {})\nModel: {} @ {} (temperature {}, key set: {})\nPipeline: {:?}\nRetry: {:?}\nRate limits: {:?}\nInsights: {:?}",
            self.youtube.api_base,
            self.youtube.page_size,
            self.youtube.api_key.is_some(),
            self.model.id,
            self.model.api_base,
            self.model.temperature,
            self.model.api_key.is_some(),
            self.pipeline,
            self.retry,
            self.rate_limits,
            self.insights,
        )
    }
}
