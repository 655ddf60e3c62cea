use std::sync::Arc;
use tokio::time::Duration;

use leaky_bucket::RateLimiter;

use crate::app_config::RateLimitConfig;

/// Paces calls to the chat backend. Shared by every classification and summary request,
/// so parallel batches cannot multiply the request rate.
#[derive(Clone)]
pub struct RateLimiters {
    prompt: Arc<RateLimiter>,
}

impl RateLimiters {
    pub fn new(max_requests: usize, refill_interval_ms: u64, refill_amount: usize) -> Self {
        let prompt = RateLimiter::builder()
            .initial(max_requests)
            .interval(Duration::from_millis(refill_interval_ms))
            .max(max_requests)
            .refill(refill_amount)
            .build();

        Self {
            prompt: Arc::new(prompt),
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self::new(
            config.max_requests,
            config.refill_interval_ms,
            config.refill_amount,
        )
    }

    /// Effectively unlimited, for tests and local backends.
    pub fn unlimited() -> Self {
        Self::new(10_000, 1, 10_000)
    }

    pub async fn acquire_one(&self) {
        self.prompt.acquire_one().await;
    }

    pub fn get_status(&self) -> String {
        format!("prompts: {}/{}", self.prompt.balance(), self.prompt.max())
    }
}
