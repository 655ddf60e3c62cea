//! Resilient Batch Runner
//!
//! Drives one batch through the classifier. Rate limits are retried with exponential
//! backoff; every other failure, and exhausted retries, degrade the batch to `Misc`.
//! A batch always resolves to exactly one classified comment per input comment.

use rand::Rng;
use tokio::time::{sleep, Duration};

use crate::{
    comment::{ClassifiedComment, TOPIC_NOT_APPLICABLE},
    error::AppError,
};

use super::{
    types::{
        classified, default_classification, Batch, BatchOutcome, BatchReport, ClassificationMap,
        FallbackReason,
    },
    Classifier,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total classify calls per batch, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_secs(1),
            max_jitter: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// `base_delay * 2^attempt + jitter * max_jitter` for a 0-indexed `attempt`,
    /// with `jitter` in [0, 1).
    pub fn backoff(&self, attempt: u32, jitter: f64) -> Duration {
        let factor = 2_u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor) + self.max_jitter.mul_f64(jitter.clamp(0.0, 1.0))
    }
}

/// Per-batch retry state. Counts are attempts made so far.
#[derive(Debug)]
enum AttemptState {
    Attempting(u32),
    RateLimited(u32),
    Success(ClassificationMap, u32),
    Fallback(FallbackReason, u32),
}

pub struct BatchRunner<C> {
    classifier: C,
    policy: RetryPolicy,
}

impl<C: Classifier> BatchRunner<C> {
    pub fn new(classifier: C, policy: RetryPolicy) -> Self {
        Self { classifier, policy }
    }

    pub async fn run(&self, batch: Batch) -> BatchReport {
        let mut state = AttemptState::Attempting(0);

        loop {
            state = match state {
                AttemptState::Attempting(made) => self.attempt(&batch, made).await,
                AttemptState::RateLimited(made) if made >= self.policy.max_attempts => {
                    tracing::warn!(
                        "Batch of {} still rate limited after {} attempts, falling back",
                        batch.len(),
                        made
                    );
                    AttemptState::Fallback(FallbackReason::RateLimited, made)
                }
                AttemptState::RateLimited(made) => {
                    let jitter: f64 = rand::thread_rng().gen_range(0.0..1.0);
                    let delay = self.policy.backoff(made - 1, jitter);
                    tracing::info!(
                        "Rate limited, retrying batch after {:?} (attempt {}/{})",
                        delay,
                        made + 1,
                        self.policy.max_attempts
                    );
                    sleep(delay).await;
                    AttemptState::Attempting(made)
                }
                AttemptState::Success(results, attempts) => {
                    let (comments, missing) = assemble(batch, results);
                    let outcome = if missing == 0 {
                        BatchOutcome::Classified
                    } else {
                        tracing::warn!("{} comments had no classification, using Misc", missing);
                        BatchOutcome::Partial { missing }
                    };
                    return BatchReport {
                        comments,
                        outcome,
                        attempts,
                    };
                }
                AttemptState::Fallback(reason, attempts) => {
                    tracing::warn!(
                        "Batch of {} degraded to Misc: {}",
                        batch.len(),
                        reason
                    );
                    let (comments, _) = assemble(batch, ClassificationMap::new());
                    return BatchReport {
                        comments,
                        outcome: BatchOutcome::Fallback { reason },
                        attempts,
                    };
                }
            };
        }
    }

    async fn attempt(&self, batch: &Batch, made: u32) -> AttemptState {
        let made = made + 1;
        match self.classifier.classify(batch).await {
            Ok(results) => AttemptState::Success(results, made),
            Err(e) if e.is_rate_limited() => {
                tracing::debug!("Classification attempt {} rate limited: {}", made, e);
                AttemptState::RateLimited(made)
            }
            Err(AppError::MalformedResponse(msg)) => {
                tracing::warn!("Malformed classification response: {}", msg);
                AttemptState::Fallback(FallbackReason::MalformedResponse, made)
            }
            Err(e) => {
                tracing::warn!("Classification failed: {}", e);
                AttemptState::Fallback(FallbackReason::ClassificationError, made)
            }
        }
    }
}

/// Joins results onto the batch. Indices without a result get the default classification,
/// results for indices outside the batch are dropped. Returns the number of defaults used.
fn assemble(batch: Batch, mut results: ClassificationMap) -> (Vec<ClassifiedComment>, usize) {
    let mut missing = 0;
    let comments = batch
        .into_entries()
        .into_iter()
        .map(|entry| {
            let result = match results.remove(&entry.local_index) {
                Some(mut result) => {
                    if result.topic.is_none() {
                        result.topic = Some(TOPIC_NOT_APPLICABLE.to_string());
                    }
                    result
                }
                None => {
                    missing += 1;
                    default_classification(entry.local_index)
                }
            };
            classified(entry.comment, result)
        })
        .collect();

    if !results.is_empty() {
        tracing::warn!(
            "Discarded {} results with unknown indices: {:?}",
            results.len(),
            results.keys().collect::<Vec<_>>()
        );
    }

    (comments, missing)
}
