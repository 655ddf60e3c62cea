//! Scanner Pipeline
//!
//! Pulls comments from a paged source, classifies them in batches and accumulates
//! the results.
//!
//! ## Architecture
//!
//! - **Source**: [`CommentSource`] returns one page of raw comments plus a cursor
//! - **Normalizer**: [`crate::comment::normalize`] cleans each raw comment
//! - **Batcher**: [`batcher::batch`] groups normalized comments for one request each
//! - **Runner**: [`runner::BatchRunner`] classifies a batch with retry and fallback
//! - **Controller**: [`controller::PipelineController`] drives the loop and publishes progress
//!
//! Classification of page N completes before page N+1 is fetched. Batches within a page
//! may run concurrently (`max_concurrent_batches`), results are still appended in order.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let runner = BatchRunner::new(classifier, RetryPolicy::default());
//! let controller = PipelineController::new(source, runner, settings);
//! let mut progress = controller.subscribe();
//! let outcome = controller.run().await?;
//! ```

use async_trait::async_trait;

use crate::{
    comment::RawComment,
    error::{AppError, AppResult},
};

pub mod batcher;
pub mod controller;
pub mod progress;
pub mod runner;
pub mod types;

pub use batcher::batch;
pub use controller::{PipelineController, PipelineOutcome};
pub use progress::{PipelinePhase, PipelineProgress, ProgressHandle};
pub use runner::{BatchRunner, RetryPolicy};
pub use types::{
    default_classification, Batch, BatchEntry, BatchOutcome, ClassificationMap,
    ClassificationResult,
};

/// One page from a [`CommentSource`]. No cursor means the source is exhausted.
#[derive(Debug, Clone, Default)]
pub struct SourcePage {
    pub items: Vec<RawComment>,
    pub next_cursor: Option<String>,
}

#[async_trait]
pub trait CommentSource: Send + Sync {
    /// Fetch one page. Failures are `SourceUnavailable` and are not retried.
    async fn next_page(&self, cursor: Option<&str>, page_size: usize) -> AppResult<SourcePage>;
}

#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify every comment of `batch` in a single remote call.
    ///
    /// Errors: `ClassificationUnavailable` for rate limits, `ClassificationError` for other
    /// remote failures, `MalformedResponse` when no result list can be found.
    async fn classify(&self, batch: &Batch) -> AppResult<ClassificationMap>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Stop fetching once this many comments have been read.
    pub target_limit: usize,
    /// Comments requested per page from the source.
    pub page_size: usize,
    /// Comments per classification request, independent of `page_size`.
    pub batch_size: usize,
    pub max_concurrent_batches: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            target_limit: 200,
            page_size: 50,
            batch_size: 25,
            max_concurrent_batches: 1,
        }
    }
}

impl PipelineSettings {
    pub fn validate(&self) -> AppResult<()> {
        let fields = [
            ("target limit", self.target_limit),
            ("page size", self.page_size),
            ("batch size", self.batch_size),
            ("max concurrent batches", self.max_concurrent_batches),
        ];
        match fields.iter().find(|(_, value)| *value == 0) {
            Some((name, _)) => Err(AppError::InvalidConfiguration(format!(
                "{} must be positive",
                name
            ))),
            None => Ok(()),
        }
    }
}
