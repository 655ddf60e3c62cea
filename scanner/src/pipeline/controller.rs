//! Pipeline Controller
//!
//! Fetch → normalize → batch → classify, one page at a time, until the target limit is
//! reached or the source runs dry. A source failure ends the run as `Failed` but keeps
//! everything classified so far.

use futures::{stream, StreamExt};

use crate::{
    comment::{normalize, ClassifiedComment},
    error::{AppError, AppResult},
};

use super::{
    batcher::batch,
    progress::{PipelinePhase, PipelineProgress, ProgressHandle, ProgressPublisher},
    runner::BatchRunner,
    types::{Batch, BatchOutcome},
    Classifier, CommentSource, PipelineSettings, SourcePage,
};

/// Result of one run. `failure` is set when the source gave out mid-run.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub comments: Vec<ClassifiedComment>,
    pub progress: PipelineProgress,
    pub failure: Option<AppError>,
}

impl PipelineOutcome {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}

pub struct PipelineController<S, C> {
    source: S,
    runner: BatchRunner<C>,
    settings: PipelineSettings,
    progress: ProgressPublisher,
}

impl<S: CommentSource, C: Classifier> PipelineController<S, C> {
    pub fn new(source: S, runner: BatchRunner<C>, settings: PipelineSettings) -> Self {
        let progress = ProgressPublisher::new(settings.target_limit);
        Self {
            source,
            runner,
            settings,
            progress,
        }
    }

    /// Progress observers. Subscribe before calling [`Self::run`].
    pub fn subscribe(&self) -> ProgressHandle {
        self.progress.subscribe()
    }

    /// Runs to completion. Only invalid settings are returned as `Err`, and before any I/O.
    pub async fn run(self) -> AppResult<PipelineOutcome> {
        self.settings.validate()?;

        let limit = self.settings.target_limit;
        let mut comments: Vec<ClassifiedComment> = Vec::new();
        let mut cursor: Option<String> = None;

        tracing::info!(
            "Starting scan: limit {}, page size {}, batch size {}",
            limit,
            self.settings.page_size,
            self.settings.batch_size
        );

        loop {
            let fetched = self.progress.snapshot().fetched_count;
            if fetched >= limit {
                tracing::debug!("Reached target of {} comments", limit);
                break;
            }

            self.progress.set_phase(PipelinePhase::Fetching);
            let requested = self.settings.page_size.min(limit - fetched);
            let SourcePage {
                mut items,
                next_cursor,
            } = match self.source.next_page(cursor.as_deref(), requested).await {
                Ok(page) => page,
                Err(e) => {
                    tracing::error!(
                        "Fetching comments failed after {} comments: {}",
                        fetched,
                        e
                    );
                    self.progress.set_phase(PipelinePhase::Failed);
                    return Ok(PipelineOutcome {
                        comments,
                        progress: self.progress.snapshot(),
                        failure: Some(e),
                    });
                }
            };

            if items.len() > requested {
                tracing::debug!(
                    "Source returned {} comments for a page of {}, dropping the rest",
                    items.len(),
                    requested
                );
                items.truncate(requested);
            }
            if items.is_empty() {
                tracing::debug!("Source returned an empty page, stopping");
                break;
            }

            self.progress.record_fetched(items.len());
            tracing::debug!("{}", self.progress.snapshot());

            self.progress.set_phase(PipelinePhase::Classifying);
            let normalized = items.into_iter().map(normalize).collect();
            let batches = batch(normalized, self.settings.batch_size)?;
            self.classify_page(batches, &mut comments).await;

            match next_cursor {
                Some(next) => cursor = Some(next),
                None => {
                    tracing::debug!("Source exhausted");
                    break;
                }
            }
        }

        self.progress.set_phase(PipelinePhase::Done);
        let progress = self.progress.snapshot();
        tracing::info!(
            "Scan complete: {} fetched, {} classified",
            progress.fetched_count,
            progress.processed_count
        );

        Ok(PipelineOutcome {
            comments,
            progress,
            failure: None,
        })
    }

    /// Runs the page's batches (at most `max_concurrent_batches` in flight) and appends
    /// their comments in batch order.
    async fn classify_page(&self, batches: Vec<Batch>, comments: &mut Vec<ClassifiedComment>) {
        let mut reports = stream::iter(batches)
            .map(|batch| self.runner.run(batch))
            .buffered(self.settings.max_concurrent_batches);

        while let Some(report) = reports.next().await {
            if let BatchOutcome::Fallback { reason } = &report.outcome {
                tracing::debug!(
                    "Batch fell back after {} attempts: {}",
                    report.attempts,
                    reason
                );
            }
            self.progress.record_processed(report.comments.len());
            comments.extend(report.comments);
        }
    }
}
