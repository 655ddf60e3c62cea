//! Run progress, owned by the controller and published to observers as snapshots.

use derive_more::derive::Display;
use serde::Serialize;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
pub enum PipelinePhase {
    Idle,
    Fetching,
    Classifying,
    Done,
    Failed,
}

impl PipelinePhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelinePhase::Done | PipelinePhase::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineProgress {
    pub fetched_count: usize,
    pub processed_count: usize,
    pub target_limit: usize,
    pub phase: PipelinePhase,
}

impl PipelineProgress {
    pub fn new(target_limit: usize) -> Self {
        Self {
            fetched_count: 0,
            processed_count: 0,
            target_limit,
            phase: PipelinePhase::Idle,
        }
    }

    /// Fraction of the target already classified, capped at 1.0.
    pub fn ratio(&self) -> f64 {
        if self.target_limit == 0 {
            return 0.0;
        }
        (self.processed_count as f64 / self.target_limit as f64).min(1.0)
    }
}

impl std::fmt::Display for PipelineProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] fetched {}/{} classified {}",
            self.phase, self.fetched_count, self.target_limit, self.processed_count
        )
    }
}

/// Write side. Only the controller holds one.
pub struct ProgressPublisher {
    tx: watch::Sender<PipelineProgress>,
}

impl ProgressPublisher {
    pub fn new(target_limit: usize) -> Self {
        let (tx, _) = watch::channel(PipelineProgress::new(target_limit));
        Self { tx }
    }

    pub fn subscribe(&self) -> ProgressHandle {
        ProgressHandle {
            rx: self.tx.subscribe(),
        }
    }

    pub fn snapshot(&self) -> PipelineProgress {
        self.tx.borrow().clone()
    }

    /// Terminal phases stick; later transitions are ignored.
    pub fn set_phase(&self, phase: PipelinePhase) {
        self.tx.send_if_modified(|progress| {
            if progress.phase.is_terminal() || progress.phase == phase {
                return false;
            }
            tracing::debug!("Pipeline phase {} -> {}", progress.phase, phase);
            progress.phase = phase;
            true
        });
    }

    pub fn record_fetched(&self, count: usize) {
        self.tx.send_modify(|progress| progress.fetched_count += count);
    }

    pub fn record_processed(&self, count: usize) {
        self.tx.send_modify(|progress| progress.processed_count += count);
    }
}

/// Read side handed to callers; yields snapshots, never mutable access.
#[derive(Clone)]
pub struct ProgressHandle {
    rx: watch::Receiver<PipelineProgress>,
}

impl ProgressHandle {
    pub fn snapshot(&self) -> PipelineProgress {
        self.rx.borrow().clone()
    }

    /// Waits for the next update. `None` once the run has been dropped.
    pub async fn changed(&mut self) -> Option<PipelineProgress> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}
