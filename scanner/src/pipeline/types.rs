//! Scanner Pipeline Types
//!
//! Core data structures passed between the batcher, the runner and the classifier.

use std::collections::HashMap;

use derive_more::derive::Display;

use crate::comment::{Category, ClassifiedComment, NormalizedComment};

/// A comment paired with its position inside one batch.
#[derive(Debug, Clone)]
pub struct BatchEntry {
    pub local_index: usize,
    pub comment: NormalizedComment,
}

/// Comments sent to the classifier in a single request.
///
/// Local indices are dense and zero-based, so they are only unique within one batch.
#[derive(Debug, Clone)]
pub struct Batch {
    entries: Vec<BatchEntry>,
}

impl Batch {
    pub fn new(comments: Vec<NormalizedComment>) -> Self {
        let entries = comments
            .into_iter()
            .enumerate()
            .map(|(local_index, comment)| BatchEntry {
                local_index,
                comment,
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[BatchEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<BatchEntry> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationResult {
    pub local_index: usize,
    pub category: Category,
    pub topic: Option<String>,
}

/// Classifier answer for one batch, keyed by local index.
pub type ClassificationMap = HashMap<usize, ClassificationResult>;

/// The label every comment gets when no usable classification came back.
pub fn default_classification(local_index: usize) -> ClassificationResult {
    ClassificationResult {
        local_index,
        category: Category::Misc,
        topic: None,
    }
}

pub fn classified(comment: NormalizedComment, result: ClassificationResult) -> ClassifiedComment {
    ClassifiedComment {
        comment,
        category: result.category,
        topic: result.topic,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum FallbackReason {
    #[display("rate limit retries exhausted")]
    RateLimited,
    #[display("classification error")]
    ClassificationError,
    #[display("malformed response")]
    MalformedResponse,
}

/// How a batch resolved. Every variant still yields one comment per input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    Classified,
    /// The classifier answered but left `missing` indices without a result.
    Partial { missing: usize },
    Fallback { reason: FallbackReason },
}

#[derive(Debug, Clone)]
pub struct BatchReport {
    pub comments: Vec<ClassifiedComment>,
    pub outcome: BatchOutcome,
    pub attempts: u32,
}
