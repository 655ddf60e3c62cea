use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::{
    comment::{normalize, Category, ClassifiedComment, NormalizedComment, RawComment},
    error::{AppError, AppResult},
    pipeline::{Batch, ClassificationMap, ClassificationResult, Classifier, CommentSource, SourcePage},
    prompt::ChatBackend,
};

pub fn raw(text: &str) -> RawComment {
    RawComment {
        author: "@viewer".to_string(),
        text: text.to_string(),
        like_count: 0,
        published_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
    }
}

pub fn normalized(text: &str) -> NormalizedComment {
    normalize(raw(text))
}

pub fn classified_comment(text: &str, category: Category, topic: Option<&str>) -> ClassifiedComment {
    ClassifiedComment {
        comment: normalized(text),
        category,
        topic: topic.map(str::to_string),
    }
}

pub fn result(local_index: usize, category: Category, topic: Option<&str>) -> ClassificationResult {
    ClassificationResult {
        local_index,
        category,
        topic: topic.map(str::to_string),
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Failure {
    RateLimited,
    Error,
    Malformed,
}

impl Failure {
    pub fn to_error(self) -> AppError {
        match self {
            Failure::RateLimited => {
                AppError::ClassificationUnavailable("Rate limit reached for model".to_string())
            }
            Failure::Error => AppError::ClassificationError("upstream exploded".to_string()),
            Failure::Malformed => AppError::MalformedResponse("not json".to_string()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn bump(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Classifier with a fixed answer, optionally preceded by rate limits.
pub struct ScriptedClassifier {
    answer: Result<Vec<ClassificationResult>, Failure>,
    rate_limited_calls: usize,
    calls: CallCounter,
    batch_sizes: Arc<Mutex<Vec<usize>>>,
}

impl ScriptedClassifier {
    fn build(answer: Result<Vec<ClassificationResult>, Failure>, rate_limited_calls: usize) -> Self {
        Self {
            answer,
            rate_limited_calls,
            calls: CallCounter::default(),
            batch_sizes: Arc::default(),
        }
    }

    pub fn answering(results: Vec<ClassificationResult>) -> Self {
        Self::build(Ok(results), 0)
    }

    pub fn failing(failure: Failure) -> Self {
        Self::build(Err(failure), 0)
    }

    pub fn rate_limited_then(times: usize, results: Vec<ClassificationResult>) -> Self {
        Self::build(Ok(results), times)
    }

    pub fn calls(&self) -> CallCounter {
        self.calls.clone()
    }

    pub fn batch_sizes(&self) -> Arc<Mutex<Vec<usize>>> {
        self.batch_sizes.clone()
    }
}

#[async_trait]
impl Classifier for ScriptedClassifier {
    async fn classify(&self, batch: &Batch) -> AppResult<ClassificationMap> {
        let call = self.calls.bump();
        self.batch_sizes.lock().unwrap().push(batch.len());
        if call <= self.rate_limited_calls {
            return Err(Failure::RateLimited.to_error());
        }
        match &self.answer {
            Ok(results) => Ok(results
                .iter()
                .map(|r| (r.local_index, r.clone()))
                .collect()),
            Err(failure) => Err(failure.to_error()),
        }
    }
}

/// Hands out labels in order across all batches it sees.
pub struct SequenceClassifier {
    labels: Vec<Category>,
    next: Mutex<usize>,
}

impl SequenceClassifier {
    pub fn new(labels: Vec<Category>) -> Self {
        Self {
            labels,
            next: Mutex::new(0),
        }
    }
}

#[async_trait]
impl Classifier for SequenceClassifier {
    async fn classify(&self, batch: &Batch) -> AppResult<ClassificationMap> {
        let mut next = self.next.lock().unwrap();
        let mut results = ClassificationMap::new();
        for entry in batch.entries() {
            let category = self.labels.get(*next).copied().unwrap_or(Category::Misc);
            *next += 1;
            let topic = (category == Category::Doubt).then_some("Topic");
            results.insert(entry.local_index, result(entry.local_index, category, topic));
        }
        Ok(results)
    }
}

/// In-memory paged source. Pages are served in order; the cursor is the page number.
pub struct PagedSource {
    pages: Vec<Vec<RawComment>>,
    endless_page_len: Option<usize>,
    honor_page_size: bool,
    fail_after: Option<usize>,
    cursor_forever: bool,
    calls: AtomicUsize,
    requests: Arc<Mutex<Vec<usize>>>,
}

impl PagedSource {
    pub fn new(pages: Vec<Vec<RawComment>>) -> Self {
        Self {
            pages,
            endless_page_len: None,
            honor_page_size: true,
            fail_after: None,
            cursor_forever: false,
            calls: AtomicUsize::new(0),
            requests: Arc::default(),
        }
    }

    /// Never runs dry: every page holds `page_len` comments (capped by the requested size).
    pub fn endless(page_len: usize) -> Self {
        Self {
            endless_page_len: Some(page_len),
            ..Self::new(Vec::new())
        }
    }

    pub fn ignoring_page_size(mut self) -> Self {
        self.honor_page_size = false;
        self
    }

    /// Serves `pages` pages, then every further call is `SourceUnavailable`.
    pub fn failing_after(mut self, pages: usize) -> Self {
        self.fail_after = Some(pages);
        self
    }

    pub fn with_cursor_forever(mut self) -> Self {
        self.cursor_forever = true;
        self
    }

    pub fn requests(&self) -> Arc<Mutex<Vec<usize>>> {
        self.requests.clone()
    }
}

#[async_trait]
impl CommentSource for PagedSource {
    async fn next_page(&self, _cursor: Option<&str>, page_size: usize) -> AppResult<SourcePage> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(page_size);

        if self.fail_after.is_some_and(|limit| call >= limit) {
            return Err(AppError::SourceUnavailable("quota exceeded".to_string()));
        }

        let (mut items, has_more) = match self.endless_page_len {
            Some(len) => (
                (0..len)
                    .map(|i| raw(&format!("page {} comment {}", call, i)))
                    .collect::<Vec<_>>(),
                true,
            ),
            None => (
                self.pages.get(call).cloned().unwrap_or_default(),
                call + 1 < self.pages.len(),
            ),
        };
        if self.honor_page_size {
            items.truncate(page_size);
        }

        let next_cursor = (has_more || self.cursor_forever || self.fail_after.is_some())
            .then(|| (call + 1).to_string());

        Ok(SourcePage { items, next_cursor })
    }
}

/// Chat backend with a canned answer that records every user prompt.
pub struct FakeChatBackend {
    answer: Result<serde_json::Value, Failure>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl FakeChatBackend {
    pub fn answering(value: serde_json::Value) -> Self {
        Self {
            answer: Ok(value),
            prompts: Arc::default(),
        }
    }

    pub fn failing(failure: Failure) -> Self {
        Self {
            answer: Err(failure),
            prompts: Arc::default(),
        }
    }

    pub fn prompts(&self) -> Arc<Mutex<Vec<String>>> {
        self.prompts.clone()
    }
}

#[async_trait]
impl ChatBackend for FakeChatBackend {
    async fn complete_json(&self, _system: &str, user: &str) -> AppResult<serde_json::Value> {
        self.prompts.lock().unwrap().push(user.to_string());
        match &self.answer {
            Ok(value) => Ok(value.clone()),
            Err(failure) => Err(failure.to_error()),
        }
    }
}
