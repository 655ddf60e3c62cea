use async_trait::async_trait;
use indoc::indoc;
use serde_json::json;

use crate::{
    error::{AppError, AppResult},
    pipeline::{Batch, ClassificationMap, Classifier},
};

use super::{
    extract::{find_result_list, parse_entries},
    ChatBackend,
};

const SYSTEM_PROMPT: &str = indoc! {r#"
    You are an assistant that sorts YouTube comments left on an educational video.
    Each comment has an "id" and a "text". Give every comment exactly one category:
    - Doubt: a question about the video content, a confusion, or a request to explain something
    - Spam: self-promotion, links to unrelated content, scams or bot-like messages
    - Praise: appreciation or thanks with no question attached
    - Misc: anything else
    For Doubt comments also give "topic", the concept the viewer is confused about in 2 to 3 words.
    For every other category set "topic" to "N/A".
    Respond only with a JSON object of the form
    {"data": [{"id": 0, "category": "Doubt", "topic": "Entropy"}]}
    with one entry per input comment and no explanations."#};

pub struct LlmClassifier<B> {
    backend: B,
}

impl<B: ChatBackend> LlmClassifier<B> {
    pub fn new(backend: B) -> Self {
        Self { backend }
    }
}

fn user_prompt(batch: &Batch) -> String {
    let comments: Vec<_> = batch
        .entries()
        .iter()
        .map(|entry| json!({ "id": entry.local_index, "text": entry.comment.clean_text }))
        .collect();

    format!(
        "Classify the following comments:\n{}",
        serde_json::Value::Array(comments)
    )
}

#[async_trait]
impl<B: ChatBackend> Classifier for LlmClassifier<B> {
    async fn classify(&self, batch: &Batch) -> AppResult<ClassificationMap> {
        if batch.is_empty() {
            return Ok(ClassificationMap::new());
        }

        let response = self
            .backend
            .complete_json(SYSTEM_PROMPT, &user_prompt(batch))
            .await?;

        let (strategy, entries) = find_result_list(&response).ok_or_else(|| {
            AppError::MalformedResponse(format!("no result list in response: {}", response))
        })?;
        tracing::debug!(
            "Read {} classification entries from {}",
            entries.len(),
            strategy
        );

        Ok(parse_entries(entries, batch.len()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        comment::Category,
        testing::common::{normalized, Failure, FakeChatBackend},
    };

    fn batch_of(texts: &[&str]) -> Batch {
        Batch::new(texts.iter().map(|t| normalized(t)).collect())
    }

    #[tokio::test]
    async fn test_prompt_carries_ids_and_clean_text() {
        let backend = FakeChatBackend::answering(json!({ "data": [] }));
        let prompts = backend.prompts();
        let classifier = LlmClassifier::new(backend);

        classifier
            .classify(&batch_of(&["what is <b>entropy</b>?", "great video"]))
            .await
            .unwrap();

        let prompts = prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains(r#""id":0"#));
        assert!(prompts[0].contains("what is entropy?"));
        assert!(prompts[0].contains(r#""id":1"#));
    }

    #[tokio::test]
    async fn test_schema_variants_are_accepted() {
        let answers = [
            json!({ "data": [{ "id": 0, "category": "Doubt", "topic": "Entropy" }] }),
            json!({ "results": [{ "index": "0", "category": "doubt", "topic": "Entropy" }] }),
            json!({ "anything": [{ "id": 0, "Category": "DOUBT", "Topic": "Entropy" }] }),
        ];

        for answer in answers {
            let classifier = LlmClassifier::new(FakeChatBackend::answering(answer.clone()));
            let results = classifier.classify(&batch_of(&["why?"])).await.unwrap();
            assert_eq!(results.len(), 1, "answer {}", answer);
            assert_eq!(results[&0].category, Category::Doubt);
            assert_eq!(results[&0].topic.as_deref(), Some("Entropy"));
        }
    }

    #[tokio::test]
    async fn test_missing_list_is_malformed() {
        let classifier = LlmClassifier::new(FakeChatBackend::answering(json!({ "ok": true })));

        let err = classifier.classify(&batch_of(&["hello"])).await.unwrap_err();

        assert!(matches!(err, AppError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_out_of_range_indices_are_dropped() {
        let classifier = LlmClassifier::new(FakeChatBackend::answering(json!({
            "data": [
                { "id": 0, "category": "Praise" },
                { "id": 5, "category": "Doubt", "topic": "Ghost" }
            ]
        })));

        let results = classifier.classify(&batch_of(&["a", "b"])).await.unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[&0].category, Category::Praise);
    }

    #[tokio::test]
    async fn test_backend_errors_pass_through() {
        let classifier = LlmClassifier::new(FakeChatBackend::failing(Failure::RateLimited));

        let err = classifier.classify(&batch_of(&["a"])).await.unwrap_err();

        assert!(err.is_rate_limited());
    }
}
