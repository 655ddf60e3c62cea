use std::collections::HashMap;

use indoc::formatdoc;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::comment::ClassifiedComment;

use super::ChatBackend;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Faq {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsightReport {
    pub lead_topic_suggestion: Option<String>,
    pub rationale: Option<String>,
    pub faq_list: Vec<Faq>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicCount {
    pub topic: String,
    pub count: usize,
}

/// Doubt topics ranked by count, ties broken alphabetically.
pub fn topic_histogram(comments: &[ClassifiedComment]) -> Vec<TopicCount> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for topic in comments
        .iter()
        .filter(|c| c.is_doubt())
        .filter_map(ClassifiedComment::meaningful_topic)
    {
        *counts.entry(topic).or_default() += 1;
    }

    counts
        .into_iter()
        .sorted_by(|(a_topic, a_count), (b_topic, b_count)| {
            b_count.cmp(a_count).then_with(|| a_topic.cmp(b_topic))
        })
        .map(|(topic, count)| TopicCount {
            topic: topic.to_string(),
            count,
        })
        .collect()
}

pub struct InsightSummarizer<B> {
    backend: B,
    max_doubts: usize,
    max_faqs: usize,
}

impl<B: ChatBackend> InsightSummarizer<B> {
    pub fn new(backend: B, max_doubts: usize, max_faqs: usize) -> Self {
        Self {
            backend,
            max_doubts,
            max_faqs,
        }
    }

    /// One generative call over the doubts. `None` when there are no doubts or the call fails.
    pub async fn summarize(&self, comments: &[ClassifiedComment]) -> Option<InsightReport> {
        let doubts: Vec<&str> = comments
            .iter()
            .filter(|c| c.is_doubt())
            .take(self.max_doubts)
            .map(|c| c.comment.clean_text.as_str())
            .collect();

        if doubts.is_empty() {
            tracing::info!("No doubts found, skipping insights");
            return None;
        }

        let topics = topic_histogram(comments);
        match self
            .backend
            .complete_json(SYSTEM_PROMPT, &user_prompt(&doubts, &topics, self.max_faqs))
            .await
        {
            Ok(value) => Some(parse_insights(&value, self.max_faqs)),
            Err(e) => {
                tracing::warn!("Insight summary failed: {}", e);
                None
            }
        }
    }
}

const SYSTEM_PROMPT: &str = "You are a content strategist helping an educational YouTube creator \
    plan their next video from the questions their viewers ask. Respond only with a JSON object.";

fn user_prompt(doubts: &[&str], topics: &[TopicCount], max_faqs: usize) -> String {
    let frequent = topics
        .iter()
        .take(5)
        .map(|t| format!("{} ({})", t.topic, t.count))
        .join(", ");

    formatdoc! {r#"
        Viewers left the following questions on the latest video:
        {doubts}

        Most frequent confusing topics: {frequent}

        Suggest the single best topic for the next video and justify it in one sentence.
        Also write up to {max_faqs} frequently asked questions with short answers.
        Respond with the keys "next_video_idea", "next_video_reason" and
        "faq_list" (a list of objects with "question" and "answer")."#,
        doubts = doubts.iter().map(|d| format!("- {}", d)).join("\n"),
        frequent = if frequent.is_empty() { "none".to_string() } else { frequent },
    }
}

fn text_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| value.get(*key))
        .find_map(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn parse_insights(value: &Value, max_faqs: usize) -> InsightReport {
    let faq_list = value
        .get("faq_list")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| {
                    Some(Faq {
                        question: text_field(entry, &["question", "Question"])?,
                        answer: text_field(entry, &["answer", "Answer"])?,
                    })
                })
                .take(max_faqs)
                .collect()
        })
        .unwrap_or_default();

    InsightReport {
        lead_topic_suggestion: text_field(value, &["next_video_idea"]),
        rationale: text_field(value, &["next_video_reason"]),
        faq_list,
    }
}
