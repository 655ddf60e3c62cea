//! Run Report
//!
//! Summary of one scan: category breakdown, confusion metrics, ranked topics and
//! the optional insight block. Rendered as a text table for the terminal, as markdown
//! for a video description, or serialized to JSON.

use std::collections::BTreeMap;

use itertools::Itertools;
use serde::Serialize;
use strum::IntoEnumIterator;

use crate::{
    comment::{Category, ClassifiedComment},
    error::AppError,
    prompt::{topic_histogram, InsightReport, TopicCount},
    youtube::VideoMeta,
};

const TOP_TOPICS: usize = 7;
const KEY_MOMENTS: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub video_id: String,
    pub video: Option<VideoMeta>,
    pub total_comments: usize,
    pub category_counts: BTreeMap<Category, usize>,
    /// Share of doubts, in whole percent.
    pub confusion_rate: u32,
    pub clarity_score: u32,
    pub top_topics: Vec<TopicCount>,
    pub key_moments: Vec<String>,
    pub insights: Option<InsightReport>,
    pub failure: Option<String>,
    pub comments: Vec<ClassifiedComment>,
}

impl RunReport {
    pub fn build(
        video_id: &str,
        video: Option<VideoMeta>,
        comments: Vec<ClassifiedComment>,
        insights: Option<InsightReport>,
        failure: Option<&AppError>,
    ) -> Self {
        let mut category_counts: BTreeMap<Category, usize> =
            Category::iter().map(|category| (category, 0)).collect();
        for comment in &comments {
            *category_counts.entry(comment.category).or_default() += 1;
        }

        let total_comments = comments.len();
        let doubts = category_counts
            .get(&Category::Doubt)
            .copied()
            .unwrap_or_default();
        let confusion_rate = if total_comments == 0 {
            0
        } else {
            (doubts * 100 / total_comments) as u32
        };

        let mut top_topics = topic_histogram(&comments);
        top_topics.truncate(TOP_TOPICS);

        let key_moments = comments
            .iter()
            .filter_map(|c| c.comment.mentioned_timestamp.clone())
            .unique()
            .take(KEY_MOMENTS)
            .collect();

        Self {
            video_id: video_id.to_string(),
            video,
            total_comments,
            category_counts,
            confusion_rate,
            clarity_score: 100 - confusion_rate,
            top_topics,
            key_moments,
            insights,
            failure: failure.map(|e| e.to_string()),
            comments,
        }
    }

    pub fn summary_table(&self) -> String {
        let title = self
            .video
            .as_ref()
            .map(|v| format!("{} ({})", v.title, v.channel_name))
            .unwrap_or_else(|| self.video_id.clone());

        let mut rows = vec![
            vec!["Video".to_string(), title],
            vec!["Comments".to_string(), self.total_comments.to_string()],
        ];
        rows.extend(
            self.category_counts
                .iter()
                .map(|(category, count)| vec![category.to_string(), count.to_string()]),
        );
        rows.push(vec![
            "Confusion rate".to_string(),
            format!("{}%", self.confusion_rate),
        ]);
        rows.push(vec![
            "Clarity score".to_string(),
            format!("{}/100", self.clarity_score),
        ]);
        if let Some(failure) = &self.failure {
            rows.push(vec!["Stopped early".to_string(), failure.clone()]);
        }

        let mut output = format_table(&["Metric", "Value"], &rows);

        if !self.top_topics.is_empty() {
            let topic_rows: Vec<Vec<String>> = self
                .top_topics
                .iter()
                .map(|t| vec![t.topic.clone(), t.count.to_string()])
                .collect();
            output.push('\n');
            output.push_str(&format_table(&["Confusing topic", "Doubts"], &topic_rows));
        }

        output
    }

    /// FAQ and key-moments block to paste into a video description.
    pub fn description_markdown(&self) -> String {
        let mut sections = Vec::new();

        if let Some(insights) = self.insights.as_ref().filter(|i| !i.faq_list.is_empty()) {
            let faqs = insights
                .faq_list
                .iter()
                .map(|faq| format!("**Q: {}**\nA: {}", faq.question, faq.answer))
                .join("\n\n");
            sections.push(format!("### Frequently asked questions\n\n{}", faqs));
        }

        if !self.key_moments.is_empty() {
            let moments = self
                .key_moments
                .iter()
                .map(|moment| format!("- {}", moment))
                .join("\n");
            sections.push(format!("### Key moments\n\n{}", moments));
        }

        sections.join("\n\n")
    }
}

fn format_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    if rows.is_empty() {
        return String::new();
    }

    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }
    }

    let mut output = String::new();

    let header_line: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| format!("{:width$}", h, width = widths[i]))
        .collect();
    output.push_str(&format!("| {} |\n", header_line.join(" | ")));

    let separator: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    output.push_str(&format!("|-{}-|\n", separator.join("-|-")));

    for row in rows {
        let cells: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let width = widths.get(i).copied().unwrap_or(cell.len());
                format!("{:width$}", cell, width = width)
            })
            .collect();
        output.push_str(&format!("| {} |\n", cells.join(" | ")));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        prompt::Faq,
        testing::common::classified_comment,
    };

    fn sample() -> Vec<ClassifiedComment> {
        let mut comments = Vec::new();
        for (i, topic) in ["Entropy", "Entropy", "Entropy", "Limits", "Limits"]
            .iter()
            .enumerate()
        {
            comments.push(classified_comment(
                &format!("lost at {}:30 on {}", i % 2, topic),
                Category::Doubt,
                Some(topic),
            ));
        }
        for _ in 0..3 {
            comments.push(classified_comment("great video", Category::Praise, Some("N/A")));
        }
        for _ in 0..2 {
            comments.push(classified_comment("sub4sub", Category::Spam, None));
        }
        comments
    }

    #[test]
    fn test_build_metrics() {
        let report = RunReport::build("dQw4w9WgXcQ", None, sample(), None, None);

        assert_eq!(report.total_comments, 10);
        assert_eq!(report.category_counts[&Category::Doubt], 5);
        assert_eq!(report.category_counts[&Category::Praise], 3);
        assert_eq!(report.category_counts[&Category::Spam], 2);
        assert_eq!(report.category_counts[&Category::Misc], 0);
        assert_eq!(report.confusion_rate, 50);
        assert_eq!(report.clarity_score, 50);
        assert_eq!(report.top_topics[0].topic, "Entropy");
        assert_eq!(report.top_topics[0].count, 3);
        assert_eq!(report.key_moments, vec!["0:30".to_string(), "1:30".to_string()]);
        assert!(report.failure.is_none());
    }

    #[test]
    fn test_empty_run() {
        let failure = AppError::SourceUnavailable("comments disabled".to_string());
        let report = RunReport::build("abc", None, Vec::new(), None, Some(&failure));

        assert_eq!(report.total_comments, 0);
        assert_eq!(report.confusion_rate, 0);
        assert_eq!(report.clarity_score, 100);
        assert!(report.failure.as_deref().unwrap().contains("comments disabled"));
        assert_eq!(report.description_markdown(), "");
    }

    #[test]
    fn test_summary_table() {
        let report = RunReport::build("dQw4w9WgXcQ", None, sample(), None, None);

        let table = report.summary_table();

        assert!(table.starts_with("| Metric "));
        assert!(table.contains("| Doubt "));
        assert!(table.contains("50%"));
        assert!(table.contains("| Entropy "));
        let widths: Vec<_> = table
            .lines()
            .take_while(|l| !l.is_empty())
            .map(|l| l.chars().count())
            .collect();
        assert!(widths.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_description_markdown() {
        let insights = InsightReport {
            lead_topic_suggestion: Some("Entropy".to_string()),
            rationale: None,
            faq_list: vec![Faq {
                question: "What is entropy?".to_string(),
                answer: "Disorder.".to_string(),
            }],
        };
        let report = RunReport::build("abc", None, sample(), Some(insights), None);

        let markdown = report.description_markdown();

        assert!(markdown.starts_with("### Frequently asked questions"));
        assert!(markdown.contains("**Q: What is entropy?**\nA: Disorder."));
        assert!(markdown.contains("### Key moments\n\n- 0:30\n- 1:30"));
    }

    #[test]
    fn test_serializes_category_keys() {
        let report = RunReport::build("abc", None, sample(), None, None);

        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["category_counts"]["Doubt"], 5);
        assert_eq!(json["comments"].as_array().unwrap().len(), 10);
    }
}
