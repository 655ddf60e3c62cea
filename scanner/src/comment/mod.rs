//! Comment types as they move through the scanner: raw from the source, normalized,
//! then classified.

pub mod normalize;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

pub use normalize::normalize;

/// Topic recorded when the backend classified a comment but gave no topic.
pub const TOPIC_NOT_APPLICABLE: &str = "N/A";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawComment {
    pub author: String,
    /// Body as served by the source, may contain markup and entities.
    pub text: String,
    pub like_count: u64,
    pub published_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedComment {
    #[serde(flatten)]
    pub raw: RawComment,
    pub clean_text: String,
    /// First clock-style reference in the text, e.g. "12:30" or "1:20:05".
    pub mentioned_timestamp: Option<String>,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum Category {
    /// A conceptual question about the content.
    Doubt,
    Spam,
    Praise,
    Misc,
}

impl Category {
    /// Labels come from an untrusted backend; anything unrecognised is `Misc`.
    pub fn from_label(label: &str) -> Self {
        label.trim().parse().unwrap_or(Category::Misc)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedComment {
    #[serde(flatten)]
    pub comment: NormalizedComment,
    pub category: Category,
    pub topic: Option<String>,
}

impl ClassifiedComment {
    pub fn is_doubt(&self) -> bool {
        self.category == Category::Doubt
    }

    /// The topic, unless absent or the "not applicable" sentinel.
    pub fn meaningful_topic(&self) -> Option<&str> {
        self.topic
            .as_deref()
            .filter(|t| !t.is_empty() && *t != TOPIC_NOT_APPLICABLE)
    }
}
