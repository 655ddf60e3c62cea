//! Tolerant reading of classification answers.
//!
//! Models do not reliably follow the requested schema. The result list is searched with an
//! ordered set of strategies and each entry is parsed on its own; entries that cannot be
//! read are skipped rather than failing the whole batch.

use derive_more::derive::Display;
use serde_json::Value;

use crate::{
    comment::{Category, TOPIC_NOT_APPLICABLE},
    pipeline::{ClassificationMap, ClassificationResult},
};

const INDEX_KEYS: [&str; 4] = ["id", "index", "local_index", "localIndex"];
const CATEGORY_KEYS: [&str; 3] = ["category", "Category", "label"];
const TOPIC_KEYS: [&str; 2] = ["topic", "Topic"];

/// How deep [`ExtractionStrategy::FirstListField`] looks into nested objects.
const MAX_SEARCH_DEPTH: usize = 2;

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStrategy {
    #[display("field `{_0}`")]
    NamedField(&'static str),
    #[display("top-level array")]
    TopLevelArray,
    #[display("first list-valued field")]
    FirstListField,
}

/// Tried in order; the first one that finds a list wins.
pub const STRATEGIES: [ExtractionStrategy; 7] = [
    ExtractionStrategy::NamedField("data"),
    ExtractionStrategy::NamedField("results"),
    ExtractionStrategy::NamedField("classifications"),
    ExtractionStrategy::NamedField("comments"),
    ExtractionStrategy::NamedField("items"),
    ExtractionStrategy::TopLevelArray,
    ExtractionStrategy::FirstListField,
];

impl ExtractionStrategy {
    pub fn extract<'a>(&self, value: &'a Value) -> Option<&'a Vec<Value>> {
        match self {
            ExtractionStrategy::NamedField(name) => value.get(*name).and_then(Value::as_array),
            ExtractionStrategy::TopLevelArray => value.as_array(),
            ExtractionStrategy::FirstListField => first_list_field(value, MAX_SEARCH_DEPTH),
        }
    }
}

/// Lists without a single readable entry are passed over, so an empty `flags` or a list
/// of plain strings does not hide the results behind it.
fn first_list_field(value: &Value, depth: usize) -> Option<&Vec<Value>> {
    let object = value.as_object()?;
    if let Some(list) = object
        .values()
        .filter_map(Value::as_array)
        .find(|list| has_readable_entry(list))
    {
        return Some(list);
    }
    if depth <= 1 {
        return None;
    }
    object
        .values()
        .find_map(|nested| first_list_field(nested, depth - 1))
}

fn has_readable_entry(list: &[Value]) -> bool {
    list.iter().any(|entry| parse_entry(entry).is_some())
}

pub fn find_result_list(value: &Value) -> Option<(ExtractionStrategy, &Vec<Value>)> {
    STRATEGIES
        .iter()
        .find_map(|strategy| strategy.extract(value).map(|list| (*strategy, list)))
}

/// Parses every readable entry. Indices outside `0..batch_len` are dropped and the first
/// entry for an index wins.
pub fn parse_entries(entries: &[Value], batch_len: usize) -> ClassificationMap {
    let mut results = ClassificationMap::new();
    for entry in entries {
        let Some(result) = parse_entry(entry) else {
            tracing::debug!("Skipping unreadable classification entry: {}", entry);
            continue;
        };
        if result.local_index >= batch_len {
            tracing::warn!(
                "Discarding classification for index {} in a batch of {}",
                result.local_index,
                batch_len
            );
            continue;
        }
        results.entry(result.local_index).or_insert(result);
    }
    results
}

pub fn parse_entry(entry: &Value) -> Option<ClassificationResult> {
    let object = entry.as_object()?;

    let local_index = INDEX_KEYS
        .iter()
        .filter_map(|key| object.get(*key))
        .find_map(read_index)?;

    let category = CATEGORY_KEYS
        .iter()
        .filter_map(|key| object.get(*key))
        .find_map(Value::as_str)
        .map(Category::from_label)
        .unwrap_or(Category::Misc);

    let topic = TOPIC_KEYS
        .iter()
        .filter_map(|key| object.get(*key))
        .find_map(Value::as_str)
        .map(str::trim)
        .filter(|topic| !topic.is_empty() && !topic.eq_ignore_ascii_case(TOPIC_NOT_APPLICABLE))
        .map(str::to_string);

    Some(ClassificationResult {
        local_index,
        category,
        topic,
    })
}

fn read_index(value: &Value) -> Option<usize> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| usize::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
