use regex::{Captures, Regex};

use super::{NormalizedComment, RawComment};

const RE_WHITESPACE_STR: &str = r"\s+";
// 12:30, 1:20:05
const RE_CLOCK_STR: &str = r"\b(?:\d{1,2}:)?\d{1,2}:\d{2}\b";
// The markup the source emits in comment bodies. A bare `<` is left alone.
const RE_BREAK_STR: &str = r"(?i)<br\s*/?>";
const RE_INLINE_TAG_STR: &str = r#"(?i)</?(?:b|i|s)>|<a\s+[^<>]*href[^<>]*>|</a>"#;
const RE_ENTITY_STR: &str = r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z]{2,8});";

lazy_static::lazy_static!(
    static ref RE_WHITESPACE: Regex = Regex::new(RE_WHITESPACE_STR).unwrap();
    static ref RE_CLOCK: Regex = Regex::new(RE_CLOCK_STR).unwrap();
    static ref RE_BREAK: Regex = Regex::new(RE_BREAK_STR).unwrap();
    static ref RE_INLINE_TAG: Regex = Regex::new(RE_INLINE_TAG_STR).unwrap();
    static ref RE_ENTITY: Regex = Regex::new(RE_ENTITY_STR).unwrap();
);

pub fn normalize(raw: RawComment) -> NormalizedComment {
    let clean_text = clean_text(&raw.text);
    let mentioned_timestamp = extract_timestamp(&clean_text);

    NormalizedComment {
        raw,
        clean_text,
        mentioned_timestamp,
    }
}

/// Drops the inline markup (`<br>`, `<b>`, `<i>`, `<s>`, links), decodes entities in a
/// single pass and collapses whitespace. Decoded text is never read as markup again.
pub fn clean_text(text: &str) -> String {
    let text = RE_BREAK.replace_all(text, " ");
    let text = RE_INLINE_TAG.replace_all(&text, "");
    let text = decode_entities(&text);
    RE_WHITESPACE.replace_all(&text, " ").trim().to_string()
}

/// Unknown entities are kept verbatim.
pub fn decode_entities(text: &str) -> String {
    RE_ENTITY
        .replace_all(text, |caps: &Captures| match decode_entity(&caps[1]) {
            Some(c) => c.to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

fn decode_entity(name: &str) -> Option<char> {
    if let Some(hex) = name.strip_prefix("#x").or_else(|| name.strip_prefix("#X")) {
        return u32::from_str_radix(hex, 16).ok().and_then(char::from_u32);
    }
    if let Some(dec) = name.strip_prefix('#') {
        return dec.parse().ok().and_then(char::from_u32);
    }
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        _ => None,
    }
}

pub fn extract_timestamp(text: &str) -> Option<String> {
    RE_CLOCK.find(text).map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn raw(text: &str) -> RawComment {
        RawComment {
            author: "Student".to_string(),
            text: text.to_string(),
            like_count: 3,
            published_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        }
    }

    #[test]
    fn test_strips_markup_and_entities() {
        let normalized = normalize(raw("Tom &amp; Jerry<br>is <b>great</b> &quot;really&quot;"));
        assert_eq!(normalized.clean_text, "Tom & Jerry is great \"really\"");
        assert_eq!(normalized.mentioned_timestamp, None);
        assert_eq!(normalized.raw.like_count, 3);
    }

    #[test]
    fn test_keeps_link_text() {
        let normalized = normalize(raw(
            r#"At <a href="https://www.youtube.com/watch?v=abc&amp;t=750">12:30</a> I got lost"#,
        ));
        assert_eq!(normalized.clean_text, "At 12:30 I got lost");
        assert_eq!(normalized.mentioned_timestamp.as_deref(), Some("12:30"));
    }

    #[test]
    fn test_extract_timestamp_variants() {
        assert_eq!(extract_timestamp("see 1:20:05 and 3:10").as_deref(), Some("1:20:05"));
        assert_eq!(extract_timestamp("at 4:05 exactly").as_deref(), Some("4:05"));
        assert_eq!(extract_timestamp("ratio 123:456"), None);
        assert_eq!(extract_timestamp("no time here"), None);
    }

    #[test]
    fn test_empty_and_whitespace_input() {
        assert_eq!(normalize(raw("")).clean_text, "");
        assert_eq!(normalize(raw("   \n\t ")).clean_text, "");
        assert_eq!(normalize(raw("<br><br>")).clean_text, "");
    }

    #[test]
    fn test_comparisons_survive() {
        let escaped = normalize(raw("why is a&lt;b when n&lt;k at 3:10"));
        assert_eq!(escaped.clean_text, "why is a<b when n<k at 3:10");
        assert_eq!(escaped.mentioned_timestamp.as_deref(), Some("3:10"));

        let again = normalize(raw(&escaped.clean_text));
        assert_eq!(again.clean_text, escaped.clean_text);
        assert_eq!(again.mentioned_timestamp, escaped.mentioned_timestamp);

        let bare = normalize(raw("if a<b and c>d then 0<x<1, see 2:15"));
        assert_eq!(bare.clean_text, "if a<b and c>d then 0<x<1, see 2:15");
        assert_eq!(bare.mentioned_timestamp.as_deref(), Some("2:15"));
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("it&#39;s &#x27;ok&#x27;"), "it's 'ok'");
        assert_eq!(decode_entities("a&nbsp;b"), "a b");
        assert_eq!(decode_entities("&amp;lt;"), "&lt;");
        assert_eq!(decode_entities("&bogus; & alone"), "&bogus; & alone");
    }

    #[test]
    fn test_normalize_is_idempotent_on_plain_text() {
        let first = normalize(raw("Loved the part at 1:20:05, thanks!"));
        let second = normalize(raw(&first.clean_text));
        assert_eq!(second, first);

        let marked_up = normalize(raw("Why does <b>entropy</b> grow?<br>Confused at 7:45"));
        let again = normalize(raw(&marked_up.clean_text));
        assert_eq!(again.clean_text, marked_up.clean_text);
        assert_eq!(again.mentioned_timestamp, marked_up.mentioned_timestamp);
    }
}
