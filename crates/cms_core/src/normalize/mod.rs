//! Mapping of loosely typed backend records into [`ContentRecord`].
//!
//! Each backend family has an alias table listing, per canonical field, the
//! candidate source names in priority order. The first candidate holding a
//! non-null value wins; otherwise the field default applies. Candidates may
//! be dotted paths (`title.rendered`, `_embedded.wp:featuredmedia.0.source_url`).

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

use crate::types::{ContentRecord, ContentStatus, RawRecord};

pub mod blog;
pub mod relational;
pub mod workspace;

pub use blog::normalize_blog;
pub use relational::normalize_relational;
pub use workspace::normalize_workspace;

type Aliases = &'static [&'static str];

/// Candidate source names for every canonical field.
#[derive(Debug, Clone, Copy)]
pub struct FieldAliases {
    pub id: Aliases,
    pub title: Aliases,
    pub content: Aliases,
    pub excerpt: Aliases,
    pub category: Aliases,
    pub status: Aliases,
    pub tags: Aliases,
    pub featured_image: Aliases,
    pub published_at: Aliases,
    pub created_at: Aliases,
    pub updated_at: Aliases,
    pub view_count: Aliases,
}

/// Resolves a dotted path. Numeric segments index into arrays.
pub fn lookup<'a>(raw: &'a RawRecord, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = raw.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// First candidate holding a non-null value.
pub fn first_defined<'a>(raw: &'a RawRecord, candidates: &[&str]) -> Option<&'a Value> {
    candidates
        .iter()
        .filter_map(|path| lookup(raw, path))
        .find(|value| !value.is_null())
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub fn text(raw: &RawRecord, candidates: &[&str]) -> Option<String> {
    first_defined(raw, candidates).and_then(as_text)
}

/// Like [`text`] but treats blank strings as missing.
pub fn non_blank_text(raw: &RawRecord, candidates: &[&str]) -> Option<String> {
    text(raw, candidates).filter(|s| !s.trim().is_empty())
}

/// Accepts only sequences; non-string elements are dropped.
pub fn string_list(raw: &RawRecord, candidates: &[&str]) -> Vec<String> {
    match first_defined(raw, candidates) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_timestamp_str(s),
        Value::Number(n) => n
            .as_i64()
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0)),
        _ => None,
    }
}

fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

pub fn timestamp(raw: &RawRecord, candidates: &[&str]) -> Option<DateTime<Utc>> {
    first_defined(raw, candidates).and_then(parse_timestamp)
}

pub fn count(raw: &RawRecord, candidates: &[&str]) -> u64 {
    match first_defined(raw, candidates) {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse::<u64>().unwrap_or(0),
        _ => 0,
    }
}

/// Builds a canonical record from `raw` using the given alias table.
/// `status` is resolved by the caller so backends can pre-map their own vocabulary.
pub fn normalize_with(
    raw: &RawRecord,
    aliases: &FieldAliases,
    status: ContentStatus,
) -> ContentRecord {
    let published_at = timestamp(raw, aliases.published_at);
    let created_at = timestamp(raw, aliases.created_at)
        .or(published_at)
        .unwrap_or_default();
    let updated_at = timestamp(raw, aliases.updated_at).unwrap_or(created_at);

    ContentRecord {
        id: text(raw, aliases.id).unwrap_or_default(),
        title: text(raw, aliases.title).unwrap_or_default(),
        content: text(raw, aliases.content).unwrap_or_default(),
        excerpt: text(raw, aliases.excerpt).unwrap_or_default(),
        category: non_blank_text(raw, aliases.category),
        status,
        tags: string_list(raw, aliases.tags),
        featured_image: non_blank_text(raw, aliases.featured_image),
        published_at,
        created_at,
        updated_at,
        view_count: count(raw, aliases.view_count),
    }
}

/// Generic status step: lower-case and check membership.
pub fn status(raw: &RawRecord, candidates: &[&str]) -> ContentStatus {
    ContentStatus::normalize(text(raw, candidates).as_deref())
}
