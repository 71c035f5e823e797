use serde_json::Value;

use super::{lookup, normalize_with, text, FieldAliases};
use crate::types::{ContentRecord, ContentStatus, RawRecord};

/// The blog service has no category concept, so that list is empty.
pub const BLOG_ALIASES: FieldAliases = FieldAliases {
    id: &["id", "ID", "slug"],
    title: &["title.rendered", "title", "post_title"],
    content: &["content.rendered", "content", "post_content"],
    excerpt: &["excerpt.rendered", "excerpt", "post_excerpt"],
    category: &[],
    status: &["status", "post_status"],
    tags: &["tag_names", "tags"],
    featured_image: &[
        "jetpack_featured_media_url",
        "_embedded.wp:featuredmedia.0.source_url",
        "featured_image",
    ],
    published_at: &["date_gmt", "date", "post_date_gmt"],
    created_at: &["date_gmt", "date", "post_date_gmt"],
    updated_at: &["modified_gmt", "modified", "post_modified_gmt"],
    view_count: &["view_count", "views", "post_views"],
};

/// Maps the blog's own status words onto canonical ones before the generic step.
fn blog_status(raw: &RawRecord) -> ContentStatus {
    let status = text(raw, BLOG_ALIASES.status).map(|s| s.trim().to_lowercase());
    match status.as_deref() {
        Some("publish") => ContentStatus::Published,
        Some("trash") => ContentStatus::Archived,
        other => ContentStatus::normalize(other),
    }
}

/// Names of embedded `post_tag` terms, used when `tags` only holds term ids.
fn embedded_tag_names(raw: &RawRecord) -> Vec<String> {
    let Some(Value::Array(groups)) = lookup(raw, "_embedded.wp:term") else {
        return Vec::new();
    };
    groups
        .iter()
        .filter_map(Value::as_array)
        .flatten()
        .filter(|term| term.get("taxonomy").and_then(Value::as_str) == Some("post_tag"))
        .filter_map(|term| term.get("name").and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

/// Content and title markup is passed through untouched.
pub fn normalize_blog(raw: &RawRecord) -> ContentRecord {
    let mut record = normalize_with(raw, &BLOG_ALIASES, blog_status(raw));
    if record.tags.is_empty() {
        record.tags = embedded_tag_names(raw);
    }
    record.category = None;
    record
}
