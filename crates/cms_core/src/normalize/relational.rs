use super::{normalize_with, status, FieldAliases};
use crate::types::{ContentRecord, RawRecord};

pub const RELATIONAL_ALIASES: FieldAliases = FieldAliases {
    id: &["id"],
    title: &["title", "name"],
    content: &["content", "body"],
    excerpt: &["excerpt", "summary"],
    category: &["category", "category_name"],
    status: &["status"],
    tags: &["tags"],
    featured_image: &["featured_image", "image_url"],
    published_at: &["published_at", "publish_date"],
    created_at: &["created_at"],
    updated_at: &["updated_at"],
    view_count: &["view_count", "views"],
};

pub fn normalize_relational(raw: &RawRecord) -> ContentRecord {
    normalize_with(raw, &RELATIONAL_ALIASES, status(raw, RELATIONAL_ALIASES.status))
}
