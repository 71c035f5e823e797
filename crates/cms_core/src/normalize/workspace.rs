use super::{normalize_with, status, FieldAliases};
use crate::types::{ContentRecord, RawRecord};

/// Property names as they appear in the workspace database, then the
/// generic lowercase name, then older column names.
pub const WORKSPACE_ALIASES: FieldAliases = FieldAliases {
    id: &["id", "ID", "page_id"],
    title: &["Title", "title", "Name"],
    content: &["Content", "content", "Body"],
    excerpt: &["Excerpt", "excerpt", "Summary"],
    category: &["Category", "category", "Section"],
    status: &["Status", "status", "State"],
    tags: &["Tags", "tags", "Labels"],
    featured_image: &["Featured Image", "featured_image", "cover"],
    published_at: &["Published At", "published_at", "Date"],
    created_at: &["Created At", "created_at", "created_time"],
    updated_at: &["Updated At", "updated_at", "last_edited_time"],
    view_count: &["View Count", "view_count", "Views"],
};

/// Expects a page whose properties were already flattened to plain values.
pub fn normalize_workspace(raw: &RawRecord) -> ContentRecord {
    normalize_with(raw, &WORKSPACE_ALIASES, status(raw, WORKSPACE_ALIASES.status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContentStatus;
    use serde_json::json;

    #[test]
    fn test_normalize_flattened_page() {
        let raw = json!({
            "id": "5f1c0a2e-0000-4000-8000-000000000001",
            "Title": "Spring volunteer drive",
            "Content": "Join us on Saturday.",
            "Summary": "Volunteers wanted",
            "Category": "Community",
            "Status": "Published",
            "Tags": ["volunteers", "spring"],
            "cover": "https://files.example.org/cover.jpg",
            "Published At": "2024-04-02",
            "created_time": "2024-03-30T08:00:00.000Z",
            "last_edited_time": "2024-04-01T08:00:00.000Z",
            "Views": 31
        });
        let record = normalize_workspace(raw.as_object().unwrap());

        assert_eq!(record.id, "5f1c0a2e-0000-4000-8000-000000000001");
        assert_eq!(record.title, "Spring volunteer drive");
        assert_eq!(record.excerpt, "Volunteers wanted");
        assert_eq!(record.category.as_deref(), Some("Community"));
        assert_eq!(record.status, ContentStatus::Published);
        assert_eq!(record.tags, vec!["volunteers", "spring"]);
        assert_eq!(record.featured_image.as_deref(), Some("https://files.example.org/cover.jpg"));
        assert!(record.published_at.is_some());
        assert!(record.updated_at > record.created_at);
        assert_eq!(record.view_count, 31);
    }

    #[test]
    fn test_primary_name_wins_over_generic_name() {
        let raw = json!({ "Title": "Primary", "title": "Generic", "Name": "Legacy" });
        assert_eq!(normalize_workspace(raw.as_object().unwrap()).title, "Primary");

        let raw = json!({ "Name": "Legacy" });
        assert_eq!(normalize_workspace(raw.as_object().unwrap()).title, "Legacy");
    }

    #[test]
    fn test_empty_page_gets_defaults() {
        let record = normalize_workspace(&RawRecord::new());
        assert_eq!(record.id, "");
        assert_eq!(record.title, "");
        assert_eq!(record.status, ContentStatus::Draft);
        assert!(record.tags.is_empty());
        assert_eq!(record.category, None);
        assert_eq!(record.published_at, None);
        assert_eq!(record.created_at, record.updated_at);
        assert_eq!(record.view_count, 0);
    }
}
