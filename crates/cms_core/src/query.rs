//! In-memory filtering, ordering and paging for backends that cannot push
//! these down. Filters always run before the page is sliced.

use crate::types::{ContentRecord, QueryOptions};

/// Most recent first by effective publish time, then by `created_at`.
pub fn sort_by_recency(items: &mut [ContentRecord]) {
    items.sort_by(|a, b| {
        b.effective_published_at()
            .cmp(&a.effective_published_at())
            .then_with(|| b.created_at.cmp(&a.created_at))
    });
}

fn contains_ci(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

pub fn matches(record: &ContentRecord, options: &QueryOptions) -> bool {
    if let Some(status) = options.status_filter() {
        if !record.status.as_str().eq_ignore_ascii_case(status) {
            return false;
        }
    }

    if let Some(category) = options.category_filter() {
        match &record.category {
            Some(own) if own.trim().to_lowercase() == category.to_lowercase() => {}
            _ => return false,
        }
    }

    if let Some(term) = options.search_term() {
        let term = term.to_lowercase();
        let hit = contains_ci(&record.title, &term)
            || contains_ci(&record.excerpt, &term)
            || contains_ci(&record.content, &term)
            || record.category.as_deref().is_some_and(|c| contains_ci(c, &term))
            || contains_ci(&record.tags.join(" "), &term);
        if !hit {
            return false;
        }
    }

    true
}

pub fn apply_filters(items: Vec<ContentRecord>, options: &QueryOptions) -> Vec<ContentRecord> {
    items.into_iter().filter(|record| matches(record, options)).collect()
}

/// The `[offset, offset + limit)` slice; empty past the end.
pub fn paginate<T>(items: Vec<T>, page: usize, limit: usize) -> Vec<T> {
    let offset = page.max(1).saturating_sub(1).saturating_mul(limit);
    items.into_iter().skip(offset).take(limit).collect()
}

/// Sort, filter, count, then slice. Returns the page and the filtered total.
pub fn apply_query(
    mut items: Vec<ContentRecord>,
    options: &QueryOptions,
) -> (Vec<ContentRecord>, usize) {
    sort_by_recency(&mut items);
    let filtered = apply_filters(items, options);
    let total = filtered.len();
    (paginate(filtered, options.page(), options.limit), total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ContentStatus;
    use chrono::{DateTime, Duration, Utc};

    fn base() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn record(id: &str, day: i64, status: ContentStatus) -> ContentRecord {
        ContentRecord {
            id: id.to_string(),
            title: format!("Item {}", id),
            content: String::new(),
            excerpt: String::new(),
            category: None,
            status,
            tags: vec![],
            featured_image: None,
            published_at: Some(base() + Duration::days(day)),
            created_at: base(),
            updated_at: base(),
            view_count: 0,
        }
    }

    fn five() -> Vec<ContentRecord> {
        (1..=5)
            .map(|day| record(&day.to_string(), day, ContentStatus::Published))
            .collect()
    }

    #[test]
    fn test_sort_uses_created_at_when_unpublished() {
        let mut late_draft = record("draft", 0, ContentStatus::Draft);
        late_draft.published_at = None;
        late_draft.created_at = base() + Duration::days(10);
        let mut items = vec![
            record("a", 1, ContentStatus::Published),
            late_draft,
            record("b", 5, ContentStatus::Published),
        ];

        sort_by_recency(&mut items);
        let ids: Vec<_> = items.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["draft", "b", "a"]);
    }

    #[test]
    fn test_second_page_of_two() {
        let options = QueryOptions::default().with_page(2, 2);
        let (page, total) = apply_query(five(), &options);
        let ids: Vec<_> = page.iter().map(|r| r.id.as_str()).collect();
        // Sorted newest first: 5, 4, 3, 2, 1 -> indices 2..4
        assert_eq!(ids, vec!["3", "2"]);
        assert_eq!(total, 5);
    }

    #[test]
    fn test_page_past_the_end_is_empty() {
        let options = QueryOptions::default().with_page(9, 2);
        let (page, total) = apply_query(five(), &options);
        assert!(page.is_empty());
        assert_eq!(total, 5);
    }

    #[test]
    fn test_page_never_exceeds_limit() {
        for limit in 0..7 {
            for page in 0..5 {
                let options = QueryOptions::default().with_status("all").with_page(page, limit);
                let (items, _) = apply_query(five(), &options);
                assert!(items.len() <= limit);
            }
        }
    }

    #[test]
    fn test_status_filter_is_case_insensitive() {
        let items = vec![
            record("p", 1, ContentStatus::Published),
            record("d", 2, ContentStatus::Draft),
            record("a", 3, ContentStatus::Archived),
        ];
        let options = QueryOptions::default().with_status("ARCHIVED");
        let ids: Vec<_> =
            apply_filters(items.clone(), &options).into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["a"]);

        let options = QueryOptions::default().with_status("all");
        assert_eq!(apply_filters(items, &options).len(), 3);
    }

    #[test]
    fn test_category_filter_never_matches_missing_category() {
        let mut with = record("with", 1, ContentStatus::Published);
        with.category = Some("Events".to_string());
        let without = record("without", 2, ContentStatus::Published);

        let options = QueryOptions::default().with_category("events");
        let ids: Vec<_> =
            apply_filters(vec![with, without], &options).into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["with"]);
    }

    #[test]
    fn test_search_matches_tags() {
        let mut tagged = record("tagged", 1, ContentStatus::Published);
        tagged.title = "Quarterly update".to_string();
        tagged.tags = vec!["Budget".to_string(), "finance".to_string()];
        let plain = record("plain", 2, ContentStatus::Published);

        let options = QueryOptions::default().with_search("budget");
        let ids: Vec<_> =
            apply_filters(vec![tagged, plain], &options).into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["tagged"]);
    }

    #[test]
    fn test_search_covers_every_text_field() {
        let mut in_excerpt = record("excerpt", 1, ContentStatus::Published);
        in_excerpt.excerpt = "Park cleanup".to_string();
        let mut in_content = record("content", 2, ContentStatus::Published);
        in_content.content = "<p>park cleanup</p>".to_string();
        let mut in_category = record("category", 3, ContentStatus::Published);
        in_category.category = Some("Parks".to_string());

        let options = QueryOptions::default().with_search("PARK");
        assert_eq!(apply_filters(vec![in_excerpt, in_content, in_category], &options).len(), 3);
    }

    #[test]
    fn test_filter_is_idempotent() {
        let mut items = five();
        items[1].status = ContentStatus::Draft;
        items[3].tags = vec!["budget".to_string()];
        let options = QueryOptions::default().with_search("budget");

        let once = apply_filters(items, &options);
        let twice = apply_filters(once.clone(), &options);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_paginate_generic() {
        assert_eq!(paginate(vec![1, 2, 3, 4, 5], 1, 2), vec![1, 2]);
        assert_eq!(paginate(vec![1, 2, 3, 4, 5], 3, 2), vec![5]);
        assert_eq!(paginate(Vec::<u8>::new(), 1, 10), Vec::<u8>::new());
    }
}
