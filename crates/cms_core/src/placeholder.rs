//! Built-in records served when no live backend answers.

use chrono::{DateTime, Utc};

use crate::types::{ContentKind, ContentRecord, ContentStatus};

pub const TITLE_PREFIX: &str = "[Placeholder]";

const PLACEHOLDER_CONTENT: &str =
    "This is placeholder content shown while the content service is unavailable.";

// 2024-01-01T00:00:00Z
const EPOCH_2024: i64 = 1_704_067_200;
const DAY: i64 = 86_400;

fn at(days: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(EPOCH_2024 + days * DAY, 0).unwrap_or_default()
}

struct Seed {
    title: &'static str,
    category: &'static str,
    status: ContentStatus,
    tags: &'static [&'static str],
    day: i64,
}

fn seed(
    title: &'static str,
    category: &'static str,
    status: ContentStatus,
    tags: &'static [&'static str],
    day: i64,
) -> Seed {
    Seed { title, category, status, tags, day }
}

fn seeds(kind: ContentKind) -> [Seed; 4] {
    use ContentStatus::{Archived, Draft, Published};

    match kind {
        ContentKind::News => [
            seed("Welcome to our new website", "Announcements", Published, &["welcome"], 30),
            seed("Annual report now available", "Reports", Published, &["report", "budget"], 20),
            seed("Upcoming newsletter", "Announcements", Draft, &[], 40),
            seed("Last year's highlights", "Reports", Archived, &["archive"], 1),
        ],
        ContentKind::Events => [
            seed("Community open day", "Community", Published, &["community"], 30),
            seed("Volunteer orientation", "Volunteering", Published, &["volunteers"], 20),
            seed("Fundraising gala", "Fundraising", Draft, &[], 40),
            seed("Winter workshop", "Workshops", Archived, &["archive"], 1),
        ],
        ContentKind::BoardPosts => [
            seed("Board meeting minutes", "Minutes", Published, &["board"], 30),
            seed("Budget proposal for review", "Finance", Published, &["budget"], 20),
            seed("Draft bylaws amendment", "Governance", Draft, &[], 40),
            seed("Previous board roster", "Governance", Archived, &["archive"], 1),
        ],
        ContentKind::Organizations => [
            seed("Neighborhood association", "Civic", Published, &["civic"], 30),
            seed("Youth sports league", "Recreation", Published, &["youth"], 20),
            seed("Pending member organization", "Civic", Draft, &[], 40),
            seed("Former partner organization", "Recreation", Archived, &["archive"], 1),
        ],
    }
}

/// Fixed, clearly marked records for `kind`, covering every status.
pub fn placeholders(kind: ContentKind) -> Vec<ContentRecord> {
    seeds(kind)
        .into_iter()
        .enumerate()
        .map(|(i, seed)| {
            let created_at = at(seed.day);
            ContentRecord {
                id: format!("placeholder-{}-{}", kind, i + 1),
                title: format!("{} {}", TITLE_PREFIX, seed.title),
                content: PLACEHOLDER_CONTENT.to_string(),
                excerpt: "Placeholder content".to_string(),
                category: Some(seed.category.to_string()),
                status: seed.status,
                tags: seed.tags.iter().map(|t| t.to_string()).collect(),
                featured_image: None,
                published_at: (seed.status != ContentStatus::Draft).then_some(created_at),
                created_at,
                updated_at: created_at,
                view_count: 0,
            }
        })
        .collect()
}

pub fn placeholder(kind: ContentKind, id: &str) -> Option<ContentRecord> {
    placeholders(kind).into_iter().find(|record| record.id == id)
}
