use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// A backend record before normalization.
pub type RawRecord = serde_json::Map<String, serde_json::Value>;

/// Sentinel accepted by the status and category filters.
pub const ALL: &str = "all";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    News,
    Events,
    BoardPosts,
    Organizations,
}

impl ContentKind {
    pub const ALL: [ContentKind; 4] = [
        ContentKind::News,
        ContentKind::Events,
        ContentKind::BoardPosts,
        ContentKind::Organizations,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::News => "news",
            ContentKind::Events => "events",
            ContentKind::BoardPosts => "board_posts",
            ContentKind::Organizations => "organizations",
        }
    }

    /// Suffix used by per-kind environment variables, e.g. `WORKSPACE_DB_BOARD_POSTS`.
    pub fn env_suffix(&self) -> &'static str {
        match self {
            ContentKind::News => "NEWS",
            ContentKind::Events => "EVENTS",
            ContentKind::BoardPosts => "BOARD_POSTS",
            ContentKind::Organizations => "ORGANIZATIONS",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "news" => Ok(ContentKind::News),
            "events" | "event" => Ok(ContentKind::Events),
            "board_posts" | "board" => Ok(ContentKind::BoardPosts),
            "organizations" | "organization" | "orgs" => Ok(ContentKind::Organizations),
            _ => Err(Error::UnknownContentKind(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentStatus {
    #[default]
    Draft,
    Published,
    Archived,
}

impl ContentStatus {
    /// Maps any backend status to one of the three canonical values.
    /// Unknown or missing values are never promoted past `Draft`.
    pub fn normalize(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_lowercase()).as_deref() {
            Some("published") => ContentStatus::Published,
            Some("archived") => ContentStatus::Archived,
            _ => ContentStatus::Draft,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentStatus::Draft => "draft",
            ContentStatus::Published => "published",
            ContentStatus::Archived => "archived",
        }
    }
}

impl fmt::Display for ContentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The canonical shape every backend record is normalized into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRecord {
    pub id: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub status: ContentStatus,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub featured_image: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub view_count: u64,
}

impl ContentRecord {
    /// `published_at` when present, otherwise `created_at`.
    pub fn effective_published_at(&self) -> DateTime<Utc> {
        self.published_at.unwrap_or(self.created_at)
    }
}

/// Which backend answered a resolution call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    BlogService,
    WorkspaceDatabase,
    Relational,
    StaticFallback,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::BlogService => "blog_service",
            SourceKind::WorkspaceDatabase => "workspace_database",
            SourceKind::Relational => "relational",
            SourceKind::StaticFallback => "static_fallback",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deployment-wide switch selecting the preferred backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentMode {
    #[default]
    Default,
    BlogPublishing,
}

impl ContentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentMode::Default => "default",
            ContentMode::BlogPublishing => "blog_publishing",
        }
    }
}

impl fmt::Display for ContentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentMode {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "" | "default" | "local" => Ok(ContentMode::Default),
            "blog" | "blog_publishing" | "wordpress" => Ok(ContentMode::BlogPublishing),
            other => Err(Error::InvalidConfig(format!("unknown content mode `{}`", other))),
        }
    }
}

fn default_page() -> usize {
    1
}

fn default_limit() -> usize {
    10
}

fn default_status() -> String {
    ContentStatus::Published.as_str().to_string()
}

fn default_category() -> String {
    ALL.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOptions {
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default)]
    pub search: Option<String>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
            status: default_status(),
            category: default_category(),
            search: None,
        }
    }
}

impl QueryOptions {
    pub fn with_page(mut self, page: usize, limit: usize) -> Self {
        self.page = page;
        self.limit = limit;
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = status.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    /// 1-based page; zero is read as the first page.
    pub fn page(&self) -> usize {
        self.page.max(1)
    }

    pub fn offset(&self) -> usize {
        (self.page() - 1).saturating_mul(self.limit)
    }

    /// The status to filter on, or `None` for the `"all"` sentinel.
    pub fn status_filter(&self) -> Option<&str> {
        let status = self.status.trim();
        (!status.eq_ignore_ascii_case(ALL)).then_some(status)
    }

    pub fn category_filter(&self) -> Option<&str> {
        let category = self.category.trim();
        (!category.is_empty() && !category.eq_ignore_ascii_case(ALL)).then_some(category)
    }

    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub items: Vec<ContentRecord>,
    pub total: usize,
    pub source: SourceKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemResult {
    pub item: Option<ContentRecord>,
    pub source: SourceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<serde_json::Value>,
}
