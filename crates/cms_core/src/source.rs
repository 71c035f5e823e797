use async_trait::async_trait;
use serde_json::Value;

use crate::types::{ContentKind, ContentStatus, QueryOptions, RawRecord};
use crate::Result;

/// The system of record. Supports native filtering, ordering and paging.
#[async_trait]
pub trait RelationalStore: Send + Sync {
    /// Run a filtered, ordered, paged query and count the filtered set.
    async fn query(&self, kind: ContentKind, query: &RelationalQuery) -> Result<RelationalPage>;

    /// Fetch one row. `Ok(None)` is an authoritative "no such record".
    async fn get(&self, kind: ContentKind, id: &str) -> Result<Option<RawRecord>>;
}

/// A structured workspace database (pages with typed properties).
/// Filtering there is unreliable, so callers re-filter locally.
#[async_trait]
pub trait WorkspaceDatabase: Send + Sync {
    /// Whether a database is configured for this content kind.
    fn is_enabled(&self, kind: ContentKind) -> bool;

    async fn query(
        &self,
        kind: ContentKind,
        filter: Option<&Value>,
        sort: Option<&Value>,
        limit: usize,
    ) -> Result<Vec<RawRecord>>;

    async fn get(&self, kind: ContentKind, id: &str) -> Result<Option<RawRecord>>;
}

/// A blog-publishing REST service that filters and pages server side.
#[async_trait]
pub trait BlogService: Send + Sync {
    /// Whether the service publishes this content kind at all.
    fn serves(&self, kind: ContentKind) -> bool;

    async fn list_posts(&self, kind: ContentKind, params: &BlogListParams) -> Result<BlogPage>;

    async fn get_post(&self, kind: ContentKind, id: &str, embed: bool) -> Result<Option<RawRecord>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlogListParams {
    pub page: usize,
    pub per_page: usize,
    pub status: Option<String>,
    pub search: Option<String>,
    pub embed: bool,
}

impl BlogListParams {
    /// Translates canonical options into the blog service vocabulary.
    /// Category has no blog counterpart and is not pushed down.
    ///
    /// `None` means no post can satisfy the options (a zero limit, or a status
    /// outside the canonical three), so the service need not be asked.
    pub fn from_options(options: &QueryOptions) -> Option<Self> {
        if options.limit == 0 {
            return None;
        }
        let status = match options.status_filter() {
            Some(status) => Some(blog_status(status)?.to_string()),
            None => None,
        };

        Some(Self {
            page: options.page(),
            per_page: options.limit,
            status,
            search: options.search_term().map(str::to_string),
            embed: true,
        })
    }

    /// Index of the first requested post across the whole collection.
    pub fn offset(&self) -> usize {
        self.page.max(1).saturating_sub(1).saturating_mul(self.per_page)
    }
}

fn blog_status(status: &str) -> Option<&'static str> {
    match status.trim().to_lowercase().as_str() {
        "published" => Some("publish"),
        "draft" => Some("draft"),
        "archived" => Some("trash"),
        _ => None,
    }
}

#[derive(Debug, Clone, Default)]
pub struct BlogPage {
    pub items: Vec<RawRecord>,
    /// Total across all pages when the service reports it.
    pub total: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Id,
    Title,
    Content,
    Excerpt,
    Category,
    Status,
    Tags,
    PublishedAt,
    CreatedAt,
}

impl Column {
    pub fn as_str(&self) -> &'static str {
        match self {
            Column::Id => "id",
            Column::Title => "title",
            Column::Content => "content",
            Column::Excerpt => "excerpt",
            Column::Category => "category",
            Column::Status => "status",
            Column::Tags => "tags",
            Column::PublishedAt => "published_at",
            Column::CreatedAt => "created_at",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Case-insensitive equality.
    Equals { column: Column, value: String },
    /// Case-insensitive substring match on any of the columns.
    AnyContains { columns: Vec<Column>, term: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderBy {
    pub column: Column,
    pub descending: bool,
    pub nulls_last: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationalQuery {
    pub filters: Vec<Predicate>,
    pub order: Vec<OrderBy>,
    pub offset: usize,
    pub limit: usize,
}

pub const SEARCH_COLUMNS: [Column; 5] = [
    Column::Title,
    Column::Excerpt,
    Column::Content,
    Column::Category,
    Column::Tags,
];

impl RelationalQuery {
    /// Pushes every part of the options down as native predicates.
    pub fn from_options(options: &QueryOptions) -> Self {
        let mut filters = Vec::new();
        if let Some(status) = options.status_filter() {
            filters.push(Predicate::Equals {
                column: Column::Status,
                value: status.to_string(),
            });
        }
        if let Some(category) = options.category_filter() {
            filters.push(Predicate::Equals {
                column: Column::Category,
                value: category.to_string(),
            });
        }
        if let Some(term) = options.search_term() {
            filters.push(Predicate::AnyContains {
                columns: SEARCH_COLUMNS.to_vec(),
                term: term.to_string(),
            });
        }

        Self {
            filters,
            order: vec![
                OrderBy {
                    column: Column::PublishedAt,
                    descending: true,
                    nulls_last: true,
                },
                OrderBy {
                    column: Column::CreatedAt,
                    descending: true,
                    nulls_last: false,
                },
            ],
            offset: options.offset(),
            limit: options.limit,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RelationalPage {
    pub rows: Vec<RawRecord>,
    pub total: usize,
}
