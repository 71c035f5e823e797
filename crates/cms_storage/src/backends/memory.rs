use async_trait::async_trait;
use chrono::SecondsFormat;
use cms_core::prelude::*;
use cms_core::source::{Column, OrderBy, Predicate};
use cms_core::{BlogService, ModeResolver, RelationalStore, WorkspaceDatabase};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::StorageBackend;

/// Renders a canonical record the way a relational row looks.
pub fn record_to_row(record: &ContentRecord) -> RawRecord {
    match serde_json::to_value(record) {
        Ok(Value::Object(map)) => map,
        _ => RawRecord::new(),
    }
}

fn column_value(record: &ContentRecord, column: Column) -> Option<String> {
    let timestamp =
        |t: chrono::DateTime<chrono::Utc>| t.to_rfc3339_opts(SecondsFormat::Nanos, true);
    match column {
        Column::Id => Some(record.id.clone()),
        Column::Title => Some(record.title.clone()),
        Column::Content => Some(record.content.clone()),
        Column::Excerpt => Some(record.excerpt.clone()),
        Column::Category => record.category.clone(),
        Column::Status => Some(record.status.as_str().to_string()),
        // Searched the way the in-memory engine does, as one space-joined string.
        Column::Tags => Some(record.tags.join(" ")),
        Column::PublishedAt => record.published_at.map(timestamp),
        Column::CreatedAt => Some(timestamp(record.created_at)),
    }
}

fn satisfies(record: &ContentRecord, predicate: &Predicate) -> bool {
    match predicate {
        Predicate::Equals { column, value } => column_value(record, *column)
            .is_some_and(|own| own.to_lowercase() == value.to_lowercase()),
        Predicate::AnyContains { columns, term } => {
            let term = term.to_lowercase();
            columns.iter().any(|column| {
                column_value(record, *column).is_some_and(|own| own.to_lowercase().contains(&term))
            })
        }
    }
}

fn compare(a: &ContentRecord, b: &ContentRecord, order: &[OrderBy]) -> Ordering {
    for key in order {
        let (left, right) = (column_value(a, key.column), column_value(b, key.column));
        let ordering = match (left, right) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) if key.nulls_last => Ordering::Greater,
            (Some(_), None) if key.nulls_last => Ordering::Less,
            (left, right) if key.descending => right.cmp(&left),
            (left, right) => left.cmp(&right),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Relational store kept in process memory. Evaluates the same predicates the
/// SQL backend pushes down, which makes it a stand-in for tests and local runs.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    records: Arc<RwLock<HashMap<ContentKind, Vec<ContentRecord>>>>,
    mode: Arc<RwLock<ContentMode>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces by id.
    pub async fn store_record(&self, kind: ContentKind, record: ContentRecord) {
        let mut records = self.records.write().await;
        let records = records.entry(kind).or_default();
        if let Some(existing) = records.iter_mut().find(|r| r.id == record.id) {
            *existing = record;
        } else {
            records.push(record);
        }
    }

    pub async fn set_mode(&self, mode: ContentMode) {
        *self.mode.write().await = mode;
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    fn get_error_message() -> &'static str {
        "Memory storage should be available"
    }

    async fn from_env() -> Result<Self> {
        Ok(Self::new())
    }
}

#[async_trait]
impl RelationalStore for MemoryStorage {
    async fn query(&self, kind: ContentKind, query: &RelationalQuery) -> Result<RelationalPage> {
        let records = self.records.read().await;
        let mut matching: Vec<&ContentRecord> = records
            .get(&kind)
            .map(|records| {
                records
                    .iter()
                    .filter(|record| query.filters.iter().all(|p| satisfies(record, p)))
                    .collect()
            })
            .unwrap_or_default();
        matching.sort_by(|a, b| compare(a, b, &query.order));

        Ok(RelationalPage {
            total: matching.len(),
            rows: matching
                .into_iter()
                .skip(query.offset)
                .take(query.limit)
                .map(record_to_row)
                .collect(),
        })
    }

    async fn get(&self, kind: ContentKind, id: &str) -> Result<Option<RawRecord>> {
        let records = self.records.read().await;
        Ok(records
            .get(&kind)
            .and_then(|records| records.iter().find(|r| r.id == id))
            .map(record_to_row))
    }
}

#[async_trait]
impl ModeResolver for MemoryStorage {
    async fn active_mode(&self) -> Result<ContentMode> {
        Ok(*self.mode.read().await)
    }
}

fn raw_id(raw: &RawRecord) -> Option<String> {
    match raw.get("id") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// Workspace database holding already-flattened pages per content kind.
/// A kind is enabled once it has a database.
#[derive(Clone, Default)]
pub struct MemoryWorkspace {
    databases: HashMap<ContentKind, Vec<RawRecord>>,
}

impl MemoryWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_database(mut self, kind: ContentKind) -> Self {
        self.databases.entry(kind).or_default();
        self
    }

    pub fn with_page(mut self, kind: ContentKind, page: RawRecord) -> Self {
        self.databases.entry(kind).or_default().push(page);
        self
    }
}

#[async_trait]
impl WorkspaceDatabase for MemoryWorkspace {
    fn is_enabled(&self, kind: ContentKind) -> bool {
        self.databases.contains_key(&kind)
    }

    async fn query(
        &self,
        kind: ContentKind,
        _filter: Option<&Value>,
        _sort: Option<&Value>,
        limit: usize,
    ) -> Result<Vec<RawRecord>> {
        let pages = self
            .databases
            .get(&kind)
            .ok_or(Error::NotConfigured("workspace database"))?;
        Ok(pages.iter().take(limit).cloned().collect())
    }

    async fn get(&self, kind: ContentKind, id: &str) -> Result<Option<RawRecord>> {
        let pages = self
            .databases
            .get(&kind)
            .ok_or(Error::NotConfigured("workspace database"))?;
        Ok(pages.iter().find(|page| raw_id(page).as_deref() == Some(id)).cloned())
    }
}

fn rendered(raw: &RawRecord, field: &str) -> String {
    match raw.get(field) {
        Some(Value::Object(map)) => {
            map.get("rendered").and_then(Value::as_str).unwrap_or_default().to_string()
        }
        Some(Value::String(s)) => s.clone(),
        _ => String::new(),
    }
}

/// Blog service answering from memory with the service's own filtering.
#[derive(Clone, Default)]
pub struct MemoryBlog {
    posts: HashMap<ContentKind, Vec<RawRecord>>,
}

impl MemoryBlog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_post(mut self, kind: ContentKind, post: RawRecord) -> Self {
        self.posts.entry(kind).or_default().push(post);
        self
    }

    fn post_matches(post: &RawRecord, params: &BlogListParams) -> bool {
        if let Some(status) = &params.status {
            if post.get("status").and_then(Value::as_str) != Some(status.as_str()) {
                return false;
            }
        }
        if let Some(search) = &params.search {
            let search = search.to_lowercase();
            let haystack = format!(
                "{} {} {}",
                rendered(post, "title"),
                rendered(post, "excerpt"),
                rendered(post, "content")
            );
            if !haystack.to_lowercase().contains(&search) {
                return false;
            }
        }
        true
    }
}

#[async_trait]
impl BlogService for MemoryBlog {
    fn serves(&self, kind: ContentKind) -> bool {
        self.posts.contains_key(&kind)
    }

    async fn list_posts(&self, kind: ContentKind, params: &BlogListParams) -> Result<BlogPage> {
        let posts: Vec<&RawRecord> = self
            .posts
            .get(&kind)
            .map(|posts| posts.iter().filter(|p| Self::post_matches(p, params)).collect())
            .unwrap_or_default();
        let offset = params.offset();

        Ok(BlogPage {
            total: Some(posts.len()),
            items: posts.into_iter().skip(offset).take(params.per_page).cloned().collect(),
        })
    }

    async fn get_post(
        &self,
        kind: ContentKind,
        id: &str,
        _embed: bool,
    ) -> Result<Option<RawRecord>> {
        Ok(self
            .posts
            .get(&kind)
            .and_then(|posts| posts.iter().find(|post| raw_id(post).as_deref() == Some(id)))
            .cloned())
    }
}
