use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use cms_core::prelude::*;
use cms_core::source::{Column, OrderBy, Predicate};
use cms_core::{ModeResolver, RelationalStore};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::{BackendConfig, StorageBackend};

const MODE_KEY: &str = "content_mode";

fn migrations() -> Vec<String> {
    let mut migrations: Vec<String> = ContentKind::ALL
        .iter()
        .map(|kind| {
            format!(
                r#"
                CREATE TABLE IF NOT EXISTS {table} (
                    id TEXT PRIMARY KEY,
                    title TEXT NOT NULL DEFAULT '',
                    content TEXT NOT NULL DEFAULT '',
                    excerpt TEXT NOT NULL DEFAULT '',
                    category TEXT,
                    status TEXT NOT NULL DEFAULT 'draft',
                    tags TEXT NOT NULL DEFAULT '[]',
                    featured_image TEXT,
                    published_at TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    view_count INTEGER NOT NULL DEFAULT 0
                )
                "#,
                table = kind.as_str()
            )
        })
        .collect();
    migrations.push(
        r#"
        CREATE TABLE IF NOT EXISTS site_settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#
        .to_string(),
    );
    // Add future migrations here
    migrations
}

/// Fixed-width UTC text so lexical order matches time order.
fn timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn db_error(action: &str) -> impl FnOnce(sqlx::Error) -> Error + '_ {
    move |e| Error::Database(format!("Failed to {}: {}", action, e))
}

/// `%` and `_` in user search terms are matched literally.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// Column expression as the in-memory engine sees it: status folded to the
/// three canonical values, tags as their string elements joined by a space.
fn searchable(column: Column) -> String {
    match column {
        Column::Status => "CASE LOWER(TRIM(status)) \
             WHEN 'published' THEN 'published' \
             WHEN 'archived' THEN 'archived' \
             ELSE 'draft' END"
            .to_string(),
        Column::Tags => "(SELECT group_concat(value, ' ') FROM json_each(\
             CASE WHEN json_valid(tags) THEN tags ELSE '[]' END) WHERE type = 'text')"
            .to_string(),
        other => other.as_str().to_string(),
    }
}

// LIKE and LOWER fold ASCII letters only, so non-ASCII search terms and
// category values compare case-sensitively here.
fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, filters: &[Predicate]) {
    for (i, predicate) in filters.iter().enumerate() {
        builder.push(if i == 0 { " WHERE " } else { " AND " });
        match predicate {
            Predicate::Equals { column, value } => {
                builder.push(format!("LOWER({}) = LOWER(", searchable(*column)));
                builder.push_bind(value.trim().to_string());
                builder.push(")");
            }
            Predicate::AnyContains { columns, term } => {
                builder.push("(");
                for (j, column) in columns.iter().enumerate() {
                    if j > 0 {
                        builder.push(" OR ");
                    }
                    builder.push(format!("{} LIKE ", searchable(*column)));
                    builder.push_bind(like_pattern(term));
                    builder.push(" ESCAPE '\\'");
                }
                builder.push(")");
            }
        }
    }
}

fn push_order(builder: &mut QueryBuilder<'_, Sqlite>, order: &[OrderBy]) {
    for (i, key) in order.iter().enumerate() {
        builder.push(if i == 0 { " ORDER BY " } else { ", " });
        if key.nulls_last {
            builder.push(format!("{} IS NULL, ", key.column.as_str()));
        }
        builder.push(key.column.as_str());
        builder.push(if key.descending { " DESC" } else { " ASC" });
    }
}

fn row_to_raw(row: &SqliteRow) -> RawRecord {
    let text = |name: &str| -> Value {
        row.try_get::<Option<String>, _>(name)
            .ok()
            .flatten()
            .map(Value::String)
            .unwrap_or(Value::Null)
    };
    let tags = row
        .try_get::<Option<String>, _>("tags")
        .ok()
        .flatten()
        .and_then(|tags| serde_json::from_str::<Value>(&tags).ok())
        .unwrap_or(Value::Null);
    let view_count = row
        .try_get::<i64, _>("view_count")
        .map(Value::from)
        .unwrap_or(Value::Null);

    let mut raw = RawRecord::new();
    for column in [
        "id",
        "title",
        "content",
        "excerpt",
        "category",
        "status",
        "featured_image",
        "published_at",
        "created_at",
        "updated_at",
    ] {
        raw.insert(column.to_string(), text(column));
    }
    raw.insert("tags".to_string(), tags);
    raw.insert("view_count".to_string(), view_count);
    raw
}

#[derive(Debug, Clone)]
pub struct SqliteConfig {
    pub db_path: PathBuf,
}

impl SqliteConfig {
    pub fn new() -> Self {
        let db_path = env::var("SITE_DB_PATH").unwrap_or_else(|_| "site.db".to_string());
        Self {
            db_path: PathBuf::from(db_path),
        }
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendConfig for SqliteConfig {
    fn get_url(&self) -> String {
        format!("sqlite:{}", self.db_path.display())
    }

    fn with_url(&mut self, url: &str) {
        self.db_path = PathBuf::from(url.trim_start_matches("sqlite:"));
    }
}

pub struct SQLiteStorage {
    pool: Arc<SqlitePool>,
    db_path: PathBuf,
}

#[async_trait]
impl StorageBackend for SQLiteStorage {
    fn get_error_message() -> &'static str {
        "SQLite database should be available at ./site.db (or SITE_DB_PATH)"
    }

    async fn from_env() -> Result<Self> {
        Self::new_with_path(&SqliteConfig::new().db_path).await
    }
}

impl SQLiteStorage {
    pub async fn new_with_path(db_path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(db_error("connect to database"))?;

        for (i, migration) in migrations().iter().enumerate() {
            sqlx::query(migration)
                .execute(&pool)
                .await
                .map_err(|e| Error::Database(format!("Failed to run migration {}: {}", i, e)))?;
        }

        Ok(Self {
            pool: Arc::new(pool),
            db_path: db_path.to_path_buf(),
        })
    }

    pub fn get_db_path(&self) -> &Path {
        &self.db_path
    }

    /// Direct write to the primary store, used by seeding and admin tooling.
    pub async fn store_record(&self, kind: ContentKind, record: &ContentRecord) -> Result<()> {
        let tags = serde_json::to_string(&record.tags)?;
        let sql = format!(
            r#"
            INSERT OR REPLACE INTO {}
            (id, title, content, excerpt, category, status, tags, featured_image,
             published_at, created_at, updated_at, view_count)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            kind.as_str()
        );

        sqlx::query(&sql)
            .bind(&record.id)
            .bind(&record.title)
            .bind(&record.content)
            .bind(&record.excerpt)
            .bind(record.category.as_deref())
            .bind(record.status.as_str())
            .bind(tags)
            .bind(record.featured_image.as_deref())
            .bind(record.published_at.map(timestamp))
            .bind(timestamp(record.created_at))
            .bind(timestamp(record.updated_at))
            .bind(i64::try_from(record.view_count).unwrap_or(i64::MAX))
            .execute(&*self.pool)
            .await
            .map_err(db_error("store record"))?;

        Ok(())
    }

    pub async fn set_mode(&self, mode: ContentMode) -> Result<()> {
        sqlx::query("INSERT OR REPLACE INTO site_settings (key, value) VALUES (?, ?)")
            .bind(MODE_KEY)
            .bind(mode.as_str())
            .execute(&*self.pool)
            .await
            .map_err(db_error("store content mode"))?;
        Ok(())
    }
}

#[async_trait]
impl RelationalStore for SQLiteStorage {
    async fn query(&self, kind: ContentKind, query: &RelationalQuery) -> Result<RelationalPage> {
        let mut count =
            QueryBuilder::<Sqlite>::new(format!("SELECT COUNT(*) FROM {}", kind.as_str()));
        push_filters(&mut count, &query.filters);
        let total: i64 = count
            .build()
            .fetch_one(&*self.pool)
            .await
            .map_err(db_error("count records"))?
            .try_get(0)
            .map_err(db_error("read record count"))?;

        let mut select = QueryBuilder::<Sqlite>::new(format!("SELECT * FROM {}", kind.as_str()));
        push_filters(&mut select, &query.filters);
        push_order(&mut select, &query.order);
        select.push(" LIMIT ");
        select.push_bind(i64::try_from(query.limit).unwrap_or(i64::MAX));
        select.push(" OFFSET ");
        select.push_bind(i64::try_from(query.offset).unwrap_or(i64::MAX));
        debug!(kind = %kind, sql = select.sql(), "relational query");

        let rows = select
            .build()
            .fetch_all(&*self.pool)
            .await
            .map_err(db_error("query records"))?;

        Ok(RelationalPage {
            rows: rows.iter().map(row_to_raw).collect(),
            total: usize::try_from(total).unwrap_or_default(),
        })
    }

    async fn get(&self, kind: ContentKind, id: &str) -> Result<Option<RawRecord>> {
        let sql = format!("SELECT * FROM {} WHERE id = ?", kind.as_str());
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&*self.pool)
            .await
            .map_err(db_error("get record"))?;
        Ok(row.as_ref().map(row_to_raw))
    }
}

#[async_trait]
impl ModeResolver for SQLiteStorage {
    async fn active_mode(&self) -> Result<ContentMode> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM site_settings WHERE key = ?")
                .bind(MODE_KEY)
                .fetch_optional(&*self.pool)
                .await
                .map_err(db_error("read content mode"))?;
        cms_core::modes::parse_mode_value(value.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use cms_core::normalize::normalize_relational;
    use tempfile::tempdir;

    fn record(id: &str, published_days_ago: Option<i64>) -> ContentRecord {
        let created_at = Utc::now() - Duration::days(60);
        ContentRecord {
            id: id.to_string(),
            title: format!("Story {}", id),
            content: "Body".to_string(),
            excerpt: String::new(),
            category: Some("Community".to_string()),
            status: ContentStatus::Published,
            tags: vec![],
            featured_image: None,
            published_at: published_days_ago.map(|d| Utc::now() - Duration::days(d)),
            created_at,
            updated_at: created_at,
            view_count: 3,
        }
    }

    #[tokio::test]
    async fn test_sqlite_storage() {
        // Create a temporary directory for the test database
        let temp_dir = tempdir().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let storage = SQLiteStorage::new_with_path(&db_path).await.unwrap();

        let mut tagged = record("tagged", Some(5));
        tagged.tags = vec!["budget".to_string()];
        let mut draft = record("draft", Some(1));
        draft.status = ContentStatus::Draft;
        let undated = record("undated", None);
        for r in [record("older", Some(10)), undated, record("newer", Some(2)), tagged, draft] {
            storage.store_record(ContentKind::News, &r).await.unwrap();
        }

        let query = RelationalQuery::from_options(&QueryOptions::default());
        let page = storage.query(ContentKind::News, &query).await.unwrap();
        let ids: Vec<_> = page.rows.iter().map(|r| r["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["newer", "tagged", "older", "undated"]);
        assert_eq!(page.total, 4);

        let query = RelationalQuery::from_options(&QueryOptions::default().with_search("BUDGET"));
        let page = storage.query(ContentKind::News, &query).await.unwrap();
        assert_eq!(page.total, 1);
        let found = normalize_relational(&page.rows[0]);
        assert_eq!(found.id, "tagged");
        assert_eq!(found.tags, vec!["budget"]);
        assert_eq!(found.view_count, 3);

        let query = RelationalQuery::from_options(&QueryOptions::default().with_page(2, 3));
        let page = storage.query(ContentKind::News, &query).await.unwrap();
        assert_eq!(page.rows.len(), 1);
        assert_eq!(page.total, 4);

        let options = QueryOptions::default().with_category("community").with_status("Draft");
        let query = RelationalQuery::from_options(&options);
        let page = storage.query(ContentKind::News, &query).await.unwrap();
        assert_eq!(page.total, 1);

        // Test database will be automatically cleaned up when temp_dir is dropped
    }

    #[tokio::test]
    async fn test_sqlite_get_and_not_found() {
        let temp_dir = tempdir().unwrap();
        let storage = SQLiteStorage::new_with_path(&temp_dir.path().join("get.db")).await.unwrap();
        let stored = record("e-1", Some(1));
        storage.store_record(ContentKind::Events, &stored).await.unwrap();

        let row = storage.get(ContentKind::Events, "e-1").await.unwrap().unwrap();
        let loaded = normalize_relational(&row);
        assert_eq!(loaded.title, stored.title);
        assert_eq!(loaded.published_at, stored.published_at);
        assert_eq!(loaded.created_at, stored.created_at);

        assert!(storage.get(ContentKind::Events, "missing").await.unwrap().is_none());
        assert!(storage.get(ContentKind::News, "e-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_like_wildcards_are_literal() {
        let temp_dir = tempdir().unwrap();
        let storage = SQLiteStorage::new_with_path(&temp_dir.path().join("like.db")).await.unwrap();
        let mut percent = record("percent", Some(1));
        percent.title = "Raised 100% of goal".to_string();
        storage.store_record(ContentKind::News, &percent).await.unwrap();
        storage.store_record(ContentKind::News, &record("other", Some(2))).await.unwrap();

        let query = RelationalQuery::from_options(&QueryOptions::default().with_search("0%"));
        let page = storage.query(ContentKind::News, &query).await.unwrap();
        assert_eq!(page.total, 1);
    }

    async fn insert_raw(storage: &SQLiteStorage, id: &str, status: &str, tags: &str) {
        sqlx::query(
            "INSERT INTO news (id, title, status, tags, created_at, updated_at) \
             VALUES (?, ?, ?, ?, '2024-01-01T00:00:00Z', '2024-01-01T00:00:00Z')",
        )
        .bind(id)
        .bind(format!("Imported {}", id))
        .bind(status)
        .bind(tags)
        .execute(&*storage.pool)
        .await
        .unwrap();
    }

    async fn ids(storage: &SQLiteStorage, options: &QueryOptions) -> Vec<String> {
        let query = RelationalQuery::from_options(options);
        let page = storage.query(ContentKind::News, &query).await.unwrap();
        assert_eq!(page.total, page.rows.len());
        let mut ids: Vec<String> = page.rows.iter().map(|r| normalize_relational(r).id).collect();
        ids.sort();
        ids
    }

    #[tokio::test]
    async fn test_status_filter_uses_canonical_status() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("status.db");
        let storage = SQLiteStorage::new_with_path(&path).await.unwrap();
        insert_raw(&storage, "pending", "Pending", "[]").await;
        insert_raw(&storage, "padded", " Published ", "[]").await;
        insert_raw(&storage, "gone", "ARCHIVED", "[]").await;

        let all = QueryOptions::default().with_page(1, 50);
        assert_eq!(ids(&storage, &all.clone().with_status("draft")).await, vec!["pending"]);
        assert_eq!(ids(&storage, &all.clone().with_status("Published")).await, vec!["padded"]);
        assert_eq!(ids(&storage, &all.clone().with_status("archived")).await, vec!["gone"]);
        assert!(ids(&storage, &all.with_status("pending")).await.is_empty());
    }

    #[tokio::test]
    async fn test_search_agrees_with_in_memory_engine() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("search.db");
        let storage = SQLiteStorage::new_with_path(&path).await.unwrap();
        let mut pair = record("pair", Some(1));
        pair.tags = vec!["x".to_string(), "y".to_string()];
        let mut budget = record("budget", Some(2));
        budget.tags = vec!["Budget".to_string()];
        for r in [pair, budget, record("untagged", Some(3))] {
            storage.store_record(ContentKind::News, &r).await.unwrap();
        }
        insert_raw(&storage, "mangled", "published", "not json").await;
        insert_raw(&storage, "numeric", "published", "[1, \"z\"]").await;

        let everything = QueryOptions::default().with_status("all").with_page(1, 50);
        let query = RelationalQuery::from_options(&everything);
        let records: Vec<ContentRecord> = storage
            .query(ContentKind::News, &query)
            .await
            .unwrap()
            .rows
            .iter()
            .map(normalize_relational)
            .collect();

        for term in ["[", "]", "\"", "\",\"", "x y", "budget", "z", "1"] {
            let options = everything.clone().with_search(term);
            let mut expected: Vec<String> = records
                .iter()
                .filter(|r| cms_core::query::matches(r, &options))
                .map(|r| r.id.clone())
                .collect();
            expected.sort();
            assert_eq!(ids(&storage, &options).await, expected, "term {:?}", term);
        }
    }

    #[tokio::test]
    async fn test_sqlite_mode() {
        let temp_dir = tempdir().unwrap();
        let storage = SQLiteStorage::new_with_path(&temp_dir.path().join("mode.db")).await.unwrap();
        assert_eq!(storage.active_mode().await.unwrap(), ContentMode::Default);
        storage.set_mode(ContentMode::BlogPublishing).await.unwrap();
        assert_eq!(storage.active_mode().await.unwrap(), ContentMode::BlogPublishing);
    }
}
