use async_trait::async_trait;
use cms_core::prelude::*;
use cms_core::WorkspaceDatabase;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use url::Url;

use crate::{ensure_success, BackendConfig, StorageBackend};

const BACKEND: &str = "notion";
const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone)]
pub struct NotionConfig {
    pub url: String,
    pub token: Option<String>,
    pub version: String,
    pub databases: HashMap<ContentKind, String>,
    pub timeout: Duration,
}

impl NotionConfig {
    pub fn new() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let databases = ContentKind::ALL
            .iter()
            .filter_map(|kind| {
                var(&format!("WORKSPACE_DB_{}", kind.env_suffix()))
                    .filter(|id| !id.trim().is_empty())
                    .map(|id| (*kind, id.trim().to_string()))
            })
            .collect();
        Self {
            url: var("WORKSPACE_API_URL").unwrap_or_else(|| "https://api.notion.com".to_string()),
            token: var("WORKSPACE_TOKEN").filter(|t| !t.is_empty()),
            version: var("WORKSPACE_API_VERSION").unwrap_or_else(|| "2022-06-28".to_string()),
            databases,
            timeout: var("WORKSPACE_HTTP_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(Duration::from_secs(15)),
        }
    }

    pub fn with_database(mut self, kind: ContentKind, id: impl Into<String>) -> Self {
        self.databases.insert(kind, id.into());
        self
    }
}

impl Default for NotionConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendConfig for NotionConfig {
    fn get_url(&self) -> String {
        self.url.clone()
    }

    fn with_url(&mut self, url: &str) {
        self.url = url.to_string();
    }
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<Value>,
    #[serde(default)]
    has_more: bool,
    next_cursor: Option<String>,
}

fn rich_text(value: &Value) -> String {
    value
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("plain_text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default()
}

fn file_url(file: &Value) -> Value {
    file.pointer("/external/url")
        .or_else(|| file.pointer("/file/url"))
        .cloned()
        .unwrap_or(Value::Null)
}

fn names(value: &Value) -> Value {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.get("name").cloned())
                .collect::<Vec<_>>()
        })
        .map(Value::Array)
        .unwrap_or(Value::Null)
}

/// Reduces a typed page property to the plain value it carries.
fn property_value(property: &Value) -> Value {
    let Some(kind) = property.get("type").and_then(Value::as_str) else {
        return Value::Null;
    };
    let inner = property.get(kind).unwrap_or(&Value::Null);
    match kind {
        "title" | "rich_text" => Value::String(rich_text(inner)),
        "select" | "status" => inner.get("name").cloned().unwrap_or(Value::Null),
        "multi_select" | "people" => names(inner),
        "date" => inner.get("start").cloned().unwrap_or(Value::Null),
        "files" => inner.get(0).map(file_url).unwrap_or(Value::Null),
        "relation" => inner
            .as_array()
            .map(|items| items.iter().filter_map(|i| i.get("id").cloned()).collect::<Vec<_>>())
            .map(Value::Array)
            .unwrap_or(Value::Null),
        "formula" => match inner.get("type").and_then(Value::as_str) {
            Some("date") => inner.pointer("/date/start").cloned().unwrap_or(Value::Null),
            Some(t) => inner.get(t).cloned().unwrap_or(Value::Null),
            None => Value::Null,
        },
        "number" | "checkbox" | "url" | "email" | "phone_number" | "created_time"
        | "last_edited_time" => inner.clone(),
        _ => Value::Null,
    }
}

/// Flattens a page into `property name -> plain value`, plus the page's own
/// `id`, `created_time`, `last_edited_time` and `cover`.
pub fn flatten_page(page: &Value) -> RawRecord {
    let mut raw = RawRecord::new();
    if let Some(properties) = page.get("properties").and_then(Value::as_object) {
        for (name, property) in properties {
            raw.insert(name.clone(), property_value(property));
        }
    }
    for field in ["id", "created_time", "last_edited_time", "url"] {
        if let Some(value) = page.get(field) {
            raw.insert(field.to_string(), value.clone());
        }
    }
    if let Some(cover) = page.get("cover").filter(|c| !c.is_null()) {
        raw.entry("cover".to_string()).or_insert_with(|| file_url(cover));
    }
    raw
}

fn parent_database(page: &Value) -> Option<&str> {
    page.pointer("/parent/database_id").and_then(Value::as_str)
}

fn same_id(a: &str, b: &str) -> bool {
    a.replace('-', "").eq_ignore_ascii_case(&b.replace('-', ""))
}

/// Notion databases, one per content kind.
pub struct NotionDatabase {
    client: Client,
    base: Url,
    config: NotionConfig,
}

impl fmt::Debug for NotionDatabase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotionDatabase")
            .field("client", &"<reqwest::Client>")
            .field("token", &"<redacted>")
            .field("base", &self.base.as_str())
            .field("databases", &self.config.databases)
            .finish()
    }
}

impl NotionDatabase {
    pub fn new(config: NotionConfig) -> Result<Self> {
        let base = Url::parse(&config.url)
            .map_err(|e| Error::InvalidConfig(format!("workspace url `{}`: {}", config.url, e)))?;
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, base, config })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| Error::InvalidConfig(format!("workspace endpoint `{}`: {}", path, e)))
    }

    /// The page endpoint with `id` kept as a single escaped path segment.
    fn page_url(&self, id: &str) -> Result<Url> {
        let mut url = self.endpoint("/v1/pages")?;
        url.path_segments_mut()
            .map_err(|_| Error::InvalidConfig("workspace url cannot be a base".to_string()))?
            .push(id);
        Ok(url)
    }

    fn database_id(&self, kind: ContentKind) -> Result<&str> {
        self.config
            .databases
            .get(&kind)
            .map(String::as_str)
            .ok_or(Error::NotConfigured("workspace database"))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header("Notion-Version", &self.config.version);
        match &self.config.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl StorageBackend for NotionDatabase {
    fn get_error_message() -> &'static str {
        "Workspace database needs WORKSPACE_TOKEN and at least one WORKSPACE_DB_<KIND>"
    }

    async fn from_env() -> Result<Self> {
        Self::new(NotionConfig::new())
    }
}

#[async_trait]
impl WorkspaceDatabase for NotionDatabase {
    fn is_enabled(&self, kind: ContentKind) -> bool {
        self.config.databases.contains_key(&kind)
    }

    async fn query(
        &self,
        kind: ContentKind,
        filter: Option<&Value>,
        sort: Option<&Value>,
        limit: usize,
    ) -> Result<Vec<RawRecord>> {
        let endpoint = self.endpoint(&format!("/v1/databases/{}/query", self.database_id(kind)?))?;
        let mut pages = Vec::new();
        let mut cursor: Option<String> = None;

        while pages.len() < limit {
            let mut body = json!({ "page_size": (limit - pages.len()).min(MAX_PAGE_SIZE) });
            if let Some(filter) = filter {
                body["filter"] = filter.clone();
            }
            if let Some(sort) = sort {
                body["sorts"] = sort.clone();
            }
            if let Some(cursor) = &cursor {
                body["start_cursor"] = Value::String(cursor.clone());
            }

            let response = self
                .authorized(self.client.post(endpoint.clone()))
                .json(&body)
                .send()
                .await?;
            let batch: QueryResponse = ensure_success(BACKEND, response).await?.json().await?;
            pages.extend(batch.results.iter().map(flatten_page));

            match batch.next_cursor {
                Some(next) if batch.has_more => cursor = Some(next),
                _ => break,
            }
        }

        pages.truncate(limit);
        Ok(pages)
    }

    async fn get(&self, kind: ContentKind, id: &str) -> Result<Option<RawRecord>> {
        let database = self.database_id(kind)?;
        let endpoint = self.page_url(id)?;
        let response = self.authorized(self.client.get(endpoint)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let page: Value = ensure_success(BACKEND, response).await?.json().await?;

        // A page from another database is not a record of this kind.
        match parent_database(&page) {
            Some(parent) if same_id(parent, database) => Ok(Some(flatten_page(&page))),
            _ => Ok(None),
        }
    }
}
