use async_trait::async_trait;
use cms_core::prelude::*;
use cms_core::BlogService;
use reqwest::header::HeaderMap;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use url::Url;

use crate::{ensure_success, BackendConfig, StorageBackend};

const BACKEND: &str = "wordpress";
const MAX_PER_PAGE: usize = 100;
const TOTAL_HEADER: &str = "x-wp-total";
const INVALID_PAGE_CODE: &str = "rest_post_invalid_page_number";

#[derive(Debug, Clone)]
pub struct WordPressConfig {
    /// REST root, e.g. `https://blog.example.org/wp-json`.
    pub url: Option<String>,
    /// Collection route per content kind (`posts`, or a custom post type).
    pub routes: HashMap<ContentKind, String>,
    pub username: Option<String>,
    pub app_password: Option<String>,
    pub timeout: Duration,
}

impl WordPressConfig {
    pub fn new() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut routes: HashMap<ContentKind, String> = HashMap::new();
        routes.insert(ContentKind::News, "posts".to_string());
        for kind in ContentKind::ALL {
            if let Some(route) = var(&format!("BLOG_ROUTE_{}", kind.env_suffix())) {
                let route = route.trim().trim_matches('/').to_string();
                if route.is_empty() {
                    routes.remove(&kind);
                } else {
                    routes.insert(kind, route);
                }
            }
        }

        Self {
            url: var("BLOG_API_URL").filter(|u| !u.trim().is_empty()),
            routes,
            username: var("BLOG_USERNAME"),
            app_password: var("BLOG_APP_PASSWORD"),
            timeout: var("BLOG_HTTP_TIMEOUT_SECS")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(Duration::from_secs(15)),
        }
    }
}

impl Default for WordPressConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendConfig for WordPressConfig {
    fn get_url(&self) -> String {
        self.url.clone().unwrap_or_default()
    }

    fn with_url(&mut self, url: &str) {
        self.url = Some(url.to_string());
    }
}

pub fn total_from_headers(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(TOTAL_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
}

/// Full service pages that cover `[offset, offset + limit)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceWindow {
    pub first_page: usize,
    pub pages: usize,
    /// Items to drop from the first fetched page.
    pub skip: usize,
}

impl ServiceWindow {
    pub fn covering(offset: usize, limit: usize) -> Self {
        let skip = offset % MAX_PER_PAGE;
        Self {
            first_page: offset / MAX_PER_PAGE + 1,
            pages: (skip + limit).div_ceil(MAX_PER_PAGE),
            skip,
        }
    }
}

/// WordPress REST API (`wp/v2`).
pub struct WordPressBlog {
    client: Client,
    base: Url,
    config: WordPressConfig,
}

impl fmt::Debug for WordPressBlog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WordPressBlog")
            .field("client", &"<reqwest::Client>")
            .field("base", &self.base.as_str())
            .field("routes", &self.config.routes)
            .finish()
    }
}

impl WordPressBlog {
    pub fn new(config: WordPressConfig) -> Result<Self> {
        let url = config.url.clone().ok_or(Error::NotConfigured("blog service"))?;
        // Joining relative routes needs a trailing slash on the root.
        let base = Url::parse(&format!("{}/", url.trim_end_matches('/')))
            .map_err(|e| Error::InvalidConfig(format!("blog url `{}`: {}", url, e)))?;
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, base, config })
    }

    pub fn collection_url(&self, kind: ContentKind) -> Result<Url> {
        let route = self
            .config
            .routes
            .get(&kind)
            .ok_or(Error::NotConfigured("blog route"))?;
        self.base
            .join(&format!("wp/v2/{}", route))
            .map_err(|e| Error::InvalidConfig(format!("blog route `{}`: {}", route, e)))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match (&self.config.username, &self.config.app_password) {
            (Some(user), Some(password)) => request.basic_auth(user, Some(password)),
            _ => request,
        }
    }

    async fn fetch_page(
        &self,
        kind: ContentKind,
        params: &BlogListParams,
        page: usize,
        per_page: usize,
    ) -> Result<BlogPage> {
        let mut query: Vec<(&str, String)> =
            vec![("page", page.to_string()), ("per_page", per_page.to_string())];
        if let Some(status) = &params.status {
            query.push(("status", status.clone()));
        }
        if let Some(search) = &params.search {
            query.push(("search", search.clone()));
        }
        if params.embed {
            query.push(("_embed", "1".to_string()));
        }

        let request = self.client.get(self.collection_url(kind)?).query(&query);
        let response = self.authorized(request).send().await?;

        // Asking past the last page is an error on the service side; it is an empty page here.
        if response.status() == StatusCode::BAD_REQUEST {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            if body.get("code").and_then(Value::as_str) == Some(INVALID_PAGE_CODE) {
                return Ok(BlogPage::default());
            }
            return Err(Error::Backend {
                backend: BACKEND,
                status: StatusCode::BAD_REQUEST.as_u16(),
                message: body.to_string(),
            });
        }

        let response = ensure_success(BACKEND, response).await?;
        let total = total_from_headers(response.headers());
        let items: Vec<Value> = response.json().await?;
        Ok(BlogPage {
            items: items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Object(map) => Some(map),
                    _ => None,
                })
                .collect(),
            total,
        })
    }
}

#[async_trait]
impl StorageBackend for WordPressBlog {
    fn get_error_message() -> &'static str {
        "Blog service needs BLOG_API_URL pointing at the wp-json root"
    }

    async fn from_env() -> Result<Self> {
        Self::new(WordPressConfig::new())
    }
}

#[async_trait]
impl BlogService for WordPressBlog {
    fn serves(&self, kind: ContentKind) -> bool {
        self.config.routes.contains_key(&kind)
    }

    async fn list_posts(&self, kind: ContentKind, params: &BlogListParams) -> Result<BlogPage> {
        if params.per_page == 0 {
            return Ok(BlogPage::default());
        }
        if params.per_page <= MAX_PER_PAGE {
            return self.fetch_page(kind, params, params.page.max(1), params.per_page).await;
        }

        // Wider than one service page: walk full pages covering the window.
        let window = ServiceWindow::covering(params.offset(), params.per_page);
        let mut items = Vec::with_capacity(window.skip + params.per_page);
        let mut total = None;
        for page in window.first_page..window.first_page + window.pages {
            let batch = self.fetch_page(kind, params, page, MAX_PER_PAGE).await?;
            total = total.or(batch.total);
            let short = batch.items.len() < MAX_PER_PAGE;
            items.extend(batch.items);
            if short {
                break;
            }
        }

        Ok(BlogPage {
            items: items.into_iter().skip(window.skip).take(params.per_page).collect(),
            total,
        })
    }

    async fn get_post(
        &self,
        kind: ContentKind,
        id: &str,
        embed: bool,
    ) -> Result<Option<RawRecord>> {
        let mut url = self.collection_url(kind)?;
        url.path_segments_mut()
            .map_err(|_| Error::InvalidConfig("blog url cannot be a base".to_string()))?
            .push(id);
        let mut request = self.client.get(url);
        if embed {
            request = request.query(&[("_embed", "1")]);
        }

        let response = self.authorized(request).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        match ensure_success(BACKEND, response).await?.json::<Value>().await? {
            Value::Object(map) => Ok(Some(map)),
            other => Err(Error::Backend {
                backend: BACKEND,
                status: 200,
                message: format!("expected a post object, got {}", other),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn config(vars: &[(&str, &str)]) -> WordPressConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        WordPressConfig::from_vars(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_collection_urls() {
        let blog = WordPressBlog::new(config(&[
            ("BLOG_API_URL", "https://blog.example.org/wp-json/"),
            ("BLOG_ROUTE_EVENTS", "/tribe_events/"),
        ]))
        .unwrap();

        assert_eq!(
            blog.collection_url(ContentKind::News).unwrap().as_str(),
            "https://blog.example.org/wp-json/wp/v2/posts"
        );
        assert_eq!(
            blog.collection_url(ContentKind::Events).unwrap().as_str(),
            "https://blog.example.org/wp-json/wp/v2/tribe_events"
        );
        assert!(blog.serves(ContentKind::News));
        assert!(!blog.serves(ContentKind::Organizations));
        assert!(blog.collection_url(ContentKind::Organizations).is_err());
    }

    #[test]
    fn test_news_route_can_be_disabled() {
        let config = config(&[
            ("BLOG_API_URL", "https://blog.example.org/wp-json"),
            ("BLOG_ROUTE_NEWS", ""),
        ]);
        assert!(!config.routes.contains_key(&ContentKind::News));
    }

    #[test]
    fn test_missing_url_is_not_configured() {
        assert!(matches!(
            WordPressBlog::new(config(&[])),
            Err(Error::NotConfigured(_))
        ));
    }

    #[test]
    fn test_total_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(total_from_headers(&headers), None);
        headers.insert("X-WP-Total", HeaderValue::from_static("57"));
        assert_eq!(total_from_headers(&headers), Some(57));
        headers.insert("X-WP-Total", HeaderValue::from_static("many"));
        assert_eq!(total_from_headers(&headers), None);
    }

    #[test]
    fn test_service_window() {
        assert_eq!(
            ServiceWindow::covering(150, 150),
            ServiceWindow { first_page: 2, pages: 2, skip: 50 }
        );
        assert_eq!(
            ServiceWindow::covering(0, 250),
            ServiceWindow { first_page: 1, pages: 3, skip: 0 }
        );
        assert_eq!(
            ServiceWindow::covering(300, 120),
            ServiceWindow { first_page: 4, pages: 2, skip: 0 }
        );
    }

    /// Serves `count` posts with ids `1..=count`, recording `(page, per_page)`.
    async fn serve_posts(count: usize) -> (String, Arc<Mutex<Vec<(usize, usize)>>>) {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let root = format!("http://{}/wp-json", listener.local_addr().unwrap());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();

        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else { return };
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let request = String::from_utf8_lossy(&request).to_string();
                let target = request.split_whitespace().nth(1).unwrap_or("/").to_string();
                let url = Url::parse(&format!("http://local{}", target)).unwrap();
                let param = |name: &str| {
                    url.query_pairs()
                        .find(|(k, _)| k == name)
                        .and_then(|(_, v)| v.parse::<usize>().ok())
                        .unwrap_or(0)
                };
                let (page, per_page) = (param("page"), param("per_page"));
                log.lock().unwrap().push((page, per_page));

                let start = (page - 1) * per_page;
                let (status, body) = if start >= count {
                    ("400 Bad Request", json!({ "code": INVALID_PAGE_CODE }).to_string())
                } else {
                    let ids: Vec<Value> = (start + 1..=(start + per_page).min(count))
                        .map(|id| json!({ "id": id, "status": "publish" }))
                        .collect();
                    ("200 OK", Value::Array(ids).to_string())
                };
                let response = format!(
                    "HTTP/1.1 {}\r\ncontent-type: application/json\r\nx-wp-total: {}\r\n\
                     content-length: {}\r\nconnection: close\r\n\r\n{}",
                    status,
                    count,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (root, seen)
    }

    fn ids(page: &BlogPage) -> Vec<u64> {
        page.items.iter().filter_map(|p| p.get("id").and_then(Value::as_u64)).collect()
    }

    fn list_params(page: usize, limit: usize) -> BlogListParams {
        let options = QueryOptions::default().with_status("all").with_page(page, limit);
        BlogListParams::from_options(&options).unwrap()
    }

    #[tokio::test]
    async fn test_wide_pages_are_windowed_over_service_pages() {
        let (root, seen) = serve_posts(320).await;
        let blog = WordPressBlog::new(config(&[("BLOG_API_URL", root.as_str())])).unwrap();
        let params = list_params(2, 150);

        let page = blog.list_posts(ContentKind::News, &params).await.unwrap();
        assert_eq!(ids(&page), (151..=300).collect::<Vec<u64>>());
        assert_eq!(page.total, Some(320));
        assert_eq!(*seen.lock().unwrap(), vec![(2, 100), (3, 100)]);
    }

    #[tokio::test]
    async fn test_wide_page_past_the_end_is_short() {
        let (root, _) = serve_posts(120).await;
        let blog = WordPressBlog::new(config(&[("BLOG_API_URL", root.as_str())])).unwrap();
        let params = list_params(1, 150);

        let page = blog.list_posts(ContentKind::News, &params).await.unwrap();
        assert_eq!(ids(&page), (1..=120).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn test_narrow_pages_and_zero_width() {
        let (root, seen) = serve_posts(30).await;
        let blog = WordPressBlog::new(config(&[("BLOG_API_URL", root.as_str())])).unwrap();
        let params = list_params(3, 10);

        let page = blog.list_posts(ContentKind::News, &params).await.unwrap();
        assert_eq!(ids(&page), (21..=30).collect::<Vec<u64>>());

        let empty = BlogListParams { per_page: 0, ..params };
        let page = blog.list_posts(ContentKind::News, &empty).await.unwrap();
        assert!(page.items.is_empty());
        assert_eq!(*seen.lock().unwrap(), vec![(3, 10)]);
    }
}
