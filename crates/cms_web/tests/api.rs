//! Router-level tests driven through `tower::ServiceExt::oneshot`, no sockets.

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use cms_core::{ContentKind, ContentRecord, ContentStatus, FixedMode};
use cms_core::ContentMode;
use cms_resolver::ContentResolver;
use cms_storage::{MemoryBlog, MemoryStorage};
use cms_web::{create_app, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt as _;

const BODY_LIMIT: usize = 1024 * 1024;

fn record(id: &str, day: i64, status: ContentStatus) -> ContentRecord {
    let at = chrono_at(day);
    ContentRecord {
        id: id.to_string(),
        title: format!("Story {}", id),
        content: "Body".to_string(),
        excerpt: String::new(),
        category: Some("General".to_string()),
        status,
        tags: vec!["budget".to_string()],
        featured_image: None,
        published_at: Some(at),
        created_at: at,
        updated_at: at,
        view_count: 0,
    }
}

fn chrono_at(day: i64) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::<chrono::Utc>::from_timestamp(1_710_000_000 + day * 86_400, 0).unwrap()
}

async fn app() -> Router {
    let store = MemoryStorage::new();
    store.store_record(ContentKind::News, record("n1", 1, ContentStatus::Published)).await;
    store.store_record(ContentKind::News, record("n2", 2, ContentStatus::Published)).await;
    store.store_record(ContentKind::News, record("n3", 3, ContentStatus::Draft)).await;

    let post = match json!({
        "id": 77,
        "title": {"rendered": "From the blog"},
        "status": "publish",
        "date_gmt": "2024-06-01T12:00:00"
    }) {
        Value::Object(map) => map,
        _ => unreachable!(),
    };

    let resolver = ContentResolver::new(Arc::new(store))
        .with_blog(Arc::new(MemoryBlog::new().with_post(ContentKind::News, post)))
        .with_mode_resolver(Arc::new(FixedMode(ContentMode::Default)));
    create_app(AppState::new(resolver)).await
}

async fn send(uri: &str) -> (StatusCode, Vec<u8>) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    let resp = app().await.oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    (status, bytes)
}

async fn send_json(uri: &str) -> (StatusCode, Value) {
    let (status, bytes) = send(uri).await;
    (status, serde_json::from_slice(&bytes).expect("json body"))
}

#[tokio::test]
async fn health_returns_ok() {
    let (status, bytes) = send("/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(String::from_utf8(bytes).unwrap(), "ok");
}

#[tokio::test]
async fn list_defaults_to_published_relational_records() {
    let (status, body) = send_json("/api/news").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "relational");
    assert_eq!(body["total"], 2);
    assert_eq!(body["items"][0]["id"], "n2");
    assert_eq!(body["items"][0]["status"], "published");
}

#[tokio::test]
async fn list_passes_query_options() {
    let (_, body) = send_json("/api/news?status=all&page=2&limit=2").await;
    assert_eq!(body["total"], 3);
    assert_eq!(body["items"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["items"][0]["id"], "n1");
}

#[tokio::test]
async fn list_mode_override_reaches_the_blog() {
    let (status, body) = send_json("/api/news?mode=blog").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "blog_service");
    assert_eq!(body["items"][0]["id"], "77");
}

#[tokio::test]
async fn invalid_mode_is_a_bad_request() {
    let (status, body) = send_json("/api/news?mode=sideways").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn unknown_kind_is_not_found() {
    let (status, body) = send_json("/api/recipes").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap_or_default().contains("recipes"));
}

#[tokio::test]
async fn get_returns_item() {
    let (status, body) = send_json("/api/news/n1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "relational");
    assert_eq!(body["item"]["title"], "Story n1");
}

#[tokio::test]
async fn get_missing_item_is_404_with_result_body() {
    let (status, body) = send_json("/api/news/missing-id").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["item"], Value::Null);
    assert_eq!(body["source"], "relational");
}
