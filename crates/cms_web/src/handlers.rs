use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use cms_core::prelude::*;
use cms_resolver::ResolveContext;
use serde::Deserialize;
use std::result::Result;
use std::sync::Arc;

use crate::{ApiError, AppState};

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<usize>,
    pub limit: Option<usize>,
    pub status: Option<String>,
    pub category: Option<String>,
    pub search: Option<String>,
    pub mode: Option<String>,
}

impl ListParams {
    pub fn options(&self) -> QueryOptions {
        let defaults = QueryOptions::default();
        QueryOptions {
            page: self.page.unwrap_or(defaults.page),
            limit: self.limit.unwrap_or(defaults.limit),
            status: self.status.clone().unwrap_or(defaults.status),
            category: self.category.clone().unwrap_or(defaults.category),
            search: self.search.clone(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ItemParams {
    pub mode: Option<String>,
}

fn parse_kind(kind: &str) -> Result<ContentKind, ApiError> {
    kind.parse().map_err(|_| ApiError::UnknownKind(kind.to_string()))
}

/// Reads the active mode unless the request names one.
async fn context(state: &AppState, mode: Option<&str>) -> Result<ResolveContext, ApiError> {
    let mut ctx = state.resolver.context().await;
    if let Some(mode) = mode {
        ctx.mode = mode.parse().map_err(|e: Error| ApiError::BadRequest(e.to_string()))?;
    }
    Ok(ctx)
}

pub async fn health() -> &'static str {
    "ok"
}

pub async fn list_content(
    State(state): State<Arc<AppState>>,
    Path(kind): Path<String>,
    Query(params): Query<ListParams>,
) -> Result<Json<QueryResult>, ApiError> {
    let kind = parse_kind(&kind)?;
    let ctx = context(&state, params.mode.as_deref()).await?;
    Ok(Json(state.resolver.list_in(&ctx, kind, &params.options()).await))
}

pub async fn get_content(
    State(state): State<Arc<AppState>>,
    Path((kind, id)): Path<(String, String)>,
    Query(params): Query<ItemParams>,
) -> Result<Response, ApiError> {
    let kind = parse_kind(&kind)?;
    let ctx = context(&state, params.mode.as_deref()).await?;
    let result = state.resolver.get_in(&ctx, kind, &id).await;
    let status = if result.item.is_some() {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    };
    Ok((status, Json(result)).into_response())
}
