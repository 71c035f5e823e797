use cms_core::normalize::{normalize_blog, normalize_relational, normalize_workspace};
use cms_core::placeholder::{placeholder, placeholders};
use cms_core::prelude::*;
use cms_core::query::apply_query;
use cms_core::{BlogService, FixedMode, ModeResolver, RelationalStore, WorkspaceDatabase};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::cascade::{self, Outcome, Participation, Resolution, Step};
use crate::config::{ResolveContext, ResolverConfig};

/// Answers list and get-by-id requests by walking the backend cascade.
#[derive(Clone)]
pub struct ContentResolver {
    relational: Arc<dyn RelationalStore>,
    workspace: Option<Arc<dyn WorkspaceDatabase>>,
    blog: Option<Arc<dyn BlogService>>,
    modes: Arc<dyn ModeResolver>,
    config: ResolverConfig,
}

async fn bounded<T, F>(backend: &'static str, limit: Option<Duration>, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match limit {
        Some(after) => tokio::time::timeout(after, call)
            .await
            .map_err(|_| Error::Timeout { backend, after })?,
        None => call.await,
    }
}

fn from_result<T>(result: Result<T>) -> Outcome<T> {
    match result {
        Ok(value) => Outcome::Hit(value),
        Err(e) => Outcome::Failed(e),
    }
}

impl ContentResolver {
    pub fn new(relational: Arc<dyn RelationalStore>) -> Self {
        Self {
            relational,
            workspace: None,
            blog: None,
            modes: Arc::new(FixedMode(ContentMode::Default)),
            config: ResolverConfig::default(),
        }
    }

    pub fn with_workspace(mut self, workspace: Arc<dyn WorkspaceDatabase>) -> Self {
        self.workspace = Some(workspace);
        self
    }

    pub fn with_blog(mut self, blog: Arc<dyn BlogService>) -> Self {
        self.blog = Some(blog);
        self
    }

    pub fn with_mode_resolver(mut self, modes: Arc<dyn ModeResolver>) -> Self {
        self.modes = modes;
        self
    }

    pub fn with_config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// The active mode. A failing mode source means `Default`.
    pub async fn active_mode(&self) -> ContentMode {
        match self.modes.active_mode().await {
            Ok(mode) => mode,
            Err(e) => {
                warn!(error = %e, "could not read content mode, using default");
                ContentMode::Default
            }
        }
    }

    /// Context for one call: the mode read now plus the resolver settings.
    pub async fn context(&self) -> ResolveContext {
        ResolveContext::new(self.active_mode().await, self.config.clone())
    }

    fn participation(&self, mode: ContentMode, kind: ContentKind) -> Participation {
        Participation {
            mode,
            blog_serves_kind: self.blog.as_ref().is_some_and(|blog| blog.serves(kind)),
            workspace_enabled: self.workspace.as_ref().is_some_and(|ws| ws.is_enabled(kind)),
        }
    }

    pub async fn list(&self, kind: ContentKind, options: &QueryOptions) -> QueryResult {
        let ctx = self.context().await;
        self.list_in(&ctx, kind, options).await
    }

    pub async fn get(&self, kind: ContentKind, id: &str) -> ItemResult {
        let ctx = self.context().await;
        self.get_in(&ctx, kind, id).await
    }

    pub async fn list_news(&self, options: &QueryOptions) -> QueryResult {
        self.list(ContentKind::News, options).await
    }

    pub async fn get_news_by_id(&self, id: &str) -> ItemResult {
        self.get(ContentKind::News, id).await
    }

    /// Lists with an explicit context instead of consulting the mode resolver.
    pub async fn list_in(
        &self,
        ctx: &ResolveContext,
        kind: ContentKind,
        options: &QueryOptions,
    ) -> QueryResult {
        let plan = self.participation(ctx.mode, kind).list_plan();
        let resolution =
            cascade::run(kind, &plan, |step| self.list_step(ctx, kind, options, step)).await;
        match resolution {
            Resolution::Answered { value, .. } => value,
            Resolution::Empty { .. } | Resolution::Exhausted => static_list(kind, options),
        }
    }

    pub async fn get_in(&self, ctx: &ResolveContext, kind: ContentKind, id: &str) -> ItemResult {
        let plan = self.participation(ctx.mode, kind).get_plan(ctx.config.missing_item);
        let resolution = cascade::run(kind, &plan, |step| self.get_step(ctx, kind, id, step)).await;
        match resolution {
            Resolution::Answered { value, .. } => value,
            Resolution::Empty { step } => ItemResult {
                item: None,
                source: step.source(),
                raw: None,
            },
            Resolution::Exhausted => {
                info!(kind = %kind, id, "every backend failed, answering with no item");
                ItemResult {
                    item: None,
                    source: SourceKind::Relational,
                    raw: None,
                }
            }
        }
    }

    async fn list_step(
        &self,
        ctx: &ResolveContext,
        kind: ContentKind,
        options: &QueryOptions,
        step: Step,
    ) -> Outcome<QueryResult> {
        let timeouts = &ctx.config.timeouts;
        match step {
            Step::BlogService => {
                let Some(blog) = &self.blog else { return Outcome::Miss };
                let Some(params) = BlogListParams::from_options(options) else {
                    return Outcome::Hit(QueryResult {
                        items: Vec::new(),
                        total: 0,
                        source: SourceKind::BlogService,
                    });
                };
                let fetch = blog.list_posts(kind, &params);
                from_result(bounded("blog service", timeouts.blog, fetch).await.map(|page| {
                    let total = page.total.unwrap_or(page.items.len());
                    // Services may ignore the page size they were asked for.
                    let posts = page.items.iter().take(options.limit);
                    QueryResult {
                        items: posts.map(normalize_blog).collect(),
                        total,
                        source: SourceKind::BlogService,
                    }
                }))
            }
            Step::WorkspaceDatabase => {
                let Some(workspace) = &self.workspace else { return Outcome::Miss };
                let fetch = workspace.query(kind, None, None, ctx.config.workspace_batch);
                let fetched = bounded("workspace database", timeouts.workspace, fetch).await;
                from_result(fetched.map(|pages| {
                    let records = pages.iter().map(normalize_workspace).collect();
                    let (items, total) = apply_query(records, options);
                    QueryResult {
                        items,
                        total,
                        source: SourceKind::WorkspaceDatabase,
                    }
                }))
            }
            Step::Relational => {
                let query = RelationalQuery::from_options(options);
                let fetch = self.relational.query(kind, &query);
                let fetched = bounded("relational store", timeouts.relational, fetch).await;
                from_result(fetched.map(|page| QueryResult {
                    items: page.rows.iter().map(normalize_relational).collect(),
                    total: page.total,
                    source: SourceKind::Relational,
                }))
            }
            Step::StaticFallback => Outcome::Hit(static_list(kind, options)),
        }
    }

    async fn get_step(
        &self,
        ctx: &ResolveContext,
        kind: ContentKind,
        id: &str,
        step: Step,
    ) -> Outcome<ItemResult> {
        let timeouts = &ctx.config.timeouts;
        match step {
            Step::BlogService => {
                let Some(blog) = &self.blog else { return Outcome::Miss };
                let fetch = blog.get_post(kind, id, true);
                match bounded("blog service", timeouts.blog, fetch).await {
                    Ok(Some(post)) => Outcome::Hit(ItemResult {
                        item: Some(normalize_blog(&post)),
                        source: SourceKind::BlogService,
                        raw: Some(Value::Object(post)),
                    }),
                    Ok(None) => Outcome::Miss,
                    Err(e) => Outcome::Failed(e),
                }
            }
            Step::WorkspaceDatabase => {
                let Some(workspace) = &self.workspace else { return Outcome::Miss };
                let fetch = workspace.get(kind, id);
                match bounded("workspace database", timeouts.workspace, fetch).await {
                    Ok(Some(page)) => Outcome::Hit(ItemResult {
                        item: Some(normalize_workspace(&page)),
                        source: SourceKind::WorkspaceDatabase,
                        raw: None,
                    }),
                    Ok(None) => Outcome::Miss,
                    Err(e) => Outcome::Failed(e),
                }
            }
            Step::Relational => {
                let fetch = self.relational.get(kind, id);
                match bounded("relational store", timeouts.relational, fetch).await {
                    Ok(Some(row)) => Outcome::Hit(ItemResult {
                        item: Some(normalize_relational(&row)),
                        source: SourceKind::Relational,
                        raw: None,
                    }),
                    Ok(None) => Outcome::AuthoritativeEmpty,
                    Err(e) => Outcome::Failed(e),
                }
            }
            Step::StaticFallback => match placeholder(kind, id) {
                Some(record) => Outcome::Hit(ItemResult {
                    item: Some(record),
                    source: SourceKind::StaticFallback,
                    raw: None,
                }),
                None => Outcome::AuthoritativeEmpty,
            },
        }
    }
}

fn static_list(kind: ContentKind, options: &QueryOptions) -> QueryResult {
    let (items, total) = apply_query(placeholders(kind), options);
    QueryResult {
        items,
        total,
        source: SourceKind::StaticFallback,
    }
}
