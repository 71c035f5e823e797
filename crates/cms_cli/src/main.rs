use anyhow::{bail, Context};
use clap::Parser;
use cms_core::normalize::normalize_relational;
use cms_core::prelude::*;
use cms_core::{EnvMode, ModeResolver};
use cms_resolver::{ContentResolver, ResolveContext, ResolverConfig};
use cms_storage::{
    create_primary, NotionConfig, NotionDatabase, SQLiteStorage, SqliteConfig, StorageBackend,
    WordPressBlog,
};
use cms_web::AppState;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HumanDuration(Duration);

impl FromStr for HumanDuration {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut total_millis = 0u64;
        let mut current_number = String::new();
        let mut has_unit = false;
        let mut chars = s.chars().peekable();

        while let Some(c) = chars.next() {
            if c.is_ascii_digit() {
                current_number.push(c);
            } else if let Ok(num) = current_number.parse::<u64>() {
                let factor = match c {
                    'm' if chars.peek() == Some(&'s') => {
                        chars.next();
                        1
                    }
                    's' => 1_000,
                    'm' => 60_000,
                    'h' => 3_600_000,
                    _ => return Err(format!("Invalid duration unit: {}", c)),
                };
                total_millis += num * factor;
                current_number.clear();
                has_unit = true;
            } else if !c.is_whitespace() {
                return Err(format!("Invalid character in duration: {}", c));
            }
        }

        // A bare number is seconds.
        if !current_number.is_empty() {
            let num = current_number
                .parse::<u64>()
                .map_err(|_| "Invalid number in duration".to_string())?;
            total_millis += num * 1_000;
            has_unit = true;
        }

        if !has_unit {
            return Err("Duration must include a number".to_string());
        }

        Ok(HumanDuration(Duration::from_millis(total_millis)))
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Content resolution service for the site", long_about = None)]
pub struct Cli {
    /// Primary store: `sqlite` or `memory`.
    #[arg(long, env = "SITE_STORAGE", default_value = "sqlite")]
    storage: String,
    #[arg(long, env = "SITE_DB_PATH")]
    db_path: Option<PathBuf>,
    /// Per-call limit for the blog service (e.g. 3s, 500ms).
    #[arg(long)]
    blog_timeout: Option<HumanDuration>,
    #[arg(long)]
    workspace_timeout: Option<HumanDuration>,
    #[arg(long)]
    relational_timeout: Option<HumanDuration>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Serve the JSON API.
    Serve {
        #[arg(long, env = "SITE_ADDR", default_value = "0.0.0.0:3000")]
        addr: String,
    },
    /// Resolve a listing and print it as JSON.
    List {
        kind: ContentKind,
        #[arg(long, default_value_t = 1)]
        page: usize,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long, default_value = "published")]
        status: String,
        #[arg(long, default_value = "all")]
        category: String,
        #[arg(long)]
        search: Option<String>,
        /// Use this mode instead of the configured one.
        #[arg(long)]
        mode: Option<ContentMode>,
    },
    /// Resolve a single record and print it as JSON.
    Get {
        kind: ContentKind,
        id: String,
        #[arg(long)]
        mode: Option<ContentMode>,
    },
    /// Create the SQLite schema.
    Migrate,
    /// Load records from a JSON array file into the SQLite store.
    Seed { kind: ContentKind, file: PathBuf },
    /// Show the stored content mode, or set it.
    Mode { value: Option<ContentMode> },
}

impl Cli {
    fn resolver_config(&self) -> Result<ResolverConfig> {
        let mut config = ResolverConfig::from_env()?;
        if let Some(HumanDuration(limit)) = self.blog_timeout {
            config.timeouts.blog = Some(limit);
        }
        if let Some(HumanDuration(limit)) = self.workspace_timeout {
            config.timeouts.workspace = Some(limit);
        }
        if let Some(HumanDuration(limit)) = self.relational_timeout {
            config.timeouts.relational = Some(limit);
        }
        Ok(config)
    }

    fn sqlite_path(&self) -> PathBuf {
        self.db_path.clone().unwrap_or_else(|| SqliteConfig::new().db_path)
    }
}

async fn build_resolver(cli: &Cli) -> anyhow::Result<ContentResolver> {
    let location = cli.db_path.as_ref().map(|p| p.to_string_lossy().into_owned());
    let primary = create_primary(&cli.storage, location.as_deref()).await?;
    info!("💾 Primary store ready (using {})", cli.storage);

    // An explicit CONTENT_MODE wins over the stored setting.
    let mode_pinned = std::env::var_os(cms_core::modes::CONTENT_MODE_VAR).is_some();
    let modes: Arc<dyn ModeResolver> = if mode_pinned {
        Arc::new(EnvMode::new())
    } else {
        primary.modes
    };

    let mut resolver = ContentResolver::new(primary.relational)
        .with_mode_resolver(modes)
        .with_config(cli.resolver_config()?);

    let notion = NotionConfig::new();
    if !notion.databases.is_empty() {
        let kinds: Vec<&str> = notion.databases.keys().map(ContentKind::as_str).collect();
        match NotionDatabase::new(notion) {
            Ok(workspace) => {
                info!("🗂️ Workspace database enabled for {}", kinds.join(", "));
                resolver = resolver.with_workspace(Arc::new(workspace));
            }
            Err(e) => warn!(error = %e, "workspace database disabled"),
        }
    }

    match WordPressBlog::from_env().await {
        Ok(blog) => {
            info!("📰 Blog service configured");
            resolver = resolver.with_blog(Arc::new(blog));
        }
        Err(Error::NotConfigured(_)) => {}
        Err(e) => warn!(error = %e, "blog service disabled"),
    }

    Ok(resolver)
}

async fn open_sqlite(cli: &Cli) -> anyhow::Result<SQLiteStorage> {
    if cli.storage != "sqlite" {
        bail!("this command needs --storage sqlite, got `{}`", cli.storage);
    }
    let path = cli.sqlite_path();
    SQLiteStorage::new_with_path(&path)
        .await
        .with_context(|| format!("{} ({})", SQLiteStorage::get_error_message(), path.display()))
}

/// Reads a JSON array of rows, normalizing each one. Rows without an id get a fresh one.
fn load_seed_file(path: &Path) -> anyhow::Result<Vec<ContentRecord>> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let rows: Vec<Value> =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
    rows.into_iter()
        .map(|row| match row {
            Value::Object(raw) => {
                let mut record = normalize_relational(&raw);
                if record.id.is_empty() {
                    record.id = uuid::Uuid::new_v4().to_string();
                }
                Ok(record)
            }
            other => bail!("expected an object in {}, got {}", path.display(), other),
        })
        .collect()
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    match &cli.command {
        Commands::Serve { addr } => {
            let resolver = build_resolver(&cli).await?;
            cms_web::serve(AppState::new(resolver), addr).await?;
        }
        Commands::List {
            kind,
            page,
            limit,
            status,
            category,
            search,
            mode,
        } => {
            let resolver = build_resolver(&cli).await?;
            let mut ctx: ResolveContext = resolver.context().await;
            if let Some(mode) = mode {
                ctx.mode = *mode;
            }
            let options = QueryOptions {
                page: *page,
                limit: *limit,
                status: status.clone(),
                category: category.clone(),
                search: search.clone(),
            };
            print_json(&resolver.list_in(&ctx, *kind, &options).await)?;
        }
        Commands::Get { kind, id, mode } => {
            let resolver = build_resolver(&cli).await?;
            let mut ctx = resolver.context().await;
            if let Some(mode) = mode {
                ctx.mode = *mode;
            }
            print_json(&resolver.get_in(&ctx, *kind, id).await)?;
        }
        Commands::Migrate => {
            let store = open_sqlite(&cli).await?;
            info!("✨ Schema ready at {}", store.get_db_path().display());
        }
        Commands::Seed { kind, file } => {
            let store = open_sqlite(&cli).await?;
            let records = load_seed_file(file)?;
            for record in &records {
                store.store_record(*kind, record).await?;
            }
            info!("🌱 Stored {} {} records", records.len(), kind);
        }
        Commands::Mode { value } => {
            let store = open_sqlite(&cli).await?;
            if let Some(mode) = value {
                store.set_mode(*mode).await?;
            }
            println!("{}", store.active_mode().await?);
        }
    }

    Ok(())
}
