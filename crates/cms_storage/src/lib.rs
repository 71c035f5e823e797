use async_trait::async_trait;
use cms_core::{Error, ModeResolver, RelationalStore, Result};
use std::fmt::Debug;
use std::sync::Arc;

pub mod backends;

pub use backends::*;

#[async_trait]
pub trait StorageBackend: Send + Sync {
    fn get_error_message() -> &'static str;
    async fn from_env() -> Result<Self>
    where
        Self: Sized;
}

pub trait BackendConfig: Debug {
    fn get_url(&self) -> String;
    fn with_url(&mut self, url: &str);
}

/// Turns a non-2xx response into [`Error::Backend`] carrying the body.
pub(crate) async fn ensure_success(
    backend: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status().as_u16();
    let message = response.text().await.unwrap_or_default();
    Err(Error::Backend {
        backend,
        status,
        message,
    })
}

/// The system of record and the mode switch it stores.
#[derive(Clone)]
pub struct PrimaryStore {
    pub relational: Arc<dyn RelationalStore>,
    pub modes: Arc<dyn ModeResolver>,
}

impl PrimaryStore {
    pub fn from_backend<T>(backend: T) -> Self
    where
        T: RelationalStore + ModeResolver + 'static,
    {
        let backend = Arc::new(backend);
        Self {
            relational: backend.clone(),
            modes: backend,
        }
    }
}

/// Opens the primary store named on the command line (`memory` or `sqlite`).
/// `location` overrides the backend's own default (a database path for SQLite).
pub async fn create_primary(storage: &str, location: Option<&str>) -> Result<PrimaryStore> {
    match storage {
        "memory" => Ok(PrimaryStore::from_backend(MemoryStorage::from_env().await?)),
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            let mut config = SqliteConfig::new();
            if let Some(location) = location {
                config.with_url(location);
            }
            let backend = SQLiteStorage::new_with_path(&config.db_path).await.map_err(|e| {
                Error::Database(format!("{} ({})", e, SQLiteStorage::get_error_message()))
            })?;
            Ok(PrimaryStore::from_backend(backend))
        }
        other => {
            let _ = location;
            Err(Error::InvalidConfig(format!("unsupported storage backend `{}`", other)))
        }
    }
}

pub mod prelude {
    pub use super::backends::*;
    pub use super::{create_primary, BackendConfig, PrimaryStore, StorageBackend};
}
