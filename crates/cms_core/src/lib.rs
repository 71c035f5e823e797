pub mod error;
pub mod modes;
pub mod normalize;
pub mod placeholder;
pub mod query;
pub mod source;
pub mod types;

pub use error::Error;
pub use modes::{EnvMode, FixedMode, ModeResolver};
pub use source::{BlogService, RelationalStore, WorkspaceDatabase};
pub use types::*;

pub type Result<T> = std::result::Result<T, Error>;

pub mod prelude {
    pub use crate::source::{BlogListParams, BlogPage, RelationalPage, RelationalQuery};
    pub use crate::types::{
        ContentKind, ContentMode, ContentRecord, ContentStatus, ItemResult, QueryOptions,
        QueryResult, RawRecord, SourceKind,
    };
    pub use crate::{Error, Result};
}
