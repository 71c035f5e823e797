pub mod memory;
pub mod notion;
pub mod wordpress;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory::{MemoryBlog, MemoryStorage, MemoryWorkspace};
pub use notion::{NotionConfig, NotionDatabase};
pub use wordpress::{WordPressBlog, WordPressConfig};

#[cfg(feature = "sqlite")]
pub use sqlite::{SQLiteStorage, SqliteConfig};
