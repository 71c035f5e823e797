pub mod cascade;
pub mod config;
pub mod resolver;

pub use cascade::{Outcome, Resolution, Step};
pub use config::{BackendTimeouts, MissingItemPolicy, ResolveContext, ResolverConfig};
pub use resolver::ContentResolver;

pub mod prelude {
    pub use super::{ContentResolver, MissingItemPolicy, ResolveContext, ResolverConfig};
    pub use cms_core::prelude::*;
}
