use cms_resolver::ContentResolver;
use std::sync::Arc;

pub struct AppState {
    pub resolver: Arc<ContentResolver>,
}

impl AppState {
    pub fn new(resolver: ContentResolver) -> Self {
        Self {
            resolver: Arc::new(resolver),
        }
    }
}
