use async_trait::async_trait;
use std::env;

use crate::types::ContentMode;
use crate::Result;

pub const CONTENT_MODE_VAR: &str = "CONTENT_MODE";

/// Answers which backend is preferred for the current deployment.
/// Consulted once per list/get call.
#[async_trait]
pub trait ModeResolver: Send + Sync {
    async fn active_mode(&self) -> Result<ContentMode>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FixedMode(pub ContentMode);

#[async_trait]
impl ModeResolver for FixedMode {
    async fn active_mode(&self) -> Result<ContentMode> {
        Ok(self.0)
    }
}

/// Reads the mode from an environment variable on every call, so a
/// deployment can flip it without a restart of long-lived workers.
#[derive(Debug, Clone)]
pub struct EnvMode {
    var: String,
}

impl EnvMode {
    pub fn new() -> Self {
        Self::with_var(CONTENT_MODE_VAR)
    }

    pub fn with_var(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvMode {
    fn default() -> Self {
        Self::new()
    }
}

/// Unset means `Default`; anything unparseable is a configuration error.
pub fn parse_mode_value(value: Option<&str>) -> Result<ContentMode> {
    match value {
        Some(value) => value.parse(),
        None => Ok(ContentMode::Default),
    }
}

#[async_trait]
impl ModeResolver for EnvMode {
    async fn active_mode(&self) -> Result<ContentMode> {
        parse_mode_value(env::var(&self.var).ok().as_deref())
    }
}
