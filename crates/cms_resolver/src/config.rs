use cms_core::{ContentMode, Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_WORKSPACE_BATCH: usize = 200;

/// What `get` returns once every live backend failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingItemPolicy {
    /// `item: null` attributed to the relational store.
    #[default]
    None,
    /// Look the id up among the built-in placeholder records.
    Placeholder,
}

impl FromStr for MissingItemPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "" | "none" | "null" => Ok(MissingItemPolicy::None),
            "placeholder" | "static" => Ok(MissingItemPolicy::Placeholder),
            other => Err(Error::InvalidConfig(format!("unknown missing-item policy `{}`", other))),
        }
    }
}

/// Upper bound per backend call. `None` leaves it to the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BackendTimeouts {
    pub blog: Option<Duration>,
    pub workspace: Option<Duration>,
    pub relational: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverConfig {
    /// How many workspace records are fetched before local filtering.
    pub workspace_batch: usize,
    pub timeouts: BackendTimeouts,
    pub missing_item: MissingItemPolicy,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            workspace_batch: DEFAULT_WORKSPACE_BATCH,
            timeouts: BackendTimeouts::default(),
            missing_item: MissingItemPolicy::default(),
        }
    }
}

fn seconds(var: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<Duration>> {
    let value = var(name);
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => raw
            .parse::<f64>()
            .ok()
            .filter(|secs| *secs > 0.0)
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .map(Some)
            .ok_or_else(|| {
                Error::InvalidConfig(format!(
                    "{} must be a positive number of seconds, got `{}`",
                    name, raw
                ))
            }),
    }
}

impl ResolverConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let workspace_batch = match var("RESOLVER_WORKSPACE_BATCH") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or_else(|| {
                    Error::InvalidConfig(format!(
                        "RESOLVER_WORKSPACE_BATCH must be a positive integer, got `{}`",
                        raw
                    ))
                })?,
            None => DEFAULT_WORKSPACE_BATCH,
        };

        Ok(Self {
            workspace_batch,
            timeouts: BackendTimeouts {
                blog: seconds(&var, "RESOLVER_BLOG_TIMEOUT_SECS")?,
                workspace: seconds(&var, "RESOLVER_WORKSPACE_TIMEOUT_SECS")?,
                relational: seconds(&var, "RESOLVER_RELATIONAL_TIMEOUT_SECS")?,
            },
            missing_item: var("RESOLVER_MISSING_ITEM")
                .map(|raw| raw.parse())
                .transpose()?
                .unwrap_or_default(),
        })
    }
}

/// Everything a single call needs to know: the active mode and the
/// resolver settings. Callers may build one per request to override both.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResolveContext {
    pub mode: ContentMode,
    pub config: ResolverConfig,
}

impl ResolveContext {
    pub fn new(mode: ContentMode, config: ResolverConfig) -> Self {
        Self { mode, config }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from(vars: &[(&str, &str)]) -> Result<ResolverConfig> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        ResolverConfig::from_vars(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = from(&[]).unwrap();
        assert_eq!(config, ResolverConfig::default());
        assert_eq!(config.workspace_batch, 200);
        assert_eq!(config.timeouts, BackendTimeouts::default());
        assert_eq!(config.missing_item, MissingItemPolicy::None);
    }

    #[test]
    fn test_overrides() {
        let config = from(&[
            ("RESOLVER_WORKSPACE_BATCH", "50"),
            ("RESOLVER_BLOG_TIMEOUT_SECS", "2.5"),
            ("RESOLVER_RELATIONAL_TIMEOUT_SECS", "10"),
            ("RESOLVER_MISSING_ITEM", "Placeholder"),
        ])
        .unwrap();
        assert_eq!(config.workspace_batch, 50);
        assert_eq!(config.timeouts.blog, Some(Duration::from_millis(2500)));
        assert_eq!(config.timeouts.workspace, None);
        assert_eq!(config.timeouts.relational, Some(Duration::from_secs(10)));
        assert_eq!(config.missing_item, MissingItemPolicy::Placeholder);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(from(&[("RESOLVER_WORKSPACE_BATCH", "0")]).is_err());
        assert!(from(&[("RESOLVER_BLOG_TIMEOUT_SECS", "-1")]).is_err());
        assert!(from(&[("RESOLVER_WORKSPACE_TIMEOUT_SECS", "soon")]).is_err());
        assert!(from(&[("RESOLVER_MISSING_ITEM", "synthesize")]).is_err());
    }

    #[test]
    fn test_out_of_range_timeouts_are_rejected() {
        for raw in ["1e300", "inf", "NaN", "0"] {
            let err = from(&[("RESOLVER_RELATIONAL_TIMEOUT_SECS", raw)]).unwrap_err();
            assert!(matches!(err, Error::InvalidConfig(_)), "{}", raw);
        }
        let config = from(&[("RESOLVER_WORKSPACE_TIMEOUT_SECS", "86400")]).unwrap();
        assert_eq!(config.timeouts.workspace, Some(Duration::from_secs(86_400)));
    }
}
