use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{backend} responded with {status}: {message}")]
    Backend {
        backend: &'static str,
        status: u16,
        message: String,
    },

    #[error("{backend} did not answer within {after:?}")]
    Timeout {
        backend: &'static str,
        after: Duration,
    },

    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown content kind: {0}")]
    UnknownContentKind(String),

    #[error("External error: {0}")]
    External(#[from] anyhow::Error),
}
