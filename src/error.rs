//! Top-level error types for the bridge.

use std::sync::Arc;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error enum wrapping domain-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error(transparent)]
    Executor(#[from] ExecutorError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load config from {path}: {source}")]
    Load {
        path: String,
        source: Arc<std::io::Error>,
    },

    #[error("failed to parse config {path}: {message}")]
    Parse { path: String, message: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors raised by the chat platform transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to parse inbound activity: {0}")]
    Parse(String),

    #[error("connector request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("connector returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// File upload handshake errors.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("failed to decode {field}: {source}")]
    Decode {
        field: &'static str,
        source: serde_json::Error,
    },

    #[error("invalid upload url: {0}")]
    InvalidUrl(String),

    #[error("failed to upload file: {0}")]
    Request(#[from] reqwest::Error),

    #[error("failed to upload file with status {0}")]
    Status(u16),
}

/// Command execution errors.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
