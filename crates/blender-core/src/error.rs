use thiserror::Error;

use crate::types::BackendId;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Backend {backend} missing support for {capability}")]
    MissingCapability {
        backend: BackendId,
        capability: &'static str,
    },

    #[error("Query parse error in {backend}: {message}")]
    QueryParse { backend: BackendId, message: String },

    #[error("Search in {backend} failed: {message}")]
    Transport { backend: BackendId, message: String },

    #[error("Not found: {0}")]
    NotFound(String),
}

impl Error {
    pub fn query_parse(backend: impl Into<BackendId>, message: impl Into<String>) -> Self {
        Self::QueryParse { backend: backend.into(), message: message.into() }
    }

    pub fn transport(backend: impl Into<BackendId>, message: impl Into<String>) -> Self {
        Self::Transport { backend: backend.into(), message: message.into() }
    }

    /// Query-parse failures are the only errors worth one sanitize-and-retry
    /// cycle; everything else propagates as-is.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::QueryParse { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
