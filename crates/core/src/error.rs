//! Core error types for the Streamarr domain

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StreamarrError {
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("API key rejected")]
    Unauthorized,

    #[error("Service busy: {operation}")]
    ServiceBusy { operation: String },

    #[error("Provider '{service}' transient failure: {error}")]
    ProviderTransient { service: String, error: String },

    #[error("Provider '{service}' client error: HTTP {status}")]
    ProviderClientError { service: String, status: u16 },

    #[error("No playable file found in torrent")]
    NoFileInTorrent,

    #[error("Operation timed out: {operation}")]
    Timeout { operation: String },

    #[error("Cache error: {message}")]
    CacheError { message: String },

    #[error("Database error: {message}")]
    DatabaseError { message: String },

    #[error("Configuration error: {field} - {message}")]
    ConfigurationError { field: String, message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

pub type Result<T> = std::result::Result<T, StreamarrError>;

impl StreamarrError {
    /// Transient provider failures are isolated by the pipeline: they
    /// reduce the result set but never abort a search.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StreamarrError::ProviderTransient { .. }
                | StreamarrError::Timeout { .. }
                | StreamarrError::CacheError { .. }
        )
    }
}
