//! Error types for the core library.

use std::path::PathBuf;

use thiserror::Error;

/// Core library error type.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A configuration-related error.
    #[error("configuration error: {0}")]
    Config(String),

    /// A path resolution or validation error.
    #[error("path error: {0}")]
    Path(String),

    /// An I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Writing an export artifact failed.
    #[error("writing {}: {source}", path.display())]
    Export {
        /// Artifact that could not be written.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// A serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The archive could not be reached (connection failure or timeout).
    #[error("network error: {0}")]
    Network(String),

    /// The archive answered with an error status or an unexpected body.
    #[error("API error: {0}")]
    Api(String),

    /// The archive returned no result for a lookup.
    #[error("not found: {0}")]
    NotFound(String),

    /// Exporting one channel failed.
    #[error("channel '{channel}': {source}")]
    Channel {
        /// Name of the failing channel.
        channel: String,
        /// What went wrong.
        #[source]
        source: Box<CoreError>,
    },

    /// A generic error for other cases.
    #[error("error: {0}")]
    Other(String),
}

impl CoreError {
    /// Whether retrying the same request may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_))
    }
}

/// Result type alias using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_network_errors_are_retryable() {
        assert!(CoreError::Network("timed out".to_string()).is_retryable());
        assert!(!CoreError::Api("500".to_string()).is_retryable());
        assert!(!CoreError::NotFound("team".to_string()).is_retryable());
    }

    #[test]
    fn export_error_names_the_path() {
        let err = CoreError::Export {
            path: PathBuf::from("messages/general.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(err.to_string(), "writing messages/general.json: denied");
    }
}
