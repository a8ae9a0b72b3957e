//! Common error types for SICOP

use thiserror::Error;

/// Common result type for SICOP operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the valuation engine and the service
///
/// `Schema` and `InvalidInput` are caller-visible (malformed query against the
/// fixed feature schema). `Dataset`, `Model` and `Config` only occur while the
/// engine is being built and abort startup.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Property dataset or curated segment table is missing or corrupt
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Regression model artifact is missing, corrupt, or does not fit the schema
    #[error("Model error: {0}")]
    Model(String),

    /// Query property does not match the fixed feature schema
    #[error("Schema error: {0}")]
    Schema(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for errors caused by the caller's request rather than by the service
    pub fn is_client_error(&self) -> bool {
        matches!(self, Error::Schema(_) | Error::InvalidInput(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_classification() {
        assert!(Error::Schema("missing comuna".into()).is_client_error());
        assert!(Error::InvalidInput("k = 0".into()).is_client_error());
        assert!(!Error::Dataset("empty".into()).is_client_error());
        assert!(!Error::Internal("boom".into()).is_client_error());
    }

    #[test]
    fn test_display_prefixes() {
        let err = Error::Dataset("row 3: missing precio_en_uf".into());
        assert_eq!(err.to_string(), "Dataset error: row 3: missing precio_en_uf");
    }
}
