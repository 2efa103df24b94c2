use thiserror::Error;
use tmsync::CatalogError;

/// Error types for translation providers and runs
#[derive(Debug, Error)]
pub enum MtError {
    /// Missing credential or invalid configuration; fatal at construction
    #[error("Configuration error: {0}")]
    Config(String),

    /// A backend call failed or returned something unusable
    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Invalid locale: {0}")]
    InvalidLocale(String),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl From<reqwest::Error> for MtError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            MtError::Provider(format!("Request timed out: {}", err))
        } else {
            MtError::Provider(format!("Network error: {}", err))
        }
    }
}

/// Result type for MT operations
pub type MtResult<T> = Result<T, MtError>;
