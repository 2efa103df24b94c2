//! Error types for catalog and glossary I/O

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    /// A catalog or glossary file could not be read or written
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file was read but its content is not a valid catalog
    #[error("Failed to parse '{}': {message}", path.display())]
    Parse { path: PathBuf, message: String },

    /// A merge was requested against a catalog that does not exist yet
    #[error("Catalog '{}' does not exist. Run without merge first.", path.display())]
    MissingCatalog { path: PathBuf },
}

impl CatalogError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CatalogError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn parse(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        CatalogError::Parse {
            path: path.into(),
            message: message.to_string(),
        }
    }
}

/// Result type for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;
