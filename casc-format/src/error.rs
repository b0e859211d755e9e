//! Error types for CASC metadata parsing

use thiserror::Error;

/// Result type for format parsing
pub type Result<T> = std::result::Result<T, Error>;

/// Format parsing errors
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed configuration text
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// A required configuration key is absent
    #[error("Missing required config key: {0}")]
    MissingKey(String),

    /// Malformed encoding table
    #[error("Invalid encoding table: {0}")]
    InvalidEncoding(String),

    /// No valid footer found, or blocks inconsistent with it
    #[error("Invalid CDN index: {0}")]
    InvalidCdnIndex(String),

    /// Malformed root table
    #[error("Invalid root table: {0}")]
    InvalidRoot(String),

    /// The product's build-uid maps to no known root dialect
    #[error("Unsupported root dialect: {0}")]
    UnsupportedDialect(String),

    /// A hash field failed to parse as hex of the right width
    #[error("Invalid hash: {0}")]
    InvalidHash(String),
}
