//! Error types for the resolvers

use thiserror::Error;

/// Result type for resolver operations
pub type Result<T> = std::result::Result<T, Error>;

/// Resolver errors
#[derive(Error, Debug)]
pub enum Error {
    /// The install directory is missing `.build.info` or `Data/data`
    #[error("not a valid CASC installation: {0}")]
    InvalidInstall(String),

    /// Malformed local index file, or an entry pointing outside its archive
    #[error("invalid index: {0}")]
    InvalidIndex(String),

    /// A file the construction sequence depends on could not be resolved
    #[error("not found: {0}")]
    NotFound(String),

    /// BLTE container error
    #[error(transparent)]
    Blte(#[from] casc_blte::Error),

    /// Metadata format error
    #[error(transparent)]
    Format(#[from] casc_format::Error),

    /// CDN or patch-service error
    #[error(transparent)]
    Cdn(#[from] casc_cdn::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
