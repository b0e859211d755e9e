//! Error types for CDN operations

use thiserror::Error;

/// Result type for CDN operations
pub type Result<T> = std::result::Result<T, Error>;

/// CDN operation errors
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP transport failure
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered outside 2xx
    #[error("HTTP status {0}")]
    HttpStatus(u16),

    /// Per-request deadline elapsed
    #[error("request to {host} timed out")]
    Timeout { host: String },

    /// Every configured CDN host failed
    #[error("all CDN hosts exhausted for {resource}")]
    HostsExhausted { resource: String },

    /// No CDN row for the requested region
    #[error("region {region} not offered by the patch service")]
    RegionNotFound { region: String },

    /// Patch service answered with an unparseable manifest
    #[error("invalid manifest: {0}")]
    Manifest(#[from] casc_format::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
