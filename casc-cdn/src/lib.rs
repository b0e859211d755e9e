//! CDN access for CASC content: patch-service discovery, hash-addressed
//! fetches with range support, and a filesystem cache shared between
//! resolver instances.
//!
//! Everything network-shaped lives here; the parsers upstream only ever see
//! bytes. All methods are async and a single call is the unit of
//! suspension — callers serialize their own requests.

mod cache;
mod client;
mod error;

pub use cache::CdnCache;
pub use client::{CdnClient, CdnHosts, ProgressFn};
pub use error::{Error, Result};

use std::time::Duration;

/// Content kind, the first path segment under the CDN root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CdnKind {
    Config,
    Data,
    Patch,
    Indexes,
}

impl CdnKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Config => "config",
            Self::Data => "data",
            Self::Patch => "patch",
            Self::Indexes => "indexes",
        }
    }
}

/// How long a cache entry stays trustworthy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTtl {
    /// Reuse while the entry's mtime is within this window.
    Seconds(u64),
    /// Content-addressed data never changes; reuse whenever present.
    Immutable,
}

impl Default for CacheTtl {
    fn default() -> Self {
        Self::Seconds(3600)
    }
}

/// Default patch service host.
pub const DEFAULT_PATCH_HOST: &str = "us.patch.battle.net:1119";

/// Default per-request deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
