//! The on-disk cache backing every CDN fetch.
//!
//! Layout: `{base}/{product}/{kind}/{xx}/{yy}/{hash}[.index]`, plus a flat
//! `{base}/{product}/{name}` spot for the patch-service manifests. Entries
//! are opaque byte blobs with no sidecar metadata; freshness is judged by
//! mtime. Writes go to a temporary sibling and rename into place, so
//! concurrent writers settle on last-writer-wins without torn files.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, trace};

use casc_format::binutil::hash_prefix_path;

use crate::{CacheTtl, CdnKind, Result};

/// Filesystem cache for one product's CDN content.
pub struct CdnCache {
    base_dir: PathBuf,
}

impl CdnCache {
    /// Cache rooted at `{cwd}/cache/{product}`.
    pub fn for_product(product: &str) -> Result<Self> {
        let base_dir = std::env::current_dir()?.join("cache").join(product);
        Ok(Self { base_dir })
    }

    /// Cache rooted at `{base}/{product}`.
    pub fn with_base_dir(base: impl AsRef<Path>, product: &str) -> Self {
        Self {
            base_dir: base.as_ref().join(product),
        }
    }

    /// Base directory of this cache.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Path of a hash-addressed entry.
    pub fn entry_path(&self, kind: CdnKind, hash: &str, index_suffix: bool) -> PathBuf {
        let suffix = if index_suffix { ".index" } else { "" };
        self.base_dir
            .join(kind.as_str())
            .join(format!("{}{suffix}", hash_prefix_path(hash)))
    }

    /// Path of a flat, name-addressed entry (versions/cdns manifests).
    pub fn meta_path(&self, name: &str) -> PathBuf {
        self.base_dir.join(name)
    }

    /// Length of a usable cache entry, or `None` when absent or stale.
    pub async fn usable_len(&self, path: &Path, ttl: CacheTtl) -> Option<u64> {
        let meta = fs::metadata(path).await.ok()?;
        if let CacheTtl::Seconds(window) = ttl {
            let age = meta
                .modified()
                .ok()
                .and_then(|mtime| SystemTime::now().duration_since(mtime).ok())?;
            if age.as_secs() >= window {
                trace!(?path, age = age.as_secs(), "cache entry stale");
                return None;
            }
        }
        Some(meta.len())
    }

    /// Atomically replace `path` with `data`.
    pub async fn write_atomic(&self, path: &Path, data: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let tmp = PathBuf::from(format!("{}.part", path.display()));
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(data).await?;
        file.flush().await?;
        fs::rename(&tmp, path).await?;
        debug!(?path, len = data.len(), "cache write");
        Ok(())
    }

    /// Append `data` to an existing entry, atomically.
    pub async fn extend(&self, path: &Path, data: &[u8]) -> Result<()> {
        let mut existing = fs::read(path).await.unwrap_or_default();
        existing.extend_from_slice(data);
        self.write_atomic(path, &existing).await
    }

    /// Read a byte range out of a cached entry without buffering the rest.
    pub async fn read_slice(&self, path: &Path, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut file = fs::File::open(path).await?;
        file.seek(SeekFrom::Start(offset)).await?;
        let mut buf = vec![0u8; len];
        file.read_exact(&mut buf).await?;
        Ok(buf)
    }

    /// Read a whole cached entry.
    pub async fn read_all(&self, path: &Path) -> Result<Vec<u8>> {
        Ok(fs::read(path).await?)
    }
}
