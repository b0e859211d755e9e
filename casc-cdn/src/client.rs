//! HTTP clients for the patch service and the CDN proper.

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, trace, warn};

use casc_format::binutil::hash_prefix_path;
use casc_format::config::TableDocument;

use crate::{CacheTtl, CdnCache, CdnKind, DEFAULT_PATCH_HOST, DEFAULT_TIMEOUT, Error, Result};

/// Progress callback: `(step_tag, fraction in [0, 1])`.
pub type ProgressFn = Arc<dyn Fn(&str, f32) + Send + Sync>;

/// CDN host list for one region, from the `/cdns` manifest.
#[derive(Debug, Clone)]
pub struct CdnHosts {
    /// URL path segment between host and content kind.
    pub path: String,
    /// Hosts in preference order; the first is primary.
    pub hosts: Vec<String>,
}

/// Client for one product's CDN content.
///
/// Wraps the patch-service endpoints (`/versions`, `/cdns`), hash-addressed
/// CDN GETs with range support, and the disk cache. Fetches hand back cache
/// paths rather than buffers so callers can slice large archives straight
/// off disk.
pub struct CdnClient {
    http: reqwest::Client,
    product: String,
    region: String,
    patch_host: String,
    cache: CdnCache,
    hosts: Option<CdnHosts>,
    progress: Option<ProgressFn>,
}

impl CdnClient {
    /// Client for `product` in `region`, caching under `{cwd}/cache`.
    pub fn new(product: &str, region: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            product: product.to_string(),
            region: region.to_string(),
            patch_host: DEFAULT_PATCH_HOST.to_string(),
            cache: CdnCache::for_product(product)?,
            hosts: None,
            progress: None,
        })
    }

    /// Replace the cache (chiefly for tests and custom cache roots).
    pub fn with_cache(mut self, cache: CdnCache) -> Self {
        self.cache = cache;
        self
    }

    /// Override the patch-service host.
    pub fn with_patch_host(mut self, host: impl Into<String>) -> Self {
        self.patch_host = host.into();
        self
    }

    /// Pin the CDN host list, skipping `/cdns` discovery.
    pub fn with_hosts(mut self, hosts: CdnHosts) -> Self {
        self.hosts = Some(hosts);
        self
    }

    /// Install a progress callback for long transfers.
    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Override the per-request deadline (default 30 seconds).
    pub fn with_timeout(mut self, timeout: std::time::Duration) -> Result<Self> {
        self.http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    pub fn cache(&self) -> &CdnCache {
        &self.cache
    }

    pub fn product(&self) -> &str {
        &self.product
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// The `/versions` manifest for this product.
    pub async fn versions(&self) -> Result<TableDocument> {
        self.patch_manifest("versions").await
    }

    /// The `/cdns` manifest for this product.
    pub async fn cdns(&self) -> Result<TableDocument> {
        self.patch_manifest("cdns").await
    }

    async fn patch_manifest(&self, endpoint: &str) -> Result<TableDocument> {
        let path = self.cache.meta_path(endpoint);
        if self
            .cache
            .usable_len(&path, CacheTtl::default())
            .await
            .is_some()
        {
            let cached = self.cache.read_all(&path).await?;
            match TableDocument::parse(&String::from_utf8_lossy(&cached)) {
                Ok(doc) => {
                    trace!(endpoint, "patch manifest served from cache");
                    return Ok(doc);
                }
                // Corrupt cache entry: fall through to a refetch.
                Err(e) => warn!(endpoint, error = %e, "ignoring unparseable cached manifest"),
            }
        }

        let url = format!("http://{}/{}/{}", self.patch_host, self.product, endpoint);
        debug!(%url, "fetching patch manifest");
        let (_, body) = self.get(&url, None).await?;
        let text = String::from_utf8_lossy(&body).into_owned();
        let doc = TableDocument::parse(&text)?;
        self.cache.write_atomic(&path, text.as_bytes()).await?;
        Ok(doc)
    }

    /// Resolve the CDN host list for this region, once.
    async fn ensure_hosts(&mut self) -> Result<CdnHosts> {
        if let Some(hosts) = &self.hosts {
            return Ok(hosts.clone());
        }

        let doc = self.cdns().await?;
        let row = doc
            .find_row("Region", &self.region)
            .ok_or_else(|| Error::RegionNotFound {
                region: self.region.clone(),
            })?;
        let path = row.require("Path")?.to_string();
        let hosts: Vec<String> = row
            .require("Hosts")?
            .split_whitespace()
            .map(str::to_string)
            .collect();
        if hosts.is_empty() {
            return Err(Error::HostsExhausted {
                resource: "cdns".to_string(),
            });
        }
        debug!(?hosts, path = %path, "resolved CDN hosts");
        let hosts = CdnHosts { path, hosts };
        self.hosts = Some(hosts.clone());
        Ok(hosts)
    }

    /// Fetch a hash-addressed entity into the cache and return its path.
    ///
    /// With `max_bytes = Some(n)` only the first `n` bytes are guaranteed
    /// present, requested as a ranged GET; an existing shorter entry is
    /// extended with a follow-up range rather than refetched. With `None`
    /// the whole entity is fetched.
    pub async fn fetch(
        &mut self,
        hash: &str,
        kind: CdnKind,
        index_suffix: bool,
        max_bytes: Option<u64>,
        ttl: CacheTtl,
    ) -> Result<PathBuf> {
        let path = self.cache.entry_path(kind, hash, index_suffix);
        let cached = self.cache.usable_len(&path, ttl).await;

        match (cached, max_bytes) {
            (Some(len), Some(need)) if len >= need => {
                trace!(hash, len, "cache hit");
                return Ok(path);
            }
            (Some(len), None) => {
                trace!(hash, len, "cache hit (whole entity)");
                return Ok(path);
            }
            _ => {}
        }

        let hosts = self.ensure_hosts().await?;
        let suffix = if index_suffix { ".index" } else { "" };
        let resource = format!(
            "{}/{}/{}{suffix}",
            hosts.path,
            kind.as_str(),
            hash_prefix_path(hash)
        );

        // A still-fresh short entry is grown in place with an open-start
        // range; everything else starts from byte zero.
        let start = cached.filter(|_| max_bytes.is_some()).unwrap_or(0);
        let range = match (start, max_bytes) {
            (0, None) => None,
            (0, Some(end)) => Some(format!("bytes=0-{}", end - 1)),
            (start, Some(end)) => Some(format!("bytes={start}-{}", end - 1)),
            (start, None) => Some(format!("bytes={start}-")),
        };

        let mut last_error = None;
        for host in &hosts.hosts {
            let url = format!("http://{host}/{resource}");
            match self.get(&url, range.as_deref()).await {
                Ok((status, body)) => {
                    if status == 206 && start > 0 {
                        self.cache.extend(&path, &body).await?;
                    } else {
                        // Full response (or a range the server flattened).
                        self.cache.write_atomic(&path, &body).await?;
                    }
                    return Ok(path);
                }
                Err(Error::HttpStatus(416)) if start > 0 => {
                    // Asked past the end: the cached entry already holds
                    // the entire entity.
                    return Ok(path);
                }
                Err(e) => {
                    warn!(%url, error = %e, "CDN host failed, trying next");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(Error::HostsExhausted { resource }))
    }

    /// Fetch and buffer a hash-addressed entity, cut to `max_bytes`.
    pub async fn fetch_bytes(
        &mut self,
        hash: &str,
        kind: CdnKind,
        index_suffix: bool,
        max_bytes: Option<u64>,
        ttl: CacheTtl,
    ) -> Result<Vec<u8>> {
        let path = self.fetch(hash, kind, index_suffix, max_bytes, ttl).await?;
        let mut data = self.cache.read_all(&path).await?;
        if let Some(limit) = max_bytes {
            data.truncate(limit as usize);
        }
        Ok(data)
    }

    /// One GET with optional `Range`, streamed with progress reporting.
    async fn get(&self, url: &str, range: Option<&str>) -> Result<(u16, Vec<u8>)> {
        let map_err = |e: reqwest::Error| {
            if e.is_timeout() {
                Error::Timeout {
                    host: url.to_string(),
                }
            } else {
                Error::Http(e)
            }
        };

        let mut request = self.http.get(url);
        if let Some(range) = range {
            request = request.header(reqwest::header::RANGE, range);
        }

        let mut response = request.send().await.map_err(map_err)?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus(status.as_u16()));
        }

        let total = response.content_length();
        let mut body = match total {
            Some(len) => Vec::with_capacity(len as usize),
            None => Vec::new(),
        };
        while let Some(chunk) = response.chunk().await.map_err(map_err)? {
            body.extend_from_slice(&chunk);
            if let (Some(progress), Some(total)) = (&self.progress, total) {
                if total > 0 {
                    progress(url, body.len() as f32 / total as f32);
                }
            }
        }

        trace!(%url, status = status.as_u16(), len = body.len(), "GET complete");
        Ok((status.as_u16(), body))
    }
}
