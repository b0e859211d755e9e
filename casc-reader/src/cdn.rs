//! Resolver working straight off the CDN.

use async_trait::async_trait;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use casc_blte::BlteHeader;
use casc_cdn::{CacheTtl, CdnClient, CdnKind};
use casc_format::cdn_index::CdnIndex;
use casc_format::config::{BuildConfig, CdnConfig};
use casc_format::root::{AsyncRootSource, RootDialect};
use casc_format::{CKey, EKey, encoding, listfile};

use crate::reader::CascReader;
use crate::tables::ResolverTables;
use crate::types::{DataSource, FileInfo};
use crate::{Error, Result};

/// How much of an entity to pull when only the BLTE header is wanted.
const HEADER_PEEK_LEN: u64 = 8192;

/// Read-only resolver over the CDN.
///
/// Archive indexes are parsed eagerly (they are small); records for keys
/// reached only through the encoding table are synthesized on first query
/// and fetched through their standalone CDN path. Everything downloaded
/// lands in the shared disk cache, so a second resolver over the same
/// product mostly reads from disk.
pub struct CdnCascReader {
    client: CdnClient,
    build_config: BuildConfig,
    tables: ResolverTables,
    /// Short EKey → full hex hash, for standalone CDN paths.
    full_ekeys: HashMap<EKey, String>,
}

impl CdnCascReader {
    /// Resolve `product` in `region` using default hosts and cache.
    pub async fn open(product: &str, region: &str) -> Result<Self> {
        Self::open_with_client(CdnClient::new(product, region)?).await
    }

    /// Resolve using a preconfigured [`CdnClient`].
    pub async fn open_with_client(mut client: CdnClient) -> Result<Self> {
        let versions = client.versions().await?;
        let row = versions
            .find_row("Region", client.region())
            .ok_or_else(|| casc_cdn::Error::RegionNotFound {
                region: client.region().to_string(),
            })?;
        let build_hash = row.require("BuildConfig")?.to_string();
        let cdn_hash = row.require("CDNConfig")?.to_string();

        let build_text = client
            .fetch_bytes(&build_hash, CdnKind::Config, false, None, CacheTtl::default())
            .await?;
        let build_config = BuildConfig::parse(&String::from_utf8_lossy(&build_text))?;
        info!(
            product = client.product(),
            build_uid = %build_config.build_uid,
            build_hash = %build_hash,
            "opening CDN CASC store"
        );

        let cdn_text = client
            .fetch_bytes(&cdn_hash, CdnKind::Config, false, None, CacheTtl::default())
            .await?;
        let cdn_config = CdnConfig::parse(&String::from_utf8_lossy(&cdn_text))?;

        let mut tables = ResolverTables::new();
        for archive in &cdn_config.archives {
            // Archive indexes never change once published.
            let loaded = client
                .fetch_bytes(archive, CdnKind::Data, true, None, CacheTtl::Immutable)
                .await
                .map_err(Error::from)
                .and_then(|bytes| CdnIndex::parse(&bytes).map_err(Error::from));
            let index = match loaded {
                Ok(index) => index,
                Err(e) => {
                    // A bad archive only costs its own entries.
                    warn!(archive = %archive, error = %e, "skipping unusable archive index");
                    continue;
                }
            };
            for entry in index.entries {
                tables.file_table.entry(entry.ekey).or_insert_with(|| {
                    FileInfo::at_location(
                        entry.ekey,
                        DataSource::CdnArchive(archive.clone()),
                        entry.offset,
                        entry.compressed_size,
                    )
                });
            }
        }
        debug!(
            archives = cdn_config.archives.len(),
            files = tables.file_table.len(),
            "CDN archive indexes loaded"
        );

        // Encoding files are immutable and reached by their own EKey; the
        // table does not list its own CKey, so that mapping is patched in
        // by hand before anything calls get_file.
        let (enc_ckey_hex, enc_ekey_hex) = build_config.encoding.clone();
        let enc_blob = client
            .fetch_bytes(&enc_ekey_hex, CdnKind::Data, false, None, CacheTtl::Immutable)
            .await?;
        let (_, enc_payload) = casc_blte::decode_all(&enc_blob)?;

        let mut full_ekeys = HashMap::new();
        for (ckey, entry) in encoding::parse(&enc_payload)? {
            full_ekeys.insert(entry.ekey, hex::encode(&entry.ekey_full));
            tables.ckey_map.insert(ckey, entry.ekey);
        }
        let enc_ckey = CKey::from_hex(&enc_ckey_hex)?;
        let enc_ekey = EKey::from_hex(&enc_ekey_hex)?;
        tables.ckey_map.insert(enc_ckey, enc_ekey);
        full_ekeys.entry(enc_ekey).or_insert(enc_ekey_hex);
        debug!(ckeys = tables.ckey_map.len(), "encoding table loaded");

        let mut reader = Self {
            client,
            build_config,
            tables,
            full_ekeys,
        };

        let root_ckey = CKey::from_hex(&reader.build_config.root)?;
        let root_blob = reader
            .read_by_ckey(&root_ckey, None)
            .await?
            .ok_or_else(|| Error::NotFound("root file".to_string()))?;

        let translate = match RootDialect::from_build_uid(&reader.build_config.build_uid) {
            Ok(dialect) => dialect.aparse(&root_blob, &mut reader).await?,
            Err(casc_format::Error::UnsupportedDialect(uid)) => {
                // Unknown products still expose their unnamed CKeys.
                warn!(build_uid = %uid, "no root dialect, translate table left empty");
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };

        reader.tables.translate = translate;
        reader.tables.append_synthetic(&reader.build_config, root_ckey);
        reader.tables.finalize();
        Ok(reader)
    }

    /// Name hash-only entries through a listfile.
    pub fn with_listfile<R: std::io::Read>(mut self, source: R) -> Result<Self> {
        let names = listfile::parse(source)?;
        self.tables.apply_listfile(&names);
        self.tables.finalize();
        Ok(self)
    }

    /// Build configuration this store was resolved from.
    pub fn build_config(&self) -> &BuildConfig {
        &self.build_config
    }

    /// Record for a CKey, synthesizing one for keys the encoding table
    /// knows but no archive index carries.
    fn info_for(&mut self, ckey: &CKey) -> Option<FileInfo> {
        let ekey = self.tables.ekey_for(ckey)?;
        if !self.tables.file_table.contains_key(&ekey) {
            let mut synthesized = FileInfo::new(ekey);
            synthesized.ckey = Some(*ckey);
            self.tables.file_table.insert(ekey, synthesized);
        }
        self.tables.file_table.get(&ekey).cloned()
    }

    /// Encoded (BLTE) bytes of a record, whole or a prefix of `bound`
    /// bytes. `Ok(None)` when no CDN path can be built for it.
    async fn fetch_encoded(&mut self, info: &FileInfo, bound: Option<u64>) -> Result<Option<Vec<u8>>> {
        match (&info.data_file, info.offset, info.compressed_size) {
            (Some(DataSource::CdnArchive(hash)), Some(offset), Some(size)) => {
                let take = bound.map_or(size, |b| b.min(size));
                // Ranges start at byte zero, so the archive prefix up to the
                // entry rides along; it stays on disk, not in memory.
                let path = self
                    .client
                    .fetch(hash, CdnKind::Data, false, Some(offset + take), CacheTtl::Immutable)
                    .await?;
                let slice = self
                    .client
                    .cache()
                    .read_slice(&path, offset, take as usize)
                    .await?;
                Ok(Some(slice))
            }
            (Some(DataSource::Local(_)), _, _) => Err(Error::InvalidIndex(
                "local archive location in a CDN resolver".to_string(),
            )),
            _ => {
                let Some(hash) = self.full_ekeys.get(&info.ekey).cloned() else {
                    warn!(ekey = %info.ekey, "no full EKey known, record unreachable");
                    return Ok(None);
                };
                let bytes = self
                    .client
                    .fetch_bytes(&hash, CdnKind::Data, false, bound, CacheTtl::Immutable)
                    .await?;
                Ok(Some(bytes))
            }
        }
    }

    async fn read_by_ckey(&mut self, ckey: &CKey, limit: Option<usize>) -> Result<Option<Vec<u8>>> {
        let Some(info) = self.info_for(ckey) else {
            return Ok(None);
        };

        if limit == Some(0) {
            return Ok(Some(Vec::new()));
        }

        // Standalone entities with a limit: try a bounded fetch first and
        // fall back to the full entity when the compressed prefix was not
        // enough to decode `limit` bytes.
        if let Some(limit) = limit {
            if info.data_file.is_none() {
                let bound = limit as u64 + HEADER_PEEK_LEN;
                let Some(blob) = self.fetch_encoded(&info, Some(bound)).await? else {
                    return Ok(None);
                };
                match casc_blte::decode(&blob, Some(limit)) {
                    Ok((_, payload)) => return Ok(Some(payload)),
                    Err(
                        casc_blte::Error::Truncated { .. } | casc_blte::Error::Decompress(_),
                    ) => {
                        debug!(ekey = %info.ekey, "bounded fetch too short, refetching whole");
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }

        let Some(blob) = self.fetch_encoded(&info, None).await? else {
            return Ok(None);
        };
        let (_, payload) = casc_blte::decode(&blob, limit)?;
        Ok(Some(payload))
    }

    async fn peek_header(&mut self, info: &FileInfo) -> Result<Option<BlteHeader>> {
        let Some(blob) = self.fetch_encoded(info, Some(HEADER_PEEK_LEN)).await? else {
            return Ok(None);
        };
        match BlteHeader::parse(&blob) {
            Ok(header) => Ok(Some(header)),
            Err(casc_blte::Error::Truncated { .. }) => {
                // Chunk table longer than the peek window.
                let Some(blob) = self.fetch_encoded(info, None).await? else {
                    return Ok(None);
                };
                Ok(Some(BlteHeader::parse(&blob)?))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Discover (and memoize) decoded size and chunk count.
    async fn ensure_sizes(&mut self, ckey: &CKey) -> Result<Option<(u64, u32)>> {
        let Some(info) = self.info_for(ckey) else {
            return Ok(None);
        };
        if let (Some(size), Some(chunks)) = (info.uncompressed_size, info.chunk_count) {
            return Ok(Some((size, chunks)));
        }

        let Some(header) = self.peek_header(&info).await? else {
            return Ok(None);
        };
        let size = if header.header_size() == 0 {
            // Headerless: raw payload is length-preserving, so the encoded
            // length gives the answer; standalone entities without a known
            // length need the whole blob once.
            match info.compressed_size {
                Some(encoded) => encoded.saturating_sub(8),
                None => match self.fetch_encoded(&info, None).await? {
                    Some(blob) => (blob.len() as u64).saturating_sub(8),
                    None => return Ok(None),
                },
            }
        } else {
            header.decompressed_size()
        };
        let chunks = header.chunk_count() as u32;

        if let Some(record) = self.tables.info_mut(ckey) {
            record.uncompressed_size = Some(size);
            record.chunk_count = Some(chunks);
        }
        Ok(Some((size, chunks)))
    }
}

#[async_trait]
impl AsyncRootSource for CdnCascReader {
    async fn fetch(&mut self, ckey: &CKey) -> Option<Vec<u8>> {
        self.read_by_ckey(ckey, None).await.ok().flatten()
    }
}

#[async_trait]
impl CascReader for CdnCascReader {
    fn list_files(&self) -> Vec<(String, CKey)> {
        self.tables.list_files()
    }

    fn list_unnamed_files(&self) -> Vec<(CKey, CKey)> {
        self.tables.list_unnamed_files()
    }

    fn get_name(&self, ckey: &CKey) -> Option<String> {
        self.tables.info(ckey)?.name.clone()
    }

    fn get_file_info(&mut self, ckey: &CKey) -> Option<FileInfo> {
        self.info_for(ckey)
    }

    async fn get_file(&mut self, ckey: &CKey, limit: Option<usize>) -> Result<Option<Vec<u8>>> {
        self.read_by_ckey(ckey, limit).await
    }

    async fn get_file_size(&mut self, ckey: &CKey) -> Result<Option<u64>> {
        Ok(self.ensure_sizes(ckey).await?.map(|(size, _)| size))
    }

    async fn get_chunk_count(&mut self, ckey: &CKey) -> Result<Option<u32>> {
        Ok(self.ensure_sizes(ckey).await?.map(|(_, chunks)| chunks))
    }

    async fn is_file_fetchable(&mut self, ckey: &CKey, include_cdn: bool) -> bool {
        let Some(ekey) = self.tables.ekey_for(ckey) else {
            return false;
        };

        match self.tables.file_table.get(&ekey) {
            Some(FileInfo {
                data_file: Some(DataSource::CdnArchive(hash)),
                offset: Some(offset),
                compressed_size: Some(size),
                ..
            }) => {
                let path = self.client.cache().entry_path(CdnKind::Data, hash, false);
                let cached = self
                    .client
                    .cache()
                    .usable_len(&path, CacheTtl::Immutable)
                    .await;
                cached.is_some_and(|len| offset + size <= len) || include_cdn
            }
            _ => {
                // Standalone path: needs the full EKey, plus either a
                // cached copy or permission to go to the network.
                let Some(hash) = self.full_ekeys.get(&ekey) else {
                    return false;
                };
                let path = self.client.cache().entry_path(CdnKind::Data, hash, false);
                let cached = self
                    .client
                    .cache()
                    .usable_len(&path, CacheTtl::Immutable)
                    .await;
                cached.is_some() || include_cdn
            }
        }
    }
}
