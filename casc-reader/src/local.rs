//! Resolver over a local game installation.

use async_trait::async_trait;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use casc_blte::BlteHeader;
use casc_format::binutil::hash_prefix_path;
use casc_format::config::{BuildConfig, TableDocument};
use casc_format::root::{RootDialect, RootSource};
use casc_format::{CKey, EKey, encoding, listfile};

use crate::reader::CascReader;
use crate::tables::ResolverTables;
use crate::types::{DataSource, FileInfo};
use crate::{Error, Result, archive, idx};

/// How much of an entry to read when only the BLTE header is wanted.
const HEADER_PEEK_LEN: u64 = 8192;

/// Read-only resolver over an installed game's `Data/` tree.
///
/// All tables are built eagerly at construction; the `.idx` files give the
/// full file table up front, so queries after that touch the disk only for
/// payload bytes.
#[derive(Debug)]
pub struct LocalCascReader {
    data_dir: PathBuf,
    build_config: BuildConfig,
    tables: ResolverTables,
}

impl LocalCascReader {
    /// Open an installation rooted at `install`.
    ///
    /// The directory must hold `.build.info` and `Data/data`; anything else
    /// is not a CASC install.
    pub fn open(install: impl AsRef<Path>) -> Result<Self> {
        let install = install.as_ref();
        let build_info_path = install.join(".build.info");
        let data_dir = install.join("Data").join("data");
        if !build_info_path.is_file() || !data_dir.is_dir() {
            return Err(Error::InvalidInstall(install.display().to_string()));
        }

        let build_info = TableDocument::parse(&fs::read_to_string(&build_info_path)?)?;
        let row = build_info
            .rows()
            .find(|row| row.get("Active") == Some("1"))
            .or_else(|| build_info.rows().next())
            .ok_or_else(|| Error::InvalidInstall("empty .build.info".to_string()))?;
        let build_key = row.require("Build Key")?;

        let config_path = install
            .join("Data")
            .join("config")
            .join(hash_prefix_path(build_key));
        let build_config = BuildConfig::parse(&fs::read_to_string(&config_path)?)?;
        info!(
            build_uid = %build_config.build_uid,
            build_key,
            "opening local CASC install"
        );

        let mut tables = ResolverTables::new();
        let mut index_paths: Vec<PathBuf> = fs::read_dir(&data_dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "idx"))
            .collect();
        index_paths.sort();

        for path in &index_paths {
            for entry in idx::parse(&fs::read(path)?)? {
                // Duplicates across buckets exist with disagreeing sizes;
                // the first parse wins.
                tables.file_table.entry(entry.ekey).or_insert_with(|| {
                    FileInfo::at_location(
                        entry.ekey,
                        DataSource::Local(entry.data_file),
                        entry.offset,
                        entry.compressed_size,
                    )
                });
            }
        }
        debug!(
            indexes = index_paths.len(),
            files = tables.file_table.len(),
            "local indexes loaded"
        );

        // The encoding file is reached through its EKey alone; its own CKey
        // is not listed in its own table, so the mapping is patched in by
        // hand before anything calls get_file.
        let enc_ckey = CKey::from_hex(&build_config.encoding.0)?;
        let enc_ekey = EKey::from_hex(&build_config.encoding.1)?;
        let enc_info = tables
            .file_table
            .get(&enc_ekey)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("encoding file {enc_ekey} not indexed")))?;

        let mut reader = Self {
            data_dir,
            build_config,
            tables,
        };

        let enc_blob = reader.read_raw(&enc_info, None)?;
        let (_, enc_payload) = casc_blte::decode_all(&enc_blob)?;
        for (ckey, entry) in encoding::parse(&enc_payload)? {
            reader.tables.ckey_map.insert(ckey, entry.ekey);
        }
        reader.tables.ckey_map.insert(enc_ckey, enc_ekey);
        debug!(ckeys = reader.tables.ckey_map.len(), "encoding table loaded");

        let root_ckey = CKey::from_hex(&reader.build_config.root)?;
        let root_blob = reader
            .read_by_ckey(&root_ckey, None)?
            .ok_or_else(|| Error::NotFound("root file".to_string()))?;

        let translate = match RootDialect::from_build_uid(&reader.build_config.build_uid) {
            Ok(dialect) => dialect.parse(&root_blob, &mut reader)?,
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
    pub fn with_listfile<R: Read>(mut self, source: R) -> Result<Self> {
        let names = listfile::parse(source)?;
        self.tables.apply_listfile(&names);
        self.tables.finalize();
        Ok(self)
    }

    /// Build configuration this install was resolved from.
    pub fn build_config(&self) -> &BuildConfig {
        &self.build_config
    }

    /// Encoded (BLTE) bytes of a record, whole or a prefix.
    fn read_raw(&self, info: &FileInfo, prefix: Option<u64>) -> Result<Vec<u8>> {
        let (Some(DataSource::Local(id)), Some(offset), Some(size)) =
            (&info.data_file, info.offset, info.compressed_size)
        else {
            return Err(Error::InvalidIndex(format!(
                "record {} has no local location",
                info.ekey
            )));
        };
        let len = prefix.map_or(size, |p| p.min(size));
        archive::read_slice(&self.data_dir, *id, offset, len)
    }

    fn read_by_ckey(&self, ckey: &CKey, limit: Option<usize>) -> Result<Option<Vec<u8>>> {
        let Some(info) = self.tables.info(ckey) else {
            return Ok(None);
        };
        let blob = self.read_raw(info, None)?;
        let (_, payload) = casc_blte::decode(&blob, limit)?;
        Ok(Some(payload))
    }

    /// Parse a record's BLTE header, reading as little of the archive as
    /// possible.
    fn peek_header(&self, info: &FileInfo) -> Result<BlteHeader> {
        let blob = self.read_raw(info, Some(HEADER_PEEK_LEN))?;
        match BlteHeader::parse(&blob) {
            Ok(header) => Ok(header),
            Err(casc_blte::Error::Truncated { .. }) => {
                // Chunk table longer than the peek window.
                let blob = self.read_raw(info, None)?;
                Ok(BlteHeader::parse(&blob)?)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Discover (and memoize) decoded size and chunk count.
    fn ensure_sizes(&mut self, ckey: &CKey) -> Result<Option<(u64, u32)>> {
        let Some(info) = self.tables.info(ckey).cloned() else {
            return Ok(None);
        };
        if let (Some(size), Some(chunks)) = (info.uncompressed_size, info.chunk_count) {
            return Ok(Some((size, chunks)));
        }

        let header = self.peek_header(&info)?;
        let size = if header.header_size() == 0 {
            // Headerless blobs may exceed the peek window; the index knows
            // the true encoded length, and raw payload is length-preserving.
            info.compressed_size
                .map_or(header.decompressed_size(), |s| s.saturating_sub(8))
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

impl RootSource for LocalCascReader {
    fn fetch(&mut self, ckey: &CKey) -> Option<Vec<u8>> {
        self.read_by_ckey(ckey, None).ok().flatten()
    }
}

#[async_trait]
impl CascReader for LocalCascReader {
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
        self.tables.info(ckey).cloned()
    }

    async fn get_file(&mut self, ckey: &CKey, limit: Option<usize>) -> Result<Option<Vec<u8>>> {
        self.read_by_ckey(ckey, limit)
    }

    async fn get_file_size(&mut self, ckey: &CKey) -> Result<Option<u64>> {
        Ok(self.ensure_sizes(ckey)?.map(|(size, _)| size))
    }

    async fn get_chunk_count(&mut self, ckey: &CKey) -> Result<Option<u32>> {
        Ok(self.ensure_sizes(ckey)?.map(|(_, chunks)| chunks))
    }

    async fn is_file_fetchable(&mut self, ckey: &CKey, _include_cdn: bool) -> bool {
        let Some(info) = self.tables.info(ckey) else {
            return false;
        };
        match (&info.data_file, info.offset, info.compressed_size) {
            (Some(DataSource::Local(id)), Some(offset), Some(size)) => {
                archive::archive_len(&self.data_dir, *id)
                    .is_some_and(|len| offset + size <= len)
            }
            _ => false,
        }
    }
}
