//! File records shared by both resolver variants.

use casc_format::{CKey, EKey};

/// Where a file's encoded bytes live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    /// A `data.{NNN}` archive in the local installation.
    Local(u16),
    /// A hash-named archive on the CDN.
    CdnArchive(String),
}

/// Everything known about one encoded file.
///
/// Most fields start out unknown and are filled in as they are discovered:
/// index entries contribute the location, the root table contributes the
/// name, and the sizes arrive lazily from a BLTE header peek.
/// `uncompressed_size` doubles as the memo flag for that peek.
#[derive(Debug, Clone)]
pub struct FileInfo {
    pub ekey: EKey,
    pub ckey: Option<CKey>,
    pub data_file: Option<DataSource>,
    pub offset: Option<u64>,
    pub compressed_size: Option<u64>,
    pub uncompressed_size: Option<u64>,
    pub chunk_count: Option<u32>,
    pub name: Option<String>,
}

impl FileInfo {
    /// A record with nothing known beyond its EKey.
    pub fn new(ekey: EKey) -> Self {
        Self {
            ekey,
            ckey: None,
            data_file: None,
            offset: None,
            compressed_size: None,
            uncompressed_size: None,
            chunk_count: None,
            name: None,
        }
    }

    /// A record backed by an archive location.
    pub fn at_location(
        ekey: EKey,
        data_file: DataSource,
        offset: u64,
        compressed_size: u64,
    ) -> Self {
        Self {
            data_file: Some(data_file),
            offset: Some(offset),
            compressed_size: Some(compressed_size),
            ..Self::new(ekey)
        }
    }

    /// `true` once the lazy size discovery has run.
    pub fn sizes_known(&self) -> bool {
        self.uncompressed_size.is_some()
    }
}
