//! CDN archive index (`.index`) parser.
//!
//! CDN indexes carry their geometry in a footer, so parsing starts from the
//! end of the file. The footer has no magic; the checksum width is found by
//! probing candidate widths from 16 down to 1 and accepting the layout whose
//! version and declared width line up.

use std::collections::HashSet;
use tracing::{debug, warn};

use crate::binutil::{ByteOrder, read_uint};
use crate::{EKey, Error, Result};

/// Blocks reserve 0x18 bytes per entry slot, whatever the actual field
/// widths add up to.
const ENTRY_SLOT_SIZE: usize = 0x18;

/// Geometry fields recovered from the index footer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdnIndexFooter {
    pub version: u8,
    /// Block size in KiB units.
    pub block_size_kb: u8,
    pub offset_bytes: u8,
    pub size_bytes: u8,
    pub key_bytes: u8,
    pub checksum_size: u8,
    pub num_elements: u32,
}

/// One `(ekey, size, offset)` record from an index block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdnIndexEntry {
    pub ekey: EKey,
    pub compressed_size: u64,
    pub offset: u64,
}

/// A fully parsed CDN archive index.
#[derive(Debug, Clone)]
pub struct CdnIndex {
    pub footer: CdnIndexFooter,
    /// Entries in file order, duplicates removed first-wins.
    pub entries: Vec<CdnIndexEntry>,
}

impl CdnIndex {
    /// Parse a complete `.index` blob.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let footer = find_footer(data)?;
        debug!(
            block_size_kb = footer.block_size_kb,
            key_bytes = footer.key_bytes,
            num_elements = footer.num_elements,
            "located CDN index footer"
        );

        let entries = walk_blocks(data, &footer)?;
        if entries.len() as u32 != footer.num_elements {
            // Known to disagree on some archives; the entries we did read
            // are still usable.
            warn!(
                declared = footer.num_elements,
                actual = entries.len(),
                "CDN index entry count disagrees with footer"
            );
        }

        Ok(Self { footer, entries })
    }
}

/// Probe the trailing bytes for a footer at each candidate checksum width.
fn find_footer(data: &[u8]) -> Result<CdnIndexFooter> {
    for width in (1..=16usize).rev() {
        let footer_len = width * 2 + 12;
        if data.len() < footer_len {
            continue;
        }

        // Layout: toc_checksum[width], 12 core bytes, footer_checksum[width].
        let core = &data[data.len() - footer_len + width..data.len() - width];
        let version = core[0];
        let checksum_size = core[7];

        if version != 1 || checksum_size as usize != width {
            continue;
        }

        return Ok(CdnIndexFooter {
            version,
            block_size_kb: core[3],
            offset_bytes: core[4],
            size_bytes: core[5],
            key_bytes: core[6],
            checksum_size,
            num_elements: u32::from_le_bytes([core[8], core[9], core[10], core[11]]),
        });
    }

    Err(Error::InvalidCdnIndex(
        "no footer found at any checksum width".to_string(),
    ))
}

fn walk_blocks(data: &[u8], footer: &CdnIndexFooter) -> Result<Vec<CdnIndexEntry>> {
    let block_size = footer.block_size_kb as usize * 1024;
    if block_size == 0 {
        return Err(Error::InvalidCdnIndex("zero block size".to_string()));
    }

    let key_bytes = footer.key_bytes as usize;
    let size_bytes = footer.size_bytes as usize;
    let offset_bytes = footer.offset_bytes as usize;
    if key_bytes < EKey::SHORT_LEN || size_bytes == 0 || offset_bytes == 0 {
        return Err(Error::InvalidCdnIndex(format!(
            "implausible field widths: key={key_bytes} size={size_bytes} offset={offset_bytes}"
        )));
    }

    let entry_size = key_bytes + size_bytes + offset_bytes;
    let entries_per_block = block_size / ENTRY_SLOT_SIZE;
    let block_count = data.len() / block_size;

    let mut entries = Vec::new();
    let mut seen: HashSet<EKey> = HashSet::new();
    let mut duplicates = 0u32;

    for block in 0..block_count {
        let mut offset = block * block_size;
        let block_end = (offset + block_size).min(data.len());

        for _ in 0..entries_per_block {
            if offset + entry_size > block_end {
                break;
            }
            let record = &data[offset..offset + entry_size];
            offset += entry_size;

            let key_field = &record[..key_bytes];
            let compressed_size =
                read_uint(&record[key_bytes..], size_bytes, ByteOrder::Big)?;

            // A zeroed key or size marks the end of the block's records.
            if key_field.iter().all(|&b| b == 0) || compressed_size == 0 {
                break;
            }

            let file_offset = read_uint(
                &record[key_bytes + size_bytes..],
                offset_bytes,
                ByteOrder::Big,
            )?;

            let ekey = EKey::from_full(key_field)
                .ok_or_else(|| Error::InvalidCdnIndex("short key field".to_string()))?;
            if !seen.insert(ekey) {
                duplicates += 1;
                continue;
            }

            entries.push(CdnIndexEntry {
                ekey,
                compressed_size,
                offset: file_offset,
            });
        }
    }

    if duplicates > 0 {
        debug!(duplicates, "skipped duplicate EKeys in CDN index");
    }
    Ok(entries)
}
