//! Encoding table parser.
//!
//! The encoding file maps content keys to encoding keys. It travels as a
//! BLTE blob; callers decode that layer first and hand the plain table
//! here. Multi-byte header fields are big-endian.

use byteorder::{BigEndian, ReadBytesExt};
use std::collections::HashMap;
use std::io::{Cursor, Read, Seek, SeekFrom};
use tracing::{debug, trace};

use crate::binutil::read_uint40_be;
use crate::{CKey, EKey, Error, Result};

/// Magic bytes: "EN"
const ENCODING_MAGIC: [u8; 2] = *b"EN";

/// Encoding file header.
#[derive(Debug, Clone)]
pub struct EncodingHeader {
    pub version: u8,
    pub ckey_hash_size: u8,
    pub ekey_hash_size: u8,
    pub ckey_page_size_kb: u16,
    pub ekey_page_size_kb: u16,
    pub ckey_page_count: u32,
    pub ekey_page_count: u32,
    pub espec_block_size: u32,
}

impl EncodingHeader {
    fn parse<R: Read>(reader: &mut R) -> Result<Self> {
        let mut magic = [0u8; 2];
        reader.read_exact(&mut magic)?;
        if magic != ENCODING_MAGIC {
            return Err(Error::InvalidEncoding(format!(
                "bad magic: {:02x}{:02x}",
                magic[0], magic[1]
            )));
        }

        let version = reader.read_u8()?;
        let ckey_hash_size = reader.read_u8()?;
        let ekey_hash_size = reader.read_u8()?;
        let ckey_page_size_kb = reader.read_u16::<BigEndian>()?;
        let ekey_page_size_kb = reader.read_u16::<BigEndian>()?;
        let ckey_page_count = reader.read_u32::<BigEndian>()?;
        let ekey_page_count = reader.read_u32::<BigEndian>()?;
        let _unk = reader.read_u8()?;
        let espec_block_size = reader.read_u32::<BigEndian>()?;

        if ckey_hash_size == 0 || ekey_hash_size as usize > 16 {
            return Err(Error::InvalidEncoding(format!(
                "implausible hash sizes: ckey={ckey_hash_size} ekey={ekey_hash_size}"
            )));
        }

        Ok(Self {
            version,
            ckey_hash_size,
            ekey_hash_size,
            ckey_page_size_kb,
            ekey_page_size_kb,
            ckey_page_count,
            ekey_page_count,
            espec_block_size,
        })
    }
}

/// One row of the CKey → EKey map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingEntry {
    /// Canonical (first) encoding key, truncated to the short form every
    /// index uses.
    pub ekey: EKey,
    /// The same key at full width, as needed for standalone CDN paths.
    pub ekey_full: Vec<u8>,
    /// Decoded file size declared by the table.
    pub file_size: u64,
}

/// Parse a decoded encoding file into its CKey → EKey map.
///
/// Only the CKey pages are walked; the EKey half of the file holds ESpec
/// back-references the resolver never needs.
pub fn parse(data: &[u8]) -> Result<HashMap<CKey, EncodingEntry>> {
    let mut cursor = Cursor::new(data);
    let header = EncodingHeader::parse(&mut cursor)?;
    debug!(
        version = header.version,
        ckey_pages = header.ckey_page_count,
        espec_block = header.espec_block_size,
        "parsed encoding header"
    );

    // ESpec strings, then the CKey page table of contents. Neither feeds
    // the forward map.
    let toc_entry = header.ckey_hash_size as u64 + 16;
    cursor.seek(SeekFrom::Current(
        header.espec_block_size as i64 + (header.ckey_page_count as u64 * toc_entry) as i64,
    ))?;

    let page_size = header.ckey_page_size_kb as usize * 1024;
    let ckey_size = header.ckey_hash_size as usize;
    let ekey_size = header.ekey_hash_size as usize;

    let mut map = HashMap::new();
    let mut page = vec![0u8; page_size];
    for page_index in 0..header.ckey_page_count {
        cursor.read_exact(&mut page).map_err(|_| {
            Error::InvalidEncoding(format!("CKey page {page_index} truncated"))
        })?;
        parse_ckey_page(&page, ckey_size, ekey_size, &mut map)?;
        trace!(page = page_index, entries = map.len(), "walked CKey page");
    }

    debug!(entries = map.len(), "built CKey → EKey map");
    Ok(map)
}

fn parse_ckey_page(
    page: &[u8],
    ckey_size: usize,
    ekey_size: usize,
    map: &mut HashMap<CKey, EncodingEntry>,
) -> Result<()> {
    let mut offset = 0;

    loop {
        if offset >= page.len() {
            break;
        }
        let key_count = page[offset] as usize;
        if key_count == 0 {
            // Zero padding: rest of the page is empty.
            break;
        }
        offset += 1;

        let entry_len = 5 + ckey_size + key_count * ekey_size;
        if offset + entry_len > page.len() {
            return Err(Error::InvalidEncoding(
                "encoding entry crosses page boundary".to_string(),
            ));
        }

        let file_size = read_uint40_be(&page[offset..offset + 5])?;
        offset += 5;

        let ckey = CKey::from_slice(&page[offset..offset + ckey_size]).ok_or_else(|| {
            Error::InvalidEncoding(format!("unsupported CKey width {ckey_size}"))
        })?;
        offset += ckey_size;

        // Only the first EKey is canonical; alternates are skipped.
        let ekey_full = page[offset..offset + ekey_size].to_vec();
        let ekey = EKey::from_full(&ekey_full).ok_or_else(|| {
            Error::InvalidEncoding(format!("EKey width {ekey_size} shorter than short form"))
        })?;
        offset += key_count * ekey_size;

        map.entry(ckey).or_insert(EncodingEntry {
            ekey,
            ekey_full,
            file_size,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a one-page encoding file with the given (ckey, ekeys) entries.
    fn build_encoding(entries: &[([u8; 16], Vec<[u8; 16]>)], page_kb: u16) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&ENCODING_MAGIC);
        data.push(1); // version
        data.push(16); // ckey hash size
        data.push(16); // ekey hash size
        data.extend_from_slice(&page_kb.to_be_bytes());
        data.extend_from_slice(&page_kb.to_be_bytes());
        data.extend_from_slice(&1u32.to_be_bytes()); // ckey page count
        data.extend_from_slice(&0u32.to_be_bytes()); // ekey page count
        data.push(0);
        data.extend_from_slice(&0u32.to_be_bytes()); // espec block size

        // CKey page TOC: first ckey + page checksum.
        data.extend_from_slice(&entries[0].0);
        data.extend_from_slice(&[0u8; 16]);

        let mut page = Vec::new();
        for (ckey, ekeys) in entries {
            page.push(ekeys.len() as u8);
            page.extend_from_slice(&[0, 0, 0, 0x10, 0]); // size u40be = 4096
            page.extend_from_slice(ckey);
            for ekey in ekeys {
                page.extend_from_slice(ekey);
            }
        }
        page.resize(page_kb as usize * 1024, 0);
        data.extend_from_slice(&page);
        data
    }

    #[test]
    fn maps_first_ekey_truncated() {
        let ckey = [0x11; 16];
        let ekey_a = [0x22; 16];
        let ekey_b = [0x33; 16];
        let data = build_encoding(&[(ckey, vec![ekey_a, ekey_b])], 1);

        let map = parse(&data).unwrap();
        assert_eq!(map.len(), 1);
        let entry = map.get(&CKey::new(ckey)).unwrap();
        assert_eq!(entry.ekey, EKey::new([0x22; 9]));
        assert_eq!(entry.ekey_full, vec![0x22; 16]);
        assert_eq!(entry.file_size, 4096);
    }

    #[test]
    fn zero_count_terminates_page() {
        let entries = [
            ([0x01; 16], vec![[0xAA; 16]]),
            ([0x02; 16], vec![[0xBB; 16]]),
        ];
        let data = build_encoding(&entries, 1);
        let map = parse(&data).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(
            map.get(&CKey::new([0x02; 16])).unwrap().ekey,
            EKey::new([0xBB; 9])
        );
    }

    #[test]
    fn bad_magic() {
        let err = parse(b"XX\x01").unwrap_err();
        assert!(matches!(err, Error::InvalidEncoding(_)));
    }

    #[test]
    fn truncated_page_is_an_error() {
        let mut data = build_encoding(&[([0x01; 16], vec![[0xAA; 16]])], 1);
        data.truncate(data.len() - 512);
        let err = parse(&data).unwrap_err();
        assert!(matches!(err, Error::InvalidEncoding(_)));
    }
}
