//! Parser for the local `.idx` index files under `Data/data/`.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read, Seek, SeekFrom};
use tracing::{debug, trace};

use casc_format::EKey;
use casc_format::binutil::{ByteOrder, read_uint};

use crate::{Error, Result};

/// Fixed header length; entries are packed right behind it.
const HEADER_LEN: usize = 0x28;

/// One entry of a local index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdxEntry {
    pub ekey: EKey,
    /// `data.{NNN}` archive number.
    pub data_file: u16,
    /// Byte offset within the archive.
    pub offset: u64,
    /// Encoded size on disk.
    pub compressed_size: u64,
}

/// Parse a complete `.idx` blob.
///
/// The header is little-endian; entry fields are big-endian. The offset
/// field packs `(archive << 30) | offset_in_file`. Duplicate EKeys are
/// dropped first-wins; known to occur with disagreeing sizes.
pub fn parse(data: &[u8]) -> Result<Vec<IdxEntry>> {
    if data.len() < HEADER_LEN {
        return Err(Error::InvalidIndex(format!(
            "index shorter than its header: {} bytes",
            data.len()
        )));
    }

    let mut cursor = Cursor::new(data);
    let _header_len = cursor.read_u32::<LittleEndian>()?;
    let _header_hash = cursor.read_u32::<LittleEndian>()?;
    let _unk0 = cursor.read_u16::<LittleEndian>()?;
    let _bucket = cursor.read_u8()?;
    let _unk1 = cursor.read_u8()?;
    let size_bytes = cursor.read_u8()? as usize;
    let offset_bytes = cursor.read_u8()? as usize;
    let key_bytes = cursor.read_u8()? as usize;
    let archive_high_byte = cursor.read_u8()?;
    let archive_index_bits = cursor.read_u8()?;
    cursor.seek(SeekFrom::Start(0x20))?;
    let table_len = cursor.read_u32::<LittleEndian>()? as usize;
    let _table_hash = cursor.read_u32::<LittleEndian>()?;

    trace!(
        key_bytes,
        offset_bytes,
        size_bytes,
        archive_high_byte,
        archive_index_bits,
        table_len,
        "idx header"
    );

    if key_bytes < EKey::SHORT_LEN || offset_bytes == 0 || size_bytes == 0 {
        return Err(Error::InvalidIndex(format!(
            "implausible field widths: key={key_bytes} offset={offset_bytes} size={size_bytes}"
        )));
    }

    let entry_size = key_bytes + offset_bytes + size_bytes;
    if HEADER_LEN + table_len > data.len() {
        return Err(Error::InvalidIndex(format!(
            "entry table ({table_len} bytes) exceeds file ({} bytes)",
            data.len()
        )));
    }

    let mut entries = Vec::with_capacity(table_len / entry_size);
    let mut record = vec![0u8; entry_size];
    let table = &mut Cursor::new(&data[HEADER_LEN..HEADER_LEN + table_len]);

    while table.read_exact(&mut record).is_ok() {
        let ekey = EKey::from_full(&record[..key_bytes])
            .ok_or_else(|| Error::InvalidIndex("short key field".to_string()))?;
        let packed_offset = read_uint(&record[key_bytes..], offset_bytes, ByteOrder::Big)?;
        let compressed_size = read_uint(
            &record[key_bytes + offset_bytes..],
            size_bytes,
            ByteOrder::Big,
        )?;

        entries.push(IdxEntry {
            ekey,
            data_file: (packed_offset >> 30) as u16,
            offset: packed_offset & 0x3FFF_FFFF,
            compressed_size,
        });
    }

    debug!(entries = entries.len(), "parsed idx");
    Ok(entries)
}
