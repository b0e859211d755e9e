//! BLTE header and chunk table parsing.

use byteorder::{BigEndian, ReadBytesExt};
use std::io::{Cursor, Read};
use tracing::warn;

use crate::{BLTE_MAGIC, Error, MD5_LENGTH, Md5, Result};

/// Parsed BLTE chunk table.
///
/// A header size of zero means the rest of the blob is a single raw chunk
/// with no per-chunk records.
#[derive(Debug, Clone)]
pub struct BlteHeader {
    /// Declared header length in bytes. Zero for headerless blobs.
    header_size: u32,

    /// Per-chunk records. Empty for headerless blobs.
    chunks: Vec<ChunkInfo>,

    /// Offset of the first chunk body within the blob.
    data_offset: usize,

    /// Size of the raw payload for headerless blobs.
    single_chunk_size: u64,
}

/// One record of the chunk table.
#[derive(Debug, Clone)]
pub struct ChunkInfo {
    /// Size of the encoded chunk body, including the mode byte.
    pub compressed_size: u32,
    /// Declared size of the chunk once decoded.
    pub decompressed_size: u32,
    /// MD5 of the encoded chunk body. All-zero means unchecked.
    pub checksum: Md5,
}

impl BlteHeader {
    /// Parse the header of a BLTE blob.
    ///
    /// Does not decode any chunk data. Returns the header; the first chunk
    /// body starts at [`BlteHeader::data_offset`].
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < 8 {
            return Err(Error::Truncated {
                expected: 8,
                actual: data.len(),
            });
        }

        let mut magic = [0u8; 4];
        magic.copy_from_slice(&data[..4]);
        if magic != BLTE_MAGIC {
            return Err(Error::InvalidMagic(magic));
        }

        let mut cursor = Cursor::new(&data[4..]);
        let header_size = cursor.read_u32::<BigEndian>()?;

        if header_size == 0 {
            // Headerless: everything after the 8 header bytes is one raw chunk.
            return Ok(Self {
                header_size,
                chunks: Vec::new(),
                data_offset: 8,
                single_chunk_size: (data.len() - 8) as u64,
            });
        }

        if data.len() < 12 {
            return Err(Error::Truncated {
                expected: 12,
                actual: data.len(),
            });
        }

        let _flags = cursor.read_u8()?;
        let chunk_count = cursor.read_u24::<BigEndian>()? as usize;

        let table_end = 12 + chunk_count * 24;
        if data.len() < table_end {
            return Err(Error::Truncated {
                expected: table_end,
                actual: data.len(),
            });
        }
        if header_size as usize != table_end {
            // Tolerated: the declared size wins as the data offset.
            warn!(
                header_size,
                chunk_count, "BLTE header size disagrees with chunk count"
            );
            if (header_size as usize) < table_end || header_size as usize > data.len() {
                return Err(Error::InvalidHeaderSize(header_size));
            }
        }

        let mut chunks = Vec::with_capacity(chunk_count);
        for _ in 0..chunk_count {
            let compressed_size = cursor.read_u32::<BigEndian>()?;
            let decompressed_size = cursor.read_u32::<BigEndian>()?;
            let mut checksum = [0u8; MD5_LENGTH];
            cursor.read_exact(&mut checksum)?;
            chunks.push(ChunkInfo {
                compressed_size,
                decompressed_size,
                checksum,
            });
        }

        Ok(Self {
            header_size,
            chunks,
            data_offset: header_size as usize,
            single_chunk_size: 0,
        })
    }

    /// Declared header length. Zero for headerless blobs.
    pub fn header_size(&self) -> u32 {
        self.header_size
    }

    /// Offset of the first chunk body within the blob.
    pub fn data_offset(&self) -> usize {
        self.data_offset
    }

    /// Number of chunks. A headerless blob counts as one chunk.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len().max(1)
    }

    /// Total payload size once decoded, computed from the header alone.
    pub fn decompressed_size(&self) -> u64 {
        if self.chunks.is_empty() {
            self.single_chunk_size
        } else {
            self.chunks
                .iter()
                .map(|c| u64::from(c.decompressed_size))
                .sum()
        }
    }

    /// Per-chunk records. Empty for headerless blobs.
    pub fn chunks(&self) -> &[ChunkInfo] {
        &self.chunks
    }
}
