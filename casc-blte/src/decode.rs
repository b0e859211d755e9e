//! Chunk decoding for BLTE blobs.

use flate2::read::ZlibDecoder;
use std::io::Read;
use tracing::{trace, warn};

use crate::{BlteHeader, Error, Result};

/// Decode a BLTE blob completely.
pub fn decode_all(data: &[u8]) -> Result<(BlteHeader, Vec<u8>)> {
    decode(data, None)
}

/// Decode a BLTE blob until at least `limit` payload bytes are produced.
///
/// With `limit = None` every chunk is decoded. With a limit, decoding stops
/// once the output reaches it and the output is cut to exactly `limit`
/// bytes; `Some(0)` parses the header and decodes nothing.
pub fn decode(data: &[u8], limit: Option<usize>) -> Result<(BlteHeader, Vec<u8>)> {
    let header = BlteHeader::parse(data)?;

    if limit == Some(0) {
        return Ok((header, Vec::new()));
    }

    if header.chunks().is_empty() {
        // Headerless blob: the remainder is the payload itself.
        let mut payload = data[header.data_offset()..].to_vec();
        if let Some(limit) = limit {
            payload.truncate(limit);
        }
        return Ok((header, payload));
    }

    let mut payload = Vec::with_capacity(match limit {
        Some(limit) => limit.min(header.decompressed_size() as usize),
        None => header.decompressed_size() as usize,
    });

    let mut offset = header.data_offset();
    for (index, chunk) in header.chunks().iter().enumerate() {
        let end = offset + chunk.compressed_size as usize;
        if end > data.len() {
            return Err(Error::Truncated {
                expected: end,
                actual: data.len(),
            });
        }
        let body = &data[offset..end];
        offset = end;

        if chunk.checksum != [0u8; 16] {
            let actual = md5::compute(body).0;
            if actual != chunk.checksum {
                warn!(
                    chunk = index,
                    expected = %hex::encode(chunk.checksum),
                    actual = %hex::encode(actual),
                    "BLTE chunk checksum mismatch"
                );
            }
        }

        let decoded = decode_chunk(body, chunk.decompressed_size)?;
        if decoded.len() as u32 != chunk.decompressed_size {
            warn!(
                chunk = index,
                declared = chunk.decompressed_size,
                actual = decoded.len(),
                "BLTE chunk size disagrees with table"
            );
        }
        payload.extend_from_slice(&decoded);

        if let Some(limit) = limit {
            if payload.len() >= limit {
                payload.truncate(limit);
                break;
            }
        }
    }

    Ok((header, payload))
}

/// Decode a single chunk body, mode byte included.
fn decode_chunk(body: &[u8], declared_size: u32) -> Result<Vec<u8>> {
    let Some((&mode, rest)) = body.split_first() else {
        return Err(Error::Truncated {
            expected: 1,
            actual: 0,
        });
    };

    trace!(mode = %(mode as char), len = rest.len(), "decoding chunk");

    match mode {
        b'N' => Ok(rest.to_vec()),
        b'Z' => {
            let mut out = Vec::with_capacity(declared_size as usize);
            ZlibDecoder::new(rest)
                .read_to_end(&mut out)
                .map_err(|e| Error::Decompress(format!("zlib: {e}")))?;
            Ok(out)
        }
        b'F' => {
            // Nested frame: the body is a complete BLTE blob.
            let (_, nested) = decode_all(rest)?;
            Ok(nested)
        }
        b'E' => {
            // Encryption keys are out of scope; stand in with zeroes of the
            // declared size so downstream offsets stay stable.
            Ok(vec![0u8; declared_size as usize])
        }
        other => Err(Error::UnsupportedMode(other)),
    }
}
