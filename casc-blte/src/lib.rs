//! BLTE (Block Table Encoded) container parsing and decoding.
//!
//! BLTE is the innermost layer of Blizzard's CASC storage: a chunked
//! container where each chunk carries its own compression mode. This crate
//! is read-only: it parses chunk tables and decodes payloads, it never
//! writes containers.

mod decode;
mod error;
mod header;

pub use decode::{decode, decode_all};
pub use error::{Error, Result};
pub use header::{BlteHeader, ChunkInfo};

/// BLTE magic bytes.
pub const BLTE_MAGIC: [u8; 4] = *b"BLTE";

const MD5_LENGTH: usize = 16;
pub type Md5 = [u8; MD5_LENGTH];
