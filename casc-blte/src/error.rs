//! Error types for BLTE parsing and decoding

use thiserror::Error;

/// Result type for BLTE operations
pub type Result<T> = std::result::Result<T, Error>;

/// BLTE error types
#[derive(Error, Debug)]
pub enum Error {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid BLTE magic bytes
    #[error("Invalid BLTE magic: expected \"BLTE\", got {0:?}")]
    InvalidMagic([u8; 4]),

    /// Header size is inconsistent with the chunk table
    #[error("Invalid header size: {0}")]
    InvalidHeaderSize(u32),

    /// Input ended before the declared structure did
    #[error("Truncated data: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    /// Chunk mode byte is not one of 'N', 'Z', 'F', 'E'
    #[error("Unsupported BLTE chunk mode: {0:#04x}")]
    UnsupportedMode(u8),

    /// Decompression failed
    #[error("Decompression failed: {0}")]
    Decompress(String),
}
