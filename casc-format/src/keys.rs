//! Content and encoding key newtypes.

use std::fmt;

use crate::{Error, Result};

/// Content key: MD5 of the decoded file content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CKey([u8; 16]);

impl CKey {
    pub const fn new(data: [u8; 16]) -> Self {
        Self(data)
    }

    /// Parse a 32-character lowercase hex key.
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let bytes = hex::decode(hex_str).map_err(|_| Error::InvalidHash(hex_str.to_string()))?;
        let data: [u8; 16] = bytes
            .try_into()
            .map_err(|_| Error::InvalidHash(hex_str.to_string()))?;
        Ok(Self(data))
    }

    pub fn from_slice(data: &[u8]) -> Option<Self> {
        let data: [u8; 16] = data.try_into().ok()?;
        Some(Self(data))
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for CKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Encoding key, truncated to the 9 bytes that index entries carry.
///
/// Full 16-byte encoding hashes are truncated on the way in; every map in
/// the system keys on this short form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EKey([u8; 9]);

impl EKey {
    pub const SHORT_LEN: usize = 9;

    pub const fn new(data: [u8; 9]) -> Self {
        Self(data)
    }

    /// Truncate a full (or already short) encoding hash.
    pub fn from_full(data: &[u8]) -> Option<Self> {
        if data.len() < Self::SHORT_LEN {
            return None;
        }
        let mut short = [0u8; Self::SHORT_LEN];
        short.copy_from_slice(&data[..Self::SHORT_LEN]);
        Some(Self(short))
    }

    /// Parse a hex key of at least 18 characters, truncating to 9 bytes.
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let prefix = hex_str
            .get(..Self::SHORT_LEN * 2)
            .ok_or_else(|| Error::InvalidHash(hex_str.to_string()))?;
        let bytes =
            hex::decode(prefix).map_err(|_| Error::InvalidHash(hex_str.to_string()))?;
        Self::from_full(&bytes).ok_or_else(|| Error::InvalidHash(hex_str.to_string()))
    }

    pub fn as_bytes(&self) -> &[u8; 9] {
        &self.0
    }
}

impl fmt::Display for EKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}
