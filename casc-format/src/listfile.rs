//! Listfile support: mapping Jenkins path hashes back to names.
//!
//! Some root dialects only expose hashed names; a community-maintained
//! listfile (one path per line) recovers the readable ones.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read};
use tracing::debug;

use crate::Result;
use crate::jenkins::hash_path;

/// Parse a listfile into a hash → path map.
pub fn parse<R: Read>(reader: R) -> Result<HashMap<u32, String>> {
    let mut names = HashMap::new();
    for line in BufReader::new(reader).lines() {
        let line = line?;
        let path = line.trim();
        if path.is_empty() {
            continue;
        }
        names.insert(hash_path(path), path.to_string());
    }
    debug!(names = names.len(), "loaded listfile");
    Ok(names)
}
