//! The interface both resolver variants expose.

use async_trait::async_trait;

use casc_format::CKey;

use crate::types::FileInfo;
use crate::Result;

/// A read-only view into one CASC store.
///
/// A resolver is used by one client at a time; methods take `&mut self`
/// because queries may lazily discover sizes or synthesize records. CDN
/// fetches are the only suspension points — the local variant never
/// actually suspends.
#[async_trait]
pub trait CascReader {
    /// All `(name, ckey)` pairs the root table (plus synthetic entries)
    /// names.
    fn list_files(&self) -> Vec<(String, CKey)>;

    /// CKeys resolvable to content but without a name, paired with
    /// themselves to line up with [`list_files`](Self::list_files).
    fn list_unnamed_files(&self) -> Vec<(CKey, CKey)>;

    /// Name attached to a CKey's record, if any.
    fn get_name(&self, ckey: &CKey) -> Option<String>;

    /// Snapshot of everything known about a CKey. `None` when the CKey is
    /// absent from the encoding table.
    fn get_file_info(&mut self, ckey: &CKey) -> Option<FileInfo>;

    /// Decoded payload of a CKey, cut to `limit` bytes when given.
    /// `Ok(None)` when the CKey cannot be resolved.
    async fn get_file(&mut self, ckey: &CKey, limit: Option<usize>) -> Result<Option<Vec<u8>>>;

    /// Decoded size, discovered from the BLTE header on first call and
    /// memoized.
    async fn get_file_size(&mut self, ckey: &CKey) -> Result<Option<u64>>;

    /// BLTE chunk count, discovered alongside the size.
    async fn get_chunk_count(&mut self, ckey: &CKey) -> Result<Option<u32>>;

    /// Whether the bytes for a CKey are reachable right now: from disk, the
    /// local cache, or (when `include_cdn`) the network.
    async fn is_file_fetchable(&mut self, ckey: &CKey, include_cdn: bool) -> bool;
}
