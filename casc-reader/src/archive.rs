//! Byte access into the local `data.{NNN}` archive files.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::trace;

use crate::{Error, Result};

/// Path of archive number `id` under `Data/data/`.
pub fn archive_path(data_dir: &Path, id: u16) -> PathBuf {
    data_dir.join(format!("data.{id:03}"))
}

/// Read `len` bytes at `offset` from archive `id`.
///
/// The range must lie inside the archive; an index entry pointing past the
/// end means the index and archive disagree.
pub fn read_slice(data_dir: &Path, id: u16, offset: u64, len: u64) -> Result<Vec<u8>> {
    let path = archive_path(data_dir, id);
    let mut file = File::open(&path)
        .map_err(|e| Error::InvalidIndex(format!("archive {} unreadable: {e}", path.display())))?;

    let archive_len = file.metadata()?.len();
    if offset + len > archive_len {
        return Err(Error::InvalidIndex(format!(
            "entry [{offset}, {}) exceeds archive {} ({archive_len} bytes)",
            offset + len,
            path.display()
        )));
    }

    trace!(archive = id, offset, len, "archive read");
    file.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0u8; len as usize];
    file.read_exact(&mut buf)?;
    Ok(buf)
}

/// Length of archive `id`, or `None` when the file is absent.
pub fn archive_len(data_dir: &Path, id: u16) -> Option<u64> {
    std::fs::metadata(archive_path(data_dir, id))
        .ok()
        .map(|m| m.len())
}
