//! Root table parsing, one dialect per product family.
//!
//! The root table is the only CASC structure whose layout depends on the
//! game: Warcraft III and Hearthstone ship pipe-separated text, Diablo III
//! ships a binary catalog of SNO (Serialized Named Object) IDs spread over
//! per-directory manifests. The dialect is chosen by the build config's
//! `build-uid`.

use async_trait::async_trait;
use byteorder::{LittleEndian, ReadBytesExt};
use std::collections::HashMap;
use std::io::{Cursor, Read};
use tracing::{debug, trace, warn};

use crate::{CKey, Error, Result};

/// Number of SNO groups in a Diablo III CoreTOC header.
const D3_SNO_GROUPS: usize = 70;

/// What a root entry is addressed by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootId {
    /// A path (or path-like token) usable directly as a file name.
    Named(String),
    /// A bare Diablo III asset id.
    Sno(i32),
    /// An indexed subfile of a Diablo III asset.
    SnoIndexed { group: u32, sno: i32, sub: i32 },
}

/// One `(id, ckey)` pair from the root table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootEntry {
    pub id: RootId,
    pub ckey: CKey,
}

impl RootEntry {
    pub fn named(name: impl Into<String>, ckey: CKey) -> Self {
        Self {
            id: RootId::Named(name.into()),
            ckey,
        }
    }
}

/// Fetch seam for dialects that chase auxiliary files.
///
/// The Diablo III root names directory manifests by CKey; the parser pulls
/// them through this trait so it stays ignorant of archives and CDNs.
pub trait RootSource {
    fn fetch(&mut self, ckey: &CKey) -> Option<Vec<u8>>;
}

/// Async flavor of [`RootSource`], for resolvers whose fetches suspend.
#[async_trait]
pub trait AsyncRootSource: Send {
    async fn fetch(&mut self, ckey: &CKey) -> Option<Vec<u8>>;
}

/// A [`RootSource`] with nothing to offer. Fine for the text dialects.
pub struct NoSource;

impl RootSource for NoSource {
    fn fetch(&mut self, _ckey: &CKey) -> Option<Vec<u8>> {
        None
    }
}

#[async_trait]
impl AsyncRootSource for NoSource {
    async fn fetch(&mut self, _ckey: &CKey) -> Option<Vec<u8>> {
        None
    }
}

/// Root table dialect, keyed on the `build-uid` prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootDialect {
    Warcraft3,
    Hearthstone,
    Wow,
    Diablo3,
}

impl RootDialect {
    /// Pick the dialect for a product's `build-uid`.
    pub fn from_build_uid(uid: &str) -> Result<Self> {
        if uid.starts_with("w3") {
            Ok(Self::Warcraft3)
        } else if uid.starts_with("hs") {
            Ok(Self::Hearthstone)
        } else if uid.starts_with("wow") {
            Ok(Self::Wow)
        } else if uid.starts_with("d3") {
            Ok(Self::Diablo3)
        } else {
            Err(Error::UnsupportedDialect(uid.to_string()))
        }
    }

    /// Parse a root table into its translate entries.
    pub fn parse(self, data: &[u8], source: &mut dyn RootSource) -> Result<Vec<RootEntry>> {
        match self {
            Self::Warcraft3 | Self::Hearthstone | Self::Wow => parse_text_root(data),
            Self::Diablo3 => {
                let directories = parse_d3_directories(data)?;
                let blobs = directories
                    .iter()
                    .map(|(_, ckey)| source.fetch(ckey))
                    .collect();
                assemble_d3(&directories, blobs)
            }
        }
    }

    /// [`parse`](Self::parse) for resolvers whose fetches suspend.
    pub async fn aparse(
        self,
        data: &[u8],
        source: &mut dyn AsyncRootSource,
    ) -> Result<Vec<RootEntry>> {
        match self {
            Self::Warcraft3 | Self::Hearthstone | Self::Wow => parse_text_root(data),
            Self::Diablo3 => {
                let directories = parse_d3_directories(data)?;
                let mut blobs = Vec::with_capacity(directories.len());
                for (_, ckey) in &directories {
                    blobs.push(source.fetch(ckey).await);
                }
                assemble_d3(&directories, blobs)
            }
        }
    }
}

/// `path|ckey|locale_flags|content_flags` lines.
fn parse_text_root(data: &[u8]) -> Result<Vec<RootEntry>> {
    let text = std::str::from_utf8(data)
        .map_err(|_| Error::InvalidRoot("text root is not UTF-8".to_string()))?;

    let mut entries = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split('|');
        let (Some(path), Some(ckey_hex)) = (fields.next(), fields.next()) else {
            warn!(line, "skipping malformed root line");
            continue;
        };
        let Ok(ckey) = CKey::from_hex(ckey_hex.trim()) else {
            warn!(line, "skipping root line with bad ckey");
            continue;
        };
        entries.push(RootEntry::named(path.trim(), ckey));
    }

    debug!(entries = entries.len(), "parsed text root");
    Ok(entries)
}

fn read_ckey<R: Read>(reader: &mut R) -> Result<CKey> {
    let mut bytes = [0u8; 16];
    reader.read_exact(&mut bytes)?;
    Ok(CKey::new(bytes))
}

fn read_cstr<R: Read>(reader: &mut R) -> Result<String> {
    let mut bytes = Vec::new();
    loop {
        let mut byte = [0u8; 1];
        reader.read_exact(&mut byte)?;
        if byte[0] == 0 {
            break;
        }
        bytes.push(byte[0]);
    }
    String::from_utf8(bytes).map_err(|_| Error::InvalidRoot("non-UTF-8 name".to_string()))
}

/// Diablo III root blob: a count of named directory manifests.
fn parse_d3_directories(data: &[u8]) -> Result<Vec<(String, CKey)>> {
    let mut cursor = Cursor::new(data);
    let dir_count = cursor.read_u32::<LittleEndian>()? as usize;

    // A declared count bigger than the blob could hold is garbage.
    if dir_count > data.len() / 17 {
        return Err(Error::InvalidRoot(format!(
            "implausible directory count: {dir_count}"
        )));
    }

    let mut directories = Vec::with_capacity(dir_count);
    for _ in 0..dir_count {
        let ckey = read_ckey(&mut cursor)?;
        let name = read_cstr(&mut cursor)?;
        directories.push((name, ckey));
    }
    Ok(directories)
}

/// Diablo III: each directory manifest contributes SNO and named entries;
/// `CoreTOC.dat` supplies the group of each SNO, `Packages.dat` the full
/// file names. `blobs` pairs with `directories` by index, `None` marking a
/// manifest the source could not produce.
fn assemble_d3(
    directories: &[(String, CKey)],
    blobs: Vec<Option<Vec<u8>>>,
) -> Result<Vec<RootEntry>> {
    let mut entries: Vec<RootEntry> = directories
        .iter()
        .map(|(name, ckey)| RootEntry::named(name.clone(), *ckey))
        .collect();

    let blob_for = |wanted: &str| {
        directories
            .iter()
            .position(|(name, _)| name == wanted)
            .and_then(|i| blobs[i].as_deref())
    };

    let sno_groups = blob_for("CoreTOC.dat")
        .map(parse_core_toc)
        .transpose()?
        .unwrap_or_default();
    let packages = blob_for("Packages.dat")
        .map(parse_packages)
        .transpose()?
        .unwrap_or_default();

    for ((name, _), blob) in directories.iter().zip(&blobs) {
        if name == "CoreTOC.dat" || name == "Packages.dat" {
            continue;
        }
        let Some(blob) = blob else {
            trace!(directory = %name, "directory manifest not resolvable, skipping");
            continue;
        };
        if let Err(e) = parse_d3_directory(blob, name, &sno_groups, &packages, &mut entries) {
            // One unreadable directory should not sink the whole table.
            warn!(directory = %name, error = %e, "skipping unparseable directory manifest");
        }
    }

    debug!(entries = entries.len(), "parsed d3 root");
    Ok(entries)
}

/// A directory manifest: magic, then asset / indexed-asset / named tables.
fn parse_d3_directory(
    data: &[u8],
    dir_name: &str,
    sno_groups: &HashMap<i32, u32>,
    packages: &HashMap<String, String>,
    entries: &mut Vec<RootEntry>,
) -> Result<()> {
    let mut cursor = Cursor::new(data);
    let _magic = cursor.read_u32::<LittleEndian>()?;

    let asset_count = cursor.read_u32::<LittleEndian>()? as usize;
    for _ in 0..asset_count {
        let ckey = read_ckey(&mut cursor)?;
        let sno = cursor.read_i32::<LittleEndian>()?;
        entries.push(RootEntry {
            id: RootId::Sno(sno),
            ckey,
        });
    }

    let indexed_count = cursor.read_u32::<LittleEndian>()? as usize;
    for _ in 0..indexed_count {
        let ckey = read_ckey(&mut cursor)?;
        let sno = cursor.read_i32::<LittleEndian>()?;
        let sub = cursor.read_i32::<LittleEndian>()?;
        entries.push(RootEntry {
            id: RootId::SnoIndexed {
                group: sno_groups.get(&sno).copied().unwrap_or(0),
                sno,
                sub,
            },
            ckey,
        });
    }

    let named_count = cursor.read_u32::<LittleEndian>()? as usize;
    for _ in 0..named_count {
        let ckey = read_ckey(&mut cursor)?;
        let name = read_cstr(&mut cursor)?;
        let full = format!("{dir_name}\\{name}");
        let full = packages
            .get(&full.to_ascii_uppercase())
            .cloned()
            .unwrap_or(full);
        entries.push(RootEntry::named(full, ckey));
    }

    Ok(())
}

/// CoreTOC.dat: 70 per-group counts, then `(sno, ptoc_offset, pad)` records
/// per group. Yields the sno → group map.
fn parse_core_toc(data: &[u8]) -> Result<HashMap<i32, u32>> {
    let mut cursor = Cursor::new(data);

    let mut counts = [0u32; D3_SNO_GROUPS];
    for count in &mut counts {
        *count = cursor.read_u32::<LittleEndian>()?;
    }

    let mut groups = HashMap::new();
    for (group, &count) in counts.iter().enumerate() {
        for _ in 0..count {
            let sno = cursor.read_i32::<LittleEndian>()?;
            let _ptoc_offset = cursor.read_i32::<LittleEndian>()?;
            let _pad = cursor.read_i32::<LittleEndian>()?;
            groups.entry(sno).or_insert(group as u32);
        }
    }

    trace!(snos = groups.len(), "parsed CoreTOC");
    Ok(groups)
}

/// Packages.dat: magic, count, then NUL-terminated full paths. Keyed by the
/// uppercased extension-less path for lookup.
fn parse_packages(data: &[u8]) -> Result<HashMap<String, String>> {
    let mut cursor = Cursor::new(data);
    let _magic = cursor.read_u32::<LittleEndian>()?;
    let count = cursor.read_u32::<LittleEndian>()? as usize;

    let mut packages = HashMap::new();
    for _ in 0..count {
        let path = read_cstr(&mut cursor)?;
        let stem = path
            .rsplit_once('.')
            .map_or(path.as_str(), |(stem, _)| stem)
            .to_ascii_uppercase();
        packages.entry(stem).or_insert(path);
    }

    trace!(paths = packages.len(), "parsed Packages.dat");
    Ok(packages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dialect_dispatch() {
        assert_eq!(
            RootDialect::from_build_uid("w3").unwrap(),
            RootDialect::Warcraft3
        );
        assert_eq!(
            RootDialect::from_build_uid("w3t").unwrap(),
            RootDialect::Warcraft3
        );
        assert_eq!(
            RootDialect::from_build_uid("hsb").unwrap(),
            RootDialect::Hearthstone
        );
        assert_eq!(
            RootDialect::from_build_uid("wow_classic").unwrap(),
            RootDialect::Wow
        );
        assert_eq!(
            RootDialect::from_build_uid("d3").unwrap(),
            RootDialect::Diablo3
        );
        assert!(matches!(
            RootDialect::from_build_uid("pro"),
            Err(Error::UnsupportedDialect(_))
        ));
    }

    #[test]
    fn text_root_lines() {
        let text = "\
# comment
war3.w3mod:_hd.w3mod:abilities\\unit.mdx|11223344556677889900aabbccddeeff|3|0
units\\human\\footman.txt|00112233445566778899aabbccddeeff|3|0

broken line without pipes
";
        let entries = RootDialect::Warcraft3
            .parse(text.as_bytes(), &mut NoSource)
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(
            entries[1].id,
            RootId::Named("units\\human\\footman.txt".to_string())
        );
        assert_eq!(
            entries[0].ckey,
            CKey::from_hex("11223344556677889900aabbccddeeff").unwrap()
        );
    }

    struct MapSource(HashMap<CKey, Vec<u8>>);

    impl RootSource for MapSource {
        fn fetch(&mut self, ckey: &CKey) -> Option<Vec<u8>> {
            self.0.get(ckey).cloned()
        }
    }

    fn d3_root_blob(dirs: &[(&str, CKey)]) -> Vec<u8> {
        let mut blob = Vec::new();
        blob.extend_from_slice(&(dirs.len() as u32).to_le_bytes());
        for (name, ckey) in dirs {
            blob.extend_from_slice(ckey.as_bytes());
            blob.extend_from_slice(name.as_bytes());
            blob.push(0);
        }
        blob
    }

    #[test]
    fn d3_root_emits_sno_entries() {
        let base_ckey = CKey::new([0x10; 16]);
        let toc_ckey = CKey::new([0x20; 16]);
        let asset_ckey = CKey::new([0x30; 16]);
        let indexed_ckey = CKey::new([0x31; 16]);
        let named_ckey = CKey::new([0x32; 16]);

        let root = d3_root_blob(&[("Base", base_ckey), ("CoreTOC.dat", toc_ckey)]);

        // CoreTOC: one record in group 2 for sno 7777.
        let mut toc = Vec::new();
        let mut counts = [0u32; D3_SNO_GROUPS];
        counts[2] = 1;
        for count in counts {
            toc.extend_from_slice(&count.to_le_bytes());
        }
        toc.extend_from_slice(&7777i32.to_le_bytes());
        toc.extend_from_slice(&0i32.to_le_bytes());
        toc.extend_from_slice(&0i32.to_le_bytes());

        // Base directory: one asset, one indexed asset, one named file.
        let mut dir = Vec::new();
        dir.extend_from_slice(&0xDEADu32.to_le_bytes());
        dir.extend_from_slice(&1u32.to_le_bytes());
        dir.extend_from_slice(asset_ckey.as_bytes());
        dir.extend_from_slice(&4242i32.to_le_bytes());
        dir.extend_from_slice(&1u32.to_le_bytes());
        dir.extend_from_slice(indexed_ckey.as_bytes());
        dir.extend_from_slice(&7777i32.to_le_bytes());
        dir.extend_from_slice(&5i32.to_le_bytes());
        dir.extend_from_slice(&1u32.to_le_bytes());
        dir.extend_from_slice(named_ckey.as_bytes());
        dir.extend_from_slice(b"SoundBank\\music.snd\0");

        let mut source = MapSource(HashMap::from([
            (toc_ckey, toc),
            (base_ckey, dir),
        ]));

        let entries = RootDialect::Diablo3.parse(&root, &mut source).unwrap();

        assert!(entries.contains(&RootEntry::named("Base", base_ckey)));
        assert!(entries.contains(&RootEntry {
            id: RootId::Sno(4242),
            ckey: asset_ckey,
        }));
        assert!(entries.contains(&RootEntry {
            id: RootId::SnoIndexed {
                group: 2,
                sno: 7777,
                sub: 5,
            },
            ckey: indexed_ckey,
        }));
        assert!(entries.contains(&RootEntry::named(
            "Base\\SoundBank\\music.snd",
            named_ckey,
        )));
    }

    #[test]
    fn d3_missing_directories_are_skipped() {
        let root = d3_root_blob(&[("Base", CKey::new([0x44; 16]))]);
        let entries = RootDialect::Diablo3.parse(&root, &mut NoSource).unwrap();
        // The directory itself is still listed by name.
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, RootId::Named("Base".to_string()));
    }
}
