//! The translation tables owned by a resolver instance.

use std::collections::{HashMap, HashSet};
use tracing::debug;

use casc_format::config::BuildConfig;
use casc_format::root::{RootEntry, RootId};
use casc_format::{CKey, EKey};

use crate::types::FileInfo;

/// The three tables of a CASC store, frozen after construction except for
/// the lazily-discovered size fields on individual [`FileInfo`] records.
#[derive(Default, Debug)]
pub(crate) struct ResolverTables {
    /// CKey → short EKey, from the encoding file.
    pub ckey_map: HashMap<CKey, EKey>,
    /// Short EKey → file record, from the indexes.
    pub file_table: HashMap<EKey, FileInfo>,
    /// Root translate entries, in table order.
    pub translate: Vec<RootEntry>,
}

impl ResolverTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// EKey a CKey resolves to, if the encoding file listed it.
    pub fn ekey_for(&self, ckey: &CKey) -> Option<EKey> {
        self.ckey_map.get(ckey).copied()
    }

    /// File record a CKey resolves to.
    pub fn info(&self, ckey: &CKey) -> Option<&FileInfo> {
        self.file_table.get(&self.ekey_for(ckey)?)
    }

    pub fn info_mut(&mut self, ckey: &CKey) -> Option<&mut FileInfo> {
        let ekey = self.ekey_for(ckey)?;
        self.file_table.get_mut(&ekey)
    }

    /// All `(name, ckey)` pairs with a named translate entry.
    pub fn list_files(&self) -> Vec<(String, CKey)> {
        self.translate
            .iter()
            .filter_map(|entry| match &entry.id {
                RootId::Named(name) => Some((name.clone(), entry.ckey)),
                _ => None,
            })
            .collect()
    }

    /// CKeys resolvable to a file record but carrying no name. Paired with
    /// themselves to line up with [`list_files`](Self::list_files).
    pub fn list_unnamed_files(&self) -> Vec<(CKey, CKey)> {
        let named: HashSet<CKey> = self
            .translate
            .iter()
            .filter(|entry| matches!(entry.id, RootId::Named(_)))
            .map(|entry| entry.ckey)
            .collect();

        let mut unnamed: Vec<(CKey, CKey)> = self
            .ckey_map
            .iter()
            .filter(|(ckey, ekey)| !named.contains(ckey) && self.file_table.contains_key(ekey))
            .map(|(ckey, _)| (*ckey, *ckey))
            .collect();
        unnamed.sort();
        unnamed
    }

    /// Append the synthetic names for the manifests every build carries.
    pub fn append_synthetic(&mut self, config: &BuildConfig, root_ckey: CKey) {
        self.translate.push(RootEntry::named("_ROOT", root_ckey));
        for (name, hash) in [
            ("_ENCODING", &config.encoding.0),
            ("_INSTALL", &config.install),
            ("_DOWNLOAD", &config.download),
            ("_SIZE", &config.size),
        ] {
            match CKey::from_hex(hash) {
                Ok(ckey) => self.translate.push(RootEntry::named(name, ckey)),
                Err(_) => debug!(name, hash, "skipping synthetic entry with bad hash"),
            }
        }
    }

    /// Stamp CKey backlinks and names onto the file records. Later named
    /// entries win, so the synthetic names take precedence.
    pub fn finalize(&mut self) {
        for (ckey, ekey) in &self.ckey_map {
            if let Some(info) = self.file_table.get_mut(ekey) {
                info.ckey = Some(*ckey);
            }
        }

        let names: Vec<(CKey, String)> = self
            .translate
            .iter()
            .filter_map(|entry| match &entry.id {
                RootId::Named(name) => Some((entry.ckey, name.clone())),
                _ => None,
            })
            .collect();
        for (ckey, name) in names {
            if let Some(info) = self.info_mut(&ckey) {
                info.name = Some(name);
            }
        }

        debug!(
            ckeys = self.ckey_map.len(),
            files = self.file_table.len(),
            translate = self.translate.len(),
            "resolver tables finalized"
        );
    }

    /// Rewrite hash-only names through a listfile's hash → path map.
    pub fn apply_listfile(&mut self, names: &HashMap<u32, String>) {
        for entry in &mut self.translate {
            let RootId::Named(name) = &entry.id else {
                continue;
            };
            // Hash-only entries are 8 hex chars; leave real paths alone.
            if name.len() != 8 {
                continue;
            }
            if let Ok(hash) = u32::from_str_radix(name, 16) {
                if let Some(path) = names.get(&hash) {
                    entry.id = RootId::Named(path.clone());
                }
            }
        }
    }
}
