//! Configuration manifests: key-value configs and pipe-separated tables.
//!
//! Two line-oriented dialects cover every CASC manifest. Build and CDN
//! configs are `key = value` text; `.build.info` and the patch service's
//! `/versions` and `/cdns` responses are tabular, with a typed header row
//! like `Region!STRING:0|BuildConfig!HEX:16|…`.

use std::collections::HashMap;
use tracing::{debug, trace};

use crate::{Error, Result};

/// A parsed `key = value` configuration.
///
/// Blank lines split the text into records; lookups search records in
/// order, so the common single-record configs behave as a flat map.
#[derive(Debug, Clone)]
pub struct KeyValueConfig {
    records: Vec<HashMap<String, String>>,
}

impl KeyValueConfig {
    /// Parse key-value configuration text.
    pub fn parse(text: &str) -> Self {
        let mut records = Vec::new();
        let mut current: HashMap<String, String> = HashMap::new();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                if !current.is_empty() {
                    records.push(std::mem::take(&mut current));
                }
                continue;
            }
            if line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                trace!(line, "skipping non key-value line");
                continue;
            };
            current.insert(key.trim().to_string(), value.trim().to_string());
        }
        if !current.is_empty() {
            records.push(current);
        }

        debug!(records = records.len(), "parsed key-value config");
        Self { records }
    }

    /// Look a key up across all records, first match wins.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.records
            .iter()
            .find_map(|r| r.get(key).map(String::as_str))
    }

    /// Like [`get`](Self::get) but a missing key is an error.
    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key).ok_or_else(|| Error::MissingKey(key.to_string()))
    }

    /// All records, in file order.
    pub fn records(&self) -> &[HashMap<String, String>] {
        &self.records
    }
}

/// Typed view over a build configuration.
///
/// Values that reference other files are `hash` or `hash size` pairs; only
/// the hashes matter here.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Product dialect tag, e.g. `w3`, `d3`, `wow`.
    pub build_uid: String,
    /// CKey of the root table.
    pub root: String,
    /// CKey and EKey of the encoding file, in that order.
    pub encoding: (String, String),
    /// CKey of the install manifest.
    pub install: String,
    /// CKey of the download manifest.
    pub download: String,
    /// CKey of the size manifest.
    pub size: String,
}

impl BuildConfig {
    /// Extract the typed fields from parsed key-value text.
    pub fn from_config(config: &KeyValueConfig) -> Result<Self> {
        let first_token = |key: &str| -> Result<String> {
            let value = config.require(key)?;
            value
                .split_whitespace()
                .next()
                .map(str::to_string)
                .ok_or_else(|| Error::InvalidConfig(format!("empty value for {key}")))
        };

        let encoding_raw = config.require("encoding")?;
        let mut parts = encoding_raw.split_whitespace();
        let (Some(enc_ckey), Some(enc_ekey)) = (parts.next(), parts.next()) else {
            return Err(Error::InvalidConfig(format!(
                "encoding must be a hash pair, got {encoding_raw:?}"
            )));
        };

        Ok(Self {
            build_uid: config.require("build-uid")?.to_string(),
            root: first_token("root")?,
            encoding: (enc_ckey.to_string(), enc_ekey.to_string()),
            install: first_token("install")?,
            download: first_token("download")?,
            size: first_token("size")?,
        })
    }

    /// Parse build configuration text directly.
    pub fn parse(text: &str) -> Result<Self> {
        Self::from_config(&KeyValueConfig::parse(text))
    }
}

/// Typed view over a CDN configuration.
#[derive(Debug, Clone)]
pub struct CdnConfig {
    /// Hex names of the archive files whose indexes should be loaded.
    pub archives: Vec<String>,
}

impl CdnConfig {
    /// Parse CDN configuration text.
    pub fn parse(text: &str) -> Result<Self> {
        let config = KeyValueConfig::parse(text);
        let archives = config
            .require("archives")?
            .split_whitespace()
            .map(str::to_string)
            .collect();
        Ok(Self { archives })
    }
}

/// One column of a tabular manifest, `Name!TYPE:len` in the header.
#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub type_spec: String,
}

/// A parsed tabular manifest (`.build.info`, `/versions`, `/cdns`).
#[derive(Debug, Clone)]
pub struct TableDocument {
    columns: Vec<Column>,
    rows: Vec<Vec<String>>,
}

impl TableDocument {
    /// Parse tabular manifest text.
    pub fn parse(text: &str) -> Result<Self> {
        let mut columns: Option<Vec<Column>> = None;
        let mut rows = Vec::new();

        for line in text.lines() {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() || line.starts_with('#') {
                // Includes `## seqn = N` directives from the patch service.
                continue;
            }

            match &columns {
                None => {
                    let parsed: Vec<Column> = line
                        .split('|')
                        .map(|field| {
                            let (name, type_spec) = field.split_once('!').unwrap_or((field, ""));
                            Column {
                                name: name.trim().to_string(),
                                type_spec: type_spec.trim().to_string(),
                            }
                        })
                        .collect();
                    if parsed.iter().any(|c| c.name.is_empty()) {
                        return Err(Error::InvalidConfig(format!(
                            "malformed table header: {line:?}"
                        )));
                    }
                    columns = Some(parsed);
                }
                Some(columns) => {
                    let values: Vec<String> =
                        line.split('|').map(|v| v.trim().to_string()).collect();
                    if values.len() != columns.len() {
                        return Err(Error::InvalidConfig(format!(
                            "row has {} fields, header has {}",
                            values.len(),
                            columns.len()
                        )));
                    }
                    rows.push(values);
                }
            }
        }

        let columns = columns
            .ok_or_else(|| Error::InvalidConfig("table document has no header".to_string()))?;
        debug!(
            columns = columns.len(),
            rows = rows.len(),
            "parsed table document"
        );
        Ok(Self { columns, rows })
    }

    /// Column definitions, in header order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Number of data rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// `true` when the document has no data rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterate the rows as name-addressable views.
    pub fn rows(&self) -> impl Iterator<Item = TableRow<'_>> {
        self.rows.iter().map(move |values| TableRow {
            columns: &self.columns,
            values,
        })
    }

    /// First row where `column == value`.
    pub fn find_row(&self, column: &str, value: &str) -> Option<TableRow<'_>> {
        self.rows().find(|row| row.get(column) == Some(value))
    }
}

/// Name-addressable view over one table row.
#[derive(Debug, Clone, Copy)]
pub struct TableRow<'a> {
    columns: &'a [Column],
    values: &'a [String],
}

impl TableRow<'_> {
    /// Value of the named column, if the column exists.
    pub fn get(&self, column: &str) -> Option<&str> {
        let index = self.columns.iter().position(|c| c.name == column)?;
        self.values.get(index).map(String::as_str)
    }

    /// Like [`get`](Self::get) but a missing column is an error.
    pub fn require(&self, column: &str) -> Result<&str> {
        self.get(column)
            .ok_or_else(|| Error::MissingKey(column.to_string()))
    }
}
