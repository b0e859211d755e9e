//! Parsers for the metadata formats that make up a CASC store.
//!
//! CASC resolves a file through three chained tables: a *root* table mapping
//! names or asset IDs to content keys, an *encoding* table mapping content
//! keys to encoding keys, and archive *indexes* mapping encoding keys to
//! byte ranges. This crate parses those tables plus the line-oriented
//! configuration manifests that point at them. Nothing here does I/O beyond
//! `Read`; fetching is the caller's business.

pub mod binutil;
pub mod cdn_index;
pub mod config;
pub mod encoding;
pub mod jenkins;
pub mod listfile;
pub mod root;

mod error;
mod keys;

pub use error::{Error, Result};
pub use keys::{CKey, EKey};
