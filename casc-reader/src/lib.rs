//! Read-only CASC resolvers.
//!
//! A resolver owns the three translation tables of a CASC store — root
//! names to content keys, content keys to encoding keys, encoding keys to
//! archive locations — and streams decoded payloads on demand. Two
//! variants share one interface: [`LocalCascReader`] walks a game
//! installation's `Data/` tree, [`CdnCascReader`] works straight off the
//! content delivery network through [`casc_cdn`].

mod archive;
mod cdn;
mod error;
mod idx;
mod local;
mod reader;
mod tables;
mod types;

pub use casc_format::{CKey, EKey};
pub use cdn::CdnCascReader;
pub use error::{Error, Result};
pub use idx::IdxEntry;
pub use local::LocalCascReader;
pub use reader::CascReader;
pub use types::{DataSource, FileInfo};
