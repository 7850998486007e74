//! Extension transformation: manifest rewriting and shim generation

pub mod manifest;
pub mod shim;

pub use manifest::{ManifestTransformer, BACKUP_FILENAME, MANIFEST_FILENAME};
pub use shim::{shim_source, write_shim, SHIM_FILENAME};
