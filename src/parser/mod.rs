//! Manifest parsing

pub mod manifest;

pub use manifest::{parse_manifest, parse_manifest_from_file, parse_manifest_from_str, ManifestError};
