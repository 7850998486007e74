//! Manifest parsing functionality

use crate::models::Manifest;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest at {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("manifest is not valid UTF-8")]
    NotUtf8,

    #[error("failed to parse manifest: {0}")]
    Invalid(#[from] json5::Error),

    #[error("unsupported manifest version: {0}")]
    UnsupportedVersion(u8),
}

/// Parse manifest.json from bytes
pub fn parse_manifest(content: &[u8]) -> Result<Manifest, ManifestError> {
    let content_str = std::str::from_utf8(content).map_err(|_| ManifestError::NotUtf8)?;

    // json5 tolerates the comments some shipped manifests carry
    let manifest: Manifest = json5::from_str(content_str)?;

    if manifest.manifest_version != 2 && manifest.manifest_version != 3 {
        return Err(ManifestError::UnsupportedVersion(manifest.manifest_version));
    }

    Ok(manifest)
}

/// Parse manifest.json from file path
pub fn parse_manifest_from_file(path: impl AsRef<Path>) -> Result<Manifest, ManifestError> {
    let path = path.as_ref();
    let content = std::fs::read(path).map_err(|source| ManifestError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;
    parse_manifest(&content)
}

/// Parse manifest.json from string
pub fn parse_manifest_from_str(content: &str) -> Result<Manifest, ManifestError> {
    parse_manifest(content.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_manifest() {
        let json = r#"{
            "manifest_version": 3,
            "name": "Test Extension",
            "version": "1.0.0"
        }"#;

        let manifest = parse_manifest_from_str(json).unwrap();
        assert_eq!(manifest.manifest_version, 3);
        assert_eq!(manifest.name, "Test Extension");
        assert_eq!(manifest.version, "1.0.0");
    }

    #[test]
    fn test_parse_with_service_worker() {
        let json = r#"{
            "manifest_version": 3,
            "name": "Test",
            "version": "1.0",
            "background": {
                "service_worker": "background.js"
            }
        }"#;

        let manifest = parse_manifest_from_str(json).unwrap();
        assert!(manifest.background.is_some());
        assert_eq!(
            manifest.background.unwrap().service_worker.unwrap(),
            "background.js"
        );
    }

    #[test]
    fn test_parse_with_comments() {
        let json = r#"{
            // This is a comment
            "manifest_version": 2,
            "name": "Test Extension", // inline comment
            /* Block comment */
            "version": "1.0.0"
        }"#;

        let manifest = parse_manifest_from_str(json).unwrap();
        assert_eq!(manifest.manifest_version, 2);
    }

    #[test]
    fn test_unknown_keys_round_trip() {
        let json = r#"{
            "manifest_version": 3,
            "name": "Test",
            "version": "1.0",
            "minimum_chrome_version": "110"
        }"#;

        let manifest = parse_manifest_from_str(json).unwrap();
        assert!(manifest.extra.contains_key("minimum_chrome_version"));

        let serialized = serde_json::to_string(&manifest).unwrap();
        assert!(serialized.contains("minimum_chrome_version"));
    }

    #[test]
    fn test_rejects_unknown_version() {
        let json = r#"{"manifest_version": 1, "name": "Old", "version": "0.1"}"#;
        assert!(matches!(
            parse_manifest_from_str(json),
            Err(ManifestError::UnsupportedVersion(1))
        ));
    }
}
