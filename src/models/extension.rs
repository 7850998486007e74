//! Extension directory metadata

use super::manifest::Manifest;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct ExtensionMetadata {
    pub name: String,
    pub version: String,
    pub manifest_version: u8,
    pub dir: PathBuf,
    pub size_bytes: u64,
    pub file_count: usize,
    pub has_background: bool,
    pub has_content_scripts: bool,
}

impl ExtensionMetadata {
    /// Collect metadata for an extension directory after its manifest parsed.
    pub fn collect(dir: &Path, manifest: &Manifest) -> Self {
        let mut size_bytes = 0u64;
        let mut file_count = 0usize;

        for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
            if entry.file_type().is_file() {
                file_count += 1;
                size_bytes += entry.metadata().map(|m| m.len()).unwrap_or(0);
            }
        }

        Self {
            name: manifest.name.clone(),
            version: manifest.version.clone(),
            manifest_version: manifest.manifest_version,
            dir: dir.to_path_buf(),
            size_bytes,
            file_count,
            has_background: manifest.background.is_some(),
            has_content_scripts: !manifest.content_scripts.is_empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_collect_counts_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("manifest.json"), "{}").unwrap();
        fs::write(dir.path().join("content.js"), "// empty").unwrap();

        let manifest = crate::parser::parse_manifest_from_str(
            r#"{"manifest_version": 3, "name": "Meta", "version": "0.1"}"#,
        )
        .unwrap();

        let metadata = ExtensionMetadata::collect(dir.path(), &manifest);
        assert_eq!(metadata.file_count, 2);
        assert!(metadata.size_bytes > 0);
        assert!(!metadata.has_background);
    }
}
