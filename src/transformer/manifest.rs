//! On-disk manifest rewriting for content-script-only operation
//!
//! Background pages and service workers never run in this host; extensions
//! work through content scripts alone, with the generated compatibility
//! shim loaded first on every page.

use super::shim::{self, SHIM_FILENAME};
use crate::models::{ContentScript, Manifest};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const MANIFEST_FILENAME: &str = "manifest.json";
pub const BACKUP_FILENAME: &str = "manifest.json.backup";

pub struct ManifestTransformer {
    dir: PathBuf,
}

impl ManifestTransformer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn backup_path(&self) -> PathBuf {
        self.dir.join(BACKUP_FILENAME)
    }

    /// Pure transformation: no background execution, shim entry first.
    /// Running it on an already-transformed manifest changes nothing.
    pub fn transform(&self, manifest: &Manifest) -> Manifest {
        let mut result = manifest.clone();

        // background execution is removed unconditionally, wherever declared
        result.background = None;
        result.extra.remove("service_worker");

        // one shim entry, always first; drop stale copies before inserting
        result.content_scripts.retain(|cs| !is_shim_entry(cs));
        result.content_scripts.insert(0, shim_entry());

        result
    }

    /// Write the shim, back up the original manifest once, and persist the
    /// transformed manifest only when it differs from what was parsed.
    pub fn apply(&self, original_raw: &str, manifest: &Manifest) -> Result<Manifest> {
        let transformed = self.transform(manifest);

        // the manifest references the shim; the file must exist first
        shim::write_shim(&self.dir, &transformed)?;

        self.write_backup_once(original_raw)?;

        if manifest_changed(manifest, &transformed) {
            let serialized = serde_json::to_string_pretty(&transformed)
                .context("Failed to serialize transformed manifest")?;
            let path = self.dir.join(MANIFEST_FILENAME);
            fs::write(&path, serialized)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            log::info!("rewrote manifest in {}", self.dir.display());
        } else {
            log::debug!("manifest in {} already transformed", self.dir.display());
        }

        Ok(transformed)
    }

    fn write_backup_once(&self, original_raw: &str) -> Result<()> {
        let path = self.backup_path();
        if path.exists() {
            return Ok(());
        }
        fs::write(&path, original_raw)
            .with_context(|| format!("Failed to write {}", path.display()))
    }
}

/// The synthetic entry loading the shim on every page, every frame, at the
/// earliest script-execution point.
fn shim_entry() -> ContentScript {
    ContentScript {
        matches: vec!["<all_urls>".to_string()],
        js: vec![SHIM_FILENAME.to_string()],
        css: Vec::new(),
        run_at: Some("document_start".to_string()),
        all_frames: true,
    }
}

fn is_shim_entry(content_script: &ContentScript) -> bool {
    content_script.js.iter().any(|js| js == SHIM_FILENAME)
}

fn manifest_changed(before: &Manifest, after: &Manifest) -> bool {
    let before = serde_json::to_value(before).ok();
    let after = serde_json::to_value(after).ok();
    // on a serialization failure, rewrite rather than silently skip
    before.is_none() || before != after
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_manifest_from_str;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const SERVICE_WORKER_MANIFEST: &str = r#"{
        "manifest_version": 3,
        "name": "Background Heavy",
        "version": "1.0",
        "background": {"service_worker": "bg.js"}
    }"#;

    #[test]
    fn test_transform_removes_background_and_prepends_shim() {
        let manifest = parse_manifest_from_str(SERVICE_WORKER_MANIFEST).unwrap();
        let transformer = ManifestTransformer::new("unused");

        let result = transformer.transform(&manifest);
        assert!(result.background.is_none());
        assert_eq!(result.content_scripts.len(), 1);

        let entry = &result.content_scripts[0];
        assert_eq!(entry.matches, vec!["<all_urls>"]);
        assert_eq!(entry.js, vec![SHIM_FILENAME]);
        assert_eq!(entry.run_at.as_deref(), Some("document_start"));
        assert!(entry.all_frames);
    }

    #[test]
    fn test_transform_is_idempotent() {
        let manifest = parse_manifest_from_str(SERVICE_WORKER_MANIFEST).unwrap();
        let transformer = ManifestTransformer::new("unused");

        let once = transformer.transform(&manifest);
        let twice = transformer.transform(&once);

        assert_eq!(
            serde_json::to_value(&once).unwrap(),
            serde_json::to_value(&twice).unwrap()
        );
        let shim_entries = twice
            .content_scripts
            .iter()
            .filter(|cs| is_shim_entry(cs))
            .count();
        assert_eq!(shim_entries, 1);
    }

    #[test]
    fn test_shim_entry_stays_first_ahead_of_existing_scripts() {
        let manifest = parse_manifest_from_str(
            r#"{
                "manifest_version": 2,
                "name": "Has Scripts",
                "version": "0.3",
                "content_scripts": [
                    {"matches": ["https://x.com/*"], "js": ["main.js"]}
                ]
            }"#,
        )
        .unwrap();

        let result = ManifestTransformer::new("unused").transform(&manifest);
        assert_eq!(result.content_scripts.len(), 2);
        assert!(is_shim_entry(&result.content_scripts[0]));
        assert_eq!(result.content_scripts[1].js, vec!["main.js"]);
    }

    #[test]
    fn test_apply_backs_up_once_and_persists() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(MANIFEST_FILENAME), SERVICE_WORKER_MANIFEST).unwrap();

        let manifest = parse_manifest_from_str(SERVICE_WORKER_MANIFEST).unwrap();
        let transformer = ManifestTransformer::new(dir.path());
        transformer.apply(SERVICE_WORKER_MANIFEST, &manifest).unwrap();

        // backup holds the pre-transform bytes
        let backup = fs::read_to_string(transformer.backup_path()).unwrap();
        assert_eq!(backup, SERVICE_WORKER_MANIFEST);

        // on-disk manifest was rewritten
        let on_disk = fs::read_to_string(dir.path().join(MANIFEST_FILENAME)).unwrap();
        assert!(!on_disk.contains("service_worker"));
        assert!(on_disk.contains(SHIM_FILENAME));
        assert!(dir.path().join(SHIM_FILENAME).exists());

        // a second pass must not overwrite the backup with transformed bytes
        let reparsed = parse_manifest_from_str(&on_disk).unwrap();
        transformer.apply(&on_disk, &reparsed).unwrap();
        let backup_again = fs::read_to_string(transformer.backup_path()).unwrap();
        assert_eq!(backup_again, SERVICE_WORKER_MANIFEST);
    }

    #[test]
    fn test_apply_twice_keeps_single_shim_entry() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(MANIFEST_FILENAME), SERVICE_WORKER_MANIFEST).unwrap();

        let manifest = parse_manifest_from_str(SERVICE_WORKER_MANIFEST).unwrap();
        let transformer = ManifestTransformer::new(dir.path());
        transformer.apply(SERVICE_WORKER_MANIFEST, &manifest).unwrap();

        let on_disk = fs::read_to_string(dir.path().join(MANIFEST_FILENAME)).unwrap();
        let reparsed = parse_manifest_from_str(&on_disk).unwrap();
        let result = transformer.apply(&on_disk, &reparsed).unwrap();

        assert!(result.background.is_none());
        assert_eq!(
            result
                .content_scripts
                .iter()
                .filter(|cs| is_shim_entry(cs))
                .count(),
            1
        );
    }
}
