//! Extension discovery and registration
//!
//! Runs once at startup: scan the extensions root, transform each extension
//! in place, then hand it to the host's native registration primitive. One
//! extension's failure never disturbs its siblings; a registration failure
//! gets exactly one fallback attempt with the host's default options.

use crate::host::{HostError, LoadOptions, SessionHost};
use crate::models::{ExtensionMetadata, Manifest};
use crate::parser;
use crate::report::{LoadReport, LoadedExtension, SkippedExtension};
use crate::transformer::{ManifestTransformer, MANIFEST_FILENAME};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub struct ExtensionLoader {
    root: PathBuf,
    options: LoadOptions,
}

impl ExtensionLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            options: LoadOptions::content_script_only(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Transform every discovered extension and register it with the host.
    pub fn load_all(&self, session: &mut dyn SessionHost) -> Result<LoadReport> {
        self.run(Some(session))
    }

    /// Transform-only pass with no host attached (CLI `prepare`).
    pub fn prepare_all(&self) -> Result<LoadReport> {
        self.run(None)
    }

    fn run(&self, mut session: Option<&mut dyn SessionHost>) -> Result<LoadReport> {
        let mut report = LoadReport::default();

        for dir in self.discover()? {
            match self.prepare_one(&dir) {
                Ok((manifest, metadata)) => {
                    let registration = match session.as_deref_mut() {
                        Some(session) => match self.register(session, &dir) {
                            Ok(outcome) => Some(outcome),
                            Err(err) => {
                                log::error!(
                                    "extension {} failed to register: {err}",
                                    dir.display()
                                );
                                report.skipped.push(SkippedExtension {
                                    dir,
                                    reason: format!("registration failed: {err}"),
                                });
                                continue;
                            }
                        },
                        None => None,
                    };

                    let (id, fallback) = match registration {
                        Some((id, fallback)) => (Some(id), fallback),
                        None => (None, false),
                    };

                    report.loaded.push(LoadedExtension {
                        id,
                        name: manifest.name.clone(),
                        version: manifest.version.clone(),
                        manifest_version: manifest.manifest_version,
                        dir,
                        fallback,
                        file_count: metadata.file_count,
                        size_bytes: metadata.size_bytes,
                    });
                }
                Err(reason) => {
                    log::warn!("skipping extension {}: {reason}", dir.display());
                    report.skipped.push(SkippedExtension { dir, reason });
                }
            }
        }

        Ok(report)
    }

    /// List extension subdirectories, sorted for deterministic log and
    /// fallback ordering. A missing root is created, not an error.
    fn discover(&self) -> Result<Vec<PathBuf>> {
        if !self.root.exists() {
            log::info!(
                "extensions directory {} not found, creating",
                self.root.display()
            );
            fs::create_dir_all(&self.root).with_context(|| {
                format!("Failed to create extensions root {}", self.root.display())
            })?;
            return Ok(Vec::new());
        }

        let mut dirs = Vec::new();
        let entries = fs::read_dir(&self.root).with_context(|| {
            format!("Failed to list extensions root {}", self.root.display())
        })?;
        for entry in entries {
            let entry = entry.context("Failed to read extensions root entry")?;
            if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                dirs.push(entry.path());
            }
        }
        dirs.sort();
        Ok(dirs)
    }

    /// Parse and transform one extension in place. Failures return the
    /// skip reason instead of aborting the pass.
    fn prepare_one(&self, dir: &Path) -> std::result::Result<(Manifest, ExtensionMetadata), String> {
        let manifest_path = dir.join(MANIFEST_FILENAME);
        if !manifest_path.exists() {
            return Err(format!("missing {MANIFEST_FILENAME}"));
        }

        let raw = fs::read_to_string(&manifest_path)
            .map_err(|err| format!("unreadable {MANIFEST_FILENAME}: {err}"))?;
        let manifest =
            parser::parse_manifest_from_str(&raw).map_err(|err| err.to_string())?;

        let transformed = ManifestTransformer::new(dir)
            .apply(&raw, &manifest)
            .map_err(|err| format!("transform failed: {err}"))?;

        let metadata = ExtensionMetadata::collect(dir, &transformed);
        Ok((transformed, metadata))
    }

    /// First attempt with content-script-only options, then exactly one
    /// fallback with host defaults.
    fn register(
        &self,
        session: &mut dyn SessionHost,
        dir: &Path,
    ) -> std::result::Result<(String, bool), HostError> {
        match session.load_extension(dir, &self.options) {
            Ok(id) => Ok((id, false)),
            Err(err) => {
                log::warn!(
                    "registration of {} failed ({err}), retrying with default options",
                    dir.display()
                );
                let id = session.load_extension(dir, &LoadOptions::default())?;
                Ok((id, true))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_root_is_created_and_empty() {
        let base = TempDir::new().unwrap();
        let root = base.path().join("extensions");

        let loader = ExtensionLoader::new(&root);
        let report = loader.prepare_all().unwrap();

        assert!(root.is_dir());
        assert!(report.loaded.is_empty());
        assert!(report.skipped.is_empty());
    }

    #[test]
    fn test_prepare_transforms_in_place() {
        let root = TempDir::new().unwrap();
        let ext = root.path().join("sample");
        fs::create_dir(&ext).unwrap();
        fs::write(
            ext.join(MANIFEST_FILENAME),
            r#"{"manifest_version": 3, "name": "Sample", "version": "1.0",
                "background": {"service_worker": "bg.js"}}"#,
        )
        .unwrap();

        let report = ExtensionLoader::new(root.path()).prepare_all().unwrap();
        assert_eq!(report.loaded.len(), 1);
        assert!(report.loaded[0].id.is_none());

        let rewritten = fs::read_to_string(ext.join(MANIFEST_FILENAME)).unwrap();
        assert!(!rewritten.contains("service_worker"));
    }

    #[test]
    fn test_corrupt_manifest_does_not_disturb_siblings() {
        let root = TempDir::new().unwrap();

        let good = root.path().join("a-good");
        fs::create_dir(&good).unwrap();
        fs::write(
            good.join(MANIFEST_FILENAME),
            r#"{"manifest_version": 2, "name": "Good", "version": "1.0"}"#,
        )
        .unwrap();

        let bad = root.path().join("b-bad");
        fs::create_dir(&bad).unwrap();
        fs::write(bad.join(MANIFEST_FILENAME), "{ not json").unwrap();

        let empty = root.path().join("c-empty");
        fs::create_dir(&empty).unwrap();

        let report = ExtensionLoader::new(root.path()).prepare_all().unwrap();
        assert_eq!(report.loaded.len(), 1);
        assert_eq!(report.loaded[0].name, "Good");
        assert_eq!(report.skipped.len(), 2);
    }
}
