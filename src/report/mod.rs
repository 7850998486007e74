//! Load-report model and rendering
//!
//! Produced once after the startup extension pass; purely diagnostic.

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct LoadedExtension {
    /// Host-assigned id; absent for transform-only (prepare) passes.
    pub id: Option<String>,
    pub name: String,
    pub version: String,
    pub manifest_version: u8,
    pub dir: PathBuf,
    /// Whether registration only succeeded on the fallback attempt.
    pub fallback: bool,
    pub file_count: usize,
    pub size_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct SkippedExtension {
    pub dir: PathBuf,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub loaded: Vec<LoadedExtension>,
    pub skipped: Vec<SkippedExtension>,
}

impl LoadReport {
    pub fn log_summary(&self) {
        log::info!(
            "extension pass complete: {} loaded, {} skipped",
            self.loaded.len(),
            self.skipped.len()
        );
        for extension in &self.loaded {
            log::info!(
                "  loaded {} v{} (manifest v{}){}",
                extension.name,
                extension.version,
                extension.manifest_version,
                if extension.fallback { " [fallback]" } else { "" }
            );
        }
        for skipped in &self.skipped {
            log::warn!("  skipped {}: {}", skipped.dir.display(), skipped.reason);
        }
    }

    /// Text rendering for the CLI.
    pub fn render_text(&self) -> String {
        let mut report = String::new();

        report.push_str(&format!(
            "Extensions: {} loaded, {} skipped\n",
            self.loaded.len(),
            self.skipped.len()
        ));

        for extension in &self.loaded {
            report.push_str(&format!(
                "  + {} v{} (manifest v{}, {} files, {} bytes){}\n",
                extension.name,
                extension.version,
                extension.manifest_version,
                extension.file_count,
                extension.size_bytes,
                if extension.fallback { " [fallback]" } else { "" }
            ));
        }

        for skipped in &self.skipped {
            report.push_str(&format!(
                "  - {}: {}\n",
                skipped.dir.display(),
                skipped.reason
            ));
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_lists_both_sections() {
        let report = LoadReport {
            loaded: vec![LoadedExtension {
                id: Some("abc".into()),
                name: "Blocker".into(),
                version: "1.2".into(),
                manifest_version: 3,
                dir: PathBuf::from("/ext/blocker"),
                fallback: true,
                file_count: 4,
                size_bytes: 1024,
            }],
            skipped: vec![SkippedExtension {
                dir: PathBuf::from("/ext/broken"),
                reason: "manifest unreadable".into(),
            }],
        };

        let text = report.render_text();
        assert!(text.contains("1 loaded, 1 skipped"));
        assert!(text.contains("Blocker v1.2"));
        assert!(text.contains("[fallback]"));
        assert!(text.contains("manifest unreadable"));
    }
}
