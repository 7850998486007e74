//! Shell configuration

use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ShellOptions {
    /// Directory holding one subdirectory per extension.
    pub extensions_dir: PathBuf,
    /// Dashboard the hosted page navigates to after startup.
    pub start_url: String,
    /// URL patterns the response-header hook applies to.
    pub intercept_patterns: Vec<String>,
    /// Identity served to extensions asking about their host.
    pub app_name: String,
    pub app_version: String,
}

impl Default for ShellOptions {
    fn default() -> Self {
        Self {
            extensions_dir: PathBuf::from("extensions"),
            start_url: "https://x.com/i/tweetdeck".to_string(),
            intercept_patterns: vec![crate::policy::ALL_URLS.to_string()],
            app_name: "Deckshell".to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
