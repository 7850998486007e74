//! Recording fakes for the host collaborator traits
#![allow(dead_code)]

use deckshell::host::{HostError, LoadOptions, PageHost, ResponseHook, SessionHost};
use deckshell::policy::ResponseHeaders;
use std::path::{Path, PathBuf};

/// Session fake that records hook installation and registration calls, with
/// switchable failure behavior.
#[derive(Default)]
pub struct RecordingSession {
    pub hook: Option<ResponseHook>,
    pub events: Vec<String>,
    pub load_calls: Vec<(PathBuf, LoadOptions)>,
    /// Reject the first (non-default-options) attempt for these directory
    /// names; the fallback attempt succeeds.
    pub reject_primary_for: Vec<String>,
    /// Reject every attempt for these directory names.
    pub reject_all_for: Vec<String>,
    next_id: u32,
}

impl RecordingSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run a fake response through the installed hook.
    pub fn intercept(&self, url: &str, headers: &ResponseHeaders) -> ResponseHeaders {
        let hook = self.hook.as_ref().expect("response hook not installed");
        hook(url, headers)
    }

    fn dir_name(dir: &Path) -> String {
        dir.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string()
    }
}

impl SessionHost for RecordingSession {
    fn install_response_hook(&mut self, hook: ResponseHook) {
        self.events.push("install_hook".to_string());
        self.hook = Some(hook);
    }

    fn clear_response_hook(&mut self) {
        self.events.push("clear_hook".to_string());
        self.hook = None;
    }

    fn load_extension(&mut self, dir: &Path, options: &LoadOptions) -> Result<String, HostError> {
        let name = Self::dir_name(dir);
        self.events.push(format!("load:{name}"));
        self.load_calls.push((dir.to_path_buf(), options.clone()));

        if self.reject_all_for.contains(&name) {
            return Err(HostError::Registration(format!("{name} rejected")));
        }
        if self.reject_primary_for.contains(&name) && *options != LoadOptions::default() {
            return Err(HostError::Registration(format!(
                "{name} rejected with custom options"
            )));
        }

        self.next_id += 1;
        Ok(format!("loaded-{}", self.next_id))
    }
}

/// Page fake that records every evaluated script.
pub struct ScriptedPage {
    pub page_url: String,
    pub scripts: Vec<String>,
}

impl ScriptedPage {
    pub fn new(url: &str) -> Self {
        Self {
            page_url: url.to_string(),
            scripts: Vec::new(),
        }
    }
}

impl PageHost for ScriptedPage {
    fn url(&self) -> String {
        self.page_url.clone()
    }

    fn eval_script(&mut self, script: &str) -> Result<(), HostError> {
        self.scripts.push(script.to_string());
        Ok(())
    }
}
