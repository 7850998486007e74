//! Host collaborator traits
//!
//! The surrounding application supplies the actual browser machinery: a
//! session that can intercept response headers and register extensions, and
//! a page that can evaluate script. This crate only depends on these seams;
//! tests drive them with recording fakes.

use crate::policy::ResponseHeaders;
use std::path::Path;
use thiserror::Error;

/// Session-wide response-header rewrite hook. Called once per intercepted
/// response with the request URL and its headers; returns the headers to
/// forward.
pub type ResponseHook = Box<dyn Fn(&str, &ResponseHeaders) -> ResponseHeaders>;

#[derive(Debug, Error)]
pub enum HostError {
    #[error("extension registration rejected: {0}")]
    Registration(String),

    #[error("script evaluation failed: {0}")]
    Script(String),
}

/// Options for the host's native extension-registration primitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    pub allow_file_access: bool,
    pub allow_service_workers: bool,
}

impl Default for LoadOptions {
    /// The host's own defaults, used for the fallback registration attempt.
    fn default() -> Self {
        Self {
            allow_file_access: false,
            allow_service_workers: true,
        }
    }
}

impl LoadOptions {
    /// Options for the first registration attempt: file access on, service
    /// workers off (background execution is stripped from the manifest and
    /// must stay off at the host level too).
    pub fn content_script_only() -> Self {
        Self {
            allow_file_access: true,
            allow_service_workers: false,
        }
    }
}

pub trait SessionHost {
    /// Register the single response-header hook. The caller guarantees any
    /// prior hook was cleared first.
    fn install_response_hook(&mut self, hook: ResponseHook);

    fn clear_response_hook(&mut self);

    /// Register an unpacked extension directory; returns the host-assigned
    /// extension id.
    fn load_extension(&mut self, dir: &Path, options: &LoadOptions) -> Result<String, HostError>;
}

pub trait PageHost {
    fn url(&self) -> String;

    fn eval_script(&mut self, script: &str) -> Result<(), HostError>;
}

/// Page lifecycle notifications the embedder forwards to the shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageEvent {
    DomReady,
    NavigationStarted,
    NavigationFinished,
}
