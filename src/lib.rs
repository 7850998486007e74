//! Deckshell, the extension-compatibility core of a desktop dashboard shell
//!
//! Hosts a single web dashboard and keeps unmodified third-party extensions
//! working without their native host: manifests are rewritten for
//! content-script-only operation, a generated shim emulates the extension
//! API surface inside each page, and a session-wide hook neutralizes the
//! page's content policy so injected script keeps running.

pub mod compat;
pub mod config;
pub mod host;
pub mod loader;
pub mod models;
pub mod parser;
pub mod policy;
pub mod report;
pub mod shell;
pub mod transformer;

pub use compat::{CompatApi, CompatRegistry, HostApp, ShimBridge};
pub use config::ShellOptions;
pub use host::{LoadOptions, PageEvent, PageHost, SessionHost};
pub use loader::ExtensionLoader;
pub use models::Manifest;
pub use parser::ManifestError;
pub use policy::{InterceptScope, PolicyInterceptor, REPLACEMENT_POLICY};
pub use report::LoadReport;
pub use shell::Shell;
pub use transformer::{ManifestTransformer, SHIM_FILENAME};

use anyhow::Result;

/// One-call startup: build the shell and run the required sequence,
/// policy hook first, then the extension pass. The embedder creates and
/// navigates the visible page afterwards.
pub fn bootstrap(options: ShellOptions, session: &mut dyn SessionHost) -> Result<Shell> {
    let mut shell = Shell::new(options)?;
    shell.bootstrap(session)?;
    Ok(shell)
}
