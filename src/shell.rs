//! Startup sequencing and page-event handling
//!
//! Startup order is load-bearing: the policy hook must be live before the
//! first response arrives, and extensions must be registered before the
//! page that may call into them exists. The embedder creates the page only
//! after `bootstrap` returns.

use crate::compat::{HostApp, PageCommand, ShimBridge};
use crate::config::ShellOptions;
use crate::host::{PageEvent, PageHost, SessionHost};
use crate::loader::ExtensionLoader;
use crate::policy::{dom_guard_script, InterceptScope, PolicyInterceptor};
use crate::report::LoadReport;
use anyhow::{Context, Result};

pub struct Shell {
    options: ShellOptions,
    interceptor: PolicyInterceptor,
    bridge: ShimBridge,
    report: Option<LoadReport>,
}

impl Shell {
    pub fn new(options: ShellOptions) -> Result<Self> {
        let scope = InterceptScope::from_patterns(&options.intercept_patterns)
            .context("Invalid interception scope")?;
        let app = HostApp {
            name: options.app_name.clone(),
            version: options.app_version.clone(),
        };

        Ok(Self {
            options,
            interceptor: PolicyInterceptor::new(scope),
            bridge: ShimBridge::new(app),
            report: None,
        })
    }

    pub fn options(&self) -> &ShellOptions {
        &self.options
    }

    /// Install the policy hook, then transform and register extensions.
    pub fn bootstrap(&mut self, session: &mut dyn SessionHost) -> Result<&LoadReport> {
        self.interceptor
            .install(session)
            .context("Failed to install response policy hook")?;

        let loader = ExtensionLoader::new(&self.options.extensions_dir);
        let report = loader.load_all(session)?;
        report.log_summary();

        Ok(self.report.insert(report))
    }

    pub fn report(&self) -> Option<&LoadReport> {
        self.report.as_ref()
    }

    /// Forwarded page lifecycle. Dom-ready re-arms the in-page policy
    /// guard (idempotently); navigation discards every page context.
    pub fn handle_page_event(
        &mut self,
        page: &mut dyn PageHost,
        event: PageEvent,
    ) -> Result<()> {
        match event {
            PageEvent::DomReady => {
                page.eval_script(&dom_guard_script())
                    .context("Failed to install page policy guard")?;
            }
            PageEvent::NavigationStarted => {
                self.bridge.reset_contexts();
            }
            PageEvent::NavigationFinished => {
                log::debug!("navigation finished: {}", page.url());
            }
        }
        Ok(())
    }

    /// Pump one envelope from the page glue. Malformed or unroutable
    /// messages are logged and dropped; the page always keeps loading.
    pub fn handle_shim_message(&mut self, page: &mut dyn PageHost, raw: &str) -> Result<()> {
        let commands = match self.bridge.handle(raw) {
            Ok(commands) => commands,
            Err(err) => {
                log::warn!("dropping shim message: {err}");
                return Ok(());
            }
        };
        self.deliver(page, &commands)
    }

    fn deliver(&mut self, page: &mut dyn PageHost, commands: &[PageCommand]) -> Result<()> {
        for command in commands {
            let script = command
                .to_script()
                .context("Failed to serialize page command")?;
            page.eval_script(&script)
                .context("Failed to deliver page command")?;
        }
        Ok(())
    }

    /// Native access to the per-context runtimes, for embedders that need
    /// to push host events (e.g. a toolbar click) into extensions.
    pub fn bridge(&self) -> &ShimBridge {
        &self.bridge
    }

    pub fn bridge_mut(&mut self) -> &mut ShimBridge {
        &mut self.bridge
    }
}
