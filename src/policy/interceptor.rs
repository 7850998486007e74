//! Session-wide policy-header rewriting

use super::headers::{is_policy_header, ResponseHeaders, POLICY_HEADER, REPLACEMENT_POLICY};
use super::scope::InterceptScope;
use crate::host::SessionHost;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HookError {
    #[error("response hook is already installed; clear it before reinstalling")]
    AlreadyInstalled,
}

#[derive(Debug, Error)]
#[error("header rewrite failed: {0}")]
pub struct HeaderMutationError(pub String);

/// One header-rewrite strategy. The production mutator never fails, but the
/// seam lets the fail-open wrapper be exercised with a failing one.
pub trait HeaderMutator {
    fn mutate(
        &self,
        url: &str,
        headers: &ResponseHeaders,
    ) -> Result<ResponseHeaders, HeaderMutationError>;
}

/// Strips every case/report-only variant of the policy header and installs
/// the single permissive replacement.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyMutator;

impl HeaderMutator for PolicyMutator {
    fn mutate(
        &self,
        _url: &str,
        headers: &ResponseHeaders,
    ) -> Result<ResponseHeaders, HeaderMutationError> {
        let mut out = headers.clone();
        let stripped = out.remove_matching(is_policy_header);
        if stripped > 0 {
            log::debug!("stripped {stripped} policy header(s)");
        }
        out.set(POLICY_HEADER, REPLACEMENT_POLICY);
        Ok(out)
    }
}

/// Rewrite, forwarding the original headers untouched if the mutator fails.
/// The request itself is never blocked.
pub fn rewrite_fail_open(
    mutator: &dyn HeaderMutator,
    url: &str,
    headers: &ResponseHeaders,
) -> ResponseHeaders {
    match mutator.mutate(url, headers) {
        Ok(rewritten) => rewritten,
        Err(err) => {
            log::warn!("forwarding original headers for {url}: {err}");
            headers.clone()
        }
    }
}

/// Owns the one valid hook installation. `Uninstalled -> Installed` happens
/// once at startup; installing again without clearing is an error rather
/// than a second layered handler.
#[derive(Debug)]
pub struct PolicyInterceptor {
    scope: InterceptScope,
    installed: bool,
}

impl PolicyInterceptor {
    pub fn new(scope: InterceptScope) -> Self {
        Self {
            scope,
            installed: false,
        }
    }

    pub fn is_installed(&self) -> bool {
        self.installed
    }

    pub fn scope(&self) -> &InterceptScope {
        &self.scope
    }

    pub fn install(&mut self, session: &mut dyn SessionHost) -> Result<(), HookError> {
        if self.installed {
            return Err(HookError::AlreadyInstalled);
        }

        let scope = self.scope.clone();
        session.install_response_hook(Box::new(move |url, headers| {
            if !scope.matches(url) {
                return headers.clone();
            }
            rewrite_fail_open(&PolicyMutator, url, headers)
        }));

        self.installed = true;
        log::info!("response policy hook installed");
        Ok(())
    }

    pub fn clear(&mut self, session: &mut dyn SessionHost) {
        session.clear_response_hook();
        self.installed = false;
    }
}
