//! Content-policy neutralization: network-level header rewriting plus the
//! in-page meta/nonce watcher

pub mod dom_guard;
pub mod headers;
pub mod interceptor;
pub mod scope;

pub use dom_guard::{dom_guard_script, GUARD_FLAG, GUARD_MARKER_ATTR};
pub use headers::{is_policy_header, ResponseHeaders, POLICY_HEADER, REPLACEMENT_POLICY};
pub use interceptor::{
    rewrite_fail_open, HeaderMutationError, HeaderMutator, HookError, PolicyInterceptor,
    PolicyMutator,
};
pub use scope::{InterceptScope, MatchPattern, ScopeError, ALL_URLS};
