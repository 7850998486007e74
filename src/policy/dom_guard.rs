//! In-page companion to the header rewrite
//!
//! Pages can re-assert a restrictive policy through `<meta http-equiv>` tags
//! and nonce attributes after the network layer already rewrote the headers.
//! This script runs at dom-ready, purges what is present, inserts one
//! synthetic permissive meta tag and keeps watching for re-insertions.

use super::headers::REPLACEMENT_POLICY;

/// Marker attribute identifying the one synthetic meta tag the guard owns.
pub const GUARD_MARKER_ATTR: &str = "data-deckshell-policy";

/// Window flag that makes re-injection within one page lifetime a no-op.
pub const GUARD_FLAG: &str = "__deckshellPolicyGuard";

/// Render the watcher script for injection on every page (re)load.
pub fn dom_guard_script() -> String {
    format!(
        r#"(function () {{
  'use strict';
  if (window.{flag}) {{ return; }}
  window.{flag} = true;

  var MARKER = '{marker}';
  var POLICY = {policy};

  function isPolicyMeta(node) {{
    if (!node || node.nodeName !== 'META') {{ return false; }}
    var equiv = (node.getAttribute('http-equiv') || '').toLowerCase();
    return equiv === 'content-security-policy' ||
           equiv === 'content-security-policy-report-only';
  }}

  function stripNonce(node) {{
    if (node.nodeType !== 1) {{ return; }}
    if (node.hasAttribute && node.hasAttribute('nonce')) {{
      node.removeAttribute('nonce');
    }}
    if (node.querySelectorAll) {{
      var nested = node.querySelectorAll('[nonce]');
      for (var i = 0; i < nested.length; i++) {{
        nested[i].removeAttribute('nonce');
      }}
    }}
  }}

  function removeForeignPolicyMetas() {{
    var metas = document.querySelectorAll('meta[http-equiv]');
    for (var i = 0; i < metas.length; i++) {{
      if (isPolicyMeta(metas[i]) && !metas[i].hasAttribute(MARKER)) {{
        metas[i].parentNode.removeChild(metas[i]);
      }}
    }}
  }}

  function ensureSingleGuardMeta() {{
    var owned = document.querySelectorAll('meta[' + MARKER + ']');
    for (var i = 1; i < owned.length; i++) {{
      owned[i].parentNode.removeChild(owned[i]);
    }}
    if (owned.length > 0) {{ return; }}
    var meta = document.createElement('meta');
    meta.setAttribute('http-equiv', 'Content-Security-Policy');
    meta.setAttribute('content', POLICY);
    meta.setAttribute(MARKER, '');
    var head = document.head || document.documentElement;
    head.insertBefore(meta, head.firstChild);
  }}

  removeForeignPolicyMetas();
  ensureSingleGuardMeta();
  stripNonce(document.documentElement);

  var observer = new MutationObserver(function (mutations) {{
    for (var m = 0; m < mutations.length; m++) {{
      var added = mutations[m].addedNodes;
      for (var n = 0; n < added.length; n++) {{
        var node = added[n];
        if (isPolicyMeta(node) && !node.hasAttribute(MARKER)) {{
          node.parentNode.removeChild(node);
          continue;
        }}
        stripNonce(node);
      }}
    }}
    ensureSingleGuardMeta();
  }});
  observer.observe(document.documentElement, {{ childList: true, subtree: true }});
}})();
"#,
        flag = GUARD_FLAG,
        marker = GUARD_MARKER_ATTR,
        policy = js_string(REPLACEMENT_POLICY),
    )
}

/// Quote a string as a JavaScript literal.
fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_carries_guard_flag_and_marker() {
        let script = dom_guard_script();
        assert!(script.contains(GUARD_FLAG));
        assert!(script.contains(GUARD_MARKER_ATTR));
        assert!(script.contains("MutationObserver"));
        assert!(script.contains("removeAttribute('nonce')"));
    }

    #[test]
    fn test_script_embeds_replacement_policy() {
        let script = dom_guard_script();
        assert!(script.contains("default-src *"));
    }

    #[test]
    fn test_reinjection_guard_comes_first() {
        let script = dom_guard_script();
        let flag_check = script.find("if (window.").unwrap();
        let purge = script.find("removeForeignPolicyMetas").unwrap();
        assert!(flag_check < purge);
    }
}
