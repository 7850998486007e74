//! Compatibility-shim generation
//!
//! Writes the self-contained glue script each transformed extension loads as
//! its first content script. The glue defines the `chrome.*` surface inside
//! the page: listener bookkeeping, `runtime.id` and the baked manifest stay
//! page-local; everything stateful is forwarded to the host bridge as JSON
//! envelopes. Every namespace is guarded by an existence check and set up
//! inside its own try/catch, so a second injection pass never clobbers live
//! state and one broken namespace cannot take down the rest.

use crate::compat::bridge::{GLUE_GLOBAL, HOST_POST_BINDING};
use crate::models::Manifest;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Name of the generated script inside each extension directory.
pub const SHIM_FILENAME: &str = "deckshell-compat.js";

/// Render the glue script with this extension's (transformed) manifest
/// baked in for `runtime.getManifest`.
pub fn shim_source(manifest: &Manifest) -> Result<String> {
    let manifest_json =
        serde_json::to_string(manifest).context("Failed to serialize manifest into shim")?;

    Ok(GLUE_TEMPLATE
        .replace("__MANIFEST_JSON__", &manifest_json)
        .replace("__GLUE_GLOBAL__", GLUE_GLOBAL)
        .replace("__HOST_POST__", HOST_POST_BINDING))
}

/// Overwrite the shim file in the extension directory. Runs on every load
/// pass so stale copies never survive an upgrade.
pub fn write_shim(dir: &Path, manifest: &Manifest) -> Result<()> {
    let source = shim_source(manifest)?;
    let path = dir.join(SHIM_FILENAME);
    fs::write(&path, source).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

const GLUE_TEMPLATE: &str = r#"// Generated by deckshell; rewritten on every load pass.
(function () {
  'use strict';
  if (window.__GLUE_GLOBAL__) { return; }

  var manifest = __MANIFEST_JSON__;
  var contextId = Math.floor(Math.random() * 0xfffffffe) + 1;
  var runtimeId = 'ext-' + Math.random().toString(36).slice(2, 10);
  var nextReply = 1;
  var nextListener = 1;
  var pending = {};
  var listenerFns = {};

  function post(envelope) {
    envelope.context = contextId;
    if (typeof window.__HOST_POST__ === 'function') {
      try {
        window.__HOST_POST__(JSON.stringify(envelope));
      } catch (err) {
        console.warn('deckshell: host bridge unreachable', err);
      }
    }
  }

  window.__GLUE_GLOBAL__ = {
    deliver: function (command) {
      if (!command) { return; }
      if (command.op === 'resolve') {
        var resolve = pending[command.reply];
        if (resolve) {
          delete pending[command.reply];
          resolve(command.value);
        }
        return;
      }
      if (command.op === 'invokeListener') {
        var fn = listenerFns[command.listener];
        if (fn) {
          try {
            fn.apply(null, command.args || []);
          } catch (err) {
            console.warn('deckshell: listener failed', err);
          }
        }
      }
    }
  };

  function call(envelope, callback) {
    return new Promise(function (resolve) {
      var reply = nextReply++;
      pending[reply] = function (value) {
        if (callback) {
          try {
            callback(value);
          } catch (err) {
            console.warn('deckshell: callback failed', err);
          }
        }
        resolve(value);
      };
      envelope.reply = reply;
      post(envelope);
    });
  }

  function invoke(method, args, callback) {
    return call({ op: 'invoke', method: method, args: args || [] }, callback);
  }

  function makeEvent(name) {
    var registered = [];
    return {
      addListener: function (fn) {
        if (typeof fn !== 'function') { return; }
        var id = nextListener++;
        registered.push({ id: id, fn: fn });
        listenerFns[id] = fn;
        post({ op: 'addListener', event: name, listener: id });
      },
      removeListener: function (fn) {
        for (var i = 0; i < registered.length; i++) {
          if (registered[i].fn === fn) {
            var id = registered[i].id;
            registered.splice(i, 1);
            delete listenerFns[id];
            post({ op: 'removeListener', event: name, listener: id });
            return;
          }
        }
      },
      hasListener: function (fn) {
        for (var i = 0; i < registered.length; i++) {
          if (registered[i].fn === fn) { return true; }
        }
        return false;
      },
      hasListeners: function () {
        return registered.length > 0;
      }
    };
  }

  window.chrome = window.chrome || {};
  var chrome = window.chrome;

  function define(name, build) {
    if (chrome[name]) { return; }
    try {
      chrome[name] = build();
    } catch (err) {
      console.warn('deckshell: failed to set up chrome.' + name, err);
    }
  }

  function storageArea(area) {
    return {
      get: function (keys, callback) {
        if (typeof keys === 'function') { callback = keys; keys = null; }
        return call({ op: 'storageGet', area: area, keys: keys === undefined ? null : keys }, callback);
      },
      set: function (items, callback) {
        return call({ op: 'storageSet', area: area, items: items || {} }, callback);
      },
      remove: function (keys, callback) {
        return call({ op: 'storageRemove', area: area, keys: typeof keys === 'string' ? [keys] : (keys || []) }, callback);
      },
      clear: function (callback) {
        return call({ op: 'storageClear', area: area }, callback);
      },
      getBytesInUse: function (keys, callback) {
        if (typeof keys === 'function') { callback = keys; }
        return invoke('storage.getBytesInUse', [], callback);
      }
    };
  }

  define('storage', function () {
    return {
      local: storageArea('local'),
      sync: storageArea('sync'),
      onChanged: makeEvent('storage.onChanged')
    };
  });

  define('browserAction', function () {
    function setter(method) {
      return function (details, callback) {
        return invoke('browserAction.' + method, [details || {}], callback);
      };
    }
    function getter(method) {
      return function (details, callback) {
        if (typeof details === 'function') { callback = details; details = {}; }
        return invoke('browserAction.' + method, [details || {}], callback);
      };
    }
    return {
      onClicked: makeEvent('browserAction.onClicked'),
      setIcon: setter('setIcon'),
      setTitle: setter('setTitle'),
      setBadgeText: setter('setBadgeText'),
      setBadgeBackgroundColor: setter('setBadgeBackgroundColor'),
      setPopup: setter('setPopup'),
      enable: function (tabId, callback) {
        return invoke('browserAction.enable', [tabId], callback);
      },
      disable: function (tabId, callback) {
        return invoke('browserAction.disable', [tabId], callback);
      },
      getBadgeText: getter('getBadgeText'),
      getTitle: getter('getTitle'),
      getBadgeBackgroundColor: getter('getBadgeBackgroundColor'),
      getPopup: getter('getPopup')
    };
  });

  // the MV3 name is an alias: both must act on the same listener state
  if (!chrome.action) { chrome.action = chrome.browserAction; }

  define('runtime', function () {
    return {
      id: runtimeId,
      onMessage: makeEvent('runtime.onMessage'),
      sendMessage: function () {
        var args = [];
        var callback = null;
        for (var i = 0; i < arguments.length; i++) {
          if (typeof arguments[i] === 'function') { callback = arguments[i]; break; }
          args.push(arguments[i]);
        }
        return call({ op: 'sendMessage', args: args }, callback);
      },
      connect: function () {
        return {
          postMessage: function () {},
          disconnect: function () {},
          onMessage: {
            addListener: function () {},
            removeListener: function () {}
          },
          onDisconnect: {
            addListener: function () {},
            removeListener: function () {}
          }
        };
      },
      getManifest: function () { return manifest; },
      getURL: function (path) {
        return 'chrome-extension://' + runtimeId + '/' + String(path == null ? '' : path).replace(/^\//, '');
      },
      lastError: null
    };
  });

  define('tabs', function () {
    return {
      query: function (info, callback) {
        return invoke('tabs.query', [info || {}], callback);
      },
      get: function (tabId, callback) {
        return invoke('tabs.get', [tabId], callback);
      },
      sendMessage: function (tabId, message, options, callback) {
        if (typeof options === 'function') { callback = options; }
        return invoke('tabs.sendMessage', [tabId, message], callback);
      }
    };
  });

  define('contextMenus', function () {
    var nextMenuId = 1;
    return {
      create: function (properties, callback) {
        invoke('contextMenus.create', [properties || {}], callback);
        return (properties && properties.id) || ('menu_' + (nextMenuId++));
      },
      update: function (id, properties, callback) {
        return invoke('contextMenus.update', [id, properties || {}], callback);
      },
      remove: function (id, callback) {
        return invoke('contextMenus.remove', [id], callback);
      },
      removeAll: function (callback) {
        return invoke('contextMenus.removeAll', [], callback);
      },
      onClicked: makeEvent('contextMenus.onClicked')
    };
  });

  define('notifications', function () {
    return {
      create: function (id, options, callback) {
        if (typeof id === 'object') { callback = options; options = id; id = null; }
        return invoke('notifications.create', [id, options || {}], callback);
      },
      update: function (id, options, callback) {
        return invoke('notifications.update', [id, options || {}], callback);
      },
      clear: function (id, callback) {
        return invoke('notifications.clear', [id], callback);
      }
    };
  });

  define('webNavigation', function () {
    return {
      onCompleted: makeEvent('webNavigation.onCompleted'),
      onBeforeNavigate: makeEvent('webNavigation.onBeforeNavigate')
    };
  });

  define('cookies', function () {
    return {
      get: function (details, callback) {
        return invoke('cookies.get', [details || {}], callback);
      },
      set: function (details, callback) {
        return invoke('cookies.set', [details || {}], callback);
      },
      remove: function (details, callback) {
        return invoke('cookies.remove', [details || {}], callback);
      }
    };
  });

  define('commands', function () {
    return {
      onCommand: makeEvent('commands.onCommand'),
      getAll: function (callback) {
        return invoke('commands.getAll', [], callback);
      }
    };
  });

  post({ op: 'hello', url: String((window.location && window.location.href) || '') });
  window.addEventListener('pagehide', function () {
    post({ op: 'goodbye' });
  });
})();
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_manifest_from_str;
    use tempfile::TempDir;

    fn manifest() -> Manifest {
        parse_manifest_from_str(r#"{"manifest_version": 3, "name": "Shimmed", "version": "2.0"}"#)
            .unwrap()
    }

    #[test]
    fn test_source_is_guarded_and_bakes_manifest() {
        let source = shim_source(&manifest()).unwrap();
        assert!(source.starts_with("// Generated by deckshell"));
        assert!(source.contains(&format!("if (window.{GLUE_GLOBAL})")));
        assert!(source.contains(r#""name":"Shimmed""#));
        assert!(source.contains(HOST_POST_BINDING));
        // no unexpanded placeholders left behind
        assert!(!source.contains("__MANIFEST_JSON__"));
        assert!(!source.contains("__GLUE_GLOBAL__"));
        assert!(!source.contains("__HOST_POST__"));
    }

    #[test]
    fn test_every_namespace_is_existence_checked() {
        let source = shim_source(&manifest()).unwrap();
        for namespace in [
            "storage",
            "browserAction",
            "runtime",
            "tabs",
            "contextMenus",
            "notifications",
            "webNavigation",
            "cookies",
            "commands",
        ] {
            assert!(
                source.contains(&format!("define('{namespace}'")),
                "missing guarded namespace {namespace}"
            );
        }
        assert!(source.contains("if (!chrome.action) { chrome.action = chrome.browserAction; }"));
    }

    #[test]
    fn test_write_shim_overwrites() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(SHIM_FILENAME), "stale").unwrap();

        write_shim(dir.path(), &manifest()).unwrap();
        let written = std::fs::read_to_string(dir.path().join(SHIM_FILENAME)).unwrap();
        assert!(written.contains("Shimmed"));
        assert!(!written.contains("stale"));
    }
}
