//! JSON bridge between the generated in-page glue and the native runtime
//!
//! The glue keeps the synchronous parts of the API surface page-local
//! (listener bookkeeping, runtime.id, baked manifest) and forwards every
//! stateful operation here as a [`ShimCall`]. Effects flowing back
//! (listener invocations and reply resolutions) leave as [`PageCommand`]s
//! the embedder evaluates in the page.

use super::events::ListenerId;
use super::messaging::SendArg;
use super::storage::{AreaName, KeyQuery, StorageArea};
use super::tabs::HOST_TAB_ID;
use super::tasks::Done;
use super::{CompatApi, CompatRegistry, HostApp, PageDescriptor};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use thiserror::Error;

/// Name of the page global the glue installs; `PageCommand::to_script`
/// targets its `deliver` entry point.
pub const GLUE_GLOBAL: &str = "__deckshellGlue";

/// Name of the host-bound function the glue posts envelopes through.
pub const HOST_POST_BINDING: &str = "__deckshellPost";

/// Event objects the glue can mirror listener registrations into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTarget {
    #[serde(rename = "runtime.onMessage")]
    RuntimeMessage,
    #[serde(rename = "browserAction.onClicked")]
    BrowserActionClicked,
    #[serde(rename = "action.onClicked")]
    ActionClicked,
    #[serde(rename = "storage.onChanged")]
    StorageChanged,
    #[serde(rename = "contextMenus.onClicked")]
    ContextMenuClicked,
    #[serde(rename = "webNavigation.onCompleted")]
    NavigationCompleted,
    #[serde(rename = "webNavigation.onBeforeNavigate")]
    BeforeNavigate,
    #[serde(rename = "commands.onCommand")]
    Command,
}

/// Envelope posted by the in-page glue.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum ShimCall {
    /// A frame announcing itself; creates the context on first sight.
    Hello { context: u64, url: String },
    Goodbye {
        context: u64,
    },
    AddListener {
        context: u64,
        event: EventTarget,
        listener: u64,
    },
    RemoveListener {
        context: u64,
        event: EventTarget,
        listener: u64,
    },
    StorageGet {
        context: u64,
        area: AreaName,
        keys: Value,
        reply: u64,
    },
    StorageSet {
        context: u64,
        area: AreaName,
        items: Map<String, Value>,
        #[serde(default)]
        reply: Option<u64>,
    },
    StorageRemove {
        context: u64,
        area: AreaName,
        keys: Vec<String>,
        #[serde(default)]
        reply: Option<u64>,
    },
    StorageClear {
        context: u64,
        area: AreaName,
        #[serde(default)]
        reply: Option<u64>,
    },
    SendMessage {
        context: u64,
        #[serde(default)]
        args: Vec<Value>,
        #[serde(default)]
        reply: Option<u64>,
    },
    /// Ack-style namespace methods routed by dotted name.
    Invoke {
        context: u64,
        method: String,
        #[serde(default)]
        args: Vec<Value>,
        #[serde(default)]
        reply: Option<u64>,
    },
}

/// Effect the embedder must evaluate in the page.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum PageCommand {
    InvokeListener {
        context: u64,
        listener: u64,
        args: Vec<Value>,
    },
    Resolve {
        context: u64,
        reply: u64,
        value: Value,
    },
}

impl PageCommand {
    /// Script statement delivering this command to the page glue. A page
    /// that never loaded the glue ignores it.
    pub fn to_script(&self) -> Result<String, serde_json::Error> {
        let payload = serde_json::to_string(self)?;
        Ok(format!(
            "window.{GLUE_GLOBAL} && window.{GLUE_GLOBAL}.deliver({payload});"
        ))
    }
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("malformed shim message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("shim message for unknown page context {0}")]
    UnknownContext(u64),
}

#[derive(Clone, Default)]
struct CommandSink {
    inner: Rc<RefCell<Vec<PageCommand>>>,
}

impl CommandSink {
    fn push(&self, command: PageCommand) {
        self.inner.borrow_mut().push(command);
    }

    fn drain(&self) -> Vec<PageCommand> {
        self.inner.borrow_mut().drain(..).collect()
    }
}

/// Owns the per-context runtimes and translates between envelopes and
/// native calls.
pub struct ShimBridge {
    app: HostApp,
    registry: CompatRegistry,
    sink: CommandSink,
    remote_listeners: HashMap<(u64, EventTarget, u64), ListenerId>,
}

impl ShimBridge {
    pub fn new(app: HostApp) -> Self {
        Self {
            app,
            registry: CompatRegistry::new(),
            sink: CommandSink::default(),
            remote_listeners: HashMap::new(),
        }
    }

    pub fn registry(&self) -> &CompatRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut CompatRegistry {
        &mut self.registry
    }

    /// Drop every page context (the hosting page navigated).
    pub fn reset_contexts(&mut self) {
        self.registry.reset();
        self.remote_listeners.clear();
    }

    /// Parse one raw envelope and apply it. Returns the page commands the
    /// embedder must evaluate, including deferred completions flushed from
    /// the touched context's task queue.
    pub fn handle(&mut self, raw: &str) -> Result<Vec<PageCommand>, BridgeError> {
        let call: ShimCall = serde_json::from_str(raw)?;
        self.dispatch(call)
    }

    pub fn dispatch(&mut self, call: ShimCall) -> Result<Vec<PageCommand>, BridgeError> {
        let context = match &call {
            ShimCall::Hello { context, url } => {
                let page = PageDescriptor { url: url.clone() };
                self.registry.ensure(*context, &page, &self.app);
                log::debug!("page context {context} announced at {url}");
                *context
            }
            ShimCall::Goodbye { context } => {
                let context = *context;
                self.registry.discard(context);
                self.remote_listeners.retain(|(ctx, _, _), _| *ctx != context);
                return Ok(self.sink.drain());
            }
            other => self.apply(other)?,
        };

        if let Some(api) = self.registry.get(context) {
            api.tasks().run_until_idle();
        }
        Ok(self.sink.drain())
    }

    fn apply(&mut self, call: &ShimCall) -> Result<u64, BridgeError> {
        match call {
            ShimCall::AddListener {
                context,
                event,
                listener,
            } => {
                let sink = self.sink.clone();
                let api = self.api(*context)?;
                let id = register_remote(api, *event, *context, *listener, sink);
                self.remote_listeners
                    .insert((*context, *event, *listener), id);
                Ok(*context)
            }
            ShimCall::RemoveListener {
                context,
                event,
                listener,
            } => {
                if let Some(id) = self.remote_listeners.remove(&(*context, *event, *listener)) {
                    let api = self.api(*context)?;
                    remove_remote(api, *event, id);
                }
                Ok(*context)
            }
            ShimCall::StorageGet {
                context,
                area,
                keys,
                reply,
            } => {
                let done = self.resolve_with(*context, *reply, Value::Object);
                let api = self.api(*context)?;
                let query = KeyQuery::from_wire(keys.clone());
                storage_area(api, *area).get(&query, Some(done));
                Ok(*context)
            }
            ShimCall::StorageSet {
                context,
                area,
                items,
                reply,
            } => {
                let done = self.resolve_unit(*context, *reply);
                let api = self.api(*context)?;
                storage_area(api, *area).set(items.clone(), done);
                Ok(*context)
            }
            ShimCall::StorageRemove {
                context,
                area,
                keys,
                reply,
            } => {
                let done = self.resolve_unit(*context, *reply);
                let api = self.api(*context)?;
                storage_area(api, *area).remove(keys, done);
                Ok(*context)
            }
            ShimCall::StorageClear {
                context,
                area,
                reply,
            } => {
                let done = self.resolve_unit(*context, *reply);
                let api = self.api(*context)?;
                storage_area(api, *area).clear(done);
                Ok(*context)
            }
            ShimCall::SendMessage {
                context,
                args,
                reply,
            } => {
                let mut send_args: Vec<SendArg> =
                    args.iter().cloned().map(SendArg::Value).collect();
                if let Some(reply) = reply {
                    send_args.push(SendArg::Callback(resolve_as(
                        &self.sink,
                        *context,
                        *reply,
                        |value| value,
                    )));
                }
                let api = self.api(*context)?;
                api.runtime().send_message(send_args);
                Ok(*context)
            }
            ShimCall::Invoke {
                context,
                method,
                args,
                reply,
            } => {
                self.invoke(*context, method, args, *reply)?;
                Ok(*context)
            }
            // Hello and Goodbye are handled by the caller
            ShimCall::Hello { context, .. } | ShimCall::Goodbye { context } => Ok(*context),
        }
    }

    /// Route an ack-style method by dotted name. Unknown methods resolve to
    /// null so a page promise never hangs on a missing emulation.
    fn invoke(
        &mut self,
        context: u64,
        method: &str,
        args: &[Value],
        reply: Option<u64>,
    ) -> Result<(), BridgeError> {
        let arg = |n: usize| args.get(n).cloned().unwrap_or(Value::Null);

        let unit = self.resolve_unit(context, reply);
        let sink = self.sink.clone();
        let api = self.api(context)?;

        match method {
            "tabs.query" => {
                if let Some(reply) = reply {
                    let done = resolve_as(&sink, context, reply, |tabs: Vec<super::Tab>| {
                        serde_json::to_value(tabs).unwrap_or(Value::Null)
                    });
                    api.tabs().query(&arg(0), Some(done));
                }
            }
            "tabs.get" => {
                if let Some(reply) = reply {
                    let done = resolve_as(&sink, context, reply, |tab: super::Tab| {
                        serde_json::to_value(tab).unwrap_or(Value::Null)
                    });
                    api.tabs()
                        .get(arg(0).as_i64().unwrap_or(HOST_TAB_ID), Some(done));
                }
            }
            "tabs.sendMessage" => {
                let done = reply.map(|reply| resolve_as(&sink, context, reply, |v| v));
                api.tabs()
                    .send_message(arg(0).as_i64().unwrap_or(HOST_TAB_ID), arg(1), done);
            }
            "browserAction.setIcon" | "action.setIcon" => {
                api.browser_action().set_icon(arg(0), unit)
            }
            "browserAction.setTitle" | "action.setTitle" => {
                api.browser_action().set_title(arg(0), unit)
            }
            "browserAction.setBadgeText" | "action.setBadgeText" => {
                api.browser_action().set_badge_text(arg(0), unit)
            }
            "browserAction.setBadgeBackgroundColor" | "action.setBadgeBackgroundColor" => {
                api.browser_action().set_badge_background_color(arg(0), unit)
            }
            "browserAction.setPopup" | "action.setPopup" => {
                api.browser_action().set_popup(arg(0), unit)
            }
            "browserAction.enable" | "action.enable" => {
                api.browser_action().enable(arg(0).as_i64(), unit)
            }
            "browserAction.disable" | "action.disable" => {
                api.browser_action().disable(arg(0).as_i64(), unit)
            }
            "browserAction.getBadgeText" | "action.getBadgeText" => {
                if let Some(reply) = reply {
                    let done = resolve_as(&sink, context, reply, Value::String);
                    api.browser_action().get_badge_text(arg(0), done);
                }
            }
            "browserAction.getTitle" | "action.getTitle" => {
                if let Some(reply) = reply {
                    let done = resolve_as(&sink, context, reply, Value::String);
                    api.browser_action().get_title(arg(0), done);
                }
            }
            "browserAction.getBadgeBackgroundColor" | "action.getBadgeBackgroundColor" => {
                if let Some(reply) = reply {
                    let done = resolve_as(&sink, context, reply, |color: [u8; 4]| {
                        serde_json::to_value(color).unwrap_or(Value::Null)
                    });
                    api.browser_action().get_badge_background_color(arg(0), done);
                }
            }
            "browserAction.getPopup" | "action.getPopup" => {
                if let Some(reply) = reply {
                    let done = resolve_as(&sink, context, reply, Value::String);
                    api.browser_action().get_popup(arg(0), done);
                }
            }
            "contextMenus.create" => {
                api.context_menus().create(arg(0), unit);
            }
            "contextMenus.update" => {
                api.context_menus()
                    .update(arg(0).as_str().unwrap_or_default(), arg(1), unit)
            }
            "contextMenus.remove" => {
                api.context_menus()
                    .remove(arg(0).as_str().unwrap_or_default(), unit)
            }
            "contextMenus.removeAll" => api.context_menus().remove_all(unit),
            "notifications.create" => {
                let id = arg(0).as_str().map(str::to_string);
                let done = reply.map(|reply| resolve_as(&sink, context, reply, Value::String));
                api.notifications().create(id, arg(1), done);
            }
            "notifications.update" => {
                let done = reply.map(|reply| resolve_as(&sink, context, reply, Value::Bool));
                api.notifications()
                    .update(arg(0).as_str().unwrap_or_default(), arg(1), done);
            }
            "notifications.clear" => {
                let done = reply.map(|reply| resolve_as(&sink, context, reply, Value::Bool));
                api.notifications()
                    .clear(arg(0).as_str().unwrap_or_default(), done);
            }
            "cookies.get" => {
                let done = match reply {
                    Some(reply) => resolve_as(&sink, context, reply, |v| v),
                    None => Box::new(|_| {}),
                };
                api.cookies().get(arg(0), done);
            }
            "cookies.set" => {
                let done = reply.map(|reply| resolve_as(&sink, context, reply, |v| v));
                api.cookies().set(arg(0), done);
            }
            "cookies.remove" => {
                let done = reply.map(|reply| resolve_as(&sink, context, reply, |v| v));
                api.cookies().remove(arg(0), done);
            }
            "commands.getAll" => {
                if let Some(reply) = reply {
                    let done = resolve_as(&sink, context, reply, Value::Array);
                    api.commands().get_all(done);
                }
            }
            "storage.getBytesInUse" => {
                if let Some(reply) = reply {
                    let done = resolve_as(&sink, context, reply, |n: u64| Value::from(n));
                    api.storage().local.get_bytes_in_use(Some(done));
                }
            }
            other => {
                log::warn!("shim invoked unemulated method {other}");
                if let Some(reply) = reply {
                    sink.push(PageCommand::Resolve {
                        context,
                        reply,
                        value: Value::Null,
                    });
                }
            }
        }
        Ok(())
    }

    fn api(&self, context: u64) -> Result<&CompatApi, BridgeError> {
        self.registry
            .get(context)
            .ok_or(BridgeError::UnknownContext(context))
    }

    fn resolve_unit(&self, context: u64, reply: Option<u64>) -> Option<Done<()>> {
        reply.map(|reply| resolve_as(&self.sink, context, reply, |_: ()| Value::Null))
    }

    fn resolve_with(
        &self,
        context: u64,
        reply: u64,
        convert: impl FnOnce(Map<String, Value>) -> Value + 'static,
    ) -> Done<Map<String, Value>> {
        resolve_as(&self.sink, context, reply, convert)
    }
}

impl std::fmt::Debug for ShimBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShimBridge")
            .field("contexts", &self.registry.len())
            .field("remote_listeners", &self.remote_listeners.len())
            .finish()
    }
}

fn resolve_as<T: 'static>(
    sink: &CommandSink,
    context: u64,
    reply: u64,
    convert: impl FnOnce(T) -> Value + 'static,
) -> Done<T> {
    let sink = sink.clone();
    Box::new(move |value| {
        sink.push(PageCommand::Resolve {
            context,
            reply,
            value: convert(value),
        })
    })
}

fn storage_area(api: &CompatApi, area: AreaName) -> &StorageArea {
    api.storage().area(area)
}

fn register_remote(
    api: &CompatApi,
    event: EventTarget,
    context: u64,
    listener: u64,
    sink: CommandSink,
) -> ListenerId {
    let forward = move |args: Vec<Value>| {
        sink.push(PageCommand::InvokeListener {
            context,
            listener,
            args,
        });
    };

    match event {
        EventTarget::RuntimeMessage => api.runtime().on_message().add_listener(move |event| {
            let sender = serde_json::to_value(&event.sender).unwrap_or(Value::Null);
            forward(vec![event.message.clone(), sender]);
        }),
        EventTarget::BrowserActionClicked | EventTarget::ActionClicked => {
            api.browser_action().on_clicked().add_listener(move |tab| {
                forward(vec![serde_json::to_value(tab).unwrap_or(Value::Null)]);
            })
        }
        EventTarget::StorageChanged => api.storage().on_changed().add_listener(move |event| {
            let changes = serde_json::to_value(&event.changes).unwrap_or(Value::Null);
            forward(vec![changes, Value::String(event.area.as_str().into())]);
        }),
        EventTarget::ContextMenuClicked => api
            .context_menus()
            .on_clicked()
            .add_listener(move |info| forward(vec![info.clone()])),
        EventTarget::NavigationCompleted => api
            .web_navigation()
            .on_completed()
            .add_listener(move |details| forward(vec![details.clone()])),
        EventTarget::BeforeNavigate => api
            .web_navigation()
            .on_before_navigate()
            .add_listener(move |details| forward(vec![details.clone()])),
        EventTarget::Command => api
            .commands()
            .on_command()
            .add_listener(move |command| forward(vec![Value::String(command.clone())])),
    }
}

fn remove_remote(api: &CompatApi, event: EventTarget, id: ListenerId) {
    match event {
        EventTarget::RuntimeMessage => {
            api.runtime().on_message().remove_listener(id);
        }
        EventTarget::BrowserActionClicked | EventTarget::ActionClicked => {
            api.browser_action().on_clicked().remove_listener(id);
        }
        EventTarget::StorageChanged => {
            api.storage().on_changed().remove_listener(id);
        }
        EventTarget::ContextMenuClicked => {
            api.context_menus().on_clicked().remove_listener(id);
        }
        EventTarget::NavigationCompleted => {
            api.web_navigation().on_completed().remove_listener(id);
        }
        EventTarget::BeforeNavigate => {
            api.web_navigation().on_before_navigate().remove_listener(id);
        }
        EventTarget::Command => {
            api.commands().on_command().remove_listener(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bridge() -> ShimBridge {
        ShimBridge::new(HostApp {
            name: "Deckshell".into(),
            version: "0.1.0".into(),
        })
    }

    fn hello(bridge: &mut ShimBridge) {
        bridge
            .handle(r#"{"op": "hello", "context": 1, "url": "https://x.com/i/tweetdeck"}"#)
            .unwrap();
    }

    #[test]
    fn test_hello_creates_context_once() {
        let mut bridge = bridge();
        hello(&mut bridge);
        let id = bridge.registry().get(1).unwrap().runtime().id().to_string();

        hello(&mut bridge);
        assert_eq!(bridge.registry().get(1).unwrap().runtime().id(), id);
    }

    #[test]
    fn test_unknown_context_is_an_error() {
        let mut bridge = bridge();
        let err = bridge
            .handle(r#"{"op": "storageClear", "context": 9, "area": "local"}"#)
            .unwrap_err();
        assert!(matches!(err, BridgeError::UnknownContext(9)));
    }

    #[test]
    fn test_storage_set_then_get_round_trip() {
        let mut bridge = bridge();
        hello(&mut bridge);

        let commands = bridge
            .handle(
                r#"{"op": "storageSet", "context": 1, "area": "local",
                    "items": {"theme": "dark"}, "reply": 10}"#,
            )
            .unwrap();
        assert_eq!(
            commands,
            vec![PageCommand::Resolve {
                context: 1,
                reply: 10,
                value: Value::Null
            }]
        );

        let commands = bridge
            .handle(
                r#"{"op": "storageGet", "context": 1, "area": "local",
                    "keys": "theme", "reply": 11}"#,
            )
            .unwrap();
        assert_eq!(
            commands,
            vec![PageCommand::Resolve {
                context: 1,
                reply: 11,
                value: json!({"theme": "dark"})
            }]
        );
    }

    #[test]
    fn test_remote_listener_receives_broadcast() {
        let mut bridge = bridge();
        hello(&mut bridge);

        bridge
            .handle(
                r#"{"op": "addListener", "context": 1,
                    "event": "runtime.onMessage", "listener": 3}"#,
            )
            .unwrap();

        let commands = bridge
            .handle(
                r#"{"op": "sendMessage", "context": 1,
                    "args": [{"kind": "ping"}], "reply": 12}"#,
            )
            .unwrap();

        assert_eq!(commands.len(), 2);
        match &commands[0] {
            PageCommand::InvokeListener {
                listener, args, ..
            } => {
                assert_eq!(*listener, 3);
                assert_eq!(args[0], json!({"kind": "ping"}));
            }
            other => panic!("expected listener invocation, got {other:?}"),
        }
        match &commands[1] {
            PageCommand::Resolve { reply, value, .. } => {
                assert_eq!(*reply, 12);
                assert_eq!(value["success"], json!(true));
            }
            other => panic!("expected ack resolution, got {other:?}"),
        }
    }

    #[test]
    fn test_remove_listener_stops_delivery() {
        let mut bridge = bridge();
        hello(&mut bridge);

        bridge
            .handle(
                r#"{"op": "addListener", "context": 1,
                    "event": "runtime.onMessage", "listener": 3}"#,
            )
            .unwrap();
        bridge
            .handle(
                r#"{"op": "removeListener", "context": 1,
                    "event": "runtime.onMessage", "listener": 3}"#,
            )
            .unwrap();

        let commands = bridge
            .handle(r#"{"op": "sendMessage", "context": 1, "args": [{"kind": "ping"}]}"#)
            .unwrap();
        assert!(commands.is_empty());
    }

    #[test]
    fn test_action_listener_via_alias_target() {
        let mut bridge = bridge();
        hello(&mut bridge);

        bridge
            .handle(
                r#"{"op": "addListener", "context": 1,
                    "event": "action.onClicked", "listener": 7}"#,
            )
            .unwrap();

        // native click delivery reaches the remote listener
        let api = bridge.registry().get(1).unwrap();
        let tab = api.tabs().host_tab().clone();
        api.browser_action().on_clicked().emit(&tab);
        api.tasks().run_until_idle();
        drop(api);

        let commands = bridge.sink.drain();
        assert_eq!(commands.len(), 1);
        assert!(matches!(
            &commands[0],
            PageCommand::InvokeListener { listener: 7, .. }
        ));
    }

    #[test]
    fn test_unknown_method_resolves_null() {
        let mut bridge = bridge();
        hello(&mut bridge);

        let commands = bridge
            .handle(
                r#"{"op": "invoke", "context": 1,
                    "method": "sidePanel.open", "reply": 4}"#,
            )
            .unwrap();
        assert_eq!(
            commands,
            vec![PageCommand::Resolve {
                context: 1,
                reply: 4,
                value: Value::Null
            }]
        );
    }

    #[test]
    fn test_malformed_envelope() {
        let mut bridge = bridge();
        assert!(matches!(
            bridge.handle("not json"),
            Err(BridgeError::Malformed(_))
        ));
    }

    #[test]
    fn test_command_script_targets_glue_global() {
        let script = PageCommand::Resolve {
            context: 1,
            reply: 2,
            value: Value::Null,
        }
        .to_script()
        .unwrap();
        assert!(script.contains(GLUE_GLOBAL));
        assert!(script.contains("deliver"));
    }

    #[test]
    fn test_goodbye_discards_context() {
        let mut bridge = bridge();
        hello(&mut bridge);
        bridge.handle(r#"{"op": "goodbye", "context": 1}"#).unwrap();
        assert!(bridge.registry().get(1).is_none());
    }
}
