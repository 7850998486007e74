//! Emulated `runtime` messaging: sendMessage normalization, broadcast, ports

use super::events::EventListeners;
use super::tasks::{Done, TaskQueue};
use serde::Serialize;
use serde_json::{json, Value};
use std::cell::Cell;
use std::rc::Rc;

/// Mint a short random hex token for runtime/extension ids.
pub fn random_token() -> String {
    let mut buf = [0u8; 8];
    // on entropy failure the zeroed buffer still yields a well-formed id
    let _ = getrandom::getrandom(&mut buf);
    buf.iter().map(|b| format!("{b:02x}")).collect()
}

fn mint_extension_id() -> String {
    format!("ext-{}", random_token())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageSender {
    pub id: String,
}

/// Argument record delivered to `runtime.onMessage` listeners.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageEvent {
    pub message: Value,
    pub sender: MessageSender,
}

/// One positional argument of the polymorphic `sendMessage` call.
pub enum SendArg {
    Value(Value),
    Callback(Done<Value>),
}

impl std::fmt::Debug for SendArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SendArg::Value(value) => f.debug_tuple("Value").field(value).finish(),
            SendArg::Callback(_) => f.write_str("Callback"),
        }
    }
}

/// Canonical form of a `sendMessage` invocation.
pub struct Delivery {
    pub extension_id: String,
    pub message: Value,
    pub callback: Option<Done<Value>>,
}

/// Collapse the 2–4 positional `sendMessage` forms into a [`Delivery`].
///
/// A leading string is the target extension id and shifts the message one
/// slot right; otherwise the first argument is the message and an id is
/// minted. The response callback is the first callback argument after the
/// message; a non-callback options slot in between is tolerated and ignored.
pub fn normalize_send_args(args: Vec<SendArg>) -> Delivery {
    let mut args = args.into_iter();

    let (extension_id, message) = match args.next() {
        Some(SendArg::Value(Value::String(id))) => {
            let message = match args.next() {
                Some(SendArg::Value(value)) => value,
                Some(callback @ SendArg::Callback(_)) => {
                    // (id, callback) form, no message payload
                    return Delivery {
                        extension_id: id,
                        message: Value::Null,
                        callback: into_callback(callback),
                    };
                }
                None => Value::Null,
            };
            (id, message)
        }
        Some(SendArg::Value(value)) => (mint_extension_id(), value),
        Some(callback @ SendArg::Callback(_)) => {
            return Delivery {
                extension_id: mint_extension_id(),
                message: Value::Null,
                callback: into_callback(callback),
            };
        }
        None => (mint_extension_id(), Value::Null),
    };

    let callback = args.find_map(|arg| match arg {
        SendArg::Callback(done) => Some(done),
        SendArg::Value(_) => None,
    });

    Delivery {
        extension_id,
        message,
        callback,
    }
}

fn into_callback(arg: SendArg) -> Option<Done<Value>> {
    match arg {
        SendArg::Callback(done) => Some(done),
        SendArg::Value(_) => None,
    }
}

/// Long-lived messaging handle. The transport is a no-op but the object
/// shape is stable and reusable: listener registration works and
/// `disconnect` fires `onDisconnect` once.
#[derive(Clone)]
pub struct Port {
    name: Option<String>,
    connected: Rc<Cell<bool>>,
    on_message: EventListeners<Value>,
    on_disconnect: EventListeners<()>,
}

impl Port {
    fn new(name: Option<String>) -> Self {
        Self {
            name,
            connected: Rc::new(Cell::new(true)),
            on_message: EventListeners::new("port.onMessage"),
            on_disconnect: EventListeners::new("port.onDisconnect"),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.get()
    }

    pub fn post_message(&self, message: Value) {
        log::debug!("port.postMessage (no transport): {message}");
    }

    pub fn disconnect(&self) {
        if self.connected.replace(false) {
            self.on_disconnect.emit(&());
        }
    }

    pub fn on_message(&self) -> &EventListeners<Value> {
        &self.on_message
    }

    pub fn on_disconnect(&self) -> &EventListeners<()> {
        &self.on_disconnect
    }
}

/// Emulated `chrome.runtime`.
#[derive(Clone)]
pub struct RuntimeApi {
    id: String,
    manifest: Value,
    on_message: EventListeners<MessageEvent>,
    tasks: TaskQueue,
}

impl RuntimeApi {
    pub(crate) fn new(manifest: Value, tasks: TaskQueue) -> Self {
        Self {
            id: mint_extension_id(),
            manifest,
            on_message: EventListeners::new("runtime.onMessage"),
            tasks,
        }
    }

    /// Random per page load, stable until the context is discarded.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn on_message(&self) -> &EventListeners<MessageEvent> {
        &self.on_message
    }

    pub(crate) fn tasks(&self) -> &TaskQueue {
        &self.tasks
    }

    /// Normalize, broadcast in registration order, then acknowledge the
    /// response callback on the next queue drain. A failing listener does
    /// not interrupt delivery or suppress the acknowledgement.
    pub fn send_message(&self, args: Vec<SendArg>) {
        let delivery = normalize_send_args(args);

        log::debug!(
            "runtime.sendMessage to {}: {}",
            delivery.extension_id,
            delivery.message
        );

        self.on_message.emit(&MessageEvent {
            message: delivery.message.clone(),
            sender: MessageSender {
                id: delivery.extension_id.clone(),
            },
        });

        if let Some(done) = delivery.callback {
            let ack = json!({
                "success": true,
                "extensionId": delivery.extension_id,
                "message": delivery.message,
            });
            self.tasks.defer(move || done(ack));
        }
    }

    pub fn connect(&self, name: Option<String>) -> Port {
        Port::new(name)
    }

    /// Host application descriptor served in place of a real manifest.
    pub fn get_manifest(&self) -> Value {
        self.manifest.clone()
    }

    pub fn get_url(&self, path: &str) -> String {
        format!(
            "chrome-extension://{}/{}",
            self.id,
            path.trim_start_matches('/')
        )
    }

    /// No emulated operation sets a last error.
    pub fn last_error(&self) -> Option<String> {
        None
    }
}

impl std::fmt::Debug for RuntimeApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeApi").field("id", &self.id).finish()
    }
}
