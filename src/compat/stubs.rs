//! Minimal stand-ins: contextMenus, notifications, webNavigation, cookies,
//! commands
//!
//! Creation/update/removal acknowledge without any OS-level effect, and the
//! event objects are registration sinks the host never fires. Extensions
//! that depend on these events degrade silently.

use super::events::EventListeners;
use super::tasks::{Done, TaskQueue};
use serde_json::Value;
use std::cell::Cell;
use std::rc::Rc;

#[derive(Clone)]
pub struct ContextMenusApi {
    next_id: Rc<Cell<u64>>,
    on_clicked: EventListeners<Value>,
    tasks: TaskQueue,
}

impl ContextMenusApi {
    pub(crate) fn new(tasks: TaskQueue) -> Self {
        Self {
            next_id: Rc::new(Cell::new(1)),
            on_clicked: EventListeners::new("contextMenus.onClicked"),
            tasks,
        }
    }

    pub fn create(&self, _properties: Value, done: Option<Done<()>>) -> String {
        let n = self.next_id.get();
        self.next_id.set(n + 1);
        ack(&self.tasks, done);
        format!("menu_{n}")
    }

    pub fn update(&self, _id: &str, _properties: Value, done: Option<Done<()>>) {
        ack(&self.tasks, done);
    }

    pub fn remove(&self, _id: &str, done: Option<Done<()>>) {
        ack(&self.tasks, done);
    }

    pub fn remove_all(&self, done: Option<Done<()>>) {
        ack(&self.tasks, done);
    }

    pub fn on_clicked(&self) -> &EventListeners<Value> {
        &self.on_clicked
    }
}

#[derive(Clone)]
pub struct NotificationsApi {
    next_id: Rc<Cell<u64>>,
    tasks: TaskQueue,
}

impl NotificationsApi {
    pub(crate) fn new(tasks: TaskQueue) -> Self {
        Self {
            next_id: Rc::new(Cell::new(1)),
            tasks,
        }
    }

    /// Returns the caller's id, or a generated one when absent; no
    /// notification is shown.
    pub fn create(
        &self,
        id: Option<String>,
        _options: Value,
        done: Option<Done<String>>,
    ) -> String {
        let id = id.unwrap_or_else(|| {
            let n = self.next_id.get();
            self.next_id.set(n + 1);
            format!("notif_{n}")
        });
        if let Some(done) = done {
            let deferred = id.clone();
            self.tasks.defer(move || done(deferred));
        }
        id
    }

    /// Nothing is ever shown, so nothing was updated.
    pub fn update(&self, _id: &str, _options: Value, done: Option<Done<bool>>) {
        if let Some(done) = done {
            self.tasks.defer(move || done(false));
        }
    }

    pub fn clear(&self, _id: &str, done: Option<Done<bool>>) {
        if let Some(done) = done {
            self.tasks.defer(move || done(false));
        }
    }
}

#[derive(Clone)]
pub struct WebNavigationApi {
    on_completed: EventListeners<Value>,
    on_before_navigate: EventListeners<Value>,
}

impl WebNavigationApi {
    pub(crate) fn new() -> Self {
        Self {
            on_completed: EventListeners::new("webNavigation.onCompleted"),
            on_before_navigate: EventListeners::new("webNavigation.onBeforeNavigate"),
        }
    }

    pub fn on_completed(&self) -> &EventListeners<Value> {
        &self.on_completed
    }

    pub fn on_before_navigate(&self) -> &EventListeners<Value> {
        &self.on_before_navigate
    }
}

#[derive(Clone)]
pub struct CookiesApi {
    tasks: TaskQueue,
}

impl CookiesApi {
    pub(crate) fn new(tasks: TaskQueue) -> Self {
        Self { tasks }
    }

    /// The cookie jar belongs to the host session; the emulation answers
    /// null for every lookup.
    pub fn get(&self, _details: Value, done: Done<Value>) {
        self.tasks.defer(move || done(Value::Null));
    }

    pub fn set(&self, _details: Value, done: Option<Done<Value>>) {
        if let Some(done) = done {
            self.tasks.defer(move || done(Value::Null));
        }
    }

    pub fn remove(&self, _details: Value, done: Option<Done<Value>>) {
        if let Some(done) = done {
            self.tasks.defer(move || done(Value::Null));
        }
    }
}

#[derive(Clone)]
pub struct CommandsApi {
    on_command: EventListeners<String>,
    tasks: TaskQueue,
}

impl CommandsApi {
    pub(crate) fn new(tasks: TaskQueue) -> Self {
        Self {
            on_command: EventListeners::new("commands.onCommand"),
            tasks,
        }
    }

    pub fn on_command(&self) -> &EventListeners<String> {
        &self.on_command
    }

    pub fn get_all(&self, done: Done<Vec<Value>>) {
        self.tasks.defer(move || done(Vec::new()));
    }
}

fn ack(tasks: &TaskQueue, done: Option<Done<()>>) {
    if let Some(done) = done {
        tasks.defer(move || done(()));
    }
}
