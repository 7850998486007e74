//! Emulated `storage.local` / `storage.sync` areas
//!
//! Both areas are independent in-memory maps with identical local-only
//! semantics; nothing syncs anywhere. They share one `onChanged` listener
//! list, which receives the mutated keys and the area name.

use super::events::EventListeners;
use super::tasks::{Done, TaskQueue};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AreaName {
    Local,
    Sync,
}

impl AreaName {
    pub fn as_str(&self) -> &'static str {
        match self {
            AreaName::Local => "local",
            AreaName::Sync => "sync",
        }
    }
}

/// The four key shapes `storage.*.get` accepts.
#[derive(Debug, Clone)]
pub enum KeyQuery {
    /// `get(null)`: everything in the area.
    All,
    Single(String),
    Keys(Vec<String>),
    /// Mapping whose values are defaults for missing keys.
    WithDefaults(Map<String, Value>),
}

impl KeyQuery {
    /// Interpret a JSON argument the way the page-side `get` does.
    pub fn from_wire(value: Value) -> Self {
        match value {
            Value::Null => KeyQuery::All,
            Value::String(key) => KeyQuery::Single(key),
            Value::Array(keys) => KeyQuery::Keys(
                keys.into_iter()
                    .filter_map(|k| match k {
                        Value::String(key) => Some(key),
                        _ => None,
                    })
                    .collect(),
            ),
            Value::Object(defaults) => KeyQuery::WithDefaults(defaults),
            // numbers/bools have no meaning here; treat as an empty selection
            _ => KeyQuery::Keys(Vec::new()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AreaChange {
    #[serde(rename = "newValue")]
    pub new_value: Value,
}

/// Argument record delivered to `storage.onChanged` listeners.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageEvent {
    pub changes: BTreeMap<String, AreaChange>,
    pub area: AreaName,
}

#[derive(Clone)]
pub struct StorageArea {
    area: AreaName,
    values: Rc<RefCell<BTreeMap<String, Value>>>,
    on_changed: EventListeners<StorageEvent>,
    tasks: TaskQueue,
}

impl StorageArea {
    pub(crate) fn new(
        area: AreaName,
        on_changed: EventListeners<StorageEvent>,
        tasks: TaskQueue,
    ) -> Self {
        Self {
            area,
            values: Rc::new(RefCell::new(BTreeMap::new())),
            on_changed,
            tasks,
        }
    }

    pub fn area(&self) -> AreaName {
        self.area
    }

    /// Resolve a query against the backing map. Missing keys are absent from
    /// the result unless the query supplies a default for them. The optional
    /// callback completes on the next queue drain with the same record.
    pub fn get(&self, query: &KeyQuery, done: Option<Done<Map<String, Value>>>) -> Map<String, Value> {
        let values = self.values.borrow();
        let mut result = Map::new();

        match query {
            KeyQuery::All => {
                for (key, value) in values.iter() {
                    result.insert(key.clone(), value.clone());
                }
            }
            KeyQuery::Single(key) => {
                if let Some(value) = values.get(key) {
                    result.insert(key.clone(), value.clone());
                }
            }
            KeyQuery::Keys(keys) => {
                for key in keys {
                    if let Some(value) = values.get(key) {
                        result.insert(key.clone(), value.clone());
                    }
                }
            }
            KeyQuery::WithDefaults(defaults) => {
                for (key, default) in defaults {
                    let value = values.get(key).cloned().unwrap_or_else(|| default.clone());
                    result.insert(key.clone(), value);
                }
            }
        }
        drop(values);

        if let Some(done) = done {
            let deferred = result.clone();
            self.tasks.defer(move || done(deferred));
        }
        result
    }

    /// Merge the items into the area, then notify `onChanged` listeners.
    /// Values are committed before any notification or completion runs, so a
    /// later `get` on the same key observes the new value.
    pub fn set(&self, items: Map<String, Value>, done: Option<Done<()>>) {
        let mut changes = BTreeMap::new();
        {
            let mut values = self.values.borrow_mut();
            for (key, value) in items {
                changes.insert(
                    key.clone(),
                    AreaChange {
                        new_value: value.clone(),
                    },
                );
                values.insert(key, value);
            }
        }

        if !changes.is_empty() {
            self.on_changed.emit(&StorageEvent {
                changes,
                area: self.area,
            });
        }
        self.complete(done);
    }

    pub fn remove(&self, keys: &[String], done: Option<Done<()>>) {
        {
            let mut values = self.values.borrow_mut();
            for key in keys {
                values.remove(key);
            }
        }
        self.complete(done);
    }

    pub fn clear(&self, done: Option<Done<()>>) {
        self.values.borrow_mut().clear();
        self.complete(done);
    }

    /// Byte accounting is not tracked; the emulation reports zero.
    pub fn get_bytes_in_use(&self, done: Option<Done<u64>>) -> u64 {
        if let Some(done) = done {
            self.tasks.defer(move || done(0));
        }
        0
    }

    pub fn len(&self) -> usize {
        self.values.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.borrow().is_empty()
    }

    fn complete(&self, done: Option<Done<()>>) {
        if let Some(done) = done {
            self.tasks.defer(move || done(()));
        }
    }
}

impl std::fmt::Debug for StorageArea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageArea")
            .field("area", &self.area.as_str())
            .field("keys", &self.len())
            .finish()
    }
}

/// `chrome.storage`: two independent areas sharing one `onChanged` list.
#[derive(Debug, Clone)]
pub struct StorageNamespace {
    pub local: StorageArea,
    pub sync: StorageArea,
    on_changed: EventListeners<StorageEvent>,
}

impl StorageNamespace {
    pub(crate) fn new(tasks: TaskQueue) -> Self {
        let on_changed = EventListeners::new("storage.onChanged");
        Self {
            local: StorageArea::new(AreaName::Local, on_changed.clone(), tasks.clone()),
            sync: StorageArea::new(AreaName::Sync, on_changed.clone(), tasks),
            on_changed,
        }
    }

    pub fn on_changed(&self) -> &EventListeners<StorageEvent> {
        &self.on_changed
    }

    pub fn area(&self, name: AreaName) -> &StorageArea {
        match name {
            AreaName::Local => &self.local,
            AreaName::Sync => &self.sync,
        }
    }
}
