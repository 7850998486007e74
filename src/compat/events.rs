//! Ordered listener lists backing the emulated event objects

use std::cell::RefCell;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

/// Handle returned by [`EventListeners::add_listener`]; the emulated
/// `removeListener`/`hasListener` operate on these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Callback<A> = Rc<dyn Fn(&A)>;

struct ListenerList<A> {
    entries: Vec<(ListenerId, Callback<A>)>,
    next_id: u64,
}

/// An ordered list of callback handles with `addListener`/`removeListener`/
/// `hasListener` semantics and isolated in-order dispatch.
///
/// Clones share the underlying list; `action.onClicked` and
/// `browserAction.onClicked` are clones of one list, so registration through
/// either is visible through both.
pub struct EventListeners<A> {
    name: &'static str,
    inner: Rc<RefCell<ListenerList<A>>>,
}

impl<A> Clone for EventListeners<A> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<A> EventListeners<A> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            inner: Rc::new(RefCell::new(ListenerList {
                entries: Vec::new(),
                next_id: 1,
            })),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn add_listener(&self, callback: impl Fn(&A) + 'static) -> ListenerId {
        let mut inner = self.inner.borrow_mut();
        let id = ListenerId(inner.next_id);
        inner.next_id += 1;
        inner.entries.push((id, Rc::new(callback)));
        id
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut inner = self.inner.borrow_mut();
        let before = inner.entries.len();
        inner.entries.retain(|(entry_id, _)| *entry_id != id);
        inner.entries.len() != before
    }

    pub fn has_listener(&self, id: ListenerId) -> bool {
        self.inner
            .borrow()
            .entries
            .iter()
            .any(|(entry_id, _)| *entry_id == id)
    }

    pub fn has_listeners(&self) -> bool {
        !self.inner.borrow().entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().entries.is_empty()
    }

    /// Deliver to every listener in registration order. A listener that
    /// panics is logged and skipped; the rest still run.
    pub fn emit(&self, args: &A) {
        // snapshot so listeners may add/remove listeners while dispatching
        let snapshot: Vec<Callback<A>> = self
            .inner
            .borrow()
            .entries
            .iter()
            .map(|(_, callback)| Rc::clone(callback))
            .collect();

        for callback in snapshot {
            let outcome = catch_unwind(AssertUnwindSafe(|| callback(args)));
            if outcome.is_err() {
                log::warn!("{}: listener failed during dispatch", self.name);
            }
        }
    }
}

impl<A> std::fmt::Debug for EventListeners<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventListeners")
            .field("name", &self.name)
            .field("listeners", &self.len())
            .finish()
    }
}
