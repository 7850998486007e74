//! Emulated extension-API runtime
//!
//! One [`CompatApi`] exists per page context (frame). It is created when the
//! in-page glue announces itself and discarded when the page navigates away;
//! no state survives a reload. Namespaces carry shared `Rc` state internally,
//! so accessors hand out cheap clones and `action`/`browserAction` stay
//! aliased.

pub mod action;
pub mod bridge;
pub mod events;
pub mod messaging;
pub mod storage;
pub mod stubs;
pub mod tabs;
pub mod tasks;

pub use action::ActionApi;
pub use bridge::{PageCommand, ShimBridge, ShimCall};
pub use events::{EventListeners, ListenerId};
pub use messaging::{normalize_send_args, MessageEvent, MessageSender, Port, RuntimeApi, SendArg};
pub use storage::{AreaName, KeyQuery, StorageArea, StorageEvent, StorageNamespace};
pub use stubs::{CommandsApi, ContextMenusApi, CookiesApi, NotificationsApi, WebNavigationApi};
pub use tabs::{Tab, TabsApi};
pub use tasks::{Done, TaskQueue};

use serde_json::{json, Value};
use std::collections::HashMap;

/// Identity of the host application, served to extensions that ask for a
/// manifest or an action title.
#[derive(Debug, Clone)]
pub struct HostApp {
    pub name: String,
    pub version: String,
}

impl HostApp {
    pub fn manifest_value(&self) -> Value {
        json!({
            "name": self.name,
            "version": self.version,
            "manifest_version": 3,
        })
    }
}

/// What the runtime needs to know about the frame it serves.
#[derive(Debug, Clone)]
pub struct PageDescriptor {
    pub url: String,
}

/// The emulated API surface for one page context.
pub struct CompatApi {
    tasks: TaskQueue,
    runtime: RuntimeApi,
    storage: StorageNamespace,
    browser_action: ActionApi,
    action: ActionApi,
    tabs: TabsApi,
    context_menus: ContextMenusApi,
    notifications: NotificationsApi,
    web_navigation: WebNavigationApi,
    cookies: CookiesApi,
    commands: CommandsApi,
}

impl CompatApi {
    pub fn new(page: &PageDescriptor, app: &HostApp) -> Self {
        let tasks = TaskQueue::new();
        let runtime = RuntimeApi::new(app.manifest_value(), tasks.clone());
        let browser_action = ActionApi::new(app.name.clone(), tasks.clone());
        // clone shares the listener list: the MV3 alias of browserAction
        let action = browser_action.clone();
        let tabs = TabsApi::new(page.url.clone(), runtime.clone());

        Self {
            storage: StorageNamespace::new(tasks.clone()),
            context_menus: ContextMenusApi::new(tasks.clone()),
            notifications: NotificationsApi::new(tasks.clone()),
            web_navigation: WebNavigationApi::new(),
            cookies: CookiesApi::new(tasks.clone()),
            commands: CommandsApi::new(tasks.clone()),
            runtime,
            browser_action,
            action,
            tabs,
            tasks,
        }
    }

    pub fn tasks(&self) -> &TaskQueue {
        &self.tasks
    }

    pub fn runtime(&self) -> &RuntimeApi {
        &self.runtime
    }

    pub fn storage(&self) -> &StorageNamespace {
        &self.storage
    }

    pub fn browser_action(&self) -> &ActionApi {
        &self.browser_action
    }

    pub fn action(&self) -> &ActionApi {
        &self.action
    }

    pub fn tabs(&self) -> &TabsApi {
        &self.tabs
    }

    pub fn context_menus(&self) -> &ContextMenusApi {
        &self.context_menus
    }

    pub fn notifications(&self) -> &NotificationsApi {
        &self.notifications
    }

    pub fn web_navigation(&self) -> &WebNavigationApi {
        &self.web_navigation
    }

    pub fn cookies(&self) -> &CookiesApi {
        &self.cookies
    }

    pub fn commands(&self) -> &CommandsApi {
        &self.commands
    }
}

impl std::fmt::Debug for CompatApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompatApi")
            .field("runtime_id", &self.runtime.id())
            .finish()
    }
}

/// Per-context registry. `ensure` is the init-once guard: a second
/// announcement from a context that already has an API keeps the existing
/// instance and its live listener registrations.
#[derive(Debug, Default)]
pub struct CompatRegistry {
    contexts: HashMap<u64, CompatApi>,
}

impl CompatRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ensure(&mut self, context: u64, page: &PageDescriptor, app: &HostApp) -> &mut CompatApi {
        self.contexts
            .entry(context)
            .or_insert_with(|| CompatApi::new(page, app))
    }

    pub fn get(&self, context: u64) -> Option<&CompatApi> {
        self.contexts.get(&context)
    }

    pub fn get_mut(&mut self, context: u64) -> Option<&mut CompatApi> {
        self.contexts.get_mut(&context)
    }

    /// Drop one context's state (its frame navigated away).
    pub fn discard(&mut self, context: u64) {
        self.contexts.remove(&context);
    }

    /// Drop everything (the page navigated).
    pub fn reset(&mut self) {
        self.contexts.clear();
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> PageDescriptor {
        PageDescriptor {
            url: "https://x.com/i/tweetdeck".into(),
        }
    }

    fn app() -> HostApp {
        HostApp {
            name: "Deckshell".into(),
            version: "0.1.0".into(),
        }
    }

    #[test]
    fn test_action_aliases_browser_action() {
        let api = CompatApi::new(&page(), &app());

        let id = api.browser_action().on_clicked().add_listener(|_| {});
        assert!(api.action().on_clicked().has_listener(id));

        let id2 = api.action().on_clicked().add_listener(|_| {});
        assert!(api.browser_action().on_clicked().has_listener(id2));
    }

    #[test]
    fn test_registry_keeps_existing_context() {
        let mut registry = CompatRegistry::new();
        let first_id = registry.ensure(1, &page(), &app()).runtime().id().to_string();

        // re-announcement must not rebuild the context
        let second_id = registry.ensure(1, &page(), &app()).runtime().id().to_string();
        assert_eq!(first_id, second_id);

        registry.discard(1);
        let third_id = registry.ensure(1, &page(), &app()).runtime().id().to_string();
        assert_ne!(first_id, third_id);
    }

    #[test]
    fn test_reset_discards_all_contexts() {
        let mut registry = CompatRegistry::new();
        registry.ensure(1, &page(), &app());
        registry.ensure(2, &page(), &app());
        assert_eq!(registry.len(), 2);

        registry.reset();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_host_manifest_shape() {
        let manifest = app().manifest_value();
        assert_eq!(manifest["name"], "Deckshell");
        assert_eq!(manifest["manifest_version"], 3);
    }
}
