//! Emulated `tabs` namespace: the hosting page as a single synthetic tab

use super::messaging::{RuntimeApi, SendArg};
use super::tasks::Done;
use serde::Serialize;
use serde_json::Value;

pub const HOST_TAB_ID: i64 = 1;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tab {
    pub id: i64,
    pub url: String,
    pub active: bool,
}

#[derive(Debug, Clone)]
pub struct TabsApi {
    tab: Tab,
    runtime: RuntimeApi,
}

impl TabsApi {
    pub(crate) fn new(page_url: String, runtime: RuntimeApi) -> Self {
        Self {
            tab: Tab {
                id: HOST_TAB_ID,
                url: page_url,
                active: true,
            },
            runtime,
        }
    }

    pub fn host_tab(&self) -> &Tab {
        &self.tab
    }

    /// Every query matches the one hosting page.
    pub fn query(&self, _info: &Value, done: Option<Done<Vec<Tab>>>) -> Vec<Tab> {
        let result = vec![self.tab.clone()];
        if let Some(done) = done {
            let deferred = result.clone();
            self.runtime.tasks().defer(move || done(deferred));
        }
        result
    }

    pub fn get(&self, tab_id: i64, done: Option<Done<Tab>>) -> Tab {
        let result = Tab {
            id: tab_id,
            ..self.tab.clone()
        };
        if let Some(done) = done {
            let deferred = result.clone();
            self.runtime.tasks().defer(move || done(deferred));
        }
        result
    }

    /// Delivery goes through the same broadcast as `runtime.sendMessage`;
    /// the tab id is accepted and ignored since there is only one page.
    pub fn send_message(&self, _tab_id: i64, message: Value, done: Option<Done<Value>>) {
        let mut args = vec![SendArg::Value(message)];
        if let Some(done) = done {
            args.push(SendArg::Callback(done));
        }
        self.runtime.send_message(args);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compat::messaging::MessageEvent;
    use crate::compat::tasks::TaskQueue;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn tabs() -> (TabsApi, RuntimeApi, TaskQueue) {
        let tasks = TaskQueue::new();
        let runtime = RuntimeApi::new(json!({"name": "Host"}), tasks.clone());
        (
            TabsApi::new("https://x.com/i/tweetdeck".into(), runtime.clone()),
            runtime,
            tasks,
        )
    }

    #[test]
    fn test_query_returns_the_hosting_tab() {
        let (tabs, _runtime, _tasks) = tabs();
        let result = tabs.query(&json!({"active": true}), None);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, HOST_TAB_ID);
        assert!(result[0].active);
        assert_eq!(result[0].url, "https://x.com/i/tweetdeck");
    }

    #[test]
    fn test_get_echoes_requested_id() {
        let (tabs, _runtime, _tasks) = tabs();
        let tab = tabs.get(42, None);
        assert_eq!(tab.id, 42);
        assert_eq!(tab.url, tabs.host_tab().url);
    }

    #[test]
    fn test_send_message_routes_through_runtime_broadcast() {
        let (tabs, runtime, tasks) = tabs();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let sink = Rc::clone(&seen);
        runtime.on_message().add_listener(move |event: &MessageEvent| {
            sink.borrow_mut().push(event.message.clone());
        });

        let acked = Rc::new(RefCell::new(None));
        let ack_sink = Rc::clone(&acked);
        tabs.send_message(
            HOST_TAB_ID,
            json!({"kind": "refresh"}),
            Some(Box::new(move |response| {
                *ack_sink.borrow_mut() = Some(response);
            })),
        );

        tasks.run_until_idle();
        assert_eq!(*seen.borrow(), vec![json!({"kind": "refresh"})]);
        assert!(acked.borrow().is_some());
    }
}
