//! Emulated `action` / `browserAction` namespace
//!
//! `action` and `browserAction` are constructed as clones of one instance,
//! so the onClicked list and every setter act on shared state.

use super::events::EventListeners;
use super::tabs::Tab;
use super::tasks::{Done, TaskQueue};
use serde_json::Value;

#[derive(Clone)]
pub struct ActionApi {
    on_clicked: EventListeners<Tab>,
    default_title: String,
    tasks: TaskQueue,
}

impl ActionApi {
    pub(crate) fn new(default_title: String, tasks: TaskQueue) -> Self {
        Self {
            on_clicked: EventListeners::new("browserAction.onClicked"),
            default_title,
            tasks,
        }
    }

    pub fn on_clicked(&self) -> &EventListeners<Tab> {
        &self.on_clicked
    }

    pub fn set_icon(&self, _details: Value, done: Option<Done<()>>) {
        self.ack(done);
    }

    pub fn set_title(&self, _details: Value, done: Option<Done<()>>) {
        self.ack(done);
    }

    pub fn set_badge_text(&self, _details: Value, done: Option<Done<()>>) {
        self.ack(done);
    }

    pub fn set_badge_background_color(&self, _details: Value, done: Option<Done<()>>) {
        self.ack(done);
    }

    pub fn set_popup(&self, _details: Value, done: Option<Done<()>>) {
        self.ack(done);
    }

    pub fn enable(&self, _tab_id: Option<i64>, done: Option<Done<()>>) {
        self.ack(done);
    }

    pub fn disable(&self, _tab_id: Option<i64>, done: Option<Done<()>>) {
        self.ack(done);
    }

    pub fn get_badge_text(&self, _details: Value, done: Done<String>) {
        self.tasks.defer(move || done(String::new()));
    }

    pub fn get_title(&self, _details: Value, done: Done<String>) {
        let title = self.default_title.clone();
        self.tasks.defer(move || done(title));
    }

    pub fn get_badge_background_color(&self, _details: Value, done: Done<[u8; 4]>) {
        self.tasks.defer(move || done([0, 0, 0, 0]));
    }

    pub fn get_popup(&self, _details: Value, done: Done<String>) {
        self.tasks.defer(move || done(String::new()));
    }

    /// There is no real toolbar UI behind these; acknowledging is the
    /// whole contract.
    fn ack(&self, done: Option<Done<()>>) {
        if let Some(done) = done {
            self.tasks.defer(move || done(()));
        }
    }
}

impl std::fmt::Debug for ActionApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionApi")
            .field("listeners", &self.on_clicked.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_aliased_clone_shares_click_listeners() {
        let tasks = TaskQueue::new();
        let browser_action = ActionApi::new("Shell".into(), tasks);
        let action = browser_action.clone();

        let id = browser_action.on_clicked().add_listener(|_tab: &Tab| {});
        assert!(action.on_clicked().has_listener(id));
    }

    #[test]
    fn test_setters_acknowledge_on_drain() {
        let tasks = TaskQueue::new();
        let action = ActionApi::new("Shell".into(), tasks.clone());

        let acked = Rc::new(Cell::new(0));
        for _ in 0..2 {
            let sink = Rc::clone(&acked);
            action.set_badge_text(
                json!({"text": "9+"}),
                Some(Box::new(move |_| sink.set(sink.get() + 1))),
            );
        }

        assert_eq!(acked.get(), 0);
        tasks.run_until_idle();
        assert_eq!(acked.get(), 2);
    }

    #[test]
    fn test_getters_report_neutral_state() {
        let tasks = TaskQueue::new();
        let action = ActionApi::new("Dashboard".into(), tasks.clone());

        let title = Rc::new(std::cell::RefCell::new(String::new()));
        let sink = Rc::clone(&title);
        action.get_title(json!({}), Box::new(move |t| *sink.borrow_mut() = t));

        let color = Rc::new(Cell::new([9u8; 4]));
        let sink = Rc::clone(&color);
        action.get_badge_background_color(json!({}), Box::new(move |c| sink.set(c)));

        tasks.run_until_idle();
        assert_eq!(*title.borrow(), "Dashboard");
        assert_eq!(color.get(), [0, 0, 0, 0]);
    }
}
