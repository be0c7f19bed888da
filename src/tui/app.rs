//! Application state for the investigation TUI

use std::time::{Duration, Instant};

use crate::trace::{Investigation, Msg, NodeId, TraceEvent};

use super::msg::Action;

/// How long a status message stays in the footer
const STATUS_TTL: Duration = Duration::from_secs(3);

pub struct App {
    pub investigation: Investigation,
    /// Node under the focus ring (not necessarily selected)
    pub focus: Option<NodeId>,
    pub show_help: bool,
    status: Option<(String, Instant)>,
}

impl App {
    pub fn new(investigation: Investigation) -> Self {
        Self {
            investigation,
            focus: None,
            show_help: false,
            status: None,
        }
    }

    /// Handle a key action. Returns true to quit.
    pub fn handle_action(&mut self, action: Action) -> bool {
        match action {
            Action::Quit => return true,
            Action::StartReplay => {
                if self.investigation.update(Msg::StartReplay) {
                    self.focus = None;
                    let total = self.investigation.replay().total().unwrap_or(0);
                    self.set_status(format!("Replaying {} step(s)", total));
                } else if self.investigation.is_replaying() {
                    self.set_status("Replay already running");
                }
            }
            Action::FocusNext => self.cycle_focus(true),
            Action::FocusPrev => self.cycle_focus(false),
            Action::SelectFocused => {
                if let Some(id) = self.focus {
                    self.investigation.update(Msg::Select(id));
                }
            }
            Action::ClearSelection => {
                self.investigation.update(Msg::ClearSelection);
            }
            Action::ToggleHelp => self.show_help = !self.show_help,
            Action::Noop => {}
        }
        false
    }

    /// Feed newly arrived events through the dispatcher
    pub fn on_arrivals(&mut self, events: Vec<TraceEvent>) {
        let mut accepted = 0;
        for event in events {
            if self.investigation.update(Msg::Arrived(event)) {
                accepted += 1;
            }
        }
        if accepted > 0 && self.investigation.is_replaying() {
            self.set_status(format!("{} new step(s) held until replay ends", accepted));
        }
    }

    /// Advance replay time
    pub fn on_elapsed(&mut self, elapsed: Duration) {
        let was_replaying = self.investigation.is_replaying();
        self.investigation.update(Msg::Elapsed(elapsed));
        if was_replaying && !self.investigation.is_replaying() {
            self.set_status("Replay complete");
        }
        if let Some((_, at)) = &self.status {
            if at.elapsed() >= STATUS_TTL {
                self.status = None;
            }
        }
    }

    /// Visible node ids in layout order
    pub fn visible_nodes(&self) -> Vec<NodeId> {
        self.investigation.graph().nodes.iter().map(|n| n.id).collect()
    }

    fn cycle_focus(&mut self, forward: bool) {
        let nodes = self.visible_nodes();
        if nodes.is_empty() {
            self.focus = None;
            return;
        }
        let current = self.focus.and_then(|id| nodes.iter().position(|n| *n == id));
        let next = match (current, forward) {
            (None, true) => 0,
            (None, false) => nodes.len() - 1,
            (Some(i), true) => (i + 1) % nodes.len(),
            (Some(i), false) => (i + nodes.len() - 1) % nodes.len(),
        };
        self.focus = Some(nodes[next]);
    }

    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status = Some((message.into(), Instant::now()));
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_ref().map(|(m, _)| m.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::store::tests::{make_event, make_root};
    use crate::trace::{Grid, TraceStore, DEFAULT_INTERVAL};
    use serde_json::json;

    fn app(count: i64) -> App {
        let events = (1..=count)
            .map(|id| make_event(id, "INTEL", "THINKING", json!({})))
            .collect();
        let store = TraceStore::from_history(make_root("evt-1"), events);
        App::new(Investigation::new(store, DEFAULT_INTERVAL, Grid::default()))
    }

    #[test]
    fn test_focus_cycles_through_visible_nodes() {
        let mut app = app(2);
        app.handle_action(Action::FocusNext);
        assert_eq!(app.focus, Some(NodeId::Root));
        app.handle_action(Action::FocusNext);
        app.handle_action(Action::FocusNext);
        assert_eq!(app.focus, Some(NodeId::Trace(2)));
        app.handle_action(Action::FocusNext);
        assert_eq!(app.focus, Some(NodeId::Root));
        app.handle_action(Action::FocusPrev);
        assert_eq!(app.focus, Some(NodeId::Trace(2)));
    }

    #[test]
    fn test_enter_selects_focused_node() {
        let mut app = app(1);
        app.handle_action(Action::SelectFocused);
        assert_eq!(app.investigation.selected(), None);

        app.handle_action(Action::FocusPrev);
        app.handle_action(Action::SelectFocused);
        assert_eq!(app.investigation.selected(), Some(NodeId::Trace(1)));

        app.handle_action(Action::ClearSelection);
        assert_eq!(app.investigation.selected(), None);
    }

    #[test]
    fn test_replay_resets_focus_and_reports() {
        let mut app = app(3);
        app.handle_action(Action::FocusNext);
        app.handle_action(Action::StartReplay);
        assert_eq!(app.focus, None);
        assert!(app.investigation.is_replaying());
        assert_eq!(app.status(), Some("Replaying 3 step(s)"));

        app.handle_action(Action::StartReplay);
        assert_eq!(app.status(), Some("Replay already running"));

        app.on_elapsed(DEFAULT_INTERVAL * 4);
        assert!(!app.investigation.is_replaying());
        assert_eq!(app.status(), Some("Replay complete"));
    }

    #[test]
    fn test_arrivals_during_replay_are_held() {
        let mut app = app(1);
        app.handle_action(Action::StartReplay);
        app.on_arrivals(vec![make_event(2, "JUDGE", "THINKING", json!({}))]);
        assert_eq!(app.investigation.store().len(), 2);
        assert_eq!(app.status(), Some("1 new step(s) held until replay ends"));
    }

    #[test]
    fn test_quit_and_help() {
        let mut app = app(0);
        assert!(app.handle_action(Action::Quit));
        assert!(!app.handle_action(Action::ToggleHelp));
        assert!(app.show_help);
    }
}
