//! Investigation: the single dispatcher for one investigation view
//!
//! Every mutation goes through `update(Msg)`: live arrivals, replay time,
//! replay start and node selection. Callers own the clocks and the
//! subscription; this type only sequences their effects, so an arrival and
//! a tick can never interleave halfway through each other.

use std::time::Duration;

use chrono::{DateTime, Local};
use tracing::debug;

use super::layout::{layout, GraphLayout, GraphNode, Grid, NodeId};
use super::replay::{ReplayScheduler, ReplayState};
use super::store::{Append, TraceEvent, TraceStore};
use super::{TraceError, TraceSource};
use crate::config::Config;

/// Everything that can happen to an investigation view
#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// A trace event arrived on the subscription
    Arrived(TraceEvent),
    /// User asked for a replay
    StartReplay,
    /// One replay interval elapsed
    Tick,
    /// Wall time passed (the dispatcher converts it into ticks)
    Elapsed(Duration),
    /// User picked a node
    Select(NodeId),
    /// Inspector closed
    ClearSelection,
}

pub struct Investigation {
    store: TraceStore,
    replay: ReplayScheduler,
    selected: Option<NodeId>,
    grid: Grid,
}

impl Investigation {
    /// A live view showing everything already stored
    pub fn new(store: TraceStore, interval: Duration, grid: Grid) -> Self {
        let visible = store.len();
        Self {
            store,
            replay: ReplayScheduler::new(interval, visible),
            selected: None,
            grid,
        }
    }

    pub fn with_config(store: TraceStore, config: &Config) -> Self {
        Self::new(store, config.replay_interval(), config.grid())
    }

    /// Load an investigation from a source
    pub fn open<S: TraceSource>(
        source: &S,
        investigation_id: &str,
        config: &Config,
    ) -> Result<Self, TraceError> {
        let store = TraceStore::load(source, investigation_id)?;
        Ok(Self::with_config(store, config))
    }

    /// Apply a message. Returns true if the rendered output may have changed.
    pub fn update(&mut self, msg: Msg) -> bool {
        match msg {
            Msg::Arrived(event) => match self.store.append(event) {
                Append::Accepted => {
                    // Stored either way; only shown immediately when idle
                    self.replay.on_arrival(self.store.len());
                    true
                }
                Append::Rejected(_) => false,
            },

            Msg::StartReplay => {
                if !self.replay.start(self.store.len()) {
                    debug!("replay already running, ignoring start");
                    return false;
                }
                self.selected = None;
                true
            }

            Msg::Tick => self.replay.tick(),

            Msg::Elapsed(elapsed) => self.replay.advance(elapsed) > 0,

            Msg::Select(id) => {
                if !self.graph().contains(id) || self.selected == Some(id) {
                    return false;
                }
                self.selected = Some(id);
                true
            }

            Msg::ClearSelection => self.selected.take().is_some(),
        }
    }

    /// Recompute the layout for the current cursor
    pub fn graph(&self) -> GraphLayout {
        layout(
            Some(self.store.root()),
            self.store.prefix(self.replay.cursor()),
            &self.grid,
        )
    }

    pub fn selected(&self) -> Option<NodeId> {
        self.selected
    }

    /// The selected node as currently laid out
    pub fn selected_node(&self) -> Option<GraphNode> {
        let id = self.selected?;
        self.graph().nodes.into_iter().find(|n| n.id == id)
    }

    pub fn inspector(&self) -> Option<Inspector> {
        self.selected_node().map(|node| Inspector::from_node(&node))
    }

    pub fn grid(&self) -> Grid {
        self.grid
    }

    pub fn store(&self) -> &TraceStore {
        &self.store
    }

    pub fn replay(&self) -> &ReplayScheduler {
        &self.replay
    }

    pub fn replay_state(&self) -> ReplayState {
        self.replay.state()
    }

    pub fn is_replaying(&self) -> bool {
        self.replay.is_running()
    }

    /// Number of stored events eligible for layout
    pub fn visible_count(&self) -> usize {
        self.replay.cursor().min(self.store.len())
    }

    /// Root shown, no agent has reported yet, nothing replaying
    pub fn is_waiting(&self) -> bool {
        self.visible_count() == 0 && !self.is_replaying()
    }
}

/// What the inspector panel shows for a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Inspector {
    pub role: String,
    pub status: String,
    /// Output payload, two-space pretty JSON
    pub output: String,
    /// Local time of day, or `-`
    pub timestamp: String,
}

impl Inspector {
    pub fn from_node(node: &GraphNode) -> Self {
        Self {
            role: node.role.as_str().to_uppercase(),
            status: node.status.to_string(),
            output: serde_json::to_string_pretty(&node.output)
                .unwrap_or_else(|_| node.output.to_string()),
            timestamp: format_timestamp(&node.timestamp),
        }
    }
}

/// Render an RFC 3339 timestamp as local time of day
pub fn format_timestamp(raw: &str) -> String {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|_| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::replay::DEFAULT_INTERVAL;
    use crate::trace::store::tests::{make_event, make_root};
    use crate::trace::TraceStatus;
    use serde_json::json;

    fn live(events: Vec<TraceEvent>) -> Investigation {
        let store = TraceStore::from_history(make_root("evt-1"), events);
        Investigation::new(store, DEFAULT_INTERVAL, Grid::default())
    }

    fn triage(id: i64) -> TraceEvent {
        make_event(id, "TRIAGE", "THINKING", json!({"msg": "Analyzing intent..."}))
    }

    #[test]
    fn test_live_arrivals_extend_graph() {
        let mut inv = live(vec![]);
        assert!(inv.is_waiting());
        assert_eq!(inv.graph().nodes.len(), 1);

        assert!(inv.update(Msg::Arrived(triage(1))));
        assert!(inv.update(Msg::Arrived(make_event(
            2,
            "TRIAGE",
            "COMPLETED",
            json!({"risk": "HIGH"})
        ))));
        let graph = inv.graph();
        assert_eq!(graph.nodes.len(), 3);
        assert_eq!(graph.edges.len(), 2);
        assert!(!inv.is_waiting());
    }

    #[test]
    fn test_rejected_arrival_changes_nothing() {
        let mut inv = live(vec![triage(1)]);
        assert!(!inv.update(Msg::Arrived(triage(1))));
        assert_eq!(inv.store().len(), 1);
        assert_eq!(inv.visible_count(), 1);
    }

    #[test]
    fn test_replay_reveals_one_per_interval() {
        let mut inv = live(vec![triage(1), triage(2), triage(3)]);
        assert!(inv.update(Msg::StartReplay));
        assert_eq!(inv.graph().nodes.len(), 1);

        inv.update(Msg::Elapsed(DEFAULT_INTERVAL));
        assert_eq!(inv.visible_count(), 1);
        inv.update(Msg::Tick);
        assert_eq!(inv.visible_count(), 2);
        inv.update(Msg::Elapsed(DEFAULT_INTERVAL * 5));
        assert_eq!(inv.visible_count(), 3);
        assert_eq!(inv.replay_state(), ReplayState::Idle);
    }

    #[test]
    fn test_start_replay_clears_selection() {
        let mut inv = live(vec![triage(1)]);
        assert!(inv.update(Msg::Select(NodeId::Trace(1))));
        assert_eq!(inv.selected(), Some(NodeId::Trace(1)));

        inv.update(Msg::StartReplay);
        assert_eq!(inv.selected(), None);
    }

    #[test]
    fn test_start_replay_while_running_is_noop() {
        let mut inv = live(vec![triage(1), triage(2)]);
        inv.update(Msg::StartReplay);
        inv.update(Msg::Tick);
        inv.update(Msg::Select(NodeId::Root));

        let cursor = inv.visible_count();
        let state = inv.replay_state();
        assert!(!inv.update(Msg::StartReplay));
        assert_eq!(inv.visible_count(), cursor);
        assert_eq!(inv.replay_state(), state);
        assert_eq!(inv.selected(), Some(NodeId::Root));
    }

    #[test]
    fn test_select_requires_visible_node() {
        let mut inv = live(vec![triage(1)]);
        inv.update(Msg::StartReplay);
        // Node 1 is stored but not yet revealed
        assert!(!inv.update(Msg::Select(NodeId::Trace(1))));
        assert!(!inv.update(Msg::Select(NodeId::Trace(99))));
        assert_eq!(inv.selected(), None);
    }

    #[test]
    fn test_clear_selection() {
        let mut inv = live(vec![]);
        assert!(!inv.update(Msg::ClearSelection));
        inv.update(Msg::Select(NodeId::Root));
        assert!(inv.update(Msg::ClearSelection));
        assert_eq!(inv.selected(), None);
    }

    /// Arrivals that land after a replay's snapshot stay hidden once the
    /// replay completes, until the next idle arrival recomputes visibility.
    #[test]
    fn test_arrivals_during_replay_stay_masked_until_next_idle_arrival() {
        let mut inv = live(vec![triage(1), triage(2)]);
        inv.update(Msg::StartReplay);

        // Arrives mid-replay: stored, not shown
        assert!(inv.update(Msg::Arrived(triage(3))));
        assert_eq!(inv.store().len(), 3);

        inv.update(Msg::Elapsed(DEFAULT_INTERVAL * 10));
        assert_eq!(inv.replay_state(), ReplayState::Idle);
        assert_eq!(inv.visible_count(), 2);
        assert_eq!(inv.graph().nodes.len(), 3);

        // Idle time alone does not unmask it
        inv.update(Msg::Elapsed(DEFAULT_INTERVAL * 10));
        assert_eq!(inv.visible_count(), 2);

        // The next live arrival recomputes from the stored length
        inv.update(Msg::Arrived(triage(4)));
        assert_eq!(inv.visible_count(), 4);
        assert_eq!(inv.graph().nodes.len(), 5);
    }

    #[test]
    fn test_inspector_for_selected_node() {
        let mut inv = live(vec![make_event(
            1,
            "JUDGE",
            "COMPLETED",
            json!({"verdict": "BLOCK", "confidence": 92}),
        )]);
        assert!(inv.inspector().is_none());

        inv.update(Msg::Select(NodeId::Trace(1)));
        let inspector = inv.inspector().unwrap();
        assert_eq!(inspector.role, "JUDGE");
        assert_eq!(inspector.status, TraceStatus::Completed.to_string());
        assert!(inspector.output.contains("\n  \"verdict\": \"BLOCK\""));
        assert_ne!(inspector.timestamp, "-");
    }

    #[test]
    fn test_format_timestamp_fallback() {
        assert_eq!(format_timestamp("not a time"), "-");
        assert_eq!(format_timestamp(""), "-");
    }
}
