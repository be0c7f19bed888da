//! Graph layout: (root, visible prefix) → positioned nodes and edges
//!
//! The layout is a deterministic grid. Each role maps to a column, and each
//! column hands out rows in order of first appearance. Edges always link an
//! event to the one that arrived immediately before it, so the graph is one
//! chain zig-zagging across columns. Recomputed from scratch on every change.

use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;

use super::role::{AgentRole, TraceStatus, COLUMN_COUNT};
use super::store::{RootEvent, TraceEvent};

/// Content shown when no presentation rule matches and there is no `msg`
pub const PLACEHOLDER: &str = "Processing...";

/// Title of the root node
pub const ROOT_TITLE: &str = "INCOMING SIGNAL";

// =============================================================================
// Output Types
// =============================================================================

/// Node identity: the root sentinel or a stored trace id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeId {
    Root,
    Trace(i64),
}

impl NodeId {
    /// Parse the display form (`input` or `trace-<id>`)
    pub fn parse(raw: &str) -> Option<Self> {
        if raw == "input" {
            return Some(NodeId::Root);
        }
        raw.strip_prefix("trace-")
            .and_then(|id| id.parse().ok())
            .map(NodeId::Trace)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeId::Root => f.write_str("input"),
            NodeId::Trace(id) => write!(f, "trace-{}", id),
        }
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// How a badge should be coloured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BadgeTone {
    /// Verdict BLOCK
    Block,
    /// Any other verdict
    Allow,
    /// Enforcer terminated the session
    Killed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Badge {
    pub text: String,
    pub tone: BadgeTone,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphNode {
    pub id: NodeId,
    pub column: usize,
    pub row: usize,
    pub position: Position,
    pub role: AgentRole,
    pub status: TraceStatus,
    pub title: String,
    pub content: String,
    pub badge: Option<Badge>,
    /// Full payload for the inspector
    pub output: Value,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphEdge {
    pub id: String,
    pub source: NodeId,
    pub target: NodeId,
    /// Target is still thinking
    pub animated: bool,
    /// Target failed
    pub failed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GraphLayout {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl GraphLayout {
    /// No root and nothing visible
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.node(id).is_some()
    }
}

/// Pixel pitch of the grid
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grid {
    pub column_width: f64,
    pub row_height: f64,
}

impl Grid {
    pub fn position(&self, column: usize, row: usize) -> Position {
        Position {
            x: column as f64 * self.column_width,
            y: row as f64 * self.row_height,
        }
    }
}

impl Default for Grid {
    fn default() -> Self {
        Self {
            column_width: 350.0,
            row_height: 180.0,
        }
    }
}

// =============================================================================
// Layout
// =============================================================================

/// Lay out the root and the visible prefix of the trace sequence
pub fn layout(root: Option<&RootEvent>, visible: &[TraceEvent], grid: &Grid) -> GraphLayout {
    let mut nodes = Vec::with_capacity(visible.len() + 1);
    let mut edges = Vec::with_capacity(visible.len());
    let mut depths = [0usize; COLUMN_COUNT];

    if let Some(root) = root {
        nodes.push(root_node(root, grid));
        depths[AgentRole::Trigger.column()] += 1;
    }

    let mut previous = NodeId::Root;
    for event in visible {
        let id = NodeId::Trace(event.id);
        let column = event.agent_role.column();
        let row = depths[column];
        depths[column] += 1;

        let (content, badge) = describe(&event.agent_role, &event.status, &event.output);

        nodes.push(GraphNode {
            id,
            column,
            row,
            position: grid.position(column, row),
            role: event.agent_role.clone(),
            status: event.status.clone(),
            title: event.agent_role.as_str().to_string(),
            content,
            badge,
            output: event.output.clone(),
            timestamp: event.created_at.clone(),
        });

        edges.push(GraphEdge {
            id: format!("e-{}-{}", previous, id),
            source: previous,
            target: id,
            animated: event.status == TraceStatus::Thinking,
            failed: event.status == TraceStatus::Failed,
        });

        previous = id;
    }

    GraphLayout { nodes, edges }
}

fn root_node(root: &RootEvent, grid: &Grid) -> GraphNode {
    let content = format!(
        "{} via {}",
        root.action_type().unwrap_or("Event"),
        root.ip_address().unwrap_or("unknown")
    );
    GraphNode {
        id: NodeId::Root,
        column: AgentRole::Trigger.column(),
        row: 0,
        position: grid.position(AgentRole::Trigger.column(), 0),
        role: AgentRole::Trigger,
        // The trigger is observed, never evaluated
        status: TraceStatus::Success,
        title: ROOT_TITLE.to_string(),
        content,
        badge: None,
        output: root.payload.clone(),
        timestamp: root.created_at.clone(),
    }
}

/// Derive display content and badge from a step's role, status and output
pub fn describe(role: &AgentRole, status: &TraceStatus, output: &Value) -> (String, Option<Badge>) {
    let mut content = non_empty_str(output, "msg")
        .unwrap_or(PLACEHOLDER)
        .to_string();
    let mut badge = None;

    match role {
        AgentRole::Triage if *status == TraceStatus::Completed => {
            content = if non_empty_str(output, "risk") == Some("HIGH") {
                "Risk HIGH. Vectors detected.".to_string()
            } else {
                "Risk LOW.".to_string()
            };
        }
        AgentRole::Judge | AgentRole::Ciso => {
            if let Some(verdict) = non_empty_str(output, "verdict") {
                let tone = if verdict == "BLOCK" {
                    BadgeTone::Block
                } else {
                    BadgeTone::Allow
                };
                badge = Some(Badge {
                    text: verdict.to_string(),
                    tone,
                });
            }
        }
        AgentRole::Enforcer => {
            if non_empty_str(output, "action") == Some("SESSION_TERMINATED") {
                badge = Some(Badge {
                    text: "KILLED".to_string(),
                    tone: BadgeTone::Killed,
                });
            }
        }
        _ => {}
    }

    (content, badge)
}

fn non_empty_str<'a>(output: &'a Value, key: &str) -> Option<&'a str> {
    output
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::store::tests::{make_event, make_root};
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_scenario_full_chain() {
        let root = make_root("evt-1");
        let events = vec![
            make_event(1, "TRIAGE", "COMPLETED", json!({"risk": "HIGH"})),
            make_event(2, "JUDGE", "COMPLETED", json!({"verdict": "BLOCK"})),
            make_event(3, "ENFORCER", "COMPLETED", json!({"action": "SESSION_TERMINATED"})),
        ];
        let graph = layout(Some(&root), &events, &Grid::default());

        assert_eq!(graph.nodes.len(), 4);
        assert_eq!(graph.edges.len(), 3);
        let columns: Vec<usize> = graph.nodes.iter().map(|n| n.column).collect();
        assert_eq!(columns, vec![0, 1, 3, 4]);

        let triage = graph.node(NodeId::Trace(1)).unwrap();
        assert_eq!(triage.content, "Risk HIGH. Vectors detected.");

        let judge = graph.node(NodeId::Trace(2)).unwrap();
        let badge = judge.badge.as_ref().unwrap();
        assert_eq!(badge.text, "BLOCK");
        assert_eq!(badge.tone, BadgeTone::Block);

        let enforcer = graph.node(NodeId::Trace(3)).unwrap();
        assert_eq!(enforcer.badge.as_ref().unwrap().text, "KILLED");

        // One chain: input → 1 → 2 → 3
        let links: Vec<(NodeId, NodeId)> =
            graph.edges.iter().map(|e| (e.source, e.target)).collect();
        assert_eq!(
            links,
            vec![
                (NodeId::Root, NodeId::Trace(1)),
                (NodeId::Trace(1), NodeId::Trace(2)),
                (NodeId::Trace(2), NodeId::Trace(3)),
            ]
        );
    }

    #[test]
    fn test_judge_and_ciso_stack_in_one_column() {
        let root = make_root("evt-1");
        let events = vec![
            make_event(1, "JUDGE", "COMPLETED", json!({"verdict": "BLOCK"})),
            make_event(2, "CISO", "COMPLETED", json!({"verdict": "ALLOW"})),
        ];
        let graph = layout(Some(&root), &events, &Grid::default());

        let judge = graph.node(NodeId::Trace(1)).unwrap();
        let ciso = graph.node(NodeId::Trace(2)).unwrap();
        assert_eq!((judge.column, judge.row), (3, 0));
        assert_eq!((ciso.column, ciso.row), (3, 1));
        assert_eq!(ciso.badge.as_ref().unwrap().tone, BadgeTone::Allow);
        assert_eq!(ciso.position, Position { x: 1050.0, y: 180.0 });
    }

    #[test]
    fn test_unknown_role_degrades() {
        let root = make_root("evt-1");
        let events = vec![make_event(1, "UNKNOWN_ROLE", "COMPLETED", json!({}))];
        let graph = layout(Some(&root), &events, &Grid::default());

        let node = graph.node(NodeId::Trace(1)).unwrap();
        assert_eq!(node.column, 1);
        assert_eq!(node.content, PLACEHOLDER);
        assert!(node.badge.is_none());
        assert_eq!(node.title, "UNKNOWN_ROLE");
    }

    #[test]
    fn test_root_is_always_success() {
        let root = make_root("evt-1");
        let graph = layout(Some(&root), &[], &Grid::default());
        assert_eq!(graph.nodes.len(), 1);
        assert!(graph.edges.is_empty());

        let node = &graph.nodes[0];
        assert_eq!(node.id, NodeId::Root);
        assert_eq!(node.status, TraceStatus::Success);
        assert_eq!(node.title, ROOT_TITLE);
        assert_eq!(node.content, "BULK_EXPORT via 10.0.0.7");
    }

    #[test]
    fn test_root_content_fallbacks() {
        let root = RootEvent {
            event_id: "evt-1".to_string(),
            created_at: "2025-01-10T12:00:00Z".to_string(),
            payload: json!({}),
        };
        let graph = layout(Some(&root), &[], &Grid::default());
        assert_eq!(graph.nodes[0].content, "Event via unknown");
    }

    #[test]
    fn test_trigger_events_stack_below_root() {
        let root = make_root("evt-1");
        let events = vec![make_event(1, "TRIGGER", "SUCCESS", json!({}))];
        let graph = layout(Some(&root), &events, &Grid::default());
        let node = graph.node(NodeId::Trace(1)).unwrap();
        assert_eq!((node.column, node.row), (0, 1));
    }

    #[test]
    fn test_no_root_no_events_is_empty() {
        let graph = layout(None, &[], &Grid::default());
        assert!(graph.is_empty());
    }

    #[test]
    fn test_no_root_first_edge_uses_sentinel() {
        let events = vec![make_event(7, "TRIAGE", "THINKING", json!({"msg": "Analyzing intent..."}))];
        let graph = layout(None, &events, &Grid::default());
        assert_eq!(graph.nodes.len(), 1);
        assert_eq!(graph.nodes[0].row, 0);
        assert_eq!(graph.edges[0].source, NodeId::Root);
        assert_eq!(graph.edges[0].id, "e-input-trace-7");
    }

    #[test]
    fn test_edge_flags() {
        let root = make_root("evt-1");
        let events = vec![
            make_event(1, "TRIAGE", "THINKING", json!({"msg": "Analyzing intent..."})),
            make_event(2, "TRIAGE", "FAILED", json!({"error": "boom"})),
        ];
        let graph = layout(Some(&root), &events, &Grid::default());
        assert!(graph.edges[0].animated);
        assert!(!graph.edges[0].failed);
        assert!(!graph.edges[1].animated);
        assert!(graph.edges[1].failed);
    }

    #[test]
    fn test_describe_rules() {
        let (content, badge) = describe(
            &AgentRole::Triage,
            &TraceStatus::Completed,
            &json!({"risk": "LOW"}),
        );
        assert_eq!(content, "Risk LOW.");
        assert!(badge.is_none());

        // Triage still thinking falls back to msg
        let (content, _) = describe(
            &AgentRole::Triage,
            &TraceStatus::Thinking,
            &json!({"msg": "Analyzing intent..."}),
        );
        assert_eq!(content, "Analyzing intent...");

        // Judge without verdict has no badge
        let (_, badge) = describe(&AgentRole::Judge, &TraceStatus::Thinking, &json!({}));
        assert!(badge.is_none());

        // Enforcer doing anything else has no badge
        let (content, badge) = describe(
            &AgentRole::Enforcer,
            &TraceStatus::Other("IDLE".to_string()),
            &json!({"msg": "User Allowed. No Action Taken."}),
        );
        assert_eq!(content, "User Allowed. No Action Taken.");
        assert!(badge.is_none());

        // Non-object output degrades to placeholder
        let (content, _) = describe(&AgentRole::Intel, &TraceStatus::Completed, &Value::Null);
        assert_eq!(content, PLACEHOLDER);
    }

    #[test]
    fn test_node_id_display_round_trip() {
        assert_eq!(NodeId::Root.to_string(), "input");
        assert_eq!(NodeId::Trace(12).to_string(), "trace-12");
        assert_eq!(NodeId::parse("trace-12"), Some(NodeId::Trace(12)));
        assert_eq!(NodeId::parse("input"), Some(NodeId::Root));
        assert_eq!(NodeId::parse("trace-x"), None);
    }

    #[test]
    fn test_serializes_for_render() {
        let root = make_root("evt-1");
        let events = vec![make_event(1, "JUDGE", "COMPLETED", json!({"verdict": "BLOCK"}))];
        let graph = layout(Some(&root), &events, &Grid::default());
        let json = serde_json::to_value(&graph).unwrap();
        assert_eq!(json["nodes"][1]["id"], "trace-1");
        assert_eq!(json["nodes"][1]["badge"]["tone"], "block");
        assert_eq!(json["edges"][0]["source"], "input");
    }

    fn arb_role() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("TRIGGER".to_string()),
            Just("TRIAGE".to_string()),
            Just("INTEL".to_string()),
            Just("JUDGE".to_string()),
            Just("CISO".to_string()),
            Just("ENFORCER".to_string()),
            "[A-Z_]{3,12}",
        ]
    }

    proptest! {
        #[test]
        fn prop_counts_and_rows(roles in proptest::collection::vec(arb_role(), 0..40)) {
            let root = make_root("evt-1");
            let events: Vec<TraceEvent> = roles
                .iter()
                .enumerate()
                .map(|(i, r)| make_event(i as i64 + 1, r, "COMPLETED", json!({})))
                .collect();
            let graph = layout(Some(&root), &events, &Grid::default());

            prop_assert_eq!(graph.nodes.len(), events.len() + 1);
            prop_assert_eq!(graph.edges.len(), events.len());

            // Rows within each column are 0, 1, 2, ... in arrival order
            for column in 0..COLUMN_COUNT {
                let rows: Vec<usize> = graph
                    .nodes
                    .iter()
                    .filter(|n| n.column == column)
                    .map(|n| n.row)
                    .collect();
                let expected: Vec<usize> = (0..rows.len()).collect();
                prop_assert_eq!(rows, expected);
            }

            // Single chain: each edge's source is the previous edge's target
            let mut previous = NodeId::Root;
            for edge in &graph.edges {
                prop_assert_eq!(edge.source, previous);
                previous = edge.target;
            }
        }
    }
}
