//! Trace store: one investigation's root event and ordered trace sequence
//!
//! The sequence is append-only and strictly ascending by id. Arrival order,
//! id order and causal order are the same thing here, so an event that would
//! break the ordering is dropped rather than queued.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::role::{AgentRole, TraceStatus};
use super::{TraceError, TraceSource};

/// The originating signal of an investigation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootEvent {
    pub event_id: String,
    pub created_at: String,
    /// Opaque audit payload (actor, network_context, action_context, ...)
    pub payload: Value,
}

impl RootEvent {
    /// `action_context.action_type`, if present
    pub fn action_type(&self) -> Option<&str> {
        self.payload
            .get("action_context")
            .and_then(|c| c.get("action_type"))
            .and_then(Value::as_str)
    }

    /// `network_context.ip_address`, if present
    pub fn ip_address(&self) -> Option<&str> {
        self.payload
            .get("network_context")
            .and_then(|c| c.get("ip_address"))
            .and_then(Value::as_str)
    }

    /// `actor.user_id`, if present
    pub fn user_id(&self) -> Option<&str> {
        self.payload
            .get("actor")
            .and_then(|a| a.get("user_id"))
            .and_then(Value::as_str)
    }
}

/// One agent step recorded by the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    /// Store-assigned, strictly increasing
    pub id: i64,
    /// Investigation this step belongs to
    pub event_id: String,
    pub agent_role: AgentRole,
    pub status: TraceStatus,
    #[serde(default)]
    pub output: Value,
    pub created_at: String,
}

/// Result of offering an event to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Append {
    Accepted,
    Rejected(RejectReason),
}

/// Why an arrival was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// An event with this id is already stored
    Duplicate,
    /// The id is below the current maximum
    OutOfOrder { last_id: i64 },
    /// The event belongs to a different investigation
    ForeignInvestigation,
}

impl Append {
    pub fn is_accepted(self) -> bool {
        matches!(self, Append::Accepted)
    }
}

/// Root event plus the ordered trace sequence for one investigation
#[derive(Debug, Clone)]
pub struct TraceStore {
    root: RootEvent,
    events: Vec<TraceEvent>,
}

impl TraceStore {
    pub fn new(root: RootEvent) -> Self {
        Self {
            root,
            events: Vec::new(),
        }
    }

    /// Build a store from a fetched history. Events violating the ordering
    /// are dropped exactly as live arrivals would be.
    pub fn from_history(root: RootEvent, history: Vec<TraceEvent>) -> Self {
        let mut store = Self::new(root);
        for event in history {
            store.append(event);
        }
        store
    }

    /// Load an investigation from a source
    pub fn load<S: TraceSource>(source: &S, investigation_id: &str) -> Result<Self, TraceError> {
        let root = source.fetch_root(investigation_id)?;
        let history = source.fetch_trace_history(investigation_id)?;
        debug!(investigation_id, events = history.len(), "loaded investigation");
        Ok(Self::from_history(root, history))
    }

    /// Append an arrival. Duplicates and out-of-order ids are rejected.
    pub fn append(&mut self, event: TraceEvent) -> Append {
        if event.event_id != self.root.event_id {
            warn!(
                id = event.id,
                expected = %self.root.event_id,
                got = %event.event_id,
                "dropping trace event for another investigation"
            );
            return Append::Rejected(RejectReason::ForeignInvestigation);
        }

        if let Some(last_id) = self.last_id() {
            if event.id <= last_id {
                let reason = if self.contains(event.id) {
                    RejectReason::Duplicate
                } else {
                    RejectReason::OutOfOrder { last_id }
                };
                warn!(id = event.id, last_id, ?reason, "dropping trace event");
                return Append::Rejected(reason);
            }
        }

        self.events.push(event);
        Append::Accepted
    }

    pub fn root(&self) -> &RootEvent {
        &self.root
    }

    pub fn investigation_id(&self) -> &str {
        &self.root.event_id
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    /// The first `count` events (clamped to the stored length)
    pub fn prefix(&self, count: usize) -> &[TraceEvent] {
        &self.events[..count.min(self.events.len())]
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn last_id(&self) -> Option<i64> {
        self.events.last().map(|e| e.id)
    }

    fn contains(&self, id: i64) -> bool {
        self.events.binary_search_by_key(&id, |e| e.id).is_ok()
    }
}
