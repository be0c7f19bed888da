//! Trace ingestion, replay and layout
//!
//! The functional core of an investigation view:
//! - `role`: agent role taxonomy and status parsing
//! - `store`: the root event plus the append-only trace sequence
//! - `replay`: the two-state scheduler that reveals a growing prefix
//! - `layout`: pure (root, visible prefix) → positioned graph
//! - `investigation`: the single dispatcher that serialises live arrivals,
//!   replay time and selection
//!
//! Nothing in here does I/O except through the `TraceSource` seam.

pub mod investigation;
pub mod layout;
pub mod replay;
pub mod role;
pub mod store;

pub use investigation::{Inspector, Investigation, Msg};
pub use layout::{
    layout, Badge, BadgeTone, GraphEdge, GraphLayout, GraphNode, Grid, NodeId, Position,
};
pub use replay::{ReplayScheduler, ReplayState, DEFAULT_INTERVAL};
pub use role::{AgentRole, TraceStatus, COLUMN_COUNT, DEFAULT_COLUMN};
pub use store::{Append, RejectReason, RootEvent, TraceEvent, TraceStore};

use crate::db::DbError;

/// Errors surfaced by trace loading
#[derive(Debug, thiserror::Error)]
pub enum TraceError {
    /// No root event exists for the investigation (yet)
    #[error("investigation {investigation_id} not found (awaiting data)")]
    NotFound { investigation_id: String },

    #[error(transparent)]
    Source(#[from] DbError),
}

impl TraceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, TraceError::NotFound { .. })
    }
}

/// Where investigations come from.
///
/// `Database` is the production implementation; tests use in-memory fakes.
pub trait TraceSource {
    type Feed: TraceFeed;

    /// The root event, or `NotFound`
    fn fetch_root(&self, investigation_id: &str) -> Result<RootEvent, TraceError>;

    /// All trace events for the investigation, ascending by id
    fn fetch_trace_history(&self, investigation_id: &str) -> Result<Vec<TraceEvent>, TraceError>;

    /// Acquire a feed of events inserted after `after_id`.
    /// Dropping the feed releases it.
    fn subscribe(
        &self,
        investigation_id: &str,
        after_id: Option<i64>,
    ) -> Result<Self::Feed, TraceError>;
}

/// A live subscription to new trace events
pub trait TraceFeed {
    /// Non-blocking: everything that arrived since the last drain, in id order
    fn drain(&mut self) -> Result<Vec<TraceEvent>, TraceError>;
}
