//! Sentinel - live agent trace viewer for security investigations
//!
//! Follow a multi-agent review pipeline as it investigates an audit event.
//!
//! # Overview
//!
//! Every investigation starts from one root audit event. Agents (triage,
//! intel, judge, CISO, enforcer) append trace steps as they work; Sentinel
//! stores them in order, lays them out as a zig-zag chain across role
//! columns, and can replay the recorded sequence one step per interval.
//!
//! # Agent Roles
//!
//! | Role | Column | Label |
//! |------|--------|-------|
//! | `TRIGGER` | 0 | INPUT TRIGGER |
//! | `TRIAGE` | 1 | TRIAGE ARCHITECT |
//! | `INTEL` | 2 | INTEL LIBRARIAN |
//! | `JUDGE` | 3 | JUNIOR JUDGE |
//! | `CISO` | 3 | CISO OVERSIGHT |
//! | `ENFORCER` | 4 | ENFORCER |
//!
//! # Quick Start
//!
//! ```no_run
//! use sentinel::trace::{AgentRole, Investigation, Msg, TraceStatus};
//! use sentinel::{Config, Database};
//! use serde_json::json;
//!
//! let db = Database::open_at("sentinel.db").unwrap();
//! db.record_audit_log("evt-1", &json!({"event_id": "evt-1"})).unwrap();
//! db.log_trace("evt-1", &AgentRole::Triage, &TraceStatus::Thinking, &json!({"msg": "Analyzing intent..."}))
//!     .unwrap();
//!
//! let mut inv = Investigation::open(&db, "evt-1", &Config::default()).unwrap();
//! inv.update(Msg::StartReplay);
//! let graph = inv.graph();
//! println!("Nodes: {}, Edges: {}", graph.nodes.len(), graph.edges.len());
//! ```

pub mod config;
pub mod db;
pub mod init;
pub mod schema;
pub mod serve;
pub mod trace;
pub mod tui;

pub use config::Config;
pub use db::{Database, DbError, InvestigationSummary, Subscription};
pub use trace::{
    GraphLayout, Investigation, RootEvent, TraceError, TraceEvent, TraceFeed, TraceSource,
    TraceStore,
};
