//! Agent roles and trace statuses
//!
//! Roles and statuses arrive as free-form strings from the review pipeline.
//! Both parse into closed enums with an explicit `Other` arm so an
//! unrecognised value is a deliberate branch, never an error.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Column used for any role outside the known taxonomy
pub const DEFAULT_COLUMN: usize = 1;

/// Number of columns in the investigation grid
pub const COLUMN_COUNT: usize = 5;

// =============================================================================
// Agent Role
// =============================================================================

/// The pipeline stage that produced a trace event
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AgentRole {
    Trigger,
    Triage,
    Intel,
    Judge,
    Ciso,
    Enforcer,
    /// Anything the taxonomy doesn't know, kept verbatim
    Other(String),
}

impl AgentRole {
    /// Parse a role name (case-insensitive)
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "TRIGGER" => AgentRole::Trigger,
            "TRIAGE" => AgentRole::Triage,
            "INTEL" => AgentRole::Intel,
            "JUDGE" => AgentRole::Judge,
            "CISO" => AgentRole::Ciso,
            "ENFORCER" => AgentRole::Enforcer,
            _ => AgentRole::Other(raw.to_string()),
        }
    }

    /// Canonical wire name
    pub fn as_str(&self) -> &str {
        match self {
            AgentRole::Trigger => "TRIGGER",
            AgentRole::Triage => "TRIAGE",
            AgentRole::Intel => "INTEL",
            AgentRole::Judge => "JUDGE",
            AgentRole::Ciso => "CISO",
            AgentRole::Enforcer => "ENFORCER",
            AgentRole::Other(raw) => raw,
        }
    }

    /// Grid column for this role. JUDGE and CISO share a column.
    pub fn column(&self) -> usize {
        match self {
            AgentRole::Trigger => 0,
            AgentRole::Triage => 1,
            AgentRole::Intel => 2,
            AgentRole::Judge | AgentRole::Ciso => 3,
            AgentRole::Enforcer => 4,
            AgentRole::Other(_) => DEFAULT_COLUMN,
        }
    }

    /// Display label shown above a node's title
    pub fn label(&self) -> &'static str {
        match self {
            AgentRole::Trigger | AgentRole::Other(_) => "INPUT TRIGGER",
            AgentRole::Triage => "TRIAGE ARCHITECT",
            AgentRole::Intel => "INTEL LIBRARIAN",
            AgentRole::Judge => "JUNIOR JUDGE",
            AgentRole::Ciso => "CISO OVERSIGHT",
            AgentRole::Enforcer => "ENFORCER",
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, AgentRole::Other(_))
    }
}

impl From<String> for AgentRole {
    fn from(raw: String) -> Self {
        AgentRole::parse(&raw)
    }
}

impl From<AgentRole> for String {
    fn from(role: AgentRole) -> Self {
        role.as_str().to_string()
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Trace Status
// =============================================================================

/// Processing state reported by an agent step
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TraceStatus {
    Thinking,
    Success,
    Completed,
    Failed,
    /// Pipeline statuses outside the core four (BLOCKED, IDLE, ...)
    Other(String),
}

impl TraceStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "THINKING" => TraceStatus::Thinking,
            "SUCCESS" => TraceStatus::Success,
            "COMPLETED" => TraceStatus::Completed,
            "FAILED" => TraceStatus::Failed,
            _ => TraceStatus::Other(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TraceStatus::Thinking => "THINKING",
            TraceStatus::Success => "SUCCESS",
            TraceStatus::Completed => "COMPLETED",
            TraceStatus::Failed => "FAILED",
            TraceStatus::Other(raw) => raw,
        }
    }
}

impl From<String> for TraceStatus {
    fn from(raw: String) -> Self {
        TraceStatus::parse(&raw)
    }
}

impl From<TraceStatus> for String {
    fn from(status: TraceStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for TraceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
