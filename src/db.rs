//! SQLite database with Diesel ORM
//!
//! Stores audit logs (investigation roots) and the agent traces the review
//! pipeline writes for them. Also provides the live subscription used by
//! investigation views: a file watcher on the database plus an id cursor.

use crate::schema::*;
use crate::trace::{AgentRole, RootEvent, TraceError, TraceEvent, TraceFeed, TraceSource, TraceStatus};
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool, PooledConnection};
use diesel::sqlite::SqliteConnection;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;
use tracing::{debug, warn};

/// Walk up directory tree to find .sentinel folder (like git finds .git)
/// Can be overridden with SENTINEL_DB_PATH env var
fn get_db_path() -> PathBuf {
    // Check env var first - always takes priority
    if let Ok(path) = std::env::var("SENTINEL_DB_PATH") {
        return PathBuf::from(path);
    }

    if let Ok(current_dir) = std::env::current_dir() {
        let mut dir = current_dir.as_path();
        loop {
            let sentinel_dir = dir.join(".sentinel");
            if sentinel_dir.is_dir() {
                return sentinel_dir.join("sentinel.db");
            }
            match dir.parent() {
                Some(parent) => dir = parent,
                None => break,
            }
        }
    }

    // No .sentinel found - default to current directory
    PathBuf::from(".sentinel/sentinel.db")
}

// ============================================================================
// Diesel Models
// ============================================================================

/// Insertable audit log (investigation root)
#[derive(Insertable)]
#[diesel(table_name = audit_logs)]
pub struct NewAuditLog<'a> {
    pub event_id: &'a str,
    pub created_at: &'a str,
    pub payload_json: &'a str,
}

/// Queryable audit log
#[derive(Queryable, Selectable, Debug, Clone, serde::Serialize)]
#[diesel(table_name = audit_logs)]
pub struct AuditLogRow {
    pub event_id: String,
    pub created_at: String,
    pub payload_json: String,
}

/// Insertable agent trace
#[derive(Insertable)]
#[diesel(table_name = agent_traces)]
pub struct NewAgentTrace<'a> {
    pub event_id: &'a str,
    pub agent_role: &'a str,
    pub status: &'a str,
    pub output_json: &'a str,
    pub created_at: &'a str,
}

/// Queryable agent trace
#[derive(Queryable, Selectable, Debug, Clone, serde::Serialize)]
#[diesel(table_name = agent_traces)]
pub struct AgentTraceRow {
    pub id: i32,
    pub event_id: String,
    pub agent_role: String,
    pub status: String,
    pub output_json: String,
    pub created_at: String,
}

impl AuditLogRow {
    pub fn into_root(self) -> RootEvent {
        let payload = parse_json(&self.payload_json, &self.event_id);
        RootEvent {
            event_id: self.event_id,
            created_at: self.created_at,
            payload,
        }
    }
}

impl AgentTraceRow {
    pub fn into_event(self) -> TraceEvent {
        let output = parse_json(&self.output_json, &self.event_id);
        TraceEvent {
            id: i64::from(self.id),
            event_id: self.event_id,
            agent_role: AgentRole::parse(&self.agent_role),
            status: TraceStatus::parse(&self.status),
            output,
            created_at: self.created_at,
        }
    }
}

/// Stored JSON that fails to parse degrades to null
fn parse_json(raw: &str, event_id: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        warn!(event_id, "unparseable stored json: {}", e);
        Value::Null
    })
}

/// One row of `sentinel list`
#[derive(Debug, Clone, serde::Serialize)]
pub struct InvestigationSummary {
    pub event_id: String,
    pub created_at: String,
    pub trace_count: i64,
}

// ============================================================================
// Database Connection
// ============================================================================

type DbPool = Pool<ConnectionManager<SqliteConnection>>;
type DbConn = PooledConnection<ConnectionManager<SqliteConnection>>;

/// How long a connection waits on another process's write lock
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Applied to every pooled connection as it is opened
#[derive(Debug)]
struct BusyTimeout(Duration);

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for BusyTimeout {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> std::result::Result<(), diesel::r2d2::Error> {
        diesel::sql_query(format!("PRAGMA busy_timeout = {}", self.0.as_millis()))
            .execute(conn)
            .map(|_| ())
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

/// Database connection wrapper with connection pool
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    path: PathBuf,
}

/// Error type for database operations
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Query error: {0}")]
    Query(#[from] diesel::result::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),
    #[error("{0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

impl Database {
    /// Get the database path that will be used
    pub fn db_path() -> PathBuf {
        get_db_path()
    }

    /// Open database at default path (respects SENTINEL_DB_PATH env var)
    pub fn open() -> Result<Self> {
        let path = get_db_path();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| DbError::Connection(e.to_string()))?;
            }
        }
        Self::open_at(&path)
    }

    /// Open database at specified path
    pub fn open_at<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_busy_timeout(path, BUSY_TIMEOUT)
    }

    /// Open database at specified path, waiting at most `busy_timeout` on locks
    pub fn open_with_busy_timeout<P: AsRef<Path>>(path: P, busy_timeout: Duration) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let manager = ConnectionManager::<SqliteConnection>::new(path.to_string_lossy());
        let pool = Pool::builder()
            .max_size(5)
            .connection_customizer(Box::new(BusyTimeout(busy_timeout)))
            .build(manager)
            .map_err(|e| DbError::Connection(e.to_string()))?;

        let db = Self { pool, path };
        db.init_schema()?;
        Ok(db)
    }

    /// Path of the underlying SQLite file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn get_conn(&self) -> Result<DbConn> {
        self.pool.get().map_err(|e| DbError::Connection(e.to_string()))
    }

    fn init_schema(&self) -> Result<()> {
        let mut conn = self.get_conn()?;

        diesel::sql_query(r#"
            CREATE TABLE IF NOT EXISTS audit_logs (
                event_id TEXT PRIMARY KEY NOT NULL,
                created_at TEXT NOT NULL,
                payload_json TEXT NOT NULL
            )
        "#).execute(&mut conn)?;

        diesel::sql_query(r#"
            CREATE TABLE IF NOT EXISTS agent_traces (
                id INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL,
                event_id TEXT NOT NULL,
                agent_role TEXT NOT NULL,
                status TEXT NOT NULL,
                output_json TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL
            )
        "#).execute(&mut conn)?;

        diesel::sql_query("CREATE INDEX IF NOT EXISTS idx_traces_event ON agent_traces(event_id, id)").execute(&mut conn)?;
        diesel::sql_query("CREATE INDEX IF NOT EXISTS idx_logs_created_at ON audit_logs(created_at)").execute(&mut conn)?;

        Ok(())
    }

    // ========================================================================
    // Ingestion
    // ========================================================================

    /// Record the root event of a new investigation
    pub fn record_audit_log(&self, event_id: &str, payload: &Value) -> Result<()> {
        if event_id.trim().is_empty() {
            return Err(DbError::Validation("Audit log has no event_id".to_string()));
        }
        if self.get_audit_log(event_id)?.is_some() {
            return Err(DbError::Validation(format!(
                "Investigation {} already recorded",
                event_id
            )));
        }

        let mut conn = self.get_conn()?;
        let now = chrono::Local::now().to_rfc3339();
        let payload_json = serde_json::to_string(payload)?;

        let new_log = NewAuditLog {
            event_id,
            created_at: &now,
            payload_json: &payload_json,
        };

        diesel::insert_into(audit_logs::table)
            .values(&new_log)
            .execute(&mut conn)?;

        debug!(event_id, "recorded audit log");
        Ok(())
    }

    /// Append one agent step. Returns the store-assigned id.
    pub fn log_trace(
        &self,
        event_id: &str,
        role: &AgentRole,
        status: &TraceStatus,
        output: &Value,
    ) -> Result<i64> {
        let mut conn = self.get_conn()?;
        let now = chrono::Local::now().to_rfc3339();
        let output_json = serde_json::to_string(output)?;

        let new_trace = NewAgentTrace {
            event_id,
            agent_role: role.as_str(),
            status: status.as_str(),
            output_json: &output_json,
            created_at: &now,
        };

        diesel::insert_into(agent_traces::table)
            .values(&new_trace)
            .execute(&mut conn)?;

        let id: i32 = diesel::select(diesel::dsl::sql::<diesel::sql_types::Integer>("last_insert_rowid()"))
            .first(&mut conn)?;

        debug!(event_id, id, role = %role, status = %status, "logged trace");
        Ok(i64::from(id))
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Root event for an investigation, if recorded
    pub fn get_audit_log(&self, event_id: &str) -> Result<Option<RootEvent>> {
        let mut conn = self.get_conn()?;
        let row = audit_logs::table
            .filter(audit_logs::event_id.eq(event_id))
            .first::<AuditLogRow>(&mut conn)
            .optional()?;
        Ok(row.map(AuditLogRow::into_root))
    }

    /// Trace history for an investigation, ascending by id
    pub fn get_traces(&self, event_id: &str) -> Result<Vec<TraceEvent>> {
        self.get_traces_after(event_id, 0)
    }

    /// Traces with id strictly greater than `after_id`, ascending
    pub fn get_traces_after(&self, event_id: &str, after_id: i64) -> Result<Vec<TraceEvent>> {
        let mut conn = self.get_conn()?;
        let after = i32::try_from(after_id).unwrap_or(i32::MAX);
        let rows = agent_traces::table
            .filter(agent_traces::event_id.eq(event_id))
            .filter(agent_traces::id.gt(after))
            .order(agent_traces::id.asc())
            .load::<AgentTraceRow>(&mut conn)?;
        Ok(rows.into_iter().map(AgentTraceRow::into_event).collect())
    }

    /// All investigations, newest first
    pub fn list_investigations(&self) -> Result<Vec<InvestigationSummary>> {
        let mut conn = self.get_conn()?;
        let logs = audit_logs::table
            .order(audit_logs::created_at.desc())
            .load::<AuditLogRow>(&mut conn)?;

        let mut summaries = Vec::with_capacity(logs.len());
        for log in logs {
            let trace_count: i64 = agent_traces::table
                .filter(agent_traces::event_id.eq(&log.event_id))
                .count()
                .get_result(&mut conn)?;
            summaries.push(InvestigationSummary {
                event_id: log.event_id,
                created_at: log.created_at,
                trace_count,
            });
        }
        Ok(summaries)
    }

    // ========================================================================
    // Live Subscription
    // ========================================================================

    /// Subscribe to traces inserted for `event_id` after `after_id`.
    ///
    /// The returned handle owns a watcher on the database file; dropping it
    /// releases the watcher.
    pub fn subscribe_traces(&self, event_id: &str, after_id: Option<i64>) -> Result<Subscription> {
        let (tx, rx) = mpsc::channel();

        let mut watcher = RecommendedWatcher::new(
            move |res: std::result::Result<notify::Event, notify::Error>| {
                if let Ok(event) = res {
                    if event.kind.is_modify() || event.kind.is_create() {
                        let _ = tx.send(());
                    }
                }
            },
            notify::Config::default(),
        )?;
        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        debug!(event_id, path = %self.path.display(), "subscription acquired");
        Ok(Subscription {
            db: self.clone(),
            event_id: event_id.to_string(),
            last_id: after_id.unwrap_or(0),
            changes: rx,
            // Catch anything written between the history fetch and the watch
            pending: true,
            _watcher: watcher,
        })
    }
}

/// Scoped handle delivering new traces for one investigation
pub struct Subscription {
    db: Database,
    event_id: String,
    last_id: i64,
    changes: mpsc::Receiver<()>,
    pending: bool,
    _watcher: RecommendedWatcher,
}

impl Subscription {
    /// Non-blocking. Returns traces inserted since the last drain.
    ///
    /// A failed query leaves the change pending, so the next drain retries.
    pub fn drain(&mut self) -> Result<Vec<TraceEvent>> {
        while self.changes.try_recv().is_ok() {
            self.pending = true;
        }
        if !self.pending {
            return Ok(Vec::new());
        }

        let fresh = self.db.get_traces_after(&self.event_id, self.last_id)?;
        self.pending = false;
        if let Some(last) = fresh.last() {
            self.last_id = last.id;
        }
        Ok(fresh)
    }

    pub fn investigation_id(&self) -> &str {
        &self.event_id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        debug!(event_id = %self.event_id, "subscription released");
    }
}

// ============================================================================
// Trace Source
// ============================================================================

impl TraceSource for Database {
    type Feed = Subscription;

    fn fetch_root(&self, investigation_id: &str) -> std::result::Result<RootEvent, TraceError> {
        self.get_audit_log(investigation_id)?
            .ok_or_else(|| TraceError::NotFound {
                investigation_id: investigation_id.to_string(),
            })
    }

    fn fetch_trace_history(&self, investigation_id: &str) -> std::result::Result<Vec<TraceEvent>, TraceError> {
        Ok(self.get_traces(investigation_id)?)
    }

    fn subscribe(
        &self,
        investigation_id: &str,
        after_id: Option<i64>,
    ) -> std::result::Result<Subscription, TraceError> {
        Ok(self.subscribe_traces(investigation_id, after_id)?)
    }
}

impl TraceFeed for Subscription {
    fn drain(&mut self) -> std::result::Result<Vec<TraceEvent>, TraceError> {
        Ok(Subscription::drain(self)?)
    }
}
