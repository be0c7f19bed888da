//! HTTP API for investigations
//!
//! `sentinel serve` → JSON endpoints for ingestion and graph layout

use crate::db::{Database, DbError};
use crate::trace::{layout, AgentRole, GraphLayout, Grid, TraceError, TraceStatus, TraceStore};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tiny_http::{Header, Method, Request, Response, Server};
use tracing::{debug, error, info};

#[derive(Serialize)]
struct ApiResponse<T> {
    ok: bool,
    data: Option<T>,
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn success(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Status code plus serialized JSON body
#[derive(Debug)]
pub struct Reply {
    pub status: u16,
    pub body: String,
}

impl Reply {
    fn json<T: Serialize>(status: u16, value: &T) -> Self {
        let body = serde_json::to_string(value).unwrap_or_else(|e| {
            format!(r#"{{"ok":false,"data":null,"error":"serialize: {}"}}"#, e)
        });
        Self { status, body }
    }

    fn ok<T: Serialize>(data: T) -> Self {
        Self::json(200, &ApiResponse::success(data))
    }

    fn created<T: Serialize>(data: T) -> Self {
        Self::json(201, &ApiResponse::success(data))
    }

    fn error(status: u16, message: impl Into<String>) -> Self {
        Self::json(status, &ApiResponse::failure(message))
    }
}

/// Graph endpoint payload
#[derive(Serialize)]
struct GraphView {
    investigation_id: String,
    cursor: usize,
    total: usize,
    waiting: bool,
    graph: GraphLayout,
}

#[derive(Deserialize, Default)]
struct GraphQuery {
    cursor: Option<usize>,
}

#[derive(Deserialize)]
struct NewTrace {
    agent_role: String,
    status: String,
    #[serde(default)]
    output: Value,
}

/// Start the API server. Blocks until the process is stopped.
pub fn start_api_server(db: Database, grid: Grid, port: u16) -> std::io::Result<()> {
    let addr = format!("127.0.0.1:{}", port);
    let server = Server::http(&addr).map_err(|e| std::io::Error::other(e.to_string()))?;

    eprintln!("\n\x1b[1;32m🛡  Sentinel Auditor\x1b[0m");
    eprintln!("   API: http://localhost:{}", port);
    eprintln!("   Press Ctrl+C to stop\n");
    info!(%addr, db = %db.path().display(), "api server listening");

    for request in server.incoming_requests() {
        if let Err(e) = handle_request(&db, &grid, request) {
            error!("request failed: {}", e);
        }
    }

    Ok(())
}

fn handle_request(db: &Database, grid: &Grid, mut request: Request) -> std::io::Result<()> {
    let method = request.method().clone();
    let url = request.url().to_string();

    let mut body = String::new();
    if method == Method::Post {
        if let Err(e) = request.as_reader().read_to_string(&mut body) {
            return respond(request, Reply::error(400, format!("Failed to read body: {}", e)));
        }
    }

    let reply = route(db, grid, &method, &url, &body);
    debug!(%method, %url, status = reply.status, "request");
    respond(request, reply)
}

fn respond(request: Request, reply: Reply) -> std::io::Result<()> {
    let mut response = Response::from_string(reply.body).with_status_code(reply.status);
    if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
        response.add_header(header);
    }
    request.respond(response)
}

/// Dispatch one request. Pure apart from database access.
pub fn route(db: &Database, grid: &Grid, method: &Method, url: &str, body: &str) -> Reply {
    let (path, query) = match url.split_once('?') {
        Some((path, query)) => (path, query),
        None => (url, ""),
    };
    // Investigation ids may arrive percent-encoded
    let decoded: Vec<String> = match path
        .trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| urlencoding::decode(s).map(|d| d.into_owned()))
        .collect::<Result<_, _>>()
    {
        Ok(decoded) => decoded,
        Err(e) => return Reply::error(400, format!("Invalid path encoding: {}", e)),
    };
    let segments: Vec<&str> = decoded.iter().map(String::as_str).collect();

    match (method, segments.as_slice()) {
        // Health check
        (Method::Get, []) => Reply::json(
            200,
            &json!({"status": "active", "service": "Sentinel Auditor"}),
        ),

        (Method::Get, ["api", "investigations"]) => match db.list_investigations() {
            Ok(list) => Reply::ok(list),
            Err(e) => db_error(e),
        },

        (Method::Get, ["api", "investigations", id, "graph"]) => {
            let query: GraphQuery = match serde_urlencoded::from_str(query) {
                Ok(q) => q,
                Err(e) => return Reply::error(400, format!("Invalid query: {}", e)),
            };
            graph_view(db, grid, id, query.cursor)
        }

        (Method::Get, ["api", "investigations", id, "traces"]) => match db.get_traces(id) {
            Ok(traces) => Reply::ok(traces),
            Err(e) => db_error(e),
        },

        (Method::Post, ["api", "audit"]) => ingest_root(db, body),

        (Method::Post, ["api", "investigations", id, "traces"]) => ingest_trace(db, id, body),

        _ => Reply::error(404, "Not found"),
    }
}

fn graph_view(db: &Database, grid: &Grid, id: &str, cursor: Option<usize>) -> Reply {
    let store = match TraceStore::load(db, id) {
        Ok(store) => store,
        Err(e) => return trace_error(e),
    };

    let cursor = cursor.unwrap_or(store.len()).min(store.len());
    Reply::ok(GraphView {
        investigation_id: store.investigation_id().to_string(),
        cursor,
        total: store.len(),
        waiting: cursor == 0,
        graph: layout(Some(store.root()), store.prefix(cursor), grid),
    })
}

/// Accept either a bare audit payload or a webhook body wrapping it
fn ingest_root(db: &Database, body: &str) -> Reply {
    let value: Value = match serde_json::from_str(body) {
        Ok(v) => v,
        Err(e) => return Reply::error(400, format!("Invalid JSON: {}", e)),
    };

    let payload = match extract_payload(value) {
        Some(p) => p,
        None => return Reply::error(400, "Payload has no event_id"),
    };
    let event_id = match payload.get("event_id").and_then(Value::as_str) {
        Some(id) => id.to_string(),
        None => return Reply::error(400, "Payload has no event_id"),
    };

    match db.record_audit_log(&event_id, &payload) {
        Ok(()) => {
            info!(%event_id, "investigation opened");
            Reply::created(json!({"event_id": event_id}))
        }
        Err(e) => db_error(e),
    }
}

/// Unwrap `{"record": {"payload": {...}}}` if present
pub fn extract_payload(value: Value) -> Option<Value> {
    let payload = match value.pointer("/record/payload") {
        Some(inner) => inner.clone(),
        None => value,
    };
    payload.get("event_id")?;
    Some(payload)
}

fn ingest_trace(db: &Database, id: &str, body: &str) -> Reply {
    let trace: NewTrace = match serde_json::from_str(body) {
        Ok(t) => t,
        Err(e) => return Reply::error(400, format!("Invalid JSON: {}", e)),
    };

    let role = AgentRole::parse(&trace.agent_role);
    let status = TraceStatus::parse(&trace.status);
    match db.log_trace(id, &role, &status, &trace.output) {
        Ok(trace_id) => Reply::created(json!({"id": trace_id})),
        Err(e) => db_error(e),
    }
}

fn trace_error(e: TraceError) -> Reply {
    match e {
        TraceError::NotFound { .. } => Reply::error(404, e.to_string()),
        TraceError::Source(inner) => db_error(inner),
    }
}

fn db_error(e: DbError) -> Reply {
    match e {
        DbError::Validation(msg) => Reply::error(409, msg),
        other => {
            error!("database error: {}", other);
            Reply::error(500, format!("Database error: {}", other))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Database) {
        let dir = TempDir::new().unwrap();
        let db = Database::open_at(dir.path().join("sentinel.db")).unwrap();
        (dir, db)
    }

    fn call(db: &Database, method: Method, url: &str, body: &str) -> (u16, Value) {
        let reply = route(db, &Grid::default(), &method, url, body);
        (reply.status, serde_json::from_str(&reply.body).unwrap())
    }

    #[test]
    fn test_health() {
        let (_dir, db) = setup();
        let (status, body) = call(&db, Method::Get, "/", "");
        assert_eq!(status, 200);
        assert_eq!(body["service"], "Sentinel Auditor");
        assert_eq!(body["status"], "active");
    }

    #[test]
    fn test_extract_payload_variants() {
        let bare = json!({"event_id": "a"});
        assert_eq!(extract_payload(bare.clone()), Some(bare));

        let wrapped = json!({"record": {"payload": {"event_id": "b", "x": 1}}});
        assert_eq!(extract_payload(wrapped).unwrap()["event_id"], "b");

        assert_eq!(extract_payload(json!({"nothing": true})), None);
    }

    #[test]
    fn test_ingest_then_graph() {
        let (_dir, db) = setup();
        let root = r#"{"record":{"payload":{"event_id":"evt-9","network_context":{"ip_address":"1.2.3.4"},"action_context":{"action_type":"LOGIN"}}}}"#;
        let (status, _) = call(&db, Method::Post, "/api/audit", root);
        assert_eq!(status, 201);

        let (status, _) = call(&db, Method::Post, "/api/audit", root);
        assert_eq!(status, 409);

        let trace = r#"{"agent_role":"TRIAGE","status":"COMPLETED","output":{"risk":"HIGH"}}"#;
        let (status, body) = call(&db, Method::Post, "/api/investigations/evt-9/traces", trace);
        assert_eq!(status, 201);
        assert!(body["data"]["id"].as_i64().unwrap() > 0);

        let (status, body) = call(&db, Method::Get, "/api/investigations/evt-9/graph", "");
        assert_eq!(status, 200);
        let nodes = body["data"]["graph"]["nodes"].as_array().unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0]["id"], "input");
        assert_eq!(nodes[0]["content"], "LOGIN via 1.2.3.4");
        assert_eq!(nodes[1]["content"], "Risk HIGH. Vectors detected.");
    }

    #[test]
    fn test_graph_cursor_limits_prefix() {
        let (_dir, db) = setup();
        call(&db, Method::Post, "/api/audit", r#"{"event_id":"evt-1"}"#);
        for _ in 0..3 {
            call(
                &db,
                Method::Post,
                "/api/investigations/evt-1/traces",
                r#"{"agent_role":"INTEL","status":"THINKING"}"#,
            );
        }

        let (_, body) = call(&db, Method::Get, "/api/investigations/evt-1/graph?cursor=1", "");
        assert_eq!(body["data"]["cursor"], 1);
        assert_eq!(body["data"]["total"], 3);
        assert_eq!(body["data"]["graph"]["nodes"].as_array().unwrap().len(), 2);

        let (_, body) = call(&db, Method::Get, "/api/investigations/evt-1/graph?cursor=0", "");
        assert_eq!(body["data"]["waiting"], true);

        let (status, _) = call(&db, Method::Get, "/api/investigations/evt-1/graph?cursor=x", "");
        assert_eq!(status, 400);
    }

    #[test]
    fn test_unknown_investigation_is_404() {
        let (_dir, db) = setup();
        let (status, body) = call(&db, Method::Get, "/api/investigations/missing/graph", "");
        assert_eq!(status, 404);
        assert_eq!(body["ok"], false);
        assert!(body["error"].as_str().unwrap().contains("awaiting data"));
    }

    #[test]
    fn test_bad_bodies_rejected() {
        let (_dir, db) = setup();
        let (status, _) = call(&db, Method::Post, "/api/audit", "not json");
        assert_eq!(status, 400);
        let (status, _) = call(&db, Method::Post, "/api/audit", r#"{"actor":{}}"#);
        assert_eq!(status, 400);
        let (status, _) = call(&db, Method::Post, "/api/investigations/x/traces", r#"{"status":"X"}"#);
        assert_eq!(status, 400);
        let (status, _) = call(&db, Method::Delete, "/api/audit", "");
        assert_eq!(status, 404);
    }

    #[test]
    fn test_percent_encoded_investigation_id() {
        let (_dir, db) = setup();
        let (status, _) = call(&db, Method::Post, "/api/audit", r#"{"event_id":"evt 7/a"}"#);
        assert_eq!(status, 201);

        let trace = r#"{"agent_role":"TRIAGE","status":"THINKING"}"#;
        let (status, _) = call(&db, Method::Post, "/api/investigations/evt%207%2Fa/traces", trace);
        assert_eq!(status, 201);

        let (status, body) = call(&db, Method::Get, "/api/investigations/evt%207%2Fa/traces", "");
        assert_eq!(status, 200);
        assert_eq!(body["data"][0]["event_id"], "evt 7/a");

        let (status, body) = call(&db, Method::Get, "/api/investigations/evt%207%2Fa/graph", "");
        assert_eq!(status, 200);
        assert_eq!(body["data"]["graph"]["nodes"].as_array().unwrap().len(), 2);

        let (status, _) = call(&db, Method::Get, "/api/investigations/%FF/graph", "");
        assert_eq!(status, 400);
    }
}
