// crates/adt-bridge-daemon/src/server.rs
// ============================================================================
// Module: Debug Daemon Server
// Description: Loopback HTTP server owning one sticky debug session.
// Purpose: Let short-lived callers share a single debugger session.
// Dependencies: adt-bridge-client, axum, tokio, serde_json
// ============================================================================

//! ## Overview
//! Stateless callers cannot keep the attach affinity the external debugger
//! needs, so the daemon owns the one client (and with it the one cookie
//! jar) for the lifetime of a session. Callers drive the session through a
//! small JSON API; a background task runs the listener long-poll and the
//! automatic attach.
//! Invariants:
//! - Exactly one session slot; starting over a non-terminal session is a
//!   conflict.
//! - Session state is never held locked across an upstream call.
//!
//! Security posture: the daemon binds loopback by default and treats every
//! request body as untrusted input.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Instant;

use adt_bridge_client::AdtClient;
use adt_bridge_client::Breakpoint;
use adt_bridge_client::BreakpointKind;
use adt_bridge_client::BreakpointRequest;
use adt_bridge_client::DebugStepType;
use adt_bridge_client::ListenOptions;
use axum::Router;
use axum::body::Bytes;
use axum::extract::Query;
use axum::extract::Request;
use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header::HeaderValue;
use axum::middleware;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

use crate::audit::DaemonAuditEvent;
use crate::audit::DaemonAuditSink;
use crate::audit::StderrAuditSink;
use crate::session::DebugSession;
use crate::session::SessionStatus;
use crate::telemetry::DaemonMetricEvent;
use crate::telemetry::DaemonMetrics;
use crate::telemetry::DaemonOutcome;
use crate::telemetry::NoopMetrics;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Daemon server configuration.
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Bind host (loopback by default).
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Default debugged user when a session request names none.
    pub default_user: String,
    /// Default listener timeout in seconds.
    pub default_timeout_seconds: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9123,
            default_user: String::new(),
            default_timeout_seconds: 60,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Daemon server errors.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// The listen address is invalid or already bound.
    #[error("daemon bind failed: {0}")]
    Bind(String),
    /// The server loop failed.
    #[error("daemon server failed: {0}")]
    Serve(String),
}

// ============================================================================
// SECTION: State
// ============================================================================

/// Shared daemon state.
struct DaemonState {
    /// Client owning the sticky upstream session.
    client: Arc<AdtClient>,
    /// Single session slot.
    session: Mutex<Option<DebugSession>>,
    /// Session id counter.
    next_session: AtomicU64,
    /// Audit sink for request records.
    audit: Arc<dyn DaemonAuditSink>,
    /// Metrics sink for request telemetry.
    metrics: Arc<dyn DaemonMetrics>,
    /// Default debugged user.
    default_user: String,
    /// Default listener timeout in seconds.
    default_timeout_seconds: u64,
}

impl DaemonState {
    /// Snapshots the current session.
    fn snapshot(&self) -> Option<DebugSession> {
        self.session.lock().ok().and_then(|slot| slot.clone())
    }

    /// Mutates the session under the slot lock.
    fn with_session<R>(&self, apply: impl FnOnce(&mut DebugSession) -> R) -> Option<R> {
        self.session.lock().ok().and_then(|mut slot| slot.as_mut().map(apply))
    }

    /// Mutates the session only while its id still matches.
    fn with_matching_session(&self, id: &str, apply: impl FnOnce(&mut DebugSession)) {
        if let Ok(mut slot) = self.session.lock()
            && let Some(session) = slot.as_mut()
            && session.id == id
        {
            apply(session);
        }
    }
}

/// Debug daemon server.
pub struct DebugDaemon {
    /// Server configuration.
    config: DaemonConfig,
    /// Shared handler state.
    state: Arc<DaemonState>,
}

impl DebugDaemon {
    /// Creates a daemon around one client.
    #[must_use]
    pub fn new(client: Arc<AdtClient>, config: DaemonConfig) -> Self {
        Self::with_observability(client, config, Arc::new(StderrAuditSink), Arc::new(NoopMetrics))
    }

    /// Creates a daemon with a custom audit sink.
    #[must_use]
    pub fn with_audit(
        client: Arc<AdtClient>,
        config: DaemonConfig,
        audit: Arc<dyn DaemonAuditSink>,
    ) -> Self {
        Self::with_observability(client, config, audit, Arc::new(NoopMetrics))
    }

    /// Creates a daemon with custom audit and metrics sinks.
    #[must_use]
    pub fn with_observability(
        client: Arc<AdtClient>,
        config: DaemonConfig,
        audit: Arc<dyn DaemonAuditSink>,
        metrics: Arc<dyn DaemonMetrics>,
    ) -> Self {
        let default_user = if config.default_user.is_empty() {
            client.config().username.clone()
        } else {
            config.default_user.clone()
        };
        let state = Arc::new(DaemonState {
            client,
            session: Mutex::new(None),
            next_session: AtomicU64::new(1),
            audit,
            metrics,
            default_user,
            default_timeout_seconds: config.default_timeout_seconds,
        });
        Self {
            config,
            state,
        }
    }

    /// Builds the daemon router (exposed for in-process tests).
    #[must_use]
    pub fn router(&self) -> Router {
        let state = Arc::clone(&self.state);
        Router::new()
            .route("/session", post(start_session).get(get_session).delete(stop_session))
            .route("/breakpoint", post(set_breakpoint).delete(delete_breakpoint))
            .route("/breakpoints", get(list_breakpoints))
            .route("/step", post(step))
            .route("/stack", get(get_stack))
            .route("/variables", get(get_variables).post(post_variables))
            .route("/health", get(health))
            .layer(middleware::from_fn_with_state(Arc::clone(&state), audit_layer))
            .layer(middleware::from_fn(cors_layer))
            .with_state(state)
    }

    /// Serves the daemon until the listener socket fails.
    ///
    /// # Errors
    ///
    /// Returns [`DaemonError`] for bind and serve failures.
    pub async fn serve(self) -> Result<(), DaemonError> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|err| DaemonError::Bind(format!("{addr}: {err}")))?;
        self.serve_on(listener).await
    }

    /// Serves the daemon on an already bound listener.
    ///
    /// # Errors
    ///
    /// Returns [`DaemonError`] when the server loop fails.
    pub async fn serve_on(self, listener: tokio::net::TcpListener) -> Result<(), DaemonError> {
        let app = self.router();
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .await
            .map_err(|err| DaemonError::Serve(err.to_string()))
    }
}

// ============================================================================
// SECTION: Middleware
// ============================================================================

/// Adds permissive CORS headers and answers preflight requests.
async fn cors_layer(request: Request, next: Next) -> Response {
    if request.method() == axum::http::Method::OPTIONS {
        let mut response = StatusCode::OK.into_response();
        apply_cors(&mut response);
        return response;
    }
    let mut response = next.run(request).await;
    apply_cors(&mut response);
    response
}

fn apply_cors(response: &mut Response) {
    let headers = response.headers_mut();
    headers.insert("Access-Control-Allow-Origin", HeaderValue::from_static("*"));
    headers.insert(
        "Access-Control-Allow-Methods",
        HeaderValue::from_static("GET, POST, DELETE, OPTIONS"),
    );
    headers.insert("Access-Control-Allow-Headers", HeaderValue::from_static("Content-Type"));
}

/// Records one audit event per handled request.
async fn audit_layer(
    State(state): State<Arc<DaemonState>>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let started_at = Instant::now();
    let response = next.run(request).await;
    let status = response.status().as_u16();
    let latency = started_at.elapsed();
    state.audit.record(&DaemonAuditEvent::new(
        method.clone(),
        path.clone(),
        status,
        latency.as_millis(),
    ));
    let event = DaemonMetricEvent {
        method,
        path,
        status,
        outcome: DaemonOutcome::from_status(status),
    };
    state.metrics.record_request(event.clone());
    state.metrics.record_latency(event, latency);
    response
}

// ============================================================================
// SECTION: Envelope
// ============================================================================

/// Stable JSON envelope returned by every endpoint.
#[derive(Debug, Serialize)]
struct ApiResponse {
    /// True on success.
    success: bool,
    /// Success payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    /// Failure description.
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Builds a success envelope.
fn success(data: impl Serialize) -> (StatusCode, axum::Json<ApiResponse>) {
    let data = serde_json::to_value(data).unwrap_or(Value::Null);
    (
        StatusCode::OK,
        axum::Json(ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }),
    )
}

/// Builds a failure envelope.
fn failure(status: StatusCode, message: impl Into<String>) -> (StatusCode, axum::Json<ApiResponse>) {
    (
        status,
        axum::Json(ApiResponse {
            success: false,
            data: None,
            error: Some(message.into()),
        }),
    )
}

/// Decodes an optional JSON body, tolerating an empty one.
fn decode_body<T: serde::de::DeserializeOwned + Default>(bytes: &Bytes) -> Result<T, String> {
    if bytes.is_empty() {
        return Ok(T::default());
    }
    serde_json::from_slice(bytes).map_err(|err| format!("invalid json body: {err}"))
}

// ============================================================================
// SECTION: Session Handlers
// ============================================================================

/// `POST /session` request payload.
#[derive(Debug, Default, Deserialize)]
struct StartSessionRequest {
    /// Debugged user (defaults to the configured user).
    #[serde(default)]
    user: Option<String>,
    /// Listener timeout in seconds (defaults to the configured timeout).
    #[serde(default)]
    timeout: Option<u64>,
}

/// Starts the listener and returns immediately with `waiting`.
async fn start_session(
    State(state): State<Arc<DaemonState>>,
    bytes: Bytes,
) -> impl IntoResponse {
    let request: StartSessionRequest = match decode_body(&bytes) {
        Ok(request) => request,
        Err(message) => return failure(StatusCode::BAD_REQUEST, message),
    };
    let user = request
        .user
        .filter(|user| !user.is_empty())
        .unwrap_or_else(|| state.default_user.clone())
        .to_ascii_uppercase();
    let timeout = request.timeout.unwrap_or(state.default_timeout_seconds);

    let session_id = {
        let Ok(mut slot) = state.session.lock() else {
            return failure(StatusCode::INTERNAL_SERVER_ERROR, "session slot poisoned");
        };
        if let Some(existing) = slot.as_ref()
            && !existing.status.is_terminal()
        {
            return failure(StatusCode::CONFLICT, "session already active");
        }
        let id = format!("dbg-{}", state.next_session.fetch_add(1, Ordering::Relaxed));
        *slot = Some(DebugSession::waiting(id.clone(), user.clone()));
        id
    };

    tokio::spawn(run_listener(Arc::clone(&state), session_id.clone(), user.clone(), timeout));

    success(json!({
        "id": session_id,
        "status": SessionStatus::Waiting,
        "user": user,
        "timeout": timeout,
    }))
}

/// Background listener: long-poll, auto-attach, initial stack.
async fn run_listener(state: Arc<DaemonState>, session_id: String, user: String, timeout: u64) {
    let options = ListenOptions {
        user: user.clone(),
        timeout_seconds: timeout,
    };
    let result = state.client.debugger_listen(&options).await;

    let debuggee = match result {
        Err(err) => {
            state.with_matching_session(&session_id, |session| {
                session.status = SessionStatus::Error;
                session.error = Some(err.to_string());
            });
            return;
        }
        Ok(listen) => match listen.debuggee {
            None => {
                state.with_matching_session(&session_id, |session| {
                    session.status = SessionStatus::Timeout;
                });
                return;
            }
            Some(debuggee) => debuggee,
        },
    };

    state.with_matching_session(&session_id, |session| {
        session.status = SessionStatus::Caught;
        session.debuggee_id = Some(debuggee.id.clone());
    });

    if let Err(err) = state.client.debugger_attach(&debuggee.id, &user).await {
        state.with_matching_session(&session_id, |session| {
            session.status = SessionStatus::AttachFailed;
            session.error = Some(err.to_string());
        });
        return;
    }
    state.with_matching_session(&session_id, |session| {
        session.status = SessionStatus::Attached;
    });

    if let Ok(stack_info) = state.client.debugger_stack().await {
        state.with_matching_session(&session_id, |session| {
            session.update_position(stack_info.stack);
        });
    }
}

/// Returns the current session snapshot.
async fn get_session(State(state): State<Arc<DaemonState>>) -> impl IntoResponse {
    match state.snapshot() {
        Some(session) => success(session),
        None => success(json!({ "status": "no_session" })),
    }
}

/// Detaches and stops the current session.
async fn stop_session(State(state): State<Arc<DaemonState>>) -> impl IntoResponse {
    let Some(session) = state.snapshot() else {
        return failure(StatusCode::NOT_FOUND, "no active session");
    };
    if session.debuggee_id.is_some() {
        let _ = state.client.debugger_detach().await;
    }
    state.with_session(|session| {
        session.status = SessionStatus::Stopped;
    });
    success(json!({ "message": "session stopped" }))
}

// ============================================================================
// SECTION: Step and Inspection Handlers
// ============================================================================

/// `POST /step` request payload.
#[derive(Debug, Default, Deserialize)]
struct StepRequest {
    /// Step type label (defaults to `stepOver`).
    #[serde(default, rename = "type")]
    step_type: Option<String>,
    /// Target URI for run-to-line and jump-to-line steps.
    #[serde(default)]
    uri: Option<String>,
}

/// Performs one stepping operation and refreshes the stack.
async fn step(State(state): State<Arc<DaemonState>>, bytes: Bytes) -> impl IntoResponse {
    let request: StepRequest = match decode_body(&bytes) {
        Ok(request) => request,
        Err(message) => return failure(StatusCode::BAD_REQUEST, message),
    };
    let label = request.step_type.unwrap_or_else(|| "stepOver".to_string());
    let Some(step_type) = DebugStepType::parse(&label) else {
        return failure(StatusCode::BAD_REQUEST, format!("invalid step type: {label}"));
    };
    let attached = state
        .with_session(|session| session.status.is_attached())
        .unwrap_or(false);
    if !attached {
        return failure(StatusCode::BAD_REQUEST, "no attached debug session");
    }

    state.with_session(|session| {
        session.status = SessionStatus::Stepping;
    });
    let result = state.client.debugger_step(step_type, request.uri.as_deref()).await;
    match result {
        Ok(step_result) => {
            if step_result.terminated {
                state.with_session(|session| {
                    session.status = SessionStatus::Stopped;
                });
                return success(step_result);
            }
            let stack = state.client.debugger_stack().await.ok();
            state.with_session(|session| {
                session.status = SessionStatus::Attached;
                if let Some(stack_info) = stack {
                    session.update_position(stack_info.stack);
                }
            });
            success(step_result)
        }
        Err(err) => {
            state.with_session(|session| {
                session.status = SessionStatus::Attached;
            });
            failure(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

/// Returns the current call stack.
async fn get_stack(State(state): State<Arc<DaemonState>>) -> impl IntoResponse {
    let attached = state
        .with_session(|session| session.status.is_attached())
        .unwrap_or(false);
    if !attached {
        return failure(StatusCode::BAD_REQUEST, "no attached debug session");
    }
    match state.client.debugger_stack().await {
        Ok(stack_info) => {
            state.with_session(|session| {
                session.update_position(stack_info.stack.clone());
            });
            success(stack_info)
        }
        Err(err) => failure(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

/// `POST /variables` request payload.
#[derive(Debug, Default, Deserialize)]
struct VariablesRequest {
    /// Variable identifiers (defaults to `@ROOT`).
    #[serde(default)]
    ids: Vec<String>,
}

/// Returns the root variables.
async fn get_variables(State(state): State<Arc<DaemonState>>) -> impl IntoResponse {
    fetch_variables(&state, Vec::new()).await
}

/// Returns specific variables by id.
async fn post_variables(State(state): State<Arc<DaemonState>>, bytes: Bytes) -> impl IntoResponse {
    let request: VariablesRequest = match decode_body(&bytes) {
        Ok(request) => request,
        Err(message) => return failure(StatusCode::BAD_REQUEST, message),
    };
    fetch_variables(&state, request.ids).await
}

async fn fetch_variables(
    state: &Arc<DaemonState>,
    ids: Vec<String>,
) -> (StatusCode, axum::Json<ApiResponse>) {
    let attached = state
        .with_session(|session| session.status.is_attached())
        .unwrap_or(false);
    if !attached {
        return failure(StatusCode::BAD_REQUEST, "no attached debug session");
    }
    match state.client.debugger_variables(&ids).await {
        Ok(variables) => {
            state.with_session(|session| {
                session.variables = variables.clone();
            });
            success(variables)
        }
        Err(err) => failure(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

// ============================================================================
// SECTION: Breakpoint Handlers
// ============================================================================

/// `POST /breakpoint` request payload.
#[derive(Debug, Default, Deserialize)]
struct SetBreakpointRequest {
    /// Breakpoint kind (`line`, `exception`, `statement`).
    #[serde(default)]
    kind: String,
    /// Source URI for line breakpoints.
    #[serde(default)]
    uri: Option<String>,
    /// Line for line breakpoints.
    #[serde(default)]
    line: Option<u32>,
    /// Exception class for exception breakpoints.
    #[serde(default)]
    exception: Option<String>,
    /// Statement for statement breakpoints.
    #[serde(default)]
    statement: Option<String>,
    /// Optional condition expression.
    #[serde(default)]
    condition: Option<String>,
}

/// Creates one external breakpoint.
async fn set_breakpoint(State(state): State<Arc<DaemonState>>, bytes: Bytes) -> impl IntoResponse {
    let request: SetBreakpointRequest = match decode_body(&bytes) {
        Ok(request) => request,
        Err(message) => return failure(StatusCode::BAD_REQUEST, message),
    };
    let kind = match request.kind.as_str() {
        "line" => BreakpointKind::Line,
        "exception" => BreakpointKind::Exception,
        "statement" => BreakpointKind::Statement,
        "" => {
            return failure(
                StatusCode::BAD_REQUEST,
                "kind is required (line, exception, statement)",
            );
        }
        other => {
            return failure(StatusCode::BAD_REQUEST, format!("invalid breakpoint kind: {other}"));
        }
    };
    let breakpoint = Breakpoint {
        id: None,
        kind,
        uri: request.uri,
        line: request.line,
        exception: request.exception,
        statement: request.statement,
        condition: request.condition,
        enabled: true,
    };
    let user = state
        .with_session(|session| session.user.clone())
        .unwrap_or_else(|| state.default_user.clone());
    let created = state
        .client
        .set_external_breakpoint(&BreakpointRequest {
            user,
            breakpoints: vec![breakpoint.clone()],
        })
        .await;
    match created {
        Ok(mut breakpoints) => {
            let stored = if breakpoints.is_empty() {
                breakpoint
            } else {
                breakpoints.remove(0)
            };
            state.with_session(|session| {
                session.breakpoints.push(stored.clone());
            });
            success(stored)
        }
        Err(err) if matches!(err.kind(), adt_bridge_core::ErrorKind::InvalidArgument) => {
            failure(StatusCode::BAD_REQUEST, err.to_string())
        }
        Err(err) => failure(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

/// Lists the external breakpoints of the session user.
async fn list_breakpoints(State(state): State<Arc<DaemonState>>) -> impl IntoResponse {
    let user = state
        .with_session(|session| session.user.clone())
        .unwrap_or_else(|| state.default_user.clone());
    match state.client.get_external_breakpoints(&user).await {
        Ok(breakpoints) => success(breakpoints),
        Err(err) => failure(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

/// `DELETE /breakpoint` query parameters.
#[derive(Debug, Deserialize)]
struct DeleteBreakpointQuery {
    /// Breakpoint identifier.
    id: Option<String>,
}

/// Deletes one external breakpoint by id.
async fn delete_breakpoint(
    State(state): State<Arc<DaemonState>>,
    Query(query): Query<DeleteBreakpointQuery>,
) -> impl IntoResponse {
    let Some(id) = query.id.filter(|id| !id.is_empty()) else {
        return failure(StatusCode::BAD_REQUEST, "breakpoint id required");
    };
    let user = state
        .with_session(|session| session.user.clone())
        .unwrap_or_else(|| state.default_user.clone());
    match state.client.delete_external_breakpoint(&id, &user).await {
        Ok(()) => {
            state.with_session(|session| {
                session.breakpoints.retain(|bp| bp.id.as_deref() != Some(id.as_str()));
            });
            success(json!({ "deleted": id }))
        }
        Err(err) => failure(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
    }
}

// ============================================================================
// SECTION: Health
// ============================================================================

/// Liveness probe.
async fn health() -> impl IntoResponse {
    success(json!({ "status": "ok" }))
}
