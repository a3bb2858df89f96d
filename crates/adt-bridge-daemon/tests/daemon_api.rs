// crates/adt-bridge-daemon/tests/daemon_api.rs
// ============================================================================
// Module: Daemon API Tests
// Description: Lifecycle tests for the debug daemon HTTP API.
// Purpose: Validate session exclusivity, timeouts, and envelope shapes.
// Dependencies: adt-bridge-daemon, adt-bridge-client, reqwest, tiny_http
// ============================================================================

//! ## Overview
//! Boots the daemon against a scripted upstream and drives it over real
//! HTTP: session start and timeout, single-session exclusivity, stop
//! semantics, and the health probe.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use adt_bridge_client::AdtClient;
use adt_bridge_client::Transport;
use adt_bridge_core::Config;
use adt_bridge_core::SafetyMode;
use adt_bridge_core::SafetyPolicy;
use adt_bridge_daemon::DaemonConfig;
use adt_bridge_daemon::DebugDaemon;
use adt_bridge_daemon::NoopAuditSink;
use serde_json::Value;
use tiny_http::Header;
use tiny_http::Response;
use tiny_http::Server;

/// One scripted upstream route.
struct Route {
    /// URL substring selecting this route.
    pattern: &'static str,
    /// Response status.
    status: u16,
    /// Response body.
    body: String,
    /// Artificial response delay (models the long-poll).
    delay: Duration,
}

impl Route {
    fn new(pattern: &'static str, status: u16, body: &str) -> Self {
        Self {
            pattern,
            status,
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Starts a scripted upstream that answers every request by URL substring.
fn scripted_upstream(routes: Vec<Route>) -> String {
    let server = Server::http("127.0.0.1:0").expect("upstream");
    let addr = server.server_addr();
    thread::spawn(move || {
        while let Ok(request) = server.recv() {
            let url = request.url().to_string();
            let route = routes.iter().find(|route| url.contains(route.pattern));
            match route {
                Some(route) => {
                    let delay = route.delay;
                    let status = route.status;
                    let body = route.body.clone();
                    // Respond on a helper thread so a delayed long-poll
                    // does not block unrelated requests.
                    thread::spawn(move || {
                        if !delay.is_zero() {
                            thread::sleep(delay);
                        }
                        let response = Response::from_string(body)
                            .with_status_code(tiny_http::StatusCode(status))
                            .with_header(
                                Header::from_bytes("x-csrf-token", "test-token").unwrap(),
                            );
                        let _ = request.respond(response);
                    });
                }
                None => {
                    let response = Response::from_string("not scripted")
                        .with_status_code(tiny_http::StatusCode(404));
                    let _ = request.respond(response);
                }
            }
        }
    });
    format!("http://{addr}")
}

/// Boots a daemon wired to the upstream and returns its base URL.
async fn boot_daemon(upstream: &str) -> String {
    let config = Config::new(upstream, "developer", "secret")
        .with_safety(SafetyPolicy::new(SafetyMode::DevOnly));
    let client = Arc::new(AdtClient::from_transport(Transport::new(config).expect("transport")));
    let daemon = DebugDaemon::with_audit(
        client,
        DaemonConfig::default(),
        Arc::new(NoopAuditSink),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = daemon.serve_on(listener).await;
    });
    format!("http://{addr}")
}

async fn get_json(url: &str) -> (u16, Value) {
    let response = reqwest::get(url).await.expect("get");
    let status = response.status().as_u16();
    let body = response.json().await.expect("json body");
    (status, body)
}

async fn post_json(url: &str, body: Value) -> (u16, Value) {
    let client = reqwest::Client::new();
    let response = client.post(url).json(&body).send().await.expect("post");
    let status = response.status().as_u16();
    let body = response.json().await.expect("json body");
    (status, body)
}

/// Tests the health probe envelope.
#[tokio::test(flavor = "multi_thread")]
async fn health_reports_ok() {
    let upstream = scripted_upstream(vec![]);
    let daemon = boot_daemon(&upstream).await;

    let (status, body) = get_json(&format!("{daemon}/health")).await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], Value::Bool(true));
    assert_eq!(body["data"]["status"], "ok");
}

/// Tests the waiting-to-timeout session lifecycle.
#[tokio::test(flavor = "multi_thread")]
async fn session_times_out_without_debuggee() {
    // The upstream answers the listener poll with an exceeded time limit.
    let upstream = scripted_upstream(vec![
        Route::new("/sap/bc/adt/discovery", 200, "<discovery/>"),
        Route::new(
            "/debugger/listeners",
            200,
            "<dbg:exceededTimeLimit xmlns:dbg=\"http://www.sap.com/adt/debugger\"/>",
        )
        .delayed(Duration::from_millis(300)),
    ]);
    let daemon = boot_daemon(&upstream).await;

    let (status, body) =
        post_json(&format!("{daemon}/session"), serde_json::json!({"timeout": 1})).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["status"], "waiting");

    // The listener resolves quickly; poll until the status settles.
    let mut last_status = String::new();
    for _ in 0..50 {
        let (_, body) = get_json(&format!("{daemon}/session")).await;
        last_status = body["data"]["status"].as_str().unwrap_or_default().to_string();
        if last_status == "timeout" {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(last_status, "timeout");

    // A terminal session can be stopped and restarted.
    let client = reqwest::Client::new();
    let response = client
        .delete(format!("{daemon}/session"))
        .send()
        .await
        .expect("delete");
    assert_eq!(response.status().as_u16(), 200);
}

/// Tests single-session exclusivity while a listener is pending.
#[tokio::test(flavor = "multi_thread")]
async fn second_session_conflicts_while_waiting() {
    // The listener long-poll is delayed so the first session stays in
    // `waiting` while the second start attempt arrives.
    let upstream = scripted_upstream(vec![
        Route::new("/sap/bc/adt/discovery", 200, "<discovery/>"),
        Route::new("/debugger/listeners", 200, "").delayed(Duration::from_secs(5)),
    ]);
    let daemon = boot_daemon(&upstream).await;

    let (first_status, first_body) =
        post_json(&format!("{daemon}/session"), serde_json::json!({"timeout": 30})).await;
    assert_eq!(first_status, 200);
    assert_eq!(first_body["data"]["status"], "waiting");

    let (second_status, second_body) =
        post_json(&format!("{daemon}/session"), serde_json::json!({"timeout": 30})).await;
    assert_eq!(second_status, 409);
    assert_eq!(second_body["success"], Value::Bool(false));
}

/// Tests that step calls without an attached session are rejected.
#[tokio::test(flavor = "multi_thread")]
async fn step_without_session_is_rejected() {
    let upstream = scripted_upstream(vec![]);
    let daemon = boot_daemon(&upstream).await;

    let (status, body) =
        post_json(&format!("{daemon}/step"), serde_json::json!({"type": "stepOver"})).await;
    assert_eq!(status, 400);
    assert_eq!(body["success"], Value::Bool(false));

    let (status, _) =
        post_json(&format!("{daemon}/step"), serde_json::json!({"type": "warpSpeed"})).await;
    assert_eq!(status, 400);
}

/// Tests that breakpoint creation validates its input shape.
#[tokio::test(flavor = "multi_thread")]
async fn breakpoint_requires_kind_and_fields() {
    let upstream = scripted_upstream(vec![]);
    let daemon = boot_daemon(&upstream).await;

    let (status, _) = post_json(&format!("{daemon}/breakpoint"), serde_json::json!({})).await;
    assert_eq!(status, 400);

    let (status, _) = post_json(
        &format!("{daemon}/breakpoint"),
        serde_json::json!({"kind": "line", "line": 5}),
    )
    .await;
    assert_eq!(status, 400);
}

/// Tests CORS headers on simple requests.
#[tokio::test(flavor = "multi_thread")]
async fn cors_headers_are_present() {
    let upstream = scripted_upstream(vec![]);
    let daemon = boot_daemon(&upstream).await;

    let response = reqwest::get(format!("{daemon}/health")).await.expect("get");
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|value| value.to_str().ok()),
        Some("*")
    );
}

/// Tests that metrics record one event per handled request.
#[tokio::test(flavor = "multi_thread")]
async fn metrics_record_requests() {
    use std::sync::Mutex;

    use adt_bridge_daemon::DaemonMetricEvent;
    use adt_bridge_daemon::DaemonMetrics;
    use adt_bridge_daemon::DaemonOutcome;

    #[derive(Default)]
    struct TestMetrics {
        events: Mutex<Vec<DaemonMetricEvent>>,
    }

    impl DaemonMetrics for TestMetrics {
        fn record_request(&self, event: DaemonMetricEvent) {
            self.events.lock().expect("events lock").push(event);
        }

        fn record_latency(&self, _event: DaemonMetricEvent, _latency: Duration) {}
    }

    let upstream = scripted_upstream(vec![]);
    let config = Config::new(&upstream, "developer", "secret")
        .with_safety(SafetyPolicy::new(SafetyMode::DevOnly));
    let client = Arc::new(AdtClient::from_transport(Transport::new(config).expect("transport")));
    let metrics = Arc::new(TestMetrics::default());
    let daemon = adt_bridge_daemon::DebugDaemon::with_observability(
        client,
        DaemonConfig::default(),
        Arc::new(NoopAuditSink),
        metrics.clone(),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = daemon.serve_on(listener).await;
    });
    let daemon_url = format!("http://{addr}");

    let (status, _) = get_json(&format!("{daemon_url}/health")).await;
    assert_eq!(status, 200);

    let events = metrics.events.lock().expect("events lock");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].path, "/health");
    assert_eq!(events[0].outcome, DaemonOutcome::Ok);
}

/// Tests that a deleted session reports not found when absent.
#[tokio::test(flavor = "multi_thread")]
async fn delete_without_session_is_not_found() {
    let upstream = scripted_upstream(vec![]);
    let daemon = boot_daemon(&upstream).await;

    let client = reqwest::Client::new();
    let response = client
        .delete(format!("{daemon}/session"))
        .send()
        .await
        .expect("delete");
    assert_eq!(response.status().as_u16(), 404);
}
