// crates/adt-bridge-tools/tests/router_dispatch.rs
// ============================================================================
// Module: Router Dispatch Tests
// Description: Envelope and policy tests for the tool router.
// Purpose: Validate gating, profiles, and the stable envelope shape.
// Dependencies: adt-bridge-tools, adt-bridge-client, tiny_http, tokio
// ============================================================================

//! ## Overview
//! Drives the router against a counting mock server. The central property:
//! a policy denial produces a structured error without a single upstream
//! request.

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
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::thread;

use adt_bridge_client::AdtClient;
use adt_bridge_client::Transport;
use adt_bridge_core::Config;
use adt_bridge_core::SafetyMode;
use adt_bridge_core::SafetyPolicy;
use adt_bridge_tools::ToolProfile;
use adt_bridge_tools::ToolRouter;
use serde_json::Value;
use serde_json::json;
use tiny_http::Header;
use tiny_http::Response;
use tiny_http::Server;

/// A mock upstream that counts every request it receives.
struct CountingUpstream {
    base_url: String,
    hits: Arc<AtomicUsize>,
}

impl CountingUpstream {
    fn start(routes: Vec<(&'static str, u16, String)>) -> Self {
        let server = Server::http("127.0.0.1:0").expect("upstream");
        let addr = server.server_addr();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = Arc::clone(&hits);
        thread::spawn(move || {
            while let Ok(request) = server.recv() {
                hits_clone.fetch_add(1, Ordering::SeqCst);
                let url = request.url().to_string();
                let route = routes.iter().find(|(pattern, _, _)| url.contains(pattern));
                let response = match route {
                    Some((_, status, body)) => Response::from_string(body.clone())
                        .with_status_code(tiny_http::StatusCode(*status))
                        .with_header(Header::from_bytes("x-csrf-token", "token").unwrap()),
                    None => Response::from_string("not scripted")
                        .with_status_code(tiny_http::StatusCode(404)),
                };
                let _ = request.respond(response);
            }
        });
        Self {
            base_url: format!("http://{addr}"),
            hits,
        }
    }

    fn router(&self, safety: SafetyPolicy, profile: ToolProfile) -> ToolRouter {
        let config = Config::new(&self.base_url, "developer", "secret").with_safety(safety);
        let client =
            Arc::new(AdtClient::from_transport(Transport::new(config).expect("transport")));
        ToolRouter::new(client, profile)
    }

    fn hit_count(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Tests that policy denials never reach the upstream.
#[tokio::test]
async fn denied_calls_never_reach_the_upstream() {
    let upstream = CountingUpstream::start(vec![]);
    let router = upstream.router(SafetyPolicy::new(SafetyMode::ReadOnly), ToolProfile::Focused);

    let envelope = router
        .dispatch(
            "write_source",
            json!({
                "object_type": "program",
                "name": "ZTEST",
                "mode": "update",
                "source": "REPORT ztest.",
            }),
        )
        .await;
    assert_eq!(envelope["success"], Value::Bool(false));
    assert_eq!(envelope["error"]["kind"], "permission_denied");
    assert_eq!(upstream.hit_count(), 0);
}

/// Tests that a missing write mode is rejected as invalid input.
#[tokio::test]
async fn write_source_without_mode_is_rejected() {
    let upstream = CountingUpstream::start(vec![]);
    let router = upstream.router(SafetyPolicy::new(SafetyMode::DevOnly), ToolProfile::Focused);

    let envelope = router
        .dispatch(
            "write_source",
            json!({
                "object_type": "program",
                "name": "ZTEST",
                "source": "REPORT ztest.",
            }),
        )
        .await;
    assert_eq!(envelope["success"], Value::Bool(false));
    assert_eq!(envelope["error"]["kind"], "invalid_argument");
    assert!(
        envelope["error"]["message"]
            .as_str()
            .is_some_and(|message| message.contains("mode"))
    );
    assert_eq!(upstream.hit_count(), 0);
}

/// Tests the focused profile hides expert tools.
#[tokio::test]
async fn focused_profile_hides_expert_tools() {
    let upstream = CountingUpstream::start(vec![]);
    let router = upstream.router(SafetyPolicy::new(SafetyMode::DevOnly), ToolProfile::Focused);

    let envelope = router
        .dispatch("create_object", json!({
            "object_type": "program",
            "name": "ZNEW",
            "package": "ZPKG",
        }))
        .await;
    assert_eq!(envelope["success"], Value::Bool(false));
    assert_eq!(envelope["error"]["kind"], "invalid_argument");
    assert!(
        envelope["error"]["message"]
            .as_str()
            .is_some_and(|message| message.contains("unknown tool"))
    );
    assert_eq!(upstream.hit_count(), 0);
}

/// Tests a successful read envelope end to end.
#[tokio::test]
async fn get_source_returns_success_envelope() {
    let upstream = CountingUpstream::start(vec![(
        "/programs/programs/ZTEST/source/main",
        200,
        "REPORT ztest.".to_string(),
    )]);
    let router = upstream.router(SafetyPolicy::new(SafetyMode::ReadOnly), ToolProfile::Focused);

    let envelope = router
        .dispatch("get_source", json!({"object_type": "program", "name": "ztest"}))
        .await;
    assert_eq!(envelope["success"], Value::Bool(true));
    assert_eq!(envelope["data"]["source"], "REPORT ztest.");
    assert_eq!(upstream.hit_count(), 1);
}

/// Tests search dispatch and its decoded payload.
#[tokio::test]
async fn search_object_decodes_results() {
    let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<adtcore:objectReferences xmlns:adtcore="http://www.sap.com/adt/core">
  <adtcore:objectReference adtcore:uri="/sap/bc/adt/programs/programs/ztest" adtcore:type="PROG/P" adtcore:name="ZTEST"/>
</adtcore:objectReferences>"#;
    let upstream =
        CountingUpstream::start(vec![("informationsystem/search", 200, body.to_string())]);
    let router = upstream.router(SafetyPolicy::new(SafetyMode::ReadOnly), ToolProfile::Focused);

    let envelope = router
        .dispatch("search_object", json!({"query": "ZTEST*", "max_results": 10}))
        .await;
    assert_eq!(envelope["success"], Value::Bool(true));
    assert_eq!(envelope["data"][0]["name"], "ZTEST");
    assert_eq!(envelope["data"][0]["type"], "PROG/P");
}

/// Tests that bad payload shapes are rejected before the wire.
#[tokio::test]
async fn malformed_payload_is_invalid_argument() {
    let upstream = CountingUpstream::start(vec![]);
    let router = upstream.router(SafetyPolicy::new(SafetyMode::ReadOnly), ToolProfile::Focused);

    let envelope = router.dispatch("get_source", json!({"object_type": "program"})).await;
    assert_eq!(envelope["success"], Value::Bool(false));
    assert_eq!(envelope["error"]["kind"], "invalid_argument");
    assert_eq!(upstream.hit_count(), 0);
}

/// Tests that unknown tools report a stable error kind.
#[tokio::test]
async fn unknown_tool_reports_invalid_argument() {
    let upstream = CountingUpstream::start(vec![]);
    let router = upstream.router(SafetyPolicy::new(SafetyMode::ReadOnly), ToolProfile::Expert);

    let envelope = router.dispatch("fly_to_the_moon", json!({})).await;
    assert_eq!(envelope["success"], Value::Bool(false));
    assert_eq!(envelope["error"]["kind"], "invalid_argument");
}

/// Tests a 404 read mapping to the not-found kind.
#[tokio::test]
async fn missing_object_maps_to_not_found() {
    let upstream = CountingUpstream::start(vec![]);
    let router = upstream.router(SafetyPolicy::new(SafetyMode::ReadOnly), ToolProfile::Focused);

    let envelope = router
        .dispatch("get_source", json!({"object_type": "program", "name": "ZMISSING"}))
        .await;
    assert_eq!(envelope["success"], Value::Bool(false));
    assert_eq!(envelope["error"]["kind"], "not_found");
}

/// Tests the bare-identifier expansion through the dispatcher.
#[tokio::test]
async fn query_data_expands_bare_identifiers() {
    let preview = r#"<dataPreview:tableData xmlns:dataPreview="http://www.sap.com/adt/dataPreview">
<dataPreview:totalRows>1</dataPreview:totalRows>
<dataPreview:columns><dataPreview:metadata dataPreview:name="MANDT"/><dataPreview:dataSet><dataPreview:data>100</dataPreview:data></dataPreview:dataSet></dataPreview:columns>
</dataPreview:tableData>"#;
    let upstream = CountingUpstream::start(vec![
        ("/sap/bc/adt/discovery", 200, "<discovery/>".to_string()),
        ("datapreview/freestyle", 200, preview.to_string()),
    ]);
    let router = upstream.router(SafetyPolicy::new(SafetyMode::DevOnly), ToolProfile::Focused);

    let envelope = router.dispatch("query_data", json!({"query": "T000"})).await;
    assert_eq!(envelope["success"], Value::Bool(true));
    assert_eq!(envelope["data"]["columns"][0], "MANDT");
    assert_eq!(envelope["data"]["rows"][0][0], "100");
}
