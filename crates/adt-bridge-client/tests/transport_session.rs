// crates/adt-bridge-client/tests/transport_session.rs
// ============================================================================
// Module: Transport Session Tests
// Description: Wire-level tests for CSRF, cookies, and URL composition.
// Purpose: Validate the session contract against a scripted HTTP server.
// Dependencies: adt-bridge-client, adt-bridge-core, tiny_http, tokio
// ============================================================================

//! ## Overview
//! Drives the transport against a scripted [`tiny_http`] server to pin the
//! session behaviors: discovery warm-up, single CSRF retry, cookie replay,
//! and standard query composition.

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
use std::sync::Mutex;
use std::thread;

use adt_bridge_client::RequestOptions;
use adt_bridge_client::Transport;
use adt_bridge_client::TransportError;
use adt_bridge_core::Config;
use tiny_http::Header;
use tiny_http::Response;
use tiny_http::Server;

/// One request observed by the scripted server.
#[derive(Debug, Clone)]
struct SeenRequest {
    method: String,
    url: String,
    csrf_token: Option<String>,
    cookie: Option<String>,
    authorization: Option<String>,
}

/// Scripted response returned by the server.
struct Scripted {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Scripted {
    fn ok(body: &str) -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: body.as_bytes().to_vec(),
        }
    }

    fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

/// Spawns a server that plays the scripted responses in order and records
/// every request it sees.
fn scripted_server(responses: Vec<Scripted>) -> (String, Arc<Mutex<Vec<SeenRequest>>>) {
    let server = Server::http("127.0.0.1:0").expect("http server");
    let addr = server.server_addr();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen_clone = Arc::clone(&seen);
    thread::spawn(move || {
        for scripted in responses {
            let Ok(request) = server.recv() else {
                return;
            };
            let header_value = |name: &str| {
                request
                    .headers()
                    .iter()
                    .find(|header| header.field.as_str().as_str().eq_ignore_ascii_case(name))
                    .map(|header| header.value.as_str().to_string())
            };
            seen_clone.lock().expect("seen lock").push(SeenRequest {
                method: request.method().as_str().to_string(),
                url: request.url().to_string(),
                csrf_token: header_value("x-csrf-token"),
                cookie: header_value("cookie"),
                authorization: header_value("authorization"),
            });
            let mut response = Response::from_data(scripted.body)
                .with_status_code(tiny_http::StatusCode(scripted.status));
            for (name, value) in scripted.headers {
                response = response
                    .with_header(Header::from_bytes(name.as_bytes(), value.as_bytes()).unwrap());
            }
            request.respond(response).expect("respond");
        }
    });
    (format!("http://{addr}"), seen)
}

fn transport_for(base_url: &str) -> Transport {
    let config = Config::new(base_url, "developer", "secret").with_sap_client("100");
    Transport::new(config).expect("transport")
}

/// Tests that GET requests carry the standard query pair and basic auth.
#[tokio::test]
async fn get_composes_standard_query_and_basic_auth() {
    let (base_url, seen) = scripted_server(vec![Scripted::ok("REPORT ztest.")]);
    let transport = transport_for(&base_url);

    let response = transport
        .request(
            "/sap/bc/adt/programs/programs/ZTEST/source/main",
            RequestOptions::get().with_accept("text/plain"),
        )
        .await
        .expect("request");
    assert_eq!(response.text(), "REPORT ztest.");

    let seen = seen.lock().expect("seen lock");
    assert_eq!(seen.len(), 1);
    assert!(seen[0].url.contains("/programs/programs/ZTEST/source/main"));
    assert!(seen[0].url.contains("sap-client=100"));
    assert!(seen[0].url.contains("sap-language=EN"));
    assert!(seen[0].authorization.as_deref().is_some_and(|auth| auth.starts_with("Basic ")));
}

/// Tests the POST flow: discovery fetch first, then the token on the call.
#[tokio::test]
async fn post_fetches_csrf_token_before_the_call() {
    let (base_url, seen) = scripted_server(vec![
        Scripted::ok("<discovery/>")
            .with_header("x-csrf-token", "token-1")
            .with_header("set-cookie", "SAP_SESSIONID_X00=abc; path=/"),
        Scripted::ok("done"),
    ]);
    let transport = transport_for(&base_url);

    transport
        .request("/sap/bc/adt/activation", RequestOptions::post())
        .await
        .expect("post");

    let seen = seen.lock().expect("seen lock");
    assert_eq!(seen.len(), 2);
    assert!(seen[0].url.contains("/sap/bc/adt/discovery"));
    assert_eq!(seen[0].csrf_token.as_deref(), Some("Fetch"));
    assert_eq!(seen[1].csrf_token.as_deref(), Some("token-1"));
    // The discovery cookie is replayed and switches off basic auth.
    assert!(seen[1].cookie.as_deref().is_some_and(|c| c.contains("SAP_SESSIONID_X00=abc")));
    assert!(seen[1].authorization.is_none());
}

/// Tests the single retry on an expired CSRF token.
#[tokio::test]
async fn expired_csrf_token_is_refetched_exactly_once() {
    let rejection = Scripted {
        status: 403,
        headers: vec![("x-csrf-token".to_string(), "Required".to_string())],
        body: b"CSRF token validation failed".to_vec(),
    };
    let (base_url, seen) = scripted_server(vec![
        Scripted::ok("<discovery/>").with_header("x-csrf-token", "stale"),
        rejection,
        Scripted::ok("<discovery/>").with_header("x-csrf-token", "fresh"),
        Scripted::ok("done"),
    ]);
    let transport = transport_for(&base_url);

    transport
        .request("/sap/bc/adt/activation", RequestOptions::post())
        .await
        .expect("post after retry");

    let seen = seen.lock().expect("seen lock");
    assert_eq!(seen.len(), 4);
    assert_eq!(seen[0].csrf_token.as_deref(), Some("Fetch"));
    assert_eq!(seen[1].csrf_token.as_deref(), Some("stale"));
    assert_eq!(seen[2].csrf_token.as_deref(), Some("Fetch"));
    assert_eq!(seen[3].csrf_token.as_deref(), Some("fresh"));
}

/// Tests that a second rejection surfaces as a conflict.
#[tokio::test]
async fn second_csrf_rejection_surfaces_as_conflict() {
    let rejection = || Scripted {
        status: 403,
        headers: vec![("x-csrf-token".to_string(), "Required".to_string())],
        body: b"CSRF token validation failed".to_vec(),
    };
    let (base_url, seen) = scripted_server(vec![
        Scripted::ok("<discovery/>").with_header("x-csrf-token", "stale"),
        rejection(),
        Scripted::ok("<discovery/>").with_header("x-csrf-token", "still-stale"),
        rejection(),
    ]);
    let transport = transport_for(&base_url);

    let err = transport
        .request("/sap/bc/adt/activation", RequestOptions::post())
        .await
        .expect_err("second rejection");
    assert!(matches!(err, TransportError::Conflict { status: 403, .. }));

    // Exactly one fetch and one retry beyond the original pair.
    assert_eq!(seen.lock().expect("seen lock").len(), 4);
}

/// Tests that caller query parameters win over the standard pair.
#[tokio::test]
async fn caller_query_wins_over_standard_pair() {
    let (base_url, seen) = scripted_server(vec![Scripted::ok("ok")]);
    let transport = transport_for(&base_url);

    transport
        .request(
            "/sap/bc/adt/repository/nodestructure",
            RequestOptions::get().with_query("sap-client", "200"),
        )
        .await
        .expect("request");

    let seen = seen.lock().expect("seen lock");
    assert!(seen[0].url.contains("sap-client=200"));
    assert!(!seen[0].url.contains("sap-client=100"));
}

/// Tests that configured cookies are sent from the first request on.
#[tokio::test]
async fn seeded_cookies_replay_and_skip_basic_auth() {
    let (base_url, seen) = scripted_server(vec![Scripted::ok("ok")]);
    let config = Config::new(&base_url, "developer", "")
        .with_cookies([("SAP_SESSIONID_A11", "seeded"), ("sap-usercontext", "client=100")]);
    let transport = Transport::new(config).expect("transport");

    transport
        .request("/sap/bc/adt/discovery", RequestOptions::get())
        .await
        .expect("request");

    let seen = seen.lock().expect("seen lock");
    let cookie = seen[0].cookie.as_deref().expect("cookie header");
    assert!(cookie.contains("SAP_SESSIONID_A11=seeded"));
    assert!(cookie.contains("sap-usercontext=client=100"));
    assert!(seen[0].authorization.is_none());
}

/// Tests that a 404 carries the bounded body prefix.
#[tokio::test]
async fn not_found_carries_body_prefix() {
    let (base_url, _seen) = scripted_server(vec![Scripted {
        status: 404,
        headers: Vec::new(),
        body: b"Object ZMISSING does not exist".to_vec(),
    }]);
    let transport = transport_for(&base_url);

    let err = transport
        .request(
            "/sap/bc/adt/programs/programs/ZMISSING/source/main",
            RequestOptions::get(),
        )
        .await
        .expect_err("missing object");
    match err {
        TransportError::NotFound { body_prefix, .. } => {
            assert!(body_prefix.contains("ZMISSING"));
        }
        other => panic!("expected NotFound, got {other:?}"),
    }
}
