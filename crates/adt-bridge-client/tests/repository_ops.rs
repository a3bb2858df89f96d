// crates/adt-bridge-client/tests/repository_ops.rs
// ============================================================================
// Module: Repository Operation Tests
// Description: End-to-end reader and lifecycle tests against a mock server.
// Purpose: Validate request shaping and decoding for typed operations.
// Dependencies: adt-bridge-client, adt-bridge-core, tiny_http, tokio
// ============================================================================

//! ## Overview
//! Exercises the typed operation surface against a scripted HTTP server:
//! search decoding, name normalization in request paths, namespaced name
//! encoding, and the write workflow's lock discipline.

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

use adt_bridge_client::AdtClient;
use adt_bridge_client::Transport;
use adt_bridge_core::Config;
use adt_bridge_core::ObjectIdentity;
use adt_bridge_core::ObjectKind;
use adt_bridge_core::SafetyMode;
use adt_bridge_core::SafetyPolicy;
use tiny_http::Header;
use tiny_http::Response;
use tiny_http::Server;

/// A mock repository that answers by URL substring and records requests.
struct MockRepository {
    base_url: String,
    seen: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockRepository {
    /// Starts the mock with (url substring, status, body) routes.
    fn start(routes: Vec<(&'static str, u16, String)>) -> Self {
        let server = Server::http("127.0.0.1:0").expect("http server");
        let addr = server.server_addr();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        thread::spawn(move || {
            while let Ok(request) = server.recv() {
                let url = request.url().to_string();
                let method = request.method().as_str().to_string();
                seen_clone.lock().expect("seen lock").push((method, url.clone()));
                let route = routes.iter().find(|(pattern, _, _)| url.contains(pattern));
                let response = match route {
                    Some((_, status, body)) => Response::from_string(body.clone())
                        .with_status_code(tiny_http::StatusCode(*status))
                        .with_header(
                            Header::from_bytes("x-csrf-token", "test-token").unwrap(),
                        ),
                    None => Response::from_string("not scripted")
                        .with_status_code(tiny_http::StatusCode(404)),
                };
                let _ = request.respond(response);
            }
        });
        Self {
            base_url: format!("http://{addr}"),
            seen,
        }
    }

    fn client(&self, safety: SafetyPolicy) -> AdtClient {
        let config = Config::new(&self.base_url, "developer", "secret").with_safety(safety);
        AdtClient::from_transport(Transport::new(config).expect("transport"))
    }

    fn requests(&self) -> Vec<(String, String)> {
        self.seen.lock().expect("seen lock").clone()
    }
}

fn read_only() -> SafetyPolicy {
    SafetyPolicy::new(SafetyMode::ReadOnly)
}

fn dev_mode() -> SafetyPolicy {
    SafetyPolicy::new(SafetyMode::DevOnly)
}

/// Tests quick search decoding of object references.
#[tokio::test]
async fn search_decodes_object_references() {
    let search_body = r#"<?xml version="1.0" encoding="UTF-8"?>
<adtcore:objectReferences xmlns:adtcore="http://www.sap.com/adt/core">
  <adtcore:objectReference adtcore:uri="/sap/bc/adt/programs/programs/ztest" adtcore:type="PROG/P" adtcore:name="ZTEST" adtcore:packageName="$TMP"/>
</adtcore:objectReferences>"#;
    let mock = MockRepository::start(vec![(
        "informationsystem/search",
        200,
        search_body.to_string(),
    )]);
    let client = mock.client(read_only());

    let results = client.search_object("ZTEST*", 10).await.expect("search");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].name, "ZTEST");
    assert_eq!(results[0].object_type, "PROG/P");

    let requests = mock.requests();
    assert!(requests[0].1.contains("operation=quickSearch"));
    assert!(requests[0].1.contains("query=ZTEST*") || requests[0].1.contains("query=ZTEST%2A"));
    assert!(requests[0].1.contains("maxResults=10"));
}

/// Tests that lower-case program names request the upper-case path.
#[tokio::test]
async fn program_reads_normalize_names() {
    let source = "REPORT ztest.\nWRITE 'Hello World'.";
    let mock = MockRepository::start(vec![(
        "/programs/programs/ZTEST/source/main",
        200,
        source.to_string(),
    )]);
    let client = mock.client(read_only());

    let body = client.get_program("ztest").await.expect("program");
    assert_eq!(body, source);

    let requests = mock.requests();
    assert!(requests[0].1.contains("/programs/programs/ZTEST/source/main"));
}

/// Tests namespaced class names travel percent-encoded.
#[tokio::test]
async fn namespaced_class_reads_encode_separators() {
    let mock = MockRepository::start(vec![(
        "/oo/classes/%2FDMO%2FCL_X/source/main",
        200,
        "CLASS /dmo/cl_x DEFINITION.".to_string(),
    )]);
    let client = mock.client(read_only());

    let body = client.get_class_source("/DMO/CL_X").await.expect("class");
    assert!(body.contains("DEFINITION"));

    let requests = mock.requests();
    assert!(requests[0].1.contains("/oo/classes/%2FDMO%2FCL_X/source/main"));
}

/// Tests method extraction by structure line ranges.
#[tokio::test]
async fn class_method_source_extracts_line_range() {
    let structure = r#"<?xml version="1.0" encoding="UTF-8"?>
<abapsource:objectStructure xmlns:abapsource="http://www.sap.com/adt/abapsource" xmlns:adtcore="http://www.sap.com/adt/core">
<abapsource:objectStructureElement adtcore:name="MAIN" adtcore:type="CLAS/OM" abapsource:implementationStart="4" abapsource:implementationEnd="6"/>
<abapsource:objectStructureElement adtcore:name="EMPTY" adtcore:type="CLAS/OM" abapsource:implementationStart="0" abapsource:implementationEnd="0"/>
</abapsource:objectStructure>"#;
    let source = "CLASS zcl_demo DEFINITION.\nENDCLASS.\nCLASS zcl_demo IMPLEMENTATION.\n  METHOD main.\n    WRITE 'x'.\n  ENDMETHOD.\nENDCLASS.";
    let mock = MockRepository::start(vec![
        ("/objectstructure", 200, structure.to_string()),
        ("/oo/classes/ZCL_DEMO/source/main", 200, source.to_string()),
    ]);
    let client = mock.client(read_only());

    let method = client
        .get_class_method_source("zcl_demo", "main")
        .await
        .expect("method source");
    assert_eq!(method, "  METHOD main.\n    WRITE 'x'.\n  ENDMETHOD.");

    let missing = client.get_class_method_source("zcl_demo", "absent").await;
    assert!(missing.is_err());
    let unimplemented = client.get_class_method_source("zcl_demo", "empty").await;
    assert!(unimplemented.is_err());
}

/// Tests the write workflow: lock, update, unlock in order.
#[tokio::test]
async fn write_object_locks_updates_and_unlocks() {
    let lock_body = r#"<?xml version="1.0" encoding="utf-8"?>
<asx:abap xmlns:asx="http://www.sap.com/abapxml" version="1.0"><asx:values><DATA>
<LOCK_HANDLE>H-1234</LOCK_HANDLE><CORRNR>TRLK900001</CORRNR>
</DATA></asx:values></asx:abap>"#;
    let mock = MockRepository::start(vec![
        ("_action=LOCK", 200, lock_body.to_string()),
        ("_action=UNLOCK", 200, String::new()),
        ("lockHandle=H-1234", 200, String::new()),
        ("/sap/bc/adt/discovery", 200, "<discovery/>".to_string()),
    ]);
    let client = mock.client(dev_mode());

    let identity = ObjectIdentity::new(ObjectKind::Program, "ztest");
    let sources = vec![("main".to_string(), "REPORT ztest.".to_string())];
    let result = client
        .write_object(&identity, &sources, &adt_bridge_client::WriteOptions::default())
        .await
        .expect("write");
    assert_eq!(result.updated_includes, vec!["main".to_string()]);
    assert!(!result.activated);

    // Lock released: no lock URI left in the registry.
    assert!(client.held_locks().is_empty());

    let requests = mock.requests();
    let lock_index = requests
        .iter()
        .position(|(_, url)| url.contains("_action=LOCK"))
        .expect("lock request");
    let put_index = requests
        .iter()
        .position(|(method, url)| method == "PUT" && url.contains("lockHandle=H-1234"))
        .expect("update request");
    let unlock_index = requests
        .iter()
        .position(|(_, url)| url.contains("_action=UNLOCK"))
        .expect("unlock request");
    assert!(lock_index < put_index);
    assert!(put_index < unlock_index);
}

/// Tests that a failed update still releases the lock.
#[tokio::test]
async fn failed_update_still_unlocks() {
    let lock_body = r#"<asx:abap xmlns:asx="http://www.sap.com/abapxml"><asx:values><DATA>
<LOCK_HANDLE>H-FAIL</LOCK_HANDLE>
</DATA></asx:values></asx:abap>"#;
    let mock = MockRepository::start(vec![
        ("_action=LOCK", 200, lock_body.to_string()),
        ("_action=UNLOCK", 200, String::new()),
        ("lockHandle=H-FAIL", 500, "update exploded".to_string()),
        ("/sap/bc/adt/discovery", 200, "<discovery/>".to_string()),
    ]);
    let client = mock.client(dev_mode());

    let identity = ObjectIdentity::new(ObjectKind::Program, "ztest");
    let sources = vec![("main".to_string(), "REPORT ztest.".to_string())];
    let err = client
        .write_object(&identity, &sources, &adt_bridge_client::WriteOptions::default())
        .await
        .expect_err("update failure");
    assert!(matches!(err, adt_bridge_client::AdtError::UpdateFailed { .. }));

    let requests = mock.requests();
    assert!(requests.iter().any(|(_, url)| url.contains("_action=UNLOCK")));
    assert!(client.held_locks().is_empty());
}

/// Tests that read-only policies stop reads of nothing but writes.
#[tokio::test]
async fn read_only_policy_blocks_writes_before_the_wire() {
    let mock = MockRepository::start(vec![(
        "/programs/programs/ZTEST/source/main",
        200,
        "REPORT ztest.".to_string(),
    )]);
    let client = mock.client(read_only());

    let identity = ObjectIdentity::new(ObjectKind::Program, "ztest");
    let sources = vec![("main".to_string(), "REPORT ztest.".to_string())];
    let err = client
        .write_object(&identity, &sources, &adt_bridge_client::WriteOptions::default())
        .await
        .expect_err("policy denial");
    assert!(matches!(err, adt_bridge_client::AdtError::Policy(_)));

    // The denial happened before any request was issued.
    assert!(mock.requests().is_empty());

    // Reads still pass.
    let body = client.get_program("ztest").await.expect("read");
    assert!(body.contains("REPORT"));
}

/// Tests the empty-body package read.
#[tokio::test]
async fn empty_package_listing_is_valid() {
    let mock = MockRepository::start(vec![
        ("/sap/bc/adt/discovery", 200, "<discovery/>".to_string()),
        ("nodestructure", 200, String::new()),
    ]);
    let client = mock.client(read_only());

    let content = client.get_package("znew_pkg").await.expect("package");
    assert_eq!(content.name, "ZNEW_PKG");
    assert!(content.objects.is_empty());
    assert!(content.sub_packages.is_empty());
}
