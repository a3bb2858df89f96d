// crates/adt-bridge-daemon/src/audit.rs
// ============================================================================
// Module: Daemon Audit Logging
// Description: Structured audit events and sinks for daemon requests.
// Purpose: Emit JSON-line request records without hard logging dependencies.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! The daemon logs one JSON line per handled request. Sinks are a small
//! trait so deployments can route records into their preferred pipeline;
//! the built-in sinks write to stderr or an append-only file.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

// ============================================================================
// SECTION: Types
// ============================================================================

/// One handled daemon request.
#[derive(Debug, Clone, Serialize)]
pub struct DaemonAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Request method.
    pub method: String,
    /// Request path.
    pub path: String,
    /// Response status code.
    pub status: u16,
    /// Handling latency in milliseconds.
    pub latency_ms: u128,
}

impl DaemonAuditEvent {
    /// Creates an event stamped with the current time.
    #[must_use]
    pub fn new(method: String, path: String, status: u16, latency_ms: u128) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        Self {
            event: "daemon_request",
            timestamp_ms,
            method,
            path,
            status,
            latency_ms,
        }
    }
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink for daemon request events.
pub trait DaemonAuditSink: Send + Sync {
    /// Records one event.
    fn record(&self, event: &DaemonAuditEvent);
}

/// Sink writing JSON lines to stderr.
pub struct StderrAuditSink;

impl DaemonAuditSink for StderrAuditSink {
    fn record(&self, event: &DaemonAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(io::stderr(), "{payload}");
        }
    }
}

/// Sink writing JSON lines to an append-only file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl DaemonAuditSink for FileAuditSink {
    fn record(&self, event: &DaemonAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// Sink that discards every event.
pub struct NoopAuditSink;

impl DaemonAuditSink for NoopAuditSink {
    fn record(&self, _event: &DaemonAuditEvent) {}
}
