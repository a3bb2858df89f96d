// crates/adt-bridge-daemon/src/lib.rs
// ============================================================================
// Module: ADT Bridge Daemon
// Description: Local HTTP daemon for sticky external-debugger sessions.
// Purpose: Reshape stateless tool invocations into one owned session.
// Dependencies: adt-bridge-client, axum, tokio
// ============================================================================

//! ## Overview
//! Every debugger call after an attach must reach the same SAP work
//! process, which ties it to one cookie jar. The daemon is the single
//! owner of that jar: it runs the listener in the background, attaches
//! automatically, and lets short-lived callers step and inspect through a
//! small JSON API on loopback.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod server;
pub mod session;
pub mod telemetry;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::DaemonAuditEvent;
pub use audit::DaemonAuditSink;
pub use audit::FileAuditSink;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use server::DaemonConfig;
pub use server::DaemonError;
pub use server::DebugDaemon;
pub use session::DebugSession;
pub use session::SessionStatus;
pub use telemetry::DaemonMetricEvent;
pub use telemetry::DaemonMetrics;
pub use telemetry::DaemonOutcome;
pub use telemetry::NoopMetrics;
