// crates/adt-bridge-daemon/src/session.rs
// ============================================================================
// Module: Debug Session State
// Description: Single-slot debug session with its status state machine.
// Purpose: Keep sticky session state across short-lived daemon callers.
// Dependencies: adt-bridge-client, serde
// ============================================================================

//! ## Overview
//! The daemon holds at most one debug session. The session walks a fixed
//! status machine: `waiting` until the listener returns, then `caught`,
//! `attached` (or `attach_failed`), `stepping` during steps, and finally
//! `stopped`, `timeout`, or `error`. A second session may only start once
//! the current one reached a terminal status.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::SystemTime;

use adt_bridge_client::Breakpoint;
use adt_bridge_client::DebugStackEntry;
use adt_bridge_client::DebugVariable;
use serde::Serialize;

// ============================================================================
// SECTION: Status
// ============================================================================

/// Status of the daemon's debug session.
///
/// # Invariants
/// - Labels are stable for daemon clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Listener is long-polling for a debuggee.
    Waiting,
    /// A debuggee was caught and attach is underway.
    Caught,
    /// Attached; stepping and inspection are available.
    Attached,
    /// Attach failed; the session is terminal.
    AttachFailed,
    /// A stepping operation is in flight.
    Stepping,
    /// The session was stopped by the caller.
    Stopped,
    /// The listener or a debugger call failed.
    Error,
    /// The listener elapsed without catching a debuggee.
    Timeout,
}

impl SessionStatus {
    /// Returns true for states that allow starting a new session.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::AttachFailed | Self::Stopped | Self::Error | Self::Timeout)
    }

    /// Returns true when stepping and inspection calls are allowed.
    #[must_use]
    pub const fn is_attached(self) -> bool {
        matches!(self, Self::Attached | Self::Stepping)
    }
}

// ============================================================================
// SECTION: Session
// ============================================================================

/// Snapshot of the daemon's debug session.
#[derive(Debug, Clone, Serialize)]
pub struct DebugSession {
    /// Session identifier.
    pub id: String,
    /// Current status.
    pub status: SessionStatus,
    /// Debugged user.
    pub user: String,
    /// Session start time.
    pub start_time: SystemTime,
    /// Caught debuggee identifier, once available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debuggee_id: Option<String>,
    /// Source URI of the current position.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_uri: Option<String>,
    /// Line of the current position.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_line: Option<u32>,
    /// Breakpoints created through this daemon.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub breakpoints: Vec<Breakpoint>,
    /// Last fetched call stack.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub stack: Vec<DebugStackEntry>,
    /// Last fetched variables.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<DebugVariable>,
    /// Failure description for error states.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DebugSession {
    /// Creates a fresh waiting session for a user.
    #[must_use]
    pub fn waiting(id: String, user: String) -> Self {
        Self {
            id,
            status: SessionStatus::Waiting,
            user,
            start_time: SystemTime::now(),
            debuggee_id: None,
            current_uri: None,
            current_line: None,
            breakpoints: Vec::new(),
            stack: Vec::new(),
            variables: Vec::new(),
            error: None,
        }
    }

    /// Records the current position from the innermost stack frame.
    pub fn update_position(&mut self, stack: Vec<DebugStackEntry>) {
        if let Some(frame) = stack.first() {
            self.current_uri = Some(frame.uri.clone());
            self.current_line = Some(frame.line);
        }
        self.stack = stack;
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
