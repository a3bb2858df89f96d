// crates/adt-bridge-core/src/error.rs
// ============================================================================
// Module: Error Kind Labels
// Description: Stable error kind labels shared by tool envelopes and audits.
// Purpose: Map subsystem failures onto one cross-crate taxonomy.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Subsystems keep their own error enums; this module provides the one
//! shared classification used by response envelopes and audit events so
//! callers can branch on a stable `kind` label instead of error text.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Error Kinds
// ============================================================================

/// Stable failure classification for response envelopes.
///
/// # Invariants
/// - Labels are stable for programmatic handling and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Caller-supplied parameters were out of shape.
    InvalidArgument,
    /// The safety policy refused the operation.
    PermissionDenied,
    /// The object or sub-entity does not exist.
    NotFound,
    /// The operation conflicted with current repository state.
    Conflict,
    /// The deadline elapsed or the caller cancelled.
    Cancelled,
    /// The upstream system reported an unexpected status.
    Upstream,
    /// A payload failed to decode.
    Malformed,
    /// The repository was left in an unexpected state.
    InconsistentState,
    /// A lock could not be released and needs manual recovery.
    StuckLock,
}

impl ErrorKind {
    /// Returns the stable label for this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidArgument => "invalid_argument",
            Self::PermissionDenied => "permission_denied",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Cancelled => "cancelled",
            Self::Upstream => "upstream",
            Self::Malformed => "malformed",
            Self::InconsistentState => "inconsistent_state",
            Self::StuckLock => "stuck_lock",
        }
    }
}
