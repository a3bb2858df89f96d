// crates/adt-bridge-client/src/error.rs
// ============================================================================
// Module: Client Errors
// Description: Operation-level error type for repository and debugger calls.
// Purpose: Fold transport, codec, and workflow failures into one taxonomy.
// Dependencies: adt-bridge-core, thiserror
// ============================================================================

//! ## Overview
//! [`AdtError`] is the error type returned by every client operation. It
//! wraps the transport and codec errors and adds the workflow failures of
//! the lifecycle engine. [`AdtError::kind`] maps each variant onto the
//! stable cross-crate [`ErrorKind`] labels used by response envelopes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use adt_bridge_core::ErrorKind;
use adt_bridge_core::PolicyError;
use thiserror::Error;

use crate::lifecycle::ActivationMessage;
use crate::transport::TransportError;
use crate::xml::CodecError;

// ============================================================================
// SECTION: Error Type
// ============================================================================

/// Errors returned by repository, debugger, and analysis operations.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Lifecycle variants carry enough context for manual recovery.
#[derive(Debug, Error)]
pub enum AdtError {
    /// The safety policy refused the operation.
    #[error(transparent)]
    Policy(#[from] PolicyError),
    /// The transport reported a failure.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// A payload failed to decode.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// Caller-supplied parameters were out of shape.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// A requested sub-entity does not exist.
    #[error("{entity} not found in {container}")]
    MissingEntity {
        /// Missing entity description (method name, include tag).
        entity: String,
        /// Containing object name.
        container: String,
    },
    /// A method's recorded line range exceeds the fetched source.
    #[error("line range {start}..{end} exceeds source of {lines} lines")]
    LineRangeOutOfBounds {
        /// First line of the range (1-based).
        start: u32,
        /// Last line of the range (inclusive).
        end: u32,
        /// Number of lines in the fetched source.
        lines: u32,
    },
    /// The object is locked by another user.
    #[error("{object} is locked by {user}")]
    LockedByOther {
        /// Object name.
        object: String,
        /// Holder reported by the repository.
        user: String,
    },
    /// An object is already locked by this process.
    #[error("{object} is already locked by this process")]
    AlreadyLocked {
        /// Object name.
        object: String,
    },
    /// A source update failed mid-way through a multi-include write.
    #[error("update of include {include} failed: {reason}")]
    UpdateFailed {
        /// Include whose update failed.
        include: String,
        /// Includes already written before the failure.
        partial_success: Vec<String>,
        /// Underlying failure description.
        reason: String,
    },
    /// Activation reported error diagnostics.
    #[error("activation of {object} failed with {n} error(s)", n = .messages.len())]
    ActivationFailed {
        /// Object name.
        object: String,
        /// Activation diagnostics returned by the repository.
        messages: Vec<ActivationMessage>,
    },
    /// A lock could not be released and needs manual recovery.
    #[error("lock {handle} on {object} could not be released: {reason}")]
    StuckLock {
        /// Object name.
        object: String,
        /// Lock handle for manual recovery.
        handle: String,
        /// Underlying failure description.
        reason: String,
    },
    /// The operation was cancelled; any held lock was released.
    #[error("operation cancelled: {0}")]
    Cancelled(String),
}

impl AdtError {
    /// Maps the error onto the stable envelope taxonomy.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Policy(_) => ErrorKind::PermissionDenied,
            Self::Transport(err) => err.kind(),
            Self::Codec(_) | Self::LineRangeOutOfBounds { .. } => ErrorKind::Malformed,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::MissingEntity { .. } => ErrorKind::NotFound,
            Self::LockedByOther { .. } | Self::AlreadyLocked { .. } => ErrorKind::Conflict,
            Self::UpdateFailed { .. } | Self::ActivationFailed { .. } => {
                ErrorKind::InconsistentState
            }
            Self::StuckLock { .. } => ErrorKind::StuckLock,
            Self::Cancelled(_) => ErrorKind::Cancelled,
        }
    }
}
