// crates/adt-bridge-client/src/client.rs
// ============================================================================
// Module: ADT Client
// Description: Entry point bundling transport, policy, and lock registry.
// Purpose: Host the typed operation surface defined across the op modules.
// Dependencies: adt-bridge-core
// ============================================================================

//! ## Overview
//! [`AdtClient`] owns one [`Transport`] (and with it one cookie jar and
//! CSRF token) plus the process-local lock registry. The operation surface
//! lives in the sibling modules; each operation consults the embedded
//! safety policy before it touches the wire.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;

use adt_bridge_core::Config;
use adt_bridge_core::OperationClass;

use crate::error::AdtError;
use crate::transport::Transport;

// ============================================================================
// SECTION: Client
// ============================================================================

/// Typed client for one SAP system.
///
/// # Invariants
/// - One transport (and therefore one sticky session) per client.
/// - `active_locks` holds the source URIs this process currently locks;
///   at most one lock per object is permitted.
pub struct AdtClient {
    /// Session-bearing transport.
    transport: Arc<Transport>,
    /// Source URIs locked by this process.
    pub(crate) active_locks: Mutex<BTreeSet<String>>,
}

impl AdtClient {
    /// Builds a client for the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AdtError`] when the configuration or HTTP client is
    /// invalid.
    pub fn new(config: Config) -> Result<Self, AdtError> {
        config
            .validate()
            .map_err(AdtError::InvalidArgument)?;
        let transport = Transport::new(config)?;
        Ok(Self::from_transport(transport))
    }

    /// Builds a client around an existing transport.
    #[must_use]
    pub fn from_transport(transport: Transport) -> Self {
        Self {
            transport: Arc::new(transport),
            active_locks: Mutex::new(BTreeSet::new()),
        }
    }

    /// Returns the underlying transport.
    #[must_use]
    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Returns a shared handle to the underlying transport.
    #[must_use]
    pub fn transport_handle(&self) -> Arc<Transport> {
        Arc::clone(&self.transport)
    }

    /// Returns the connection configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        self.transport.config()
    }

    /// Checks the safety policy for an operation class and target.
    ///
    /// # Errors
    ///
    /// Returns [`AdtError::Policy`] when the policy denies the operation.
    pub(crate) fn check(&self, class: OperationClass, target: &str) -> Result<(), AdtError> {
        self.config().safety.check_operation(class, target)?;
        Ok(())
    }

    /// Returns the source URIs currently locked by this process.
    #[must_use]
    pub fn held_locks(&self) -> Vec<String> {
        self.active_locks
            .lock()
            .map(|locks| locks.iter().cloned().collect())
            .unwrap_or_default()
    }
}
