// crates/adt-bridge-client/src/lifecycle.rs
// ============================================================================
// Module: Object Lifecycle Engine
// Description: Lock, write, activate, and unlock workflow with compensation.
// Purpose: Guarantee lock release on every exit path of a write workflow.
// Dependencies: adt-bridge-core, tokio
// ============================================================================

//! ## Overview
//! The lifecycle engine drives the write workflow:
//! lock, optional create, per-include source update, optional activation,
//! unlock. Invariants:
//! - A lock acquired here is released on every exit path, including
//!   cancellation, using a fresh short deadline instead of the caller's
//!   (possibly already expired) one.
//! - Includes are written in caller order; the first failure halts the
//!   remaining updates and reports the includes already written.
//! - A failed unlock after another failure surfaces as a stuck lock naming
//!   the handle for manual recovery.
//! - At most one active lock per object per process.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;
use std::time::SystemTime;

use adt_bridge_core::ClassInclude;
use adt_bridge_core::ObjectIdentity;
use adt_bridge_core::ObjectKind;
use adt_bridge_core::OperationClass;
use adt_bridge_core::addressing::class_include_uri;
use adt_bridge_core::normalize_object_name;
use adt_bridge_core::object_source_uri;
use adt_bridge_core::object_uri;
use serde::Deserialize;
use serde::Serialize;

use crate::client::AdtClient;
use crate::error::AdtError;
use crate::transport::RequestOptions;
use crate::transport::TransportError;
use crate::xml::escape_attribute;
use crate::xml::parse_tolerant;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Cleanup budget for compensating unlocks after failures or cancellation.
const UNLOCK_CLEANUP_BUDGET: Duration = Duration::from_secs(10);

// ============================================================================
// SECTION: Types
// ============================================================================

/// A held repository lock.
///
/// # Invariants
/// - `handle` is the opaque server-issued lock handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lock {
    /// Locked object identity.
    pub object: ObjectIdentity,
    /// Opaque lock handle granting exclusive write access.
    pub handle: String,
    /// Transport request bound to the lock, when the server reports one.
    pub transport_request: Option<String>,
    /// Acquisition timestamp.
    pub acquired_at: SystemTime,
}

/// Options for a write workflow.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WriteOptions {
    /// Create the object first when it does not exist.
    #[serde(default)]
    pub create_if_missing: bool,
    /// Transport request to record changes on.
    #[serde(default)]
    pub transport: Option<String>,
    /// Activate the object after the sources are written.
    #[serde(default)]
    pub activate: bool,
    /// Package for object creation.
    #[serde(default)]
    pub package: Option<String>,
}

/// Result of a completed write workflow.
#[derive(Debug, Clone, Serialize)]
pub struct WriteResult {
    /// Written object identity.
    pub object: ObjectIdentity,
    /// Includes written, in caller order.
    pub updated_includes: Vec<String>,
    /// True when the object was created by this workflow.
    pub created: bool,
    /// True when activation ran and reported no errors.
    pub activated: bool,
    /// Activation diagnostics (warnings survive a successful activation).
    pub activation_messages: Vec<ActivationMessage>,
}

/// One diagnostic message from an activation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivationMessage {
    /// URI of the offending object or include.
    pub uri: String,
    /// Message type (`E` marks an error).
    pub message_type: String,
    /// Message text.
    pub text: String,
    /// Offending source line, when reported.
    pub line: Option<u32>,
}

impl ActivationMessage {
    /// Returns true when the message marks an activation error.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.message_type.eq_ignore_ascii_case("E")
    }
}

// ============================================================================
// SECTION: Lock Guard
// ============================================================================

/// Releases a lock when dropped without being disarmed.
///
/// The guard spawns the compensating unlock on the runtime so the release
/// also happens when the owning future is cancelled mid-workflow. The
/// spawned release runs under its own short deadline.
struct LockGuard {
    /// Transport used for the compensating unlock.
    transport: std::sync::Arc<crate::transport::Transport>,
    /// Locked object's lock URL (without the action query).
    lock_url: String,
    /// Lock handle to release.
    handle: String,
    /// True once the workflow released the lock itself.
    disarmed: bool,
}

impl LockGuard {
    const fn new(
        transport: std::sync::Arc<crate::transport::Transport>,
        lock_url: String,
        handle: String,
    ) -> Self {
        Self {
            transport,
            lock_url,
            handle,
            disarmed: false,
        }
    }

    /// Disarms the guard after an explicit unlock.
    const fn disarm(&mut self) {
        self.disarmed = true;
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.disarmed {
            return;
        }
        let transport = std::sync::Arc::clone(&self.transport);
        let lock_url = self.lock_url.clone();
        let handle = self.handle.clone();
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                let options = RequestOptions::post()
                    .with_query("_action", "UNLOCK")
                    .with_query("lockHandle", &handle)
                    .stateful();
                let _ = tokio::time::timeout(
                    UNLOCK_CLEANUP_BUDGET,
                    transport.request(&lock_url, options),
                )
                .await;
            });
        }
    }
}

// ============================================================================
// SECTION: Lock Operations
// ============================================================================

impl AdtClient {
    /// Acquires a modify lock on an object.
    ///
    /// # Errors
    ///
    /// Returns [`AdtError::AlreadyLocked`] when this process already holds
    /// a lock on the object, [`AdtError::LockedByOther`] when the
    /// repository reports a foreign lock, and transport failures otherwise.
    pub async fn lock_object(&self, identity: &ObjectIdentity) -> Result<Lock, AdtError> {
        self.check(OperationClass::Lock, &identity.name)?;
        let lock_url = lock_url(identity);
        {
            let Ok(mut locks) = self.active_locks.lock() else {
                return Err(AdtError::InvalidArgument("lock registry poisoned".to_string()));
            };
            if !locks.insert(lock_url.clone()) {
                return Err(AdtError::AlreadyLocked {
                    object: identity.name.clone(),
                });
            }
        }
        let options = RequestOptions::post()
            .with_query("_action", "LOCK")
            .with_query("accessMode", "MODIFY")
            .with_accept("application/xml")
            .stateful();
        let response = match self.transport().request(&lock_url, options).await {
            Ok(response) => response,
            Err(err) => {
                self.forget_lock(&lock_url);
                return Err(map_lock_error(identity, err));
            }
        };
        let tree = parse_tolerant(&response.body)?;
        let handle = tree
            .find_first("LOCK_HANDLE")
            .map(|element| element.text.trim().to_string())
            .filter(|handle| !handle.is_empty());
        let Some(handle) = handle else {
            self.forget_lock(&lock_url);
            return Err(AdtError::InvalidArgument(
                "lock response carried no lock handle".to_string(),
            ));
        };
        let transport_request = tree
            .find_first("CORRNR")
            .map(|element| element.text.trim().to_string())
            .filter(|value| !value.is_empty());
        Ok(Lock {
            object: identity.clone(),
            handle,
            transport_request,
            acquired_at: SystemTime::now(),
        })
    }

    /// Releases a lock acquired by this process.
    ///
    /// # Errors
    ///
    /// Returns [`AdtError`] when the unlock request fails.
    pub async fn unlock_object(
        &self,
        identity: &ObjectIdentity,
        lock_handle: &str,
    ) -> Result<(), AdtError> {
        self.check(OperationClass::Lock, &identity.name)?;
        let lock_url = lock_url(identity);
        let options = RequestOptions::post()
            .with_query("_action", "UNLOCK")
            .with_query("lockHandle", lock_handle)
            .stateful();
        let result = self.transport().request(&lock_url, options).await;
        self.forget_lock(&lock_url);
        result?;
        Ok(())
    }

    /// Drops a lock URL from the process registry.
    fn forget_lock(&self, lock_url: &str) {
        if let Ok(mut locks) = self.active_locks.lock() {
            locks.remove(lock_url);
        }
    }

    // ========================================================================
    // SECTION: Source Updates
    // ========================================================================

    /// Writes one include's source under a caller-held lock.
    ///
    /// # Errors
    ///
    /// Returns [`AdtError`] for policy denials and transport failures.
    pub async fn update_source(
        &self,
        identity: &ObjectIdentity,
        include: &str,
        source: &str,
        lock_handle: &str,
    ) -> Result<(), AdtError> {
        self.check(OperationClass::Write, &identity.name)?;
        let path = include_source_path(identity, include)?;
        let options = RequestOptions::put()
            .with_query("lockHandle", lock_handle)
            .with_accept("text/plain")
            .with_body("text/plain; charset=utf-8", source.as_bytes().to_vec())
            .stateful();
        self.transport().request(&path, options).await?;
        Ok(())
    }

    /// Thin alias of [`AdtClient::update_source`] for single-include edits.
    ///
    /// # Errors
    ///
    /// Returns [`AdtError`] for policy denials and transport failures.
    pub async fn edit_source(
        &self,
        identity: &ObjectIdentity,
        include: &str,
        source: &str,
        lock_handle: &str,
    ) -> Result<(), AdtError> {
        self.update_source(identity, include, source, lock_handle).await
    }

    // ========================================================================
    // SECTION: Create and Activate
    // ========================================================================

    /// Creates a repository object in the given package.
    ///
    /// # Errors
    ///
    /// Returns [`AdtError`] for policy denials, unsupported kinds, and
    /// transport failures.
    pub async fn create_object(
        &self,
        kind: ObjectKind,
        name: &str,
        package: &str,
        description: &str,
    ) -> Result<(), AdtError> {
        self.check(OperationClass::Create, name)?;
        self.config().safety.check_package(package)?;
        let normalized = normalize_object_name(name);
        let (collection, body) = creation_payload(kind, &normalized, package, description)?;
        let options = RequestOptions::post()
            .with_accept("application/xml")
            .with_body("application/xml", body.into_bytes());
        self.transport().request(collection, options).await?;
        Ok(())
    }

    /// Ensures the test class include of a class exists.
    ///
    /// # Errors
    ///
    /// Returns [`AdtError`] for policy denials and transport failures other
    /// than "already exists" conflicts, which are treated as success.
    pub async fn ensure_testclass_include(&self, class: &str) -> Result<(), AdtError> {
        self.check(OperationClass::Create, class)?;
        let path = format!("{}/includes", object_uri(ObjectKind::Class, class, None));
        let options = RequestOptions::post()
            .with_query("includeType", "testclasses")
            .with_accept("application/xml");
        match self.transport().request(&path, options).await {
            Ok(_) => Ok(()),
            Err(TransportError::Conflict { .. }) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Activates an object and returns the diagnostics.
    ///
    /// # Errors
    ///
    /// Returns [`AdtError::ActivationFailed`] when any diagnostic is an
    /// error, and transport failures otherwise. Warnings are returned with
    /// the success.
    pub async fn activate_object(
        &self,
        identity: &ObjectIdentity,
    ) -> Result<Vec<ActivationMessage>, AdtError> {
        self.check(OperationClass::Write, &identity.name)?;
        let reference_uri = object_uri(identity.kind, &identity.name, identity.parent.as_deref());
        let body = format!(
            concat!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
                "<adtcore:objectReferences xmlns:adtcore=\"http://www.sap.com/adt/core\">\n",
                "<adtcore:objectReference adtcore:uri=\"{uri}\" adtcore:name=\"{name}\"/>\n",
                "</adtcore:objectReferences>",
            ),
            uri = reference_uri,
            name = escape_attribute(&identity.name)
        );
        let options = RequestOptions::post()
            .with_query("method", "activate")
            .with_query("preauditRequested", "true")
            .with_accept("application/xml")
            .with_body("application/xml", body.into_bytes());
        let response = self.transport().request("/sap/bc/adt/activation", options).await?;
        let messages = decode_activation_messages(&response.body)?;
        if messages.iter().any(ActivationMessage::is_error) {
            return Err(AdtError::ActivationFailed {
                object: identity.name.clone(),
                messages,
            });
        }
        Ok(messages)
    }

    // ========================================================================
    // SECTION: Write Workflow
    // ========================================================================

    /// Runs the full write workflow over one object.
    ///
    /// Sources are written in the order given; class identities accept the
    /// include tags of [`ClassInclude`], every other kind accepts only
    /// `main`. Compensation rules:
    /// - a creation failure aborts before any lock is taken;
    /// - an update failure unlocks and reports the includes already
    ///   written;
    /// - an activation failure still unlocks and carries the diagnostics;
    /// - an unlock failure after another failure surfaces as a stuck lock.
    ///
    /// # Errors
    ///
    /// Returns [`AdtError`] per the compensation rules above.
    pub async fn write_object(
        &self,
        identity: &ObjectIdentity,
        sources: &[(String, String)],
        options: &WriteOptions,
    ) -> Result<WriteResult, AdtError> {
        self.check(OperationClass::Write, &identity.name)?;
        if sources.is_empty() {
            return Err(AdtError::InvalidArgument("no sources supplied".to_string()));
        }
        for (include, _) in sources {
            validate_include_tag(identity, include)?;
        }

        let mut created = false;
        if options.create_if_missing && !self.object_exists(identity).await? {
            let package = options.package.as_deref().ok_or_else(|| {
                AdtError::InvalidArgument("create_if_missing requires a package".to_string())
            })?;
            self.create_object(identity.kind, &identity.name, package, "").await?;
            created = true;
        }
        if identity.kind == ObjectKind::Class
            && sources.iter().any(|(include, _)| include == "testclasses")
        {
            self.ensure_testclass_include(&identity.name).await?;
        }

        let lock = self.lock_object(identity).await?;
        let mut guard = LockGuard::new(
            self.transport_handle(),
            lock_url(identity),
            lock.handle.clone(),
        );

        let mut updated_includes = Vec::new();
        for (include, source) in sources {
            if let Err(err) = self.update_source(identity, include, source, &lock.handle).await {
                let unlock_result = self.release_with_budget(identity, &lock.handle).await;
                guard.disarm();
                return Err(match unlock_result {
                    Ok(()) => AdtError::UpdateFailed {
                        include: include.clone(),
                        partial_success: updated_includes,
                        reason: err.to_string(),
                    },
                    Err(unlock_err) => AdtError::StuckLock {
                        object: identity.name.clone(),
                        handle: lock.handle.clone(),
                        reason: format!(
                            "update of include {include} failed ({err}); unlock also failed ({unlock_err})"
                        ),
                    },
                });
            }
            updated_includes.push(include.clone());
        }

        let mut activated = false;
        let mut activation_messages = Vec::new();
        if options.activate {
            match self.activate_object(identity).await {
                Ok(messages) => {
                    activated = true;
                    activation_messages = messages;
                }
                Err(err) => {
                    let unlock_result = self.release_with_budget(identity, &lock.handle).await;
                    guard.disarm();
                    return Err(match unlock_result {
                        Ok(()) => err,
                        Err(unlock_err) => AdtError::StuckLock {
                            object: identity.name.clone(),
                            handle: lock.handle.clone(),
                            reason: format!(
                                "activation failed ({err}); unlock also failed ({unlock_err})"
                            ),
                        },
                    });
                }
            }
        }

        let unlock_result = self.release_with_budget(identity, &lock.handle).await;
        guard.disarm();
        unlock_result.map_err(|unlock_err| AdtError::StuckLock {
            object: identity.name.clone(),
            handle: lock.handle.clone(),
            reason: format!("unlock after successful write failed ({unlock_err})"),
        })?;

        Ok(WriteResult {
            object: identity.clone(),
            updated_includes,
            created,
            activated,
            activation_messages,
        })
    }

    /// Updates, inserts, or deletes message-class records surgically.
    ///
    /// The stored document is fetched, edited with anchored text
    /// operations (the server rejects re-serialized documents), and
    /// written back under a lock. Inserted records carry the lock handle,
    /// as the server requires for new records.
    ///
    /// # Errors
    ///
    /// Returns [`AdtError`] per the lifecycle compensation rules; a failed
    /// unlock after a failed write surfaces as a stuck lock.
    pub async fn update_message_class(
        &self,
        name: &str,
        updates: &std::collections::BTreeMap<String, String>,
    ) -> Result<crate::xml::MessageClassEdit, AdtError> {
        self.check(OperationClass::Write, name)?;
        let identity = ObjectIdentity::new(ObjectKind::MessageClass, name);
        let document = self.get_message_class_document(name).await?;

        let lock = self.lock_object(&identity).await?;
        let mut guard = LockGuard::new(
            self.transport_handle(),
            lock_url(&identity),
            lock.handle.clone(),
        );

        let mut lock_handles = std::collections::BTreeMap::new();
        for msgno in updates.keys() {
            lock_handles.insert(msgno.clone(), lock.handle.clone());
        }
        let write_result = match crate::xml::modify_message_class_xml(
            &document,
            updates,
            &lock_handles,
        ) {
            Ok(edit) => {
                let path = object_uri(ObjectKind::MessageClass, name, None);
                let options = RequestOptions::put()
                    .with_query("lockHandle", &lock.handle)
                    .with_accept("application/xml")
                    .with_body(
                        "application/vnd.sap.adt.mc.messageclass+xml",
                        edit.document.clone(),
                    )
                    .stateful();
                match self.transport().request(&path, options).await {
                    Ok(_) => Ok(edit),
                    Err(err) => Err(AdtError::from(err)),
                }
            }
            Err(err) => Err(AdtError::from(err)),
        };

        let unlock_result = self.release_with_budget(&identity, &lock.handle).await;
        guard.disarm();
        match (write_result, unlock_result) {
            (Ok(edit), Ok(())) => Ok(edit),
            (Ok(_), Err(unlock_err)) => Err(AdtError::StuckLock {
                object: identity.name.clone(),
                handle: lock.handle,
                reason: format!("unlock after message update failed ({unlock_err})"),
            }),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(unlock_err)) => Err(AdtError::StuckLock {
                object: identity.name.clone(),
                handle: lock.handle,
                reason: format!(
                    "message update failed ({err}); unlock also failed ({unlock_err})"
                ),
            }),
        }
    }

    /// Probes whether an object exists (a source read that is not 404).
    async fn object_exists(&self, identity: &ObjectIdentity) -> Result<bool, AdtError> {
        let path = object_source_uri(identity.kind, &identity.name, identity.parent.as_deref());
        let options = RequestOptions::get().with_accept("text/plain");
        match self.transport().request(&path, options).await {
            Ok(_) => Ok(true),
            Err(TransportError::NotFound { .. }) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// Unlocks under the compensation budget rather than the caller's
    /// deadline.
    async fn release_with_budget(
        &self,
        identity: &ObjectIdentity,
        lock_handle: &str,
    ) -> Result<(), AdtError> {
        match tokio::time::timeout(
            UNLOCK_CLEANUP_BUDGET,
            self.unlock_object(identity, lock_handle),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(AdtError::Cancelled("unlock cleanup budget elapsed".to_string())),
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the URL used for lock and unlock actions on an object.
fn lock_url(identity: &ObjectIdentity) -> String {
    object_uri(identity.kind, &identity.name, identity.parent.as_deref())
}

/// Returns the source path for one include of an object.
fn include_source_path(identity: &ObjectIdentity, include: &str) -> Result<String, AdtError> {
    if identity.kind == ObjectKind::Class {
        let include = ClassInclude::parse(include).ok_or_else(|| {
            AdtError::InvalidArgument(format!("unknown class include: {include}"))
        })?;
        return Ok(class_include_uri(&identity.name, include));
    }
    if include != "main" {
        return Err(AdtError::InvalidArgument(format!(
            "{} objects have only a main source",
            identity.kind
        )));
    }
    Ok(object_source_uri(identity.kind, &identity.name, identity.parent.as_deref()))
}

/// Validates an include tag for the target kind.
fn validate_include_tag(identity: &ObjectIdentity, include: &str) -> Result<(), AdtError> {
    include_source_path(identity, include).map(|_| ())
}

/// Maps a lock transport failure onto the lock error taxonomy.
fn map_lock_error(identity: &ObjectIdentity, err: TransportError) -> AdtError {
    if let TransportError::Conflict { body_prefix, .. } = &err
        && let Some(user) = locked_by_user(body_prefix)
    {
        return AdtError::LockedByOther {
            object: identity.name.clone(),
            user,
        };
    }
    err.into()
}

/// Extracts the lock holder from a conflict body, when the server names one.
fn locked_by_user(body: &str) -> Option<String> {
    let lower = body.to_ascii_lowercase();
    let marker = lower.find("locked by")?;
    let rest = body[marker + "locked by".len()..].trim_start();
    let user: String = rest
        .chars()
        .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
        .collect();
    if user.is_empty() { None } else { Some(user.to_ascii_uppercase()) }
}

/// Builds the collection path and creation payload for a kind.
fn creation_payload(
    kind: ObjectKind,
    name: &str,
    package: &str,
    description: &str,
) -> Result<(&'static str, String), AdtError> {
    let package = normalize_object_name(package);
    let description = escape_attribute(description);
    let name_attr = escape_attribute(name);
    let payload = |root: &str, ns: &str, type_code: &str| {
        format!(
            concat!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
                "<{root} xmlns:{ns}=\"http://www.sap.com/adt/{ns}\" ",
                "xmlns:adtcore=\"http://www.sap.com/adt/core\" ",
                "adtcore:type=\"{type_code}\" adtcore:name=\"{name}\" ",
                "adtcore:description=\"{description}\">\n",
                "<adtcore:packageRef adtcore:name=\"{package}\"/>\n",
                "</{root}>",
            ),
            root = root,
            ns = ns,
            type_code = type_code,
            name = name_attr,
            description = description,
            package = package
        )
    };
    match kind {
        ObjectKind::Program => Ok((
            "/sap/bc/adt/programs/programs",
            payload("program:abapProgram", "program", "PROG/P"),
        )),
        ObjectKind::Class => Ok((
            "/sap/bc/adt/oo/classes",
            payload("class:abapClass", "class", "CLAS/OC"),
        )),
        ObjectKind::Interface => Ok((
            "/sap/bc/adt/oo/interfaces",
            payload("intf:abapInterface", "intf", "INTF/OI"),
        )),
        ObjectKind::Include => Ok((
            "/sap/bc/adt/programs/includes",
            payload("include:abapInclude", "include", "PROG/I"),
        )),
        ObjectKind::DataDefinition => Ok((
            "/sap/bc/adt/ddic/ddl/sources",
            payload("ddl:ddlSource", "ddl", "DDLS/DF"),
        )),
        ObjectKind::BehaviorDefinition => Ok((
            "/sap/bc/adt/bo/behaviordefinitions",
            payload("bdef:behaviorDefinition", "bdef", "BDEF/BDO"),
        )),
        ObjectKind::ServiceDefinition => Ok((
            "/sap/bc/adt/ddic/srvd/sources",
            payload("srvd:srvdSource", "srvd", "SRVD/SRV"),
        )),
        other => Err(AdtError::InvalidArgument(format!(
            "creation of {other} objects is not supported"
        ))),
    }
}

/// Decodes activation diagnostics from a response body.
fn decode_activation_messages(body: &[u8]) -> Result<Vec<ActivationMessage>, AdtError> {
    if body.is_empty() {
        return Ok(Vec::new());
    }
    let tree = parse_tolerant(body)?;
    Ok(tree
        .find_all("msg")
        .iter()
        .map(|message| ActivationMessage {
            uri: message.attr("href").unwrap_or_default().to_string(),
            message_type: message.attr("type").unwrap_or_default().to_string(),
            text: message
                .find_first("shortText")
                .map(|short| {
                    short
                        .find_first("txt")
                        .map_or_else(|| short.text.clone(), |txt| txt.text.clone())
                })
                .unwrap_or_else(|| message.text.clone()),
            line: message.attr_u32("line"),
        })
        .collect())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions favor direct unwrap/expect for clarity."
    )]

    use super::*;

    /// Tests decoding of activation diagnostics.
    #[test]
    fn decode_activation_diagnostics() {
        let body = br#"<?xml version="1.0" encoding="utf-8"?>
<chkl:messages xmlns:chkl="http://www.sap.com/abapxml/checklist">
<msg objDescr="Program ZTEST" type="E" line="4" href="/sap/bc/adt/programs/programs/ztest/source/main#start=4,0">
<shortText><txt>Statement unknown</txt></shortText>
</msg>
<msg objDescr="Program ZTEST" type="W" line="9" href="/sap/bc/adt/programs/programs/ztest/source/main#start=9,0">
<shortText><txt>Obsolete statement</txt></shortText>
</msg>
</chkl:messages>"#;
        let messages = decode_activation_messages(body).expect("decode");
        assert_eq!(messages.len(), 2);
        assert!(messages[0].is_error());
        assert_eq!(messages[0].text, "Statement unknown");
        assert_eq!(messages[0].line, Some(4));
        assert!(!messages[1].is_error());
    }

    /// Tests that an empty activation body decodes to no diagnostics.
    #[test]
    fn empty_activation_body_is_clean() {
        let messages = decode_activation_messages(b"").expect("decode");
        assert!(messages.is_empty());
    }

    /// Tests include tag validation per object kind.
    #[test]
    fn include_tags_validate_per_kind() {
        use adt_bridge_core::ObjectIdentity;

        let class = ObjectIdentity::new(ObjectKind::Class, "ZCL_A");
        assert!(validate_include_tag(&class, "testclasses").is_ok());
        assert!(validate_include_tag(&class, "main").is_ok());
        assert!(validate_include_tag(&class, "header").is_err());

        let program = ObjectIdentity::new(ObjectKind::Program, "ZPROG");
        assert!(validate_include_tag(&program, "main").is_ok());
        assert!(validate_include_tag(&program, "testclasses").is_err());
    }

    /// Tests extraction of the lock holder from conflict bodies.
    #[test]
    fn lock_holder_extraction() {
        assert_eq!(
            locked_by_user("Object REPS ZTEST is locked by DEVELOPER01"),
            Some("DEVELOPER01".to_string())
        );
        assert_eq!(locked_by_user("plain conflict"), None);
    }

    /// Tests that unsupported creation kinds are rejected.
    #[test]
    fn unsupported_creation_kinds_are_rejected() {
        let err = creation_payload(ObjectKind::Table, "ZT", "ZPKG", "").unwrap_err();
        assert!(matches!(err, AdtError::InvalidArgument(_)));
        let (collection, body) =
            creation_payload(ObjectKind::Program, "ZNEW", "zpkg", "demo").expect("payload");
        assert_eq!(collection, "/sap/bc/adt/programs/programs");
        assert!(body.contains("adtcore:name=\"ZNEW\""));
        assert!(body.contains("adtcore:packageRef adtcore:name=\"ZPKG\""));
    }
}
