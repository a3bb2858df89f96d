// crates/adt-bridge-core/src/policy.rs
// ============================================================================
// Module: Safety Policy
// Description: Stateless classifier gating every repository operation.
// Purpose: Decide allow/deny for (operation class, target name) pairs.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! The safety policy is consulted before any operation reaches the wire.
//! Rules evaluate in a fixed order and the first match wins; a denial names
//! the rule that fired so callers can surface actionable messages.
//! Invariants:
//! - Read-only mode denies every class except [`OperationClass::Read`].
//! - Blocklist entries are evaluated before the allowlist.
//! - Comparisons are case-insensitive and tolerate a leading `/`.
//!
//! Security posture: target names are untrusted caller input; unknown or
//! malformed names fall through to the most restrictive applicable rule.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Modes and Operation Classes
// ============================================================================

/// Operating mode of the safety policy.
///
/// # Invariants
/// - Variants are stable for configuration files and tool payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyMode {
    /// Only read operations are permitted.
    ReadOnly,
    /// Development objects may be changed; transport management is blocked.
    DevOnly,
    /// All operation classes are permitted, including SAP-standard targets.
    Full,
}

/// Classification of repository operations for policy checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationClass {
    /// Read object contents or metadata.
    Read,
    /// Modify existing object sources.
    Write,
    /// Create new objects.
    Create,
    /// Delete objects or sub-entities.
    Delete,
    /// Execute code (unit tests, data preview).
    Execute,
    /// Acquire or release repository locks.
    Lock,
    /// Attach the external debugger.
    Debug,
    /// Manage transport requests.
    Transport,
}

impl OperationClass {
    /// Returns a stable label for audit events and denial messages.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Create => "create",
            Self::Delete => "delete",
            Self::Execute => "execute",
            Self::Lock => "lock",
            Self::Debug => "debug",
            Self::Transport => "transport",
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Policy denial errors.
///
/// # Invariants
/// - `rule` identifies the first rule that matched; it is stable for tests
///   and envelope mapping.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PolicyError {
    /// The operation was denied by a policy rule.
    #[error("denied by {rule}: {reason}")]
    Denied {
        /// Stable name of the rule that fired.
        rule: &'static str,
        /// Human-readable denial reason.
        reason: String,
    },
}

impl PolicyError {
    /// Creates a denial for the named rule.
    #[must_use]
    pub fn denied(rule: &'static str, reason: impl Into<String>) -> Self {
        Self::Denied {
            rule,
            reason: reason.into(),
        }
    }
}

// ============================================================================
// SECTION: Safety Policy
// ============================================================================

/// Stateless allow/deny classifier for repository operations.
///
/// # Invariants
/// - Package sets hold normalized (upper-case) entries.
/// - An empty allowlist means "no allowlist restriction".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyPolicy {
    /// Operating mode.
    pub mode: SafetyMode,
    /// Optional allowlist of packages or namespace prefixes.
    #[serde(default)]
    pub allowed_packages: BTreeSet<String>,
    /// Blocklist of packages or namespace prefixes.
    #[serde(default)]
    pub blocked_packages: BTreeSet<String>,
}

impl Default for SafetyPolicy {
    fn default() -> Self {
        Self {
            mode: SafetyMode::ReadOnly,
            allowed_packages: BTreeSet::new(),
            blocked_packages: BTreeSet::new(),
        }
    }
}

impl SafetyPolicy {
    /// Creates a policy for the given mode with empty package sets.
    #[must_use]
    pub fn new(mode: SafetyMode) -> Self {
        Self {
            mode,
            allowed_packages: BTreeSet::new(),
            blocked_packages: BTreeSet::new(),
        }
    }

    /// Replaces the allowlist with the provided packages.
    #[must_use]
    pub fn allow_packages<I, S>(mut self, packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_packages =
            packages.into_iter().map(|entry| normalize_target(entry.as_ref())).collect();
        self
    }

    /// Replaces the blocklist with the provided packages.
    #[must_use]
    pub fn block_packages<I, S>(mut self, packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.blocked_packages =
            packages.into_iter().map(|entry| normalize_target(entry.as_ref())).collect();
        self
    }

    /// Checks whether an operation class may run against the target name.
    ///
    /// Rules evaluate in order and the first match wins:
    /// read-only gate, transport gate, standard-object gate, blocklist,
    /// allowlist, allow.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Denied`] naming the rule that fired.
    pub fn check_operation(&self, class: OperationClass, target: &str) -> Result<(), PolicyError> {
        if self.mode == SafetyMode::ReadOnly && class != OperationClass::Read {
            return Err(PolicyError::denied(
                "read-only-mode",
                format!("{} operations are disabled in read-only mode", class.as_str()),
            ));
        }
        if self.mode == SafetyMode::DevOnly && class == OperationClass::Transport {
            return Err(PolicyError::denied(
                "transport-disabled",
                "transport management requires full mode",
            ));
        }
        let normalized = normalize_target(target);
        if !normalized.is_empty()
            && !is_development_name(&normalized)
            && self.mode != SafetyMode::Full
            && matches!(
                class,
                OperationClass::Write | OperationClass::Create | OperationClass::Delete
            )
        {
            return Err(PolicyError::denied(
                "sap-standard-object",
                format!("{normalized} is not a development object (Z/Y/namespace)"),
            ));
        }
        self.check_package(target)
    }

    /// Checks whether a package or object name passes the package sets.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::Denied`] for blocklisted names and for names
    /// outside a non-empty allowlist.
    pub fn check_package(&self, name: &str) -> Result<(), PolicyError> {
        let normalized = normalize_target(name);
        if normalized.is_empty() {
            return Ok(());
        }
        if self.blocked_packages.iter().any(|entry| target_matches(entry, &normalized)) {
            return Err(PolicyError::denied(
                "blocked-package",
                format!("{normalized} is blocked by policy"),
            ));
        }
        if !self.allowed_packages.is_empty()
            && !self.allowed_packages.iter().any(|entry| target_matches(entry, &normalized))
        {
            return Err(PolicyError::denied(
                "package-not-allowed",
                format!("{normalized} is outside the allowed packages"),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Matching Helpers
// ============================================================================

/// Normalizes a target name for policy comparison.
fn normalize_target(name: &str) -> String {
    name.trim().to_ascii_uppercase()
}

/// Returns true when a name belongs to the development domain.
///
/// Customer prefixes (`Z`, `Y`) and namespaced names (`/.../`) count as
/// development; everything else is SAP-standard.
fn is_development_name(normalized: &str) -> bool {
    normalized.starts_with('Z')
        || normalized.starts_with('Y')
        || (normalized.starts_with('/') && normalized[1..].contains('/'))
        || normalized.starts_with('$')
}

/// Returns true when a policy entry matches the normalized target.
///
/// Entries match exactly, ignoring one leading `/` on either side; a
/// namespace entry (`/NS/`) matches any name under that namespace.
fn target_matches(entry: &str, target: &str) -> bool {
    if entry == target {
        return true;
    }
    if entry.trim_start_matches('/') == target.trim_start_matches('/') {
        return true;
    }
    if entry.starts_with('/') {
        let prefix = if entry.ends_with('/') { entry.to_string() } else { format!("{entry}/") };
        return target.starts_with(&prefix);
    }
    false
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

    /// Tests that read-only mode denies every non-read class.
    #[test]
    fn read_only_denies_non_read() {
        let policy = SafetyPolicy::new(SafetyMode::ReadOnly);
        assert!(policy.check_operation(OperationClass::Read, "ZTEST").is_ok());
        for class in [
            OperationClass::Write,
            OperationClass::Create,
            OperationClass::Delete,
            OperationClass::Execute,
            OperationClass::Lock,
            OperationClass::Debug,
            OperationClass::Transport,
        ] {
            let err = policy.check_operation(class, "ZTEST").unwrap_err();
            assert!(matches!(err, PolicyError::Denied { rule: "read-only-mode", .. }));
        }
    }

    /// Tests that dev-only mode blocks transport management.
    #[test]
    fn dev_only_blocks_transport() {
        let policy = SafetyPolicy::new(SafetyMode::DevOnly);
        let err = policy.check_operation(OperationClass::Transport, "ZTEST").unwrap_err();
        assert!(matches!(err, PolicyError::Denied { rule: "transport-disabled", .. }));
        assert!(policy.check_operation(OperationClass::Write, "ZTEST").is_ok());
    }

    /// Tests that SAP-standard names cannot be written outside full mode.
    #[test]
    fn standard_objects_require_full_mode() {
        let dev = SafetyPolicy::new(SafetyMode::DevOnly);
        let err = dev.check_operation(OperationClass::Write, "SAPMV45A").unwrap_err();
        assert!(matches!(err, PolicyError::Denied { rule: "sap-standard-object", .. }));
        assert!(dev.check_operation(OperationClass::Read, "SAPMV45A").is_ok());

        let full = SafetyPolicy::new(SafetyMode::Full);
        assert!(full.check_operation(OperationClass::Write, "SAPMV45A").is_ok());
    }

    /// Tests that namespaced names count as development objects.
    #[test]
    fn namespaced_names_are_development() {
        let policy = SafetyPolicy::new(SafetyMode::DevOnly);
        assert!(policy.check_operation(OperationClass::Write, "/dmo/cl_flight").is_ok());
    }

    /// Tests that the blocklist fires before the allowlist.
    #[test]
    fn blocklist_overrides_allowlist() {
        let policy = SafetyPolicy::new(SafetyMode::DevOnly)
            .allow_packages(["ZDEMO"])
            .block_packages(["zdemo"]);
        let err = policy.check_package("ZDEMO").unwrap_err();
        assert!(matches!(err, PolicyError::Denied { rule: "blocked-package", .. }));
    }

    /// Tests that a non-empty allowlist excludes unlisted names.
    #[test]
    fn allowlist_excludes_unlisted_names() {
        let policy = SafetyPolicy::new(SafetyMode::DevOnly).allow_packages(["ZDEMO"]);
        assert!(policy.check_package("zdemo").is_ok());
        let err = policy.check_package("ZOTHER").unwrap_err();
        assert!(matches!(err, PolicyError::Denied { rule: "package-not-allowed", .. }));
    }

    /// Tests namespace prefix matching with the leading slash.
    #[test]
    fn namespace_entries_match_prefixes() {
        let policy = SafetyPolicy::new(SafetyMode::DevOnly).allow_packages(["/DMO/"]);
        assert!(policy.check_package("/dmo/cl_flight").is_ok());
        assert!(policy.check_package("/OTHER/CL_X").is_err());
    }

    /// Tests that comparisons tolerate a leading slash on entries.
    #[test]
    fn leading_slash_is_tolerated() {
        let policy = SafetyPolicy::new(SafetyMode::DevOnly).block_packages(["/ZPKG"]);
        assert!(policy.check_package("ZPKG").is_err());
    }

    /// Tests that the default policy is read-only.
    #[test]
    fn default_policy_is_read_only() {
        let policy = SafetyPolicy::default();
        assert_eq!(policy.mode, SafetyMode::ReadOnly);
        assert!(policy.check_operation(OperationClass::Write, "ZX").is_err());
    }
}
