// crates/adt-bridge-core/src/identifiers.rs
// ============================================================================
// Module: ADT Object Identifiers
// Description: Object kinds, identities, and repository name normalization.
// Purpose: Provide strongly typed object identities with stable wire labels.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! This module defines the object vocabulary of the ABAP repository as seen
//! through ADT. Identities are a tagged kind plus a normalized name; deep
//! per-kind type hierarchies are intentionally avoided so that read and
//! lifecycle code stays linear dispatch over [`ObjectKind`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Object Kinds
// ============================================================================

/// Repository object kinds addressable through the bridge.
///
/// # Invariants
/// - Variants are stable for wire serialization and tool payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    /// Executable ABAP program (report).
    Program,
    /// Global ABAP class.
    Class,
    /// Global ABAP interface.
    Interface,
    /// Function module inside a function group.
    FunctionModule,
    /// Function group container.
    FunctionGroup,
    /// Standalone program include.
    Include,
    /// DDIC database table.
    Table,
    /// Classic DDIC database view.
    View,
    /// DDIC structure.
    Structure,
    /// CDS data definition (DDLS).
    DataDefinition,
    /// RAP behavior definition (BDEF).
    BehaviorDefinition,
    /// RAP service definition (SRVD).
    ServiceDefinition,
    /// RAP service binding (SRVB).
    ServiceBinding,
    /// Message class container.
    MessageClass,
    /// Development package.
    Package,
    /// Transaction code.
    Transaction,
}

impl ObjectKind {
    /// Returns the stable label used in tool payloads and audit events.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Program => "program",
            Self::Class => "class",
            Self::Interface => "interface",
            Self::FunctionModule => "function_module",
            Self::FunctionGroup => "function_group",
            Self::Include => "include",
            Self::Table => "table",
            Self::View => "view",
            Self::Structure => "structure",
            Self::DataDefinition => "data_definition",
            Self::BehaviorDefinition => "behavior_definition",
            Self::ServiceDefinition => "service_definition",
            Self::ServiceBinding => "service_binding",
            Self::MessageClass => "message_class",
            Self::Package => "package",
            Self::Transaction => "transaction",
        }
    }

    /// Parses a stable label back into a kind.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "program" => Some(Self::Program),
            "class" => Some(Self::Class),
            "interface" => Some(Self::Interface),
            "function_module" => Some(Self::FunctionModule),
            "function_group" => Some(Self::FunctionGroup),
            "include" => Some(Self::Include),
            "table" => Some(Self::Table),
            "view" => Some(Self::View),
            "structure" => Some(Self::Structure),
            "data_definition" => Some(Self::DataDefinition),
            "behavior_definition" => Some(Self::BehaviorDefinition),
            "service_definition" => Some(Self::ServiceDefinition),
            "service_binding" => Some(Self::ServiceBinding),
            "message_class" => Some(Self::MessageClass),
            "package" => Some(Self::Package),
            "transaction" => Some(Self::Transaction),
            _ => None,
        }
    }

    /// Returns the repository type code reported by search and node listings.
    #[must_use]
    pub const fn repository_type(self) -> &'static str {
        match self {
            Self::Program => "PROG/P",
            Self::Class => "CLAS/OC",
            Self::Interface => "INTF/OI",
            Self::FunctionModule => "FUGR/FF",
            Self::FunctionGroup => "FUGR/F",
            Self::Include => "PROG/I",
            Self::Table => "TABL/DT",
            Self::View => "VIEW/DV",
            Self::Structure => "TABL/DS",
            Self::DataDefinition => "DDLS/DF",
            Self::BehaviorDefinition => "BDEF/BDO",
            Self::ServiceDefinition => "SRVD/SRV",
            Self::ServiceBinding => "SRVB/SVB",
            Self::MessageClass => "MSAG/N",
            Self::Package => "DEVC/K",
            Self::Transaction => "TRAN/T",
        }
    }

    /// Parses a repository type code back into a kind.
    #[must_use]
    pub fn from_repository_type(code: &str) -> Option<Self> {
        match code {
            "PROG/P" => Some(Self::Program),
            "CLAS/OC" => Some(Self::Class),
            "INTF/OI" => Some(Self::Interface),
            "FUGR/FF" => Some(Self::FunctionModule),
            "FUGR/F" => Some(Self::FunctionGroup),
            "PROG/I" => Some(Self::Include),
            "TABL/DT" => Some(Self::Table),
            "VIEW/DV" => Some(Self::View),
            "TABL/DS" => Some(Self::Structure),
            "DDLS/DF" => Some(Self::DataDefinition),
            "BDEF/BDO" => Some(Self::BehaviorDefinition),
            "SRVD/SRV" => Some(Self::ServiceDefinition),
            "SRVB/SVB" => Some(Self::ServiceBinding),
            "MSAG/N" => Some(Self::MessageClass),
            "DEVC/K" => Some(Self::Package),
            "TRAN/T" => Some(Self::Transaction),
            _ => None,
        }
    }

    /// Returns true when the kind carries editable plain-text source.
    #[must_use]
    pub const fn has_source(self) -> bool {
        !matches!(self, Self::ServiceBinding | Self::MessageClass | Self::Package | Self::Transaction)
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Class Includes
// ============================================================================

/// Source includes of a global class.
///
/// # Invariants
/// - `as_str` values match the ADT include segment names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassInclude {
    /// Unified main source.
    Main,
    /// Class-relevant local definitions.
    Definitions,
    /// Local implementations.
    Implementations,
    /// Test classes.
    Testclasses,
    /// Local class definitions.
    LocalsDef,
    /// Local class implementations.
    LocalsImp,
    /// Macros include.
    Macros,
}

impl ClassInclude {
    /// Returns the ADT include segment for this include.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Main => "main",
            Self::Definitions => "definitions",
            Self::Implementations => "implementations",
            Self::Testclasses => "testclasses",
            Self::LocalsDef => "localdefinitions",
            Self::LocalsImp => "localimplementations",
            Self::Macros => "macros",
        }
    }

    /// Parses an include tag as used in tool payloads and file suffixes.
    #[must_use]
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "main" => Some(Self::Main),
            "definitions" => Some(Self::Definitions),
            "implementations" => Some(Self::Implementations),
            "testclasses" => Some(Self::Testclasses),
            "locals_def" | "localdefinitions" => Some(Self::LocalsDef),
            "locals_imp" | "localimplementations" => Some(Self::LocalsImp),
            "macros" => Some(Self::Macros),
            _ => None,
        }
    }
}

impl fmt::Display for ClassInclude {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Object Identity
// ============================================================================

/// Identity of a single repository object.
///
/// # Invariants
/// - `name` is stored normalized (upper case, leading namespace slashes kept).
/// - `parent` is set only for kinds nested under a container (function
///   modules under their group).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectIdentity {
    /// Object kind tag.
    pub kind: ObjectKind,
    /// Normalized object name.
    pub name: String,
    /// Containing object name, when the kind requires one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Class include addressed by source operations, when relevant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<ClassInclude>,
}

impl ObjectIdentity {
    /// Creates an identity with a normalized name and no parent.
    #[must_use]
    pub fn new(kind: ObjectKind, name: &str) -> Self {
        Self {
            kind,
            name: normalize_object_name(name),
            parent: None,
            include: None,
        }
    }

    /// Sets the containing object name (normalized).
    #[must_use]
    pub fn with_parent(mut self, parent: &str) -> Self {
        self.parent = Some(normalize_object_name(parent));
        self
    }

    /// Sets the class include addressed by source operations.
    #[must_use]
    pub const fn with_include(mut self, include: ClassInclude) -> Self {
        self.include = Some(include);
        self
    }
}

impl fmt::Display for ObjectIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.name)
    }
}

// ============================================================================
// SECTION: Name Normalization
// ============================================================================

/// Normalizes a repository object name to its canonical upper-case form.
///
/// Namespace slashes are preserved; only letter case changes.
#[must_use]
pub fn normalize_object_name(name: &str) -> String {
    name.trim().to_ascii_uppercase()
}

/// Percent-encodes a normalized object name for use as a URL path segment.
///
/// Namespaced names encode the `/` separators (`/DMO/CL_X` becomes
/// `%2FDMO%2FCL_X`). Unreserved characters and `$` pass through unchanged.
#[must_use]
pub fn encode_object_name(name: &str) -> String {
    let mut encoded = String::with_capacity(name.len());
    for byte in name.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b'$' => {
                encoded.push(byte as char);
            }
            other => {
                encoded.push('%');
                encoded.push(char::from_digit(u32::from(other >> 4), 16).unwrap_or('0').to_ascii_uppercase());
                encoded.push(char::from_digit(u32::from(other & 0x0F), 16).unwrap_or('0').to_ascii_uppercase());
            }
        }
    }
    encoded
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

    /// Tests that normalization upper-cases and keeps namespace slashes.
    #[test]
    fn normalize_keeps_namespace_slashes() {
        assert_eq!(normalize_object_name("/dmo/cl_flight"), "/DMO/CL_FLIGHT");
        assert_eq!(normalize_object_name("  ztest "), "ZTEST");
    }

    /// Tests that encoding escapes namespace separators.
    #[test]
    fn encode_escapes_namespace_separators() {
        assert_eq!(encode_object_name("/DMO/CL_X"), "%2FDMO%2FCL_X");
        assert_eq!(encode_object_name("ZTEST"), "ZTEST");
        assert_eq!(encode_object_name("$TMP"), "$TMP");
    }

    /// Tests that kind labels round-trip through parse.
    #[test]
    fn kind_labels_round_trip() {
        for kind in [
            ObjectKind::Program,
            ObjectKind::Class,
            ObjectKind::Interface,
            ObjectKind::FunctionModule,
            ObjectKind::FunctionGroup,
            ObjectKind::Include,
            ObjectKind::Table,
            ObjectKind::View,
            ObjectKind::Structure,
            ObjectKind::DataDefinition,
            ObjectKind::BehaviorDefinition,
            ObjectKind::ServiceDefinition,
            ObjectKind::ServiceBinding,
            ObjectKind::MessageClass,
            ObjectKind::Package,
            ObjectKind::Transaction,
        ] {
            assert_eq!(ObjectKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ObjectKind::parse("report"), None);
    }

    /// Tests that include tags accept both file and segment spellings.
    #[test]
    fn include_tags_accept_both_spellings() {
        assert_eq!(ClassInclude::parse("locals_def"), Some(ClassInclude::LocalsDef));
        assert_eq!(ClassInclude::parse("localdefinitions"), Some(ClassInclude::LocalsDef));
        assert_eq!(ClassInclude::parse("testclasses"), Some(ClassInclude::Testclasses));
        assert_eq!(ClassInclude::parse("header"), None);
    }

    /// Tests that identities normalize names at construction.
    #[test]
    fn identity_normalizes_on_construction() {
        let identity = ObjectIdentity::new(ObjectKind::Class, "zcl_demo").with_include(ClassInclude::Testclasses);
        assert_eq!(identity.name, "ZCL_DEMO");
        assert_eq!(identity.include, Some(ClassInclude::Testclasses));
    }
}
