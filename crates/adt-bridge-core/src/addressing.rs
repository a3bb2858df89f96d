// crates/adt-bridge-core/src/addressing.rs
// ============================================================================
// Module: ADT Repository Addressing
// Description: Canonical ADT URI templates and file name round-trips.
// Purpose: Map object identities to repository URIs and back to file names.
// Dependencies: adt-bridge-core::identifiers
// ============================================================================

//! ## Overview
//! Every repository object kind maps to a fixed URI template under
//! `/sap/bc/adt`. The mapping is a flat dispatch table over
//! [`ObjectKind`] so callers never assemble endpoint strings by hand.
//! Names are upper-cased before percent-encoding; namespace separators
//! travel as `%2F` in URLs and as `#` in file names.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::identifiers::ClassInclude;
use crate::identifiers::ObjectKind;
use crate::identifiers::encode_object_name;
use crate::identifiers::normalize_object_name;

// ============================================================================
// SECTION: URI Templates
// ============================================================================

/// Returns the canonical object URI for a kind and normalized name.
///
/// `parent` is required for [`ObjectKind::FunctionModule`] and ignored
/// elsewhere. The returned URI addresses the object itself; use
/// [`object_source_uri`] for the editable source stream.
#[must_use]
pub fn object_uri(kind: ObjectKind, name: &str, parent: Option<&str>) -> String {
    let encoded = encode_object_name(&normalize_object_name(name));
    match kind {
        ObjectKind::Program => format!("/sap/bc/adt/programs/programs/{encoded}"),
        ObjectKind::Class => format!("/sap/bc/adt/oo/classes/{encoded}"),
        ObjectKind::Interface => format!("/sap/bc/adt/oo/interfaces/{encoded}"),
        ObjectKind::FunctionModule => {
            let group = encode_object_name(&normalize_object_name(parent.unwrap_or_default()));
            format!("/sap/bc/adt/functions/groups/{group}/fmodules/{encoded}")
        }
        ObjectKind::FunctionGroup => format!("/sap/bc/adt/functions/groups/{encoded}"),
        ObjectKind::Include => format!("/sap/bc/adt/programs/includes/{encoded}"),
        ObjectKind::Table => format!("/sap/bc/adt/ddic/tables/{encoded}"),
        ObjectKind::View => format!("/sap/bc/adt/ddic/views/{encoded}"),
        ObjectKind::Structure => format!("/sap/bc/adt/ddic/structures/{encoded}"),
        ObjectKind::DataDefinition => format!("/sap/bc/adt/ddic/ddl/sources/{encoded}"),
        ObjectKind::BehaviorDefinition => {
            format!("/sap/bc/adt/bo/behaviordefinitions/{encoded}")
        }
        ObjectKind::ServiceDefinition => format!("/sap/bc/adt/ddic/srvd/sources/{encoded}"),
        ObjectKind::ServiceBinding => {
            format!("/sap/bc/adt/businessservices/bindings/{encoded}")
        }
        // The message class endpoint expects a lower-case name segment.
        ObjectKind::MessageClass => {
            let lowered = encode_object_name(&normalize_object_name(name).to_ascii_lowercase());
            format!("/sap/bc/adt/messageclass/{lowered}")
        }
        ObjectKind::Package => "/sap/bc/adt/repository/nodestructure".to_string(),
        ObjectKind::Transaction => format!("/sap/bc/adt/transactions/{encoded}"),
    }
}

/// Returns the editable source URI for a kind and normalized name.
///
/// Kinds without a plain-text source stream return the object URI itself.
#[must_use]
pub fn object_source_uri(kind: ObjectKind, name: &str, parent: Option<&str>) -> String {
    let base = object_uri(kind, name, parent);
    if kind.has_source() { format!("{base}/source/main") } else { base }
}

/// Returns the per-include source URI of a global class.
#[must_use]
pub fn class_include_uri(name: &str, include: ClassInclude) -> String {
    let base = object_uri(ObjectKind::Class, name, None);
    match include {
        ClassInclude::Main => format!("{base}/source/main"),
        other => format!("{base}/includes/{}", other.as_str()),
    }
}

// ============================================================================
// SECTION: File Name Round-Trips
// ============================================================================

/// Maps a repository name to its file-system form (`/` becomes `#`).
#[must_use]
pub fn name_to_filename(name: &str) -> String {
    name.to_ascii_lowercase().replace('/', "#")
}

/// Maps a file-system name back to its repository form (`#` becomes `/`).
#[must_use]
pub fn name_from_filename(file_name: &str) -> String {
    normalize_object_name(&file_name.replace('#', "/"))
}

/// Returns the file suffix used when exporting an object of this kind.
#[must_use]
pub const fn kind_file_suffix(kind: ObjectKind) -> &'static str {
    match kind {
        ObjectKind::Program => ".prog.abap",
        ObjectKind::Class => ".clas.abap",
        ObjectKind::Interface => ".intf.abap",
        ObjectKind::FunctionModule => ".func.abap",
        ObjectKind::FunctionGroup => ".fugr.abap",
        ObjectKind::Include => ".incl.abap",
        ObjectKind::Table => ".tabl.asdt",
        ObjectKind::View => ".view.asdv",
        ObjectKind::Structure => ".strc.asds",
        ObjectKind::DataDefinition => ".ddls.asddls",
        ObjectKind::BehaviorDefinition => ".bdef.asbdef",
        ObjectKind::ServiceDefinition => ".srvd.asrvd",
        ObjectKind::ServiceBinding => ".srvb.json",
        ObjectKind::MessageClass => ".msag.json",
        ObjectKind::Package => ".devc.json",
        ObjectKind::Transaction => ".tran.json",
    }
}

/// Builds the export file name for an object, including the kind suffix.
///
/// Class includes other than the main source carry the include tag between
/// the kind marker and the extension (`zcl_x.clas.testclasses.abap`).
#[must_use]
pub fn object_file_name(kind: ObjectKind, name: &str, include: Option<ClassInclude>) -> String {
    let stem = name_to_filename(&normalize_object_name(name));
    match (kind, include) {
        (ObjectKind::Class, Some(ClassInclude::Testclasses)) => {
            format!("{stem}.clas.testclasses.abap")
        }
        (ObjectKind::Class, Some(ClassInclude::LocalsDef)) => {
            format!("{stem}.clas.locals_def.abap")
        }
        (ObjectKind::Class, Some(ClassInclude::LocalsImp)) => {
            format!("{stem}.clas.locals_imp.abap")
        }
        (ObjectKind::Class, Some(ClassInclude::Macros)) => format!("{stem}.clas.macros.abap"),
        (ObjectKind::Class, Some(ClassInclude::Definitions)) => {
            format!("{stem}.clas.definitions.abap")
        }
        (ObjectKind::Class, Some(ClassInclude::Implementations)) => {
            format!("{stem}.clas.implementations.abap")
        }
        _ => format!("{stem}{}", kind_file_suffix(kind)),
    }
}

/// Parses an export file name back into its kind, name, and class include.
#[must_use]
pub fn parse_object_file_name(file_name: &str) -> Option<(ObjectKind, String, Option<ClassInclude>)> {
    let (stem, kind, include) = split_file_name(file_name)?;
    Some((kind, name_from_filename(stem), include))
}

/// Splits a file name into name stem, kind, and optional class include.
fn split_file_name(file_name: &str) -> Option<(&str, ObjectKind, Option<ClassInclude>)> {
    for (suffix, include) in [
        (".clas.testclasses.abap", ClassInclude::Testclasses),
        (".clas.locals_def.abap", ClassInclude::LocalsDef),
        (".clas.locals_imp.abap", ClassInclude::LocalsImp),
        (".clas.definitions.abap", ClassInclude::Definitions),
        (".clas.implementations.abap", ClassInclude::Implementations),
        (".clas.macros.abap", ClassInclude::Macros),
    ] {
        if let Some(stem) = file_name.strip_suffix(suffix) {
            return Some((stem, ObjectKind::Class, Some(include)));
        }
    }
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
        if let Some(stem) = file_name.strip_suffix(kind_file_suffix(kind)) {
            return Some((stem, kind, None));
        }
    }
    None
}

// ============================================================================
// SECTION: Tests
// ============================================================================
