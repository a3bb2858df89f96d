// crates/adt-bridge-tools/src/contract.rs
// ============================================================================
// Module: Tool Contracts
// Description: Canonical tool names, definitions, and input schemas.
// Purpose: Drive tool listings and keep the operation surface stable.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! This module defines the canonical named-operation surface. The focused
//! profile carries the day-to-day verbs; the expert profile adds per-kind
//! reads and raw lifecycle atomics. The contract order is intentional and
//! preserved in listings so diffs stay stable; append new tools at the
//! end of their profile.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Profiles
// ============================================================================

/// Selectable operation-set profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolProfile {
    /// The focused day-to-day surface.
    Focused,
    /// The focused surface plus per-kind reads and raw atomics.
    Expert,
}

impl Default for ToolProfile {
    fn default() -> Self {
        Self::Focused
    }
}

// ============================================================================
// SECTION: Tool Names
// ============================================================================

/// Canonical tool names.
///
/// # Invariants
/// - Wire labels are stable; parsing is the single source of truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    /// Read any object's source.
    GetSource,
    /// Create or update an object's sources (explicit mode required).
    WriteSource,
    /// Update one include under a caller-held lock.
    EditSource,
    /// Grep one object's source.
    GrepObject,
    /// Grep every source in a package.
    GrepPackage,
    /// Quick search by name pattern.
    SearchObject,
    /// Run a data preview query.
    QueryData,
    /// Resolve the definition behind a source position.
    FindDefinition,
    /// List usages of a source position.
    FindReferences,
    /// Run an object's unit tests.
    RunUnitTests,
    /// Run a syntax check.
    SyntaxCheck,
    /// Acquire a modify lock.
    LockObject,
    /// Release a lock.
    UnlockObject,
    /// Read a program source (expert).
    GetProgram,
    /// Read a class source (expert).
    GetClass,
    /// Read an interface source (expert).
    GetInterface,
    /// Read a function module source (expert).
    GetFunction,
    /// Read a program include source (expert).
    GetInclude,
    /// Read a table definition (expert).
    GetTable,
    /// Read a package listing (expert).
    GetPackage,
    /// Read a message class (expert).
    GetMessageClass,
    /// Read a class structure (expert).
    GetClassStructure,
    /// Retrieve a call graph (expert).
    GetCallGraph,
    /// Run the traced-execution composite (expert).
    TraceExecution,
    /// Create a repository object (expert).
    CreateObject,
    /// Activate a repository object (expert).
    ActivateObject,
    /// Surgically edit message-class records (expert).
    WriteMessageClass,
}

impl ToolName {
    /// Returns the stable wire label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GetSource => "get_source",
            Self::WriteSource => "write_source",
            Self::EditSource => "edit_source",
            Self::GrepObject => "grep_object",
            Self::GrepPackage => "grep_package",
            Self::SearchObject => "search_object",
            Self::QueryData => "query_data",
            Self::FindDefinition => "find_definition",
            Self::FindReferences => "find_references",
            Self::RunUnitTests => "run_unit_tests",
            Self::SyntaxCheck => "syntax_check",
            Self::LockObject => "lock_object",
            Self::UnlockObject => "unlock_object",
            Self::GetProgram => "get_program",
            Self::GetClass => "get_class",
            Self::GetInterface => "get_interface",
            Self::GetFunction => "get_function",
            Self::GetInclude => "get_include",
            Self::GetTable => "get_table",
            Self::GetPackage => "get_package",
            Self::GetMessageClass => "get_message_class",
            Self::GetClassStructure => "get_class_structure",
            Self::GetCallGraph => "get_call_graph",
            Self::TraceExecution => "trace_execution",
            Self::CreateObject => "create_object",
            Self::ActivateObject => "activate_object",
            Self::WriteMessageClass => "write_message_class",
        }
    }

    /// Parses a wire label.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        ALL_TOOLS.iter().copied().find(|tool| tool.as_str() == label)
    }

    /// Returns true when the tool belongs to the focused profile.
    #[must_use]
    pub const fn is_focused(self) -> bool {
        matches!(
            self,
            Self::GetSource
                | Self::WriteSource
                | Self::EditSource
                | Self::GrepObject
                | Self::GrepPackage
                | Self::SearchObject
                | Self::QueryData
                | Self::FindDefinition
                | Self::FindReferences
                | Self::RunUnitTests
                | Self::SyntaxCheck
                | Self::LockObject
                | Self::UnlockObject
        )
    }

    /// Returns true when the tool is available in the given profile.
    #[must_use]
    pub const fn in_profile(self, profile: ToolProfile) -> bool {
        match profile {
            ToolProfile::Focused => self.is_focused(),
            ToolProfile::Expert => true,
        }
    }
}

/// Every tool in listing order (focused set first).
pub const ALL_TOOLS: &[ToolName] = &[
    ToolName::GetSource,
    ToolName::WriteSource,
    ToolName::EditSource,
    ToolName::GrepObject,
    ToolName::GrepPackage,
    ToolName::SearchObject,
    ToolName::QueryData,
    ToolName::FindDefinition,
    ToolName::FindReferences,
    ToolName::RunUnitTests,
    ToolName::SyntaxCheck,
    ToolName::LockObject,
    ToolName::UnlockObject,
    ToolName::GetProgram,
    ToolName::GetClass,
    ToolName::GetInterface,
    ToolName::GetFunction,
    ToolName::GetInclude,
    ToolName::GetTable,
    ToolName::GetPackage,
    ToolName::GetMessageClass,
    ToolName::GetClassStructure,
    ToolName::GetCallGraph,
    ToolName::TraceExecution,
    ToolName::CreateObject,
    ToolName::ActivateObject,
    ToolName::WriteMessageClass,
];

// ============================================================================
// SECTION: Definitions
// ============================================================================

/// Tool definition shape used by listings.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    /// Tool name label.
    pub name: &'static str,
    /// One-line description.
    pub description: &'static str,
    /// JSON schema of the input payload.
    pub input_schema: Value,
}

/// Returns the tool definitions visible in a profile, in listing order.
#[must_use]
pub fn tool_definitions(profile: ToolProfile) -> Vec<ToolDefinition> {
    ALL_TOOLS
        .iter()
        .copied()
        .filter(|tool| tool.in_profile(profile))
        .map(tool_definition)
        .collect()
}

/// Builds one tool definition.
#[must_use]
pub fn tool_definition(tool: ToolName) -> ToolDefinition {
    let (description, input_schema) = match tool {
        ToolName::GetSource => (
            "Read the source of any repository object; class reads accept an include and a method.",
            object_schema(&[
                ("object_type", json!({"type": "string"})),
                ("name", json!({"type": "string"})),
                ("parent", json!({"type": "string"})),
                ("include", json!({"type": "string"})),
                ("method", json!({"type": "string"})),
            ], &["object_type", "name"]),
        ),
        ToolName::WriteSource => (
            "Create or update object sources; the mode (create or update) is required.",
            object_schema(&[
                ("object_type", json!({"type": "string"})),
                ("name", json!({"type": "string"})),
                ("mode", json!({"type": "string", "enum": ["create", "update"]})),
                ("source", json!({"type": "string"})),
                ("sources", json!({"type": "object", "additionalProperties": {"type": "string"}})),
                ("package", json!({"type": "string"})),
                ("transport", json!({"type": "string"})),
                ("activate", json!({"type": "boolean"})),
            ], &["object_type", "name", "mode"]),
        ),
        ToolName::EditSource => (
            "Update one include under a caller-held lock.",
            object_schema(&[
                ("object_type", json!({"type": "string"})),
                ("name", json!({"type": "string"})),
                ("include", json!({"type": "string"})),
                ("source", json!({"type": "string"})),
                ("lock_handle", json!({"type": "string"})),
            ], &["object_type", "name", "source", "lock_handle"]),
        ),
        ToolName::GrepObject => (
            "Grep one object's source with a case-insensitive pattern.",
            object_schema(&[
                ("object_type", json!({"type": "string"})),
                ("name", json!({"type": "string"})),
                ("pattern", json!({"type": "string"})),
            ], &["object_type", "name", "pattern"]),
        ),
        ToolName::GrepPackage => (
            "Grep every source-bearing object of a package.",
            object_schema(&[
                ("package", json!({"type": "string"})),
                ("pattern", json!({"type": "string"})),
            ], &["package", "pattern"]),
        ),
        ToolName::SearchObject => (
            "Quick search by name pattern; * and ? wildcards pass through.",
            object_schema(&[
                ("query", json!({"type": "string"})),
                ("max_results", json!({"type": "integer"})),
            ], &["query"]),
        ),
        ToolName::QueryData => (
            "Run a data preview query; a bare identifier expands to SELECT * FROM.",
            object_schema(&[
                ("query", json!({"type": "string"})),
                ("max_rows", json!({"type": "integer"})),
            ], &["query"]),
        ),
        ToolName::FindDefinition => (
            "Resolve the definition behind a source position.",
            position_schema(),
        ),
        ToolName::FindReferences => (
            "List usages of a source position.",
            position_schema(),
        ),
        ToolName::RunUnitTests => (
            "Run the unit tests of an object.",
            object_schema(&[("object_uri", json!({"type": "string"}))], &["object_uri"]),
        ),
        ToolName::SyntaxCheck => (
            "Run a syntax check, optionally over unsaved source.",
            object_schema(&[
                ("object_uri", json!({"type": "string"})),
                ("source", json!({"type": "string"})),
            ], &["object_uri"]),
        ),
        ToolName::LockObject => (
            "Acquire a modify lock and return its handle.",
            identity_schema(),
        ),
        ToolName::UnlockObject => (
            "Release a previously acquired lock.",
            object_schema(&[
                ("object_type", json!({"type": "string"})),
                ("name", json!({"type": "string"})),
                ("parent", json!({"type": "string"})),
                ("lock_handle", json!({"type": "string"})),
            ], &["object_type", "name", "lock_handle"]),
        ),
        ToolName::GetProgram => ("Read a program source.", named_schema()),
        ToolName::GetClass => ("Read a class main source.", named_schema()),
        ToolName::GetInterface => ("Read an interface source.", named_schema()),
        ToolName::GetFunction => (
            "Read a function module source.",
            object_schema(&[
                ("group", json!({"type": "string"})),
                ("name", json!({"type": "string"})),
            ], &["group", "name"]),
        ),
        ToolName::GetInclude => ("Read a program include source.", named_schema()),
        ToolName::GetTable => ("Read a table definition.", named_schema()),
        ToolName::GetPackage => ("List the contents of a package.", named_schema()),
        ToolName::GetMessageClass => ("Read a message class with its records.", named_schema()),
        ToolName::GetClassStructure => (
            "Read a class structure: includes and method line ranges.",
            named_schema(),
        ),
        ToolName::GetCallGraph => (
            "Retrieve a call graph with flattened edges and statistics.",
            object_schema(&[
                ("object_uri", json!({"type": "string"})),
                ("direction", json!({"type": "string", "enum": ["callers", "callees"]})),
                ("max_depth", json!({"type": "integer"})),
                ("max_results", json!({"type": "integer"})),
            ], &["object_uri"]),
        ),
        ToolName::TraceExecution => (
            "Correlate a static call graph with the newest runtime trace.",
            object_schema(&[
                ("object_uri", json!({"type": "string"})),
                ("max_depth", json!({"type": "integer"})),
                ("run_tests", json!({"type": "boolean"})),
                ("test_object_uri", json!({"type": "string"})),
                ("trace_user", json!({"type": "string"})),
            ], &[]),
        ),
        ToolName::CreateObject => (
            "Create a repository object in a package.",
            object_schema(&[
                ("object_type", json!({"type": "string"})),
                ("name", json!({"type": "string"})),
                ("package", json!({"type": "string"})),
                ("description", json!({"type": "string"})),
            ], &["object_type", "name", "package"]),
        ),
        ToolName::ActivateObject => ("Activate a repository object.", identity_schema()),
        ToolName::WriteMessageClass => (
            "Update, insert, or delete message-class records surgically.",
            object_schema(&[
                ("name", json!({"type": "string"})),
                ("updates", json!({"type": "object", "additionalProperties": {"type": "string"}})),
            ], &["name", "updates"]),
        ),
    };
    ToolDefinition {
        name: tool.as_str(),
        description,
        input_schema,
    }
}

// ============================================================================
// SECTION: Schema Builders
// ============================================================================

/// Builds an object schema from property and required lists.
fn object_schema(properties: &[(&str, Value)], required: &[&str]) -> Value {
    let mut map = serde_json::Map::new();
    for (name, schema) in properties {
        map.insert((*name).to_string(), schema.clone());
    }
    json!({
        "type": "object",
        "properties": Value::Object(map),
        "required": required,
        "additionalProperties": false,
    })
}

/// Schema for tools addressing an object by type and name.
fn identity_schema() -> Value {
    object_schema(
        &[
            ("object_type", json!({"type": "string"})),
            ("name", json!({"type": "string"})),
            ("parent", json!({"type": "string"})),
        ],
        &["object_type", "name"],
    )
}

/// Schema for tools addressing an object by bare name.
fn named_schema() -> Value {
    object_schema(&[("name", json!({"type": "string"}))], &["name"])
}

/// Schema for tools addressing a source position.
fn position_schema() -> Value {
    object_schema(
        &[
            ("source_uri", json!({"type": "string"})),
            ("line", json!({"type": "integer"})),
            ("column", json!({"type": "integer"})),
        ],
        &["source_uri", "line", "column"],
    )
}

// ============================================================================
// SECTION: Tests
// ============================================================================
