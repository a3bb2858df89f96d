// crates/adt-bridge-tools/src/router.rs
// ============================================================================
// Module: Tool Router
// Description: Policy-gated dispatch from tool names to client operations.
// Purpose: Shape every operation into one stable JSON envelope.
// Dependencies: adt-bridge-client, adt-bridge-core, serde_json
// ============================================================================

//! ## Overview
//! The router resolves a tool name, checks the safety policy for the
//! operation class and target, decodes the payload, and calls the typed
//! client operation. Denials never reach the transport. Success and
//! failure both leave as the same envelope shape, with a stable error
//! `kind` label for programmatic handling.
//!
//! Security posture: tool payloads are untrusted; decoding failures and
//! policy denials fail closed before any request is issued.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use adt_bridge_client::AdtClient;
use adt_bridge_client::AdtError;
use adt_bridge_client::CallGraphOptions;
use adt_bridge_client::TraceExecutionOptions;
use adt_bridge_client::WriteOptions;
use adt_bridge_client::analysis::analyze_call_graph;
use adt_bridge_client::analysis::flatten_call_graph;
use adt_bridge_core::ClassInclude;
use adt_bridge_core::ErrorKind;
use adt_bridge_core::ObjectIdentity;
use adt_bridge_core::ObjectKind;
use adt_bridge_core::OperationClass;
use adt_bridge_core::PolicyError;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

use crate::contract::ToolDefinition;
use crate::contract::ToolName;
use crate::contract::ToolProfile;
use crate::contract::tool_definitions;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised by tool routing.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The tool name is unknown or outside the active profile.
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    /// The payload failed to decode or misses required fields.
    #[error("invalid params: {0}")]
    InvalidParams(String),
    /// The safety policy refused the operation.
    #[error(transparent)]
    Policy(#[from] PolicyError),
    /// The client operation failed.
    #[error(transparent)]
    Client(#[from] AdtError),
}

impl ToolError {
    /// Maps the error onto the stable envelope taxonomy.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownTool(_) | Self::InvalidParams(_) => ErrorKind::InvalidArgument,
            Self::Policy(_) => ErrorKind::PermissionDenied,
            Self::Client(err) => err.kind(),
        }
    }
}

// ============================================================================
// SECTION: Router
// ============================================================================

/// Policy-gated tool router over one client.
pub struct ToolRouter {
    /// Client executing the typed operations.
    client: Arc<AdtClient>,
    /// Active operation-set profile.
    profile: ToolProfile,
}

impl ToolRouter {
    /// Creates a router for the given client and profile.
    #[must_use]
    pub const fn new(client: Arc<AdtClient>, profile: ToolProfile) -> Self {
        Self {
            client,
            profile,
        }
    }

    /// Lists the tools visible in the active profile.
    #[must_use]
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        tool_definitions(self.profile)
    }

    /// Handles a tool call and wraps the outcome in the stable envelope.
    pub async fn dispatch(&self, name: &str, payload: Value) -> Value {
        match self.handle_tool_call(name, payload).await {
            Ok(data) => json!({ "success": true, "data": data }),
            Err(err) => json!({
                "success": false,
                "error": { "kind": err.kind().as_str(), "message": err.to_string() },
            }),
        }
    }

    /// Handles a tool call by name with a JSON payload.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError`] for unknown tools, malformed payloads, policy
    /// denials, and failing client operations.
    pub async fn handle_tool_call(&self, name: &str, payload: Value) -> Result<Value, ToolError> {
        let tool = ToolName::parse(name)
            .filter(|tool| tool.in_profile(self.profile))
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        match tool {
            ToolName::GetSource => self.handle_get_source(payload).await,
            ToolName::WriteSource => self.handle_write_source(payload).await,
            ToolName::EditSource => self.handle_edit_source(payload).await,
            ToolName::GrepObject => self.handle_grep_object(payload).await,
            ToolName::GrepPackage => self.handle_grep_package(payload).await,
            ToolName::SearchObject => self.handle_search_object(payload).await,
            ToolName::QueryData => self.handle_query_data(payload).await,
            ToolName::FindDefinition => self.handle_find_definition(payload).await,
            ToolName::FindReferences => self.handle_find_references(payload).await,
            ToolName::RunUnitTests => self.handle_run_unit_tests(payload).await,
            ToolName::SyntaxCheck => self.handle_syntax_check(payload).await,
            ToolName::LockObject => self.handle_lock_object(payload).await,
            ToolName::UnlockObject => self.handle_unlock_object(payload).await,
            ToolName::GetProgram => self.handle_named_read(payload, ObjectKind::Program).await,
            ToolName::GetClass => self.handle_named_read(payload, ObjectKind::Class).await,
            ToolName::GetInterface => self.handle_named_read(payload, ObjectKind::Interface).await,
            ToolName::GetFunction => self.handle_get_function(payload).await,
            ToolName::GetInclude => self.handle_named_read(payload, ObjectKind::Include).await,
            ToolName::GetTable => self.handle_named_read(payload, ObjectKind::Table).await,
            ToolName::GetPackage => self.handle_get_package(payload).await,
            ToolName::GetMessageClass => self.handle_get_message_class(payload).await,
            ToolName::GetClassStructure => self.handle_get_class_structure(payload).await,
            ToolName::GetCallGraph => self.handle_get_call_graph(payload).await,
            ToolName::TraceExecution => self.handle_trace_execution(payload).await,
            ToolName::CreateObject => self.handle_create_object(payload).await,
            ToolName::ActivateObject => self.handle_activate_object(payload).await,
            ToolName::WriteMessageClass => self.handle_write_message_class(payload).await,
        }
    }

    /// Checks the safety policy before any client call.
    fn gate(&self, class: OperationClass, target: &str) -> Result<(), ToolError> {
        self.client.config().safety.check_operation(class, target)?;
        Ok(())
    }

    // ========================================================================
    // SECTION: Focused Handlers
    // ========================================================================

    /// Handles `get_source`.
    async fn handle_get_source(&self, payload: Value) -> Result<Value, ToolError> {
        let request: GetSourceRequest = decode(payload)?;
        self.gate(OperationClass::Read, &request.name)?;
        let kind = parse_kind(&request.object_type)?;
        if let Some(method) = &request.method {
            if kind != ObjectKind::Class {
                return Err(ToolError::InvalidParams(
                    "method extraction requires a class".to_string(),
                ));
            }
            let source = self.client.get_class_method_source(&request.name, method).await?;
            return Ok(json!({ "source": source }));
        }
        let mut identity = ObjectIdentity::new(kind, &request.name);
        if let Some(parent) = &request.parent {
            identity = identity.with_parent(parent);
        }
        if let Some(include) = &request.include {
            let include = ClassInclude::parse(include).ok_or_else(|| {
                ToolError::InvalidParams(format!("unknown include: {include}"))
            })?;
            identity = identity.with_include(include);
        }
        let source = self.client.get_source(&identity).await?;
        Ok(json!({ "source": source }))
    }

    /// Handles `write_source`; the explicit mode is mandatory.
    async fn handle_write_source(&self, payload: Value) -> Result<Value, ToolError> {
        let request: WriteSourceRequest = decode(payload)?;
        let Some(mode) = request.mode.as_deref() else {
            return Err(ToolError::InvalidParams(
                "write_source requires mode: create or update".to_string(),
            ));
        };
        let create = match mode {
            "create" => true,
            "update" => false,
            other => {
                return Err(ToolError::InvalidParams(format!(
                    "invalid mode {other}: expected create or update"
                )));
            }
        };
        self.gate(
            if create { OperationClass::Create } else { OperationClass::Write },
            &request.name,
        )?;
        let kind = parse_kind(&request.object_type)?;
        let mut identity = ObjectIdentity::new(kind, &request.name);
        if let Some(parent) = &request.parent {
            identity = identity.with_parent(parent);
        }
        let sources = collect_sources(request.source, request.sources)?;
        let options = WriteOptions {
            create_if_missing: create,
            transport: request.transport,
            activate: request.activate,
            package: request.package,
        };
        let result = self.client.write_object(&identity, &sources, &options).await?;
        serialize(result)
    }

    /// Handles `edit_source`.
    async fn handle_edit_source(&self, payload: Value) -> Result<Value, ToolError> {
        let request: EditSourceRequest = decode(payload)?;
        self.gate(OperationClass::Write, &request.name)?;
        let kind = parse_kind(&request.object_type)?;
        let mut identity = ObjectIdentity::new(kind, &request.name);
        if let Some(parent) = &request.parent {
            identity = identity.with_parent(parent);
        }
        let include = request.include.unwrap_or_else(|| "main".to_string());
        self.client
            .edit_source(&identity, &include, &request.source, &request.lock_handle)
            .await?;
        Ok(json!({ "updated": include }))
    }

    /// Handles `grep_object`.
    async fn handle_grep_object(&self, payload: Value) -> Result<Value, ToolError> {
        let request: GrepObjectRequest = decode(payload)?;
        self.gate(OperationClass::Read, &request.name)?;
        let kind = parse_kind(&request.object_type)?;
        let mut identity = ObjectIdentity::new(kind, &request.name);
        if let Some(parent) = &request.parent {
            identity = identity.with_parent(parent);
        }
        let matches = self.client.grep_object(&identity, &request.pattern).await?;
        serialize(matches)
    }

    /// Handles `grep_package`.
    async fn handle_grep_package(&self, payload: Value) -> Result<Value, ToolError> {
        let request: GrepPackageRequest = decode(payload)?;
        self.gate(OperationClass::Read, &request.package)?;
        let matches = self.client.grep_package(&request.package, &request.pattern).await?;
        serialize(matches)
    }

    /// Handles `search_object`.
    async fn handle_search_object(&self, payload: Value) -> Result<Value, ToolError> {
        let request: SearchRequest = decode(payload)?;
        self.gate(OperationClass::Read, &request.query)?;
        let results = self
            .client
            .search_object(&request.query, request.max_results.unwrap_or(0))
            .await?;
        serialize(results)
    }

    /// Handles `query_data`.
    async fn handle_query_data(&self, payload: Value) -> Result<Value, ToolError> {
        let request: QueryDataRequest = decode(payload)?;
        self.gate(OperationClass::Execute, &request.query)?;
        let result = self
            .client
            .query_data(&request.query, request.max_rows.unwrap_or(0))
            .await?;
        serialize(result)
    }

    /// Handles `find_definition`.
    async fn handle_find_definition(&self, payload: Value) -> Result<Value, ToolError> {
        let request: PositionRequest = decode(payload)?;
        self.gate(OperationClass::Read, &request.source_uri)?;
        let target = self
            .client
            .find_definition(&request.source_uri, request.line, request.column)
            .await?;
        serialize(target)
    }

    /// Handles `find_references`.
    async fn handle_find_references(&self, payload: Value) -> Result<Value, ToolError> {
        let request: PositionRequest = decode(payload)?;
        self.gate(OperationClass::Read, &request.source_uri)?;
        let references = self
            .client
            .find_references(&request.source_uri, request.line, request.column)
            .await?;
        serialize(references)
    }

    /// Handles `run_unit_tests`.
    async fn handle_run_unit_tests(&self, payload: Value) -> Result<Value, ToolError> {
        let request: ObjectUriRequest = decode(payload)?;
        self.gate(OperationClass::Execute, &request.object_uri)?;
        let result = self.client.run_unit_tests(&request.object_uri).await?;
        serialize(result)
    }

    /// Handles `syntax_check`.
    async fn handle_syntax_check(&self, payload: Value) -> Result<Value, ToolError> {
        let request: SyntaxCheckRequest = decode(payload)?;
        self.gate(OperationClass::Read, &request.object_uri)?;
        let messages = self
            .client
            .syntax_check(&request.object_uri, request.source.as_deref())
            .await?;
        serialize(messages)
    }

    /// Handles `lock_object`.
    async fn handle_lock_object(&self, payload: Value) -> Result<Value, ToolError> {
        let request: IdentityRequest = decode(payload)?;
        self.gate(OperationClass::Lock, &request.name)?;
        let identity = request.into_identity()?;
        let lock = self.client.lock_object(&identity).await?;
        serialize(lock)
    }

    /// Handles `unlock_object`.
    async fn handle_unlock_object(&self, payload: Value) -> Result<Value, ToolError> {
        let request: UnlockRequest = decode(payload)?;
        self.gate(OperationClass::Lock, &request.name)?;
        let kind = parse_kind(&request.object_type)?;
        let mut identity = ObjectIdentity::new(kind, &request.name);
        if let Some(parent) = &request.parent {
            identity = identity.with_parent(parent);
        }
        self.client.unlock_object(&identity, &request.lock_handle).await?;
        Ok(json!({ "unlocked": identity.name }))
    }

    // ========================================================================
    // SECTION: Expert Handlers
    // ========================================================================

    /// Handles the per-kind named source reads.
    async fn handle_named_read(&self, payload: Value, kind: ObjectKind) -> Result<Value, ToolError> {
        let request: NamedRequest = decode(payload)?;
        self.gate(OperationClass::Read, &request.name)?;
        let source = self.client.get_source(&ObjectIdentity::new(kind, &request.name)).await?;
        Ok(json!({ "source": source }))
    }

    /// Handles `get_function`.
    async fn handle_get_function(&self, payload: Value) -> Result<Value, ToolError> {
        let request: FunctionRequest = decode(payload)?;
        self.gate(OperationClass::Read, &request.name)?;
        let source = self.client.get_function(&request.group, &request.name).await?;
        Ok(json!({ "source": source }))
    }

    /// Handles `get_package`.
    async fn handle_get_package(&self, payload: Value) -> Result<Value, ToolError> {
        let request: NamedRequest = decode(payload)?;
        self.gate(OperationClass::Read, &request.name)?;
        let content = self.client.get_package(&request.name).await?;
        serialize(content)
    }

    /// Handles `get_message_class`.
    async fn handle_get_message_class(&self, payload: Value) -> Result<Value, ToolError> {
        let request: NamedRequest = decode(payload)?;
        self.gate(OperationClass::Read, &request.name)?;
        let message_class = self.client.get_message_class(&request.name).await?;
        serialize(message_class)
    }

    /// Handles `get_class_structure`.
    async fn handle_get_class_structure(&self, payload: Value) -> Result<Value, ToolError> {
        let request: NamedRequest = decode(payload)?;
        self.gate(OperationClass::Read, &request.name)?;
        let structure = self.client.get_class_structure(&request.name).await?;
        serialize(structure)
    }

    /// Handles `get_call_graph`, returning the tree, edges, and stats.
    async fn handle_get_call_graph(&self, payload: Value) -> Result<Value, ToolError> {
        let request: CallGraphRequest = decode(payload)?;
        self.gate(OperationClass::Read, &request.object_uri)?;
        let mut options = CallGraphOptions::default();
        if let Some(direction) = request.direction {
            options.direction = direction;
        }
        if let Some(max_depth) = request.max_depth {
            options.max_depth = max_depth;
        }
        if let Some(max_results) = request.max_results {
            options.max_results = max_results;
        }
        let graph = self.client.get_call_graph(&request.object_uri, &options).await?;
        let edges = flatten_call_graph(&graph);
        let stats = analyze_call_graph(&graph);
        Ok(json!({ "graph": graph, "edges": edges, "stats": stats }))
    }

    /// Handles `trace_execution`.
    async fn handle_trace_execution(&self, payload: Value) -> Result<Value, ToolError> {
        let request: TraceExecutionRequest = decode(payload)?;
        self.gate(
            OperationClass::Execute,
            request.object_uri.as_deref().unwrap_or_default(),
        )?;
        let options = TraceExecutionOptions {
            object_uri: request.object_uri,
            max_depth: request.max_depth.unwrap_or(0),
            run_tests: request.run_tests,
            test_object_uri: request.test_object_uri,
            trace_user: request.trace_user,
        };
        let result = self.client.trace_execution(&options).await?;
        serialize(result)
    }

    /// Handles `create_object`.
    async fn handle_create_object(&self, payload: Value) -> Result<Value, ToolError> {
        let request: CreateObjectRequest = decode(payload)?;
        self.gate(OperationClass::Create, &request.name)?;
        let kind = parse_kind(&request.object_type)?;
        self.client
            .create_object(
                kind,
                &request.name,
                &request.package,
                request.description.as_deref().unwrap_or_default(),
            )
            .await?;
        Ok(json!({ "created": request.name.to_ascii_uppercase() }))
    }

    /// Handles `activate_object`.
    async fn handle_activate_object(&self, payload: Value) -> Result<Value, ToolError> {
        let request: IdentityRequest = decode(payload)?;
        self.gate(OperationClass::Write, &request.name)?;
        let identity = request.into_identity()?;
        let messages = self.client.activate_object(&identity).await?;
        Ok(json!({ "activated": identity.name, "messages": messages }))
    }

    /// Handles `write_message_class`.
    async fn handle_write_message_class(&self, payload: Value) -> Result<Value, ToolError> {
        let request: WriteMessageClassRequest = decode(payload)?;
        self.gate(OperationClass::Write, &request.name)?;
        let edit = self.client.update_message_class(&request.name, &request.updates).await?;
        Ok(json!({ "updated": edit.updated, "deleted": edit.deleted }))
    }
}

// ============================================================================
// SECTION: Request Payloads
// ============================================================================

/// `get_source` payload.
#[derive(Debug, Deserialize)]
struct GetSourceRequest {
    /// Object kind label.
    object_type: String,
    /// Object name.
    name: String,
    /// Containing object, when required.
    #[serde(default)]
    parent: Option<String>,
    /// Class include tag.
    #[serde(default)]
    include: Option<String>,
    /// Method whose implementation to extract.
    #[serde(default)]
    method: Option<String>,
}

/// `write_source` payload.
#[derive(Debug, Deserialize)]
struct WriteSourceRequest {
    /// Object kind label.
    object_type: String,
    /// Object name.
    name: String,
    /// Explicit mode (`create` or `update`); mandatory.
    #[serde(default)]
    mode: Option<String>,
    /// Main source shorthand.
    #[serde(default)]
    source: Option<String>,
    /// Per-include sources.
    #[serde(default)]
    sources: Option<BTreeMap<String, String>>,
    /// Containing object, when required.
    #[serde(default)]
    parent: Option<String>,
    /// Package for creation.
    #[serde(default)]
    package: Option<String>,
    /// Transport request.
    #[serde(default)]
    transport: Option<String>,
    /// Activate after writing.
    #[serde(default)]
    activate: bool,
}

/// `edit_source` payload.
#[derive(Debug, Deserialize)]
struct EditSourceRequest {
    /// Object kind label.
    object_type: String,
    /// Object name.
    name: String,
    /// Containing object, when required.
    #[serde(default)]
    parent: Option<String>,
    /// Include tag (defaults to `main`).
    #[serde(default)]
    include: Option<String>,
    /// New source text.
    source: String,
    /// Caller-held lock handle.
    lock_handle: String,
}

/// `grep_object` payload.
#[derive(Debug, Deserialize)]
struct GrepObjectRequest {
    /// Object kind label.
    object_type: String,
    /// Object name.
    name: String,
    /// Containing object, when required.
    #[serde(default)]
    parent: Option<String>,
    /// Search pattern.
    pattern: String,
}

/// `grep_package` payload.
#[derive(Debug, Deserialize)]
struct GrepPackageRequest {
    /// Package name.
    package: String,
    /// Search pattern.
    pattern: String,
}

/// `search_object` payload.
#[derive(Debug, Deserialize)]
struct SearchRequest {
    /// Name pattern.
    query: String,
    /// Result cap.
    #[serde(default)]
    max_results: Option<u32>,
}

/// `query_data` payload.
#[derive(Debug, Deserialize)]
struct QueryDataRequest {
    /// Query text or bare identifier.
    query: String,
    /// Row cap.
    #[serde(default)]
    max_rows: Option<u32>,
}

/// Source position payload.
#[derive(Debug, Deserialize)]
struct PositionRequest {
    /// Source URI.
    source_uri: String,
    /// Line (1-based).
    line: u32,
    /// Column (0-based).
    column: u32,
}

/// Object URI payload.
#[derive(Debug, Deserialize)]
struct ObjectUriRequest {
    /// Repository object URI.
    object_uri: String,
}

/// `syntax_check` payload.
#[derive(Debug, Deserialize)]
struct SyntaxCheckRequest {
    /// Repository object URI.
    object_uri: String,
    /// Unsaved source to check instead of the stored one.
    #[serde(default)]
    source: Option<String>,
}

/// Identity payload (lock, activate).
#[derive(Debug, Deserialize)]
struct IdentityRequest {
    /// Object kind label.
    object_type: String,
    /// Object name.
    name: String,
    /// Containing object, when required.
    #[serde(default)]
    parent: Option<String>,
}

impl IdentityRequest {
    /// Converts the payload into an identity.
    fn into_identity(self) -> Result<ObjectIdentity, ToolError> {
        let kind = parse_kind(&self.object_type)?;
        let mut identity = ObjectIdentity::new(kind, &self.name);
        if let Some(parent) = &self.parent {
            identity = identity.with_parent(parent);
        }
        Ok(identity)
    }
}

/// `unlock_object` payload.
#[derive(Debug, Deserialize)]
struct UnlockRequest {
    /// Object kind label.
    object_type: String,
    /// Object name.
    name: String,
    /// Containing object, when required.
    #[serde(default)]
    parent: Option<String>,
    /// Lock handle to release.
    lock_handle: String,
}

/// Bare-name payload for per-kind reads.
#[derive(Debug, Deserialize)]
struct NamedRequest {
    /// Object name.
    name: String,
}

/// `get_function` payload.
#[derive(Debug, Deserialize)]
struct FunctionRequest {
    /// Function group name.
    group: String,
    /// Function module name.
    name: String,
}

/// `get_call_graph` payload.
#[derive(Debug, Deserialize)]
struct CallGraphRequest {
    /// Starting object URI.
    object_uri: String,
    /// Traversal direction.
    #[serde(default)]
    direction: Option<String>,
    /// Depth cap.
    #[serde(default)]
    max_depth: Option<u32>,
    /// Node cap.
    #[serde(default)]
    max_results: Option<u32>,
}

/// `trace_execution` payload.
#[derive(Debug, Deserialize)]
struct TraceExecutionRequest {
    /// Starting object URI.
    #[serde(default)]
    object_uri: Option<String>,
    /// Depth cap for the static graph.
    #[serde(default)]
    max_depth: Option<u32>,
    /// Trigger unit tests first.
    #[serde(default)]
    run_tests: bool,
    /// Object whose tests to run.
    #[serde(default)]
    test_object_uri: Option<String>,
    /// Trace user filter.
    #[serde(default)]
    trace_user: Option<String>,
}

/// `create_object` payload.
#[derive(Debug, Deserialize)]
struct CreateObjectRequest {
    /// Object kind label.
    object_type: String,
    /// Object name.
    name: String,
    /// Target package.
    package: String,
    /// Short description.
    #[serde(default)]
    description: Option<String>,
}

/// `write_message_class` payload.
#[derive(Debug, Deserialize)]
struct WriteMessageClassRequest {
    /// Message class name.
    name: String,
    /// Message number to text map; empty text deletes the record.
    updates: BTreeMap<String, String>,
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Decodes a payload into a typed request.
fn decode<T: DeserializeOwned>(payload: Value) -> Result<T, ToolError> {
    serde_json::from_value(payload).map_err(|err| ToolError::InvalidParams(err.to_string()))
}

/// Serializes an operation result into the envelope data slot.
fn serialize<T: serde::Serialize>(value: T) -> Result<Value, ToolError> {
    serde_json::to_value(value).map_err(|err| ToolError::InvalidParams(err.to_string()))
}

/// Parses an object kind label.
fn parse_kind(label: &str) -> Result<ObjectKind, ToolError> {
    ObjectKind::parse(label)
        .ok_or_else(|| ToolError::InvalidParams(format!("unknown object type: {label}")))
}

/// Collects write sources from the shorthand and the per-include map.
fn collect_sources(
    source: Option<String>,
    sources: Option<BTreeMap<String, String>>,
) -> Result<Vec<(String, String)>, ToolError> {
    let mut collected = Vec::new();
    if let Some(source) = source {
        collected.push(("main".to_string(), source));
    }
    if let Some(sources) = sources {
        for (include, text) in sources {
            if collected.iter().any(|(existing, _)| existing == &include) {
                return Err(ToolError::InvalidParams(format!(
                    "include {include} supplied twice"
                )));
            }
            collected.push((include, text));
        }
    }
    if collected.is_empty() {
        return Err(ToolError::InvalidParams(
            "write_source requires source or sources".to_string(),
        ));
    }
    Ok(collected)
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

    /// Tests source collection from shorthand and map.
    #[test]
    fn collect_sources_merges_shorthand_and_map() {
        let sources = collect_sources(
            Some("REPORT x.".to_string()),
            Some(BTreeMap::from([(
                "testclasses".to_string(),
                "CLASS ltcl DEFINITION.".to_string(),
            )])),
        )
        .expect("sources");
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].0, "main");

        let duplicate = collect_sources(
            Some("a".to_string()),
            Some(BTreeMap::from([("main".to_string(), "b".to_string())])),
        );
        assert!(duplicate.is_err());

        assert!(collect_sources(None, None).is_err());
    }

    /// Tests object kind parsing errors.
    #[test]
    fn unknown_kind_is_invalid_params() {
        let err = parse_kind("gadget").unwrap_err();
        assert!(matches!(err, ToolError::InvalidParams(_)));
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }
}
