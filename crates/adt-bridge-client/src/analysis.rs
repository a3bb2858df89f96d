// crates/adt-bridge-client/src/analysis.rs
// ============================================================================
// Module: Call Graph and Trace Analysis
// Description: Call graph retrieval, statistics, and trace correlation.
// Purpose: Compare statically predicted calls with observed executions.
// Dependencies: adt-bridge-core, serde
// ============================================================================

//! ## Overview
//! The analysis surface has two halves: retrieval (call graphs and runtime
//! traces from the server) and pure post-processing (flatten, statistics,
//! comparison, trace edge extraction). The protocol hides cycles behind
//! tree duplication, so statistics deduplicate nodes by URI while the
//! flattened edge list intentionally does not.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use adt_bridge_core::OperationClass;
use serde::Deserialize;
use serde::Serialize;

use crate::client::AdtClient;
use crate::error::AdtError;
use crate::transport::RequestOptions;
use crate::xml::XmlElement;
use crate::xml::escape_attribute;
use crate::xml::parse_tolerant;

// ============================================================================
// SECTION: Types
// ============================================================================

/// One node of a call graph tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallGraphNode {
    /// Repository URI of the node.
    pub uri: String,
    /// Object name.
    pub name: String,
    /// Repository type code.
    #[serde(rename = "type")]
    pub node_type: String,
    /// Short description, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Call site line, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// Call site column, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
    /// Child calls in document order.
    #[serde(default)]
    pub children: Vec<CallGraphNode>,
}

/// Options for call graph retrieval.
#[derive(Debug, Clone, Deserialize)]
pub struct CallGraphOptions {
    /// Traversal direction (`callers` or `callees`).
    pub direction: String,
    /// Maximum traversal depth.
    pub max_depth: u32,
    /// Maximum number of returned nodes.
    pub max_results: u32,
}

impl Default for CallGraphOptions {
    fn default() -> Self {
        Self {
            direction: "callees".to_string(),
            max_depth: 3,
            max_results: 100,
        }
    }
}

/// One caller-to-callee edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallGraphEdge {
    /// Caller URI.
    pub caller_uri: String,
    /// Caller name.
    pub caller_name: String,
    /// Callee URI.
    pub callee_uri: String,
    /// Callee name.
    pub callee_name: String,
    /// Call site line, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

/// Statistics over one call graph tree.
#[derive(Debug, Clone, Serialize)]
pub struct CallGraphStats {
    /// Unique node count (deduplicated by URI).
    pub total_nodes: usize,
    /// Edge count (every parent-child pair).
    pub total_edges: usize,
    /// Maximum tree depth (root is depth zero).
    pub max_depth: u32,
    /// Unique node counts per repository type.
    pub nodes_by_type: BTreeMap<String, usize>,
    /// Names of the unique nodes in first-seen order.
    pub unique_nodes: Vec<String>,
}

/// Comparison of a static call graph with observed execution edges.
#[derive(Debug, Clone, Serialize)]
pub struct CallGraphComparison {
    /// Edges present in both graphs.
    pub common_edges: Vec<CallGraphEdge>,
    /// Edges predicted statically but not observed.
    pub static_only: Vec<CallGraphEdge>,
    /// Edges observed at runtime only (dynamic calls).
    pub actual_only: Vec<CallGraphEdge>,
    /// `|common| / |static|`, zero when the static set is empty.
    pub coverage_ratio: f64,
}

/// One entry of a runtime trace hitlist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEntry {
    /// Executing program.
    pub program: String,
    /// Trace event description.
    pub event: String,
    /// Source line, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// Hit count, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hits: Option<u64>,
    /// Net time in microseconds, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub net_time: Option<u64>,
}

/// Aggregated trace analysis.
#[derive(Debug, Clone, Serialize)]
pub struct TraceAnalysis {
    /// Trace identifier.
    pub id: String,
    /// Hitlist entries in recorded order.
    pub entries: Vec<TraceEntry>,
    /// Total wall time in microseconds.
    pub total_time: u64,
}

/// Metadata of one stored trace.
#[derive(Debug, Clone, Serialize)]
pub struct TraceHeader {
    /// Trace identifier.
    pub id: String,
    /// Traced object or request description.
    pub title: String,
    /// Recording user.
    pub user: String,
    /// Publication timestamp as reported by the server.
    pub published: String,
}

/// Options for listing stored traces.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TraceQueryOptions {
    /// Filter traces by recording user.
    #[serde(default)]
    pub user: Option<String>,
    /// Maximum number of returned traces.
    #[serde(default)]
    pub max_results: u32,
}

/// Options for the traced-execution composite.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TraceExecutionOptions {
    /// Starting object for the static call graph.
    #[serde(default)]
    pub object_uri: Option<String>,
    /// Maximum static traversal depth.
    #[serde(default)]
    pub max_depth: u32,
    /// Trigger the object's unit tests before trace collection.
    #[serde(default)]
    pub run_tests: bool,
    /// Object whose tests to run (defaults to `object_uri`).
    #[serde(default)]
    pub test_object_uri: Option<String>,
    /// Filter traces by user (defaults to the configured user).
    #[serde(default)]
    pub trace_user: Option<String>,
}

/// Result of the traced-execution composite.
///
/// Every step is fault-tolerant: a failed step leaves its field empty and
/// the remaining steps still run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TraceExecutionResult {
    /// Static call graph, when retrieval succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub static_graph: Option<CallGraphNode>,
    /// Statistics over the static graph.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub static_stats: Option<CallGraphStats>,
    /// Tests executed to trigger the trace.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub executed_tests: Vec<String>,
    /// Newest matching trace analysis.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<TraceAnalysis>,
    /// Edges extracted from the trace.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub actual_edges: Vec<CallGraphEdge>,
    /// Static versus actual comparison.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison: Option<CallGraphComparison>,
    /// Total execution time in microseconds, when a trace was found.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time_us: Option<u64>,
}

// ============================================================================
// SECTION: Retrieval
// ============================================================================

impl AdtClient {
    /// Retrieves the call graph of an object.
    ///
    /// # Errors
    ///
    /// Returns [`AdtError`] for policy denials, transport failures, and
    /// malformed payloads.
    pub async fn get_call_graph(
        &self,
        object_uri: &str,
        options: &CallGraphOptions,
    ) -> Result<CallGraphNode, AdtError> {
        self.check(OperationClass::Read, object_uri)?;
        let body = format!(
            concat!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
                "<cai:callGraphRequest xmlns:cai=\"http://www.sap.com/adt/cai\">\n",
                "  <cai:objectUri>{uri}</cai:objectUri>\n",
                "</cai:callGraphRequest>",
            ),
            uri = escape_attribute(object_uri)
        );
        let request = RequestOptions::post()
            .with_query("direction", &options.direction)
            .with_query("maxDepth", &options.max_depth.to_string())
            .with_query("maxResults", &options.max_results.to_string())
            .with_accept("application/xml")
            .with_body("application/xml", body.into_bytes());
        let response = self.transport().request("/sap/bc/adt/cai/callgraph", request).await?;
        let tree = parse_tolerant(&response.body)?;
        let root = tree
            .find_first("node")
            .ok_or(crate::xml::CodecError::MissingElement("node"))?;
        Ok(decode_call_graph_node(root))
    }

    /// Retrieves who calls the object (upward traversal).
    ///
    /// # Errors
    ///
    /// Returns [`AdtError`] for policy denials, transport failures, and
    /// malformed payloads.
    pub async fn get_callers_of(
        &self,
        object_uri: &str,
        max_depth: u32,
    ) -> Result<CallGraphNode, AdtError> {
        let options = CallGraphOptions {
            direction: "callers".to_string(),
            max_depth: if max_depth == 0 { 5 } else { max_depth },
            max_results: 500,
        };
        self.get_call_graph(object_uri, &options).await
    }

    /// Retrieves what the object calls (downward traversal).
    ///
    /// # Errors
    ///
    /// Returns [`AdtError`] for policy denials, transport failures, and
    /// malformed payloads.
    pub async fn get_callees_of(
        &self,
        object_uri: &str,
        max_depth: u32,
    ) -> Result<CallGraphNode, AdtError> {
        let options = CallGraphOptions {
            direction: "callees".to_string(),
            max_depth: if max_depth == 0 { 5 } else { max_depth },
            max_results: 500,
        };
        self.get_call_graph(object_uri, &options).await
    }

    /// Lists stored runtime traces, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`AdtError`] for policy denials, transport failures, and
    /// malformed payloads.
    pub async fn list_traces(
        &self,
        options: &TraceQueryOptions,
    ) -> Result<Vec<TraceHeader>, AdtError> {
        let user = options.user.clone().unwrap_or_default();
        self.check(OperationClass::Read, &user)?;
        let mut request = RequestOptions::get().with_accept("application/xml");
        if !user.is_empty() {
            request = request.with_query("user", &user.to_ascii_uppercase());
        }
        if options.max_results > 0 {
            request = request.with_query("maxResults", &options.max_results.to_string());
        }
        let response = self
            .transport()
            .request("/sap/bc/adt/runtime/traces/abaptraces", request)
            .await?;
        let tree = parse_tolerant(&response.body)?;
        Ok(tree
            .find_all("trace")
            .iter()
            .filter_map(|trace| {
                trace.attr("id").map(|id| TraceHeader {
                    id: id.to_string(),
                    title: trace.attr("title").unwrap_or_default().to_string(),
                    user: trace.attr("user").unwrap_or_default().to_string(),
                    published: trace.attr("published").unwrap_or_default().to_string(),
                })
            })
            .collect())
    }

    /// Downloads one trace's analysis (`hitlist` is the common kind).
    ///
    /// # Errors
    ///
    /// Returns [`AdtError`] for policy denials, transport failures, and
    /// malformed payloads.
    pub async fn get_trace(&self, id: &str, kind: &str) -> Result<TraceAnalysis, AdtError> {
        self.check(OperationClass::Read, id)?;
        let path = format!("/sap/bc/adt/runtime/traces/abaptraces/{id}/{kind}");
        let request = RequestOptions::get().with_accept("application/xml");
        let response = self.transport().request(&path, request).await?;
        let tree = parse_tolerant(&response.body)?;
        let entries: Vec<TraceEntry> = tree
            .find_all("entry")
            .iter()
            .filter_map(|entry| {
                entry.attr("program").map(|program| TraceEntry {
                    program: program.to_string(),
                    event: entry.attr("event").unwrap_or_default().to_string(),
                    line: entry.attr_u32("line"),
                    hits: entry.attr("hits").and_then(|value| value.parse().ok()),
                    net_time: entry.attr("netTime").and_then(|value| value.parse().ok()),
                })
            })
            .collect();
        let total_time = entries.iter().filter_map(|entry| entry.net_time).sum();
        Ok(TraceAnalysis {
            id: id.to_string(),
            entries,
            total_time,
        })
    }

    /// Runs the traced-execution composite.
    ///
    /// Fetches the static callee graph, optionally triggers unit tests,
    /// downloads the newest matching trace, and correlates observed edges
    /// with the static prediction. Each step is fault-tolerant.
    ///
    /// # Errors
    ///
    /// Returns [`AdtError`] only for policy denials; step failures are
    /// absorbed into empty result fields.
    pub async fn trace_execution(
        &self,
        options: &TraceExecutionOptions,
    ) -> Result<TraceExecutionResult, AdtError> {
        self.check(OperationClass::Execute, options.object_uri.as_deref().unwrap_or(""))?;
        let mut result = TraceExecutionResult::default();

        if let Some(object_uri) = &options.object_uri {
            let depth = if options.max_depth == 0 { 5 } else { options.max_depth };
            if let Ok(graph) = self.get_callees_of(object_uri, depth).await {
                result.static_stats = Some(analyze_call_graph(&graph));
                result.static_graph = Some(graph);
            }
        }

        if options.run_tests {
            let test_uri = options
                .test_object_uri
                .as_deref()
                .or(options.object_uri.as_deref());
            if let Some(test_uri) = test_uri
                && let Ok(test_result) = self.run_unit_tests(test_uri).await
            {
                for class in &test_result.classes {
                    for method in &class.methods {
                        result.executed_tests.push(format!("{}=>{}", class.name, method.name));
                    }
                }
            }
        }

        let trace_user = options
            .trace_user
            .clone()
            .unwrap_or_else(|| self.config().username.clone());
        let headers = self
            .list_traces(&TraceQueryOptions {
                user: Some(trace_user),
                max_results: 5,
            })
            .await
            .unwrap_or_default();
        if let Some(latest) = headers.first()
            && let Ok(analysis) = self.get_trace(&latest.id, "hitlist").await
        {
            result.execution_time_us = Some(analysis.total_time);
            result.actual_edges = extract_call_edges_from_trace(&analysis.entries);
            result.trace = Some(analysis);
            if let Some(static_graph) = &result.static_graph {
                let static_edges = flatten_call_graph(static_graph);
                result.comparison =
                    Some(compare_call_graphs(&static_edges, &result.actual_edges));
            }
        }

        Ok(result)
    }
}

// ============================================================================
// SECTION: Post-Processing
// ============================================================================

/// Decodes one call graph node and its children.
fn decode_call_graph_node(element: &XmlElement) -> CallGraphNode {
    CallGraphNode {
        uri: element.attr("uri").unwrap_or_default().to_string(),
        name: element.attr("name").unwrap_or_default().to_string(),
        node_type: element.attr("type").unwrap_or_default().to_string(),
        description: element.attr("description").map(str::to_string),
        line: element.attr_u32("line"),
        column: element.attr_u32("column"),
        children: element
            .children
            .iter()
            .filter(|child| child.name == "node")
            .map(decode_call_graph_node)
            .collect(),
    }
}

/// Flattens a call graph into edges via pre-order traversal.
///
/// No deduplication: multiple call sites appear as multiple edges.
#[must_use]
pub fn flatten_call_graph(root: &CallGraphNode) -> Vec<CallGraphEdge> {
    let mut edges = Vec::new();
    flatten_into(root, &mut edges);
    edges
}

fn flatten_into(parent: &CallGraphNode, edges: &mut Vec<CallGraphEdge>) {
    for child in &parent.children {
        edges.push(CallGraphEdge {
            caller_uri: parent.uri.clone(),
            caller_name: parent.name.clone(),
            callee_uri: child.uri.clone(),
            callee_name: child.name.clone(),
            line: child.line,
        });
        flatten_into(child, edges);
    }
}

/// Computes statistics over a call graph tree.
///
/// Nodes deduplicate by URI; edges count every parent-child pair.
#[must_use]
pub fn analyze_call_graph(root: &CallGraphNode) -> CallGraphStats {
    let mut stats = CallGraphStats {
        total_nodes: 0,
        total_edges: 0,
        max_depth: 0,
        nodes_by_type: BTreeMap::new(),
        unique_nodes: Vec::new(),
    };
    let mut seen = BTreeSet::new();
    analyze_into(root, 0, &mut seen, &mut stats);
    stats
}

fn analyze_into(
    node: &CallGraphNode,
    depth: u32,
    seen: &mut BTreeSet<String>,
    stats: &mut CallGraphStats,
) {
    if depth > stats.max_depth {
        stats.max_depth = depth;
    }
    if seen.insert(node.uri.clone()) {
        stats.total_nodes += 1;
        *stats.nodes_by_type.entry(node.node_type.clone()).or_insert(0) += 1;
        stats.unique_nodes.push(node.name.clone());
    }
    for child in &node.children {
        stats.total_edges += 1;
        analyze_into(child, depth + 1, seen, stats);
    }
}

/// Compares static and observed edges keyed by caller and callee names.
#[must_use]
pub fn compare_call_graphs(
    static_edges: &[CallGraphEdge],
    actual_edges: &[CallGraphEdge],
) -> CallGraphComparison {
    let edge_key = |edge: &CallGraphEdge| format!("{}->{}", edge.caller_name, edge.callee_name);
    let static_set: BTreeMap<String, &CallGraphEdge> =
        static_edges.iter().map(|edge| (edge_key(edge), edge)).collect();
    let actual_set: BTreeMap<String, &CallGraphEdge> =
        actual_edges.iter().map(|edge| (edge_key(edge), edge)).collect();

    let mut comparison = CallGraphComparison {
        common_edges: Vec::new(),
        static_only: Vec::new(),
        actual_only: Vec::new(),
        coverage_ratio: 0.0,
    };
    for (key, edge) in &static_set {
        if actual_set.contains_key(key) {
            comparison.common_edges.push((*edge).clone());
        } else {
            comparison.static_only.push((*edge).clone());
        }
    }
    for (key, edge) in &actual_set {
        if !static_set.contains_key(key) {
            comparison.actual_only.push((*edge).clone());
        }
    }
    if !static_edges.is_empty() {
        #[allow(
            clippy::cast_precision_loss,
            reason = "Edge counts are far below the f64 mantissa range."
        )]
        {
            comparison.coverage_ratio =
                comparison.common_edges.len() as f64 / static_edges.len() as f64;
        }
    }
    comparison
}

/// Extracts synthetic call edges from adjacent trace entries.
///
/// A program change between neighboring entries yields one edge; repeated
/// transitions are reported once.
#[must_use]
pub fn extract_call_edges_from_trace(entries: &[TraceEntry]) -> Vec<CallGraphEdge> {
    let mut edges = Vec::new();
    let mut seen = BTreeSet::new();
    let mut previous: Option<&str> = None;
    for entry in entries {
        if entry.program.is_empty() {
            continue;
        }
        if let Some(previous_program) = previous
            && previous_program != entry.program
        {
            let key = format!("{previous_program}->{}", entry.program);
            if seen.insert(key) {
                edges.push(CallGraphEdge {
                    caller_uri: program_uri(previous_program),
                    caller_name: previous_program.to_string(),
                    callee_uri: program_uri(&entry.program),
                    callee_name: entry.program.clone(),
                    line: entry.line,
                });
            }
        }
        previous = Some(&entry.program);
    }
    edges
}

/// Builds the program URI used for synthetic trace edges.
fn program_uri(program: &str) -> String {
    format!("/sap/bc/adt/programs/programs/{}", program.to_ascii_lowercase())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
