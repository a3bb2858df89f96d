// crates/adt-bridge-client/src/lib.rs
// ============================================================================
// Module: ADT Bridge Client
// Description: Protocol client for the ABAP development tools REST surface.
// Purpose: Provide typed repository, debugger, and analysis operations.
// Dependencies: adt-bridge-core, reqwest, tokio, quick-xml
// ============================================================================

//! ## Overview
//! The client crate turns the stateless ADT HTTP surface into a
//! session-bearing, policy-gated operation set: a transport that owns the
//! cookie jar and CSRF token, tolerant XML decoding, per-kind readers, the
//! lock-write-activate-unlock lifecycle engine, external debugger control,
//! and call graph analysis.
//! Security posture: all server payloads are untrusted input; decoders are
//! tolerant but never execute or expand external content.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod analysis;
pub mod client;
pub mod debugger;
pub mod error;
pub mod lifecycle;
pub mod reader;
pub mod transport;
pub mod xml;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use analysis::CallGraphEdge;
pub use analysis::CallGraphNode;
pub use analysis::CallGraphOptions;
pub use analysis::CallGraphStats;
pub use analysis::TraceAnalysis;
pub use analysis::TraceEntry;
pub use analysis::TraceExecutionOptions;
pub use analysis::TraceExecutionResult;
pub use analysis::TraceQueryOptions;
pub use analysis::analyze_call_graph;
pub use analysis::compare_call_graphs;
pub use analysis::extract_call_edges_from_trace;
pub use analysis::flatten_call_graph;
pub use client::AdtClient;
pub use debugger::Breakpoint;
pub use debugger::BreakpointKind;
pub use debugger::BreakpointRequest;
pub use debugger::DebugStackEntry;
pub use debugger::DebugStepType;
pub use debugger::DebugVariable;
pub use debugger::Debuggee;
pub use debugger::ListenOptions;
pub use debugger::ListenResult;
pub use debugger::StackInfo;
pub use debugger::StepResult;
pub use error::AdtError;
pub use lifecycle::ActivationMessage;
pub use lifecycle::Lock;
pub use lifecycle::WriteOptions;
pub use lifecycle::WriteResult;
pub use reader::ClassStructure;
pub use reader::GrepMatch;
pub use reader::MessageClass;
pub use reader::MethodInfo;
pub use reader::PackageContent;
pub use reader::QueryResult;
pub use reader::SearchResult;
pub use reader::ServiceBinding;
pub use reader::UnitTestResult;
pub use transport::AdtResponse;
pub use transport::RequestOptions;
pub use transport::Transport;
pub use transport::TransportError;
pub use xml::CodecError;
pub use xml::MessageClassEdit;
pub use xml::modify_message_class_xml;
pub use xml::parse_tolerant;
