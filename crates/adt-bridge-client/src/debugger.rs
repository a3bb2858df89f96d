// crates/adt-bridge-client/src/debugger.rs
// ============================================================================
// Module: External Debugger Operations
// Description: Listener, attach, stepping, inspection, and breakpoints.
// Purpose: Drive the external debugger over the sticky transport session.
// Dependencies: adt-bridge-core, serde
// ============================================================================

//! ## Overview
//! External debugging is session-bound: after a debuggee is caught, every
//! follow-up call must reach the same SAP work process, which means the
//! same cookie jar. All operations here run on the client's single
//! transport, so a caller that keeps one client keeps the affinity.
//! The listener is a long-poll; its timeout is clamped to five minutes.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use adt_bridge_core::OperationClass;
use adt_bridge_core::config::DEBUG_LISTENER_TIMEOUT;
use serde::Deserialize;
use serde::Serialize;

use crate::client::AdtClient;
use crate::error::AdtError;
use crate::transport::RequestOptions;
use crate::xml::XmlElement;
use crate::xml::escape_attribute;
use crate::xml::parse_tolerant;

// ============================================================================
// SECTION: Paths
// ============================================================================

/// Debugger root endpoint.
const DEBUGGER_PATH: &str = "/sap/bc/adt/debugger";

/// Listener long-poll endpoint.
const LISTENERS_PATH: &str = "/sap/bc/adt/debugger/listeners";

/// Breakpoints collection endpoint.
const BREAKPOINTS_PATH: &str = "/sap/bc/adt/debugger/breakpoints";

// ============================================================================
// SECTION: Types
// ============================================================================

/// Options for one listener long-poll.
#[derive(Debug, Clone, Deserialize)]
pub struct ListenOptions {
    /// User whose sessions the listener watches.
    pub user: String,
    /// Long-poll timeout in seconds (clamped to five minutes).
    #[serde(default)]
    pub timeout_seconds: u64,
}

/// A caught debuggee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Debuggee {
    /// Server-assigned debuggee identifier.
    pub id: String,
    /// Paused program, when reported.
    pub program: Option<String>,
    /// Debugged user, when reported.
    pub user: Option<String>,
}

/// Outcome of one listener long-poll.
#[derive(Debug, Clone, Serialize)]
pub struct ListenResult {
    /// True when the poll elapsed without catching a debuggee.
    pub timed_out: bool,
    /// The caught debuggee, when one arrived.
    pub debuggee: Option<Debuggee>,
}

/// Debugger stepping operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DebugStepType {
    /// Step into the next statement.
    StepInto,
    /// Step over the next statement.
    StepOver,
    /// Step out of the current frame.
    StepReturn,
    /// Continue to the next breakpoint.
    StepContinue,
    /// Run to a specific line.
    StepRunToLine,
    /// Jump to a specific line without executing.
    StepJumpToLine,
    /// Terminate the debuggee.
    Terminate,
}

impl DebugStepType {
    /// Returns the wire method name of the step.
    #[must_use]
    pub const fn as_method(self) -> &'static str {
        match self {
            Self::StepInto => "stepInto",
            Self::StepOver => "stepOver",
            Self::StepReturn => "stepReturn",
            Self::StepContinue => "stepContinue",
            Self::StepRunToLine => "stepRunToLine",
            Self::StepJumpToLine => "stepJumpToLine",
            Self::Terminate => "terminateDebuggee",
        }
    }

    /// Parses a step label from tool or daemon payloads.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "stepInto" => Some(Self::StepInto),
            "stepOver" => Some(Self::StepOver),
            "stepReturn" => Some(Self::StepReturn),
            "stepContinue" => Some(Self::StepContinue),
            "stepRunToLine" => Some(Self::StepRunToLine),
            "stepJumpToLine" => Some(Self::StepJumpToLine),
            "terminate" => Some(Self::Terminate),
            _ => None,
        }
    }
}

/// Position reached after a step.
#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    /// Source URI of the reached position, when reported.
    pub uri: Option<String>,
    /// Reached line, when reported.
    pub line: Option<u32>,
    /// True when the debuggee terminated.
    pub terminated: bool,
}

/// One frame of the debuggee call stack.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugStackEntry {
    /// Source URI of the frame.
    pub uri: String,
    /// Current line of the frame.
    pub line: u32,
    /// Program or class pool of the frame.
    pub program: String,
    /// Frame event type, when reported.
    pub event: Option<String>,
}

/// Call stack snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct StackInfo {
    /// Frames, innermost first.
    pub stack: Vec<DebugStackEntry>,
}

/// One inspected variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugVariable {
    /// Variable identifier for follow-up expansion.
    pub id: String,
    /// Variable name.
    pub name: String,
    /// Rendered value.
    pub value: String,
    /// Declared ABAP type, when reported.
    pub declared_type: Option<String>,
}

/// Breakpoint kinds supported by the external debugger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakpointKind {
    /// Source line breakpoint.
    Line,
    /// Exception class breakpoint.
    Exception,
    /// Statement breakpoint.
    Statement,
}

impl BreakpointKind {
    /// Returns the wire label of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Line => "line",
            Self::Exception => "exception",
            Self::Statement => "statement",
        }
    }
}

/// One external breakpoint.
///
/// # Invariants
/// - The server assigns `id` on creation; requests leave it empty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Breakpoint {
    /// Server-assigned identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Breakpoint kind.
    pub kind: BreakpointKind,
    /// Source URI for line breakpoints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    /// Source line for line breakpoints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// Exception class for exception breakpoints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
    /// Statement for statement breakpoints.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statement: Option<String>,
    /// Optional condition expression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    /// True when the breakpoint is active.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

const fn default_enabled() -> bool {
    true
}

/// Breakpoint creation request.
#[derive(Debug, Clone, Deserialize)]
pub struct BreakpointRequest {
    /// Owning user.
    pub user: String,
    /// Breakpoints to create.
    pub breakpoints: Vec<Breakpoint>,
}

// ============================================================================
// SECTION: Operations
// ============================================================================

impl AdtClient {
    /// Long-polls the external debugger listener.
    ///
    /// Returns once a debuggee is caught or the (clamped) timeout elapses.
    /// The configured request timeout must exceed the poll timeout; the
    /// daemon builds its client with the dedicated debug timeout.
    ///
    /// # Errors
    ///
    /// Returns [`AdtError`] for policy denials and transport failures.
    pub async fn debugger_listen(&self, options: &ListenOptions) -> Result<ListenResult, AdtError> {
        self.check(OperationClass::Debug, &options.user)?;
        let timeout = clamp_listener_timeout(options.timeout_seconds);
        let request = RequestOptions::post()
            .with_query("debuggingMode", "external")
            .with_query("requestUser", &options.user.to_ascii_uppercase())
            .with_query("timeout", &timeout.as_secs().to_string())
            .with_accept("application/xml");
        let response = self.transport().request(LISTENERS_PATH, request).await?;
        if response.body.is_empty() {
            return Ok(ListenResult {
                timed_out: true,
                debuggee: None,
            });
        }
        let tree = parse_tolerant(&response.body)?;
        if tree.find_first("exceededTimeLimit").is_some() || tree.name == "exceededTimeLimit" {
            return Ok(ListenResult {
                timed_out: true,
                debuggee: None,
            });
        }
        let debuggee = decode_debuggee(&tree);
        Ok(ListenResult {
            timed_out: debuggee.is_none(),
            debuggee,
        })
    }

    /// Attaches to a caught debuggee.
    ///
    /// # Errors
    ///
    /// Returns [`AdtError`] for policy denials and transport failures.
    pub async fn debugger_attach(&self, debuggee_id: &str, user: &str) -> Result<(), AdtError> {
        self.check(OperationClass::Debug, user)?;
        let options = RequestOptions::post()
            .with_query("method", "attach")
            .with_query("debuggeeId", debuggee_id)
            .with_query("requestUser", &user.to_ascii_uppercase())
            .with_query("debuggingMode", "external")
            .with_accept("application/xml")
            .stateful();
        self.transport().request(DEBUGGER_PATH, options).await?;
        Ok(())
    }

    /// Detaches from the current debuggee.
    ///
    /// # Errors
    ///
    /// Returns [`AdtError`] for policy denials and transport failures.
    pub async fn debugger_detach(&self) -> Result<(), AdtError> {
        self.check(OperationClass::Debug, "")?;
        let options = RequestOptions::post()
            .with_query("method", "detach")
            .with_accept("application/xml")
            .stateful();
        self.transport().request(DEBUGGER_PATH, options).await?;
        Ok(())
    }

    /// Performs one stepping operation.
    ///
    /// `uri` is required for run-to-line and jump-to-line steps.
    ///
    /// # Errors
    ///
    /// Returns [`AdtError`] for policy denials, missing URIs, and transport
    /// failures.
    pub async fn debugger_step(
        &self,
        step: DebugStepType,
        uri: Option<&str>,
    ) -> Result<StepResult, AdtError> {
        self.check(OperationClass::Debug, "")?;
        if matches!(step, DebugStepType::StepRunToLine | DebugStepType::StepJumpToLine)
            && uri.is_none()
        {
            return Err(AdtError::InvalidArgument(format!(
                "{} requires a target uri",
                step.as_method()
            )));
        }
        let mut options = RequestOptions::post()
            .with_query("method", step.as_method())
            .with_accept("application/xml")
            .stateful();
        if let Some(uri) = uri {
            let body = format!(
                "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<dbg:position xmlns:dbg=\"http://www.sap.com/adt/debugger\" dbg:uri=\"{}\"/>",
                escape_attribute(uri)
            );
            options = options.with_body("application/xml", body.into_bytes());
        }
        let response = self.transport().request(DEBUGGER_PATH, options).await?;
        if step == DebugStepType::Terminate {
            return Ok(StepResult {
                uri: None,
                line: None,
                terminated: true,
            });
        }
        if response.body.is_empty() {
            return Ok(StepResult {
                uri: None,
                line: None,
                terminated: false,
            });
        }
        let tree = parse_tolerant(&response.body)?;
        let position = tree
            .find_first("reachedPosition")
            .or_else(|| tree.find_first("position"));
        Ok(StepResult {
            uri: position.and_then(|p| p.attr("uri")).map(str::to_string),
            line: position.and_then(|p| p.attr_u32("line")),
            terminated: tree.find_first("terminated").is_some(),
        })
    }

    /// Fetches the debuggee call stack.
    ///
    /// # Errors
    ///
    /// Returns [`AdtError`] for policy denials, transport failures, and
    /// malformed payloads.
    pub async fn debugger_stack(&self) -> Result<StackInfo, AdtError> {
        self.check(OperationClass::Debug, "")?;
        let options = RequestOptions::get()
            .with_query("semanticURIs", "true")
            .with_accept("application/xml")
            .stateful();
        let response = self
            .transport()
            .request("/sap/bc/adt/debugger/stack", options)
            .await?;
        let tree = parse_tolerant(&response.body)?;
        let stack = tree
            .find_all("stackEntry")
            .iter()
            .filter_map(|entry| {
                entry.attr("uri").map(|uri| DebugStackEntry {
                    uri: uri.to_string(),
                    line: entry.attr_u32("line").unwrap_or(0),
                    program: entry
                        .attr("programName")
                        .or_else(|| entry.attr("program"))
                        .unwrap_or_default()
                        .to_string(),
                    event: entry.attr("eventType").map(str::to_string),
                })
            })
            .collect();
        Ok(StackInfo {
            stack,
        })
    }

    /// Inspects variables by identifier (`@ROOT` lists the locals).
    ///
    /// # Errors
    ///
    /// Returns [`AdtError`] for policy denials, transport failures, and
    /// malformed payloads.
    pub async fn debugger_variables(
        &self,
        ids: &[String],
    ) -> Result<Vec<DebugVariable>, AdtError> {
        self.check(OperationClass::Debug, "")?;
        let default_ids = [String::from("@ROOT")];
        let ids = if ids.is_empty() { &default_ids[..] } else { ids };
        let entries: String = ids
            .iter()
            .map(|id| format!("<dbg:variable dbg:id=\"{}\"/>\n", escape_attribute(id)))
            .collect();
        let body = format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<dbg:variables xmlns:dbg=\"http://www.sap.com/adt/debugger\">\n{entries}</dbg:variables>"
        );
        let options = RequestOptions::post()
            .with_accept("application/xml")
            .with_body("application/xml", body.into_bytes())
            .stateful();
        let response = self
            .transport()
            .request("/sap/bc/adt/debugger/variables", options)
            .await?;
        let tree = parse_tolerant(&response.body)?;
        Ok(decode_variables(&tree))
    }

    // ========================================================================
    // SECTION: Breakpoints
    // ========================================================================

    /// Creates external breakpoints and returns them with server ids.
    ///
    /// # Errors
    ///
    /// Returns [`AdtError`] for policy denials, invalid breakpoint shapes,
    /// and transport failures.
    pub async fn set_external_breakpoint(
        &self,
        request: &BreakpointRequest,
    ) -> Result<Vec<Breakpoint>, AdtError> {
        self.check(OperationClass::Debug, &request.user)?;
        for breakpoint in &request.breakpoints {
            validate_breakpoint(breakpoint)?;
        }
        let body = breakpoints_body(&request.breakpoints);
        let options = breakpoint_scope_query(&request.user, RequestOptions::post())
            .with_accept("application/xml")
            .with_body("application/xml", body.into_bytes());
        let response = self.transport().request(BREAKPOINTS_PATH, options).await?;
        let tree = parse_tolerant(&response.body)?;
        Ok(decode_breakpoints(&tree))
    }

    /// Lists the external breakpoints of a user.
    ///
    /// # Errors
    ///
    /// Returns [`AdtError`] for policy denials, transport failures, and
    /// malformed payloads.
    pub async fn get_external_breakpoints(&self, user: &str) -> Result<Vec<Breakpoint>, AdtError> {
        self.check(OperationClass::Debug, user)?;
        let options = breakpoint_scope_query(user, RequestOptions::get())
            .with_accept("application/xml");
        let response = self.transport().request(BREAKPOINTS_PATH, options).await?;
        if response.body.is_empty() {
            return Ok(Vec::new());
        }
        let tree = parse_tolerant(&response.body)?;
        Ok(decode_breakpoints(&tree))
    }

    /// Deletes one external breakpoint by id.
    ///
    /// # Errors
    ///
    /// Returns [`AdtError`] for policy denials and transport failures.
    pub async fn delete_external_breakpoint(&self, id: &str, user: &str) -> Result<(), AdtError> {
        self.check(OperationClass::Debug, user)?;
        let path = format!("{BREAKPOINTS_PATH}/{id}");
        let options = breakpoint_scope_query(user, RequestOptions::delete());
        self.transport().request(&path, options).await?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Clamps the listener timeout to the dedicated long-poll ceiling.
fn clamp_listener_timeout(seconds: u64) -> Duration {
    let requested = if seconds == 0 { Duration::from_secs(60) } else { Duration::from_secs(seconds) };
    requested.min(DEBUG_LISTENER_TIMEOUT)
}

/// Appends the external-scope query parameters for breakpoint calls.
fn breakpoint_scope_query(user: &str, options: RequestOptions) -> RequestOptions {
    options
        .with_query("scope", "external")
        .with_query("debuggingMode", "external")
        .with_query("requestUser", &user.to_ascii_uppercase())
}

/// Validates that a breakpoint carries the fields its kind requires.
fn validate_breakpoint(breakpoint: &Breakpoint) -> Result<(), AdtError> {
    match breakpoint.kind {
        BreakpointKind::Line => {
            if breakpoint.uri.is_none() || breakpoint.line.is_none() {
                return Err(AdtError::InvalidArgument(
                    "line breakpoints require uri and line".to_string(),
                ));
            }
        }
        BreakpointKind::Exception => {
            if breakpoint.exception.is_none() {
                return Err(AdtError::InvalidArgument(
                    "exception breakpoints require an exception class".to_string(),
                ));
            }
        }
        BreakpointKind::Statement => {
            if breakpoint.statement.is_none() {
                return Err(AdtError::InvalidArgument(
                    "statement breakpoints require a statement".to_string(),
                ));
            }
        }
    }
    Ok(())
}

/// Serializes breakpoints into the creation payload.
fn breakpoints_body(breakpoints: &[Breakpoint]) -> String {
    let mut body = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<dbg:breakpoints xmlns:dbg=\"http://www.sap.com/adt/debugger\">\n",
    );
    for breakpoint in breakpoints {
        body.push_str(&format!(
            "<dbg:breakpoint dbg:kind=\"{}\" dbg:enabled=\"{}\"",
            breakpoint.kind.as_str(),
            breakpoint.enabled
        ));
        if let (Some(uri), Some(line)) = (&breakpoint.uri, breakpoint.line) {
            body.push_str(&format!(
                " dbg:uri=\"{}#start={line}\"",
                escape_attribute(uri)
            ));
        }
        if let Some(exception) = &breakpoint.exception {
            body.push_str(&format!(" dbg:exception=\"{}\"", escape_attribute(exception)));
        }
        if let Some(statement) = &breakpoint.statement {
            body.push_str(&format!(" dbg:statement=\"{}\"", escape_attribute(statement)));
        }
        if let Some(condition) = &breakpoint.condition {
            body.push_str(&format!(" dbg:condition=\"{}\"", escape_attribute(condition)));
        }
        body.push_str("/>\n");
    }
    body.push_str("</dbg:breakpoints>");
    body
}

/// Decodes the first debuggee from a listener response.
fn decode_debuggee(tree: &XmlElement) -> Option<Debuggee> {
    let element = if tree.name == "debuggee" { Some(tree) } else { tree.find_first("debuggee") };
    element.and_then(|debuggee| {
        debuggee.attr("id").map(|id| Debuggee {
            id: id.to_string(),
            program: debuggee.attr("program").map(str::to_string),
            user: debuggee.attr("user").map(str::to_string),
        })
    })
}

/// Decodes breakpoints from a creation or listing response.
fn decode_breakpoints(tree: &XmlElement) -> Vec<Breakpoint> {
    tree.find_all("breakpoint")
        .iter()
        .filter_map(|element| {
            let kind = match element.attr("kind") {
                Some("line") => BreakpointKind::Line,
                Some("exception") => BreakpointKind::Exception,
                Some("statement") => BreakpointKind::Statement,
                _ => return None,
            };
            let (uri, line) = element
                .attr("uri")
                .map(split_position_uri)
                .map_or((None, None), |(uri, line)| (Some(uri), line));
            Some(Breakpoint {
                id: element.attr("id").map(str::to_string),
                kind,
                uri,
                line: line.or_else(|| element.attr_u32("line")),
                exception: element.attr("exception").map(str::to_string),
                statement: element.attr("statement").map(str::to_string),
                condition: element.attr("condition").map(str::to_string),
                enabled: element.attr("enabled") != Some("false"),
            })
        })
        .collect()
}

/// Splits a `uri#start=line` position into its parts.
fn split_position_uri(value: &str) -> (String, Option<u32>) {
    match value.split_once("#start=") {
        Some((uri, position)) => {
            let line = position.split(',').next().and_then(|line| line.parse().ok());
            (uri.to_string(), line)
        }
        None => (value.to_string(), None),
    }
}

/// Decodes variables from an inspection response.
fn decode_variables(tree: &XmlElement) -> Vec<DebugVariable> {
    tree.find_all("variable")
        .iter()
        .filter_map(|element| {
            element.attr("name").map(|name| DebugVariable {
                id: element.attr("id").unwrap_or(name).to_string(),
                name: name.to_string(),
                value: element
                    .attr("value")
                    .map_or_else(|| element.text.clone(), str::to_string),
                declared_type: element.attr("declaredType").map(str::to_string),
            })
        })
        .collect()
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

    /// Tests the listener timeout clamp.
    #[test]
    fn listener_timeout_is_clamped() {
        assert_eq!(clamp_listener_timeout(0), Duration::from_secs(60));
        assert_eq!(clamp_listener_timeout(30), Duration::from_secs(30));
        assert_eq!(clamp_listener_timeout(3600), DEBUG_LISTENER_TIMEOUT);
    }

    /// Tests step label parsing.
    #[test]
    fn step_labels_parse() {
        assert_eq!(DebugStepType::parse("stepInto"), Some(DebugStepType::StepInto));
        assert_eq!(DebugStepType::parse("terminate"), Some(DebugStepType::Terminate));
        assert_eq!(DebugStepType::parse("stepBackwards"), None);
        assert_eq!(DebugStepType::Terminate.as_method(), "terminateDebuggee");
    }

    /// Tests breakpoint validation per kind.
    #[test]
    fn breakpoint_validation_per_kind() {
        let line = Breakpoint {
            id: None,
            kind: BreakpointKind::Line,
            uri: Some("/sap/bc/adt/programs/programs/ztest/source/main".to_string()),
            line: Some(5),
            exception: None,
            statement: None,
            condition: None,
            enabled: true,
        };
        assert!(validate_breakpoint(&line).is_ok());

        let broken = Breakpoint {
            line: None,
            ..line.clone()
        };
        assert!(validate_breakpoint(&broken).is_err());

        let exception = Breakpoint {
            kind: BreakpointKind::Exception,
            uri: None,
            line: None,
            exception: Some("CX_SY_ZERODIVIDE".to_string()),
            ..line.clone()
        };
        assert!(validate_breakpoint(&exception).is_ok());
    }

    /// Tests decoding a listener response with a caught debuggee.
    #[test]
    fn decode_listener_response() {
        let xml = br#"<dbg:debuggees xmlns:dbg="http://www.sap.com/adt/debugger">
<dbg:debuggee dbg:id="DBG123" dbg:program="ZTEST" dbg:user="DEVELOPER"/>
</dbg:debuggees>"#;
        let tree = parse_tolerant(xml).expect("parse");
        let debuggee = decode_debuggee(&tree).expect("debuggee");
        assert_eq!(debuggee.id, "DBG123");
        assert_eq!(debuggee.program.as_deref(), Some("ZTEST"));
    }

    /// Tests decoding breakpoints with positioned URIs.
    #[test]
    fn decode_breakpoints_with_positions() {
        let xml = br#"<dbg:breakpoints xmlns:dbg="http://www.sap.com/adt/debugger">
<dbg:breakpoint dbg:id="BP1" dbg:kind="line" dbg:uri="/sap/bc/adt/programs/programs/ztest/source/main#start=12" dbg:enabled="true"/>
<dbg:breakpoint dbg:id="BP2" dbg:kind="exception" dbg:exception="CX_SY_ZERODIVIDE" dbg:enabled="false"/>
</dbg:breakpoints>"#;
        let tree = parse_tolerant(xml).expect("parse");
        let breakpoints = decode_breakpoints(&tree);
        assert_eq!(breakpoints.len(), 2);
        assert_eq!(breakpoints[0].line, Some(12));
        assert_eq!(
            breakpoints[0].uri.as_deref(),
            Some("/sap/bc/adt/programs/programs/ztest/source/main")
        );
        assert!(!breakpoints[1].enabled);
    }

    /// Tests decoding a variables response.
    #[test]
    fn decode_variables_response() {
        let xml = br#"<dbg:variables xmlns:dbg="http://www.sap.com/adt/debugger">
<dbg:variable dbg:id="VAR1" dbg:name="LV_COUNT" dbg:value="42" dbg:declaredType="I"/>
</dbg:variables>"#;
        let tree = parse_tolerant(xml).expect("parse");
        let variables = decode_variables(&tree);
        assert_eq!(variables.len(), 1);
        assert_eq!(variables[0].name, "LV_COUNT");
        assert_eq!(variables[0].value, "42");
    }

    /// Tests the breakpoint payload serialization.
    #[test]
    fn breakpoint_body_carries_position() {
        let breakpoint = Breakpoint {
            id: None,
            kind: BreakpointKind::Line,
            uri: Some("/sap/bc/adt/programs/programs/ztest/source/main".to_string()),
            line: Some(7),
            exception: None,
            statement: None,
            condition: Some("sy-tabix > 1".to_string()),
            enabled: true,
        };
        let body = breakpoints_body(&[breakpoint]);
        assert!(body.contains("#start=7"));
        assert!(body.contains("dbg:condition=\"sy-tabix &gt; 1\""));
    }
}
