// crates/adt-bridge-tools/src/lib.rs
// ============================================================================
// Module: ADT Bridge Tools
// Description: Named operation surface with policy gating and envelopes.
// Purpose: Give programmatic callers one stable JSON contract.
// Dependencies: adt-bridge-client, adt-bridge-core, serde_json
// ============================================================================

//! ## Overview
//! Callers address the bridge by tool name with a JSON payload and receive
//! one stable envelope back. The safety policy is checked before any call
//! reaches the transport; two profiles control how much of the surface is
//! exposed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod contract;
pub mod router;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use contract::ALL_TOOLS;
pub use contract::ToolDefinition;
pub use contract::ToolName;
pub use contract::ToolProfile;
pub use contract::tool_definition;
pub use contract::tool_definitions;
pub use router::ToolError;
pub use router::ToolRouter;
