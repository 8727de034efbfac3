// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tool executor trait -- the single interface behind which all concrete
//! tools (repository hosting, email, knowledge-base search, telemetry
//! lookups) are registered.

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::error::ParleyError;
use crate::types::{ToolCall, ToolSpec};

/// Per-request execution context handed to every tool invocation.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub identity_key: String,
    pub session_id: Uuid,
    /// Attachments supplied with the originating request, as raw JSON.
    pub attachments: Vec<Value>,
}

/// Adapter executing named tools on behalf of the orchestrator.
///
/// The orchestrator is agnostic to how a given tool name is implemented. A
/// failing execution returns `Err`; the orchestrator captures it as a failed
/// `ToolResult` and the loop continues.
#[async_trait]
pub trait ToolExecutor: Send + Sync + 'static {
    /// The closed registry of tool names this executor can run.
    ///
    /// Doubles as the allowlist for natural-language tool-intent extraction.
    fn known_tools(&self) -> Vec<String>;

    /// Tool definitions surfaced to providers that support structured tools.
    fn tool_specs(&self) -> Vec<ToolSpec>;

    /// Executes one tool call and returns its payload.
    async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> Result<Value, ParleyError>;
}
