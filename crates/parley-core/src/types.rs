// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types used across adapter traits and the Parley pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};
use uuid::Uuid;

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the type of adapter behind a trait object.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Provider,
    Storage,
    Tool,
    Channel,
}

// --- Conversation types ---

/// Role of a message within a conversation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    /// Tool-result feedback message appended during the orchestration loop.
    Tool,
}

/// A single conversation message in canonical form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    /// Tool name, set only on `role: tool` messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Correlates a `role: tool` message with the tool call that produced it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    /// A plain user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            name: None,
            tool_call_id: None,
        }
    }

    /// A plain assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            name: None,
            tool_call_id: None,
        }
    }

    /// A system prompt message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
            name: None,
            tool_call_id: None,
        }
    }

    /// A tool-result message fed back to the model.
    pub fn tool_result(
        tool_call_id: impl Into<String>,
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            role: ChatRole::Tool,
            content: content.into(),
            name: Some(name.into()),
            tool_call_id: Some(tool_call_id.into()),
        }
    }
}

// --- Tool types ---

/// Canonical form that all provider-specific tool-call representations
/// are normalized into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned id, or a synthetic `call-<uuid>` when extracted from text.
    pub id: String,
    pub name: String,
    /// JSON-compatible argument map. Empty when arguments were unparsable.
    #[serde(default)]
    pub arguments: serde_json::Map<String, Value>,
}

impl ToolCall {
    /// Creates a tool call with a freshly generated synthetic id.
    pub fn synthetic(name: impl Into<String>, arguments: serde_json::Map<String, Value>) -> Self {
        Self {
            id: format!("call-{}", Uuid::new_v4()),
            name: name.into(),
            arguments,
        }
    }
}

/// A tool definition surfaced to providers that support structured tool use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON Schema describing the tool's input parameters.
    pub input_schema: Value,
}

/// The outcome of one tool execution. Immutable once produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub name: String,
    pub arguments: serde_json::Map<String, Value>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Unix epoch milliseconds at execution time.
    pub executed_at_ms: i64,
}

impl ToolResult {
    /// A successful result carrying the tool's payload.
    pub fn ok(call: &ToolCall, payload: Value) -> Self {
        Self {
            name: call.name.clone(),
            arguments: call.arguments.clone(),
            success: true,
            payload: Some(payload),
            error: None,
            executed_at_ms: Utc::now().timestamp_millis(),
        }
    }

    /// A failed result carrying a human-readable error for the model.
    pub fn failed(call: &ToolCall, error: impl Into<String>) -> Self {
        Self {
            name: call.name.clone(),
            arguments: call.arguments.clone(),
            success: false,
            payload: None,
            error: Some(error.into()),
            executed_at_ms: Utc::now().timestamp_millis(),
        }
    }

    /// Serialized form fed back to the model as a `role: tool` message.
    pub fn to_feedback_content(&self) -> String {
        if self.success {
            self.payload
                .as_ref()
                .map(|p| p.to_string())
                .unwrap_or_else(|| "{}".to_string())
        } else {
            serde_json::json!({
                "error": self.error.as_deref().unwrap_or("unknown error")
            })
            .to_string()
        }
    }
}

// --- Provider types ---

/// The canonical request every provider adapter translates into its wire format.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    /// Tool definitions; empty when tools are disabled for this turn.
    pub tools: Vec<ToolSpec>,
    /// Overrides the adapter's default model when set.
    pub model_hint: Option<String>,
}

impl CompletionRequest {
    /// A request with no tools and no model override.
    pub fn plain(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            tools: Vec::new(),
            model_hint: None,
        }
    }
}

/// One canonical result shape for every provider, success or failure.
///
/// A provider may populate both `content` and `tool_calls`; a non-empty
/// `tool_calls` always takes precedence for the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CascadeResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CascadeResult {
    /// A successful result.
    pub fn ok(provider: impl Into<String>, content: Option<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            success: true,
            content,
            tool_calls,
            provider: provider.into(),
            model: None,
            latency_ms: None,
            error: None,
        }
    }

    /// A failed result carrying an error description.
    pub fn failed(provider: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            content: None,
            tool_calls: Vec::new(),
            provider: provider.into(),
            model: None,
            latency_ms: None,
            error: Some(error.into()),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }

    /// True when the orchestrator should enter a tool round for this result.
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

// --- Identity and session types ---

/// A session correlates turns from one identity for external observability.
///
/// Sessions rotate; the identity key is the primary memory key. Sessions are
/// never deleted explicitly -- they expire by age-based garbage collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: Uuid,
    pub identity_key: String,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
}

impl Session {
    /// Creates a fresh session for the given identity key.
    pub fn new(identity_key: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: Uuid::new_v4(),
            identity_key: identity_key.into(),
            created_at: now,
            last_active_at: now,
        }
    }
}

/// The one logical conversation record per identity.
///
/// The session id may rotate underneath it; message and tool-result lists are
/// truncated to retention ceilings on every save, oldest entries first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub identity_key: String,
    pub session_id: Uuid,
    pub messages: Vec<ChatMessage>,
    pub tool_results: Vec<ToolResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<ConversationSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    pub updated_at: DateTime<Utc>,
}

impl ConversationRecord {
    /// An empty record for a newly seen identity.
    pub fn empty(identity_key: impl Into<String>, session_id: Uuid) -> Self {
        Self {
            identity_key: identity_key.into(),
            session_id,
            messages: Vec::new(),
            tool_results: Vec::new(),
            summary: None,
            metadata: None,
            updated_at: Utc::now(),
        }
    }
}

/// Coarse conversation sentiment from the heuristic summarizer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

/// Cheap synchronous summary written on every save.
///
/// A richer version may be produced later by the out-of-band enricher, but
/// this one is always written first and never blocks the response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub text: String,
    pub topics: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<Sentiment>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_role_round_trips_through_serde() {
        let json = serde_json::to_string(&ChatRole::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
        let role: ChatRole = serde_json::from_str("\"tool\"").unwrap();
        assert_eq!(role, ChatRole::Tool);
    }

    #[test]
    fn tool_result_feedback_content_success() {
        let call = ToolCall::synthetic("search", serde_json::Map::new());
        let result = ToolResult::ok(&call, serde_json::json!({"count": 3}));
        assert_eq!(result.to_feedback_content(), r#"{"count":3}"#);
    }

    #[test]
    fn tool_result_feedback_content_failure() {
        let call = ToolCall::synthetic("search", serde_json::Map::new());
        let result = ToolResult::failed(&call, "backend unreachable");
        assert!(result.to_feedback_content().contains("backend unreachable"));
        assert!(!result.success);
    }

    #[test]
    fn cascade_result_tool_calls_take_precedence() {
        let call = ToolCall::synthetic("search", serde_json::Map::new());
        let result = CascadeResult::ok("anthropic", Some("Let me check.".into()), vec![call]);
        assert!(result.has_tool_calls());
    }

    #[test]
    fn cascade_result_failed_carries_error() {
        let result = CascadeResult::failed("cascade", "all 3 providers failed");
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("all 3 providers failed"));
        assert!(!result.has_tool_calls());
    }

    #[test]
    fn synthetic_tool_call_ids_are_unique() {
        let a = ToolCall::synthetic("x", serde_json::Map::new());
        let b = ToolCall::synthetic("x", serde_json::Map::new());
        assert_ne!(a.id, b.id);
        assert!(a.id.starts_with("call-"));
    }

    #[test]
    fn tool_result_message_carries_correlation() {
        let msg = ChatMessage::tool_result("call-1", "search", "{}");
        assert_eq!(msg.role, ChatRole::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call-1"));
        assert_eq!(msg.name.as_deref(), Some("search"));
    }

    #[test]
    fn session_new_sets_timestamps() {
        let session = Session::new("ip-1.2.3.4");
        assert_eq!(session.identity_key, "ip-1.2.3.4");
        assert_eq!(session.created_at, session.last_active_at);
    }

    #[test]
    fn sentiment_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Sentiment::Negative).unwrap(),
            "\"negative\""
        );
    }
}
