// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the chat API.
//!
//! `POST /chat` runs the turn pipeline under the end-to-end request budget;
//! `GET /health` is the unauthenticated liveness probe.

use std::collections::BTreeMap;
use std::time::Instant;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

use parley_agent::TurnRequest;
use parley_core::types::{ChatMessage, ChatRole};

use crate::server::GatewayState;

/// Request body for POST /chat.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequestBody {
    /// Full conversation turn; either this or `userQuery` must be present.
    #[serde(default)]
    pub messages: Vec<WireMessage>,
    #[serde(default)]
    pub user_query: Option<String>,
    /// Accepted for wire compatibility and ignored; the session id in the
    /// response always comes from the identity resolver.
    #[serde(default)]
    pub session_id: Option<String>,
    /// Provider pin; "auto" (the default) runs the full cascade.
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default = "default_true")]
    pub use_tools: bool,
    #[serde(default = "default_true")]
    pub save_memory: bool,
    #[serde(default)]
    pub attachments: Vec<serde_json::Value>,
    #[serde(default)]
    pub user_id: Option<String>,
}

fn default_true() -> bool {
    true
}

/// One message in the request body.
#[derive(Debug, Deserialize)]
pub struct WireMessage {
    pub role: String,
    pub content: String,
}

/// Response body for POST /chat.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponseBody {
    pub success: bool,
    pub content: String,
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub has_tool_calls: bool,
    pub tool_calls_executed: u32,
    pub execution_time_ms: u64,
    pub session_id: String,
    pub request_id: String,
    pub memory: MemoryInfo,
}

/// Memory bookkeeping reported back to the caller.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryInfo {
    pub identity_key: String,
    pub saved: bool,
}

/// Error body for 4xx/5xx responses. Still carries `requestId` and
/// `executionTimeMs` for observability.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    pub request_id: String,
    pub execution_time_ms: u64,
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// POST /chat
pub async fn post_chat(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Json(body): Json<ChatRequestBody>,
) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let started = Instant::now();

    if body.messages.is_empty() && body.user_query.as_deref().map_or(true, str::is_empty) {
        return error_response(
            StatusCode::BAD_REQUEST,
            "either messages or userQuery must be provided",
            &request_id,
            started,
        );
    }

    let messages = match canonical_messages(&body.messages) {
        Ok(messages) => messages,
        Err(bad_role) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                &format!("unknown message role: {bad_role}"),
                &request_id,
                started,
            );
        }
    };

    let turn = TurnRequest {
        messages,
        user_query: body.user_query,
        provider: body.provider,
        use_tools: body.use_tools,
        save_memory: body.save_memory,
        attachments: body.attachments,
        user_id: body.user_id,
        headers: header_map(&headers),
    };
    let save_memory = turn.save_memory;

    // One cancellation token per request; it is the end-to-end budget every
    // downstream call observes.
    let cancel = CancellationToken::new();
    let pipeline = state.pipeline.clone();
    let turn_cancel = cancel.clone();
    let handle =
        tokio::spawn(async move { pipeline.handle_turn(turn, &turn_cancel).await });

    match tokio::time::timeout(state.request_timeout, handle).await {
        Ok(Ok(outcome)) => {
            let execution_time_ms = started.elapsed().as_millis() as u64;
            info!(
                request_id = %request_id,
                provider = %outcome.provider,
                tools = outcome.tool_calls_executed,
                execution_time_ms,
                "chat turn completed"
            );
            (
                StatusCode::OK,
                Json(ChatResponseBody {
                    success: outcome.success,
                    content: outcome.content,
                    provider: outcome.provider,
                    model: outcome.model,
                    has_tool_calls: outcome.has_tool_calls,
                    tool_calls_executed: outcome.tool_calls_executed,
                    execution_time_ms,
                    session_id: outcome.session_id,
                    request_id,
                    memory: MemoryInfo {
                        identity_key: outcome.identity_key,
                        saved: save_memory,
                    },
                }),
            )
                .into_response()
        }
        Ok(Err(join_error)) => {
            error!(request_id = %request_id, error = %join_error, "chat turn panicked");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error while handling the request",
                &request_id,
                started,
            )
        }
        Err(_) => {
            // Budget elapsed: abort outstanding work and answer 504.
            cancel.cancel();
            error_response(
                StatusCode::GATEWAY_TIMEOUT,
                "request timed out",
                &request_id,
                started,
            )
        }
    }
}

/// GET /health
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

fn error_response(
    status: StatusCode,
    message: &str,
    request_id: &str,
    started: Instant,
) -> Response {
    (
        status,
        Json(ErrorBody {
            success: false,
            error: message.to_string(),
            request_id: request_id.to_string(),
            execution_time_ms: started.elapsed().as_millis() as u64,
        }),
    )
        .into_response()
}

fn canonical_messages(wire: &[WireMessage]) -> Result<Vec<ChatMessage>, String> {
    wire.iter()
        .map(|m| {
            let role: ChatRole = m.role.parse().map_err(|_| m.role.clone())?;
            Ok(ChatMessage {
                role,
                content: m.content.clone(),
                name: None,
                tool_call_id: None,
            })
        })
        .collect()
}

fn header_map(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_lowercase(), v.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_applies_camel_case_defaults() {
        let json = r#"{"userQuery": "hi", "userId": "alice"}"#;
        let body: ChatRequestBody = serde_json::from_str(json).unwrap();
        assert_eq!(body.user_query.as_deref(), Some("hi"));
        assert_eq!(body.user_id.as_deref(), Some("alice"));
        assert!(body.use_tools);
        assert!(body.save_memory);
        assert!(body.messages.is_empty());
    }

    #[test]
    fn request_body_parses_messages_and_flags() {
        let json = r#"{
            "messages": [{"role": "user", "content": "hello"}],
            "provider": "anthropic",
            "useTools": false,
            "saveMemory": false
        }"#;
        let body: ChatRequestBody = serde_json::from_str(json).unwrap();
        assert_eq!(body.messages.len(), 1);
        assert_eq!(body.provider.as_deref(), Some("anthropic"));
        assert!(!body.use_tools);
        assert!(!body.save_memory);
    }

    #[test]
    fn canonical_messages_rejects_unknown_role() {
        let wire = vec![WireMessage {
            role: "wizard".into(),
            content: "hi".into(),
        }];
        assert_eq!(canonical_messages(&wire).unwrap_err(), "wizard");
    }

    #[test]
    fn response_body_serializes_camel_case() {
        let body = ChatResponseBody {
            success: true,
            content: "hi".into(),
            provider: "anthropic".into(),
            model: Some("claude-sonnet-4-20250514".into()),
            has_tool_calls: false,
            tool_calls_executed: 0,
            execution_time_ms: 42,
            session_id: "s".into(),
            request_id: "r".into(),
            memory: MemoryInfo {
                identity_key: "ip-1.2.3.4".into(),
                saved: true,
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["hasToolCalls"], false);
        assert_eq!(json["toolCallsExecuted"], 0);
        assert_eq!(json["executionTimeMs"], 42);
        assert_eq!(json["requestId"], "r");
        assert_eq!(json["memory"]["identityKey"], "ip-1.2.3.4");
    }

    #[test]
    fn error_body_keeps_observability_fields() {
        let body = ErrorBody {
            success: false,
            error: "request timed out".into(),
            request_id: "r".into(),
            execution_time_ms: 120_000,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["requestId"], "r");
        assert_eq!(json["executionTimeMs"], 120_000);
    }
}
