// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tool executor implementations behind the [`ToolExecutor`] boundary.
//!
//! Concrete tools live outside this service. [`WebhookToolExecutor`]
//! forwards every invocation to a configured HTTP endpoint that owns the
//! actual implementations; [`NullToolExecutor`] covers deployments with no
//! tool backend at all.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use parley_config::model::ToolsConfig;
use parley_core::types::{ToolCall, ToolSpec};
use parley_core::{ParleyError, ToolContext, ToolExecutor};

/// Wire request sent to the tool webhook.
#[derive(Debug, Serialize)]
struct WebhookRequest<'a> {
    tool: &'a str,
    arguments: &'a serde_json::Map<String, Value>,
    context: WebhookContext<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WebhookContext<'a> {
    identity: &'a str,
    session_id: String,
    attachments: &'a [Value],
}

/// Wire response from the tool webhook.
#[derive(Debug, Deserialize)]
struct WebhookResponse {
    success: bool,
    #[serde(default)]
    payload: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

/// Forwards tool invocations to a configured HTTP endpoint.
///
/// The registered tool names come from configuration and double as the
/// closed registry consulted by natural-language extraction.
pub struct WebhookToolExecutor {
    client: reqwest::Client,
    endpoint: String,
    specs: Vec<ToolSpec>,
}

impl WebhookToolExecutor {
    pub fn new(config: &ToolsConfig) -> Result<Option<Self>, ParleyError> {
        let Some(endpoint) = config.endpoint_url.clone() else {
            return Ok(None);
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| ParleyError::Internal(format!("failed to build tool HTTP client: {e}")))?;

        let specs = config
            .known
            .iter()
            .map(|entry| ToolSpec {
                name: entry.name.clone(),
                description: entry.description.clone(),
                input_schema: entry
                    .input_schema
                    .as_ref()
                    .and_then(|schema| {
                        // TOML schema values re-serialize to JSON losslessly.
                        serde_json::to_value(schema).ok()
                    })
                    .unwrap_or_else(|| serde_json::json!({"type": "object"})),
            })
            .collect();

        Ok(Some(Self {
            client,
            endpoint,
            specs,
        }))
    }
}

#[async_trait]
impl ToolExecutor for WebhookToolExecutor {
    fn known_tools(&self) -> Vec<String> {
        self.specs.iter().map(|s| s.name.clone()).collect()
    }

    fn tool_specs(&self) -> Vec<ToolSpec> {
        self.specs.clone()
    }

    async fn execute(&self, call: &ToolCall, ctx: &ToolContext) -> Result<Value, ParleyError> {
        if !self.specs.iter().any(|s| s.name == call.name) {
            return Err(ParleyError::Tool {
                name: call.name.clone(),
                message: "unknown tool".into(),
            });
        }

        debug!(tool = %call.name, "forwarding tool call to webhook");
        let request = WebhookRequest {
            tool: &call.name,
            arguments: &call.arguments,
            context: WebhookContext {
                identity: &ctx.identity_key,
                session_id: ctx.session_id.to_string(),
                attachments: &ctx.attachments,
            },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| ParleyError::Tool {
                name: call.name.clone(),
                message: format!("webhook request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ParleyError::Tool {
                name: call.name.clone(),
                message: format!("webhook returned {status}"),
            });
        }

        let body: WebhookResponse =
            response.json().await.map_err(|e| ParleyError::Tool {
                name: call.name.clone(),
                message: format!("malformed webhook response: {e}"),
            })?;

        if body.success {
            Ok(body.payload.unwrap_or(Value::Null))
        } else {
            Err(ParleyError::Tool {
                name: call.name.clone(),
                message: body.error.unwrap_or_else(|| "tool reported failure".into()),
            })
        }
    }
}

/// Executor for deployments with no tool backend: knows no tools and
/// refuses every call.
pub struct NullToolExecutor;

#[async_trait]
impl ToolExecutor for NullToolExecutor {
    fn known_tools(&self) -> Vec<String> {
        Vec::new()
    }

    fn tool_specs(&self) -> Vec<ToolSpec> {
        Vec::new()
    }

    async fn execute(&self, call: &ToolCall, _ctx: &ToolContext) -> Result<Value, ParleyError> {
        Err(ParleyError::Tool {
            name: call.name.clone(),
            message: "no tool backend configured".into(),
        })
    }
}
