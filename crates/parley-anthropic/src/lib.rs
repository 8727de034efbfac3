// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Anthropic Claude provider adapter for Parley.
//!
//! Implements [`ProviderAdapter`] for the Anthropic Messages API, normalizing
//! `tool_use` response blocks into canonical [`ToolCall`]s and retrying once
//! on the fallback model when the primary model signals quota exhaustion or
//! overload.

pub mod client;
pub mod types;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use parley_config::model::ProviderSettings;
use parley_core::types::{CascadeResult, ChatMessage, ChatRole, CompletionRequest, ToolCall};
use parley_core::{AdapterType, HealthStatus, ParleyError, PluginAdapter, ProviderAdapter};

use crate::client::AnthropicClient;
use crate::types::{
    ApiContent, ApiContentBlock, ApiMessage, MessageRequest, ResponseContentBlock, ToolDefinition,
};

const API_VERSION: &str = "2023-06-01";

/// Anthropic Claude provider implementing [`ProviderAdapter`].
///
/// API key resolution order: config -> `ANTHROPIC_API_KEY` env var -> error.
pub struct AnthropicProvider {
    client: AnthropicClient,
    model: String,
    fallback_model: Option<String>,
    supports_tools: bool,
    max_tokens: u32,
}

impl AnthropicProvider {
    /// Creates a new Anthropic provider from its cascade settings.
    pub fn new(settings: &ProviderSettings) -> Result<Self, ParleyError> {
        let api_key = resolve_api_key(settings.api_key.as_deref())?;
        let mut client = AnthropicClient::new(&api_key, API_VERSION)?;
        if let Some(base_url) = &settings.base_url {
            client = client.with_base_url(base_url.clone());
        }

        info!(model = %settings.model, "Anthropic provider initialized");

        Ok(Self {
            client,
            model: settings.model.clone(),
            fallback_model: settings.fallback_model.clone(),
            supports_tools: settings.supports_tools,
            max_tokens: settings.max_tokens,
        })
    }

    /// Converts a canonical [`CompletionRequest`] into the wire format.
    ///
    /// System turns are concatenated into the request's `system` field; tool
    /// feedback turns become user messages carrying `tool_result` blocks, as
    /// the Messages API requires.
    fn to_message_request(&self, request: &CompletionRequest, model: &str) -> MessageRequest {
        let mut system_parts: Vec<&str> = Vec::new();
        let mut messages: Vec<ApiMessage> = Vec::new();

        for message in &request.messages {
            match message.role {
                ChatRole::System => system_parts.push(&message.content),
                ChatRole::User => messages.push(ApiMessage {
                    role: "user".into(),
                    content: ApiContent::Text(message.content.clone()),
                }),
                ChatRole::Assistant => messages.push(ApiMessage {
                    role: "assistant".into(),
                    content: ApiContent::Text(message.content.clone()),
                }),
                ChatRole::Tool => messages.push(tool_feedback_message(message)),
            }
        }

        let system = if system_parts.is_empty() {
            None
        } else {
            Some(system_parts.join("\n\n"))
        };

        let tools = if self.supports_tools && !request.tools.is_empty() {
            Some(
                request
                    .tools
                    .iter()
                    .map(|spec| ToolDefinition {
                        name: spec.name.clone(),
                        description: spec.description.clone(),
                        input_schema: spec.input_schema.clone(),
                    })
                    .collect(),
            )
        } else {
            None
        };

        MessageRequest {
            model: request.model_hint.clone().unwrap_or_else(|| model.to_string()),
            messages,
            system,
            max_tokens: self.max_tokens,
            tools,
        }
    }

    /// Normalizes an API response into the canonical cascade result.
    fn to_cascade_result(&self, response: types::MessageResponse) -> CascadeResult {
        let mut text_parts: Vec<String> = Vec::new();
        let mut tool_calls: Vec<ToolCall> = Vec::new();

        for block in response.content {
            match block {
                ResponseContentBlock::Text { text } => text_parts.push(text),
                ResponseContentBlock::ToolUse { id, name, input } => {
                    let arguments = match input {
                        serde_json::Value::Object(map) => map,
                        other => {
                            warn!(tool = %name, ?other, "non-object tool input, degrading to empty arguments");
                            serde_json::Map::new()
                        }
                    };
                    tool_calls.push(ToolCall {
                        id,
                        name,
                        arguments,
                    });
                }
            }
        }

        let content = if text_parts.is_empty() {
            None
        } else {
            Some(text_parts.join(""))
        };

        CascadeResult::ok("anthropic", content, tool_calls).with_model(response.model)
    }
}

#[async_trait]
impl PluginAdapter for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        // No API call here: health checks should not consume tokens.
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ParleyError> {
        debug!("Anthropic provider shutting down");
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicProvider {
    fn supports_tools(&self) -> bool {
        self.supports_tools
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CascadeResult, ParleyError> {
        let api_request = self.to_message_request(&request, &self.model);
        match self.client.complete_message(&api_request).await {
            Ok(response) => Ok(self.to_cascade_result(response)),
            Err(e) if is_quota_exhaustion(&e) => {
                // Model-variant retry is internal to the provider; the
                // cascade only ever sees one attempt.
                let Some(fallback_model) = &self.fallback_model else {
                    return Err(e);
                };
                warn!(
                    model = %self.model,
                    fallback = %fallback_model,
                    "quota exhausted, retrying on fallback model"
                );
                let mut retry_request = request;
                retry_request.model_hint = None;
                let api_request = self.to_message_request(&retry_request, fallback_model);
                let response = self.client.complete_message(&api_request).await?;
                Ok(self.to_cascade_result(response))
            }
            Err(e) => Err(e),
        }
    }
}

/// A tool feedback turn becomes a user message with one `tool_result` block.
fn tool_feedback_message(message: &ChatMessage) -> ApiMessage {
    ApiMessage {
        role: "user".into(),
        content: ApiContent::Blocks(vec![ApiContentBlock::ToolResult {
            tool_use_id: message.tool_call_id.clone().unwrap_or_default(),
            content: message.content.clone(),
            is_error: None,
        }]),
    }
}

fn resolve_api_key(configured: Option<&str>) -> Result<String, ParleyError> {
    if let Some(key) = configured {
        return Ok(key.to_string());
    }
    std::env::var("ANTHROPIC_API_KEY").map_err(|_| {
        ParleyError::Config(
            "no Anthropic API key: set providers.api_key or ANTHROPIC_API_KEY".to_string(),
        )
    })
}

/// Quota/overload signals that justify the internal fallback-model retry.
fn is_quota_exhaustion(error: &ParleyError) -> bool {
    let text = error.to_string().to_lowercase();
    text.contains("rate_limit") || text.contains("overloaded") || text.contains("quota")
}
