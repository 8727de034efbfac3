// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI chat-completions provider adapter for Parley.
//!
//! Implements [`ProviderAdapter`] for the chat-completions API. Unlike the
//! Anthropic wire, tool-call arguments arrive as JSON-encoded strings and
//! must be parsed here; malformed argument strings degrade to an empty map
//! rather than failing the whole completion.

pub mod client;
pub mod types;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use parley_config::model::ProviderSettings;
use parley_core::types::{CascadeResult, ChatRole, CompletionRequest, ToolCall};
use parley_core::{AdapterType, HealthStatus, ParleyError, PluginAdapter, ProviderAdapter};

use crate::client::OpenAiClient;
use crate::types::{ChatRequest, WireFunctionDef, WireMessage, WireTool, WireToolCall};

/// OpenAI provider implementing [`ProviderAdapter`].
///
/// API key resolution order: config -> `OPENAI_API_KEY` env var -> error.
pub struct OpenAiProvider {
    client: OpenAiClient,
    model: String,
    fallback_model: Option<String>,
    supports_tools: bool,
    max_tokens: u32,
}

impl OpenAiProvider {
    /// Creates a new OpenAI provider from its cascade settings.
    pub fn new(settings: &ProviderSettings) -> Result<Self, ParleyError> {
        let api_key = resolve_api_key(settings.api_key.as_deref())?;
        let mut client = OpenAiClient::new(&api_key)?;
        if let Some(base_url) = &settings.base_url {
            client = client.with_base_url(base_url.clone());
        }

        info!(model = %settings.model, "OpenAI provider initialized");

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
    /// System turns stay inline as `system` role messages; tool feedback
    /// turns become `tool` role messages keyed by `tool_call_id`.
    fn to_chat_request(&self, request: &CompletionRequest, model: &str) -> ChatRequest {
        let messages = request
            .messages
            .iter()
            .map(|message| match message.role {
                ChatRole::System => WireMessage::text("system", message.content.clone()),
                ChatRole::User => WireMessage::text("user", message.content.clone()),
                ChatRole::Assistant => WireMessage::text("assistant", message.content.clone()),
                ChatRole::Tool => WireMessage::tool_feedback(
                    message.tool_call_id.clone().unwrap_or_default(),
                    message.content.clone(),
                ),
            })
            .collect();

        let tools = if self.supports_tools && !request.tools.is_empty() {
            Some(
                request
                    .tools
                    .iter()
                    .map(|spec| WireTool {
                        kind: "function".into(),
                        function: WireFunctionDef {
                            name: spec.name.clone(),
                            description: spec.description.clone(),
                            parameters: spec.input_schema.clone(),
                        },
                    })
                    .collect(),
            )
        } else {
            None
        };

        ChatRequest {
            model: request.model_hint.clone().unwrap_or_else(|| model.to_string()),
            messages,
            max_tokens: self.max_tokens,
            tools,
        }
    }

    /// Normalizes an API response into the canonical cascade result.
    fn to_cascade_result(&self, response: types::ChatResponse) -> CascadeResult {
        let model = response.model;
        let Some(choice) = response.choices.into_iter().next() else {
            return CascadeResult::failed("openai", "response carried no choices").with_model(model);
        };

        let tool_calls: Vec<ToolCall> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(parse_wire_tool_call)
            .collect();

        let content = choice.message.content.filter(|text| !text.is_empty());

        CascadeResult::ok("openai", content, tool_calls).with_model(model)
    }
}

#[async_trait]
impl PluginAdapter for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
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
        debug!("OpenAI provider shutting down");
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiProvider {
    fn supports_tools(&self) -> bool {
        self.supports_tools
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CascadeResult, ParleyError> {
        let api_request = self.to_chat_request(&request, &self.model);
        match self.client.complete_chat(&api_request).await {
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
                let api_request = self.to_chat_request(&retry_request, fallback_model);
                let response = self.client.complete_chat(&api_request).await?;
                Ok(self.to_cascade_result(response))
            }
            Err(e) => Err(e),
        }
    }
}

/// Parses one wire tool call, degrading malformed argument strings to an
/// empty argument map.
fn parse_wire_tool_call(call: WireToolCall) -> ToolCall {
    let arguments = match serde_json::from_str::<serde_json::Value>(&call.function.arguments) {
        Ok(serde_json::Value::Object(map)) => map,
        Ok(other) => {
            warn!(tool = %call.function.name, ?other, "non-object tool arguments, degrading to empty map");
            serde_json::Map::new()
        }
        Err(e) => {
            warn!(tool = %call.function.name, error = %e, "unparsable tool arguments, degrading to empty map");
            serde_json::Map::new()
        }
    };
    ToolCall {
        id: call.id,
        name: call.function.name,
        arguments,
    }
}

fn resolve_api_key(configured: Option<&str>) -> Result<String, ParleyError> {
    if let Some(key) = configured {
        return Ok(key.to_string());
    }
    std::env::var("OPENAI_API_KEY").map_err(|_| {
        ParleyError::Config("no OpenAI API key: set providers.api_key or OPENAI_API_KEY".to_string())
    })
}

/// Quota signals that justify the internal fallback-model retry.
fn is_quota_exhaustion(error: &ParleyError) -> bool {
    let text = error.to_string().to_lowercase();
    text.contains("insufficient_quota") || text.contains("rate limit") || text.contains("quota")
}
