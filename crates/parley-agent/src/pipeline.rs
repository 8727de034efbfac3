// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The turn-handling pipeline.
//!
//! One [`ChatPipeline::handle_turn`] call owns the full control flow:
//! identity resolution, memory load, the ambiguous-reply short-circuit,
//! the provider cascade, the tool loop, fallback synthesis, memory save,
//! and the detached summary-enrichment spawn.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use parley_cascade::ProviderCascade;
use parley_config::ParleyConfig;
use parley_core::types::{
    CascadeResult, ChatMessage, ChatRole, CompletionRequest, ConversationRecord,
};
use parley_core::{ConversationStore, ToolContext, ToolExecutor};
use parley_memory::enricher::SummaryEnricher;

use crate::ambiguity::{self, Resolution};
use crate::identity::IdentityResolver;
use crate::orchestrator::ToolOrchestrator;
use crate::synthesizer;

/// One inbound chat turn, already parsed out of the transport layer.
#[derive(Debug, Clone, Default)]
pub struct TurnRequest {
    /// Full message list, or empty when only `user_query` was supplied.
    pub messages: Vec<ChatMessage>,
    /// Bare query shorthand for single-message turns.
    pub user_query: Option<String>,
    /// Provider pin; `None` or `"auto"` runs the full cascade.
    pub provider: Option<String>,
    pub use_tools: bool,
    pub save_memory: bool,
    /// Raw attachment objects passed through to tool executions.
    pub attachments: Vec<serde_json::Value>,
    /// Explicit caller identity, when the client supplies one.
    pub user_id: Option<String>,
    /// Transport headers used for identity derivation.
    pub headers: BTreeMap<String, String>,
}

/// What one handled turn produced, ready for the response envelope.
#[derive(Debug)]
pub struct TurnOutcome {
    pub success: bool,
    pub content: String,
    pub provider: String,
    pub model: Option<String>,
    pub has_tool_calls: bool,
    pub tool_calls_executed: u32,
    pub session_id: String,
    pub identity_key: String,
}

/// Owns the wired component graph for turn handling.
pub struct ChatPipeline {
    config: ParleyConfig,
    store: Arc<dyn ConversationStore>,
    identity: Arc<IdentityResolver>,
    cascade: Arc<ProviderCascade>,
    orchestrator: ToolOrchestrator,
    executor: Arc<dyn ToolExecutor>,
    enricher: Option<SummaryEnricher>,
}

impl ChatPipeline {
    pub fn new(
        config: ParleyConfig,
        store: Arc<dyn ConversationStore>,
        identity: Arc<IdentityResolver>,
        cascade: Arc<ProviderCascade>,
        executor: Arc<dyn ToolExecutor>,
        enricher: Option<SummaryEnricher>,
    ) -> Self {
        let orchestrator =
            ToolOrchestrator::new(cascade.clone(), config.orchestrator.max_iterations);
        Self {
            config,
            store,
            identity,
            cascade,
            orchestrator,
            executor,
            enricher,
        }
    }

    /// Handles one turn end to end.
    ///
    /// Never returns an error for provider or persistence failures; those
    /// degrade in-band (canned response, logged memory loss). The caller's
    /// cancellation token is the end-to-end request budget.
    pub async fn handle_turn(&self, request: TurnRequest, cancel: &CancellationToken) -> TurnOutcome {
        let identity = self
            .identity
            .resolve(&request.headers, request.user_id.as_deref())
            .await;
        debug!(identity = %identity.key, session = %identity.session_id, "turn started");

        let mut record = match self.store.load(&identity.key).await {
            Ok(Some(record)) => record,
            Ok(None) => ConversationRecord::empty(&identity.key, identity.session_id),
            Err(e) => {
                warn!(identity = %identity.key, error = %e, "memory load failed, starting fresh");
                ConversationRecord::empty(&identity.key, identity.session_id)
            }
        };
        record.session_id = identity.session_id;

        let turn_messages = normalize_turn_messages(&request);
        let user_query = latest_user_text(&turn_messages).unwrap_or_default();

        // Short ambiguous replies resolve against recent context and skip
        // the cascade and tools entirely. Hard rule: no tool runs here.
        if let Resolution::Resolved(reply) = ambiguity::resolve(&user_query, &record.messages) {
            info!(identity = %identity.key, "ambiguous reply short-circuit");
            record.messages.extend(turn_messages);
            record.messages.push(ChatMessage::assistant(reply.clone()));
            self.persist(&request, record).await;
            return TurnOutcome {
                success: true,
                content: reply,
                provider: "context".to_string(),
                model: None,
                has_tool_calls: false,
                tool_calls_executed: 0,
                session_id: identity.session_id.to_string(),
                identity_key: identity.key,
            };
        }

        // Conversation sent to the model: system prompt, remembered
        // history, then this turn's messages.
        let mut conversation: Vec<ChatMessage> = Vec::new();
        if let Some(prompt) = &self.config.agent.system_prompt {
            conversation.push(ChatMessage::system(prompt.clone()));
        }
        conversation.extend(record.messages.iter().cloned());
        conversation.extend(turn_messages.iter().cloned());

        let tools = if request.use_tools {
            self.executor.tool_specs()
        } else {
            Vec::new()
        };
        let provider_preference = request.provider.as_deref();

        let initial = self
            .cascade
            .invoke(
                CompletionRequest {
                    messages: conversation.clone(),
                    tools,
                    model_hint: None,
                },
                provider_preference,
                cancel,
            )
            .await;

        if !initial.success {
            // Total cascade failure degrades to the canned response; the
            // user never sees a raw provider error.
            warn!(
                identity = %identity.key,
                error = initial.error.as_deref().unwrap_or("unknown"),
                "all providers failed, returning canned response"
            );
            let canned = self.config.cascade.canned_response.clone();
            record.messages.extend(turn_messages);
            record.messages.push(ChatMessage::assistant(canned.clone()));
            self.persist(&request, record).await;
            return TurnOutcome {
                success: false,
                content: canned,
                provider: initial.provider,
                model: None,
                has_tool_calls: false,
                tool_calls_executed: 0,
                session_id: identity.session_id.to_string(),
                identity_key: identity.key,
            };
        }

        let provider = initial.provider.clone();
        let model = initial.model.clone();
        let had_tool_calls = initial.has_tool_calls();

        let (final_text, tools_executed, tool_results) = if request.use_tools {
            let ctx = ToolContext {
                identity_key: identity.key.clone(),
                session_id: identity.session_id,
                attachments: request.attachments.clone(),
            };
            let outcome = self
                .orchestrator
                .run(
                    initial,
                    &mut conversation,
                    self.executor.as_ref(),
                    &ctx,
                    provider_preference,
                    cancel,
                )
                .await;
            (outcome.final_text, outcome.tools_executed, outcome.tool_results)
        } else {
            let text = initial
                .content
                .as_deref()
                .map(crate::extractor::strip_tool_markup)
                .unwrap_or_default();
            (text, 0, Vec::new())
        };

        // The model produced calls but no closing narration: render the
        // deterministic summary instead of returning an empty reply.
        let content = if final_text.is_empty() && tools_executed > 0 {
            synthesizer::synthesize(&tool_results, &user_query)
        } else {
            final_text
        };

        record.messages.extend(turn_messages);
        record.messages.push(ChatMessage::assistant(content.clone()));
        record.tool_results.extend(tool_results);
        record.updated_at = Utc::now();
        self.persist(&request, record).await;

        TurnOutcome {
            success: true,
            content,
            provider,
            model,
            has_tool_calls: had_tool_calls,
            tool_calls_executed: tools_executed,
            session_id: identity.session_id.to_string(),
            identity_key: identity.key,
        }
    }

    /// Saves the record and fires the detached enrichment request.
    ///
    /// Persistence failure never reaches the response path: the store
    /// adapter already degrades internally, and the enricher is
    /// fire-and-forget by design.
    async fn persist(&self, request: &TurnRequest, record: ConversationRecord) {
        if !request.save_memory {
            debug!(identity = %record.identity_key, "memory save skipped by request");
            return;
        }
        if let Err(e) = self.store.save(&record).await {
            warn!(identity = %record.identity_key, error = %e, "memory save failed");
            return;
        }
        if let Some(enricher) = &self.enricher {
            enricher.spawn_enrich(record);
        }
    }
}

/// Builds this turn's message list from either the message array or the
/// bare query shorthand.
fn normalize_turn_messages(request: &TurnRequest) -> Vec<ChatMessage> {
    if !request.messages.is_empty() {
        return request.messages.clone();
    }
    request
        .user_query
        .as_deref()
        .map(|q| vec![ChatMessage::user(q)])
        .unwrap_or_default()
}

fn latest_user_text(messages: &[ChatMessage]) -> Option<String> {
    messages
        .iter()
        .rev()
        .find(|m| m.role == ChatRole::User)
        .map(|m| m.content.clone())
}
