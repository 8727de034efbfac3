// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The bounded tool-orchestration loop.
//!
//! A small state machine drives rounds of tool execution: extract calls from
//! the current model response, run them sequentially in extraction order,
//! feed the results back as `role: tool` messages, and re-invoke the cascade
//! with the same provider preference. The loop terminates when extraction
//! yields nothing or the iteration cap is hit; it never runs unbounded.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use parley_cascade::ProviderCascade;
use parley_core::types::{CascadeResult, ChatMessage, CompletionRequest, ToolResult};
use parley_core::{ToolContext, ToolExecutor};

use crate::extractor;

/// Loop state. `ExecutingTools` always returns to `AwaitingModel`; `Done`
/// is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopState {
    AwaitingModel,
    ExecutingTools,
    Done,
}

/// What one orchestrated turn produced.
#[derive(Debug)]
pub struct OrchestratorOutcome {
    /// Last model response text, markup-stripped. Empty when the model
    /// produced calls but no closing narration.
    pub final_text: String,
    /// Monotone count of tool executions across all rounds.
    pub tools_executed: u32,
    /// Every tool result produced this turn, in execution order.
    pub tool_results: Vec<ToolResult>,
}

/// Drives the tool loop for one turn.
pub struct ToolOrchestrator {
    cascade: Arc<ProviderCascade>,
    max_iterations: u32,
}

impl ToolOrchestrator {
    pub fn new(cascade: Arc<ProviderCascade>, max_iterations: u32) -> Self {
        Self {
            cascade,
            max_iterations,
        }
    }

    /// Runs the loop starting from the cascade result of the opening call.
    ///
    /// `conversation` is extended in place with assistant narration and tool
    /// feedback messages so the caller can persist the full exchange.
    /// Cancellation is honored between steps: a tool that has started runs
    /// to completion, but no further tool or model call begins.
    pub async fn run(
        &self,
        initial: CascadeResult,
        conversation: &mut Vec<ChatMessage>,
        executor: &dyn ToolExecutor,
        ctx: &ToolContext,
        provider_preference: Option<&str>,
        cancel: &CancellationToken,
    ) -> OrchestratorOutcome {
        let known_tools = executor.known_tools();
        let mut current = initial;
        let mut state = LoopState::AwaitingModel;
        let mut tools_executed: u32 = 0;
        let mut tool_results: Vec<ToolResult> = Vec::new();
        let mut rounds: u32 = 0;

        while state != LoopState::Done {
            let calls = extractor::extract(&current, &known_tools);
            if calls.is_empty() {
                state = LoopState::Done;
                break;
            }
            if rounds >= self.max_iterations {
                warn!(
                    rounds,
                    cap = self.max_iterations,
                    "iteration cap reached with tool calls still pending"
                );
                state = LoopState::Done;
                break;
            }

            state = LoopState::ExecutingTools;
            rounds += 1;
            debug!(round = rounds, calls = calls.len(), "executing tool round");

            // Keep the model's narration in the transcript so later rounds
            // see their own reasoning.
            if let Some(text) = current.content.as_deref().filter(|t| !t.trim().is_empty()) {
                conversation.push(ChatMessage::assistant(extractor::strip_tool_markup(text)));
            }

            for call in &calls {
                if cancel.is_cancelled() {
                    info!(round = rounds, "cancelled between tool steps, stopping loop");
                    return self.finish(current, tools_executed, tool_results);
                }
                let result = match executor.execute(call, ctx).await {
                    Ok(payload) => ToolResult::ok(call, payload),
                    Err(e) => {
                        // Isolated failure: the model gets the error text
                        // and may retry, substitute, or explain it.
                        warn!(tool = %call.name, error = %e, "tool execution failed");
                        ToolResult::failed(call, e.to_string())
                    }
                };
                tools_executed += 1;
                conversation.push(ChatMessage::tool_result(
                    &call.id,
                    &call.name,
                    result.to_feedback_content(),
                ));
                tool_results.push(result);
            }

            if cancel.is_cancelled() {
                info!(round = rounds, "cancelled before model re-invoke, stopping loop");
                return self.finish(current, tools_executed, tool_results);
            }

            state = LoopState::AwaitingModel;
            let request = CompletionRequest {
                messages: conversation.clone(),
                tools: executor.tool_specs(),
                model_hint: None,
            };
            let next = self.cascade.invoke(request, provider_preference, cancel).await;
            if !next.success {
                warn!(
                    round = rounds,
                    error = next.error.as_deref().unwrap_or("unknown"),
                    "model re-invoke failed, ending loop with previous response"
                );
                state = LoopState::Done;
                break;
            }
            current = next;
        }

        self.finish(current, tools_executed, tool_results)
    }

    fn finish(
        &self,
        last: CascadeResult,
        tools_executed: u32,
        tool_results: Vec<ToolResult>,
    ) -> OrchestratorOutcome {
        let final_text = last
            .content
            .as_deref()
            .map(extractor::strip_tool_markup)
            .unwrap_or_default();
        OrchestratorOutcome {
            final_text,
            tools_executed,
            tool_results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parley_cascade::ProviderRegistry;
    use parley_config::model::ProviderSettings;
    use parley_core::types::{AdapterType, HealthStatus, ToolCall, ToolSpec};
    use parley_core::{ParleyError, PluginAdapter, ProviderAdapter};
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    /// Provider returning scripted responses in sequence.
    struct ScriptedProvider {
        responses: Mutex<Vec<CascadeResult>>,
    }

    impl ScriptedProvider {
        fn new(mut responses: Vec<CascadeResult>) -> Self {
            responses.reverse();
            Self {
                responses: Mutex::new(responses),
            }
        }
    }

    #[async_trait]
    impl PluginAdapter for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }
        fn version(&self) -> semver::Version {
            semver::Version::new(0, 1, 0)
        }
        fn adapter_type(&self) -> AdapterType {
            AdapterType::Provider
        }
        async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
            Ok(HealthStatus::Healthy)
        }
        async fn shutdown(&self) -> Result<(), ParleyError> {
            Ok(())
        }
    }

    #[async_trait]
    impl ProviderAdapter for ScriptedProvider {
        fn supports_tools(&self) -> bool {
            true
        }
        async fn complete(&self, _request: CompletionRequest) -> Result<CascadeResult, ParleyError> {
            Ok(self
                .responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| CascadeResult::ok("scripted", Some("done".into()), Vec::new())))
        }
    }

    struct CountingExecutor {
        executions: AtomicUsize,
        fail_tool: Option<String>,
    }

    impl CountingExecutor {
        fn new() -> Self {
            Self {
                executions: AtomicUsize::new(0),
                fail_tool: None,
            }
        }
    }

    #[async_trait]
    impl ToolExecutor for CountingExecutor {
        fn known_tools(&self) -> Vec<String> {
            vec!["search".into(), "send_email".into()]
        }
        fn tool_specs(&self) -> Vec<ToolSpec> {
            Vec::new()
        }
        async fn execute(
            &self,
            call: &ToolCall,
            _ctx: &ToolContext,
        ) -> Result<serde_json::Value, ParleyError> {
            self.executions.fetch_add(1, Ordering::SeqCst);
            if self.fail_tool.as_deref() == Some(call.name.as_str()) {
                return Err(ParleyError::Tool {
                    name: call.name.clone(),
                    message: "backend unreachable".into(),
                });
            }
            Ok(json!({"count": 3}))
        }
    }

    fn ctx() -> ToolContext {
        ToolContext {
            identity_key: "ip-10.0.0.1".into(),
            session_id: Uuid::new_v4(),
            attachments: Vec::new(),
        }
    }

    fn call(name: &str, args: serde_json::Value) -> ToolCall {
        let arguments = match args {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        ToolCall {
            id: format!("call-{name}"),
            name: name.into(),
            arguments,
        }
    }

    fn orchestrator(responses: Vec<CascadeResult>, max_iterations: u32) -> ToolOrchestrator {
        let mut registry = ProviderRegistry::new();
        registry.register(
            ProviderSettings {
                name: "scripted".into(),
                priority: 1,
                enabled: true,
                fallback_only: false,
                timeout_ms: 5_000,
                supports_tools: true,
                model: "scripted-1".into(),
                fallback_model: None,
                api_key: None,
                base_url: None,
                max_tokens: 1024,
            },
            Arc::new(ScriptedProvider::new(responses)),
        );
        ToolOrchestrator::new(
            Arc::new(ProviderCascade::new(Arc::new(registry))),
            max_iterations,
        )
    }

    #[tokio::test]
    async fn happy_path_one_round() {
        let initial = CascadeResult::ok(
            "scripted",
            None,
            vec![call("search", json!({"q": "x"}))],
        );
        let orch = orchestrator(
            vec![CascadeResult::ok(
                "scripted",
                Some("Found 3 results.".into()),
                Vec::new(),
            )],
            5,
        );
        let executor = CountingExecutor::new();
        let mut conversation = vec![ChatMessage::user("search for x")];

        let outcome = orch
            .run(
                initial,
                &mut conversation,
                &executor,
                &ctx(),
                None,
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(outcome.final_text, "Found 3 results.");
        assert_eq!(outcome.tools_executed, 1);
        assert!(outcome.tool_results[0].success);
        // Conversation gained the tool feedback message.
        assert!(conversation
            .iter()
            .any(|m| m.tool_call_id.as_deref() == Some("call-search")));
    }

    #[tokio::test]
    async fn iteration_cap_bounds_the_loop() {
        let looping = || {
            CascadeResult::ok(
                "scripted",
                None,
                vec![call("search", json!({"q": "again"}))],
            )
        };
        // Model keeps requesting tools forever.
        let orch = orchestrator(vec![looping(), looping(), looping(), looping()], 2);
        let executor = CountingExecutor::new();
        let mut conversation = vec![ChatMessage::user("loop")];

        let outcome = orch
            .run(
                looping(),
                &mut conversation,
                &executor,
                &ctx(),
                None,
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(executor.executions.load(Ordering::SeqCst), 2);
        assert_eq!(outcome.tools_executed, 2);
    }

    #[tokio::test]
    async fn failing_tool_continues_loop() {
        let initial = CascadeResult::ok(
            "scripted",
            None,
            vec![
                call("send_email", json!({"to": "a@b.c"})),
                call("search", json!({"q": "x"})),
            ],
        );
        let orch = orchestrator(
            vec![CascadeResult::ok(
                "scripted",
                Some("Email failed but the search found 3 hits.".into()),
                Vec::new(),
            )],
            5,
        );
        let mut executor = CountingExecutor::new();
        executor.fail_tool = Some("send_email".into());
        let mut conversation = vec![ChatMessage::user("email and search")];

        let outcome = orch
            .run(
                initial,
                &mut conversation,
                &executor,
                &ctx(),
                None,
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(outcome.tools_executed, 2);
        assert!(!outcome.tool_results[0].success);
        assert!(outcome.tool_results[1].success);
        assert!(outcome.final_text.contains("3 hits"));
    }

    #[tokio::test]
    async fn execution_follows_extraction_order() {
        let initial = CascadeResult::ok(
            "scripted",
            None,
            vec![call("search", json!({})), call("send_email", json!({}))],
        );
        let orch = orchestrator(
            vec![CascadeResult::ok("scripted", Some("ok".into()), Vec::new())],
            5,
        );
        let executor = CountingExecutor::new();
        let mut conversation = Vec::new();

        let outcome = orch
            .run(
                initial,
                &mut conversation,
                &executor,
                &ctx(),
                None,
                &CancellationToken::new(),
            )
            .await;

        let names: Vec<&str> = outcome.tool_results.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["search", "send_email"]);
    }

    #[tokio::test]
    async fn cancellation_stops_between_steps() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let initial = CascadeResult::ok(
            "scripted",
            None,
            vec![call("search", json!({})), call("send_email", json!({}))],
        );
        let orch = orchestrator(Vec::new(), 5);
        let executor = CountingExecutor::new();
        let mut conversation = Vec::new();

        let outcome = orch
            .run(initial, &mut conversation, &executor, &ctx(), None, &cancel)
            .await;

        // Already-cancelled token: no step starts.
        assert_eq!(outcome.tools_executed, 0);
    }

    #[tokio::test]
    async fn markup_is_stripped_from_final_text() {
        let initial = CascadeResult::ok(
            "scripted",
            None,
            vec![call("search", json!({"q": "x"}))],
        );
        let orch = orchestrator(
            vec![CascadeResult::ok(
                "scripted",
                Some("All set.\n<tool_call>{\"name\": \"search\"}</tool_call>".into()),
                Vec::new(),
            )],
            1,
        );
        let executor = CountingExecutor::new();
        let mut conversation = Vec::new();

        let outcome = orch
            .run(
                initial,
                &mut conversation,
                &executor,
                &ctx(),
                None,
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(outcome.final_text, "All set.");
    }

    #[tokio::test]
    async fn tool_calls_take_precedence_over_content() {
        // Round 1 returns both narration and a call: the call wins and a
        // round runs; round 2 closes with text only.
        let initial = CascadeResult::ok(
            "scripted",
            Some("Let me check that.".into()),
            vec![call("search", json!({"q": "x"}))],
        );
        let orch = orchestrator(
            vec![CascadeResult::ok(
                "scripted",
                Some("Checked.".into()),
                Vec::new(),
            )],
            5,
        );
        let executor = CountingExecutor::new();
        let mut conversation = Vec::new();

        let outcome = orch
            .run(
                initial,
                &mut conversation,
                &executor,
                &ctx(),
                None,
                &CancellationToken::new(),
            )
            .await;

        assert_eq!(outcome.tools_executed, 1);
        assert_eq!(outcome.final_text, "Checked.");
        // Narration from round 1 survives in the transcript.
        assert!(conversation
            .iter()
            .any(|m| m.content == "Let me check that."));
    }
}
