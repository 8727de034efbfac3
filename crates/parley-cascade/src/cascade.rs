// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider cascade execution.
//!
//! Ordering rules:
//! 1. A specific requested provider is called alone; its result is final.
//! 2. The primary pool is tried sequentially in ascending priority order,
//!    each call bounded by that provider's own timeout.
//! 3. The fallback-only pool is raced concurrently; first success wins.
//! 4. Total failure produces one aggregated error with the attempt count.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{FuturesUnordered, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use parley_core::types::{CascadeResult, CompletionRequest};

use crate::registry::{ProviderRegistry, RegisteredProvider};

/// Cascading dispatcher over the provider registry.
pub struct ProviderCascade {
    registry: Arc<ProviderRegistry>,
}

impl ProviderCascade {
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        Self { registry }
    }

    /// Run the cascade for one completion request.
    ///
    /// `preferred` of `None` or `"auto"` means full cascade; any other value
    /// pins the request to that provider, success or failure. The result is
    /// always a `CascadeResult`; total failure is carried in-band, never as
    /// an `Err`, because the pipeline degrades to a canned response.
    pub async fn invoke(
        &self,
        request: CompletionRequest,
        preferred: Option<&str>,
        cancel: &CancellationToken,
    ) -> CascadeResult {
        if let Some(name) = preferred.filter(|n| *n != "auto") {
            return self.invoke_specific(name, request, cancel).await;
        }

        let mut attempts = 0usize;
        let mut failures: Vec<String> = Vec::new();

        for provider in self.registry.primaries() {
            if cancel.is_cancelled() {
                return CascadeResult::failed("cascade", "request cancelled");
            }
            attempts += 1;
            let result = call_provider(provider, request.clone(), cancel).await;
            if result.success {
                return result;
            }
            let reason = result.error.unwrap_or_else(|| "unknown failure".to_string());
            warn!(provider = %provider.settings.name, %reason, "primary provider failed, advancing cascade");
            failures.push(format!("{}: {reason}", provider.settings.name));
        }

        // Last resort: race every fallback provider, no ordering guarantee.
        let fallbacks = self.registry.fallbacks();
        if !fallbacks.is_empty() && !cancel.is_cancelled() {
            let mut racing: FuturesUnordered<_> = fallbacks
                .into_iter()
                .map(|provider| {
                    let request = request.clone();
                    async move {
                        (
                            provider.settings.name.clone(),
                            call_provider(provider, request, cancel).await,
                        )
                    }
                })
                .collect();

            while let Some((name, result)) = racing.next().await {
                attempts += 1;
                if result.success {
                    debug!(provider = %name, "fallback provider won the race");
                    return result;
                }
                let reason = result.error.unwrap_or_else(|| "unknown failure".to_string());
                failures.push(format!("{name}: {reason}"));
            }
        }

        CascadeResult::failed(
            "cascade",
            format!(
                "all {attempts} provider attempt(s) failed: [{}]",
                failures.join("; ")
            ),
        )
    }

    async fn invoke_specific(
        &self,
        name: &str,
        request: CompletionRequest,
        cancel: &CancellationToken,
    ) -> CascadeResult {
        match self.registry.get(name) {
            Some(provider) if provider.settings.enabled => {
                call_provider(provider, request, cancel).await
            }
            Some(_) => CascadeResult::failed(name, format!("provider '{name}' is disabled")),
            None => CascadeResult::failed(name, format!("provider '{name}' is not configured")),
        }
    }
}

/// One bounded provider call: per-provider timeout plus cancellation.
///
/// A timeout aborts the in-flight request and counts as a provider failure
/// for the cascade, not a fatal error for the turn.
async fn call_provider(
    provider: &RegisteredProvider,
    request: CompletionRequest,
    cancel: &CancellationToken,
) -> CascadeResult {
    let name = provider.settings.name.clone();
    let budget = Duration::from_millis(provider.settings.timeout_ms);
    let started = Instant::now();

    let outcome = tokio::select! {
        _ = cancel.cancelled() => {
            return CascadeResult::failed(name, "request cancelled");
        }
        outcome = tokio::time::timeout(budget, provider.adapter.complete(request)) => outcome,
    };

    let elapsed = started.elapsed().as_millis() as u64;
    match outcome {
        Ok(Ok(mut result)) => {
            if result.latency_ms.is_none() {
                result.latency_ms = Some(elapsed);
            }
            result
        }
        Ok(Err(e)) => CascadeResult::failed(name, e.to_string()).with_latency(elapsed),
        Err(_) => CascadeResult::failed(name, format!("timed out after {budget:?}"))
            .with_latency(elapsed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parley_config::model::ProviderSettings;
    use parley_core::types::ChatMessage;
    use parley_core::{
        AdapterType, HealthStatus, ParleyError, PluginAdapter, ProviderAdapter,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Behavior {
        Reply(&'static str),
        Fail(&'static str),
        Hang,
    }

    struct MockProvider {
        name: String,
        behavior: Behavior,
        calls: AtomicUsize,
    }

    impl MockProvider {
        fn new(name: &str, behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                behavior,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl PluginAdapter for MockProvider {
        fn name(&self) -> &str {
            &self.name
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
    impl ProviderAdapter for MockProvider {
        fn supports_tools(&self) -> bool {
            true
        }
        async fn complete(&self, _req: CompletionRequest) -> Result<CascadeResult, ParleyError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behavior {
                Behavior::Reply(content) => {
                    Ok(CascadeResult::ok(&self.name, Some((*content).to_string()), vec![]))
                }
                Behavior::Fail(reason) => Ok(CascadeResult::failed(&self.name, *reason)),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    unreachable!("hanging provider should be timed out")
                }
            }
        }
    }

    fn settings(name: &str, priority: u32, fallback_only: bool, timeout_ms: u64) -> ProviderSettings {
        ProviderSettings {
            name: name.to_string(),
            priority,
            enabled: true,
            fallback_only,
            timeout_ms,
            supports_tools: true,
            model: "test-model".to_string(),
            fallback_model: None,
            api_key: None,
            base_url: None,
            max_tokens: 4096,
        }
    }

    fn request() -> CompletionRequest {
        CompletionRequest::plain(vec![ChatMessage::user("hi")])
    }

    #[tokio::test]
    async fn first_primary_success_short_circuits() {
        let a = MockProvider::new("a", Behavior::Reply("from a"));
        let b = MockProvider::new("b", Behavior::Reply("from b"));
        let mut registry = ProviderRegistry::new();
        registry.register(settings("a", 1, false, 1000), a.clone());
        registry.register(settings("b", 2, false, 1000), b.clone());

        let cascade = ProviderCascade::new(Arc::new(registry));
        let result = cascade.invoke(request(), None, &CancellationToken::new()).await;

        assert!(result.success);
        assert_eq!(result.content.as_deref(), Some("from a"));
        assert_eq!(b.calls.load(Ordering::SeqCst), 0, "b must not be tried");
    }

    #[tokio::test]
    async fn timed_out_primary_advances_to_next() {
        let slow = MockProvider::new("slow", Behavior::Hang);
        let backup = MockProvider::new("backup", Behavior::Reply("hello"));
        let mut registry = ProviderRegistry::new();
        registry.register(settings("slow", 1, false, 50), slow);
        registry.register(settings("backup", 2, false, 1000), backup);

        let cascade = ProviderCascade::new(Arc::new(registry));
        let result = cascade.invoke(request(), None, &CancellationToken::new()).await;

        assert!(result.success);
        assert_eq!(result.provider, "backup");
        assert_eq!(result.content.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn fallback_pool_races_after_primaries_fail() {
        let primary = MockProvider::new("primary", Behavior::Fail("boom"));
        let reserve = MockProvider::new("reserve", Behavior::Reply("saved"));
        let mut registry = ProviderRegistry::new();
        registry.register(settings("primary", 1, false, 1000), primary);
        registry.register(settings("reserve", 10, true, 1000), reserve);

        let cascade = ProviderCascade::new(Arc::new(registry));
        let result = cascade.invoke(request(), None, &CancellationToken::new()).await;

        assert!(result.success);
        assert_eq!(result.provider, "reserve");
    }

    #[tokio::test]
    async fn total_failure_aggregates_attempt_count() {
        let a = MockProvider::new("a", Behavior::Fail("quota"));
        let b = MockProvider::new("b", Behavior::Fail("down"));
        let mut registry = ProviderRegistry::new();
        registry.register(settings("a", 1, false, 1000), a);
        registry.register(settings("b", 2, true, 1000), b);

        let cascade = ProviderCascade::new(Arc::new(registry));
        let result = cascade.invoke(request(), None, &CancellationToken::new()).await;

        assert!(!result.success);
        let error = result.error.unwrap();
        assert!(error.contains("all 2 provider attempt(s) failed"), "{error}");
        assert!(error.contains("a: quota"));
        assert!(error.contains("b: down"));
    }

    #[tokio::test]
    async fn specific_provider_is_called_alone() {
        let a = MockProvider::new("a", Behavior::Reply("from a"));
        let b = MockProvider::new("b", Behavior::Fail("pinned failure"));
        let mut registry = ProviderRegistry::new();
        registry.register(settings("a", 1, false, 1000), a.clone());
        registry.register(settings("b", 2, false, 1000), b);

        let cascade = ProviderCascade::new(Arc::new(registry));
        let result = cascade
            .invoke(request(), Some("b"), &CancellationToken::new())
            .await;

        // Pinned provider failure is final: no fallback to a.
        assert!(!result.success);
        assert_eq!(result.provider, "b");
        assert_eq!(a.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn auto_preference_runs_full_cascade() {
        let a = MockProvider::new("a", Behavior::Reply("from a"));
        let mut registry = ProviderRegistry::new();
        registry.register(settings("a", 1, false, 1000), a);

        let cascade = ProviderCascade::new(Arc::new(registry));
        let result = cascade
            .invoke(request(), Some("auto"), &CancellationToken::new())
            .await;
        assert!(result.success);
    }

    #[tokio::test]
    async fn unknown_specific_provider_fails_without_cascade() {
        let a = MockProvider::new("a", Behavior::Reply("from a"));
        let mut registry = ProviderRegistry::new();
        registry.register(settings("a", 1, false, 1000), a.clone());

        let cascade = ProviderCascade::new(Arc::new(registry));
        let result = cascade
            .invoke(request(), Some("nope"), &CancellationToken::new())
            .await;

        assert!(!result.success);
        assert!(result.error.unwrap().contains("not configured"));
        assert_eq!(a.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancelled_token_stops_cascade_immediately() {
        let hang = MockProvider::new("hang", Behavior::Hang);
        let mut registry = ProviderRegistry::new();
        registry.register(settings("hang", 1, false, 60_000), hang);

        let cascade = ProviderCascade::new(Arc::new(registry));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = cascade.invoke(request(), None, &cancel).await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("cancelled"));
    }
}
