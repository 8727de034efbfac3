// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `parley serve` command implementation.
//!
//! Wires the adapter graph from configuration: SQLite conversation store,
//! one provider adapter per configured provider, the tool executor boundary,
//! the identity resolver, and the HTTP gateway. Supports graceful shutdown
//! via signal handlers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use parley_agent::{ChatPipeline, IdentityResolver, NullToolExecutor, WebhookToolExecutor};
use parley_anthropic::AnthropicProvider;
use parley_cascade::{ProviderCascade, ProviderRegistry};
use parley_config::ParleyConfig;
use parley_core::{ConversationStore, ParleyError, ProviderAdapter, ToolExecutor};
use parley_gateway::{GatewayState, ServerConfig};
use parley_memory::SummaryEnricher;
use parley_openai::OpenAiProvider;
use parley_storage::SqliteConversationStore;

use crate::shutdown;

/// Runs the `parley serve` command.
pub async fn run_serve(config: ParleyConfig) -> Result<(), ParleyError> {
    init_tracing(&config.agent.log_level);

    info!("starting parley serve");

    // Storage.
    let store = Arc::new(SqliteConversationStore::new(
        config.storage.clone(),
        config.memory.clone(),
    ));
    store.initialize().await?;
    info!(path = %config.storage.database_path, "conversation store initialized");

    // Provider registry, in declaration order so priority ties stay stable.
    let mut registry = ProviderRegistry::new();
    for settings in &config.providers {
        if !settings.enabled {
            info!(provider = %settings.name, "provider disabled, skipping");
            continue;
        }
        let adapter: Arc<dyn ProviderAdapter> = match settings.name.as_str() {
            "anthropic" => Arc::new(AnthropicProvider::new(settings)?),
            "openai" => Arc::new(OpenAiProvider::new(settings)?),
            other => {
                warn!(provider = %other, "unknown provider name, skipping");
                continue;
            }
        };
        info!(
            provider = %settings.name,
            priority = settings.priority,
            fallback_only = settings.fallback_only,
            "provider registered"
        );
        registry.register(settings.clone(), adapter);
    }
    if registry.is_empty() {
        return Err(ParleyError::Config(
            "no providers configured; enable at least one provider".to_string(),
        ));
    }
    let cascade = Arc::new(ProviderCascade::new(Arc::new(registry)));

    // Tool executor boundary.
    let executor: Arc<dyn ToolExecutor> = match WebhookToolExecutor::new(&config.tools)? {
        Some(webhook) => {
            info!(tools = config.tools.known.len(), "webhook tool executor configured");
            Arc::new(webhook)
        }
        None => {
            info!("no tool endpoint configured, tools disabled");
            Arc::new(NullToolExecutor)
        }
    };

    // Out-of-band summary enrichment.
    let enricher = match &config.memory.enrichment_url {
        Some(url) => Some(SummaryEnricher::new(url.clone())?),
        None => None,
    };

    let identity = Arc::new(IdentityResolver::new(
        store.clone() as Arc<dyn ConversationStore>,
        Duration::from_secs(config.memory.identity_ttl_secs),
    ));

    let pipeline = Arc::new(ChatPipeline::new(
        config.clone(),
        store.clone(),
        identity,
        cascade,
        executor,
        enricher,
    ));

    let server_config = ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
        bearer_token: config.server.bearer_token.clone(),
        request_timeout_ms: config.server.request_timeout_ms,
    };
    let state = GatewayState {
        pipeline,
        request_timeout: Duration::from_millis(config.server.request_timeout_ms),
        start_time: Instant::now(),
    };

    let cancel = shutdown::install_signal_handler();
    parley_gateway::start_server(&server_config, state, cancel).await?;

    store.close().await?;
    info!("parley serve shutdown complete");
    Ok(())
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("parley={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
