// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Parley conversational backend.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Parley configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ParleyConfig {
    /// Agent identity and behavior settings.
    #[serde(default)]
    pub agent: AgentConfig,

    /// HTTP gateway settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Conversation memory and retention settings.
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Tool orchestration loop settings.
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// Provider cascade settings (canned response, provider pool).
    #[serde(default)]
    pub cascade: CascadeConfig,

    /// Inference provider pool, in declaration order.
    ///
    /// Declaration order breaks priority ties among the primary pool.
    #[serde(default = "default_providers")]
    pub providers: Vec<ProviderSettings>,

    /// Tool executor boundary settings.
    #[serde(default)]
    pub tools: ToolsConfig,
}

/// Agent identity and behavior configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Display name of the agent.
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Optional system prompt prepended to every model conversation.
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            log_level: default_log_level(),
            system_prompt: None,
        }
    }
}

fn default_agent_name() -> String {
    "parley".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// HTTP gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bearer token for the chat endpoint. `None` disables auth.
    #[serde(default)]
    pub bearer_token: Option<String>,

    /// End-to-end budget for one request, including the tool loop.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            bearer_token: None,
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8700
}

fn default_request_timeout_ms() -> u64 {
    120_000
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("parley").join("parley.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("parley.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Conversation memory and retention configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryConfig {
    /// Retention ceiling for messages per conversation record.
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,

    /// Retention ceiling for tool results per conversation record.
    #[serde(default = "default_max_tool_results")]
    pub max_tool_results: usize,

    /// Time-to-live for identity-to-session cache entries.
    #[serde(default = "default_identity_ttl_secs")]
    pub identity_ttl_secs: u64,

    /// Out-of-band summary enrichment endpoint. `None` disables enrichment.
    #[serde(default)]
    pub enrichment_url: Option<String>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_messages: default_max_messages(),
            max_tool_results: default_max_tool_results(),
            identity_ttl_secs: default_identity_ttl_secs(),
            enrichment_url: None,
        }
    }
}

fn default_max_messages() -> usize {
    1000
}

fn default_max_tool_results() -> usize {
    200
}

fn default_identity_ttl_secs() -> u64 {
    86_400
}

/// Tool orchestration loop configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OrchestratorConfig {
    /// Hard cap on tool rounds per turn.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
        }
    }
}

fn default_max_iterations() -> u32 {
    5
}

/// Provider cascade configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CascadeConfig {
    /// Static response returned when every provider fails.
    #[serde(default = "default_canned_response")]
    pub canned_response: String,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            canned_response: default_canned_response(),
        }
    }
}

fn default_canned_response() -> String {
    "I'm having trouble reaching my language models right now. \
     Please try again in a moment."
        .to_string()
}

/// Static per-deployment settings for one inference provider.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderSettings {
    /// Registry name ("anthropic", "openai", ...).
    pub name: String,

    /// Cascade position among the primary pool; lower tries first.
    #[serde(default = "default_priority")]
    pub priority: u32,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Fallback-only providers are skipped by the primary pass and raced
    /// concurrently as a last resort.
    #[serde(default)]
    pub fallback_only: bool,

    /// Per-provider call timeout. Shorter than the request budget so one
    /// slow provider cannot starve the rest of the cascade.
    #[serde(default = "default_provider_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_supports_tools")]
    pub supports_tools: bool,

    /// Default model for this provider.
    pub model: String,

    /// Model variant retried inside the adapter on quota exhaustion.
    #[serde(default)]
    pub fallback_model: Option<String>,

    /// API key. `None` falls back to the provider's conventional env var.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Endpoint override, mainly for self-hosted gateways and tests.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Maximum tokens to generate per response.
    #[serde(default = "default_provider_max_tokens")]
    pub max_tokens: u32,
}

fn default_priority() -> u32 {
    100
}

fn default_enabled() -> bool {
    true
}

fn default_provider_timeout_ms() -> u64 {
    30_000
}

fn default_supports_tools() -> bool {
    true
}

fn default_provider_max_tokens() -> u32 {
    4096
}

fn default_providers() -> Vec<ProviderSettings> {
    vec![
        ProviderSettings {
            name: "anthropic".to_string(),
            priority: 1,
            enabled: true,
            fallback_only: false,
            timeout_ms: default_provider_timeout_ms(),
            supports_tools: true,
            model: "claude-sonnet-4-20250514".to_string(),
            fallback_model: Some("claude-haiku-4-5-20250901".to_string()),
            api_key: None,
            base_url: None,
            max_tokens: default_provider_max_tokens(),
        },
        ProviderSettings {
            name: "openai".to_string(),
            priority: 2,
            enabled: true,
            fallback_only: false,
            timeout_ms: default_provider_timeout_ms(),
            supports_tools: true,
            model: "gpt-4o".to_string(),
            fallback_model: Some("gpt-4o-mini".to_string()),
            api_key: None,
            base_url: None,
            max_tokens: default_provider_max_tokens(),
        },
    ]
}

/// Tool executor boundary configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ToolsConfig {
    /// Webhook endpoint executing named tools. `None` disables tools.
    #[serde(default)]
    pub endpoint_url: Option<String>,

    /// Closed registry of known tool names.
    #[serde(default)]
    pub known: Vec<ToolEntry>,

    /// Per-tool execution timeout.
    #[serde(default = "default_tool_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_tool_timeout_ms() -> u64 {
    20_000
}

/// One registered tool in the closed registry.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ToolEntry {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// JSON Schema for the tool's arguments, as inline TOML/JSON.
    #[serde(default)]
    pub input_schema: Option<toml::Value>,
}
