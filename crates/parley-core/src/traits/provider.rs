// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider adapter trait for LLM provider integrations (Anthropic, OpenAI, etc.).

use async_trait::async_trait;

use crate::error::ParleyError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{CascadeResult, CompletionRequest};

/// Adapter for LLM provider integrations.
///
/// Each adapter owns its own authentication, endpoint, and model-selection
/// details, and normalizes its native response into [`CascadeResult`]:
/// structured tool-call objects populate `tool_calls`, free text populates
/// `content`. Retry against an internal model variant (e.g. on quota
/// exhaustion) happens inside the adapter and is invisible to cascade
/// ordering.
#[async_trait]
pub trait ProviderAdapter: PluginAdapter {
    /// Whether this provider accepts structured tool definitions.
    ///
    /// When false the cascade strips the `tools` field before calling, and
    /// any tool intent has to be recovered from free text by the extractor.
    fn supports_tools(&self) -> bool;

    /// Sends a completion request and returns the normalized result.
    ///
    /// An `Err` counts as a provider failure and advances the cascade; it is
    /// never fatal for the turn on its own.
    async fn complete(&self, request: CompletionRequest) -> Result<CascadeResult, ParleyError>;
}
