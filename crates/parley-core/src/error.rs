// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Parley conversational backend.

use thiserror::Error;

/// The primary error type used across all Parley adapter traits and core operations.
///
/// Recovery discipline, by variant:
/// - `Provider` is recovered locally by advancing the cascade; it reaches the
///   user only as a degraded canned response when every provider has failed.
/// - `Tool` is isolated to one `ToolResult`; the loop continues.
/// - `Extraction` degrades to an empty-argument call and surfaces later as a
///   `Tool` failure, never on its own.
/// - `Storage` is logged and dropped after the alternate-key retry; it never
///   changes the HTTP response.
/// - `Timeout` is the only variant that maps to a non-500 failure status.
#[derive(Debug, Error)]
pub enum ParleyError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// LLM provider errors (HTTP failure, non-2xx status, malformed payload).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A single tool execution failed.
    #[error("tool '{name}' failed: {message}")]
    Tool { name: String, message: String },

    /// Tool-call arguments could not be parsed from model output.
    #[error("extraction error: {0}")]
    Extraction(String),

    /// HTTP gateway / transport errors.
    #[error("channel error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ParleyError {
    /// Shorthand for a provider error without an underlying source.
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
            source: None,
        }
    }
}
