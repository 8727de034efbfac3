// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tool-call extraction from heterogeneous model output.
//!
//! Providers that support structured tool use hand back canonical calls
//! directly. Everything else gets a chain of text strategies, tried in
//! order against the response content:
//!
//! 1. `<tool_call>…</tool_call>` delimited JSON blocks
//! 2. fenced code blocks (```json / ```tool) naming a function with arguments
//! 3. natural-language intent ("I'll call X") against the closed registry
//!
//! The first strategy yielding at least one call wins. A call whose
//! arguments fail to parse is still forwarded with an empty argument map;
//! it will fail at execution time as a `ToolResult` error, not here.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use parley_core::types::{CascadeResult, ToolCall};

static TOOL_CALL_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<tool_call>\s*(.*?)\s*</tool_call>").expect("static pattern")
});

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json|tool)\s*\n(.*?)\n?```").expect("static pattern")
});

static INTENT_PHRASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:i(?:'| wi)ll call|i am calling|calling|invoking|using) the ([a-z0-9_]+)(?: tool| function)?\b")
        .expect("static pattern")
});

/// Extracts canonical tool calls from a cascade result.
///
/// `known_tools` is the closed registry consulted by the natural-language
/// strategy; names outside it are never synthesized into calls.
pub fn extract(result: &CascadeResult, known_tools: &[String]) -> Vec<ToolCall> {
    if result.has_tool_calls() {
        return result.tool_calls.clone();
    }

    let Some(content) = result.content.as_deref() else {
        return Vec::new();
    };

    for (strategy, calls) in [
        ("delimited", from_delimited_blocks(content)),
        ("fenced", from_fenced_blocks(content)),
        ("intent", from_intent_phrases(content, known_tools)),
    ] {
        if !calls.is_empty() {
            debug!(strategy, count = calls.len(), "extracted tool calls from text");
            return calls;
        }
    }

    Vec::new()
}

/// Removes leftover tool-call markup from terminal response text.
pub fn strip_tool_markup(text: &str) -> String {
    let stripped = TOOL_CALL_BLOCK.replace_all(text, "");
    let stripped = FENCED_BLOCK.replace_all(&stripped, "");
    stripped.trim().to_string()
}

/// Wire shape accepted inside delimited and fenced blocks.
#[derive(Debug, Deserialize)]
struct EmbeddedCall {
    name: String,
    #[serde(default, alias = "parameters")]
    arguments: serde_json::Value,
}

fn from_delimited_blocks(content: &str) -> Vec<ToolCall> {
    TOOL_CALL_BLOCK
        .captures_iter(content)
        .filter_map(|cap| parse_embedded(cap.get(1).map_or("", |m| m.as_str())))
        .collect()
}

fn from_fenced_blocks(content: &str) -> Vec<ToolCall> {
    FENCED_BLOCK
        .captures_iter(content)
        .filter_map(|cap| parse_embedded(cap.get(1).map_or("", |m| m.as_str())))
        .collect()
}

/// Parses one embedded block into a call.
///
/// A block that names a tool but carries unparsable arguments still yields
/// a call with empty arguments; a block with no recognizable name yields
/// nothing.
fn parse_embedded(block: &str) -> Option<ToolCall> {
    match serde_json::from_str::<EmbeddedCall>(block) {
        Ok(call) => {
            let arguments = match call.arguments {
                serde_json::Value::Object(map) => map,
                serde_json::Value::Null => serde_json::Map::new(),
                other => {
                    warn!(tool = %call.name, ?other, "non-object embedded arguments, degrading to empty map");
                    serde_json::Map::new()
                }
            };
            Some(ToolCall::synthetic(call.name, arguments))
        }
        Err(e) => {
            // Salvage the name alone when the argument JSON is broken.
            if let Some(name) = salvage_name(block) {
                warn!(tool = %name, error = %e, "unparsable embedded arguments, degrading to empty map");
                return Some(ToolCall::synthetic(name, serde_json::Map::new()));
            }
            debug!(error = %e, "unrecognized embedded block, skipping");
            None
        }
    }
}

static NAME_FIELD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""name"\s*:\s*"([a-zA-Z0-9_]+)""#).expect("static pattern"));

fn salvage_name(block: &str) -> Option<String> {
    NAME_FIELD
        .captures(block)
        .map(|cap| cap[1].to_string())
}

fn from_intent_phrases(content: &str, known_tools: &[String]) -> Vec<ToolCall> {
    let mut calls = Vec::new();
    for cap in INTENT_PHRASE.captures_iter(content) {
        let name = &cap[1];
        if known_tools.iter().any(|t| t == name)
            && !calls.iter().any(|c: &ToolCall| c.name == name)
        {
            calls.push(ToolCall::synthetic(name, serde_json::Map::new()));
        }
    }
    calls
}
