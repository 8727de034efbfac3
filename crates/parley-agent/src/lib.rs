// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Agent orchestration for Parley.
//!
//! Hosts the turn-handling pipeline and its component parts: identity
//! resolution with a TTL session cache, short-ambiguous-reply resolution,
//! tool-call extraction from heterogeneous model output, the bounded tool
//! orchestration loop, and the deterministic result synthesizer.

pub mod ambiguity;
pub mod extractor;
pub mod identity;
pub mod orchestrator;
pub mod pipeline;
pub mod synthesizer;
pub mod tools;

pub use identity::{Identity, IdentityResolver};
pub use orchestrator::{OrchestratorOutcome, ToolOrchestrator};
pub use pipeline::{ChatPipeline, TurnOutcome, TurnRequest};
pub use tools::{NullToolExecutor, WebhookToolExecutor};
