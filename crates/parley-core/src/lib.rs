// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core types and adapter traits for the Parley conversational backend.
//!
//! Everything that crosses a crate boundary lives here: the canonical
//! message/tool/cascade types, the [`ParleyError`] taxonomy, and the
//! adapter traits that providers, tool executors, and the conversation
//! store implement.

pub mod error;
pub mod traits;
pub mod types;

pub use error::ParleyError;
pub use traits::{ConversationStore, PluginAdapter, ProviderAdapter, ToolContext, ToolExecutor};
pub use types::{AdapterType, HealthStatus};
