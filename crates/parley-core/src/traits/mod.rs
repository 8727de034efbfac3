// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions for the Parley pipeline seams.
//!
//! All adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod provider;
pub mod storage;
pub mod tool;

pub use adapter::PluginAdapter;
pub use provider::ProviderAdapter;
pub use storage::ConversationStore;
pub use tool::{ToolContext, ToolExecutor};
