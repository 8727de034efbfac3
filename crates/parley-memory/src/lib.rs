// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation memory summarization for Parley.
//!
//! Two layers: a synchronous, deterministic heuristic summarizer that runs
//! on every save, and an optional fire-and-forget HTTP enricher that hands
//! the saved record to an out-of-band richer-summary process.

pub mod enricher;
pub mod summary;

pub use enricher::SummaryEnricher;
pub use summary::summarize;
