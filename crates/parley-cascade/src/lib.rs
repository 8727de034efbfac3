// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider cascade for Parley.
//!
//! Tries configured inference providers in priority order with per-provider
//! timeouts, then races the fallback-only pool concurrently, and reports an
//! aggregated failure when every attempt fails.

pub mod cascade;
pub mod registry;

pub use cascade::ProviderCascade;
pub use registry::{ProviderRegistry, RegisteredProvider};
