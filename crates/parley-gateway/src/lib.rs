// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP gateway for the Parley conversational backend.
//!
//! Exposes `POST /chat` behind optional bearer auth and a public
//! `GET /health`, mapping the turn pipeline's outcomes onto the HTTP
//! surface: a full-budget timeout answers 504, a pipeline panic answers
//! 500, everything else degrades in-band to a 200 with a coherent body.

pub mod auth;
pub mod handlers;
pub mod server;

pub use server::{build_router, start_server, GatewayState, ServerConfig};
