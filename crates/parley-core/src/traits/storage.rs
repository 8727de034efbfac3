// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation store trait for persistence backends (SQLite, etc.).

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::ParleyError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ConversationRecord, Session};

/// Adapter for the persisted conversation store.
///
/// The write discipline is upsert-by-identity-key with last-writer-wins
/// semantics. No transactional isolation is assumed between concurrent turns
/// from the same identity; interleaved writes may overwrite each other's
/// tool-result appends. That is an accepted, documented limitation.
#[async_trait]
pub trait ConversationStore: PluginAdapter {
    /// Initializes the backend (migrations, connections).
    async fn initialize(&self) -> Result<(), ParleyError>;

    /// Closes the backend, flushing pending writes.
    async fn close(&self) -> Result<(), ParleyError>;

    /// Loads the conversation record for an identity.
    ///
    /// Prefers the identity-scoped record over a session-scoped one: the
    /// identity persists across session rotations, the session does not.
    async fn load(&self, identity_key: &str) -> Result<Option<ConversationRecord>, ParleyError>;

    /// Persists a conversation record, truncating to retention ceilings and
    /// writing the synchronous heuristic summary.
    ///
    /// Implementations must not let a store error abort the caller's turn:
    /// a constraint violation triggers the alternate-key fallback write, and
    /// if that also fails the loss is logged and `Ok` returned.
    async fn save(&self, record: &ConversationRecord) -> Result<(), ParleyError>;

    /// Finds the canonical session for an identity, if one exists.
    async fn find_session(&self, identity_key: &str) -> Result<Option<Session>, ParleyError>;

    /// Creates a session. Duplicate-insert races resolve last-write-wins.
    async fn create_session(&self, session: &Session) -> Result<(), ParleyError>;

    /// Updates a session's `last_active_at` to now.
    async fn touch_session(&self, session_id: Uuid) -> Result<(), ParleyError>;
}
