// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the ConversationStore trait.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::OnceCell;
use tracing::{debug, error, warn};
use uuid::Uuid;

use parley_config::model::{MemoryConfig, StorageConfig};
use parley_core::types::{ConversationRecord, Session};
use parley_core::{AdapterType, ConversationStore, HealthStatus, ParleyError, PluginAdapter};

use crate::database::Database;
use crate::queries;

/// SQLite-backed conversation store.
///
/// Wraps a [`Database`] handle and delegates query work to the typed query
/// modules. The database is lazily initialized on the first call to
/// [`ConversationStore::initialize`]. Retention truncation and the
/// synchronous heuristic summary happen here, on every save, so callers
/// never persist an unbounded or summary-less record.
pub struct SqliteConversationStore {
    storage_config: StorageConfig,
    memory_config: MemoryConfig,
    db: OnceCell<Database>,
}

impl SqliteConversationStore {
    /// Create a new store with the given configuration.
    ///
    /// The database connection is not opened until [`initialize`] is called.
    pub fn new(storage_config: StorageConfig, memory_config: MemoryConfig) -> Self {
        Self {
            storage_config,
            memory_config,
            db: OnceCell::new(),
        }
    }

    fn db(&self) -> Result<&Database, ParleyError> {
        self.db.get().ok_or_else(|| ParleyError::Storage {
            source: "store not initialized -- call initialize() first".into(),
        })
    }

    /// Drop oldest entries until the record fits the retention ceilings.
    fn truncate_to_retention(&self, record: &mut ConversationRecord) {
        let max_messages = self.memory_config.max_messages;
        if record.messages.len() > max_messages {
            let excess = record.messages.len() - max_messages;
            record.messages.drain(..excess);
            debug!(
                identity = %record.identity_key,
                dropped = excess,
                "truncated messages to retention ceiling"
            );
        }

        let max_tool_results = self.memory_config.max_tool_results;
        if record.tool_results.len() > max_tool_results {
            let excess = record.tool_results.len() - max_tool_results;
            record.tool_results.drain(..excess);
            debug!(
                identity = %record.identity_key,
                dropped = excess,
                "truncated tool results to retention ceiling"
            );
        }
    }
}

#[async_trait]
impl PluginAdapter for SqliteConversationStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, ParleyError> {
        let db = self.db()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), ParleyError> {
        if let Some(db) = self.db.get() {
            db.close().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for SqliteConversationStore {
    async fn initialize(&self) -> Result<(), ParleyError> {
        let db = Database::open(
            &self.storage_config.database_path,
            self.storage_config.wal_mode,
        )
        .await?;
        self.db.set(db).map_err(|_| ParleyError::Storage {
            source: "store already initialized".into(),
        })?;
        debug!(path = %self.storage_config.database_path, "SQLite conversation store initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), ParleyError> {
        self.db()?.close().await
    }

    async fn load(&self, identity_key: &str) -> Result<Option<ConversationRecord>, ParleyError> {
        let db = self.db()?;
        if let Some(record) = queries::conversations::get_record(db, identity_key).await? {
            return Ok(Some(record));
        }
        // Earlier saves may have landed on the alternate key.
        queries::conversations::get_latest_alternate_record(db, identity_key).await
    }

    async fn save(&self, record: &ConversationRecord) -> Result<(), ParleyError> {
        let db = self.db()?;

        let mut record = record.clone();
        self.truncate_to_retention(&mut record);
        record.summary = Some(parley_memory::summary::summarize(&record.messages));
        record.updated_at = Utc::now();

        if let Err(primary_err) =
            queries::conversations::upsert_record(db, &record.identity_key, &record).await
        {
            let alternate_key = format!("{}:{}", record.identity_key, record.session_id);
            warn!(
                identity = %record.identity_key,
                alternate = %alternate_key,
                error = %primary_err,
                "primary-key save failed, retrying on alternate key"
            );
            if let Err(fallback_err) =
                queries::conversations::upsert_record(db, &alternate_key, &record).await
            {
                // Memory loss never aborts the caller's turn.
                error!(
                    identity = %record.identity_key,
                    error = %fallback_err,
                    "conversation save failed on both keys, turn continues without persistence"
                );
            }
        }
        Ok(())
    }

    async fn find_session(&self, identity_key: &str) -> Result<Option<Session>, ParleyError> {
        queries::sessions::find_session(self.db()?, identity_key).await
    }

    async fn create_session(&self, session: &Session) -> Result<(), ParleyError> {
        queries::sessions::create_session(self.db()?, session).await
    }

    async fn touch_session(&self, session_id: Uuid) -> Result<(), ParleyError> {
        queries::sessions::touch_session(self.db()?, session_id).await
    }
}
