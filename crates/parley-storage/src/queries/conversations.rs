// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation record CRUD.
//!
//! Records are stored whole, one row per identity key, with the message and
//! tool-result lists serialized as JSON text columns. Writes are upserts:
//! the newest save replaces the row (last-writer-wins).

use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use parley_core::types::{ChatMessage, ConversationRecord, ConversationSummary, ToolResult};
use parley_core::ParleyError;

use crate::database::{map_tr_err, Database};

fn json_col_err(what: &str, e: serde_json::Error) -> rusqlite::Error {
    rusqlite::Error::ModuleError(format!("bad {what} JSON column: {e}"))
}

fn row_to_record(row: &rusqlite::Row<'_>) -> Result<ConversationRecord, rusqlite::Error> {
    let identity_key: String = row.get(0)?;
    let session_raw: String = row.get(1)?;
    let messages_raw: String = row.get(2)?;
    let tool_results_raw: String = row.get(3)?;
    let summary_raw: Option<String> = row.get(4)?;
    let metadata_raw: Option<String> = row.get(5)?;
    let updated_raw: String = row.get(6)?;

    let session_id = Uuid::parse_str(&session_raw)
        .map_err(|e| rusqlite::Error::ModuleError(format!("bad session id: {e}")))?;
    let messages: Vec<ChatMessage> =
        serde_json::from_str(&messages_raw).map_err(|e| json_col_err("messages", e))?;
    let tool_results: Vec<ToolResult> =
        serde_json::from_str(&tool_results_raw).map_err(|e| json_col_err("tool_results", e))?;
    let summary: Option<ConversationSummary> = summary_raw
        .map(|raw| serde_json::from_str(&raw).map_err(|e| json_col_err("summary", e)))
        .transpose()?;
    let metadata: Option<serde_json::Value> = metadata_raw
        .map(|raw| serde_json::from_str(&raw).map_err(|e| json_col_err("metadata", e)))
        .transpose()?;
    let updated_at: DateTime<Utc> = updated_raw
        .parse()
        .map_err(|e| rusqlite::Error::ModuleError(format!("bad updated_at: {e}")))?;

    Ok(ConversationRecord {
        identity_key,
        session_id,
        messages,
        tool_results,
        summary,
        metadata,
        updated_at,
    })
}

const SELECT_COLUMNS: &str =
    "identity_key, session_id, messages, tool_results, summary, metadata, updated_at";

/// Fetch the record stored under exactly `key`.
pub async fn get_record(
    db: &Database,
    key: &str,
) -> Result<Option<ConversationRecord>, ParleyError> {
    let key = key.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM conversations WHERE identity_key = ?1",
            ))?;
            let result = stmt.query_row(params![key], row_to_record);
            match result {
                Ok(record) => Ok(Some(record)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch the newest alternate-key record for an identity
/// (rows keyed `<identity>:<session>`).
pub async fn get_latest_alternate_record(
    db: &Database,
    identity_key: &str,
) -> Result<Option<ConversationRecord>, ParleyError> {
    let prefix = format!("{identity_key}:%");
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM conversations
                 WHERE identity_key LIKE ?1
                 ORDER BY updated_at DESC LIMIT 1",
            ))?;
            let result = stmt.query_row(params![prefix], row_to_record);
            match result {
                Ok(record) => Ok(Some(record)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Upsert `record` under `key` (which may differ from the record's own
/// identity key on the alternate-key fallback path).
pub async fn upsert_record(
    db: &Database,
    key: &str,
    record: &ConversationRecord,
) -> Result<(), ParleyError> {
    let key = key.to_string();
    let session_id = record.session_id.to_string();
    let messages = serde_json::to_string(&record.messages).map_err(|e| ParleyError::Storage {
        source: Box::new(e),
    })?;
    let tool_results =
        serde_json::to_string(&record.tool_results).map_err(|e| ParleyError::Storage {
            source: Box::new(e),
        })?;
    let summary = record
        .summary
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| ParleyError::Storage {
            source: Box::new(e),
        })?;
    let metadata = record
        .metadata
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| ParleyError::Storage {
            source: Box::new(e),
        })?;
    let updated_at = record.updated_at.to_rfc3339();

    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO conversations
                   (identity_key, session_id, messages, tool_results, summary, metadata, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(identity_key) DO UPDATE SET
                   session_id = excluded.session_id,
                   messages = excluded.messages,
                   tool_results = excluded.tool_results,
                   summary = excluded.summary,
                   metadata = excluded.metadata,
                   updated_at = excluded.updated_at",
                params![key, session_id, messages, tool_results, summary, metadata, updated_at],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
