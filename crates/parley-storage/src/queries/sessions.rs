// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session CRUD operations.

use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use parley_core::types::Session;
use parley_core::ParleyError;

use crate::database::{map_tr_err, Database};

fn parse_timestamp(raw: String) -> Result<DateTime<Utc>, rusqlite::Error> {
    raw.parse::<DateTime<Utc>>()
        .map_err(|e| rusqlite::Error::ModuleError(format!("bad timestamp `{raw}`: {e}")))
}

fn parse_session_id(raw: String) -> Result<Uuid, rusqlite::Error> {
    Uuid::parse_str(&raw)
        .map_err(|e| rusqlite::Error::ModuleError(format!("bad session id `{raw}`: {e}")))
}

fn row_to_session(row: &rusqlite::Row<'_>) -> Result<Session, rusqlite::Error> {
    Ok(Session {
        session_id: parse_session_id(row.get(0)?)?,
        identity_key: row.get(1)?,
        created_at: parse_timestamp(row.get(2)?)?,
        last_active_at: parse_timestamp(row.get(3)?)?,
    })
}

/// Insert a new session row.
pub async fn create_session(db: &Database, session: &Session) -> Result<(), ParleyError> {
    let session = session.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO sessions (session_id, identity_key, created_at, last_active_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    session.session_id.to_string(),
                    session.identity_key,
                    session.created_at.to_rfc3339(),
                    session.last_active_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Find the most recently active session for an identity, if any.
pub async fn find_session(
    db: &Database,
    identity_key: &str,
) -> Result<Option<Session>, ParleyError> {
    let identity_key = identity_key.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT session_id, identity_key, created_at, last_active_at
                 FROM sessions WHERE identity_key = ?1
                 ORDER BY last_active_at DESC LIMIT 1",
            )?;
            let result = stmt.query_row(params![identity_key], row_to_session);
            match result {
                Ok(session) => Ok(Some(session)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Bump a session's `last_active_at` to now.
pub async fn touch_session(db: &Database, session_id: Uuid) -> Result<(), ParleyError> {
    let now = Utc::now().to_rfc3339();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE sessions SET last_active_at = ?1 WHERE session_id = ?2",
                params![now, session_id.to_string()],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap(), true).await.unwrap();
        (db, dir)
    }

    #[tokio::test]
    async fn create_and_find_session_roundtrips() {
        let (db, _dir) = setup_db().await;
        let session = Session::new("203.0.113.7");

        create_session(&db, &session).await.unwrap();
        let found = find_session(&db, "203.0.113.7").await.unwrap().unwrap();
        assert_eq!(found.session_id, session.session_id);
        assert_eq!(found.identity_key, "203.0.113.7");

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn find_session_for_unknown_identity_returns_none() {
        let (db, _dir) = setup_db().await;
        let found = find_session(&db, "no-such-identity").await.unwrap();
        assert!(found.is_none());
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn find_session_returns_most_recently_active() {
        let (db, _dir) = setup_db().await;
        let mut older = Session::new("198.51.100.4");
        older.last_active_at = "2026-01-01T00:00:00Z".parse().unwrap();
        let newer = Session::new("198.51.100.4");

        create_session(&db, &older).await.unwrap();
        create_session(&db, &newer).await.unwrap();

        let found = find_session(&db, "198.51.100.4").await.unwrap().unwrap();
        assert_eq!(found.session_id, newer.session_id);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn touch_session_advances_last_active() {
        let (db, _dir) = setup_db().await;
        let mut session = Session::new("192.0.2.9");
        session.last_active_at = "2026-01-01T00:00:00Z".parse().unwrap();
        create_session(&db, &session).await.unwrap();

        touch_session(&db, session.session_id).await.unwrap();

        let found = find_session(&db, "192.0.2.9").await.unwrap().unwrap();
        assert!(found.last_active_at > session.last_active_at);
        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_session_id_insert_fails() {
        let (db, _dir) = setup_db().await;
        let session = Session::new("192.0.2.10");
        create_session(&db, &session).await.unwrap();

        let result = create_session(&db, &session).await;
        assert!(result.is_err(), "primary key violation should surface");
        db.close().await.unwrap();
    }
}
