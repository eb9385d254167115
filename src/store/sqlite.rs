//! SQLite-backed store.
//!
//! Records are stored as JSON documents alongside the columns used for
//! lookups. One connection is shared behind a mutex, so every trait method
//! runs serialized and is atomic.

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;

use super::{
    AiMind, Avatar, ConversationMessage, ConversationSession, PsvsRecord, SessionFeedback, Store,
    StoreError, StoreResult,
};
use crate::psvs::PsvsTrajectory;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS avatars (
    id TEXT PRIMARY KEY,
    pro_user_id TEXT NOT NULL,
    created_at TEXT NOT NULL,
    data TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_avatars_pro ON avatars (pro_user_id);

CREATE TABLE IF NOT EXISTS ai_minds (
    id TEXT PRIMARY KEY,
    avatar_id TEXT NOT NULL,
    created_at TEXT NOT NULL,
    data TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_ai_minds_avatar ON ai_minds (avatar_id);

CREATE TABLE IF NOT EXISTS psvs_trajectories (
    mind_id TEXT PRIMARY KEY,
    trajectory TEXT NOT NULL,
    version INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    mind_id TEXT NOT NULL,
    created_at TEXT NOT NULL,
    data TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_sessions_mind ON sessions (mind_id);

CREATE TABLE IF NOT EXISTS messages (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    session_id TEXT NOT NULL,
    data TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_messages_session ON messages (session_id, seq);

CREATE TABLE IF NOT EXISTS session_feedback (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    user_id TEXT NOT NULL,
    session_id TEXT NOT NULL,
    data TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_feedback_user ON session_feedback (user_id, seq);
";

fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub struct SqliteStore {
    /// `None` for in-memory databases.
    db_path: Option<PathBuf>,
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("db_path", &self.db_path)
            .finish()
    }
}

impl SqliteStore {
    /// Open (or create) a database file and apply the schema.
    pub fn open(db_path: impl AsRef<Path>) -> StoreResult<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(&db_path)?;
        log::info!("Opened SQLite store at {}", db_path.display());
        Self::init(conn, Some(db_path))
    }

    /// Private in-memory database.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(conn: Connection, db_path: Option<PathBuf>) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            db_path,
            conn: Mutex::new(conn),
        })
    }

    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn query_one<T: DeserializeOwned>(&self, sql: &str, key: &str) -> StoreResult<Option<T>> {
        let conn = self.conn.lock();
        let data: Option<String> = conn
            .query_row(sql, params![key], |row| row.get(0))
            .optional()?;
        data.map(|d| serde_json::from_str(&d))
            .transpose()
            .map_err(StoreError::from)
    }

    fn query_many<T: DeserializeOwned>(&self, sql: &str, key: &str) -> StoreResult<Vec<T>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params![key], |row| row.get::<_, String>(0))?;

        let mut out = Vec::new();
        for row in rows {
            out.push(serde_json::from_str(&row?)?);
        }
        Ok(out)
    }
}

impl Store for SqliteStore {
    fn put_avatar(&self, avatar: &Avatar) -> StoreResult<()> {
        let data = serde_json::to_string(avatar)?;
        self.conn.lock().execute(
            "INSERT OR REPLACE INTO avatars (id, pro_user_id, created_at, data)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                avatar.id,
                avatar.pro_user_id,
                timestamp(avatar.created_at),
                data
            ],
        )?;
        Ok(())
    }

    fn get_avatar(&self, id: &str) -> StoreResult<Option<Avatar>> {
        self.query_one("SELECT data FROM avatars WHERE id = ?1", id)
    }

    fn list_avatars_by_pro(&self, pro_user_id: &str) -> StoreResult<Vec<Avatar>> {
        self.query_many(
            "SELECT data FROM avatars WHERE pro_user_id = ?1 ORDER BY created_at, id",
            pro_user_id,
        )
    }

    fn put_mind(&self, mind: &AiMind) -> StoreResult<()> {
        let data = serde_json::to_string(mind)?;
        self.conn.lock().execute(
            "INSERT OR REPLACE INTO ai_minds (id, avatar_id, created_at, data)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                mind.id,
                mind.avatar_id,
                timestamp(mind.created_at),
                data
            ],
        )?;
        Ok(())
    }

    fn get_mind(&self, id: &str) -> StoreResult<Option<AiMind>> {
        self.query_one("SELECT data FROM ai_minds WHERE id = ?1", id)
    }

    fn list_minds_by_avatar(&self, avatar_id: &str) -> StoreResult<Vec<AiMind>> {
        self.query_many(
            "SELECT data FROM ai_minds WHERE avatar_id = ?1 ORDER BY created_at, id",
            avatar_id,
        )
    }

    fn create_psvs(&self, mind_id: &str, trajectory: &PsvsTrajectory) -> StoreResult<PsvsRecord> {
        let data = serde_json::to_string(trajectory)?;
        let inserted = self.conn.lock().execute(
            "INSERT OR IGNORE INTO psvs_trajectories (mind_id, trajectory, version)
             VALUES (?1, ?2, 1)",
            params![mind_id, data],
        )?;
        if inserted == 0 {
            return Err(StoreError::AlreadyExists {
                kind: "psvs",
                id: mind_id.to_string(),
            });
        }
        Ok(PsvsRecord {
            mind_id: mind_id.to_string(),
            trajectory: trajectory.clone(),
            version: 1,
        })
    }

    fn get_psvs(&self, mind_id: &str) -> StoreResult<Option<PsvsRecord>> {
        let conn = self.conn.lock();
        let row: Option<(String, i64)> = conn
            .query_row(
                "SELECT trajectory, version FROM psvs_trajectories WHERE mind_id = ?1",
                params![mind_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match row {
            Some((data, version)) => Ok(Some(PsvsRecord {
                mind_id: mind_id.to_string(),
                trajectory: serde_json::from_str(&data)?,
                version: version as u64,
            })),
            None => Ok(None),
        }
    }

    fn compare_and_swap_psvs(
        &self,
        mind_id: &str,
        expected_version: u64,
        trajectory: &PsvsTrajectory,
    ) -> StoreResult<bool> {
        let data = serde_json::to_string(trajectory)?;
        let conn = self.conn.lock();
        let updated = conn.execute(
            "UPDATE psvs_trajectories SET trajectory = ?1, version = version + 1
             WHERE mind_id = ?2 AND version = ?3",
            params![data, mind_id, expected_version as i64],
        )?;
        if updated == 1 {
            return Ok(true);
        }

        let exists: Option<i64> = conn
            .query_row(
                "SELECT version FROM psvs_trajectories WHERE mind_id = ?1",
                params![mind_id],
                |row| row.get(0),
            )
            .optional()?;
        match exists {
            Some(_) => Ok(false),
            None => Err(StoreError::NotFound {
                kind: "psvs",
                id: mind_id.to_string(),
            }),
        }
    }

    fn put_session(&self, session: &ConversationSession) -> StoreResult<()> {
        let data = serde_json::to_string(session)?;
        self.conn.lock().execute(
            "INSERT OR REPLACE INTO sessions (id, mind_id, created_at, data)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                session.id,
                session.mind_id,
                timestamp(session.created_at),
                data
            ],
        )?;
        Ok(())
    }

    fn get_session(&self, id: &str) -> StoreResult<Option<ConversationSession>> {
        self.query_one("SELECT data FROM sessions WHERE id = ?1", id)
    }

    fn list_sessions_by_mind(&self, mind_id: &str) -> StoreResult<Vec<ConversationSession>> {
        self.query_many(
            "SELECT data FROM sessions WHERE mind_id = ?1 ORDER BY created_at, id",
            mind_id,
        )
    }

    fn increment_message_count(&self, session_id: &str, by: u64) -> StoreResult<u64> {
        let conn = self.conn.lock();
        let mut session = load_session(&conn, session_id)?;
        session.message_count += by;
        save_session(&conn, &session)?;
        Ok(session.message_count)
    }

    fn end_session(
        &self,
        session_id: &str,
        ended_at: DateTime<Utc>,
    ) -> StoreResult<ConversationSession> {
        let conn = self.conn.lock();
        let mut session = load_session(&conn, session_id)?;
        if session.is_active {
            session.is_active = false;
            session.ended_at = Some(ended_at);
            save_session(&conn, &session)?;
        }
        Ok(session)
    }

    fn append_message(&self, message: &ConversationMessage) -> StoreResult<()> {
        let data = serde_json::to_string(message)?;
        self.conn.lock().execute(
            "INSERT INTO messages (id, session_id, data) VALUES (?1, ?2, ?3)",
            params![message.id, message.session_id, data],
        )?;
        Ok(())
    }

    fn list_messages(&self, session_id: &str) -> StoreResult<Vec<ConversationMessage>> {
        self.query_many(
            "SELECT data FROM messages WHERE session_id = ?1 ORDER BY seq",
            session_id,
        )
    }

    fn append_feedback(&self, feedback: &SessionFeedback) -> StoreResult<()> {
        let data = serde_json::to_string(feedback)?;
        self.conn.lock().execute(
            "INSERT INTO session_feedback (id, user_id, session_id, data)
             VALUES (?1, ?2, ?3, ?4)",
            params![feedback.id, feedback.user_id, feedback.session_id, data],
        )?;
        Ok(())
    }

    fn list_feedback_by_user(&self, user_id: &str) -> StoreResult<Vec<SessionFeedback>> {
        self.query_many(
            "SELECT data FROM session_feedback WHERE user_id = ?1 ORDER BY seq",
            user_id,
        )
    }
}

/// Read-modify-write helpers; callers hold the connection lock across both.
fn load_session(conn: &Connection, session_id: &str) -> StoreResult<ConversationSession> {
    let data: Option<String> = conn
        .query_row(
            "SELECT data FROM sessions WHERE id = ?1",
            params![session_id],
            |row| row.get(0),
        )
        .optional()?;
    match data {
        Some(d) => Ok(serde_json::from_str(&d)?),
        None => Err(StoreError::NotFound {
            kind: "session",
            id: session_id.to_string(),
        }),
    }
}

fn save_session(conn: &Connection, session: &ConversationSession) -> StoreResult<()> {
    conn.execute(
        "UPDATE sessions SET data = ?1 WHERE id = ?2",
        params![serde_json::to_string(session)?, session.id],
    )?;
    Ok(())
}
