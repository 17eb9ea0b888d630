//! Durable session storage.
//!
//! One row per session, keyed by its deadline. The row body is JSON in the
//! record layout of the version stored next to it, so records written by
//! older builds keep loading after fields are added.

use crate::game::Game;
use crate::language::Language;
use crate::party::Step;
use crate::session::Session;
use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::warn;

/// Version written by this build
pub const CURRENT_VERSION: i64 = 2;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unsupported session record version {0}")]
    UnsupportedVersion(i64),
    #[error("session record has no steps")]
    EmptyGame,
    #[error("malformed session record: {0}")]
    Json(#[from] serde_json::Error),
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("database lock poisoned")]
    Poisoned,
}

/// `(language code, text)`
#[derive(Debug, Serialize, Deserialize)]
struct StepRecord(String, String);

/// Layout before duplicate tracking existed
#[derive(Debug, Deserialize)]
struct SessionRecordV1 {
    steps: Vec<StepRecord>,
    thread_root_id: String,
    trigger_ids: Vec<String>,
    deadline: DateTime<Utc>,
    over: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionRecordV2 {
    steps: Vec<StepRecord>,
    thread_root_id: String,
    trigger_ids: Vec<String>,
    #[serde(default)]
    seen_ids: Vec<String>,
    deadline: DateTime<Utc>,
    #[serde(default)]
    over: bool,
}

/// Storage key for a session: its deadline, formatted so that string order
/// is time order.
pub fn deadline_key(deadline: DateTime<Utc>) -> String {
    deadline.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn game_from_records(steps: Vec<StepRecord>) -> Result<Game, StoreError> {
    let steps = steps
        .into_iter()
        .map(|StepRecord(code, text)| Step::new(Language::from_code(&code), text))
        .collect();
    Game::from_steps(steps).ok_or(StoreError::EmptyGame)
}

/// Serialize a session in the current layout
pub fn encode(session: &Session) -> Result<(i64, String), StoreError> {
    let record = SessionRecordV2 {
        steps: session
            .game()
            .steps()
            .iter()
            .map(|step| StepRecord(step.language.code().to_string(), step.text.clone()))
            .collect(),
        thread_root_id: session.thread_root_id().to_string(),
        trigger_ids: session.trigger_ids().to_vec(),
        seen_ids: session.seen_ids().to_vec(),
        deadline: session.deadline(),
        over: session.is_over(),
    };
    Ok((CURRENT_VERSION, serde_json::to_string(&record)?))
}

/// Deserialize a session stored under `version`
pub fn decode(version: i64, body: &str) -> Result<Session, StoreError> {
    match version {
        1 => decode_v1(body),
        2 => decode_v2(body),
        other => Err(StoreError::UnsupportedVersion(other)),
    }
}

fn decode_v1(body: &str) -> Result<Session, StoreError> {
    let record: SessionRecordV1 = serde_json::from_str(body)?;
    Ok(Session::from_parts(
        game_from_records(record.steps)?,
        record.thread_root_id,
        record.trigger_ids,
        Vec::new(),
        record.deadline,
        record.over,
    ))
}

fn decode_v2(body: &str) -> Result<Session, StoreError> {
    let record: SessionRecordV2 = serde_json::from_str(body)?;
    Ok(Session::from_parts(
        game_from_records(record.steps)?,
        record.thread_root_id,
        record.trigger_ids,
        record.seen_ids,
        record.deadline,
        record.over,
    ))
}

/// SQLite-backed session store. Assumes a single writer process.
#[derive(Clone)]
pub struct SessionStore {
    conn: Arc<Mutex<Connection>>,
}

impl SessionStore {
    /// Open (creating if needed) the database and its sessions table
    pub fn new(database_path: &str) -> Result<Self> {
        if let Some(parent) = Path::new(database_path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory {}", parent.display()))?;
            }
        }

        let conn = Connection::open(database_path)
            .with_context(|| format!("Failed to open database at {}", database_path))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS sessions (
                deadline_key TEXT PRIMARY KEY,
                version INTEGER NOT NULL,
                body TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )
        .context("Failed to create sessions table")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Insert or overwrite the record for `session`
    pub fn save(&self, session: &Session) -> Result<()> {
        let (version, body) = encode(session)?;
        let key = deadline_key(session.deadline());
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO sessions (deadline_key, version, body, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(deadline_key) DO UPDATE SET
                version = excluded.version,
                body = excluded.body,
                updated_at = excluded.updated_at",
            params![key, version, body, Utc::now().to_rfc3339()],
        )
        .with_context(|| format!("Failed to save session {}", key))?;

        Ok(())
    }

    /// The readable session with the greatest deadline, if any.
    ///
    /// Records that fail to decode are logged and passed over, so a corrupt
    /// row counts as a finished game instead of wedging every later cycle.
    pub fn latest(&self) -> Result<Option<Session>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT deadline_key, version, body FROM sessions ORDER BY deadline_key DESC")
            .context("Failed to query latest session")?;
        let mut rows = stmt
            .query([])
            .context("Failed to query latest session")?;

        while let Some(row) = rows.next().context("Failed to read session row")? {
            let key: String = row.get(0)?;
            let version: i64 = row.get(1)?;
            let body: String = row.get(2)?;

            match decode(version, &body) {
                Ok(session) => return Ok(Some(session)),
                Err(e) => warn!("Skipping unreadable session {}: {}", key, e),
            }
        }

        Ok(None)
    }

    /// Load the session stored under `key`
    #[cfg(test)]
    fn load(&self, key: &str) -> Result<Option<Session>> {
        use rusqlite::OptionalExtension;

        let row: Option<(i64, String)> = {
            let conn = self.lock()?;
            conn.query_row(
                "SELECT version, body FROM sessions WHERE deadline_key = ?1",
                params![key],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .with_context(|| format!("Failed to query session {}", key))?
        };

        row.map(|(version, body)| {
            decode(version, &body).with_context(|| format!("Failed to load session {}", key))
        })
        .transpose()
    }

    /// All stored keys, newest deadline first
    #[cfg(test)]
    fn keys(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT deadline_key FROM sessions ORDER BY deadline_key DESC")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()
            .context("Failed to list sessions")?;
        Ok(keys)
    }

    /// Write a raw record, bypassing encoding (used to seed older layouts)
    #[cfg(test)]
    fn insert_raw(&self, key: &str, version: i64, body: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO sessions (deadline_key, version, body, updated_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![key, version, body, Utc::now().to_rfc3339()],
        )
        .context("Failed to insert raw session record")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    // ==================== Helper Functions ====================

    fn create_test_store() -> (SessionStore, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test_sessions.db");
        let store = SessionStore::new(db_path.to_str().unwrap()).expect("Failed to create store");
        (store, temp_dir)
    }

    fn deadline(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, minute, 0).unwrap()
    }

    fn session(deadline: DateTime<Utc>, over: bool) -> Session {
        let game = Game::from_steps(vec![
            Step::new(Language::from_code("en"), "Rez"),
            Step::new(Language::from_code("ja"), "\u{30ec}\u{30ba}"),
            Step::new(Language::from_code("en"), "Reds"),
        ])
        .unwrap();
        Session::from_parts(
            game,
            "100".to_string(),
            vec!["100".to_string(), "105".to_string()],
            vec!["104".to_string()],
            deadline,
            over,
        )
    }

    // ==================== Keys ====================

    #[test]
    fn test_deadline_key_sorts_by_time() {
        let earlier = deadline_key(deadline(5));
        let later = deadline_key(deadline(45));
        let next_day = deadline_key(deadline(0) + Duration::days(1));

        assert!(earlier < later);
        assert!(later < next_day);
        assert_eq!(earlier, "2026-03-01T12:05:00.000000Z");
    }

    // ==================== Encoding ====================

    #[test]
    fn test_encode_uses_current_version() {
        let (version, body) = encode(&session(deadline(0), false)).unwrap();
        assert_eq!(version, CURRENT_VERSION);

        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["steps"][0][0], "en");
        assert_eq!(value["steps"][0][1], "Rez");
        assert_eq!(value["thread_root_id"], "100");
        assert_eq!(value["seen_ids"][0], "104");
        assert_eq!(value["over"], false);
    }

    #[test]
    fn test_decode_v1_defaults_seen_ids() {
        let body = r#"{
            "steps": [["en", "Rez"], ["en", "Reds"]],
            "thread_root_id": "7",
            "trigger_ids": ["7", "9"],
            "deadline": "2026-03-01T12:00:00Z",
            "over": false
        }"#;

        let session = decode(1, body).unwrap();
        assert_eq!(session.game().original(), "Rez");
        assert_eq!(session.game().clue(), "Reds");
        assert_eq!(session.trigger_ids(), &["7".to_string(), "9".to_string()]);
        assert!(session.seen_ids().is_empty());
    }

    #[test]
    fn test_decode_v2_missing_seen_ids() {
        let body = r#"{
            "steps": [["en", "Rez"]],
            "thread_root_id": "7",
            "trigger_ids": ["7"],
            "deadline": "2026-03-01T12:00:00Z"
        }"#;

        let session = decode(2, body).unwrap();
        assert!(session.seen_ids().is_empty());
        assert!(!session.is_over());
    }

    #[test]
    fn test_decode_restores_missing_root_trigger() {
        let body = r#"{
            "steps": [["en", "Rez"]],
            "thread_root_id": "7",
            "trigger_ids": [],
            "deadline": "2026-03-01T12:00:00Z",
            "over": false
        }"#;

        let session = decode(1, body).unwrap();
        assert!(session.trigger_ids().contains(&"7".to_string()));
    }

    #[test]
    fn test_decode_rejects_unknown_version() {
        let err = decode(99, "{}").unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedVersion(99)));
    }

    #[test]
    fn test_decode_rejects_empty_steps() {
        let body = r#"{
            "steps": [],
            "thread_root_id": "7",
            "trigger_ids": ["7"],
            "deadline": "2026-03-01T12:00:00Z",
            "over": false
        }"#;
        assert!(matches!(decode(2, body), Err(StoreError::EmptyGame)));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode(2, "not json"), Err(StoreError::Json(_))));
    }

    // ==================== Database ====================

    #[test]
    fn test_empty_store() {
        let (store, _temp_dir) = create_test_store();
        assert!(store.latest().unwrap().is_none());
        assert!(store.keys().unwrap().is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let (store, _temp_dir) = create_test_store();
        let original = session(deadline(30), false);

        store.save(&original).unwrap();

        let loaded = store
            .load(&deadline_key(deadline(30)))
            .unwrap()
            .expect("Session should exist");
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_save_overwrites_same_deadline() {
        let (store, _temp_dir) = create_test_store();
        store.save(&session(deadline(30), false)).unwrap();
        store.save(&session(deadline(30), true)).unwrap();

        assert_eq!(store.keys().unwrap().len(), 1);
        assert!(store.latest().unwrap().unwrap().is_over());
    }

    #[test]
    fn test_latest_is_greatest_deadline() {
        let (store, _temp_dir) = create_test_store();
        store.save(&session(deadline(50), true)).unwrap();
        store.save(&session(deadline(10), false)).unwrap();
        store.save(&session(deadline(30), false)).unwrap();

        let latest = store.latest().unwrap().unwrap();
        assert_eq!(latest.deadline(), deadline(50));
        assert!(latest.is_over());

        let keys = store.keys().unwrap();
        assert_eq!(
            keys,
            vec![
                deadline_key(deadline(50)),
                deadline_key(deadline(30)),
                deadline_key(deadline(10)),
            ]
        );
    }

    #[test]
    fn test_older_records_load_from_database() {
        let (store, _temp_dir) = create_test_store();
        let body = r#"{
            "steps": [["en", "Rez"], ["en", "Reds"]],
            "thread_root_id": "7",
            "trigger_ids": ["7"],
            "deadline": "2026-03-01T12:00:00Z",
            "over": false
        }"#;
        store
            .insert_raw("2026-03-01T12:00:00.000000Z", 1, body)
            .unwrap();

        let session = store.latest().unwrap().unwrap();
        assert_eq!(session.thread_root_id(), "7");
        assert!(session.seen_ids().is_empty());

        // Saving it again upgrades the stored layout
        store.save(&session).unwrap();
        assert_eq!(store.keys().unwrap().len(), 1);
    }

    #[test]
    fn test_reopening_keeps_sessions() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("nested").join("sessions.db");
        let path_str = db_path.to_str().unwrap();

        {
            let store = SessionStore::new(path_str).expect("Failed to create store");
            store.save(&session(deadline(30), false)).unwrap();
        }

        let store = SessionStore::new(path_str).expect("Failed to reopen store");
        assert!(store.latest().unwrap().is_some());
    }

    #[test]
    fn test_unreadable_newest_record_is_skipped() {
        let (store, _temp_dir) = create_test_store();
        store.save(&session(deadline(10), true)).unwrap();
        store
            .insert_raw(&deadline_key(deadline(50)), 7, "{}")
            .unwrap();
        store
            .insert_raw(&deadline_key(deadline(40)), 2, "not json")
            .unwrap();

        let latest = store.latest().unwrap().unwrap();
        assert_eq!(latest.deadline(), deadline(10));
        assert!(latest.is_over());

        // The bad rows stay on disk untouched
        assert_eq!(store.keys().unwrap().len(), 3);
    }

    #[test]
    fn test_only_unreadable_records_means_no_session() {
        let (store, _temp_dir) = create_test_store();
        store.insert_raw("2026-03-01T12:00:00.000000Z", 7, "{}").unwrap();

        assert!(store.latest().unwrap().is_none());

        // A game started afterwards is found even behind the bad row
        let earlier = Utc.with_ymd_and_hms(2026, 3, 1, 11, 30, 0).unwrap();
        store.save(&session(earlier, false)).unwrap();
        let latest = store.latest().unwrap().unwrap();
        assert_eq!(latest.deadline(), earlier);
        assert!(!latest.is_over());
    }
}
