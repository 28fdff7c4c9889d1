//! SQLite-backed repositories.
//!
//! Provides persistent storage for:
//! - Workout sessions (JSON body plus indexed state/date columns)
//! - Workout templates and the exercise catalog
//! - Key-value store for CLI state such as the rest timer

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::SecondsFormat;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use super::{data_dir, migrations};
use crate::error::{CoreError, RepositoryError};
use crate::repository::{ExerciseCatalog, SessionRepository, WorkoutRepository};
use crate::session::WorkoutSession;
use crate::workout::{Exercise, WorkoutTemplate};

/// SQLite database implementing every repository trait.
///
/// Queries run synchronously on the calling task behind a `Mutex`, so an
/// `await` on any repository method blocks that worker thread until SQLite
/// returns. That suits the single-user CLI, where each call is a few
/// milliseconds against a local file. A multi-session server should wrap
/// the store and move calls onto `tokio::task::spawn_blocking`.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open the database at `<data_dir>/ironlog.db`.
    ///
    /// # Errors
    /// Returns an error if the data directory or database cannot be opened,
    /// or a migration fails.
    pub fn open_default() -> Result<Self, CoreError> {
        Self::open(&data_dir()?.join("ironlog.db"))
    }

    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: &Path) -> Result<Self, CoreError> {
        Self::with_connection(Connection::open(path)?)
    }

    /// Open an in-memory database.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn open_memory() -> Result<Self, CoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, CoreError> {
        migrations::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(
        &self,
        kind: fn(String) -> RepositoryError,
    ) -> Result<MutexGuard<'_, Connection>, RepositoryError> {
        self.conn
            .lock()
            .map_err(|_| kind("database lock poisoned".into()))
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, RepositoryError> {
        self.lock(RepositoryError::FetchFailed)?
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()
            .map_err(|e| RepositoryError::FetchFailed(e.to_string()))
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), RepositoryError> {
        self.lock(RepositoryError::SaveFailed)?
            .execute(
                "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
                params![key, value],
            )
            .map_err(|e| RepositoryError::SaveFailed(e.to_string()))?;
        Ok(())
    }

    pub fn kv_delete(&self, key: &str) -> Result<(), RepositoryError> {
        self.lock(RepositoryError::DeleteFailed)?
            .execute("DELETE FROM kv WHERE key = ?1", params![key])
            .map_err(|e| RepositoryError::DeleteFailed(e.to_string()))?;
        Ok(())
    }

    fn fetch_body<T: DeserializeOwned>(
        &self,
        sql: &str,
        id: Uuid,
    ) -> Result<Option<T>, RepositoryError> {
        let body = self
            .lock(RepositoryError::FetchFailed)?
            .query_row(sql, params![id.to_string()], |row| row.get::<_, String>(0))
            .optional()
            .map_err(|e| RepositoryError::FetchFailed(e.to_string()))?;
        body.map(|b| decode(&b)).transpose()
    }

    fn fetch_bodies<T: DeserializeOwned>(&self, sql: &str) -> Result<Vec<T>, RepositoryError> {
        let conn = self.lock(RepositoryError::FetchFailed)?;
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| RepositoryError::FetchFailed(e.to_string()))?;
        let bodies = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .and_then(|rows| rows.collect::<Result<Vec<String>, _>>())
            .map_err(|e| RepositoryError::FetchFailed(e.to_string()))?;
        bodies.iter().map(|b| decode(b)).collect()
    }

    fn delete_row(&self, sql: &str, id: Uuid) -> Result<(), RepositoryError> {
        let changed = self
            .lock(RepositoryError::DeleteFailed)?
            .execute(sql, params![id.to_string()])
            .map_err(|e| RepositoryError::DeleteFailed(e.to_string()))?;
        if changed == 0 {
            return Err(RepositoryError::NotFound(id));
        }
        Ok(())
    }
}

fn encode<T: serde::Serialize>(value: &T) -> Result<String, RepositoryError> {
    serde_json::to_string(value).map_err(|e| RepositoryError::InvalidData(e.to_string()))
}

fn decode<T: DeserializeOwned>(body: &str) -> Result<T, RepositoryError> {
    serde_json::from_str(body).map_err(|e| RepositoryError::InvalidData(e.to_string()))
}

/// Fixed-width UTC timestamps so text ordering matches time ordering.
fn timestamp(at: chrono::DateTime<chrono::Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[async_trait]
impl SessionRepository for SqliteStore {
    async fn save(&self, session: &WorkoutSession) -> Result<(), RepositoryError> {
        let body = encode(session)?;
        self.lock(RepositoryError::SaveFailed)?
            .execute(
                "INSERT INTO sessions (id, workout_id, state, start_date, end_date, body)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    session.id.to_string(),
                    session.workout_id.map(|id| id.to_string()),
                    session.state.as_str(),
                    timestamp(session.start_date),
                    session.end_date.map(timestamp),
                    body,
                ],
            )
            .map_err(|e| RepositoryError::SaveFailed(e.to_string()))?;
        Ok(())
    }

    async fn update(&self, session: &WorkoutSession) -> Result<(), RepositoryError> {
        let body = encode(session)?;
        let changed = self
            .lock(RepositoryError::UpdateFailed)?
            .execute(
                "UPDATE sessions
                 SET workout_id = ?2, state = ?3, start_date = ?4, end_date = ?5, body = ?6
                 WHERE id = ?1",
                params![
                    session.id.to_string(),
                    session.workout_id.map(|id| id.to_string()),
                    session.state.as_str(),
                    timestamp(session.start_date),
                    session.end_date.map(timestamp),
                    body,
                ],
            )
            .map_err(|e| RepositoryError::UpdateFailed(e.to_string()))?;
        if changed == 0 {
            return Err(RepositoryError::NotFound(session.id));
        }
        Ok(())
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<WorkoutSession>, RepositoryError> {
        self.fetch_body("SELECT body FROM sessions WHERE id = ?1", id)
    }

    async fn fetch_all(&self) -> Result<Vec<WorkoutSession>, RepositoryError> {
        self.fetch_bodies("SELECT body FROM sessions ORDER BY start_date ASC")
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        self.delete_row("DELETE FROM sessions WHERE id = ?1", id)
    }
}

#[async_trait]
impl WorkoutRepository for SqliteStore {
    async fn save(&self, workout: &WorkoutTemplate) -> Result<(), RepositoryError> {
        let body = encode(workout)?;
        self.lock(RepositoryError::SaveFailed)?
            .execute(
                "INSERT OR REPLACE INTO workouts (id, name, body) VALUES (?1, ?2, ?3)",
                params![workout.id.to_string(), workout.name, body],
            )
            .map_err(|e| RepositoryError::SaveFailed(e.to_string()))?;
        Ok(())
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<WorkoutTemplate>, RepositoryError> {
        self.fetch_body("SELECT body FROM workouts WHERE id = ?1", id)
    }

    async fn fetch_all(&self) -> Result<Vec<WorkoutTemplate>, RepositoryError> {
        self.fetch_bodies("SELECT body FROM workouts ORDER BY name COLLATE NOCASE ASC")
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepositoryError> {
        self.delete_row("DELETE FROM workouts WHERE id = ?1", id)
    }
}

#[async_trait]
impl ExerciseCatalog for SqliteStore {
    async fn save(&self, exercise: &Exercise) -> Result<(), RepositoryError> {
        let body = encode(exercise)?;
        self.lock(RepositoryError::SaveFailed)?
            .execute(
                "INSERT OR REPLACE INTO exercises (id, name, body) VALUES (?1, ?2, ?3)",
                params![exercise.id.to_string(), exercise.name, body],
            )
            .map_err(|e| RepositoryError::SaveFailed(e.to_string()))?;
        Ok(())
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<Exercise>, RepositoryError> {
        self.fetch_body("SELECT body FROM exercises WHERE id = ?1", id)
    }

    async fn fetch_all(&self) -> Result<Vec<Exercise>, RepositoryError> {
        self.fetch_bodies("SELECT body FROM exercises ORDER BY name COLLATE NOCASE ASC")
    }
}
