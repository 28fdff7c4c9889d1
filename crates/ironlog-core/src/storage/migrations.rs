//! Schema migrations for the SQLite store.
//!
//! Migrations are versioned and applied in order when the store opens. The
//! `schema_version` table holds the single current version row.

use rusqlite::{Connection, OptionalExtension, Result as SqliteResult};
use tracing::info;

/// Version the schema reaches after all migrations ran.
pub const CURRENT_VERSION: i32 = 2;

/// Bring the database up to [`CURRENT_VERSION`].
///
/// # Errors
/// Returns an error if any migration statement fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )?;

    let current = schema_version(conn)?;
    if current < 1 {
        migrate_v1(conn)?;
    }
    if current < 2 {
        migrate_v2(conn)?;
    }
    if current < CURRENT_VERSION {
        info!(from = current, to = CURRENT_VERSION, "database migrated");
    }
    Ok(())
}

/// 0 for a fresh database.
pub fn schema_version(conn: &Connection) -> SqliteResult<i32> {
    Ok(conn
        .query_row("SELECT version FROM schema_version", [], |row| row.get(0))
        .optional()?
        .unwrap_or(0))
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// v1: sessions, templates, catalog and the kv table.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS sessions (
            id          TEXT PRIMARY KEY,
            workout_id  TEXT,
            state       TEXT NOT NULL,
            start_date  TEXT NOT NULL,
            body        TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS workouts (
            id    TEXT PRIMARY KEY,
            name  TEXT NOT NULL,
            body  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS exercises (
            id    TEXT PRIMARY KEY,
            name  TEXT NOT NULL,
            body  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS kv (
            key   TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_sessions_start_date ON sessions(start_date);
        CREATE INDEX IF NOT EXISTS idx_sessions_state ON sessions(state);",
    )?;
    set_schema_version(&tx, 1)?;
    tx.commit()
}

/// v2: end date column so history queries can skip unfinished sessions
/// without decoding bodies.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(
        "ALTER TABLE sessions ADD COLUMN end_date TEXT;
         UPDATE sessions SET end_date = json_extract(body, '$.end_date');
         CREATE INDEX IF NOT EXISTS idx_sessions_workout_id ON sessions(workout_id);",
    )?;
    set_schema_version(&tx, 2)?;
    tx.commit()
}
