use std::path::Path;

use rusqlite::Connection;
use tracing::info;

use crate::error::Result;

pub fn open(path: &Path) -> Result<Connection> {
    info!("opening database at {}", path.display());
    let conn = Connection::open(path)?;

    conn.execute_batch("PRAGMA journal_mode = WAL;")?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    migrate(&conn)?;
    Ok(conn)
}

/// Run database migrations. Exposed for tests that use in-memory DBs.
pub(crate) fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        -- Role/position definitions, selectable per user
        CREATE TABLE IF NOT EXISTS user_positions (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            position_name   TEXT NOT NULL UNIQUE,
            position_prefix TEXT NOT NULL,
            description     TEXT,
            is_active       INTEGER NOT NULL DEFAULT 1,
            created_at      TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Users (single default user for now; no auth layer)
        CREATE TABLE IF NOT EXISTS users (
            id                 INTEGER PRIMARY KEY AUTOINCREMENT,
            username           TEXT NOT NULL UNIQUE,
            email              TEXT NOT NULL DEFAULT '',
            taiga_user_id      INTEGER,
            position_id        INTEGER REFERENCES user_positions(id),
            position           TEXT,
            position_prefix    TEXT,
            preferred_ai_model TEXT NOT NULL DEFAULT 'gemini-2.5-flash',
            is_active          INTEGER NOT NULL DEFAULT 1,
            created_at         TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Taiga projects mirrored locally
        CREATE TABLE IF NOT EXISTS projects (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            taiga_project_id INTEGER NOT NULL UNIQUE,
            name             TEXT NOT NULL,
            slug             TEXT NOT NULL DEFAULT '',
            description      TEXT,
            is_active        INTEGER NOT NULL DEFAULT 1,
            created_at       TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Generated and submitted activities
        CREATE TABLE IF NOT EXISTS activities (
            id                     INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id                INTEGER NOT NULL REFERENCES users(id),
            project_id             INTEGER REFERENCES projects(id),
            title                  TEXT NOT NULL,
            description            TEXT NOT NULL,
            hours_spent            REAL NOT NULL DEFAULT 0.0,
            activity_date          TEXT NOT NULL,
            ai_generated           INTEGER NOT NULL DEFAULT 0,
            ai_model_used          TEXT,
            user_prompt            TEXT,
            submitted_to_taiga     INTEGER NOT NULL DEFAULT 0,
            taiga_activity_id      INTEGER,
            taiga_submission_error TEXT,
            created_at             TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at             TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_activities_user ON activities(user_id);
        CREATE INDEX IF NOT EXISTS idx_activities_project ON activities(project_id) WHERE project_id IS NOT NULL;
        CREATE INDEX IF NOT EXISTS idx_activities_created ON activities(created_at);
        ",
    )?;

    info!("database migrations complete");
    Ok(())
}

/// Creates an in-memory database with migrations applied. Use in tests.
#[cfg(test)]
pub(crate) fn test_db() -> std::sync::Arc<tokio::sync::Mutex<Connection>> {
    use std::sync::Arc;

    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
    migrate(&conn).unwrap();
    Arc::new(tokio::sync::Mutex::new(conn))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_with_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("written-test.db");
        let conn = open(&path).unwrap();
        drop(conn);
    }

    #[test]
    fn test_all_tables_exist_after_migration() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        migrate(&conn).unwrap();

        for table in ["user_positions", "users", "projects", "activities"] {
            let exists: bool = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert!(exists, "table {} should exist", table);
        }
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
    }
}
