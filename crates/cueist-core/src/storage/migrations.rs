//! Database schema migrations for cueist.
//!
//! Migrations are versioned and applied automatically when opening the
//! database. The `schema_version` table tracks the current migration
//! version.

use rusqlite::{Connection, Result as SqliteResult};

/// Apply all pending migrations to bring the database to the current schema
/// version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn);

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

/// Create the schema_version table if it doesn't exist.
fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Get the current schema version from the database.
///
/// Returns 0 if no version is set (initial database).
fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or(0)
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    Ok(())
}

/// v1: base tables for rules, beliefs, events, and the feedback log.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS task_rules (
            id                  TEXT PRIMARY KEY,
            name                TEXT NOT NULL,
            description         TEXT,
            trigger             TEXT NOT NULL DEFAULT '{}',
            weight              REAL NOT NULL DEFAULT 0.7,
            active              INTEGER NOT NULL DEFAULT 1,
            scheduled_event_id  TEXT,
            created_at          TEXT NOT NULL,
            updated_at          TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS timing_beliefs (
            task_type       TEXT NOT NULL,
            context_key     TEXT NOT NULL,
            window_minutes  INTEGER NOT NULL,
            alpha           REAL NOT NULL,
            beta            REAL NOT NULL,
            total_triggers  INTEGER NOT NULL DEFAULT 0,
            last_updated    TEXT NOT NULL,
            PRIMARY KEY (task_type, context_key, window_minutes)
        );

        CREATE TABLE IF NOT EXISTS scheduled_events (
            id                     TEXT PRIMARY KEY,
            title                  TEXT NOT NULL,
            description            TEXT,
            start_time             TEXT NOT NULL,
            priority               TEXT NOT NULL DEFAULT 'medium',
            preparation_minutes    INTEGER NOT NULL DEFAULT 0,
            travel_minutes         INTEGER NOT NULL DEFAULT 0,
            suggested_contexts     TEXT NOT NULL DEFAULT '[]',
            optimal_reminder_time  TEXT,
            last_reminded_at       TEXT,
            reminder_count         INTEGER NOT NULL DEFAULT 0,
            completed              INTEGER NOT NULL DEFAULT 0,
            dismissed              INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS feedback_log (
            id              TEXT PRIMARY KEY,
            task_id         TEXT NOT NULL,
            action          TEXT NOT NULL,
            window_minutes  INTEGER NOT NULL,
            context_key     TEXT NOT NULL,
            context         TEXT NOT NULL,
            timestamp       TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_scheduled_events_start
            ON scheduled_events (start_time);",
    )?;

    set_schema_version(conn, 1)
}

/// v2: indexes for feedback history queries.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_feedback_log_task
            ON feedback_log (task_id);
        CREATE INDEX IF NOT EXISTS idx_feedback_log_timestamp
            ON feedback_log (timestamp);",
    )?;

    set_schema_version(conn, 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrate_fresh_database() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), 2);
    }

    #[test]
    fn test_migrate_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), 2);
    }
}
