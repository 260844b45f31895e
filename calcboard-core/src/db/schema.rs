//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: users and calculations
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id               TEXT PRIMARY KEY,
        username         TEXT NOT NULL UNIQUE,
        email            TEXT NOT NULL UNIQUE,
        first_name       TEXT NOT NULL,
        last_name        TEXT NOT NULL,
        password_salt    TEXT NOT NULL,
        password_hash    TEXT NOT NULL,
        is_active        INTEGER NOT NULL DEFAULT 1,
        is_verified      INTEGER NOT NULL DEFAULT 0,
        created_at       DATETIME NOT NULL,
        updated_at       DATETIME NOT NULL,
        last_login       DATETIME
    );

    -- Timestamps are fixed-width RFC 3339 UTC, so text order is time order.
    CREATE TABLE IF NOT EXISTS calculations (
        id               TEXT PRIMARY KEY,
        user_id          TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        type             TEXT NOT NULL,
        inputs           JSON NOT NULL,
        result           REAL NOT NULL,
        created_at       DATETIME NOT NULL,
        updated_at       DATETIME NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_calculations_user_created
        ON calculations(user_id, created_at DESC);
    CREATE INDEX IF NOT EXISTS idx_calculations_user_type
        ON calculations(user_id, type);
    "#,
    // Version 2: bearer tokens
    r#"
    CREATE TABLE IF NOT EXISTS auth_tokens (
        token_hash       TEXT PRIMARY KEY,
        user_id          TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        kind             TEXT NOT NULL,
        created_at       DATETIME NOT NULL,
        expires_at       DATETIME NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_auth_tokens_user ON auth_tokens(user_id);
    CREATE INDEX IF NOT EXISTS idx_auth_tokens_expires ON auth_tokens(expires_at);
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    let current_version: i32 = conn
        .query_row("PRAGMA user_version", [], |r| r.get(0))
        .unwrap_or(0);

    tracing::info!(
        current_version,
        target_version = SCHEMA_VERSION,
        "Checking database migrations"
    );

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running migration");
            conn.execute_batch(migration)?;
            conn.execute(&format!("PRAGMA user_version = {}", version), [])?;
        }
    }

    if current_version < SCHEMA_VERSION {
        tracing::info!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Migrations complete"
        );
    }

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> crate::error::Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}
