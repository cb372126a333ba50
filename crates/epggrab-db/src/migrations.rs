//! Schema version management using `PRAGMA user_version`.

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Current schema version.
const CURRENT_VERSION: u32 = 1;

/// Runs database migrations up to `CURRENT_VERSION`.
///
/// # Errors
///
/// Returns an error if any SQL statement fails.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let version: u32 = conn
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .context("failed to read user_version")?;

    if version < 1 {
        migrate_v1(conn).context("migration to v1 failed")?;
    }

    conn.pragma_update(None, "user_version", CURRENT_VERSION)
        .context("failed to update user_version")?;

    Ok(())
}

/// Migration to v1: create `channels` and `programs` tables.
fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS channels (
            channel_id  TEXT PRIMARY KEY
        );

        CREATE TABLE IF NOT EXISTS programs (
            channel_id    TEXT NOT NULL REFERENCES channels(channel_id),
            program_id    TEXT NOT NULL,
            start         TEXT NOT NULL,
            stop          TEXT NOT NULL,
            title         TEXT NOT NULL,
            sub_title     TEXT,
            description   TEXT,
            credits       TEXT,
            categories    TEXT,
            aspect_ratio  TEXT,
            PRIMARY KEY (channel_id, program_id)
        );",
    )
    .context("failed to create tables")?;

    Ok(())
}
