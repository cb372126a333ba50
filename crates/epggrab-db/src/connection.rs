//! Database connection management.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusqlite::Connection;

use super::migrations::run_migrations;

/// Snapshot database file name inside the data directory.
pub const DB_FILE_NAME: &str = "epggrab.db";

/// Opens (or creates) the snapshot database and runs migrations.
///
/// - If `dir` is `Some`, uses `{dir}/epggrab.db`.
/// - Otherwise uses `~/.local/share/epggrab/epggrab.db`.
///
/// # Errors
///
/// Returns an error if the database cannot be opened or migrations fail.
pub fn open_db(dir: Option<&Path>) -> Result<Connection> {
    let db_path = resolve_data_dir(dir)?.join(DB_FILE_NAME);

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    let conn = Connection::open(&db_path)
        .with_context(|| format!("failed to open database {}", db_path.display()))?;

    run_migrations(&conn).context("database migration failed")?;

    Ok(conn)
}

/// Resolves the data directory holding the database, logos and output.
///
/// # Errors
///
/// Returns an error if `dir` is `None` and `HOME` is not set.
pub fn resolve_data_dir(dir: Option<&Path>) -> Result<PathBuf> {
    if let Some(d) = dir {
        return Ok(d.to_path_buf());
    }

    let home = std::env::var("HOME").context("HOME environment variable is not set")?;
    Ok(PathBuf::from(home)
        .join(".local")
        .join("share")
        .join("epggrab"))
}
