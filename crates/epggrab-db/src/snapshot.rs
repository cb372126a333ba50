//! Program store load and save.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use epggrab_core::store::ChannelPrograms;
use epggrab_core::{ChannelMap, Credits, GuideTime, LoadSummary, Program, ProgramStore};
use rusqlite::Connection;
use tracing::{info, instrument, warn};

/// Counts from saving the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveSummary {
    /// Programs pruned because they were not seen during the run.
    pub pruned: usize,
    /// Channels written.
    pub channels: usize,
    /// Programs written.
    pub programs: usize,
}

/// Program row as stored, before timestamp and JSON decoding.
struct ProgramRow {
    channel_id: String,
    program_id: String,
    start: String,
    stop: String,
    title: String,
    sub_title: Option<String>,
    description: Option<String>,
    credits: Option<String>,
    categories: Option<String>,
    aspect_ratio: Option<String>,
}

impl ProgramRow {
    fn into_program(self) -> Result<Program> {
        let start = GuideTime::parse(&self.start)?;
        let stop = GuideTime::parse(&self.stop)?;
        let credits = self
            .credits
            .map(|json| serde_json::from_str::<Credits>(&json))
            .transpose()
            .context("invalid credits JSON")?
            .filter(|credits| !credits.is_empty());
        let categories = self
            .categories
            .map(|json| serde_json::from_str::<Vec<String>>(&json))
            .transpose()
            .context("invalid categories JSON")?
            .filter(|categories| !categories.is_empty());

        let mut program = Program::new(self.program_id, self.channel_id, start, stop, self.title);
        program.subtitle = self.sub_title;
        program.description = self.description;
        program.credits = credits;
        program.categories = categories;
        program.aspect_ratio = self.aspect_ratio;
        Ok(program)
    }
}

/// Loads the persisted snapshot as stored.
///
/// An empty database yields an empty store. Rows that cannot be decoded are
/// skipped with a warning.
///
/// # Errors
///
/// Returns an error if the database query fails.
#[instrument(skip_all)]
pub fn load_snapshot(conn: &Connection) -> Result<ProgramStore> {
    let mut channels: BTreeMap<String, ChannelPrograms> = BTreeMap::new();

    let mut stmt = conn
        .prepare("SELECT channel_id FROM channels ORDER BY channel_id")
        .context("failed to prepare channels query")?;
    let ids = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .context("failed to query channels")?
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("failed to read channels rows")?;
    for id in ids {
        channels.entry(id).or_default();
    }

    let mut stmt = conn
        .prepare(
            "SELECT channel_id, program_id, start, stop, title,
                    sub_title, description, credits, categories, aspect_ratio
             FROM programs
             ORDER BY channel_id, program_id",
        )
        .context("failed to prepare programs query")?;
    let rows = stmt
        .query_map([], map_program_row)
        .context("failed to query programs")?
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("failed to read programs rows")?;

    for row in rows {
        let key = format!("{}/{}", row.channel_id, row.program_id);
        match row.into_program() {
            Ok(program) => {
                channels
                    .entry(program.channel.clone())
                    .or_default()
                    .insert(program.id.clone(), program);
            }
            Err(e) => warn!(program = %key, error = %format!("{e:#}"), "skipping unreadable row"),
        }
    }

    Ok(ProgramStore::from_parts(channels))
}

/// Loads the snapshot and prepares it for a run.
///
/// Applies the channel allow-list, expires programs that ended before
/// `today` and clears every `grabbed` flag.
///
/// # Errors
///
/// Returns an error if the database query fails.
pub fn load_store(
    conn: &Connection,
    today: NaiveDate,
    channels: &ChannelMap,
) -> Result<(ProgramStore, LoadSummary)> {
    let mut store = load_snapshot(conn)?;
    let summary = store.begin_run(today, channels);
    Ok((store, summary))
}

/// Prunes programs not seen during the run, then overwrites the snapshot
/// with the whole store in one transaction.
///
/// # Errors
///
/// Returns an error if the database operation fails; the previous snapshot
/// is then left intact.
#[instrument(skip_all)]
pub fn save_store(conn: &Connection, store: &mut ProgramStore) -> Result<SaveSummary> {
    let pruned = store.prune_stale();

    let tx = conn
        .unchecked_transaction()
        .context("failed to begin transaction")?;
    tx.execute_batch("DELETE FROM programs; DELETE FROM channels;")
        .context("failed to clear previous snapshot")?;

    let mut channel_stmt = tx
        .prepare("INSERT INTO channels (channel_id) VALUES (?1)")
        .context("failed to prepare channels insert")?;
    let mut program_stmt = tx
        .prepare(
            "INSERT INTO programs (
                channel_id, program_id, start, stop, title,
                sub_title, description, credits, categories, aspect_ratio
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )
        .context("failed to prepare programs insert")?;

    let mut summary = SaveSummary {
        pruned,
        ..SaveSummary::default()
    };
    for (channel, programs) in store.channels() {
        channel_stmt
            .execute([channel])
            .with_context(|| format!("failed to insert channel {channel}"))?;
        summary.channels = summary.channels.saturating_add(1);

        for p in programs.values() {
            let credits = p
                .credits
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .context("failed to encode credits")?;
            let categories = p
                .categories
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .context("failed to encode categories")?;
            program_stmt
                .execute(rusqlite::params![
                    p.channel,
                    p.id,
                    p.start.to_string(),
                    p.stop.to_string(),
                    p.title,
                    p.subtitle,
                    p.description,
                    credits,
                    categories,
                    p.aspect_ratio,
                ])
                .with_context(|| format!("failed to insert program {channel}/{}", p.id))?;
            summary.programs = summary.programs.saturating_add(1);
        }
    }

    drop(channel_stmt);
    drop(program_stmt);
    tx.commit().context("failed to commit snapshot")?;

    info!(
        pruned = summary.pruned,
        channels = summary.channels,
        programs = summary.programs,
        "saved program snapshot"
    );
    Ok(summary)
}

fn map_program_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<ProgramRow> {
    Ok(ProgramRow {
        channel_id: row.get(0)?,
        program_id: row.get(1)?,
        start: row.get(2)?,
        stop: row.get(3)?,
        title: row.get(4)?,
        sub_title: row.get(5)?,
        description: row.get(6)?,
        credits: row.get(7)?,
        categories: row.get(8)?,
        aspect_ratio: row.get(9)?,
    })
}
