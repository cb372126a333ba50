//! In-memory program store.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::channels::ChannelMap;
use crate::model::Program;

/// Programs of one channel, keyed by program id.
pub type ChannelPrograms = BTreeMap<String, Program>;

/// Channel id → program id → program.
///
/// Both levels are ordered, so iteration is sorted by channel id and then
/// by program id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramStore {
    channels: BTreeMap<String, ChannelPrograms>,
}

/// Counts from preparing a loaded snapshot for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSummary {
    /// Channels removed because they are outside the allow-list.
    pub dropped_channels: usize,
    /// Programs removed because they ended before today.
    pub expired: usize,
    /// Programs kept.
    pub retained: usize,
}

impl ProgramStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from already grouped programs.
    #[must_use]
    pub const fn from_parts(channels: BTreeMap<String, ChannelPrograms>) -> Self {
        Self { channels }
    }

    /// Prepares a freshly loaded snapshot for a run.
    ///
    /// Drops channels outside the allow-list, drops programs whose stop
    /// date (in their own offset) is before `today`, and clears `grabbed`
    /// on everything that remains.
    pub fn begin_run(&mut self, today: NaiveDate, channels: &ChannelMap) -> LoadSummary {
        let mut summary = LoadSummary::default();

        if channels.is_restricted() {
            let before = self.channels.len();
            self.channels.retain(|id, _| channels.allows(id));
            summary.dropped_channels = before.saturating_sub(self.channels.len());
        }

        for programs in self.channels.values_mut() {
            let before = programs.len();
            programs.retain(|_, program| program.stop.date() >= today);
            summary.expired = summary
                .expired
                .saturating_add(before.saturating_sub(programs.len()));
            for program in programs.values_mut() {
                program.grabbed = false;
            }
            summary.retained = summary.retained.saturating_add(programs.len());
        }

        info!(
            dropped_channels = summary.dropped_channels,
            expired = summary.expired,
            retained = summary.retained,
            %today,
            "prepared program store"
        );
        summary
    }

    /// Removes every program not seen during this run.
    ///
    /// Channel entries are kept even when they end up empty. Returns the
    /// number of programs removed.
    pub fn prune_stale(&mut self) -> usize {
        let mut removed: usize = 0;
        for (channel, programs) in &mut self.channels {
            let before = programs.len();
            programs.retain(|_, program| program.grabbed);
            let gone = before.saturating_sub(programs.len());
            if gone > 0 {
                debug!(channel = %channel, removed = gone, "pruned stale programs");
            }
            removed = removed.saturating_add(gone);
        }
        removed
    }

    /// Returns the program map of `channel`, creating an empty one.
    pub fn ensure_channel(&mut self, channel: &str) -> &mut ChannelPrograms {
        self.channels.entry(channel.to_owned()).or_default()
    }

    /// Looks up a program.
    #[must_use]
    pub fn get(&self, channel: &str, program_id: &str) -> Option<&Program> {
        self.channels.get(channel)?.get(program_id)
    }

    /// Looks up a program for mutation.
    pub fn get_mut(&mut self, channel: &str, program_id: &str) -> Option<&mut Program> {
        self.channels.get_mut(channel)?.get_mut(program_id)
    }

    /// Removes a program, returning it.
    pub fn remove(&mut self, channel: &str, program_id: &str) -> Option<Program> {
        self.channels.get_mut(channel)?.remove(program_id)
    }

    /// Inserts a program under its own channel and id, replacing any
    /// previous record.
    pub fn insert(&mut self, program: Program) -> Option<Program> {
        self.ensure_channel(&program.channel)
            .insert(program.id.clone(), program)
    }

    /// Iterates channels with their programs, sorted by channel id.
    pub fn channels(&self) -> impl Iterator<Item = (&str, &ChannelPrograms)> {
        self.channels
            .iter()
            .map(|(channel, programs)| (channel.as_str(), programs))
    }

    /// Iterates channel ids in sorted order.
    pub fn channel_ids(&self) -> impl Iterator<Item = &str> {
        self.channels.keys().map(String::as_str)
    }

    /// Iterates every program sorted by (channel id, program id).
    pub fn programs(&self) -> impl Iterator<Item = &Program> {
        self.channels.values().flat_map(BTreeMap::values)
    }

    /// Number of channels.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Total number of programs.
    #[must_use]
    pub fn program_count(&self) -> usize {
        self.channels.values().map(BTreeMap::len).sum()
    }
}
