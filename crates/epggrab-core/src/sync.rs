//! Synchronization engine.
//!
//! Reconciles the basic feed with the [`ProgramStore`]: every announced
//! program is classified as new, unchanged or changed, and only new and
//! changed programs trigger a detail fetch. Programs not announced during
//! the run stay `grabbed == false` and are pruned when the store is saved.

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use chrono::{Days, NaiveDate, Utc};
use chrono_tz::Tz;
use epggrab_api::feed::{BasicEntry, BasicFeed, LocalFeedApi, SlotId, SlotResponse};
use tracing::{debug, info, instrument, warn};

use crate::channels::ChannelMap;
use crate::enrich::{Enrichment, enrich};
use crate::error::MalformedEntry;
use crate::logos::LogoCache;
use crate::model::{GuideTime, Program};
use crate::store::ProgramStore;

/// Engine settings.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Zone programme timestamps are expressed in.
    pub timezone: Tz,
    /// Fetch detail documents for new and changed programs.
    pub grab_details: bool,
    /// Channel allow-list.
    pub channels: ChannelMap,
}

impl SyncOptions {
    /// Today's date in the configured zone.
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.timezone).date_naive()
    }
}

/// Which slots a run scans.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrabPlan {
    /// First day (normally today).
    pub first_day: NaiveDate,
    /// Number of days.
    pub days: u32,
    /// Slots per day.
    pub slots_per_day: u8,
}

impl GrabPlan {
    /// Most days the feed server publishes ahead.
    pub const MAX_DAYS: u32 = 7;

    /// Creates a plan; `days` is clamped to `1..=MAX_DAYS` and
    /// `slots_per_day` to at least 1.
    ///
    /// A plan always scans at least one slot: an empty scan confirms
    /// nothing, and pruning after it would empty the store.
    #[must_use]
    pub fn new(first_day: NaiveDate, days: u32, slots_per_day: u8) -> Self {
        Self {
            first_day,
            days: days.clamp(1, Self::MAX_DAYS),
            slots_per_day: slots_per_day.max(1),
        }
    }

    /// Slots in chronological order.
    pub fn slots(&self) -> impl Iterator<Item = SlotId> + use<> {
        let Self {
            first_day,
            days,
            slots_per_day,
        } = *self;
        (0..days)
            .filter_map(move |day| first_day.checked_add_days(Days::new(u64::from(day))))
            .flat_map(move |date| (0..slots_per_day).map(move |slot| SlotId::new(date, slot)))
    }
}

/// How an announced program relates to the stored one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// No stored record with this id.
    New,
    /// Stored record has the same start, stop and title.
    Unchanged,
    /// Stored record differs in start, stop or title.
    Changed,
}

/// Classifies `candidate` against the stored record with the same id.
#[must_use]
pub fn classify(existing: Option<&Program>, candidate: &Program) -> Decision {
    match existing {
        None => Decision::New,
        Some(stored) if stored.same_schedule(candidate) => Decision::Unchanged,
        Some(_) => Decision::Changed,
    }
}

/// Maps a basic feed entry to a program marked as grabbed.
///
/// # Errors
///
/// Returns [`MalformedEntry`] if a required field is missing or empty, a
/// timestamp is out of range, or `start` is not before `end`.
pub fn map_entry(channel: &str, entry: &BasicEntry, timezone: Tz) -> Result<Program, MalformedEntry> {
    let id = entry
        .id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or(MalformedEntry::MissingField("id"))?;
    let start = entry.start.ok_or(MalformedEntry::MissingField("start"))?;
    let end = entry.end.ok_or(MalformedEntry::MissingField("end"))?;
    let title = entry
        .name
        .as_deref()
        .filter(|name| !name.trim().is_empty())
        .ok_or(MalformedEntry::MissingField("name"))?;
    if start >= end {
        return Err(MalformedEntry::EmptyInterval { start, end });
    }

    let start_time =
        GuideTime::from_epoch(start, timezone).ok_or(MalformedEntry::InvalidTimestamp(start))?;
    let stop_time =
        GuideTime::from_epoch(end, timezone).ok_or(MalformedEntry::InvalidTimestamp(end))?;

    let mut program = Program::new(id, channel, start_time, stop_time, title);
    program.grabbed = true;
    Ok(program)
}

/// Counts from reconciling one or more batches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Programs inserted for the first time.
    pub new: usize,
    /// Programs confirmed without change.
    pub unchanged: usize,
    /// Programs replaced because start, stop or title changed.
    pub changed: usize,
    /// Entries skipped as malformed.
    pub malformed: usize,
    /// Detail documents applied.
    pub enriched: usize,
    /// Detail fetches that yielded nothing.
    pub enrichment_unavailable: usize,
}

impl BatchReport {
    /// Adds the counts of `other`.
    pub const fn absorb(&mut self, other: &Self) {
        self.new = self.new.saturating_add(other.new);
        self.unchanged = self.unchanged.saturating_add(other.unchanged);
        self.changed = self.changed.saturating_add(other.changed);
        self.malformed = self.malformed.saturating_add(other.malformed);
        self.enriched = self.enriched.saturating_add(other.enriched);
        self.enrichment_unavailable = self
            .enrichment_unavailable
            .saturating_add(other.enrichment_unavailable);
    }
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Slot documents fetched and merged.
    pub slots_fetched: usize,
    /// First unavailable slot, if the scan stopped early.
    pub horizon: Option<SlotId>,
    /// Feed channels ignored because of the allow-list.
    pub skipped_channels: BTreeSet<String>,
    /// Per-program counts.
    pub programs: BatchReport,
}

/// Drives a synchronization run against a feed.
#[derive(Debug)]
pub struct SyncEngine<'a, A> {
    api: &'a A,
    options: &'a SyncOptions,
    logos: Option<LogoCache>,
}

impl<'a, A: LocalFeedApi> SyncEngine<'a, A> {
    /// Creates an engine that does not fetch logos.
    #[must_use]
    pub const fn new(api: &'a A, options: &'a SyncOptions) -> Self {
        Self {
            api,
            options,
            logos: None,
        }
    }

    /// Resolves the logo of every channel seen in the feed into `cache`.
    #[must_use]
    pub fn with_logos(mut self, cache: LogoCache) -> Self {
        self.logos = Some(cache);
        self
    }

    /// Logo cache, if logos are enabled.
    #[must_use]
    pub const fn logos(&self) -> Option<&LogoCache> {
        self.logos.as_ref()
    }

    /// Consumes the engine, returning the logo cache.
    #[must_use]
    pub fn into_logos(self) -> Option<LogoCache> {
        self.logos
    }

    /// Scans the slots of `plan` in order and merges them into `store`.
    ///
    /// Stops at the first unavailable slot; everything merged so far is
    /// kept and the run still succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error on a transport failure or an undecodable slot
    /// document. The store may then hold a partial merge and must not be
    /// saved.
    #[instrument(skip_all, fields(first_day = %plan.first_day, days = plan.days))]
    pub async fn run(&mut self, store: &mut ProgramStore, plan: &GrabPlan) -> Result<RunReport> {
        let mut report = RunReport::default();

        for slot in plan.slots() {
            let response = self
                .api
                .fetch_slot(slot)
                .await
                .with_context(|| format!("basic feed transport failure on slot {slot}"))?;

            match response {
                SlotResponse::Unavailable { status } => {
                    info!(%slot, status, "slot unavailable, stopping scan");
                    report.horizon = Some(slot);
                    break;
                }
                SlotResponse::Available(feed) => {
                    report.slots_fetched = report.slots_fetched.saturating_add(1);
                    self.sync_slot(store, slot, feed, &mut report).await;
                }
            }
        }

        info!(
            slots = report.slots_fetched,
            horizon = ?report.horizon.map(|slot| slot.to_string()),
            new = report.programs.new,
            unchanged = report.programs.unchanged,
            changed = report.programs.changed,
            malformed = report.programs.malformed,
            enriched = report.programs.enriched,
            skipped_channels = report.skipped_channels.len(),
            "sync finished"
        );
        Ok(report)
    }

    async fn sync_slot(
        &mut self,
        store: &mut ProgramStore,
        slot: SlotId,
        feed: BasicFeed,
        report: &mut RunReport,
    ) {
        for (channel, entries) in feed.channels {
            if !self.options.channels.allows(&channel) {
                debug!(%slot, channel = %channel, "channel not in allow-list");
                report.skipped_channels.insert(channel);
                continue;
            }

            if let Some(logos) = self.logos.as_mut() {
                logos.resolve(self.api, &channel).await;
            }

            let batch = self.sync_batch(store, &channel, &entries).await;
            debug!(
                %slot,
                channel = %channel,
                new = batch.new,
                unchanged = batch.unchanged,
                changed = batch.changed,
                malformed = batch.malformed,
                "merged batch"
            );
            report.programs.absorb(&batch);
        }
    }

    /// Reconciles one channel's entries of one slot against `store`, in
    /// upstream order.
    ///
    /// The channel gets a store entry even when every entry is skipped.
    pub async fn sync_batch(
        &self,
        store: &mut ProgramStore,
        channel: &str,
        entries: &[BasicEntry],
    ) -> BatchReport {
        let mut report = BatchReport::default();
        store.ensure_channel(channel);

        for entry in entries {
            let candidate = match map_entry(channel, entry, self.options.timezone) {
                Ok(candidate) => candidate,
                Err(e) => {
                    warn!(
                        channel,
                        program_id = entry.id.as_deref().unwrap_or_default(),
                        error = %e,
                        "skipping malformed entry"
                    );
                    report.malformed = report.malformed.saturating_add(1);
                    continue;
                }
            };

            match classify(store.get(channel, &candidate.id), &candidate) {
                Decision::Unchanged => {
                    if let Some(stored) = store.get_mut(channel, &candidate.id) {
                        stored.grabbed = true;
                    }
                    report.unchanged = report.unchanged.saturating_add(1);
                    continue;
                }
                Decision::Changed => {
                    debug!(channel, program_id = %candidate.id, "program changed, replacing");
                    store.remove(channel, &candidate.id);
                    report.changed = report.changed.saturating_add(1);
                }
                Decision::New => {
                    report.new = report.new.saturating_add(1);
                }
            }

            let mut program = candidate;
            if self.options.grab_details {
                match enrich(self.api, &mut program).await {
                    Enrichment::Applied => {
                        report.enriched = report.enriched.saturating_add(1);
                    }
                    Enrichment::Unavailable => {
                        report.enrichment_unavailable =
                            report.enrichment_unavailable.saturating_add(1);
                    }
                }
            }
            store.insert(program);
        }

        report
    }
}
