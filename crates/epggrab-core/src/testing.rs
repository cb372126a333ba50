//! In-memory feed for engine tests.
#![allow(clippy::unwrap_used)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;

use anyhow::{Result, bail};
use epggrab_api::feed::{BasicEntry, BasicFeed, LocalFeedApi, ProgramDetail, SlotId, SlotResponse};

/// Scripted feed server.
///
/// Slots that were never added answer 404.
#[derive(Debug, Default)]
pub struct MockFeed {
    slots: BTreeMap<SlotId, SlotResponse>,
    broken_slot: Option<SlotId>,
    details: BTreeMap<String, ProgramDetail>,
    failing_details: BTreeSet<String>,
    logos: BTreeMap<String, Vec<u8>>,
    slot_log: Mutex<Vec<SlotId>>,
    detail_log: Mutex<Vec<String>>,
    logo_log: Mutex<Vec<String>>,
}

impl MockFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes `entries` for `channel` in `slot`.
    pub fn add_entries(&mut self, slot: SlotId, channel: &str, entries: Vec<BasicEntry>) {
        let response = self
            .slots
            .entry(slot)
            .or_insert_with(|| SlotResponse::Available(BasicFeed::default()));
        if let SlotResponse::Available(feed) = response {
            feed.channels
                .entry(channel.to_owned())
                .or_default()
                .extend(entries);
        }
    }

    /// Makes `slot` fail at the transport level.
    pub const fn break_slot(&mut self, slot: SlotId) {
        self.broken_slot = Some(slot);
    }

    pub fn add_detail(&mut self, program_id: &str, detail: ProgramDetail) {
        self.details.insert(program_id.to_owned(), detail);
    }

    /// Makes the detail request of `program_id` fail after its retry.
    pub fn fail_detail(&mut self, program_id: &str) {
        self.failing_details.insert(program_id.to_owned());
    }

    pub fn add_logo(&mut self, channel: &str, png: &[u8]) {
        self.logos.insert(channel.to_owned(), png.to_vec());
    }

    pub fn slot_requests(&self) -> Vec<SlotId> {
        self.slot_log.lock().unwrap().clone()
    }

    pub fn detail_requests(&self) -> Vec<String> {
        self.detail_log.lock().unwrap().clone()
    }

    pub fn logo_requests(&self) -> Vec<String> {
        self.logo_log.lock().unwrap().clone()
    }
}

impl LocalFeedApi for MockFeed {
    async fn fetch_slot(&self, slot: SlotId) -> Result<SlotResponse> {
        self.slot_log.lock().unwrap().push(slot);
        if self.broken_slot == Some(slot) {
            bail!("connection reset while fetching slot {slot}");
        }
        Ok(self
            .slots
            .get(&slot)
            .cloned()
            .unwrap_or(SlotResponse::Unavailable { status: 404 }))
    }

    async fn fetch_detail(&self, program_id: &str) -> Result<Option<ProgramDetail>> {
        self.detail_log.lock().unwrap().push(program_id.to_owned());
        if self.failing_details.contains(program_id) {
            bail!("connection refused while fetching detail {program_id}");
        }
        Ok(self.details.get(program_id).cloned())
    }

    async fn fetch_logo(&self, channel: &str) -> Result<Option<Vec<u8>>> {
        self.logo_log.lock().unwrap().push(channel.to_owned());
        Ok(self.logos.get(channel).cloned())
    }
}

/// Builds a complete basic entry.
pub fn entry(id: &str, start: i64, end: i64, name: &str) -> BasicEntry {
    BasicEntry {
        id: Some(id.to_owned()),
        start: Some(start),
        end: Some(end),
        name: Some(name.to_owned()),
    }
}
