//! Feed server request paths.

use std::fmt;

use chrono::NaiveDate;

/// One (day, time-slot) partition of the basic feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotId {
    /// Broadcast day.
    pub date: NaiveDate,
    /// Slot index within the day, starting at 0.
    pub slot: u8,
}

impl SlotId {
    /// Creates a new `SlotId`.
    #[must_use]
    pub const fn new(date: NaiveDate, slot: u8) -> Self {
        Self { date, slot }
    }

    /// Formats as the upstream file id.
    ///
    /// Example: `"20240101.3"`
    #[must_use]
    pub fn file_id(&self) -> String {
        format!("{}.{}", self.date.format("%Y%m%d"), self.slot)
    }

    /// Path of the slot document relative to the server root.
    pub(crate) fn path(&self) -> String {
        format!("epgdata/epgdata.{}.json.gz", self.file_id())
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_id())
    }
}

/// Returns the shard key the server files a program detail under: the
/// last two characters of the program id.
///
/// Ids shorter than two characters are their own key.
#[must_use]
pub fn detail_key(program_id: &str) -> &str {
    let start = program_id
        .char_indices()
        .rev()
        .nth(1)
        .map_or(0, |(index, _)| index);
    program_id.get(start..).unwrap_or(program_id)
}

/// Path of a program detail document relative to the server root.
pub(crate) fn detail_path(program_id: &str) -> String {
    format!("epgdata/{}/{program_id}.json", detail_key(program_id))
}

/// Path of a channel logo relative to the server root.
pub(crate) fn logo_path(channel: &str) -> String {
    format!("tvmenu/images/channels/{channel}.png")
}
