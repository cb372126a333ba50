//! Program guide data model.

use std::collections::BTreeMap;
use std::fmt;

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Text form of a programme timestamp: `YYYYMMDDHHMMSS ±HHMM`.
pub const GUIDE_TIME_FORMAT: &str = "%Y%m%d%H%M%S %z";

/// Zoned programme timestamp.
///
/// Two values are equal only when both the instant and the UTC offset
/// match, i.e. when their text forms are identical.
#[derive(Debug, Clone, Copy)]
pub struct GuideTime(DateTime<FixedOffset>);

impl GuideTime {
    /// Wraps a zoned timestamp.
    #[must_use]
    pub const fn new(datetime: DateTime<FixedOffset>) -> Self {
        Self(datetime)
    }

    /// Converts upstream epoch seconds to a timestamp in `timezone`.
    ///
    /// Returns `None` if the value is outside the representable range.
    #[must_use]
    pub fn from_epoch(secs: i64, timezone: Tz) -> Option<Self> {
        timezone
            .timestamp_opt(secs, 0)
            .single()
            .map(|datetime| Self(datetime.fixed_offset()))
    }

    /// Parses the text form produced by `Display`.
    ///
    /// # Errors
    ///
    /// Returns an error if `s` is not in `YYYYMMDDHHMMSS ±HHMM` form.
    pub fn parse(s: &str) -> Result<Self> {
        let raw_result = DateTime::parse_from_str(s, GUIDE_TIME_FORMAT);
        raw_result
            .map(Self)
            .with_context(|| format!("invalid guide timestamp: {s}"))
    }

    /// Returns the underlying timestamp.
    #[must_use]
    pub const fn as_datetime(&self) -> &DateTime<FixedOffset> {
        &self.0
    }

    /// Calendar date in the timestamp's own offset.
    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.0.date_naive()
    }
}

impl PartialEq for GuideTime {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0 && self.0.offset() == other.0.offset()
    }
}

impl Eq for GuideTime {}

impl fmt::Display for GuideTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(GUIDE_TIME_FORMAT))
    }
}

/// Credited role, declared in XMLTV rendering order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreditRole {
    /// Director.
    Director,
    /// Actor.
    Actor,
    /// Presenter.
    Presenter,
    /// Commentator.
    Commentator,
}

impl CreditRole {
    /// All roles in rendering order.
    pub const ALL: [Self; 4] = [
        Self::Director,
        Self::Actor,
        Self::Presenter,
        Self::Commentator,
    ];

    /// XMLTV element name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Director => "director",
            Self::Actor => "actor",
            Self::Presenter => "presenter",
            Self::Commentator => "commentator",
        }
    }
}

/// Credited people per role; iterates in rendering order.
pub type Credits = BTreeMap<CreditRole, Vec<String>>;

/// One broadcast occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    /// Upstream program id, unique within the channel.
    pub id: String,
    /// Channel id.
    pub channel: String,
    /// Start time.
    pub start: GuideTime,
    /// Stop time.
    pub stop: GuideTime,
    /// Title.
    pub title: String,
    /// Episode title.
    pub subtitle: Option<String>,
    /// Long description.
    pub description: Option<String>,
    /// Credited people; never an empty map.
    pub credits: Option<Credits>,
    /// Genres; never an empty list.
    pub categories: Option<Vec<String>>,
    /// Aspect ratio.
    pub aspect_ratio: Option<String>,
    /// Seen in the feed during the current run. Not persisted.
    pub grabbed: bool,
}

impl Program {
    /// Creates a program with basic fields only.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        channel: impl Into<String>,
        start: GuideTime,
        stop: GuideTime,
        title: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            channel: channel.into(),
            start,
            stop,
            title: title.into(),
            subtitle: None,
            description: None,
            credits: None,
            categories: None,
            aspect_ratio: None,
            grabbed: false,
        }
    }

    /// Whether `start`, `stop` and `title` all match `other`.
    #[must_use]
    pub fn same_schedule(&self, other: &Self) -> bool {
        self.start == other.start && self.stop == other.stop && self.title == other.title
    }
}
