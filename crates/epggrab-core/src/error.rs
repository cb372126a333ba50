//! Feed entry mapping errors.

/// Reason a basic feed entry cannot become a program.
///
/// Only the offending entry is skipped; the rest of its batch is processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedEntry {
    /// A required field is absent, empty or of the wrong type.
    MissingField(&'static str),
    /// Epoch seconds outside the representable range.
    InvalidTimestamp(i64),
    /// `start` is not before `end`.
    EmptyInterval {
        /// Start (epoch seconds).
        start: i64,
        /// End (epoch seconds).
        end: i64,
    },
}

impl std::fmt::Display for MalformedEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingField(field) => write!(f, "missing required field `{field}`"),
            Self::InvalidTimestamp(secs) => write!(f, "timestamp out of range: {secs}"),
            Self::EmptyInterval { start, end } => {
                write!(f, "start {start} is not before end {end}")
            }
        }
    }
}

impl std::error::Error for MalformedEntry {}
