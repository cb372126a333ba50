//! Feed server document types.

use std::collections::BTreeMap;

use serde::Deserialize;

use super::json::{
    empty_string_as_none, lenient_entries, lenient_epoch, lenient_string, lenient_string_list,
};

/// One program occurrence announced by a slot document.
///
/// Every field is optional at this layer. An entry lacking a required
/// field is rejected on its own when mapped to a program; the rest of the
/// document is unaffected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BasicEntry {
    /// Program id.
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    /// Start time (epoch seconds).
    #[serde(default, deserialize_with = "lenient_epoch")]
    pub start: Option<i64>,
    /// End time (epoch seconds).
    #[serde(default, alias = "stop", deserialize_with = "lenient_epoch")]
    pub end: Option<i64>,
    /// Program title.
    #[serde(default, alias = "title", deserialize_with = "lenient_string")]
    pub name: Option<String>,
}

/// Decoded slot document: channel id → entries in upstream order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct BasicFeed {
    /// Entries per channel. Items that are not objects decode as empty
    /// entries and are rejected one by one when mapped.
    #[serde(deserialize_with = "lenient_entries")]
    pub channels: BTreeMap<String, Vec<BasicEntry>>,
}

/// Outcome of a slot request that reached the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotResponse {
    /// Slot document fetched and decoded.
    Available(BasicFeed),
    /// Non-success HTTP status: the server publishes nothing past this slot.
    Unavailable {
        /// HTTP status code.
        status: u16,
    },
}

/// Program detail document.
///
/// Every field is optional; empty strings are read as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProgramDetail {
    /// Episode title.
    #[serde(
        rename = "episodeTitle",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    pub episode_title: Option<String>,
    /// Long description.
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub description: Option<String>,
    /// Actors.
    #[serde(default, deserialize_with = "lenient_string_list")]
    pub actors: Option<Vec<String>>,
    /// Directors.
    #[serde(default, deserialize_with = "lenient_string_list")]
    pub directors: Option<Vec<String>>,
    /// Presenters.
    #[serde(default, deserialize_with = "lenient_string_list")]
    pub presenters: Option<Vec<String>>,
    /// Commentators.
    #[serde(default, deserialize_with = "lenient_string_list")]
    pub commentators: Option<Vec<String>>,
    /// Genres.
    #[serde(default, deserialize_with = "lenient_string_list")]
    pub genres: Option<Vec<String>>,
    /// Aspect ratio, e.g. `"16:9"`.
    #[serde(
        rename = "aspectratio",
        default,
        deserialize_with = "empty_string_as_none"
    )]
    pub aspect_ratio: Option<String>,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::indexing_slicing)]

    use super::*;

    #[test]
    fn test_parse_basic_feed() {
        // Arrange
        let json = r#"{
            "npo1": [
                {"id": "P1", "start": 1704103200, "end": 1704106800, "name": "Journaal"},
                {"id": "P2", "start": 1704106800, "end": 1704110400, "name": "Weer"}
            ],
            "npo2": []
        }"#;

        // Act
        let feed: BasicFeed = serde_json::from_str(json).unwrap();

        // Assert
        assert_eq!(feed.channels.len(), 2);
        let npo1 = &feed.channels["npo1"];
        assert_eq!(npo1.len(), 2);
        assert_eq!(npo1[0].id.as_deref(), Some("P1"));
        assert_eq!(npo1[0].start, Some(1_704_103_200));
        assert_eq!(npo1[0].end, Some(1_704_106_800));
        assert_eq!(npo1[1].name.as_deref(), Some("Weer"));
        assert!(feed.channels["npo2"].is_empty());
    }

    #[test]
    fn test_parse_basic_feed_with_non_object_items() {
        // Arrange
        let json = r#"{
            "npo1": [
                {"id": "P1", "start": 1704103200, "end": 1704106800, "name": "Journaal"},
                null,
                42
            ],
            "npo2": [
                {"id": "P9", "start": 1704103200, "end": 1704106800, "name": "Sport"}
            ]
        }"#;

        // Act
        let feed: BasicFeed = serde_json::from_str(json).unwrap();

        // Assert: bad items stay in place as empty entries
        let npo1 = &feed.channels["npo1"];
        assert_eq!(npo1.len(), 3);
        assert_eq!(npo1[0].id.as_deref(), Some("P1"));
        assert_eq!(npo1[1], BasicEntry::default());
        assert_eq!(npo1[2], BasicEntry::default());
        assert_eq!(feed.channels["npo2"][0].name.as_deref(), Some("Sport"));
    }

    #[test]
    fn test_parse_entry_missing_name() {
        // Arrange: upstream omits `name` for programs it has no data for yet
        let json = r#"{"id": "P1", "start": 1, "end": 2}"#;

        // Act
        let entry: BasicEntry = serde_json::from_str(json).unwrap();

        // Assert
        assert_eq!(entry.name, None);
        assert_eq!(entry.id.as_deref(), Some("P1"));
    }

    #[test]
    fn test_parse_entry_with_aliases() {
        // Arrange
        let json = r#"{"id": 42, "start": "100", "stop": 200, "title": "News"}"#;

        // Act
        let entry: BasicEntry = serde_json::from_str(json).unwrap();

        // Assert
        assert_eq!(entry.id.as_deref(), Some("42"));
        assert_eq!(entry.start, Some(100));
        assert_eq!(entry.end, Some(200));
        assert_eq!(entry.name.as_deref(), Some("News"));
    }

    #[test]
    fn test_parse_full_detail() {
        // Arrange
        let json = r#"{
            "episodeTitle": "De aanslag",
            "description": "Spannende aflevering.",
            "actors": ["Ann", "Bob"],
            "directors": ["Carl"],
            "presenters": [],
            "genres": ["Drama", "Serie"],
            "aspectratio": "16:9",
            "nicamWarning": [1, 2]
        }"#;

        // Act
        let detail: ProgramDetail = serde_json::from_str(json).unwrap();

        // Assert
        assert_eq!(detail.episode_title.as_deref(), Some("De aanslag"));
        assert_eq!(detail.description.as_deref(), Some("Spannende aflevering."));
        assert_eq!(detail.actors.unwrap().len(), 2);
        assert_eq!(detail.directors, Some(vec![String::from("Carl")]));
        assert_eq!(detail.presenters, Some(Vec::new()));
        assert_eq!(detail.commentators, None);
        assert_eq!(detail.aspect_ratio.as_deref(), Some("16:9"));
    }

    #[test]
    fn test_parse_empty_detail_fields_as_none() {
        // Arrange
        let json = r#"{"episodeTitle": "", "description": null, "aspectratio": ""}"#;

        // Act
        let detail: ProgramDetail = serde_json::from_str(json).unwrap();

        // Assert
        assert_eq!(detail, ProgramDetail::default());
    }
}
