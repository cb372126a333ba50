//! EPG feed server client module.
//!
//! Handles HTTP requests to the `/epgdata` tree of the feed server and
//! decodes the gzip-compressed slot documents and the program details.

mod api;
mod client;
mod json;
mod params;
mod types;

#[allow(clippy::module_name_repetitions)]
pub use api::{FeedApi, LocalFeedApi};
#[allow(clippy::module_name_repetitions)]
pub use client::{FeedClient, FeedClientBuilder};
pub use params::{SlotId, detail_key};
pub use types::{BasicEntry, BasicFeed, ProgramDetail, SlotResponse};
