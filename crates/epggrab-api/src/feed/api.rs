//! `FeedApi` trait definition.
#![allow(clippy::future_not_send)]

use anyhow::Result;

use super::params::SlotId;
use super::types::{ProgramDetail, SlotResponse};

/// EPG feed server trait.
///
/// Abstracts feed operations for mock substitution in tests.
/// Uses `trait_variant::make` to generate a `Send`-bound async trait.
#[allow(clippy::module_name_repetitions)]
#[trait_variant::make(FeedApi: Send)]
pub trait LocalFeedApi {
    /// Fetches the basic program document of one time-slot.
    ///
    /// A non-success HTTP status is not an error: it is reported as
    /// [`SlotResponse::Unavailable`].
    ///
    /// # Errors
    ///
    /// Returns an error on a transport failure or if the document cannot
    /// be decompressed or decoded.
    async fn fetch_slot(&self, slot: SlotId) -> Result<SlotResponse>;

    /// Fetches the detail document of one program.
    ///
    /// Returns `Ok(None)` when the server answers with a non-success status.
    ///
    /// # Errors
    ///
    /// Returns an error if the request still fails after the retry, or if
    /// the document is not valid JSON.
    async fn fetch_detail(&self, program_id: &str) -> Result<Option<ProgramDetail>>;

    /// Fetches the PNG logo of one channel.
    ///
    /// Returns `Ok(None)` when the server answers with a non-success status.
    ///
    /// # Errors
    ///
    /// Returns an error if the request still fails after the retry.
    async fn fetch_logo(&self, channel: &str) -> Result<Option<Vec<u8>>>;
}
