//! Incremental EPG synchronization for epggrab.
//!
//! Keeps a per-channel program store in step with the upstream feed:
//! decides for every announced program whether it is new, unchanged or
//! changed, fetches details only for new and changed programs, and prunes
//! programs the feed stopped announcing. Also renders the store as XMLTV.

/// Channel allow-list and display names.
pub mod channels;
/// Program detail enrichment.
pub mod enrich;
/// Feed entry mapping errors.
pub mod error;
/// Channel logo retrieval.
pub mod logos;
/// Program data model.
pub mod model;
/// In-memory program store.
pub mod store;
/// Synchronization engine.
pub mod sync;
/// XMLTV rendering.
pub mod xmltv;

#[cfg(test)]
mod testing;

pub use channels::ChannelMap;
pub use enrich::{Enrichment, apply_detail, enrich};
pub use error::MalformedEntry;
pub use logos::LogoCache;
pub use model::{CreditRole, Credits, GuideTime, Program};
pub use store::{LoadSummary, ProgramStore};
pub use sync::{BatchReport, Decision, GrabPlan, RunReport, SyncEngine, SyncOptions};
pub use xmltv::{GuideOptions, render_guide, write_guide};
