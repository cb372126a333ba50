//! Durable program snapshot.
//!
//! Uses `rusqlite` (bundled `SQLite`) to persist the program store between
//! runs. Every save overwrites the previous snapshot.

mod connection;
mod migrations;
/// Program store load and save.
pub mod snapshot;

#[allow(clippy::module_name_repetitions)]
pub use connection::{DB_FILE_NAME, open_db, resolve_data_dir};
pub use snapshot::{SaveSummary, load_snapshot, load_store, save_store};
