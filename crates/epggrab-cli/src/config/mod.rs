//! Application configuration module.
//!
//! Manages the TOML config file: feed server, grab window, logos, output
//! and the channel allow-list.

#[allow(clippy::module_inception)]
mod config;

#[allow(clippy::module_name_repetitions)]
pub use config::AppConfig;
