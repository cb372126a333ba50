//! HTTP client library for epggrab.
//!
//! Provides the client for the EPG feed server: per-slot basic program
//! documents, per-program detail documents and channel logos.

/// EPG feed server client.
pub mod feed;
