//! Caller-facing data types: band records, identifiers, and settings.

pub mod models;
pub mod settings;
