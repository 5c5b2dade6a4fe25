//! Language-pack mirror and lookup service
//!
//! Mirrors `.csv`/`.gz` language tables from a remote asset store into a
//! local directory, merges them into one phone-to-language table per
//! request and serves lookups over HTTP. Also accepts consent, feedback and
//! message-tracking webhooks and upserts them into marketing cloud data
//! extensions using a cached bearer token.

pub mod assets;
pub mod config;
pub mod errors;
pub mod language;
pub mod marketing;
pub mod mirror;
pub mod state;
pub mod utils;
pub mod web;
