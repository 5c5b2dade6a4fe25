//! HTTP handlers organized by domain

pub mod health;
pub mod language;
pub mod marketing;
