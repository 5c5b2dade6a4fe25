//! Centralized error handling for the language-pack service
//!
//! # Error Categories
//!
//! - **Sync Errors**: remote listing, download, decompression and mirror I/O
//! - **Merge Errors**: unreadable or malformed mirrored tabular files
//! - **Auth Errors**: client-credentials token exchange
//! - **Upsert Errors**: downstream data-extension row submission
//! - **State Errors**: durable instance-state persistence
//!
//! A phone number missing from the table is not an error; lookups resolve it
//! to the `not-found` sentinel.

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for mirror sync Results
pub type SyncResult<T> = Result<T, SyncError>;

/// Convenience type alias for token Results
pub type AuthResult<T> = Result<T, AuthError>;
