//! Utility modules for the language-pack service
//!
//! This module contains reusable utilities that can be used
//! across different parts of the system.

pub mod decompression;
pub mod datetime;

// Re-export commonly used types for convenience
pub use datetime::DateTimeParser;
pub use decompression::{CompressionFormat, DecompressionService};
