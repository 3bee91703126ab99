//! # Malsim IO
//!
//! Persistence and output for the malsim engine: the binary checkpoint
//! stream, the tab-separated survey output and scenario file loading.

/// Binary checkpoint stream with header validation
pub mod checkpoint;
/// Structured error handling for I/O operations
pub mod error;
/// Survey output writing and comparison
pub mod output;
/// Scenario file loading
pub mod scenario;

pub use error::{IoError, Result};
