//! Centralized error handling for the playlist and guide loader
//!
//! # Error Categories
//!
//! - **Retrieval Errors**: every fetch avenue (direct, cached proxy, proxy list)
//!   exhausted across all retry rounds
//! - **Playlist Errors**: missing header, empty body or zero usable entries
//! - **Guide Errors**: non-XML input or an unrecoverable structural parse;
//!   these never fail a load, the program set degrades to empty instead
//! - **Entry Rejections**: a single malformed playlist line or guide entry,
//!   dropped and logged as a diagnostic only
//!
//! # Usage
//!
//! ```rust
//! use m3u_guide::errors::{AppError, AppResult};
//!
//! fn example_function() -> AppResult<String> {
//!     Ok("success".to_string())
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for fetch Results
pub type FetchResult<T> = Result<T, FetchError>;
