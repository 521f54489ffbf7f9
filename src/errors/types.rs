//! Error type definitions for the playlist and guide loader

use std::fmt;

use thiserror::Error;

/// Top-level application error type
///
/// Only the playlist side of a load can produce one of these; guide failures
/// are swallowed by the loader.
#[derive(Error, Debug)]
pub enum AppError {
    /// The playlist could not be loaded after every whole-pipeline retry
    #[error("Unable to load channels after {attempts} attempts: {last_error}")]
    PlaylistUnavailable { attempts: u32, last_error: String },

    /// Retrieval errors
    #[error("Retrieval error: {0}")]
    Retrieval(#[from] FetchError),

    /// Playlist format errors
    #[error("Playlist error: {0}")]
    Playlist(#[from] PlaylistError),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// The load sequence was cancelled by its owner
    #[error("Load cancelled")]
    Cancelled,
}

/// Retrieval failure signalled by the resilient fetcher
///
/// Whether the direct request or the proxies were blocked is deliberately not
/// preserved here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Direct, cached-proxy and listed-proxy attempts all failed in every round
    #[error("Failed to fetch {url} after {rounds} rounds")]
    Exhausted { url: String, rounds: u32 },

    /// The fetch was cancelled mid-flight
    #[error("Fetch cancelled: {url}")]
    Cancelled { url: String },
}

/// Playlist format failures, fatal to a single load attempt
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlaylistError {
    /// Body was empty or whitespace only
    #[error("Empty M3U file received")]
    Empty,

    /// The `#EXTM3U` marker is absent
    #[error("Invalid M3U format: missing #EXTM3U header")]
    MissingHeader,

    /// Every entry was rejected
    #[error("No valid channels found in M3U file")]
    NoChannels,
}

/// Guide parsing failures; never propagated past the guide parser
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GuideError {
    /// Neither an XML declaration nor a `tv` root tag is present
    #[error("Invalid XML structure")]
    NotXml,

    /// Structural parse failed on every attempt
    #[error("Failed to parse XML after {attempts} attempts: {message}")]
    Structure { attempts: u32, message: String },

    /// Parse was cancelled while waiting between attempts
    #[error("Guide parse cancelled")]
    Cancelled,
}

/// Errors that can occur while parsing guide timestamps
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DateTimeError {
    /// Empty input
    #[error("Empty date string")]
    Empty,

    /// Invalid datetime format provided
    #[error("Invalid date format: '{input}'")]
    InvalidFormat { input: String },

    /// Digits matched the fixed-width pattern but do not form a real date
    #[error("Invalid date components: '{input}'")]
    InvalidComponents { input: String },

    /// Offset arithmetic left the representable range
    #[error("Date out of range: {input}")]
    OutOfRange { input: String },
}

/// Why a single playlist line or guide entry was dropped
///
/// These are diagnostics, not errors: they are logged at debug level and the
/// surrounding parse continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryRejection {
    /// `#EXTINF` line whose attribute section could not be parsed
    MalformedMetadata { line: usize },
    /// Stream line that failed URL validation
    InvalidUrl { line: usize, reason: String },
    /// Guide entry lacking `start`, `stop` or `channel`
    MissingAttribute { attribute: &'static str },
    /// Guide entry whose timestamp would not parse
    InvalidTime { attribute: &'static str, error: DateTimeError },
    /// Guide entry with `stop <= start`
    NonPositiveDuration,
    /// Guide entry outside the one-year window around parse time
    OutOfWindow,
    /// Guide entry with an empty title
    EmptyTitle,
}

impl fmt::Display for EntryRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedMetadata { line } => write!(f, "malformed EXTINF metadata at line {line}"),
            Self::InvalidUrl { line, reason } => write!(f, "invalid stream URL at line {line}: {reason}"),
            Self::MissingAttribute { attribute } => write!(f, "missing required attribute '{attribute}'"),
            Self::InvalidTime { attribute, error } => write!(f, "invalid '{attribute}' time: {error}"),
            Self::NonPositiveDuration => f.write_str("stop time is not after start time"),
            Self::OutOfWindow => f.write_str("programme outside the one-year window"),
            Self::EmptyTitle => f.write_str("empty title"),
        }
    }
}

/// Convenience methods for creating common error types
impl AppError {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Whether a user-facing retry affordance makes sense for this error
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::PlaylistUnavailable { .. } | Self::Retrieval(_) | Self::Playlist(_)
        )
    }
}

impl FetchError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}
