//! Core error types

use thiserror::Error;

/// An observed move could not be replayed on the tracked position.
///
/// Fatal to the session: once the replica disagrees with the real game every
/// later decision would be made against the wrong board.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrackerError {
    #[error("Invalid move notation '{0}'")]
    InvalidNotation(String),

    #[error("Illegal move '{notation}' in position {fen}")]
    IllegalMove { notation: String, fen: String },

    #[error("Move '{notation}' reported for the wrong side")]
    WrongSide { notation: String },
}

/// Book or engine service failure. Recovered as "no recommendation".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("{service} request failed: {message}")]
    Http {
        service: &'static str,
        message: String,
    },

    #[error("{service} returned HTTP {status}")]
    Status { service: &'static str, status: u16 },

    #[error("{service} returned a malformed response: {message}")]
    Malformed {
        service: &'static str,
        message: String,
    },

    #[error("{service} timed out")]
    Timeout { service: &'static str },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Timer duration {0}s is outside 0..=20")]
    DurationOutOfRange(u32),
}
