//! Service-level error types.

use crate::difficulty::CalcError;
use thiserror::Error;

/// Failure to obtain a beatmap file.
#[derive(Error, Debug, Clone)]
pub enum FetchError {
    /// The download endpoint could not be reached or answered with an error.
    #[error("download of beatmap {beatmap_id} failed: {reason}")]
    Download { beatmap_id: u32, reason: String },

    /// The beatmap exists but has no content.
    #[error("retrieved zero-length beatmap ({0})")]
    Empty(u32),

    /// Reading the local copy failed.
    #[error("reading beatmap {beatmap_id} from disk failed: {reason}")]
    Io { beatmap_id: u32, reason: String },
}

/// Error surfaced by the difficulty lookups.
///
/// Cloneable so that one failed computation can be handed to every caller
/// waiting on it.
#[derive(Error, Debug, Clone)]
pub enum DifficultyError {
    #[error("unknown ruleset: {0}")]
    UnknownRuleset(i32),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Calculation(#[from] CalcError),
}
