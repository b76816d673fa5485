//! Trait definition for difficulty calculators.
//!
//! One calculator exists per ruleset. The cache only ever talks to this trait,
//! so tests can register stubs in place of the rosu-pp backed ones.

use super::DifficultyAttributes;
use crate::beatmap::BeatmapFile;
use crate::request::{ModSet, Ruleset};
use std::fmt::Debug;
use thiserror::Error;

/// Error type for difficulty calculation failures.
#[derive(Error, Debug, Clone)]
pub enum CalcError {
    /// The beatmap data is invalid or missing.
    #[error("Invalid beatmap: {0}")]
    InvalidBeatmap(String),
    /// The beatmap cannot be played under the requested ruleset.
    #[error("Cannot convert beatmap to {0}")]
    Conversion(Ruleset),
    /// The calculator failed to compute the difficulty.
    #[error("Calculation failed: {0}")]
    CalculationFailed(String),
    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

/// Trait that all difficulty calculators must implement.
pub trait DifficultyCalculator: Send + Sync + Debug {
    /// Ruleset this calculator produces attributes for.
    fn ruleset(&self) -> Ruleset;

    /// Human-readable display name.
    fn display_name(&self) -> &str;

    /// Version string, logged alongside computations.
    fn version(&self) -> &str;

    /// Computes the full attribute set. CPU-bound; callers run it off the
    /// async workers.
    fn calculate(
        &self,
        beatmap: &BeatmapFile,
        mods: &ModSet,
    ) -> Result<DifficultyAttributes, CalcError>;

    /// Returns a full calculator ID including version.
    fn full_id(&self) -> String {
        format!("{}_{}", self.ruleset(), self.version())
    }
}
