//! Difficulty attributes and their calculators.
//!
//! Calculation itself is delegated to rosu-pp (see [`builtin`]). This module
//! owns the ruleset-specific attribute shapes and the flat
//! `(attribute id, value)` form they take in the database.
//!
//! ## Persisted attribute ids
//!
//! Each shape writes only the ids it has. Hit-object counts of the osu shape
//! are never written: they are re-derived from the beatmap itself, see
//! [`metadata::BeatmapMetadata`].

pub mod builtin;
pub mod calculator;
pub mod metadata;
pub mod registry;

pub use calculator::{CalcError, DifficultyCalculator};
pub use metadata::BeatmapMetadata;
pub use registry::RulesetRegistry;

use serde::Serialize;
use std::collections::HashMap;

use crate::request::Ruleset;

pub const ATTRIB_ID_AIM: u16 = 1;
pub const ATTRIB_ID_SPEED: u16 = 3;
pub const ATTRIB_ID_APPROACH_RATE: u16 = 7;
pub const ATTRIB_ID_MAX_COMBO: u16 = 9;
pub const ATTRIB_ID_DIFFICULTY: u16 = 11;
pub const ATTRIB_ID_FLASHLIGHT: u16 = 17;
pub const ATTRIB_ID_SLIDER_FACTOR: u16 = 19;
pub const ATTRIB_ID_SPEED_NOTE_COUNT: u16 = 21;
pub const ATTRIB_ID_SPEED_DIFFICULT_STRAIN_COUNT: u16 = 23;
pub const ATTRIB_ID_AIM_DIFFICULT_STRAIN_COUNT: u16 = 25;
pub const ATTRIB_ID_STAMINA: u16 = 101;
pub const ATTRIB_ID_RHYTHM: u16 = 103;
pub const ATTRIB_ID_COLOUR: u16 = 105;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OsuAttributes {
    pub star_rating: f64,
    pub max_combo: u32,
    pub aim_difficulty: f64,
    pub speed_difficulty: f64,
    pub speed_note_count: f64,
    pub flashlight_difficulty: f64,
    pub slider_factor: f64,
    pub aim_difficult_strain_count: f64,
    pub speed_difficult_strain_count: f64,
    pub approach_rate: f64,
    pub hit_circle_count: u32,
    pub slider_count: u32,
    pub spinner_count: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaikoAttributes {
    pub star_rating: f64,
    pub max_combo: u32,
    pub stamina_difficulty: f64,
    pub rhythm_difficulty: f64,
    pub colour_difficulty: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CatchAttributes {
    pub star_rating: f64,
    pub max_combo: u32,
    pub approach_rate: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ManiaAttributes {
    pub star_rating: f64,
    pub max_combo: u32,
}

/// Placeholder answer for requests that cannot identify a beatmap.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UnknownAttributes {
    pub star_rating: f64,
    pub max_combo: u32,
}

/// Computed difficulty of one beatmap under one ruleset and mod set.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DifficultyAttributes {
    Osu(OsuAttributes),
    Taiko(TaikoAttributes),
    Catch(CatchAttributes),
    Mania(ManiaAttributes),
    Unknown(UnknownAttributes),
}

impl DifficultyAttributes {
    /// The "difficulty unknown" sentinel: zero stars, no attributes.
    pub fn unknown() -> Self {
        DifficultyAttributes::Unknown(UnknownAttributes::default())
    }

    #[cfg(test)]
    pub fn is_unknown(&self) -> bool {
        matches!(self, DifficultyAttributes::Unknown(_))
    }

    pub fn star_rating(&self) -> f64 {
        match self {
            DifficultyAttributes::Osu(a) => a.star_rating,
            DifficultyAttributes::Taiko(a) => a.star_rating,
            DifficultyAttributes::Catch(a) => a.star_rating,
            DifficultyAttributes::Mania(a) => a.star_rating,
            DifficultyAttributes::Unknown(a) => a.star_rating,
        }
    }

    #[cfg(test)]
    pub fn max_combo(&self) -> u32 {
        match self {
            DifficultyAttributes::Osu(a) => a.max_combo,
            DifficultyAttributes::Taiko(a) => a.max_combo,
            DifficultyAttributes::Catch(a) => a.max_combo,
            DifficultyAttributes::Mania(a) => a.max_combo,
            DifficultyAttributes::Unknown(a) => a.max_combo,
        }
    }

    #[cfg(test)]
    pub fn ruleset(&self) -> Option<Ruleset> {
        match self {
            DifficultyAttributes::Osu(_) => Some(Ruleset::Osu),
            DifficultyAttributes::Taiko(_) => Some(Ruleset::Taiko),
            DifficultyAttributes::Catch(_) => Some(Ruleset::Catch),
            DifficultyAttributes::Mania(_) => Some(Ruleset::Mania),
            DifficultyAttributes::Unknown(_) => None,
        }
    }

    /// Flattens the attributes into persisted `(attribute id, value)` pairs.
    pub fn to_database_attributes(&self) -> Vec<(u16, f64)> {
        match self {
            DifficultyAttributes::Osu(a) => {
                let mut attributes = vec![
                    (ATTRIB_ID_AIM, a.aim_difficulty),
                    (ATTRIB_ID_SPEED, a.speed_difficulty),
                    (ATTRIB_ID_APPROACH_RATE, a.approach_rate),
                    (ATTRIB_ID_MAX_COMBO, a.max_combo as f64),
                    (ATTRIB_ID_DIFFICULTY, a.star_rating),
                    (ATTRIB_ID_SLIDER_FACTOR, a.slider_factor),
                    (ATTRIB_ID_SPEED_NOTE_COUNT, a.speed_note_count),
                    (ATTRIB_ID_SPEED_DIFFICULT_STRAIN_COUNT, a.speed_difficult_strain_count),
                    (ATTRIB_ID_AIM_DIFFICULT_STRAIN_COUNT, a.aim_difficult_strain_count),
                ];
                if a.flashlight_difficulty > 0.0 {
                    attributes.push((ATTRIB_ID_FLASHLIGHT, a.flashlight_difficulty));
                }
                attributes
            }
            DifficultyAttributes::Taiko(a) => vec![
                (ATTRIB_ID_MAX_COMBO, a.max_combo as f64),
                (ATTRIB_ID_DIFFICULTY, a.star_rating),
                (ATTRIB_ID_STAMINA, a.stamina_difficulty),
                (ATTRIB_ID_RHYTHM, a.rhythm_difficulty),
                (ATTRIB_ID_COLOUR, a.colour_difficulty),
            ],
            DifficultyAttributes::Catch(a) => vec![
                (ATTRIB_ID_APPROACH_RATE, a.approach_rate),
                (ATTRIB_ID_MAX_COMBO, a.max_combo as f64),
                (ATTRIB_ID_DIFFICULTY, a.star_rating),
            ],
            DifficultyAttributes::Mania(a) => vec![
                (ATTRIB_ID_MAX_COMBO, a.max_combo as f64),
                (ATTRIB_ID_DIFFICULTY, a.star_rating),
            ],
            DifficultyAttributes::Unknown(_) => Vec::new(),
        }
    }

    /// Rebuilds attributes from persisted values.
    ///
    /// `metadata` is required for the osu shape, whose object counts are not
    /// persisted. Missing ids read as zero.
    pub fn from_database_attributes(
        ruleset: Ruleset,
        values: &HashMap<u16, f64>,
        metadata: Option<&BeatmapMetadata>,
    ) -> Result<Self, CalcError> {
        let get = |id: u16| values.get(&id).copied().unwrap_or(0.0);
        let max_combo = get(ATTRIB_ID_MAX_COMBO).round().max(0.0) as u32;

        let attributes = match ruleset {
            Ruleset::Osu => {
                let metadata = metadata.ok_or_else(|| {
                    CalcError::InvalidBeatmap("beatmap metadata required for osu attributes".into())
                })?;
                DifficultyAttributes::Osu(OsuAttributes {
                    star_rating: get(ATTRIB_ID_DIFFICULTY),
                    max_combo,
                    aim_difficulty: get(ATTRIB_ID_AIM),
                    speed_difficulty: get(ATTRIB_ID_SPEED),
                    speed_note_count: get(ATTRIB_ID_SPEED_NOTE_COUNT),
                    flashlight_difficulty: get(ATTRIB_ID_FLASHLIGHT),
                    slider_factor: get(ATTRIB_ID_SLIDER_FACTOR),
                    aim_difficult_strain_count: get(ATTRIB_ID_AIM_DIFFICULT_STRAIN_COUNT),
                    speed_difficult_strain_count: get(ATTRIB_ID_SPEED_DIFFICULT_STRAIN_COUNT),
                    approach_rate: get(ATTRIB_ID_APPROACH_RATE),
                    hit_circle_count: metadata.circle_count,
                    slider_count: metadata.slider_count,
                    spinner_count: metadata.spinner_count,
                })
            }
            Ruleset::Taiko => DifficultyAttributes::Taiko(TaikoAttributes {
                star_rating: get(ATTRIB_ID_DIFFICULTY),
                max_combo,
                stamina_difficulty: get(ATTRIB_ID_STAMINA),
                rhythm_difficulty: get(ATTRIB_ID_RHYTHM),
                colour_difficulty: get(ATTRIB_ID_COLOUR),
            }),
            Ruleset::Catch => DifficultyAttributes::Catch(CatchAttributes {
                star_rating: get(ATTRIB_ID_DIFFICULTY),
                max_combo,
                approach_rate: get(ATTRIB_ID_APPROACH_RATE),
            }),
            Ruleset::Mania => DifficultyAttributes::Mania(ManiaAttributes {
                star_rating: get(ATTRIB_ID_DIFFICULTY),
                max_combo,
            }),
        };

        Ok(attributes)
    }
}

/// Whether rebuilding persisted attributes of this ruleset needs the beatmap.
pub fn needs_metadata(ruleset: Ruleset) -> bool {
    ruleset == Ruleset::Osu
}
