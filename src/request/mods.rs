//! Modifier sets and their legacy bit encodings.
//!
//! Two encodings exist on purpose:
//! - [`ModSet::storage_bitmask`] is the lossy value used as part of the durable
//!   key. Only a fixed subset of acronyms map to bits, and the mapping must stay
//!   bit-for-bit compatible with rows written by older deployments.
//! - [`ModSet::legacy_bits`] is the richer value handed to the calculators.

use serde::Deserialize;
use std::collections::BTreeSet;
use std::fmt;

use super::Ruleset;

pub const NO_FAIL: u32 = 1 << 0;
pub const EASY: u32 = 1 << 1;
pub const HIDDEN: u32 = 1 << 3;
pub const HARD_ROCK: u32 = 1 << 4;
pub const SUDDEN_DEATH: u32 = 1 << 5;
pub const DOUBLE_TIME: u32 = 1 << 6;
pub const RELAX: u32 = 1 << 7;
pub const HALF_TIME: u32 = 1 << 8;
pub const NIGHTCORE: u32 = 1 << 9;
pub const FLASHLIGHT: u32 = 1 << 10;
pub const AUTOPILOT: u32 = 1 << 13;
pub const PERFECT: u32 = 1 << 14;
pub const KEY4: u32 = 1 << 15;
pub const KEY5: u32 = 1 << 16;
pub const KEY6: u32 = 1 << 17;
pub const KEY7: u32 = 1 << 18;
pub const KEY8: u32 = 1 << 19;
pub const FADE_IN: u32 = 1 << 20;
pub const KEY9: u32 = 1 << 24;
pub const KEY_COOP: u32 = 1 << 25;
pub const KEY1: u32 = 1 << 26;
pub const KEY3: u32 = 1 << 27;
pub const KEY2: u32 = 1 << 28;
pub const MIRROR: u32 = 1 << 30;

/// Acronyms that never affect difficulty and are dropped during normalisation.
const IGNORED_ACRONYMS: [&str; 3] = ["SCOREV2", "CINEMA", "AUTO"];

/// A modifier as sent by clients: either a bare acronym or a mod object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ApiMod {
    Acronym(String),
    /// Mod settings (e.g. a custom rate) are accepted and ignored.
    Object { acronym: String },
}

impl ApiMod {
    pub fn acronym(&self) -> &str {
        match self {
            ApiMod::Acronym(acronym) => acronym,
            ApiMod::Object { acronym, .. } => acronym,
        }
    }
}

impl From<&str> for ApiMod {
    fn from(acronym: &str) -> Self {
        ApiMod::Acronym(acronym.to_string())
    }
}

/// Normalised, order-independent set of modifier acronyms.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModSet(BTreeSet<String>);

impl ModSet {
    #[cfg(test)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from raw client acronyms.
    ///
    /// Acronyms are trimmed and upper-cased, blanks and non-gameplay mods are
    /// dropped, and stable's `2P` is renamed to `DS`.
    pub fn from_acronyms<I, S>(acronyms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set = acronyms
            .into_iter()
            .filter_map(|raw| {
                let acronym = raw.as_ref().trim().to_uppercase();
                if acronym.is_empty() || IGNORED_ACRONYMS.contains(&acronym.as_str()) {
                    return None;
                }
                if acronym == "2P" {
                    return Some("DS".to_string());
                }
                Some(acronym)
            })
            .collect();

        Self(set)
    }

    pub fn from_api_mods(mods: &[ApiMod]) -> Self {
        Self::from_acronyms(mods.iter().map(ApiMod::acronym))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Lossy bitmask used as part of the durable key.
    pub fn storage_bitmask(&self, ruleset: Ruleset) -> u32 {
        self.iter()
            .map(|acronym| match acronym {
                "EZ" => EASY,
                "HR" => HARD_ROCK,
                "NC" | "DT" => DOUBLE_TIME,
                "HT" => HALF_TIME,
                "4K" => KEY4,
                "5K" => KEY5,
                "6K" => KEY6,
                "7K" => KEY7,
                "8K" => KEY8,
                "9K" => KEY9,
                "FL" if ruleset == Ruleset::Osu => FLASHLIGHT,
                "AP" => AUTOPILOT,
                "RX" => RELAX,
                _ => 0,
            })
            .fold(0, |acc, bit| acc | bit)
    }

    /// Full legacy encoding passed to the difficulty calculators.
    pub fn legacy_bits(&self) -> u32 {
        self.iter()
            .map(|acronym| match acronym {
                "NF" => NO_FAIL,
                "EZ" => EASY,
                "HD" => HIDDEN,
                "HR" => HARD_ROCK,
                "SD" => SUDDEN_DEATH,
                "PF" => SUDDEN_DEATH | PERFECT,
                "DT" => DOUBLE_TIME,
                "NC" => DOUBLE_TIME | NIGHTCORE,
                "RX" => RELAX,
                "AP" => AUTOPILOT,
                "HT" => HALF_TIME,
                "FL" => FLASHLIGHT,
                "FI" => FADE_IN,
                "MR" => MIRROR,
                "DS" => KEY_COOP,
                "1K" => KEY1,
                "2K" => KEY2,
                "3K" => KEY3,
                "4K" => KEY4,
                "5K" => KEY5,
                "6K" => KEY6,
                "7K" => KEY7,
                "8K" => KEY8,
                "9K" => KEY9,
                _ => 0,
            })
            .fold(0, |acc, bit| acc | bit)
    }
}

impl fmt::Display for ModSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("NM");
        }
        for acronym in self.iter() {
            f.write_str(acronym)?;
        }
        Ok(())
    }
}
