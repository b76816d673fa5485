//! Incoming difficulty requests and the cache keys derived from them.

pub mod mods;

pub use mods::{ApiMod, ModSet};

use serde::Deserialize;
use std::fmt;
use std::sync::Arc;

use crate::error::DifficultyError;

/// Game mode family selecting the difficulty algorithm and attribute shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Ruleset {
    Osu,
    Taiko,
    Catch,
    Mania,
}

impl Ruleset {
    pub const ALL: [Ruleset; 4] = [Ruleset::Osu, Ruleset::Taiko, Ruleset::Catch, Ruleset::Mania];

    pub fn id(self) -> u8 {
        match self {
            Ruleset::Osu => 0,
            Ruleset::Taiko => 1,
            Ruleset::Catch => 2,
            Ruleset::Mania => 3,
        }
    }

    pub fn from_id(id: i32) -> Option<Self> {
        match id {
            0 => Some(Ruleset::Osu),
            1 => Some(Ruleset::Taiko),
            2 => Some(Ruleset::Catch),
            3 => Some(Ruleset::Mania),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Ruleset::Osu => "osu",
            Ruleset::Taiko => "taiko",
            Ruleset::Catch => "catch",
            Ruleset::Mania => "mania",
        }
    }
}

impl fmt::Display for Ruleset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Body of a rating or attributes request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DifficultyRequest {
    #[serde(default)]
    pub beatmap_id: u32,
    #[serde(default)]
    pub beatmap_md5: Option<String>,
    #[serde(default)]
    pub ruleset_id: i32,
    #[serde(default)]
    pub mods: Vec<ApiMod>,
}

impl DifficultyRequest {
    /// Derives the cache key.
    ///
    /// Returns `Ok(None)` for a blank beatmap identity: such a request is
    /// answered with the "unknown" sentinel and never reaches a cache.
    pub fn key(&self) -> Result<Option<RequestKey>, DifficultyError> {
        let md5 = match self.beatmap_md5.as_deref().map(str::trim) {
            Some(md5) if !md5.is_empty() => md5,
            _ => return Ok(None),
        };

        let ruleset = Ruleset::from_id(self.ruleset_id)
            .ok_or(DifficultyError::UnknownRuleset(self.ruleset_id))?;

        Ok(Some(RequestKey::new(md5, ruleset, ModSet::from_api_mods(&self.mods))))
    }
}

#[cfg(test)]
impl DifficultyRequest {
    pub fn new(beatmap_md5: &str, beatmap_id: u32, ruleset_id: i32) -> Self {
        Self {
            beatmap_id,
            beatmap_md5: Some(beatmap_md5.to_string()),
            ruleset_id,
            mods: Vec::new(),
        }
    }

    pub fn with_mods<'a>(mut self, acronyms: impl IntoIterator<Item = &'a str>) -> Self {
        self.mods = acronyms.into_iter().map(ApiMod::from).collect();
        self
    }
}

/// Identity of a difficulty result: (beatmap md5, ruleset, modifier set).
///
/// The beatmap id is deliberately absent; it only matters for fetching.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    beatmap_md5: Arc<str>,
    ruleset: Ruleset,
    mods: ModSet,
}

impl RequestKey {
    pub fn new(beatmap_md5: &str, ruleset: Ruleset, mods: ModSet) -> Self {
        Self {
            beatmap_md5: Arc::from(beatmap_md5),
            ruleset,
            mods,
        }
    }

    pub fn beatmap_md5(&self) -> &str {
        &self.beatmap_md5
    }

    pub fn ruleset(&self) -> Ruleset {
        self.ruleset
    }

    pub fn mods(&self) -> &ModSet {
        &self.mods
    }

    pub fn mod_bitmask(&self) -> u32 {
        self.mods.storage_bitmask(self.ruleset)
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "beatmap: {}, ruleset: {}, mods: {}",
            self.beatmap_md5, self.ruleset, self.mods
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_identity_has_no_key() {
        for md5 in [None, Some(""), Some("   ")] {
            let request = DifficultyRequest {
                beatmap_md5: md5.map(str::to_string),
                ..Default::default()
            };
            assert!(request.key().unwrap().is_none());
        }
    }

    #[test]
    fn test_unknown_ruleset_is_rejected() {
        let request = DifficultyRequest::new("abc123", 42, 7);
        assert!(matches!(request.key(), Err(DifficultyError::UnknownRuleset(7))));
    }

    #[test]
    fn test_key_ignores_beatmap_id_and_mod_order() {
        let a = DifficultyRequest::new("abc123", 1, 0).with_mods(["DT", "HR"]);
        let b = DifficultyRequest::new("abc123", 2, 0).with_mods(["HR", "DT"]);
        assert_eq!(a.key().unwrap(), b.key().unwrap());

        let c = DifficultyRequest::new("abc123", 1, 1).with_mods(["DT", "HR"]);
        assert_ne!(a.key().unwrap(), c.key().unwrap());
    }

    #[test]
    fn test_deserialize_request() {
        let request: DifficultyRequest = serde_json::from_str(
            r#"{"beatmap_id": 42, "beatmap_md5": "abc123", "ruleset_id": 3, "mods": [{"acronym": "4K"}]}"#,
        )
        .unwrap();

        let key = request.key().unwrap().unwrap();
        assert_eq!(key.beatmap_md5(), "abc123");
        assert_eq!(key.ruleset(), Ruleset::Mania);
        assert_eq!(key.mod_bitmask(), mods::KEY4);
        assert_eq!(request.beatmap_id, 42);
    }
}
