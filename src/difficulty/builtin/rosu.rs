//! Difficulty calculator using rosu-pp.

use crate::beatmap::BeatmapFile;
use crate::difficulty::{
    CalcError, CatchAttributes, DifficultyAttributes, DifficultyCalculator, ManiaAttributes,
    OsuAttributes, TaikoAttributes,
};
use crate::request::{ModSet, Ruleset};
use rosu_pp::any::DifficultyAttributes as RosuAttributes;
use rosu_pp::model::mode::GameMode;
use rosu_pp::model::mods::GameMods;

/// rosu-pp calculator for a single ruleset.
///
/// Beatmaps of another mode are converted first; converting out of mania or
/// between non-standard modes is rejected by rosu-pp.
#[derive(Debug, Clone)]
pub struct RosuCalculator {
    ruleset: Ruleset,
    version: String,
}

impl RosuCalculator {
    pub fn new(ruleset: Ruleset) -> Self {
        Self {
            ruleset,
            version: "v3.1".to_string(),
        }
    }

    fn game_mode(&self) -> GameMode {
        match self.ruleset {
            Ruleset::Osu => GameMode::Osu,
            Ruleset::Taiko => GameMode::Taiko,
            Ruleset::Catch => GameMode::Catch,
            Ruleset::Mania => GameMode::Mania,
        }
    }
}

impl DifficultyCalculator for RosuCalculator {
    fn ruleset(&self) -> Ruleset {
        self.ruleset
    }

    fn display_name(&self) -> &str {
        match self.ruleset {
            Ruleset::Osu => "osu! (rosu-pp)",
            Ruleset::Taiko => "osu!taiko (rosu-pp)",
            Ruleset::Catch => "osu!catch (rosu-pp)",
            Ruleset::Mania => "osu!mania (rosu-pp)",
        }
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn calculate(
        &self,
        beatmap: &BeatmapFile,
        mods: &ModSet,
    ) -> Result<DifficultyAttributes, CalcError> {
        let mut map = rosu_pp::Beatmap::from_bytes(beatmap.bytes())
            .map_err(|e| CalcError::InvalidBeatmap(e.to_string()))?;

        let game_mods = GameMods::from(mods.legacy_bits());
        map.convert_mut(self.game_mode(), &game_mods)
            .map_err(|_| CalcError::Conversion(self.ruleset))?;

        let attrs = rosu_pp::Difficulty::new().mods(game_mods).calculate(&map);

        Ok(convert_attributes(attrs))
    }
}

fn convert_attributes(attrs: RosuAttributes) -> DifficultyAttributes {
    let star_rating = attrs.stars();
    let max_combo = attrs.max_combo();

    match attrs {
        RosuAttributes::Osu(osu) => DifficultyAttributes::Osu(OsuAttributes {
            star_rating,
            max_combo,
            aim_difficulty: osu.aim,
            speed_difficulty: osu.speed,
            speed_note_count: osu.speed_note_count,
            flashlight_difficulty: osu.flashlight,
            slider_factor: osu.slider_factor,
            aim_difficult_strain_count: osu.aim_difficult_strain_count,
            speed_difficult_strain_count: osu.speed_difficult_strain_count,
            approach_rate: osu.ar,
            hit_circle_count: osu.n_circles,
            slider_count: osu.n_sliders,
            spinner_count: osu.n_spinners,
        }),
        RosuAttributes::Taiko(taiko) => DifficultyAttributes::Taiko(TaikoAttributes {
            star_rating,
            max_combo,
            stamina_difficulty: taiko.stamina,
            rhythm_difficulty: taiko.rhythm,
            colour_difficulty: taiko.color,
        }),
        RosuAttributes::Catch(catch) => DifficultyAttributes::Catch(CatchAttributes {
            star_rating,
            max_combo,
            approach_rate: catch.ar,
        }),
        RosuAttributes::Mania(_) => DifficultyAttributes::Mania(ManiaAttributes {
            star_rating,
            max_combo,
        }),
    }
}
