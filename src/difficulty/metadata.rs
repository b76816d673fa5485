//! Lightweight structural read of a beatmap.
//!
//! Used when attributes come from the database: the persisted values cover
//! the difficulty itself, but object counts still have to come from the file.
//! Parsing hit objects is far cheaper than running a difficulty calculation.

use super::CalcError;
use crate::beatmap::BeatmapFile;
use rosu_map::Beatmap;
use rosu_map::section::hit_objects::HitObjectKind;

/// Object counts of the osu shape, which are not persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BeatmapMetadata {
    pub circle_count: u32,
    pub slider_count: u32,
    pub spinner_count: u32,
}

/// Counts hit objects without calculating difficulty.
pub fn extract_metadata(beatmap: &BeatmapFile) -> Result<BeatmapMetadata, CalcError> {
    let map = Beatmap::from_bytes(beatmap.bytes())
        .map_err(|e| CalcError::InvalidBeatmap(e.to_string()))?;

    if map.hit_objects.is_empty() {
        return Err(CalcError::InvalidBeatmap("No hit objects found".to_string()));
    }

    let mut metadata = BeatmapMetadata::default();
    for obj in &map.hit_objects {
        match obj.kind {
            HitObjectKind::Circle(_) => metadata.circle_count += 1,
            HitObjectKind::Slider(_) => metadata.slider_count += 1,
            HitObjectKind::Spinner(_) => metadata.spinner_count += 1,
            _ => {}
        }
    }

    Ok(metadata)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A tiny standard beatmap: two circles, one slider, one spinner.
    pub(crate) const SAMPLE_OSU: &str = "osu file format v14

[General]
AudioFilename: audio.mp3
Mode: 0

[Metadata]
Title:Sample
Artist:Tester
Version:Normal

[Difficulty]
HPDrainRate:5
CircleSize:4
OverallDifficulty:7
ApproachRate:9
SliderMultiplier:1.4
SliderTickRate:1

[TimingPoints]
0,500,4,2,0,100,1,0

[HitObjects]
64,192,500,1,0,0:0:0:0:
192,192,1000,1,0,0:0:0:0:
256,192,1500,2,0,L|356:192,1,100
256,192,3000,12,0,4000,0:0:0:0:
";

    #[test]
    fn test_extract_metadata_counts_objects() {
        let beatmap = BeatmapFile::new(1, SAMPLE_OSU.as_bytes().to_vec());
        let metadata = extract_metadata(&beatmap).unwrap();

        assert_eq!(metadata.circle_count, 2);
        assert_eq!(metadata.slider_count, 1);
        assert_eq!(metadata.spinner_count, 1);
    }

    #[test]
    fn test_extract_metadata_rejects_empty_maps() {
        let beatmap = BeatmapFile::new(1, b"osu file format v14\n\n[HitObjects]\n".to_vec());
        assert!(extract_metadata(&beatmap).is_err());
    }
}
