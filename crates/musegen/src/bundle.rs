//! Model bundles: the Markov tables behind the melody and chord models.
//!
//! A bundle is a JSON file. When no bundle path is configured the compiled-in
//! defaults below are used.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::sampling::WeightTable;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PitchRange {
    pub min: u8,
    pub max: u8,
}

impl PitchRange {
    /// Fold `pitch` back into the range by reflecting off its edges.
    pub fn reflect(&self, pitch: i32) -> u8 {
        let (min, max) = (self.min as i32, self.max as i32);
        let mut p = pitch;
        if p > max {
            p = max - (p - max);
        }
        if p < min {
            p = min + (min - p);
        }
        p.clamp(min, max) as u8
    }
}

/// Bundles outside these bounds are rejected so generation stays bounded.
pub const MAX_QPM: f64 = 1000.0;
pub const MAX_STEPS_PER_QUARTER: u32 = 64;
pub const MAX_BARS: u32 = 1024;

fn valid_qpm(qpm: f64) -> bool {
    qpm.is_finite() && qpm > 0.0 && qpm <= MAX_QPM
}

fn default_qpm() -> f64 {
    120.0
}

fn default_steps_per_quarter() -> u32 {
    4
}

/// Interval-based melody model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MelodyBundle {
    pub name: String,
    #[serde(default = "default_qpm")]
    pub qpm: f64,
    #[serde(default = "default_steps_per_quarter")]
    pub steps_per_quarter: u32,
    pub pitch_range: PitchRange,
    pub start_pitch: u8,
    /// Semitone step -> weight
    pub intervals: WeightTable<i8>,
    /// Note length in steps -> weight
    pub durations: WeightTable<u32>,
    /// Probability that a step sounds a rest instead of a note
    #[serde(default)]
    pub rest_weight: f64,
}

impl Default for MelodyBundle {
    fn default() -> Self {
        // Stepwise motion dominates, then thirds, then wider leaps
        let intervals = WeightTable::from([
            (0, 5.0),
            (1, 15.0),
            (-1, 15.0),
            (2, 15.0),
            (-2, 15.0),
            (3, 5.0),
            (-3, 5.0),
            (4, 5.0),
            (-4, 5.0),
            (5, 3.0),
            (-5, 3.0),
            (7, 2.0),
            (-7, 2.0),
        ]);
        let durations = WeightTable::from([(1, 2.0), (2, 4.0), (4, 3.0), (8, 1.0)]);

        Self {
            name: "default_melody".to_string(),
            qpm: default_qpm(),
            steps_per_quarter: default_steps_per_quarter(),
            pitch_range: PitchRange { min: 60, max: 84 },
            start_pitch: 60,
            intervals,
            durations,
            rest_weight: 0.1,
        }
    }
}

impl MelodyBundle {
    pub fn load(path: &Path) -> Result<Self> {
        let bundle: Self = read_json(path)?;
        bundle.validate()?;
        Ok(bundle)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| Error::InvalidBundle {
            name: self.name.clone(),
            reason: reason.to_string(),
        };
        if !valid_qpm(self.qpm) {
            return Err(invalid("qpm must be in (0, 1000]"));
        }
        if self.steps_per_quarter == 0 || self.steps_per_quarter > MAX_STEPS_PER_QUARTER {
            return Err(invalid("steps_per_quarter must be in 1..=64"));
        }
        if self.pitch_range.min > self.pitch_range.max || self.pitch_range.max > 127 {
            return Err(invalid("pitch_range must satisfy min <= max <= 127"));
        }
        if !has_positive_weight(&self.intervals) {
            return Err(invalid("intervals need at least one positive weight"));
        }
        if !self.durations.iter().any(|(&steps, &w)| steps > 0 && w > 0.0) {
            return Err(invalid("durations need at least one positive weight"));
        }
        if !(0.0..1.0).contains(&self.rest_weight) {
            return Err(invalid("rest_weight must be in [0, 1)"));
        }
        Ok(())
    }
}

/// Scale-degree chord progression model. Degrees are 0-based (0 = tonic).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChordBundle {
    pub name: String,
    #[serde(default = "default_qpm")]
    pub qpm: f64,
    pub bars: u32,
    pub beats_per_bar: u32,
    /// From degree -> (to degree -> weight)
    pub degrees: BTreeMap<u8, WeightTable<u8>>,
    pub start_degree: u8,
    /// MIDI pitch of the tonic in the chord register
    pub octave_root: u8,
}

impl Default for ChordBundle {
    fn default() -> Self {
        let degrees = BTreeMap::from([
            (0, WeightTable::from([(3, 4.0), (4, 4.0), (5, 3.0), (1, 1.0)])),
            (1, WeightTable::from([(4, 5.0), (6, 1.0)])),
            (2, WeightTable::from([(5, 4.0), (3, 1.0)])),
            (3, WeightTable::from([(4, 4.0), (0, 3.0), (1, 2.0)])),
            (4, WeightTable::from([(0, 6.0), (5, 3.0)])),
            (5, WeightTable::from([(3, 4.0), (1, 3.0), (4, 1.0)])),
            (6, WeightTable::from([(0, 5.0), (2, 1.0)])),
        ]);

        Self {
            name: "default_chords".to_string(),
            qpm: default_qpm(),
            bars: 16,
            beats_per_bar: 4,
            degrees,
            start_degree: 0,
            octave_root: 48,
        }
    }
}

impl ChordBundle {
    pub fn load(path: &Path) -> Result<Self> {
        let bundle: Self = read_json(path)?;
        bundle.validate()?;
        Ok(bundle)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| Error::InvalidBundle {
            name: self.name.clone(),
            reason: reason.to_string(),
        };
        if !valid_qpm(self.qpm) {
            return Err(invalid("qpm must be in (0, 1000]"));
        }
        if self.bars == 0 || self.beats_per_bar == 0 {
            return Err(invalid("bars and beats_per_bar must be at least 1"));
        }
        if self.bars > MAX_BARS || self.beats_per_bar > 255 {
            return Err(invalid("bars must be at most 1024 and beats_per_bar at most 255"));
        }
        if self.start_degree > 6 || self.degrees.keys().any(|&d| d > 6) {
            return Err(invalid("degrees must be 0..=6"));
        }
        if self
            .degrees
            .values()
            .any(|table| table.keys().any(|&d| d > 6))
        {
            return Err(invalid("degrees must be 0..=6"));
        }
        // Highest triad tone is the fifth of vii, 19 semitones over the root
        if self.octave_root > 127 - 19 {
            return Err(invalid("octave_root too high for a triad"));
        }
        Ok(())
    }
}

fn has_positive_weight<K>(table: &WeightTable<K>) -> bool {
    table.values().any(|&w| w > 0.0 && w.is_finite())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let data = std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&data).map_err(|source| Error::Json {
        path: path.to_path_buf(),
        source,
    })
}
