//! Rate / tempo / pitch transform parameters
//!
//! The engine keeps exactly one canonical ratio per axis. Every alternate
//! representation (percent change, octaves, semitones) goes through the pure
//! conversion functions below, so the representations cannot drift apart.
//!
//! The two pipeline stages only understand two numbers: the time-stretch
//! tempo and the transposer rate. Pitch is realized by combining both:
//! transposing by `pitch` and stretching by `1 / pitch` to undo the speed
//! change.

use crate::error::{EngineError, Result};
use tracing::warn;

/// Smallest accepted ratio on any axis
pub const MIN_RATIO: f64 = 1e-3;
/// Largest accepted ratio on any axis
pub const MAX_RATIO: f64 = 1e3;

/// Convert a percent delta (e.g. `+25.0`) to a ratio (`1.25`)
#[inline]
pub fn percent_to_ratio(percent: f64) -> f64 {
    1.0 + 0.01 * percent
}

/// Convert a ratio back to a percent delta
#[inline]
pub fn ratio_to_percent(ratio: f64) -> f64 {
    (ratio - 1.0) * 100.0
}

/// Convert an octave delta to a frequency ratio
#[inline]
pub fn octaves_to_ratio(octaves: f64) -> f64 {
    octaves.exp2()
}

/// Convert a frequency ratio to an octave delta
#[inline]
pub fn ratio_to_octaves(ratio: f64) -> f64 {
    ratio.log2()
}

/// Convert a semitone delta to a frequency ratio
#[inline]
pub fn semitones_to_ratio(semitones: f64) -> f64 {
    octaves_to_ratio(semitones / 12.0)
}

/// Convert a frequency ratio to a semitone delta
#[inline]
pub fn ratio_to_semitones(ratio: f64) -> f64 {
    ratio_to_octaves(ratio) * 12.0
}

/// Canonical transform state of one stream
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformParams {
    rate: f64,
    tempo: f64,
    pitch: f64,
}

impl Default for TransformParams {
    fn default() -> Self {
        Self {
            rate: 1.0,
            tempo: 1.0,
            pitch: 1.0,
        }
    }
}

impl TransformParams {
    /// Identity transform
    pub fn new() -> Self {
        Self::default()
    }

    /// Playback rate multiplier (changes speed and pitch)
    #[inline]
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Tempo multiplier (changes speed only)
    #[inline]
    pub fn tempo(&self) -> f64 {
        self.tempo
    }

    /// Pitch multiplier (changes pitch only)
    #[inline]
    pub fn pitch(&self) -> f64 {
        self.pitch
    }

    /// Pitch as a semitone delta
    pub fn pitch_semitones(&self) -> f64 {
        ratio_to_semitones(self.pitch)
    }

    /// Pitch as an octave delta
    pub fn pitch_octaves(&self) -> f64 {
        ratio_to_octaves(self.pitch)
    }

    /// Rate as a percent delta
    pub fn rate_change(&self) -> f64 {
        ratio_to_percent(self.rate)
    }

    /// Tempo as a percent delta
    pub fn tempo_change(&self) -> f64 {
        ratio_to_percent(self.tempo)
    }

    pub fn set_rate(&mut self, ratio: f64) -> Result<()> {
        let rate = validate_ratio("rate", ratio)?;
        self.commit("rate", Self { rate, ..*self })
    }

    pub fn set_tempo(&mut self, ratio: f64) -> Result<()> {
        let tempo = validate_ratio("tempo", ratio)?;
        self.commit("tempo", Self { tempo, ..*self })
    }

    pub fn set_pitch(&mut self, ratio: f64) -> Result<()> {
        let pitch = validate_ratio("pitch", ratio)?;
        self.commit("pitch", Self { pitch, ..*self })
    }

    /// Set rate as a percent delta (nominally -50 .. +100)
    pub fn set_rate_change(&mut self, percent: f64) -> Result<()> {
        validate_finite("rate change", percent)?;
        let rate = validate_ratio("rate change", percent_to_ratio(percent))?;
        self.commit("rate change", Self { rate, ..*self })
    }

    /// Set tempo as a percent delta (nominally -50 .. +100)
    pub fn set_tempo_change(&mut self, percent: f64) -> Result<()> {
        validate_finite("tempo change", percent)?;
        let tempo = validate_ratio("tempo change", percent_to_ratio(percent))?;
        self.commit("tempo change", Self { tempo, ..*self })
    }

    /// Set pitch as an octave delta (nominally -1.0 .. +1.0)
    pub fn set_pitch_octaves(&mut self, octaves: f64) -> Result<()> {
        validate_finite("pitch octaves", octaves)?;
        let pitch = validate_ratio("pitch octaves", octaves_to_ratio(octaves))?;
        self.commit("pitch octaves", Self { pitch, ..*self })
    }

    /// Set pitch as a semitone delta (nominally -12 .. +12)
    pub fn set_pitch_semitones(&mut self, semitones: f64) -> Result<()> {
        validate_finite("pitch semitones", semitones)?;
        let pitch = validate_ratio("pitch semitones", semitones_to_ratio(semitones))?;
        self.commit("pitch semitones", Self { pitch, ..*self })
    }

    /// Adopt `next` only if both stage parameters stay within the ratio
    /// range; the stages size their buffers from them.
    fn commit(&mut self, name: &'static str, next: Self) -> Result<()> {
        validate_ratio(name, next.effective_tempo())?;
        validate_ratio(name, next.effective_rate())?;
        *self = next;
        Ok(())
    }

    /// Tempo handed to the time-stretch stage
    #[inline]
    pub fn effective_tempo(&self) -> f64 {
        self.tempo / self.pitch
    }

    /// Rate handed to the transposer stage
    #[inline]
    pub fn effective_rate(&self) -> f64 {
        self.rate * self.pitch
    }

    /// Expected output frames per input frame
    #[inline]
    pub fn input_output_ratio(&self) -> f64 {
        1.0 / (self.tempo * self.rate)
    }
}

fn validate_finite(name: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(rejected(name, value))
    }
}

/// Ratios must lie within [MIN_RATIO, MAX_RATIO]; NaN fails the range check
fn validate_ratio(name: &'static str, ratio: f64) -> Result<f64> {
    if (MIN_RATIO..=MAX_RATIO).contains(&ratio) {
        Ok(ratio)
    } else {
        Err(rejected(name, ratio))
    }
}

pub(crate) fn rejected(name: &'static str, value: f64) -> EngineError {
    warn!(name, value, "rejected parameter");
    EngineError::InvalidParameter { name, value }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_pitch_representations_agree() {
        let mut by_ratio = TransformParams::new();
        let mut by_octaves = TransformParams::new();
        let mut by_semitones = TransformParams::new();

        by_ratio.set_pitch(2.0).unwrap();
        by_octaves.set_pitch_octaves(1.0).unwrap();
        by_semitones.set_pitch_semitones(12.0).unwrap();

        assert_relative_eq!(by_ratio.pitch(), by_octaves.pitch(), epsilon = 1e-12);
        assert_relative_eq!(by_ratio.pitch(), by_semitones.pitch(), epsilon = 1e-12);

        by_octaves.set_pitch_octaves(-0.25).unwrap();
        by_semitones.set_pitch_semitones(-3.0).unwrap();
        assert_relative_eq!(by_octaves.pitch(), by_semitones.pitch(), epsilon = 1e-12);
    }

    #[test]
    fn test_percent_changes() {
        let mut params = TransformParams::new();
        params.set_tempo_change(100.0).unwrap();
        assert_relative_eq!(params.tempo(), 2.0);
        params.set_rate_change(-50.0).unwrap();
        assert_relative_eq!(params.rate(), 0.5);
        assert_relative_eq!(params.tempo_change(), 100.0);
        assert_relative_eq!(params.rate_change(), -50.0);
    }

    #[test]
    fn test_last_setter_wins_across_representations() {
        let mut params = TransformParams::new();
        params.set_pitch_semitones(7.0).unwrap();
        params.set_pitch(1.0).unwrap();
        assert_relative_eq!(params.pitch_semitones(), 0.0);
        params.set_pitch_octaves(0.5).unwrap();
        assert_relative_eq!(params.pitch_semitones(), 6.0, epsilon = 1e-9);
    }

    #[test]
    fn test_effective_stage_parameters() {
        let mut params = TransformParams::new();
        params.set_pitch(2.0).unwrap();
        params.set_tempo(1.5).unwrap();
        params.set_rate(0.8).unwrap();
        assert_relative_eq!(params.effective_tempo(), 0.75);
        assert_relative_eq!(params.effective_rate(), 1.6);
        // Pitch cancels out of the overall duration ratio
        assert_relative_eq!(params.input_output_ratio(), 1.0 / 1.2, epsilon = 1e-12);
    }

    #[test]
    fn test_invalid_values_are_rejected_without_side_effects() {
        let mut params = TransformParams::new();
        params.set_tempo(1.25).unwrap();

        assert!(params.set_tempo(0.0).is_err());
        assert!(params.set_tempo(-1.0).is_err());
        assert!(params.set_tempo(f64::NAN).is_err());
        assert!(params.set_tempo_change(-100.0).is_err());
        assert!(params.set_pitch_semitones(f64::INFINITY).is_err());
        assert!(params.set_pitch_octaves(5000.0).is_err());
        assert!(params.set_rate(MAX_RATIO * 2.0).is_err());

        assert_relative_eq!(params.tempo(), 1.25);
        assert_relative_eq!(params.pitch(), 1.0);
    }

    #[test]
    fn test_combined_stage_ratios_stay_in_range() {
        let mut params = TransformParams::new();
        params.set_tempo(100.0).unwrap();
        // Would stretch by 1e4
        assert!(params.set_pitch(0.01).is_err());
        assert!(params.set_pitch_semitones(-120.0).is_err());
        assert_relative_eq!(params.pitch(), 1.0);

        params.set_tempo(1.0).unwrap();
        params.set_pitch(0.01).unwrap();
        // Tempo 100 over pitch 0.01 is out of range the other way round too
        assert!(params.set_tempo(100.0).is_err());
        assert!(params.set_rate(0.05).is_err());
        assert_relative_eq!(params.tempo(), 1.0);
        assert_relative_eq!(params.rate(), 1.0);

        params.set_tempo(5.0).unwrap();
        assert_relative_eq!(params.effective_tempo(), 500.0, epsilon = 1e-9);
    }

    #[test]
    fn test_ratio_is_positive_and_finite() {
        let mut params = TransformParams::new();
        for (tempo, rate) in [(0.5, 0.5), (2.0, 2.0), (MIN_RATIO, MIN_RATIO), (MAX_RATIO, MAX_RATIO)] {
            params.set_tempo(tempo).unwrap();
            params.set_rate(rate).unwrap();
            let ratio = params.input_output_ratio();
            assert!(ratio.is_finite() && ratio > 0.0);
        }
    }
}
