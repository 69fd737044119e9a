//! Audio feature frames sent to clients on every tick.

use serde::{Deserialize, Serialize};

/// Maximum number of frequency bins carried by a frame
pub const MAX_FREQUENCY_BINS: usize = 512;

/// One tick worth of audio features.
///
/// All bounded fields are clamped before a frame leaves the generator, so
/// consumers can rely on `[0, 1]` for the scalar bands and `[0, 255]` for
/// the bins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioFrame {
    /// Overall loudness (0.0 - 1.0)
    pub volume: f32,
    /// Low band energy (0.0 - 1.0)
    pub bass: f32,
    /// Mid band energy (0.0 - 1.0)
    pub mid: f32,
    /// High band energy (0.0 - 1.0)
    pub treble: f32,
    /// Frequency bin magnitudes (0 - 255)
    pub frequencies: Vec<u8>,
    /// Scalar driving the level state machine (0.0 - 1.0)
    pub overall_intensity: f32,
}

impl AudioFrame {
    /// A zeroed frame with `bins` empty frequency bins.
    ///
    /// Sent to freshly accepted or paused clients so they render a neutral
    /// state until the next live tick.
    pub fn silent(bins: usize) -> Self {
        Self {
            volume: 0.0,
            bass: 0.0,
            mid: 0.0,
            treble: 0.0,
            frequencies: vec![0; bins.min(MAX_FREQUENCY_BINS)],
            overall_intensity: 0.0,
        }
    }

    /// Clamp every bounded field into its range. NaN collapses to 0.
    pub fn clamped(mut self) -> Self {
        self.volume = unit(self.volume);
        self.bass = unit(self.bass);
        self.mid = unit(self.mid);
        self.treble = unit(self.treble);
        self.overall_intensity = unit(self.overall_intensity);
        self.frequencies.truncate(MAX_FREQUENCY_BINS);
        self
    }
}

/// Clamp a scalar into `[0, 1]`, mapping NaN to 0.
pub fn unit(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Clamp a bin magnitude into `[0, 255]` and round it.
pub fn bin_magnitude(value: f64) -> u8 {
    if value.is_nan() {
        0
    } else {
        value.clamp(0.0, 255.0).round() as u8
    }
}
