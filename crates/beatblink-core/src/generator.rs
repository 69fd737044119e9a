//! Synthetic audio feature generator
//!
//! The server never listens to a microphone. Every tick it synthesizes a
//! frame from the wall-clock time alone: frequency bins are a sum of three
//! phase-shifted sinusoids (bass, mid, treble) and the overall intensity
//! follows a slow oscillation raised to a power > 1, so a demo session sweeps
//! through all five levels every ~20 seconds.

use std::f64::consts::PI;

use crate::config::AudioConfiguration;
use crate::frame::{bin_magnitude, AudioFrame};

/// Exponent biasing the intensity cycle towards its extremes
const INTENSITY_EXPONENT: f64 = 1.5;
/// Angular speed of the intensity cycle (rad/s)
const INTENSITY_CYCLE_SPEED: f64 = 0.3;

/// Stateless frame generator.
///
/// Output depends only on the timestamp and the configuration, which keeps
/// ticks reproducible in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticGenerator;

impl SyntheticGenerator {
    /// Create a generator
    pub fn new() -> Self {
        Self
    }

    /// Generate the frame for `time_ms` (unix milliseconds).
    pub fn frame_at(&self, time_ms: i64, config: &AudioConfiguration) -> AudioFrame {
        let t = time_ms as f64 * 0.001;

        let frequencies = (0..config.frequency_bins())
            .map(|i| {
                let i = i as f64;
                let bass = (t * 2.0 + i * 0.05).sin() * 100.0;
                let mid = (t * 3.0 + i * 0.03).sin() * 80.0;
                let treble = (t * 4.0 + i * 0.02).sin() * 60.0;
                bin_magnitude(bass + mid + treble + 50.0)
            })
            .collect();

        let intensity = Self::intensity_at(t);

        AudioFrame {
            volume: (0.3 + intensity * 0.7) as f32,
            bass: (0.2 + (t * 1.5).sin() * 0.3 + intensity * 0.5) as f32,
            mid: (0.2 + (t * 2.5).sin() * 0.3 + intensity * 0.5) as f32,
            treble: (0.2 + (t * 3.5).sin() * 0.3 + intensity * 0.5) as f32,
            frequencies,
            overall_intensity: intensity as f32,
        }
        .clamped()
    }

    /// Overall intensity at `t` seconds.
    fn intensity_at(t: f64) -> f64 {
        let cycle = ((t * INTENSITY_CYCLE_SPEED).sin() + 1.0) / 2.0;
        cycle.clamp(0.0, 1.0).powf(INTENSITY_EXPONENT)
    }

    /// Length of one full intensity cycle in milliseconds.
    pub fn cycle_period_ms() -> i64 {
        (2.0 * PI / INTENSITY_CYCLE_SPEED * 1000.0).round() as i64
    }
}
