//! Shared audio configuration
//!
//! One `AudioConfiguration` exists per server. It is replaced wholesale by
//! shallow-merging a [`ConfigurationUpdate`] into it, and the merged result is
//! validated before it is accepted.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::frame::MAX_FREQUENCY_BINS;
use crate::{CoreError, Result};

/// Smallest accepted FFT size
pub const MIN_FFT_SIZE: u32 = 32;
/// Largest accepted FFT size (yields the 512-bin maximum)
pub const MAX_FFT_SIZE: u32 = 2048;
/// Highest accepted tick rate in Hz
pub const MAX_UPDATE_RATE: u32 = 240;
/// Longest accepted winner hold time (one hour)
pub const MAX_WINNER_DURATION_MS: u64 = 3_600_000;

/// Process-wide audio and game configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AudioConfiguration {
    /// FFT size; the frame carries `fft_size / 4` frequency bins
    pub fft_size: u32,
    /// Smoothing factor reported to clients (0.0 - 1.0)
    pub smoothing_time_constant: f32,
    /// Tick rate of the generation loop in Hz
    pub update_rate: u32,
    /// Intensity that must be exceeded at level 5 to enter the winner state
    pub winner_threshold: f32,
    /// Minimum time the winner state is held, in milliseconds
    #[serde(rename = "winnerDuration", alias = "winnerDurationMs")]
    pub winner_duration_ms: u64,
    /// Exponent of the level sensitivity curve (lower = more sensitive)
    pub level_sensitivity: f32,
}

impl Default for AudioConfiguration {
    fn default() -> Self {
        Self {
            fft_size: 1024,
            smoothing_time_constant: 0.7,
            update_rate: 60,
            winner_threshold: 0.95,
            winner_duration_ms: 5000,
            level_sensitivity: 0.7,
        }
    }
}

impl AudioConfiguration {
    /// Number of frequency bins a generated frame carries.
    pub fn frequency_bins(&self) -> usize {
        ((self.fft_size / 4) as usize).clamp(1, MAX_FREQUENCY_BINS)
    }

    /// Period between two ticks of the generation loop.
    pub fn tick_period(&self) -> Duration {
        Duration::from_micros(1_000_000 / u64::from(self.update_rate.max(1)))
    }

    /// Check that every field is inside its accepted range.
    pub fn validate(&self) -> Result<()> {
        if !self.fft_size.is_power_of_two()
            || !(MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&self.fft_size)
        {
            return Err(CoreError::InvalidConfiguration(format!(
                "fftSize must be a power of two between {} and {}, got {}",
                MIN_FFT_SIZE, MAX_FFT_SIZE, self.fft_size
            )));
        }
        if !(0.0..=1.0).contains(&self.smoothing_time_constant) {
            return Err(CoreError::InvalidConfiguration(
                "smoothingTimeConstant must be between 0.0 and 1.0".to_string(),
            ));
        }
        if !(1..=MAX_UPDATE_RATE).contains(&self.update_rate) {
            return Err(CoreError::InvalidConfiguration(format!(
                "updateRate must be between 1 and {} Hz, got {}",
                MAX_UPDATE_RATE, self.update_rate
            )));
        }
        if !(0.0..=1.0).contains(&self.winner_threshold) {
            return Err(CoreError::InvalidConfiguration(
                "winnerThreshold must be between 0.0 and 1.0".to_string(),
            ));
        }
        if self.winner_duration_ms > MAX_WINNER_DURATION_MS {
            return Err(CoreError::InvalidConfiguration(format!(
                "winnerDuration must be at most {} ms, got {}",
                MAX_WINNER_DURATION_MS, self.winner_duration_ms
            )));
        }
        if !self.level_sensitivity.is_finite()
            || self.level_sensitivity <= 0.0
            || self.level_sensitivity > 4.0
        {
            return Err(CoreError::InvalidConfiguration(
                "levelSensitivity must be in (0.0, 4.0]".to_string(),
            ));
        }
        Ok(())
    }

    /// Shallow-merge `update` over this configuration.
    ///
    /// Returns the merged configuration without touching `self`; the merge is
    /// rejected as a whole if any resulting field is invalid.
    pub fn merged(&self, update: &ConfigurationUpdate) -> Result<Self> {
        let merged = Self {
            fft_size: update.fft_size.unwrap_or(self.fft_size),
            smoothing_time_constant: update
                .smoothing_time_constant
                .unwrap_or(self.smoothing_time_constant),
            update_rate: update.update_rate.unwrap_or(self.update_rate),
            winner_threshold: update.winner_threshold.unwrap_or(self.winner_threshold),
            winner_duration_ms: update.winner_duration_ms.unwrap_or(self.winner_duration_ms),
            level_sensitivity: update.level_sensitivity.unwrap_or(self.level_sensitivity),
        };
        merged.validate()?;
        Ok(merged)
    }
}

/// Partial configuration sent by clients or the HTTP API.
///
/// Absent fields keep their current value. Unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigurationUpdate {
    /// New FFT size
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fft_size: Option<u32>,
    /// New smoothing factor
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smoothing_time_constant: Option<f32>,
    /// New tick rate in Hz
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update_rate: Option<u32>,
    /// New winner threshold
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner_threshold: Option<f32>,
    /// New winner hold time in milliseconds
    #[serde(
        rename = "winnerDuration",
        alias = "winnerDurationMs",
        skip_serializing_if = "Option::is_none"
    )]
    pub winner_duration_ms: Option<u64>,
    /// New sensitivity exponent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level_sensitivity: Option<f32>,
}

impl ConfigurationUpdate {
    /// True when the update would not change anything
    pub fn is_empty(&self) -> bool {
        self.fft_size.is_none()
            && self.smoothing_time_constant.is_none()
            && self.update_rate.is_none()
            && self.winner_threshold.is_none()
            && self.winner_duration_ms.is_none()
            && self.level_sensitivity.is_none()
    }
}
