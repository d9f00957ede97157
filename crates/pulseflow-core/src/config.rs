//! Visualizer configuration
//!
//! A `VisualizerConfig` is immutable for the lifetime of a session: changing
//! any field means tearing the session down and building a new one. The
//! scheduler exposes a `Reconfigure` command that does exactly that.

use serde::{Deserialize, Serialize};

use crate::{CoreError, Result};

/// FFT sizes the analyzer accepts
pub const SUPPORTED_FFT_SIZES: [usize; 4] = [256, 512, 1024, 2048];

/// Which audio source the session binds to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    /// Live microphone input
    #[default]
    Mic,
    /// A playable track endpoint
    Track,
}

/// Full configuration for a visualizer session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizerConfig {
    /// Audio source to bind
    pub mode: SourceMode,
    /// Capture device name for mic mode; `None` uses the host default
    pub mic_device: Option<String>,
    /// FFT window size (one of `SUPPORTED_FFT_SIZES`)
    pub fft_size: usize,
    /// Spectral smoothing factor (0.0 - 1.0, higher = slower response)
    pub smoothing: f32,
    /// Number of visualizer bars
    pub band_count: usize,
    /// Level threshold that spawns a ripple (0.0 - 1.0)
    pub sensitivity: f32,
    /// Minimum milliseconds between ripple spawns
    pub cooldown_ms: f64,
    /// Maximum simultaneous live ripples
    pub max_ripples: usize,
    /// How long the renderer animates one ripple, in seconds
    pub ripple_duration_secs: f32,
    /// Power-law compression exponent applied to band energies (< 1.0
    /// lifts quiet content)
    pub energy_exponent: f32,
    /// Gain applied to the RMS level before clamping to 1.0
    pub level_gain: f32,
    /// Bar height in pixels for silence
    pub bar_floor_px: f32,
    /// Bar height in pixels at full energy
    pub bar_ceil_px: f32,
}

impl Default for VisualizerConfig {
    fn default() -> Self {
        Self {
            mode: SourceMode::Mic,
            mic_device: None,
            fft_size: 1024,
            smoothing: 0.7,
            band_count: 36,
            sensitivity: 0.05,
            cooldown_ms: 120.0,
            max_ripples: 24,
            ripple_duration_secs: 1.6,
            energy_exponent: 0.8,
            level_gain: 4.0,
            bar_floor_px: 4.0,
            bar_ceil_px: 160.0,
        }
    }
}

impl VisualizerConfig {
    /// Check every field against its allowed range.
    ///
    /// Called once when a session is created; a config that passes here
    /// cannot fail later for range reasons.
    pub fn validate(&self) -> Result<()> {
        if !SUPPORTED_FFT_SIZES.contains(&self.fft_size) {
            return Err(CoreError::InvalidConfig(format!(
                "fft_size must be one of {:?}, got {}",
                SUPPORTED_FFT_SIZES, self.fft_size
            )));
        }
        if !(0.0..=1.0).contains(&self.smoothing) {
            return Err(CoreError::InvalidConfig(format!(
                "smoothing must be in [0, 1], got {}",
                self.smoothing
            )));
        }
        if self.band_count == 0 {
            return Err(CoreError::InvalidConfig(
                "band_count must be at least 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.sensitivity) {
            return Err(CoreError::InvalidConfig(format!(
                "sensitivity must be in [0, 1], got {}",
                self.sensitivity
            )));
        }
        if !self.cooldown_ms.is_finite() || self.cooldown_ms < 0.0 {
            return Err(CoreError::InvalidConfig(format!(
                "cooldown_ms must be finite and >= 0, got {}",
                self.cooldown_ms
            )));
        }
        if self.max_ripples == 0 {
            return Err(CoreError::InvalidConfig(
                "max_ripples must be at least 1".into(),
            ));
        }
        if !self.ripple_duration_secs.is_finite() || self.ripple_duration_secs <= 0.0 {
            return Err(CoreError::InvalidConfig(format!(
                "ripple_duration_secs must be finite and > 0, got {}",
                self.ripple_duration_secs
            )));
        }
        if !self.energy_exponent.is_finite()
            || self.energy_exponent <= 0.0
            || self.energy_exponent > 1.0
        {
            return Err(CoreError::InvalidConfig(format!(
                "energy_exponent must be in (0, 1], got {}",
                self.energy_exponent
            )));
        }
        if !self.level_gain.is_finite() || self.level_gain <= 0.0 {
            return Err(CoreError::InvalidConfig(format!(
                "level_gain must be finite and > 0, got {}",
                self.level_gain
            )));
        }
        if !self.bar_floor_px.is_finite() || self.bar_floor_px < 0.0 {
            return Err(CoreError::InvalidConfig(format!(
                "bar_floor_px must be finite and >= 0, got {}",
                self.bar_floor_px
            )));
        }
        if !self.bar_ceil_px.is_finite() || self.bar_ceil_px <= self.bar_floor_px {
            return Err(CoreError::InvalidConfig(format!(
                "bar_ceil_px must be greater than bar_floor_px ({} <= {})",
                self.bar_ceil_px, self.bar_floor_px
            )));
        }
        Ok(())
    }
}
