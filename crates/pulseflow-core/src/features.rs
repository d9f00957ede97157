//! Per-frame feature extraction
//!
//! Turns the analyzer's smoothed spectrum and waveform RMS into what the
//! renderers consume: pixel-mapped bar heights and a 0-1 amplitude level.
//! The bar path compresses band energies with a sub-unity exponent so
//! quiet material still moves the bars, then maps into the configured
//! pixel range. When no source is connected the extractor emits floor
//! values instead of stale data.

use crate::audio::Indicator;
use crate::bands::BandMap;
use crate::config::VisualizerConfig;
use crate::ripples::Ripple;

/// Everything the renderers need for one display frame
#[derive(Debug, Clone)]
pub struct FrameOutput {
    /// Session-clock time this frame was produced, seconds
    pub timestamp: f64,
    /// One pixel height per visualizer bar, low frequencies first
    pub bar_heights: Vec<f32>,
    /// Smoothed amplitude level in [0, 1]
    pub level: f32,
    /// Live ripples, oldest first
    pub ripples: Vec<Ripple>,
    /// Readiness of the audio graph behind this frame
    pub indicator: Indicator,
}

/// Maps analyzer read-outs to renderer values
#[derive(Debug)]
pub struct FeatureExtractor {
    band_map: BandMap,
    energy_exponent: f32,
    level_gain: f32,
    bar_floor_px: f32,
    bar_ceil_px: f32,
}

impl FeatureExtractor {
    /// Build from the session config.
    pub fn new(config: &VisualizerConfig) -> Self {
        Self {
            band_map: BandMap::new(config.band_count, config.fft_size),
            energy_exponent: config.energy_exponent,
            level_gain: config.level_gain,
            bar_floor_px: config.bar_floor_px,
            bar_ceil_px: config.bar_ceil_px,
        }
    }

    /// Adopt a new config, recomputing the band map only if its shape
    /// changed.
    pub fn update_config(&mut self, config: &VisualizerConfig) {
        self.band_map.ensure(config.band_count, config.fft_size);
        self.energy_exponent = config.energy_exponent;
        self.level_gain = config.level_gain;
        self.bar_floor_px = config.bar_floor_px;
        self.bar_ceil_px = config.bar_ceil_px;
    }

    /// Pixel heights for the current spectrum, one per band.
    pub fn bar_heights(&self, magnitudes: &[f32]) -> Vec<f32> {
        let span = self.bar_ceil_px - self.bar_floor_px;
        self.band_map
            .ranges()
            .iter()
            .map(|range| {
                let end = range.end.min(magnitudes.len());
                let slice = if range.start < end {
                    &magnitudes[range.start..end]
                } else {
                    &[][..]
                };
                let energy = if slice.is_empty() {
                    0.0
                } else {
                    slice.iter().sum::<f32>() / slice.len() as f32
                };
                let compressed = energy.clamp(0.0, 1.0).powf(self.energy_exponent);
                self.bar_floor_px + compressed * span
            })
            .collect()
    }

    /// Amplitude level from the waveform RMS: gain then hard clamp.
    pub fn level(&self, rms: f32) -> f32 {
        (rms * self.level_gain).clamp(0.0, 1.0)
    }

    /// Heights for frames without a connected source.
    pub fn floor_heights(&self) -> Vec<f32> {
        vec![self.bar_floor_px; self.band_map.band_count()]
    }

    /// The cached band map
    pub fn band_map(&self) -> &BandMap {
        &self.band_map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> FeatureExtractor {
        FeatureExtractor::new(&VisualizerConfig::default())
    }

    #[test]
    fn test_heights_match_band_count() {
        let ex = extractor();
        let magnitudes = vec![0.5; 512];
        assert_eq!(ex.bar_heights(&magnitudes).len(), 36);
    }

    #[test]
    fn test_silence_sits_on_the_floor() {
        let ex = extractor();
        let magnitudes = vec![0.0; 512];
        for height in ex.bar_heights(&magnitudes) {
            assert_eq!(height, 4.0);
        }
    }

    #[test]
    fn test_full_energy_reaches_the_ceiling() {
        let ex = extractor();
        let magnitudes = vec![1.0; 512];
        for height in ex.bar_heights(&magnitudes) {
            assert!((height - 160.0).abs() < 1e-3, "height was {}", height);
        }
    }

    #[test]
    fn test_heights_stay_inside_pixel_band() {
        let ex = extractor();
        let magnitudes: Vec<f32> = (0..512).map(|i| (i as f32 * 0.37).sin().abs()).collect();
        for height in ex.bar_heights(&magnitudes) {
            assert!((4.0..=160.0).contains(&height), "height was {}", height);
        }
    }

    #[test]
    fn test_compression_lifts_quiet_energy() {
        let ex = extractor();
        let quiet = vec![0.1; 512];
        let heights = ex.bar_heights(&quiet);

        // Linear mapping of 0.1 over the 156 px span would be ~19.6 px
        // above the floor; the 0.8 exponent must land higher.
        let linear = 4.0 + 0.1 * 156.0;
        for height in heights {
            assert!(
                height > linear,
                "sub-unity exponent should lift quiet bars: {} <= {}",
                height,
                linear
            );
        }
    }

    #[test]
    fn test_overrange_magnitudes_are_clamped() {
        let ex = extractor();
        let hot = vec![3.0; 512];
        for height in ex.bar_heights(&hot) {
            assert!(height <= 160.0 + 1e-3);
        }
    }

    #[test]
    fn test_level_applies_gain_and_clamp() {
        let ex = extractor();
        assert!((ex.level(0.1) - 0.4).abs() < 1e-6);
        assert_eq!(ex.level(0.5), 1.0, "gain output must clamp at 1");
        assert_eq!(ex.level(0.0), 0.0);
    }

    #[test]
    fn test_floor_heights_shape() {
        let ex = extractor();
        let floors = ex.floor_heights();
        assert_eq!(floors.len(), 36);
        assert!(floors.iter().all(|&h| h == 4.0));
    }

    #[test]
    fn test_update_config_reshapes_band_map() {
        let mut ex = extractor();
        let config = VisualizerConfig {
            band_count: 9,
            ..Default::default()
        };
        ex.update_config(&config);
        assert_eq!(ex.floor_heights().len(), 9);
        let magnitudes = vec![0.2; 512];
        assert_eq!(ex.bar_heights(&magnitudes).len(), 9);
    }

    #[test]
    fn test_short_magnitude_buffer_yields_floor_tail() {
        // Bands that reach past the buffer read as silent rather than
        // panicking.
        let ex = extractor();
        let short = vec![1.0; 64];
        let heights = ex.bar_heights(&short);
        assert_eq!(heights.len(), 36);
        assert_eq!(*heights.last().unwrap(), 4.0);
        assert!(heights[0] > 4.0);
    }
}
