//! FFT spectrum analysis
//!
//! Streams samples into a ring buffer and runs a Hann-windowed forward FFT
//! every half window. Magnitudes are normalized so a full-scale sine lands
//! near 1.0, then exponentially smoothed; the last full window of raw
//! samples is kept for RMS level read-out.

use num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, trace};

/// Analyzer shape and response settings
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumSettings {
    /// Sample rate reported by the bound source
    pub sample_rate: u32,
    /// FFT window size (power of 2)
    pub fft_size: usize,
    /// Magnitude smoothing factor (0.0 - 1.0, higher = slower response)
    pub smoothing: f32,
}

impl Default for SpectrumSettings {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            fft_size: 1024,
            smoothing: 0.7,
        }
    }
}

/// Streaming FFT analyzer for one audio source
pub struct SpectrumAnalyzer {
    /// Forward FFT plan
    fft: Arc<dyn Fft<f32>>,

    settings: SpectrumSettings,

    /// Input sample ring buffer, one FFT window long
    ring: Vec<f32>,

    /// Write position in the ring
    write_pos: usize,

    /// Samples accumulated since the last FFT
    samples_since_fft: usize,

    /// Samples between FFT frames (half a window)
    hop_size: usize,

    /// FFT work buffer
    fft_buffer: Vec<Complex<f32>>,

    /// FFT scratch space
    scratch: Vec<Complex<f32>>,

    /// Hann window coefficients
    window: Vec<f32>,

    /// Magnitude normalization so a full-scale sine reads ~1.0
    norm: f32,

    /// Smoothed magnitudes for the positive-frequency bins
    smoothed: Vec<f32>,

    /// Last window of raw samples, clamped to [-1, 1]
    waveform: VecDeque<f32>,

    total_samples: u64,
    fft_count: u64,
}

impl SpectrumAnalyzer {
    /// Create an analyzer for the given settings.
    pub fn new(settings: SpectrumSettings) -> Self {
        let fft_size = settings.fft_size;

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        let window = hann_window(fft_size);
        let window_sum: f32 = window.iter().sum();

        debug!(
            "SpectrumAnalyzer created: sample_rate={}, fft_size={}, smoothing={}",
            settings.sample_rate, fft_size, settings.smoothing
        );

        Self {
            fft,
            ring: vec![0.0; fft_size],
            write_pos: 0,
            samples_since_fft: 0,
            hop_size: (fft_size / 2).max(1),
            fft_buffer: vec![Complex::new(0.0, 0.0); fft_size],
            scratch: vec![Complex::new(0.0, 0.0); fft_size],
            window,
            norm: 2.0 / window_sum,
            smoothed: vec![0.0; fft_size / 2],
            waveform: VecDeque::with_capacity(fft_size),
            total_samples: 0,
            fft_count: 0,
            settings,
        }
    }

    /// Feed a chunk of mono samples.
    ///
    /// Non-finite samples are zeroed and everything is clamped to [-1, 1]
    /// before it can reach a downstream metric.
    pub fn process(&mut self, samples: &[f32]) {
        if samples.is_empty() {
            return;
        }

        for &raw in samples {
            let sample = if raw.is_finite() {
                raw.clamp(-1.0, 1.0)
            } else {
                0.0
            };

            if self.waveform.len() == self.settings.fft_size {
                self.waveform.pop_front();
            }
            self.waveform.push_back(sample);

            self.ring[self.write_pos] = sample;
            self.write_pos = (self.write_pos + 1) % self.settings.fft_size;
            self.samples_since_fft += 1;
            self.total_samples += 1;

            // Run the FFT every hop once the ring holds a full window.
            if self.samples_since_fft >= self.hop_size
                && self.total_samples >= self.settings.fft_size as u64
            {
                self.run_fft();
                self.samples_since_fft = 0;
            }
        }

        // Roughly once per second of audio at common rates.
        if self.total_samples % u64::from(self.settings.sample_rate.max(1))
            < samples.len() as u64
        {
            debug!(
                "Spectrum: {}k samples in, {} FFTs, rms={:.4}",
                self.total_samples / 1000,
                self.fft_count,
                self.waveform_rms()
            );
        }
    }

    fn run_fft(&mut self) {
        self.fft_count += 1;

        // Unwrap the ring into the work buffer; the write position is the
        // oldest sample.
        for i in 0..self.settings.fft_size {
            let src = (self.write_pos + i) % self.settings.fft_size;
            self.fft_buffer[i] = Complex::new(self.ring[src] * self.window[i], 0.0);
        }

        self.fft
            .process_with_scratch(&mut self.fft_buffer, &mut self.scratch);

        let smoothing = self.settings.smoothing;
        for (i, slot) in self.smoothed.iter_mut().enumerate() {
            let magnitude = self.fft_buffer[i].norm() * self.norm;
            *slot = *slot * smoothing + magnitude * (1.0 - smoothing);
        }

        if self.fft_count % 100 == 0 {
            trace!("FFT #{}: low bins={:?}", self.fft_count, &self.smoothed[..4]);
        }
    }

    /// Smoothed positive-frequency magnitudes. Index i covers
    /// `i * sample_rate / fft_size` Hz; a full-scale sine reads ~1.0 at
    /// its bin.
    pub fn magnitudes(&self) -> &[f32] {
        &self.smoothed
    }

    /// RMS of the most recent window of raw samples
    pub fn waveform_rms(&self) -> f32 {
        if self.waveform.is_empty() {
            return 0.0;
        }
        let sum: f32 = self.waveform.iter().map(|s| s * s).sum();
        (sum / self.waveform.len() as f32).sqrt()
    }

    /// Clear all buffers and smoothing state. Used when a new source binds
    /// so it never sees the previous source's decay.
    pub fn reset(&mut self) {
        self.ring.fill(0.0);
        self.write_pos = 0;
        self.samples_since_fft = 0;
        self.smoothed.fill(0.0);
        self.waveform.clear();
        self.total_samples = 0;
        self.fft_count = 0;

        debug!("SpectrumAnalyzer reset");
    }

    /// FFT window size this analyzer was planned for
    pub fn fft_size(&self) -> usize {
        self.settings.fft_size
    }

    /// Sample rate of the bound source
    pub fn sample_rate(&self) -> u32 {
        self.settings.sample_rate
    }

    /// Smoothing factor in use
    pub fn smoothing(&self) -> f32 {
        self.settings.smoothing
    }
}

fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            let t = i as f32 / (size - 1) as f32;
            0.5 * (1.0 - (2.0 * std::f32::consts::PI * t).cos())
        })
        .collect()
}
