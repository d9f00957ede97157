//! Microphone capture via cpal
//!
//! The capture callback downmixes to mono and hands chunks to a bounded
//! channel; the graph drains that channel once per frame. When the channel
//! is full the chunk is dropped and counted instead of blocking the audio
//! thread.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::AudioBackend;
use crate::audio::{AudioError, Result};

/// Chunks buffered between the capture callback and the frame tick.
/// At 48 kHz with typical callback sizes this is comfortably over a
/// second of backlog.
const CHUNK_QUEUE: usize = 64;

/// Live microphone input
pub struct CpalBackend {
    stream: cpal::Stream,
    rx: Receiver<Vec<f32>>,
    sample_rate: u32,
    device_name: String,
    active: bool,
    dropped_chunks: Arc<AtomicU64>,
}

impl CpalBackend {
    /// Open the named input device, or the host default when `None`.
    ///
    /// The stream is built immediately but stays paused until
    /// [`AudioBackend::start`].
    pub fn new(device: Option<String>) -> Result<Self> {
        let host = cpal::default_host();

        let device = match device {
            Some(name) => host
                .input_devices()
                .map_err(|e| map_backend_error(&e.to_string()))?
                .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                .ok_or_else(|| {
                    AudioError::DeviceUnavailable(format!("input device '{}' not found", name))
                })?,
            None => host.default_input_device().ok_or_else(|| {
                AudioError::DeviceUnavailable("no default input device".into())
            })?,
        };

        let device_name = device
            .name()
            .unwrap_or_else(|_| "unknown input".to_string());

        let supported = device.default_input_config().map_err(|e| match e {
            cpal::DefaultStreamConfigError::DeviceNotAvailable => {
                AudioError::DeviceUnavailable(device_name.clone())
            }
            other => map_backend_error(&other.to_string()),
        })?;

        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported.into();
        let channels = config.channels as usize;
        let sample_rate = config.sample_rate.0;

        info!(
            "Opening capture on '{}': {} ch @ {} Hz, {:?}",
            device_name, channels, sample_rate, sample_format
        );

        let (tx, rx) = bounded(CHUNK_QUEUE);
        let dropped_chunks = Arc::new(AtomicU64::new(0));

        let stream = build_stream(
            &device,
            &config,
            sample_format,
            channels,
            tx,
            dropped_chunks.clone(),
        )?;

        // Some hosts start streams implicitly on build.
        if let Err(e) = stream.pause() {
            debug!("Could not pre-pause capture stream: {}", e);
        }

        Ok(Self {
            stream,
            rx,
            sample_rate,
            device_name,
            active: false,
            dropped_chunks,
        })
    }

    /// Names of every available input device.
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let devices = host
            .input_devices()
            .map_err(|e| map_backend_error(&e.to_string()))?;
        Ok(devices.filter_map(|d| d.name().ok()).collect())
    }

    /// Device this backend captures from
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Chunks dropped because the frame tick fell behind
    pub fn dropped_chunks(&self) -> u64 {
        self.dropped_chunks.load(Ordering::Relaxed)
    }
}

impl AudioBackend for CpalBackend {
    fn start(&mut self) -> Result<()> {
        self.stream
            .play()
            .map_err(|e| map_backend_error(&e.to_string()))?;
        self.active = true;
        debug!("Capture started on '{}'", self.device_name);
        Ok(())
    }

    fn stop(&mut self) {
        if let Err(e) = self.stream.pause() {
            debug!("Capture pause failed (ignored): {}", e);
        }
        self.active = false;
        // Throw away anything buffered while going inactive.
        while self.rx.try_recv().is_ok() {}
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn drain_samples(&mut self) -> Vec<f32> {
        if !self.active {
            while self.rx.try_recv().is_ok() {}
            return Vec::new();
        }
        let mut out = Vec::new();
        while let Ok(chunk) = self.rx.try_recv() {
            out.extend_from_slice(&chunk);
        }
        out
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

fn build_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: cpal::SampleFormat,
    channels: usize,
    tx: Sender<Vec<f32>>,
    dropped: Arc<AtomicU64>,
) -> Result<cpal::Stream> {
    let err_fn = |err| warn!("Capture stream error: {}", err);

    let stream = match sample_format {
        cpal::SampleFormat::F32 => device.build_input_stream(
            config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                push_mono(data.iter().copied(), channels, &tx, &dropped);
            },
            err_fn,
            None,
        ),
        cpal::SampleFormat::I16 => device.build_input_stream(
            config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                push_mono(
                    data.iter().map(|&s| s as f32 / 32768.0),
                    channels,
                    &tx,
                    &dropped,
                );
            },
            err_fn,
            None,
        ),
        cpal::SampleFormat::U16 => device.build_input_stream(
            config,
            move |data: &[u16], _: &cpal::InputCallbackInfo| {
                push_mono(
                    data.iter().map(|&s| (s as f32 - 32768.0) / 32768.0),
                    channels,
                    &tx,
                    &dropped,
                );
            },
            err_fn,
            None,
        ),
        other => {
            return Err(AudioError::GraphCreationFailed(format!(
                "unsupported capture sample format {:?}",
                other
            )))
        }
    };

    stream.map_err(|e| match e {
        cpal::BuildStreamError::DeviceNotAvailable => {
            AudioError::DeviceUnavailable("capture device went away".into())
        }
        cpal::BuildStreamError::StreamConfigNotSupported => {
            AudioError::GraphCreationFailed("capture config not supported".into())
        }
        other => map_backend_error(&other.to_string()),
    })
}

/// Downmix interleaved frames to mono and hand the chunk off without
/// blocking the audio thread.
fn push_mono(
    samples: impl Iterator<Item = f32>,
    channels: usize,
    tx: &Sender<Vec<f32>>,
    dropped: &AtomicU64,
) {
    let interleaved: Vec<f32> = samples.collect();
    let mono: Vec<f32> = if channels <= 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    };

    match tx.try_send(mono) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => {
            dropped.fetch_add(1, Ordering::Relaxed);
        }
        Err(TrySendError::Disconnected(_)) => {}
    }
}

/// Classify an opaque backend error string. Platforms report capture
/// permission refusals as backend-specific errors, so the text is the
/// only signal available.
fn map_backend_error(message: &str) -> AudioError {
    let lower = message.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("not allowed") {
        AudioError::PermissionDenied(message.to_string())
    } else {
        AudioError::GraphCreationFailed(message.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_classification() {
        assert!(matches!(
            map_backend_error("Access denied by user"),
            AudioError::PermissionDenied(_)
        ));
        assert!(matches!(
            map_backend_error("ALSA function call failed"),
            AudioError::GraphCreationFailed(_)
        ));
    }

    // Device-dependent paths are covered by the scripted backend; opening
    // real hardware in CI is unreliable. This only checks that enumeration
    // does not error on hosts without any input device.
    #[test]
    fn test_list_devices_does_not_panic() {
        let _ = CpalBackend::list_devices();
    }
}
