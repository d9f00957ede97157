//! Playable track endpoint
//!
//! A `TrackEndpoint` is the engine's stand-in for a media element: it owns
//! decoded audio, a transport (play / pause / stop), and a single sample
//! tap that the source graph binds to. The endpoint has no thread or
//! clock of its own; the session advances it once per frame and polls the
//! transport events that advancing produced.

use crossbeam_channel::{Sender, TrySendError};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use super::{AudioError, Result};

/// Transport position of a track endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    /// Not playing, cursor at the start
    Stopped,
    /// Delivering samples
    Playing,
    /// Not playing, cursor held
    Paused,
    /// Ran off the end of the track
    Ended,
}

/// Edge-triggered transport notifications, polled by the session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportEvent {
    /// Playback began or resumed
    Started,
    /// Playback paused or was stopped
    Paused,
    /// The track finished
    Ended,
}

/// In-memory audio track with a transport and one sample tap
pub struct TrackEndpoint {
    /// Decoded mono samples
    samples: Arc<Vec<f32>>,
    sample_rate: u32,
    /// Next sample to deliver
    cursor: usize,
    /// Fractional sample carry between advances
    carry: f64,
    state: TransportState,
    /// Pending events in emission order
    events: VecDeque<TransportEvent>,
    /// Bound sample tap, if any. Binding again replaces it.
    tap: Option<Sender<Vec<f32>>>,
    /// Chunks the tap refused because its queue was full
    tap_dropped: u64,
}

impl TrackEndpoint {
    /// Wrap already-decoded mono samples.
    pub fn from_samples(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples: Arc::new(samples),
            sample_rate,
            cursor: 0,
            carry: 0.0,
            state: TransportState::Stopped,
            events: VecDeque::new(),
            tap: None,
            tap_dropped: 0,
        }
    }

    /// Decode a WAV file, downmixing to mono.
    pub fn from_wav_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = hound::WavReader::open(path)
            .map_err(|e| AudioError::EndpointMissing(format!("{}: {}", path.display(), e)))?;

        let spec = reader.spec();
        let channels = spec.channels as usize;
        if channels == 0 {
            return Err(AudioError::EndpointMissing(format!(
                "{}: zero channels",
                path.display()
            )));
        }

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| AudioError::EndpointMissing(format!("{}: {}", path.display(), e)))?,
            hound::SampleFormat::Int => {
                let full_scale = if spec.bits_per_sample >= 32 {
                    2_147_483_648.0_f32
                } else {
                    (1_i64 << (spec.bits_per_sample - 1)) as f32
                };
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / full_scale))
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(|e| AudioError::EndpointMissing(format!("{}: {}", path.display(), e)))?
            }
        };

        let mono: Vec<f32> = if channels == 1 {
            interleaved
        } else {
            interleaved
                .chunks(channels)
                .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
                .collect()
        };

        info!(
            "Loaded track {}: {:.1}s @ {} Hz ({} ch downmixed)",
            path.display(),
            mono.len() as f64 / spec.sample_rate as f64,
            spec.sample_rate,
            channels
        );

        Ok(Self::from_samples(mono, spec.sample_rate))
    }

    /// Begin or resume playback. Playing after the track ended restarts
    /// it from the top. No-op while already playing.
    pub fn play(&mut self) {
        match self.state {
            TransportState::Playing => {}
            TransportState::Ended => {
                self.cursor = 0;
                self.carry = 0.0;
                self.state = TransportState::Playing;
                self.events.push_back(TransportEvent::Started);
            }
            TransportState::Stopped | TransportState::Paused => {
                self.state = TransportState::Playing;
                self.events.push_back(TransportEvent::Started);
            }
        }
    }

    /// Hold the cursor. No-op unless playing.
    pub fn pause(&mut self) {
        if self.state == TransportState::Playing {
            self.state = TransportState::Paused;
            self.events.push_back(TransportEvent::Paused);
        }
    }

    /// Halt and rewind.
    pub fn stop(&mut self) {
        let was_playing = self.state == TransportState::Playing;
        self.state = TransportState::Stopped;
        self.cursor = 0;
        self.carry = 0.0;
        if was_playing {
            self.events.push_back(TransportEvent::Paused);
        }
    }

    /// True whenever the endpoint is not delivering samples
    pub fn paused(&self) -> bool {
        self.state != TransportState::Playing
    }

    /// Current transport state
    pub fn transport(&self) -> TransportState {
        self.state
    }

    /// Oldest unpolled transport event, if any.
    pub fn poll_event(&mut self) -> Option<TransportEvent> {
        self.events.pop_front()
    }

    /// Bind the sample tap, replacing any previous one. The old tap's
    /// receiver disconnects.
    pub fn bind_tap(&mut self, tap: Sender<Vec<f32>>) {
        if self.tap.is_some() {
            debug!("Track tap rebound, dropping previous tap");
        }
        self.tap = Some(tap);
    }

    /// Remove the bound tap, if any.
    pub fn unbind_tap(&mut self) {
        self.tap = None;
    }

    /// Move the clock forward by `dt` seconds and deliver that much audio
    /// to the tap. Does nothing unless playing.
    pub fn advance(&mut self, dt: f64) {
        if self.state != TransportState::Playing || dt <= 0.0 {
            return;
        }

        let exact = dt * self.sample_rate as f64 + self.carry;
        let count = exact.floor() as usize;
        self.carry = exact - count as f64;
        if count == 0 {
            return;
        }

        let end = (self.cursor + count).min(self.samples.len());
        let chunk = self.samples[self.cursor..end].to_vec();
        self.cursor = end;

        if let Some(tap) = &self.tap {
            match tap.try_send(chunk) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    self.tap_dropped += 1;
                }
                Err(TrySendError::Disconnected(_)) => {
                    debug!("Track tap receiver gone, unbinding");
                    self.tap = None;
                }
            }
        }

        if self.cursor >= self.samples.len() {
            self.state = TransportState::Ended;
            self.events.push_back(TransportEvent::Ended);
            debug!("Track ended after {:.1}s", self.position_secs());
        }
    }

    /// Sample rate of the decoded audio
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Track length in seconds
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Cursor position in seconds
    pub fn position_secs(&self) -> f64 {
        self.cursor as f64 / self.sample_rate as f64
    }

    /// Chunks dropped because the tap queue was full
    pub fn tap_dropped(&self) -> u64 {
        self.tap_dropped
    }
}

impl std::fmt::Debug for TrackEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackEndpoint")
            .field("samples", &self.samples.len())
            .field("sample_rate", &self.sample_rate)
            .field("cursor", &self.cursor)
            .field("state", &self.state)
            .finish()
    }
}
