//! Audio source graph lifecycle
//!
//! One graph per session. It owns the live source link and the spectrum
//! analyzer, and tracks where the session is in its life: sitting armed
//! before the first start, connected and analyzing, suspended, failed, or
//! torn down for good.
//!
//! Nothing in here retries on its own. A failed acquire parks the graph
//! in `Error` until the host explicitly asks again, and `Disposed` is
//! terminal.

use crossbeam_channel::bounded;
use tracing::{debug, info, warn};

use super::backend::{AudioBackend, TrackSource};
#[cfg(feature = "audio")]
use super::backend::cpal_backend::CpalBackend;
#[cfg(any(test, feature = "mock-audio"))]
use super::backend::mock::ScriptedBackend;
use super::endpoint::TrackEndpoint;
use super::spectrum::{SpectrumAnalyzer, SpectrumSettings};
use super::{AudioError, Result};

/// Chunks buffered between a track endpoint and the graph. A frame tick
/// produces one chunk, so a handful is already generous.
const TAP_QUEUE: usize = 8;

/// Lifecycle of an audio source graph
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphState {
    /// Nothing requested yet
    Idle,
    /// Session exists, waiting for the start signal
    Armed,
    /// Source acquisition in flight
    Acquiring,
    /// Source live, analyzer fed every frame
    Connected,
    /// Source paused; state kept, output floored
    Suspended,
    /// Acquire or resume failed; waiting for an explicit retry
    Error,
    /// Torn down. Terminal.
    Disposed,
}

/// Renderer-facing readiness value derived from [`GraphState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator {
    /// Graph exists but audio is not flowing yet
    Initializing,
    /// Live analysis
    Live,
    /// Suspended, will resume
    Standby,
    /// Failed or disposed
    Disabled,
}

impl GraphState {
    /// Collapse the lifecycle into what a status readout shows.
    pub fn indicator(self) -> Indicator {
        match self {
            GraphState::Idle | GraphState::Armed | GraphState::Acquiring => Indicator::Initializing,
            GraphState::Connected => Indicator::Live,
            GraphState::Suspended => Indicator::Standby,
            GraphState::Error | GraphState::Disposed => Indicator::Disabled,
        }
    }
}

/// The live source feeding the graph
pub enum SourceLink {
    /// Microphone capture
    #[cfg(feature = "audio")]
    Mic(CpalBackend),
    /// Tap on a track endpoint
    Track(TrackSource),
    /// Scripted samples for tests and headless runs
    #[cfg(any(test, feature = "mock-audio"))]
    Scripted(ScriptedBackend),
}

impl SourceLink {
    fn kind(&self) -> &'static str {
        match self {
            #[cfg(feature = "audio")]
            SourceLink::Mic(_) => "mic",
            SourceLink::Track(_) => "track",
            #[cfg(any(test, feature = "mock-audio"))]
            SourceLink::Scripted(_) => "scripted",
        }
    }
}

impl AudioBackend for SourceLink {
    fn start(&mut self) -> Result<()> {
        match self {
            #[cfg(feature = "audio")]
            SourceLink::Mic(b) => b.start(),
            SourceLink::Track(b) => b.start(),
            #[cfg(any(test, feature = "mock-audio"))]
            SourceLink::Scripted(b) => b.start(),
        }
    }

    fn stop(&mut self) {
        match self {
            #[cfg(feature = "audio")]
            SourceLink::Mic(b) => b.stop(),
            SourceLink::Track(b) => b.stop(),
            #[cfg(any(test, feature = "mock-audio"))]
            SourceLink::Scripted(b) => b.stop(),
        }
    }

    fn is_active(&self) -> bool {
        match self {
            #[cfg(feature = "audio")]
            SourceLink::Mic(b) => b.is_active(),
            SourceLink::Track(b) => b.is_active(),
            #[cfg(any(test, feature = "mock-audio"))]
            SourceLink::Scripted(b) => b.is_active(),
        }
    }

    fn drain_samples(&mut self) -> Vec<f32> {
        match self {
            #[cfg(feature = "audio")]
            SourceLink::Mic(b) => b.drain_samples(),
            SourceLink::Track(b) => b.drain_samples(),
            #[cfg(any(test, feature = "mock-audio"))]
            SourceLink::Scripted(b) => b.drain_samples(),
        }
    }

    fn sample_rate(&self) -> u32 {
        match self {
            #[cfg(feature = "audio")]
            SourceLink::Mic(b) => b.sample_rate(),
            SourceLink::Track(b) => b.sample_rate(),
            #[cfg(any(test, feature = "mock-audio"))]
            SourceLink::Scripted(b) => b.sample_rate(),
        }
    }
}

/// Owns a session's source link and analyzer
pub struct AudioSourceGraph {
    state: GraphState,
    link: Option<SourceLink>,
    analyzer: Option<SpectrumAnalyzer>,
    fft_size: usize,
    smoothing: f32,
    /// Bumped by every acquire and teardown; a completion whose token no
    /// longer matches is stale and gets discarded.
    generation: u64,
    last_error: Option<AudioError>,
}

impl AudioSourceGraph {
    /// New idle graph. The analyzer is created lazily on first connect.
    pub fn new(fft_size: usize, smoothing: f32) -> Self {
        Self {
            state: GraphState::Idle,
            link: None,
            analyzer: None,
            fft_size,
            smoothing,
            generation: 0,
            last_error: None,
        }
    }

    /// Mark the graph as waiting for its start signal.
    pub fn arm(&mut self) {
        if self.state == GraphState::Idle {
            self.set_state(GraphState::Armed);
        }
    }

    /// Acquire the microphone. Rebinding over a live graph is allowed;
    /// the previous link is stopped first.
    #[cfg(feature = "audio")]
    pub fn acquire_mic(&mut self, device: Option<String>) -> Result<()> {
        let token = self.begin_acquire()?;
        let built = CpalBackend::new(device).map(SourceLink::Mic);
        self.complete_acquire(token, built)
    }

    /// Bind a tap on the given endpoint and acquire it as the source.
    /// Any previous tap on the endpoint is replaced.
    pub fn acquire_track(&mut self, endpoint: &mut TrackEndpoint) -> Result<()> {
        let token = self.begin_acquire()?;
        let (tx, rx) = bounded(TAP_QUEUE);
        endpoint.bind_tap(tx);
        let built = Ok(SourceLink::Track(TrackSource::new(
            rx,
            endpoint.sample_rate(),
        )));
        self.complete_acquire(token, built)
    }

    /// Acquire a scripted source.
    #[cfg(any(test, feature = "mock-audio"))]
    pub fn acquire_scripted(&mut self, backend: ScriptedBackend) -> Result<()> {
        let token = self.begin_acquire()?;
        self.complete_acquire(token, Ok(SourceLink::Scripted(backend)))
    }

    /// First phase of an acquire: invalidate whatever was live and hand
    /// back the token the completion must present.
    fn begin_acquire(&mut self) -> Result<u64> {
        if self.state == GraphState::Disposed {
            return Err(AudioError::GraphCreationFailed(
                "graph already disposed".into(),
            ));
        }
        if let Some(mut old) = self.link.take() {
            debug!("Releasing previous {} link for rebind", old.kind());
            old.stop();
        }
        self.generation += 1;
        self.set_state(GraphState::Acquiring);
        Ok(self.generation)
    }

    /// Second phase: install the built link, unless a teardown or newer
    /// acquire got here first.
    fn complete_acquire(&mut self, token: u64, built: Result<SourceLink>) -> Result<()> {
        if token != self.generation || self.state == GraphState::Disposed {
            debug!(
                "Discarding stale acquire (token {}, generation {})",
                token, self.generation
            );
            if let Ok(mut link) = built {
                link.stop();
            }
            return Ok(());
        }

        let mut link = match built {
            Ok(link) => link,
            Err(e) => {
                self.fail(e.clone());
                return Err(e);
            }
        };

        if let Err(e) = link.start() {
            self.fail(e.clone());
            return Err(e);
        }

        let sample_rate = link.sample_rate();
        self.ensure_analyzer(sample_rate);

        info!(
            "Audio graph connected: {} source @ {} Hz",
            link.kind(),
            sample_rate
        );
        self.link = Some(link);
        self.last_error = None;
        self.set_state(GraphState::Connected);
        Ok(())
    }

    /// Reuse the analyzer when its shape still fits, otherwise rebuild.
    /// Either way the new source starts from silence.
    fn ensure_analyzer(&mut self, sample_rate: u32) {
        match &mut self.analyzer {
            Some(a) if a.fft_size() == self.fft_size && a.sample_rate() == sample_rate => {
                a.reset();
            }
            _ => {
                self.analyzer = Some(SpectrumAnalyzer::new(SpectrumSettings {
                    sample_rate,
                    fft_size: self.fft_size,
                    smoothing: self.smoothing,
                }));
            }
        }
    }

    /// Restart a suspended link. No-op in any other state.
    pub fn resume(&mut self) -> Result<()> {
        if self.state != GraphState::Suspended {
            return Ok(());
        }
        match self.link.as_mut() {
            Some(link) => match link.start() {
                Ok(()) => {
                    self.set_state(GraphState::Connected);
                    Ok(())
                }
                Err(e) => {
                    self.fail(e.clone());
                    Err(e)
                }
            },
            None => {
                let e = AudioError::GraphCreationFailed("suspended graph lost its link".into());
                self.fail(e.clone());
                Err(e)
            }
        }
    }

    /// Stop the link but keep it for a later resume. No-op unless
    /// connected.
    pub fn suspend(&mut self) {
        if self.state != GraphState::Connected {
            return;
        }
        if let Some(link) = self.link.as_mut() {
            link.stop();
        }
        self.set_state(GraphState::Suspended);
    }

    /// Release everything. Safe to call any number of times; never
    /// reports an error.
    pub fn teardown(&mut self) {
        if self.state == GraphState::Disposed {
            return;
        }
        self.generation += 1;
        if let Some(mut link) = self.link.take() {
            debug!("Tearing down {} link", link.kind());
            link.stop();
        }
        self.analyzer = None;
        self.set_state(GraphState::Disposed);
    }

    /// Record a source failure and release the link.
    pub(crate) fn fail(&mut self, error: AudioError) {
        warn!("Audio graph failure: {}", error);
        if let Some(mut link) = self.link.take() {
            link.stop();
        }
        self.last_error = Some(error);
        self.set_state(GraphState::Error);
    }

    /// Pull everything the source produced since the last frame. Empty
    /// unless connected.
    pub fn drain_samples(&mut self) -> Vec<f32> {
        if self.state != GraphState::Connected {
            return Vec::new();
        }
        match self.link.as_mut() {
            Some(link) => link.drain_samples(),
            None => Vec::new(),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> GraphState {
        self.state
    }

    /// Status readout for the renderer
    pub fn indicator(&self) -> Indicator {
        self.state.indicator()
    }

    /// The analyzer, once a source has connected
    pub fn analyzer(&self) -> Option<&SpectrumAnalyzer> {
        self.analyzer.as_ref()
    }

    /// Mutable analyzer access for the per-frame feed
    pub fn analyzer_mut(&mut self) -> Option<&mut SpectrumAnalyzer> {
        self.analyzer.as_mut()
    }

    /// Most recent failure, if the graph is in `Error`
    pub fn last_error(&self) -> Option<&AudioError> {
        self.last_error.as_ref()
    }

    /// Sample rate of the live source
    pub fn sample_rate(&self) -> Option<u32> {
        self.link.as_ref().map(|l| l.sample_rate())
    }

    fn set_state(&mut self, next: GraphState) {
        if self.state != next {
            debug!("Graph state {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }
}

impl Drop for AudioSourceGraph {
    fn drop(&mut self) {
        self.teardown();
    }
}
