//! Visualizer session
//!
//! One session owns the whole pipeline for one configuration: the audio
//! graph, the feature extractor, the trigger and the ripple pool, plus
//! the track endpoint in track mode. Everything runs on whichever thread
//! ticks the session; there is no shared state and no global registry.
//!
//! The session clock is whatever `now` the caller passes, in seconds.
//! Tests drive it manually; the frame scheduler feeds it monotonic time.

use tracing::{debug, info};

use crate::audio::{
    AudioError, AudioSourceGraph, GraphState, Indicator, TrackEndpoint, TransportEvent,
};
use crate::config::{SourceMode, VisualizerConfig};
use crate::features::{FeatureExtractor, FrameOutput};
use crate::ripples::{RippleId, RipplePool};
use crate::trigger::RippleTrigger;
use crate::{CoreError, Result};

/// Owned state for one visualizer run
pub struct VisualizerSession {
    config: VisualizerConfig,
    graph: AudioSourceGraph,
    extractor: FeatureExtractor,
    trigger: RippleTrigger,
    pool: RipplePool,
    endpoint: Option<TrackEndpoint>,
    /// Clock value of the previous tick, for the endpoint delta
    last_tick: Option<f64>,
    /// Whether the start signal has arrived for this config
    engaged: bool,
}

impl VisualizerSession {
    /// Validate the config and build an armed session. Nothing touches
    /// audio hardware until [`engage`](Self::engage).
    pub fn new(config: VisualizerConfig, endpoint: Option<TrackEndpoint>) -> Result<Self> {
        config.validate()?;

        let mut graph = AudioSourceGraph::new(config.fft_size, config.smoothing);
        graph.arm();

        let extractor = FeatureExtractor::new(&config);
        let trigger = RippleTrigger::new(config.sensitivity, config.cooldown_ms);
        let pool = RipplePool::new(config.max_ripples);

        info!(
            "Session ready: {:?} mode, {} bands, fft {}",
            config.mode, config.band_count, config.fft_size
        );

        Ok(Self {
            config,
            graph,
            extractor,
            trigger,
            pool,
            endpoint,
            last_tick: None,
            engaged: false,
        })
    }

    /// The start signal. In mic mode this acquires capture immediately;
    /// in track mode it starts the endpoint and binds the tap right away.
    pub fn engage(&mut self, now: f64) -> Result<()> {
        self.engaged = true;
        self.last_tick.get_or_insert(now);

        match self.config.mode {
            SourceMode::Mic => self.engage_mic(),
            SourceMode::Track => match self.endpoint.as_mut() {
                Some(endpoint) => {
                    endpoint.play();
                    // Acquire here instead of waiting on the transport
                    // event; a rebuild mid-playback sees no new Started.
                    if self.graph.state() != GraphState::Connected {
                        self.graph.acquire_track(endpoint)?;
                    }
                    Ok(())
                }
                None => {
                    let error = AudioError::EndpointMissing("no track bound to session".into());
                    self.graph.fail(error.clone());
                    Err(error.into())
                }
            },
        }
    }

    #[cfg(feature = "audio")]
    fn engage_mic(&mut self) -> Result<()> {
        self.graph
            .acquire_mic(self.config.mic_device.clone())
            .map_err(CoreError::from)
    }

    #[cfg(not(feature = "audio"))]
    fn engage_mic(&mut self) -> Result<()> {
        let error =
            AudioError::GraphCreationFailed("microphone support not compiled in".into());
        self.graph.fail(error.clone());
        Err(error.into())
    }

    /// Pause analysis without giving anything up.
    pub fn suspend(&mut self) {
        match self.config.mode {
            SourceMode::Mic => self.graph.suspend(),
            SourceMode::Track => {
                if let Some(endpoint) = self.endpoint.as_mut() {
                    endpoint.pause();
                }
            }
        }
    }

    /// Undo a suspend. No-op when nothing is suspended.
    pub fn resume(&mut self) -> Result<()> {
        match self.config.mode {
            SourceMode::Mic => self.graph.resume().map_err(CoreError::from),
            SourceMode::Track => {
                if let Some(endpoint) = self.endpoint.as_mut() {
                    if self.engaged {
                        endpoint.play();
                    }
                }
                Ok(())
            }
        }
    }

    /// The renderer finished animating a ripple.
    pub fn ripple_finished(&mut self, id: RippleId) {
        self.pool.finish(id);
    }

    /// Produce one frame of visual features.
    pub fn tick(&mut self, now: f64) -> FrameOutput {
        let dt = match self.last_tick {
            Some(previous) => (now - previous).max(0.0),
            None => 0.0,
        };
        self.last_tick = Some(now);

        self.pump_transport();
        if let Some(endpoint) = self.endpoint.as_mut() {
            endpoint.advance(dt);
        }

        let (bar_heights, level) = if self.graph.state() == GraphState::Connected {
            let samples = self.graph.drain_samples();
            if let Some(analyzer) = self.graph.analyzer_mut() {
                analyzer.process(&samples);
            }
            match self.graph.analyzer() {
                Some(analyzer) => (
                    self.extractor.bar_heights(analyzer.magnitudes()),
                    self.extractor.level(analyzer.waveform_rms()),
                ),
                None => (self.extractor.floor_heights(), 0.0),
            }
        } else {
            (self.extractor.floor_heights(), 0.0)
        };

        if self.trigger.evaluate(level, now) {
            let ripple = self.pool.spawn(now);
            debug!("Ripple spawned: id={} level={:.3}", ripple.id, level);
        }

        FrameOutput {
            timestamp: now,
            bar_heights,
            level,
            ripples: self.pool.snapshot(),
            indicator: self.graph.indicator(),
        }
    }

    /// React to what the endpoint's transport did since the last frame.
    fn pump_transport(&mut self) {
        let Some(endpoint) = self.endpoint.as_mut() else {
            return;
        };
        while let Some(event) = endpoint.poll_event() {
            match event {
                TransportEvent::Started => match self.graph.state() {
                    GraphState::Suspended => {
                        // A resume failure lands the graph in Error with
                        // the cause recorded; output floors from there.
                        let _ = self.graph.resume();
                    }
                    GraphState::Connected | GraphState::Disposed => {}
                    _ => {
                        let _ = self.graph.acquire_track(endpoint);
                    }
                },
                TransportEvent::Paused | TransportEvent::Ended => {
                    self.graph.suspend();
                }
            }
        }
    }

    /// Tear down and rebuild for a new config. The ripple pool empties
    /// and the session re-engages on its own if it was running.
    pub fn reconfigure(
        &mut self,
        config: VisualizerConfig,
        endpoint: Option<TrackEndpoint>,
        now: f64,
    ) -> Result<()> {
        config.validate()?;

        let was_engaged = self.engaged;
        self.teardown();

        self.graph = AudioSourceGraph::new(config.fft_size, config.smoothing);
        self.graph.arm();
        self.extractor.update_config(&config);
        self.trigger = RippleTrigger::new(config.sensitivity, config.cooldown_ms);
        self.pool = RipplePool::new(config.max_ripples);
        if let Some(endpoint) = endpoint {
            self.endpoint = Some(endpoint);
        }
        self.config = config;
        self.engaged = false;

        info!(
            "Session rebuilt: {:?} mode, {} bands, fft {}",
            self.config.mode, self.config.band_count, self.config.fft_size
        );

        if was_engaged {
            self.engage(now)?;
        }
        Ok(())
    }

    /// Release the audio graph and clear the pool. The endpoint, if any,
    /// keeps its transport state; only the analysis side dies.
    pub fn teardown(&mut self) {
        self.graph.teardown();
        self.pool.clear();
        self.engaged = false;
    }

    /// Current graph lifecycle state
    pub fn state(&self) -> GraphState {
        self.graph.state()
    }

    /// Renderer-facing readiness
    pub fn indicator(&self) -> Indicator {
        self.graph.indicator()
    }

    /// Most recent audio failure, if any
    pub fn last_error(&self) -> Option<&AudioError> {
        self.graph.last_error()
    }

    /// The config this session was built for
    pub fn config(&self) -> &VisualizerConfig {
        &self.config
    }

    /// The bound endpoint, for transport inspection
    pub fn endpoint(&self) -> Option<&TrackEndpoint> {
        self.endpoint.as_ref()
    }

    /// Live ripple count
    pub fn ripple_count(&self) -> usize {
        self.pool.len()
    }
}

impl Drop for VisualizerSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track_session(seconds: f64) -> VisualizerSession {
        let sample_rate = 44100;
        let count = (seconds * sample_rate as f64) as usize;
        let endpoint = TrackEndpoint::from_samples(vec![0.5; count], sample_rate);
        let config = VisualizerConfig {
            mode: SourceMode::Track,
            ..Default::default()
        };
        VisualizerSession::new(config, Some(endpoint)).expect("session")
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = VisualizerConfig {
            fft_size: 777,
            ..Default::default()
        };
        assert!(matches!(
            VisualizerSession::new(config, None),
            Err(CoreError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_unengaged_session_floors() {
        let mut session = track_session(1.0);
        let frame = session.tick(0.0);
        assert_eq!(frame.indicator, Indicator::Initializing);
        assert_eq!(frame.level, 0.0);
        assert!(frame.bar_heights.iter().all(|&h| h == 4.0));
        assert!(frame.ripples.is_empty());
    }

    #[test]
    fn test_track_engage_connects() {
        let mut session = track_session(1.0);
        session.engage(0.0).expect("engage");
        assert_eq!(session.state(), GraphState::Connected);

        let frame = session.tick(1.0 / 60.0);
        assert_eq!(frame.indicator, Indicator::Live);
    }

    #[test]
    fn test_suspend_floors_and_resume_recovers() {
        let mut session = track_session(2.0);
        session.engage(0.0).expect("engage");
        for i in 1..6 {
            session.tick(i as f64 / 60.0);
        }

        session.suspend();
        let frame = session.tick(0.12);
        assert_eq!(frame.indicator, Indicator::Standby);
        assert_eq!(frame.level, 0.0);
        assert!(frame.bar_heights.iter().all(|&h| h == 4.0));

        session.resume().expect("resume");
        let frame = session.tick(0.15);
        assert_eq!(frame.indicator, Indicator::Live);
    }

    #[test]
    fn test_loud_track_raises_level_and_spawns() {
        let mut session = track_session(1.0);
        session.engage(0.0).expect("engage");

        let mut now = 0.0;
        let mut last = session.tick(now);
        for _ in 0..10 {
            now += 1.0 / 60.0;
            last = session.tick(now);
        }

        assert!(last.level > 0.9, "constant 0.5 track should peg the level");
        assert_eq!(
            last.ripples.len(),
            1,
            "a single sustained rise fires exactly one ripple"
        );
    }

    #[test]
    fn test_engage_without_endpoint_reports_missing() {
        let config = VisualizerConfig {
            mode: SourceMode::Track,
            ..Default::default()
        };
        let mut session = VisualizerSession::new(config, None).expect("session");
        let result = session.engage(0.0);

        assert!(matches!(
            result,
            Err(CoreError::Audio(AudioError::EndpointMissing(_)))
        ));
        assert_eq!(session.state(), GraphState::Error);
        assert_eq!(session.tick(0.1).indicator, Indicator::Disabled);
    }

    #[test]
    fn test_teardown_twice_is_silent() {
        let mut session = track_session(0.2);
        session.engage(0.0).expect("engage");
        session.tick(0.02);

        session.teardown();
        assert_eq!(session.state(), GraphState::Disposed);
        session.teardown();
        assert_eq!(session.state(), GraphState::Disposed);
        assert_eq!(session.ripple_count(), 0);
    }

    #[test]
    fn test_reconfigure_rebuilds_and_reengages() {
        let mut session = track_session(2.0);
        session.engage(0.0).expect("engage");
        for i in 1..6 {
            session.tick(i as f64 / 60.0);
        }
        assert_eq!(session.state(), GraphState::Connected);

        let narrower = VisualizerConfig {
            mode: SourceMode::Track,
            band_count: 9,
            ..Default::default()
        };
        session.reconfigure(narrower, None, 0.2).expect("reconfigure");

        assert_eq!(session.ripple_count(), 0, "pool clears on rebuild");
        let frame = session.tick(0.25);
        assert_eq!(frame.bar_heights.len(), 9);
        assert_eq!(session.state(), GraphState::Connected);
    }
}
