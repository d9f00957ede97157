//! tests/session_lifecycle_tests.rs
use pulseflow_core::{
    AudioError, CoreError, GraphState, Indicator, SourceMode, TrackEndpoint, TransportState,
    VisualizerConfig, VisualizerSession,
};

const SAMPLE_RATE: u32 = 44100;
const TICK: f64 = 1.0 / 60.0;

fn track_config() -> VisualizerConfig {
    VisualizerConfig {
        mode: SourceMode::Track,
        ..Default::default()
    }
}

fn constant_track(seconds: f64, amplitude: f32) -> TrackEndpoint {
    let count = (seconds * SAMPLE_RATE as f64) as usize;
    TrackEndpoint::from_samples(vec![amplitude; count], SAMPLE_RATE)
}

/// A sine puts energy into a real spectral bin, unlike a constant signal
/// whose power sits entirely below the analyzed range.
fn sine_track(seconds: f64, freq_hz: f32) -> TrackEndpoint {
    let count = (seconds * SAMPLE_RATE as f64) as usize;
    let samples = (0..count)
        .map(|i| 0.5 * (std::f32::consts::TAU * freq_hz * i as f32 / SAMPLE_RATE as f32).sin())
        .collect();
    TrackEndpoint::from_samples(samples, SAMPLE_RATE)
}

/// Step the session through `n` frames and return the last output.
fn run_frames(
    session: &mut VisualizerSession,
    start: f64,
    n: usize,
) -> pulseflow_core::FrameOutput {
    let mut last = session.tick(start);
    for i in 1..n {
        last = session.tick(start + i as f64 * TICK);
    }
    last
}

#[test]
fn test_output_floors_until_engaged() {
    let mut session = VisualizerSession::new(track_config(), Some(constant_track(1.0, 0.5)))
        .expect("session");

    let frame = run_frames(&mut session, 0.0, 5);
    assert_eq!(frame.indicator, Indicator::Initializing);
    assert_eq!(frame.level, 0.0);
    assert_eq!(frame.bar_heights.len(), 36);
    assert!(frame.bar_heights.iter().all(|&h| h == 4.0), "bars rest at the floor");
    assert!(frame.ripples.is_empty());
}

#[test]
fn test_live_frames_carry_energy() {
    let mut session = VisualizerSession::new(track_config(), Some(sine_track(2.0, 2756.0)))
        .expect("session");
    session.engage(0.0).expect("engage");

    let frame = run_frames(&mut session, 0.0, 12);
    assert_eq!(frame.indicator, Indicator::Live);
    assert!(frame.level > 0.9, "a half-scale sine pegs the gained level");
    assert_eq!(frame.ripples.len(), 1, "one rising edge, one ripple");
    assert!(
        frame.bar_heights.iter().any(|&h| h > 4.0),
        "some band should rise off the floor"
    );
    assert!(
        frame.bar_heights.iter().all(|&h| (4.0..=160.0).contains(&h)),
        "bars stay inside the pixel range"
    );
}

#[test]
fn test_track_end_goes_to_standby() {
    // A track shorter than the run: playback ends, analysis suspends,
    // output floors, and nothing is torn down.
    let mut session = VisualizerSession::new(track_config(), Some(constant_track(0.1, 0.5)))
        .expect("session");
    session.engage(0.0).expect("engage");

    let frame = run_frames(&mut session, 0.0, 20);
    assert_eq!(
        session.endpoint().map(|e| e.transport()),
        Some(TransportState::Ended)
    );
    assert_eq!(frame.indicator, Indicator::Standby);
    assert_eq!(frame.level, 0.0);
    assert!(frame.bar_heights.iter().all(|&h| h == 4.0));
}

#[test]
fn test_resume_replays_an_ended_track() {
    let mut session = VisualizerSession::new(track_config(), Some(constant_track(0.1, 0.5)))
        .expect("session");
    session.engage(0.0).expect("engage");
    run_frames(&mut session, 0.0, 20);
    assert_eq!(session.indicator(), Indicator::Standby);

    session.resume().expect("resume");
    let frame = session.tick(0.4);
    assert_eq!(frame.indicator, Indicator::Live, "replay re-enters the live state");
    assert_eq!(
        session.endpoint().map(|e| e.transport()),
        Some(TransportState::Playing)
    );
}

#[test]
fn test_suspend_resume_round_trip() {
    let mut session = VisualizerSession::new(track_config(), Some(constant_track(4.0, 0.5)))
        .expect("session");
    session.engage(0.0).expect("engage");
    run_frames(&mut session, 0.0, 6);
    assert_eq!(session.state(), GraphState::Connected);

    session.suspend();
    let frame = run_frames(&mut session, 0.2, 3);
    assert_eq!(session.state(), GraphState::Suspended);
    assert_eq!(frame.indicator, Indicator::Standby);
    assert_eq!(frame.level, 0.0, "suspended output floors immediately");

    session.resume().expect("resume");
    let frame = run_frames(&mut session, 0.3, 3);
    assert_eq!(frame.indicator, Indicator::Live);
}

#[test]
fn test_teardown_twice_stays_quiet() {
    let mut session = VisualizerSession::new(track_config(), Some(constant_track(1.0, 0.5)))
        .expect("session");
    session.engage(0.0).expect("engage");
    run_frames(&mut session, 0.0, 6);

    session.teardown();
    assert_eq!(session.state(), GraphState::Disposed);
    assert_eq!(session.ripple_count(), 0, "the pool empties with the graph");

    // A second teardown must not panic, error, or change anything.
    session.teardown();
    assert_eq!(session.state(), GraphState::Disposed);

    let frame = session.tick(1.0);
    assert_eq!(frame.indicator, Indicator::Disabled);
    assert_eq!(frame.level, 0.0);
}

#[test]
fn test_missing_endpoint_is_reported_not_fatal() {
    let mut session = VisualizerSession::new(track_config(), None).expect("session");

    let result = session.engage(0.0);
    assert!(matches!(
        result,
        Err(CoreError::Audio(AudioError::EndpointMissing(_)))
    ));
    assert_eq!(session.state(), GraphState::Error);

    // The session still ticks and floors; the host decides what is next.
    let frame = run_frames(&mut session, 0.0, 3);
    assert_eq!(frame.indicator, Indicator::Disabled);
    assert!(frame.bar_heights.iter().all(|&h| h == 4.0));
}

#[test]
fn test_reconfigure_resizes_and_clears() {
    let mut session = VisualizerSession::new(track_config(), Some(constant_track(4.0, 0.5)))
        .expect("session");
    session.engage(0.0).expect("engage");
    let frame = run_frames(&mut session, 0.0, 10);
    assert_eq!(frame.ripples.len(), 1);

    let reshaped = VisualizerConfig {
        band_count: 18,
        fft_size: 512,
        ..track_config()
    };
    session.reconfigure(reshaped, None, 0.2).expect("reconfigure");

    assert_eq!(session.ripple_count(), 0, "old ripples do not survive a rebuild");
    let frame = run_frames(&mut session, 0.25, 6);
    assert_eq!(frame.bar_heights.len(), 18);
    assert_eq!(frame.indicator, Indicator::Live, "an engaged session re-engages itself");
}

#[test]
fn test_invalid_reconfigure_keeps_session_running() {
    let mut session = VisualizerSession::new(track_config(), Some(constant_track(4.0, 0.5)))
        .expect("session");
    session.engage(0.0).expect("engage");
    run_frames(&mut session, 0.0, 6);

    let broken = VisualizerConfig {
        smoothing: 2.0,
        ..track_config()
    };
    assert!(session.reconfigure(broken, None, 0.2).is_err());

    assert_eq!(session.state(), GraphState::Connected, "the old session keeps going");
    let frame = run_frames(&mut session, 0.25, 3);
    assert_eq!(frame.bar_heights.len(), 36);
}
