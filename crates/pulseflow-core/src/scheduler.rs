//! Frame scheduler
//!
//! Runs a [`VisualizerSession`] on a dedicated thread at a fixed refresh
//! rate and streams [`FrameOutput`]s to the host over a bounded channel:
//! - Scheduler thread: ticks the session, applies control commands
//! - Host thread: drains frames and drives the renderer
//!
//! The session is built inside the scheduler thread, not on the host.
//! Mic capture streams cannot leave the thread that created them, so the
//! host talks to the session exclusively through [`SchedulerCommand`]s.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::audio::TrackEndpoint;
use crate::config::VisualizerConfig;
use crate::features::FrameOutput;
use crate::ripples::RippleId;
use crate::session::VisualizerSession;
use crate::Result;

/// Frames buffered toward the host before the scheduler starts dropping
const FRAME_QUEUE: usize = 3;

/// Control messages queued toward the scheduler thread
const COMMAND_QUEUE: usize = 32;

/// Scheduler statistics
#[derive(Debug, Clone, Copy, Default)]
pub struct SchedulerStats {
    /// Frames delivered to the host
    pub frames: u64,
    /// Frames dropped because the host was not draining
    pub dropped_frames: u64,
    /// Duration of the most recent tick, in milliseconds
    pub tick_time_ms: f64,
}

/// Control messages for the scheduler thread
#[derive(Debug)]
pub enum SchedulerCommand {
    /// The start gesture: begin capture or playback
    Engage,
    /// Pause analysis without releasing the source
    Suspend,
    /// Undo a suspend
    Resume,
    /// Renderer finished animating a ripple
    RippleFinished(RippleId),
    /// Tear down and rebuild with a new config. An invalid config is
    /// rejected and the current session keeps running.
    Reconfigure {
        /// Replacement configuration
        config: VisualizerConfig,
        /// Replacement track, or `None` to keep the bound one
        endpoint: Option<TrackEndpoint>,
    },
}

/// Handle to a running scheduler thread
pub struct FrameScheduler {
    commands: Sender<SchedulerCommand>,
    frames: Receiver<FrameOutput>,
    running: Arc<AtomicBool>,
    stats: Arc<parking_lot::RwLock<SchedulerStats>>,
    thread: Option<JoinHandle<()>>,
}

impl FrameScheduler {
    /// Validate the config and spawn the scheduler thread. A non-finite
    /// or non-positive refresh rate falls back to 60 Hz.
    pub fn start(
        config: VisualizerConfig,
        endpoint: Option<TrackEndpoint>,
        refresh_hz: f64,
    ) -> Result<Self> {
        config.validate()?;

        let refresh_hz = if refresh_hz.is_finite() && refresh_hz > 0.0 {
            refresh_hz
        } else {
            warn!("Invalid refresh rate {refresh_hz}, using 60 Hz");
            60.0
        };

        let (command_tx, command_rx) = bounded(COMMAND_QUEUE);
        let (frame_tx, frame_rx) = bounded(FRAME_QUEUE);
        let running = Arc::new(AtomicBool::new(true));
        let stats = Arc::new(parking_lot::RwLock::new(SchedulerStats::default()));

        let thread_running = running.clone();
        let thread_stats = stats.clone();
        let thread = thread::Builder::new()
            .name("visualizer-tick".to_string())
            .spawn(move || {
                run_loop(
                    config,
                    endpoint,
                    refresh_hz,
                    command_rx,
                    frame_tx,
                    thread_running,
                    thread_stats,
                );
            })
            .expect("Failed to spawn scheduler thread");

        Ok(Self {
            commands: command_tx,
            frames: frame_rx,
            running,
            stats,
            thread: Some(thread),
        })
    }

    /// Send the start gesture.
    pub fn engage(&self) {
        self.send(SchedulerCommand::Engage);
    }

    /// Pause analysis.
    pub fn suspend(&self) {
        self.send(SchedulerCommand::Suspend);
    }

    /// Undo a suspend.
    pub fn resume(&self) {
        self.send(SchedulerCommand::Resume);
    }

    /// Report a finished ripple animation.
    pub fn ripple_finished(&self, id: RippleId) {
        self.send(SchedulerCommand::RippleFinished(id));
    }

    /// Swap in a new config, tearing down and rebuilding the session.
    pub fn reconfigure(&self, config: VisualizerConfig, endpoint: Option<TrackEndpoint>) {
        self.send(SchedulerCommand::Reconfigure { config, endpoint });
    }

    fn send(&self, command: SchedulerCommand) {
        if let Err(e) = self.commands.try_send(command) {
            warn!("Scheduler command dropped: {e}");
        }
    }

    /// Channel of produced frames, for host select loops
    pub fn frames(&self) -> &Receiver<FrameOutput> {
        &self.frames
    }

    /// Drain anything queued and return the freshest frame.
    pub fn latest_frame(&self) -> Option<FrameOutput> {
        let mut latest = None;
        while let Ok(frame) = self.frames.try_recv() {
            latest = Some(frame);
        }
        latest
    }

    /// Scheduler statistics
    pub fn stats(&self) -> SchedulerStats {
        *self.stats.read()
    }

    /// Whether the scheduler thread is still alive
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Stop the scheduler and join its thread.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);

        if let Some(thread) = self.thread.take() {
            info!("Stopping scheduler");
            thread.join().expect("Failed to join scheduler thread");
        }
    }
}

impl Drop for FrameScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_loop(
    config: VisualizerConfig,
    endpoint: Option<TrackEndpoint>,
    refresh_hz: f64,
    commands: Receiver<SchedulerCommand>,
    frames: Sender<FrameOutput>,
    running: Arc<AtomicBool>,
    stats: Arc<parking_lot::RwLock<SchedulerStats>>,
) {
    info!("Scheduler thread started at {refresh_hz:.0} Hz");

    let mut session = match VisualizerSession::new(config, endpoint) {
        Ok(session) => session,
        Err(e) => {
            warn!("Session construction failed: {e}");
            running.store(false, Ordering::Relaxed);
            return;
        }
    };

    let frame_duration = Duration::from_secs_f64(1.0 / refresh_hz);
    let epoch = Instant::now();

    while running.load(Ordering::Relaxed) {
        let start = Instant::now();
        let now = epoch.elapsed().as_secs_f64();

        while let Ok(command) = commands.try_recv() {
            handle_command(&mut session, command, now);
        }

        let frame = session.tick(now);
        match frames.try_send(frame) {
            Ok(()) => {
                let mut stats = stats.write();
                stats.frames += 1;
                stats.tick_time_ms = start.elapsed().as_secs_f64() * 1000.0;
            }
            Err(TrySendError::Full(_)) => {
                stats.write().dropped_frames += 1;
            }
            Err(TrySendError::Disconnected(_)) => {
                info!("Frame channel disconnected");
                break;
            }
        }

        let elapsed = start.elapsed();
        if elapsed < frame_duration {
            thread::sleep(frame_duration - elapsed);
        }
    }

    session.teardown();
    info!("Scheduler thread stopped");
}

fn handle_command(session: &mut VisualizerSession, command: SchedulerCommand, now: f64) {
    debug!("Scheduler command: {command:?}");
    match command {
        SchedulerCommand::Engage => {
            if let Err(e) = session.engage(now) {
                warn!("Engage failed: {e}");
            }
        }
        SchedulerCommand::Suspend => session.suspend(),
        SchedulerCommand::Resume => {
            if let Err(e) = session.resume() {
                warn!("Resume failed: {e}");
            }
        }
        SchedulerCommand::RippleFinished(id) => session.ripple_finished(id),
        SchedulerCommand::Reconfigure { config, endpoint } => {
            if let Err(e) = session.reconfigure(config, endpoint, now) {
                warn!("Reconfigure rejected, keeping current session: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::Indicator;
    use crate::config::SourceMode;

    fn track_config() -> VisualizerConfig {
        VisualizerConfig {
            mode: SourceMode::Track,
            ..Default::default()
        }
    }

    fn loud_endpoint(seconds: f64) -> TrackEndpoint {
        let sample_rate = 44100;
        let count = (seconds * sample_rate as f64) as usize;
        TrackEndpoint::from_samples(vec![0.5; count], sample_rate)
    }

    #[test]
    fn test_invalid_config_never_spawns() {
        let config = VisualizerConfig {
            band_count: 0,
            ..Default::default()
        };
        assert!(FrameScheduler::start(config, None, 60.0).is_err());
    }

    #[test]
    fn test_scheduler_streams_frames() {
        let mut scheduler =
            FrameScheduler::start(track_config(), Some(loud_endpoint(2.0)), 120.0)
                .expect("scheduler");
        scheduler.engage();

        let deadline = Instant::now() + Duration::from_millis(400);
        let mut last = None;
        while Instant::now() < deadline {
            if let Some(frame) = scheduler.latest_frame() {
                last = Some(frame);
            }
            thread::sleep(Duration::from_millis(5));
        }

        let frame = last.expect("frames should have arrived");
        assert_eq!(frame.bar_heights.len(), 36);
        assert_eq!(frame.indicator, Indicator::Live);
        assert!(frame.level > 0.5, "constant track should drive the level up");
        assert!(scheduler.stats().frames > 0);

        scheduler.stop();
        assert!(!scheduler.is_running());
    }

    #[test]
    fn test_stop_twice_is_harmless() {
        let mut scheduler = FrameScheduler::start(track_config(), Some(loud_endpoint(0.5)), 60.0)
            .expect("scheduler");
        scheduler.stop();
        scheduler.stop();
    }

    #[test]
    fn test_reconfigure_changes_frame_shape() {
        let mut scheduler =
            FrameScheduler::start(track_config(), Some(loud_endpoint(2.0)), 120.0)
                .expect("scheduler");
        scheduler.engage();
        thread::sleep(Duration::from_millis(50));

        let narrower = VisualizerConfig {
            band_count: 12,
            ..track_config()
        };
        scheduler.reconfigure(narrower, None);

        let deadline = Instant::now() + Duration::from_millis(400);
        let mut widths = Vec::new();
        while Instant::now() < deadline {
            if let Some(frame) = scheduler.latest_frame() {
                widths.push(frame.bar_heights.len());
            }
            thread::sleep(Duration::from_millis(5));
        }

        assert_eq!(
            widths.last().copied(),
            Some(12),
            "frames should settle on the new band count"
        );
        scheduler.stop();
    }

    #[test]
    fn test_reconfigure_command_debug_summarizes_endpoint() {
        // The command loop logs every command; an endpoint rides along
        // as its sample count, never the decoded buffer.
        let command = SchedulerCommand::Reconfigure {
            config: track_config(),
            endpoint: Some(loud_endpoint(2.0)),
        };
        let rendered = format!("{command:?}");

        assert!(rendered.contains("Reconfigure"));
        assert!(rendered.contains("samples: 88200"));
    }
}
