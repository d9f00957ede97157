//! PulseFlow - Audio-reactive terminal visualizer
//!
//! Runs the analysis pipeline against a WAV file, the default microphone
//! or a built-in demo sweep, and renders bars, level and ripples as a
//! live terminal status line.

#![warn(missing_docs)]

mod logging;
mod term;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use crossbeam_channel::tick;
use tracing::info;

#[cfg(feature = "audio")]
use pulseflow_core::audio::CpalBackend;
use pulseflow_core::{FrameScheduler, SourceMode, TrackEndpoint, VisualizerConfig};

use term::TermRenderer;

const REFRESH_HZ: f64 = 60.0;
const DRAW_INTERVAL_MS: u64 = 33;

struct Options {
    track: Option<PathBuf>,
    config_path: Option<PathBuf>,
    mic: bool,
    device: Option<String>,
    duration: Option<f64>,
    list_devices: bool,
}

fn usage() {
    println!("PulseFlow - audio-reactive terminal visualizer");
    println!();
    println!("Usage: pulseflow [TRACK.wav] [options]");
    println!();
    println!("Options:");
    println!("  --mic              Capture from the default microphone");
    println!("  --device NAME      Capture from a named input device (implies --mic)");
    println!("  --config FILE      Load a JSON visualizer config");
    println!("  --duration SECS    Stop after this many seconds");
    println!("  --list-devices     Print available input devices and exit");
    println!("  -h, --help         Show this help");
    println!();
    println!("With no track and no --mic, an internal demo sweep plays.");
}

fn parse_args() -> Result<Option<Options>> {
    let mut options = Options {
        track: None,
        config_path: None,
        mic: false,
        device: None,
        duration: None,
        list_devices: false,
    };

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--mic" => options.mic = true,
            "--device" => {
                options.device = Some(args.next().context("--device needs a device name")?);
                options.mic = true;
            }
            "--config" => {
                options.config_path =
                    Some(PathBuf::from(args.next().context("--config needs a path")?));
            }
            "--duration" => {
                let raw = args.next().context("--duration needs a number of seconds")?;
                options.duration =
                    Some(raw.parse().with_context(|| format!("Bad duration: {raw}"))?);
            }
            "--list-devices" => options.list_devices = true,
            "-h" | "--help" => {
                usage();
                return Ok(None);
            }
            other if !other.starts_with('-') => options.track = Some(PathBuf::from(other)),
            other => bail!("Unknown option: {other} (try --help)"),
        }
    }
    Ok(Some(options))
}

fn load_config(path: &Path) -> Result<VisualizerConfig> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {path:?}"))?;
    let config: VisualizerConfig =
        serde_json::from_str(&raw).with_context(|| format!("Failed to parse config {path:?}"))?;
    Ok(config)
}

/// Eight seconds of pulsed exponential sweep, 80 Hz up to 4 kHz. The
/// silent gaps between pulses give the ripple trigger fresh rising edges.
fn demo_track() -> TrackEndpoint {
    let sample_rate = 44100u32;
    let seconds = 8.0f32;
    let count = (seconds * sample_rate as f32) as usize;

    let mut samples = Vec::with_capacity(count);
    let mut phase = 0.0f32;
    for i in 0..count {
        let t = i as f32 / sample_rate as f32;
        let freq = 80.0 * (4000.0f32 / 80.0).powf(t / seconds);
        phase += std::f32::consts::TAU * freq / sample_rate as f32;
        let gate = if (t * 2.0).fract() < 0.6 { 1.0 } else { 0.0 };
        samples.push(0.45 * gate * phase.sin());
    }
    TrackEndpoint::from_samples(samples, sample_rate)
}

#[cfg(feature = "audio")]
fn print_devices() -> Result<()> {
    let devices = CpalBackend::list_devices()?;
    if devices.is_empty() {
        println!("No input devices found");
    } else {
        for name in devices {
            println!("{name}");
        }
    }
    Ok(())
}

#[cfg(not(feature = "audio"))]
fn print_devices() -> Result<()> {
    bail!("Built without the audio feature; no devices to list")
}

fn main() -> Result<()> {
    logging::init()?;

    let Some(options) = parse_args()? else {
        return Ok(());
    };

    if options.list_devices {
        return print_devices();
    }

    let mut config = match &options.config_path {
        Some(path) => load_config(path)?,
        None => VisualizerConfig::default(),
    };

    let endpoint = if options.mic {
        config.mode = SourceMode::Mic;
        config.mic_device = options.device.clone();
        None
    } else if let Some(path) = &options.track {
        config.mode = SourceMode::Track;
        info!("Loading track {path:?}");
        Some(TrackEndpoint::from_wav_file(path)?)
    } else {
        config.mode = SourceMode::Track;
        info!("No track given, playing the built-in demo sweep");
        Some(demo_track())
    };

    let track_secs = endpoint.as_ref().map(|e| e.duration_secs());
    let run_secs = options
        .duration
        .or(track_secs.map(|d| d + 0.5))
        .unwrap_or(10.0);

    let mut scheduler = FrameScheduler::start(config.clone(), endpoint, REFRESH_HZ)?;
    scheduler.engage();

    let renderer = TermRenderer::new(
        config.ripple_duration_secs,
        config.bar_floor_px,
        config.bar_ceil_px,
    );
    let ticker = tick(Duration::from_millis(DRAW_INTERVAL_MS));
    let started = Instant::now();

    while started.elapsed().as_secs_f64() < run_secs {
        ticker.recv()?;
        if let Some(frame) = scheduler.latest_frame() {
            for id in renderer.expired_ripples(&frame) {
                scheduler.ripple_finished(id);
            }
            renderer.draw(&frame)?;
        }
    }

    renderer.finish()?;
    scheduler.stop();

    let stats = scheduler.stats();
    info!(
        "Done: {} frames delivered, {} dropped",
        stats.frames, stats.dropped_frames
    );
    Ok(())
}
