//! PulseFlow Core - Audio-to-Visual Feature Pipeline
//!
//! This crate contains the real-time analysis engine for PulseFlow, including:
//! - Audio source graph (microphone or track endpoint)
//! - FFT spectrum analysis with log-spaced band aggregation
//! - Per-frame feature extraction (bar heights, amplitude level)
//! - Ripple trigger detection and the bounded ripple pool
//! - Frame scheduling on a dedicated thread

#![warn(missing_docs)]

use thiserror::Error;

pub mod audio;
pub mod bands;
pub mod config;
pub mod features;
pub mod ripples;
pub mod scheduler;
pub mod session;
pub mod trigger;

// --- Re-exports grouped by category ---

// Audio graph
pub use audio::{
    AudioError, AudioSourceGraph, GraphState, Indicator, SourceLink, TrackEndpoint, TransportEvent,
    TransportState,
};

// Configuration
pub use config::{SourceMode, VisualizerConfig};

// Feature extraction
pub use bands::{BandMap, BandRange};
pub use features::{FeatureExtractor, FrameOutput};

// Ripples & triggering
pub use ripples::{Ripple, RippleId, RipplePool};
pub use trigger::RippleTrigger;

// Session & scheduling
pub use scheduler::{FrameScheduler, SchedulerCommand, SchedulerStats};
pub use session::VisualizerSession;

/// Core error types
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration failed validation
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// Audio source graph error
    #[error("Audio error: {0}")]
    Audio(#[from] audio::AudioError),
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
