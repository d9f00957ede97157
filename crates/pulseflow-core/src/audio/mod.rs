//! Audio source graph, spectrum analysis and source backends
//!
//! The graph owns everything that touches sound: the source link (mic,
//! track tap or scripted), the FFT analyzer, and the lifecycle state the
//! rest of the engine keys off.

use thiserror::Error;

pub mod backend;
pub mod endpoint;
pub mod graph;
pub mod spectrum;

pub use backend::AudioBackend;
#[cfg(feature = "audio")]
pub use backend::cpal_backend::CpalBackend;
#[cfg(any(test, feature = "mock-audio"))]
pub use backend::mock::ScriptedBackend;
pub use endpoint::{TrackEndpoint, TransportEvent, TransportState};
pub use graph::{AudioSourceGraph, GraphState, Indicator, SourceLink};
pub use spectrum::{SpectrumAnalyzer, SpectrumSettings};

/// Errors raised while acquiring or driving an audio source.
///
/// All of these are non-fatal to the host: the session parks in
/// [`GraphState::Error`](graph::GraphState) and keeps emitting floor
/// frames. Nothing here retries on its own.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AudioError {
    /// The platform refused capture access
    #[error("Capture permission denied: {0}")]
    PermissionDenied(String),

    /// No usable input device
    #[error("Audio device unavailable: {0}")]
    DeviceUnavailable(String),

    /// Building or starting the source graph failed
    #[error("Graph creation failed: {0}")]
    GraphCreationFailed(String),

    /// Track mode without a usable endpoint
    #[error("Track endpoint missing: {0}")]
    EndpointMissing(String),
}

/// Result type for audio operations
pub type Result<T> = std::result::Result<T, AudioError>;
