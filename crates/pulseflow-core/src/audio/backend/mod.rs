//! Audio source backends
//!
//! A backend is anything that can hand the graph mono samples: the cpal
//! microphone capture, the tap side of a track endpoint, or a scripted
//! source for tests. The graph only ever talks to the [`AudioBackend`]
//! trait; which variant is live is the graph's business.

use super::Result;

#[cfg(feature = "audio")]
pub mod cpal_backend;
#[cfg(any(test, feature = "mock-audio"))]
pub mod mock;
pub mod track;

pub use track::TrackSource;

/// Capability surface shared by every audio source.
///
/// Implementations are not required to be `Send`: platform capture
/// streams are pinned to the thread that created them, so the graph is
/// built and driven on one thread.
pub trait AudioBackend {
    /// Begin delivering samples.
    fn start(&mut self) -> Result<()>;

    /// Stop delivering samples. Safe to call repeatedly; never fails.
    fn stop(&mut self);

    /// True while the source is delivering (or ready to deliver) samples.
    fn is_active(&self) -> bool;

    /// Take every sample chunk produced since the last drain, flattened
    /// into one mono buffer. Returns an empty buffer while stopped.
    fn drain_samples(&mut self) -> Vec<f32>;

    /// Sample rate of the delivered audio.
    fn sample_rate(&self) -> u32;
}
