//! Receiving side of a track endpoint's sample tap

use crossbeam_channel::Receiver;

use super::AudioBackend;
use crate::audio::Result;

/// Samples tapped off a playing [`TrackEndpoint`](crate::audio::TrackEndpoint).
///
/// The endpoint pushes a chunk per clock advance while playing; this side
/// just drains. Pause and stop are bookkeeping only since a paused
/// endpoint pushes nothing.
pub struct TrackSource {
    rx: Receiver<Vec<f32>>,
    sample_rate: u32,
    active: bool,
}

impl TrackSource {
    pub(crate) fn new(rx: Receiver<Vec<f32>>, sample_rate: u32) -> Self {
        Self {
            rx,
            sample_rate,
            active: false,
        }
    }
}

impl AudioBackend for TrackSource {
    fn start(&mut self) -> Result<()> {
        self.active = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.active = false;
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
