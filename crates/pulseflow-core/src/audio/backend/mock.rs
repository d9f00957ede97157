//! Scripted audio source for tests and headless runs
//!
//! Plays back a queue of pre-baked sample chunks, one chunk per drain, so
//! a test can line its audio up with frame ticks exactly.

use std::collections::VecDeque;

use super::AudioBackend;
use crate::audio::{AudioError, Result};

/// Deterministic sample source
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    script: VecDeque<Vec<f32>>,
    sample_rate: u32,
    active: bool,
    fail_start: Option<AudioError>,
}

impl ScriptedBackend {
    /// Empty source at the given rate; feed it with [`push`](Self::push).
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            ..Default::default()
        }
    }

    /// Source pre-loaded with chunks, delivered one per drain.
    pub fn with_script(sample_rate: u32, chunks: Vec<Vec<f32>>) -> Self {
        Self {
            script: chunks.into(),
            sample_rate,
            ..Default::default()
        }
    }

    /// Source whose `start` fails with the given error. Exercises the
    /// acquire failure paths without real hardware.
    pub fn failing(error: AudioError) -> Self {
        Self {
            sample_rate: 44100,
            fail_start: Some(error),
            ..Default::default()
        }
    }

    /// Queue another chunk.
    pub fn push(&mut self, chunk: Vec<f32>) {
        self.script.push_back(chunk);
    }

    /// Chunks not yet delivered
    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl AudioBackend for ScriptedBackend {
    fn start(&mut self) -> Result<()> {
        if let Some(error) = self.fail_start.take() {
            return Err(error);
        }
        self.active = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.active = false;
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn drain_samples(&mut self) -> Vec<f32> {
        if !self.active {
            return Vec::new();
        }
        self.script.pop_front().unwrap_or_default()
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}
