//! Single-line terminal renderer
//!
//! Redraws one status line per frame: readiness tag, bar strip, level
//! meter and live ripple markers. Heights arrive in pixels and map onto
//! the eight block glyph steps.

use std::io::{self, Write};

use pulseflow_core::{FrameOutput, Indicator, RippleId};

const BLOCKS: [char; 9] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

const METER_CELLS: usize = 10;

pub struct TermRenderer {
    ripple_duration: f64,
    floor_px: f32,
    ceil_px: f32,
}

impl TermRenderer {
    /// Display constants arrive as the session config carries them.
    pub fn new(ripple_duration_secs: f32, floor_px: f32, ceil_px: f32) -> Self {
        Self {
            ripple_duration: f64::from(ripple_duration_secs),
            floor_px,
            ceil_px,
        }
    }

    /// Ripples whose animation time is up. The caller reports these back
    /// to the scheduler so the pool can let go of them.
    pub fn expired_ripples(&self, frame: &FrameOutput) -> Vec<RippleId> {
        frame
            .ripples
            .iter()
            .filter(|r| frame.timestamp - r.spawned_at >= self.ripple_duration)
            .map(|r| r.id)
            .collect()
    }

    /// Redraw the status line in place.
    pub fn draw(&self, frame: &FrameOutput) -> io::Result<()> {
        let mut line = String::with_capacity(frame.bar_heights.len() + 48);

        line.push_str(match frame.indicator {
            Indicator::Initializing => "[WAIT]",
            Indicator::Live => "[LIVE]",
            Indicator::Standby => "[HOLD]",
            Indicator::Disabled => "[OFF ]",
        });
        line.push(' ');

        let span = (self.ceil_px - self.floor_px).max(1.0);
        for &height in &frame.bar_heights {
            let t = ((height - self.floor_px) / span).clamp(0.0, 1.0);
            let step = (t * (BLOCKS.len() - 1) as f32).round() as usize;
            line.push(BLOCKS[step.min(BLOCKS.len() - 1)]);
        }

        line.push_str(" |");
        let filled = (frame.level * METER_CELLS as f32).round() as usize;
        for cell in 0..METER_CELLS {
            line.push(if cell < filled { '#' } else { '-' });
        }
        line.push('|');

        for _ in &frame.ripples {
            line.push_str(" ~");
        }

        let mut stdout = io::stdout();
        write!(stdout, "\r\x1b[2K{}", line)?;
        stdout.flush()
    }

    /// Leave the last frame on screen and move to a fresh line.
    pub fn finish(&self) -> io::Result<()> {
        let mut stdout = io::stdout();
        writeln!(stdout)?;
        stdout.flush()
    }
}
