//! Ripple trigger detection
//!
//! Watches the per-frame amplitude level for rising edges through the
//! sensitivity threshold. A spawn needs three things at once: the level at
//! or above threshold, the previous frame's level below it, and the
//! cooldown elapsed since the last spawn. Sustained loudness therefore
//! fires once, on the way up.

/// Rising-edge detector with spawn cooldown
#[derive(Debug, Clone)]
pub struct RippleTrigger {
    /// Threshold in level units (0.0 - 1.0)
    sensitivity: f32,
    /// Minimum spacing between spawns, seconds
    cooldown: f64,
    /// Level seen on the previous frame
    previous_level: f32,
    /// Time of the last spawn; -inf before the first
    last_spawn: f64,
}

impl RippleTrigger {
    /// New detector. `cooldown_ms` is converted once; evaluation runs in
    /// seconds like the rest of the frame path.
    pub fn new(sensitivity: f32, cooldown_ms: f64) -> Self {
        Self {
            sensitivity,
            cooldown: cooldown_ms / 1000.0,
            previous_level: 0.0,
            last_spawn: f64::NEG_INFINITY,
        }
    }

    /// Feed one frame's level. Returns true when a ripple should spawn.
    ///
    /// The previous level updates every frame whether or not anything
    /// fired, so a level parked above threshold cannot re-trigger until
    /// it dips below and crosses again.
    pub fn evaluate(&mut self, level: f32, now: f64) -> bool {
        let rising = level >= self.sensitivity && self.previous_level < self.sensitivity;
        let cooled = now - self.last_spawn > self.cooldown;
        let fire = rising && cooled;

        if fire {
            self.last_spawn = now;
        }
        self.previous_level = level;
        fire
    }

    /// Forget edge and cooldown history; used on rebuild.
    pub fn reset(&mut self) {
        self.previous_level = 0.0;
        self.last_spawn = f64::NEG_INFINITY;
    }

    /// Configured threshold
    pub fn sensitivity(&self) -> f32 {
        self.sensitivity
    }

    /// Configured cooldown in seconds
    pub fn cooldown_secs(&self) -> f64 {
        self.cooldown
    }
}
