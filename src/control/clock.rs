/// Wall time and the calm-dilated effective time, both in seconds.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EffectiveClock {
    pub wall_time: f64,
    pub effective_time: f64,
}

impl EffectiveClock {
    /// Effective-time speed for a calm amount in [0, 1].
    pub fn rate(calm: f32, slowdown: f32) -> f64 {
        (1.0 - calm.clamp(0.0, 1.0) as f64 * slowdown as f64).clamp(0.0, 1.0)
    }

    pub fn advance(self, delta: f64, rate: f64) -> Self {
        Self {
            wall_time: self.wall_time + delta,
            effective_time: self.effective_time + delta * rate,
        }
    }
}

/// Clamp a frame delta into [0, max]. Non-finite deltas count as 0.
pub fn sanitize_delta(delta: f64, max: f64) -> f64 {
    if delta.is_finite() {
        delta.clamp(0.0, max)
    } else {
        0.0
    }
}
