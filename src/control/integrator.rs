use super::clock::{sanitize_delta, EffectiveClock};
use super::frame::{ControlFrame, Resolution};
use super::pending::{PendingHandle, PendingState};
use crate::audio::features::FeatureVector;
use crate::config::PendingConfig;

#[derive(Clone, Copy, Debug)]
pub struct IntegratorParams {
    pub pending_alpha: f32,
    pub calm_slowdown: f32,
    /// Seconds without a request before the target flips
    pub watchdog: Option<f64>,
    pub max_frame_delta: f64,
}

impl Default for IntegratorParams {
    fn default() -> Self {
        Self::from(&PendingConfig::default())
    }
}

impl From<&PendingConfig> for IntegratorParams {
    fn from(cfg: &PendingConfig) -> Self {
        Self {
            pending_alpha: cfg.alpha,
            calm_slowdown: cfg.calm_slowdown,
            watchdog: (cfg.watchdog > 0.0).then_some(cfg.watchdog),
            max_frame_delta: cfg.max_frame_delta,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct IntegratorState {
    pub pending: PendingState,
    pub clock: EffectiveClock,
    /// Wall time of the last request or watchdog flip
    last_affirmed: f64,
}

/// Advance one render tick.
///
/// A request sets the target and restarts the watchdog window. Without one,
/// the watchdog flips the target once the window has elapsed. The pending
/// EMA then runs once, independent of `delta`, and effective time advances
/// at the resulting calm-dilated rate.
pub fn tick(
    state: IntegratorState,
    params: &IntegratorParams,
    delta: f64,
    request: Option<bool>,
    features: &FeatureVector,
    resolution: Resolution,
) -> (IntegratorState, ControlFrame) {
    let delta = sanitize_delta(delta, params.max_frame_delta);
    let now = state.clock.wall_time + delta;

    let mut pending = state.pending;
    let mut last_affirmed = state.last_affirmed;
    match request {
        Some(active) => {
            pending.target = active;
            last_affirmed = now;
        }
        None => {
            if let Some(window) = params.watchdog {
                if now - last_affirmed >= window {
                    pending.target = !pending.target;
                    last_affirmed = now;
                    log::debug!(
                        "No pending request for {:.1}s, watchdog flipped target to {}",
                        window, pending.target
                    );
                }
            }
        }
    }

    let pending = pending.step(params.pending_alpha);
    let rate = EffectiveClock::rate(pending.smoothed, params.calm_slowdown);
    let clock = state.clock.advance(delta, rate);

    let next = IntegratorState {
        pending,
        clock,
        last_affirmed,
    };
    let frame = ControlFrame {
        level: features.level,
        bands: features.bands,
        pending_smoothed: pending.smoothed,
        effective_time: clock.effective_time,
        wall_time: clock.wall_time,
        resolution,
    };
    (next, frame)
}

/// Owns the integrator state and the receiving end of a `PendingHandle`.
pub struct Integrator {
    params: IntegratorParams,
    state: IntegratorState,
    handle: PendingHandle,
}

impl Integrator {
    pub fn new(params: IntegratorParams) -> Self {
        Self {
            params,
            state: IntegratorState::default(),
            handle: PendingHandle::new(),
        }
    }

    /// Setter for external callers; clones share the same mailbox.
    pub fn handle(&self) -> PendingHandle {
        self.handle.clone()
    }

    pub fn state(&self) -> &IntegratorState {
        &self.state
    }

    pub fn tick(&mut self, delta: f64, features: &FeatureVector, resolution: Resolution) -> ControlFrame {
        let request = self.handle.take_request();
        let (state, frame) = tick(self.state, &self.params, delta, request, features, resolution);
        self.state = state;
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f64 = 1.0 / 60.0;

    fn no_watchdog() -> IntegratorParams {
        IntegratorParams {
            watchdog: None,
            ..IntegratorParams::default()
        }
    }

    #[test]
    fn effective_time_never_outruns_wall_time() {
        let mut integ = Integrator::new(IntegratorParams::default());
        integ.handle().set_pending(true);
        let deltas = [0.0, DT, 0.1, -0.5, 0.033, 5.0, f64::INFINITY, 0.002];
        let mut prev = integ.tick(DT, &FeatureVector::ZERO, Resolution::default());
        for _ in 0..20 {
            for &d in &deltas {
                let frame = integ.tick(d, &FeatureVector::ZERO, Resolution::default());
                let step = frame.effective_time - prev.effective_time;
                let wall_step = frame.wall_time - prev.wall_time;
                assert!(step >= 0.0);
                assert!(step <= wall_step + 1e-12);
                assert!(wall_step <= 0.25 + 1e-12);
                prev = frame;
            }
        }
    }

    #[test]
    fn full_calm_runs_at_quarter_speed() {
        let state = IntegratorState {
            pending: PendingState { target: true, smoothed: 1.0 },
            ..IntegratorState::default()
        };
        let (next, frame) = tick(state, &no_watchdog(), 0.1, None, &FeatureVector::ZERO, Resolution::default());
        assert!((frame.effective_time - 0.025).abs() < 1e-9);
        assert!((frame.wall_time - 0.1).abs() < 1e-12);
        assert_eq!(next.pending.smoothed, 1.0);
    }

    #[test]
    fn pending_reaches_099_after_100_ticks() {
        let mut integ = Integrator::new(no_watchdog());
        integ.handle().set_pending(true);
        let mut frame = ControlFrame::default();
        for _ in 0..100 {
            frame = integ.tick(DT, &FeatureVector::ZERO, Resolution::default());
        }
        assert!(frame.pending_smoothed > 0.99);
    }

    #[test]
    fn pending_ema_ignores_delta_size() {
        let state = IntegratorState::default();
        let params = no_watchdog();
        let (a, _) = tick(state, &params, 0.001, Some(true), &FeatureVector::ZERO, Resolution::default());
        let (b, _) = tick(state, &params, 0.2, Some(true), &FeatureVector::ZERO, Resolution::default());
        assert_eq!(a.pending.smoothed, b.pending.smoothed);
        assert!((a.pending.smoothed - 0.05).abs() < 1e-6);
    }

    #[test]
    fn watchdog_flips_after_five_quiet_seconds() {
        let mut integ = Integrator::new(IntegratorParams::default());
        for _ in 0..290 {
            integ.tick(DT, &FeatureVector::ZERO, Resolution::default());
        }
        assert!(!integ.state().pending.target);

        for _ in 0..16 {
            integ.tick(DT, &FeatureVector::ZERO, Resolution::default());
        }
        assert!(integ.state().pending.target);

        // and back again after another window
        for _ in 0..301 {
            integ.tick(DT, &FeatureVector::ZERO, Resolution::default());
        }
        assert!(!integ.state().pending.target);
    }

    #[test]
    fn watchdog_releases_a_stuck_busy_target() {
        let mut integ = Integrator::new(IntegratorParams::default());
        integ.handle().set_pending(true);
        integ.tick(DT, &FeatureVector::ZERO, Resolution::default());
        assert!(integ.state().pending.target);

        // caller never sends the matching idle
        for _ in 0..290 {
            integ.tick(DT, &FeatureVector::ZERO, Resolution::default());
        }
        assert!(integ.state().pending.target);

        for _ in 0..15 {
            integ.tick(DT, &FeatureVector::ZERO, Resolution::default());
        }
        assert!(!integ.state().pending.target);
        assert!(integ.state().pending.smoothed < 1.0);
    }

    #[test]
    fn requests_restart_the_watchdog_window() {
        let mut integ = Integrator::new(IntegratorParams::default());
        let handle = integ.handle();
        for _ in 0..10 {
            handle.set_pending(true);
            for _ in 0..240 {
                integ.tick(DT, &FeatureVector::ZERO, Resolution::default());
            }
            assert!(integ.state().pending.target);
        }
    }

    #[test]
    fn disabled_watchdog_never_flips() {
        let mut integ = Integrator::new(no_watchdog());
        for _ in 0..2000 {
            integ.tick(DT, &FeatureVector::ZERO, Resolution::default());
        }
        assert!(!integ.state().pending.target);
        assert_eq!(integ.state().pending.smoothed, 0.0);
    }

    #[test]
    fn frame_carries_features_and_resolution() {
        let mut integ = Integrator::new(no_watchdog());
        let features = FeatureVector {
            level: 0.4,
            bands: [0.1, 0.2, 0.3, 0.4],
        };
        let frame = integ.tick(DT, &features, Resolution::new(640, 480));
        assert_eq!(frame.features(), features);
        assert_eq!(frame.resolution, Resolution::new(640, 480));
    }
}
