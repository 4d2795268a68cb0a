use crate::audio::acquire::SignalSource;
use crate::audio::features::{FeatureExtractor, FeatureVector};
use crate::config::Config;
use crate::control::{ControlFrame, Integrator, IntegratorParams, PendingHandle, Resolution};

/// Delta assumed for the very first tick, before a previous timestamp exists.
const FIRST_FRAME_DELTA: f64 = 1.0 / 60.0;

/// Timestamp guard capping how often features are recomputed.
#[derive(Clone, Copy, Debug)]
pub struct RefreshThrottle {
    interval: f64,
    last: Option<f64>,
}

impl RefreshThrottle {
    pub fn new(max_hz: f32) -> Self {
        Self {
            interval: 1.0 / max_hz.max(f32::MIN_POSITIVE) as f64,
            last: None,
        }
    }

    /// True (and the window restarts) once more than one interval has passed.
    pub fn ready(&mut self, now: f64) -> bool {
        match self.last {
            Some(last) if now - last <= self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

/// Per-tick driver: throttled feature refresh, then integration.
pub struct Pipeline<S: SignalSource> {
    source: S,
    extractor: FeatureExtractor,
    integrator: Integrator,
    throttle: RefreshThrottle,
    features: FeatureVector,
    resolution: Resolution,
    last_now: Option<f64>,
}

impl<S: SignalSource> Pipeline<S> {
    pub fn new(source: S, config: &Config) -> Self {
        Self {
            source,
            extractor: FeatureExtractor::new(&config.features),
            integrator: Integrator::new(IntegratorParams::from(&config.pending)),
            throttle: RefreshThrottle::new(config.features.refresh_hz),
            features: FeatureVector::ZERO,
            resolution: Resolution::new(config.output.width, config.output.height),
            last_now: None,
        }
    }

    pub fn pending_handle(&self) -> PendingHandle {
        self.integrator.handle()
    }

    pub fn set_resolution(&mut self, resolution: Resolution) {
        self.resolution = resolution;
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Most recent features, reused between throttled refreshes.
    pub fn features(&self) -> FeatureVector {
        self.features
    }

    /// Produce the control frame for a tick at `now` seconds. Always
    /// succeeds; with no active source every feature is zero.
    pub fn frame(&mut self, now: f64) -> ControlFrame {
        let delta = match self.last_now {
            Some(prev) => now - prev,
            None => FIRST_FRAME_DELTA,
        };
        self.last_now = Some(now);

        // A source that dropped out starts its next session with a fresh level
        if !self.source.is_active() {
            self.extractor.reset();
            self.features = FeatureVector::ZERO;
        } else if self.throttle.ready(now) {
            self.features = match self.source.refresh() {
                Some(audio) => self.extractor.extract(Some(audio)),
                None => {
                    self.extractor.reset();
                    FeatureVector::ZERO
                }
            };
        }

        self.integrator.tick(delta, &self.features, self.resolution)
    }

    /// Stop the source and fall back to a neutral signal.
    pub fn release(&mut self) {
        self.source.release();
        self.extractor.reset();
        self.features = FeatureVector::ZERO;
    }
}
