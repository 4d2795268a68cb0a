use crate::config::CompressorConfig;

/// Levels below this are treated as silence by the detector.
const FLOOR_DB: f32 = -120.0;

/// Soft-knee feed-forward compressor working in the dB domain, with makeup
/// gain derived from the curve's reduction at full scale.
#[derive(Clone, Debug)]
pub struct Compressor {
    threshold: f32,
    knee: f32,
    ratio: f32,
    attack_coef: f32,
    release_coef: f32,
    makeup_db: f32,
    /// Current (smoothed) gain change in dB, always <= 0
    envelope_db: f32,
}

impl Compressor {
    pub fn new(config: &CompressorConfig, sample_rate: u32) -> Self {
        let sr = sample_rate.max(1) as f32;
        let mut comp = Self {
            threshold: config.threshold,
            knee: config.knee.max(0.0),
            ratio: config.ratio.max(1.0),
            attack_coef: time_coefficient(config.attack, sr),
            release_coef: time_coefficient(config.release, sr),
            makeup_db: 0.0,
            envelope_db: 0.0,
        };
        // Input is 0 dBFS, so the curve's output is the reduction itself
        let full_scale_reduction = comp.static_curve_db(0.0);
        comp.makeup_db = -0.6 * full_scale_reduction;
        comp
    }

    /// Output level for an input level, both in dB.
    pub fn static_curve_db(&self, input_db: f32) -> f32 {
        let over = input_db - self.threshold;
        let half_knee = self.knee * 0.5;
        let slope = 1.0 / self.ratio - 1.0;

        if over <= -half_knee {
            input_db
        } else if self.knee > 0.0 && over < half_knee {
            let x = over + half_knee;
            input_db + slope * x * x / (2.0 * self.knee)
        } else {
            self.threshold + over / self.ratio
        }
    }

    pub fn process(&mut self, sample: f32) -> f32 {
        let level = sample.abs();
        let input_db = if level > 0.0 {
            (20.0 * level.log10()).max(FLOOR_DB)
        } else {
            FLOOR_DB
        };
        let target_db = self.static_curve_db(input_db) - input_db;

        // More reduction engages at the attack rate, less at the release rate
        let coef = if target_db < self.envelope_db {
            self.attack_coef
        } else {
            self.release_coef
        };
        self.envelope_db = coef * self.envelope_db + (1.0 - coef) * target_db;

        sample * db_to_gain(self.envelope_db + self.makeup_db)
    }

    pub fn process_block(&mut self, samples: &mut [f32]) {
        for s in samples.iter_mut() {
            *s = self.process(*s);
        }
    }

    pub fn reduction_db(&self) -> f32 {
        self.envelope_db
    }
}

fn time_coefficient(seconds: f32, sample_rate: f32) -> f32 {
    if seconds <= 0.0 {
        0.0
    } else {
        (-1.0 / (seconds * sample_rate)).exp()
    }
}

fn db_to_gain(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}
