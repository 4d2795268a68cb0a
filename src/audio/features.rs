use serde::Serialize;

use super::analyser::AudioFrame;
use crate::config::FeatureConfig;

/// Speech-oriented bands, in output order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Band {
    /// 85-300 Hz, fundamental / low end
    Fundamental,
    /// 300-1000 Hz
    Formant1,
    /// 1-3 kHz
    Formant23,
    /// 3-8 kHz, consonants
    Sibilance,
}

impl Band {
    pub const ALL: [Band; 4] = [Band::Fundamental, Band::Formant1, Band::Formant23, Band::Sibilance];

    pub fn name(self) -> &'static str {
        match self {
            Band::Fundamental => "f0",
            Band::Formant1 => "formant1",
            Band::Formant23 => "formant2-3",
            Band::Sibilance => "sibilance",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct FeatureVector {
    /// Gated, smoothed loudness in [0, level_max]
    pub level: f32,
    /// Average normalized magnitude per band, [0, 1], unsmoothed
    pub bands: [f32; 4],
}

impl FeatureVector {
    pub const ZERO: FeatureVector = FeatureVector {
        level: 0.0,
        bands: [0.0; 4],
    };

    pub fn band(&self, band: Band) -> f32 {
        self.bands[band.index()]
    }
}

/// Maps one `AudioFrame` to one `FeatureVector`. The only state is the
/// level EMA.
#[derive(Clone, Debug)]
pub struct FeatureExtractor {
    level_gate: f32,
    level_alpha: f32,
    level_max: f32,
    ranges: [[f32; 2]; 4],
    level_ema: f32,
}

impl FeatureExtractor {
    pub fn new(config: &FeatureConfig) -> Self {
        Self {
            level_gate: config.level_gate,
            level_alpha: config.level_alpha,
            level_max: config.level_max,
            ranges: config.bands,
            level_ema: 0.0,
        }
    }

    /// Zero features when no frame is available; the level EMA is kept.
    pub fn extract(&mut self, frame: Option<&AudioFrame>) -> FeatureVector {
        let Some(frame) = frame else {
            return FeatureVector::ZERO;
        };

        let level = self.level(&frame.time_domain);
        let mut bands = [0.0; 4];
        for (band, [f0, f1]) in bands.iter_mut().zip(self.ranges) {
            *band = band_power(&frame.frequency, frame.sample_rate, frame.fft_size, f0, f1);
        }
        FeatureVector { level, bands }
    }

    pub fn reset(&mut self) {
        self.level_ema = 0.0;
    }

    fn level(&mut self, time_domain: &[u8]) -> f32 {
        let rms = rms_u8(time_domain);
        let gated = if rms < self.level_gate { 0.0 } else { rms.min(1.0) };
        self.level_ema = self.level_ema * (1.0 - self.level_alpha) + gated * self.level_alpha;
        self.level_ema.clamp(0.0, self.level_max)
    }
}

/// RMS of byte samples re-centred to [-1, 1]. Empty input is silence.
pub fn rms_u8(samples: &[u8]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f32 = samples
        .iter()
        .map(|&b| {
            let v = (b as f32 - 128.0) / 128.0;
            v * v
        })
        .sum();
    (sum / samples.len() as f32).sqrt()
}

/// FFT bin for a frequency, clamped to the bins an `fft_size` analyser exposes.
pub fn bin_for_hz(hz: f32, sample_rate: f32, fft_size: usize) -> usize {
    let last = (fft_size / 2).saturating_sub(1);
    if sample_rate <= 0.0 || fft_size == 0 {
        return 0;
    }
    let bin_width = sample_rate / fft_size as f32;
    let index = (hz / bin_width).round();
    if index.is_nan() || index <= 0.0 {
        0
    } else {
        (index as usize).min(last)
    }
}

/// Mean magnitude over the inclusive bin span between `f0` and `f1`,
/// normalized to [0, 1]. Argument order does not matter; an empty span is 0.
pub fn band_power(freq: &[u8], sample_rate: f32, fft_size: usize, f0: f32, f1: f32) -> f32 {
    if freq.is_empty() {
        return 0.0;
    }
    let a = bin_for_hz(f0, sample_rate, fft_size);
    let b = bin_for_hz(f1, sample_rate, fft_size);
    let lo = a.min(b);
    let hi = a.max(b).min(freq.len() - 1);
    if lo > hi {
        return 0.0;
    }

    let span = &freq[lo..=hi];
    let sum: u32 = span.iter().map(|&v| v as u32).sum();
    (sum as f32 / span.len() as f32) / 255.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> FeatureExtractor {
        FeatureExtractor::new(&FeatureConfig::default())
    }

    fn frame(time_domain: Vec<u8>, frequency: Vec<u8>) -> AudioFrame {
        AudioFrame {
            time_domain,
            frequency,
            sample_rate: 44100.0,
            fft_size: 1024,
        }
    }

    fn square(len: usize) -> Vec<u8> {
        (0..len).map(|i| if i % 2 == 0 { 0 } else { 255 }).collect()
    }

    #[test]
    fn midscale_silence_is_gated_to_zero() {
        let mut ex = extractor();
        let f = frame(vec![128; 1024], vec![0; 512]);
        for _ in 0..50 {
            assert_eq!(ex.extract(Some(&f)).level, 0.0);
        }
    }

    #[test]
    fn quiet_noise_below_gate_is_zero() {
        let mut ex = extractor();
        // |v| = 2/128 ~ 0.0156 < 0.02
        let td: Vec<u8> = (0..1024).map(|i| if i % 2 == 0 { 126 } else { 130 }).collect();
        assert_eq!(ex.extract(Some(&frame(td, vec![0; 512]))).level, 0.0);
    }

    #[test]
    fn loud_level_rises_then_caps() {
        let mut ex = extractor();
        let f = frame(square(1024), vec![0; 512]);
        let first = ex.extract(Some(&f)).level;
        assert!((first - 0.2 * rms_u8(&f.time_domain)).abs() < 1e-5);

        let mut last = first;
        for _ in 0..100 {
            last = ex.extract(Some(&f)).level;
        }
        assert_eq!(last, 0.6);
    }

    #[test]
    fn level_decays_after_signal_stops() {
        let mut ex = extractor();
        let loud = frame(square(1024), vec![0; 512]);
        let quiet = frame(vec![128; 1024], vec![0; 512]);
        for _ in 0..100 {
            ex.extract(Some(&loud));
        }
        // the EMA sits near 1.0 above the 0.6 cap, so the output holds at
        // the cap for a couple of ticks before falling
        let mut prev = ex.extract(Some(&quiet)).level;
        let mut fell = false;
        for _ in 0..40 {
            let next = ex.extract(Some(&quiet)).level;
            assert!(next <= prev);
            fell |= next < prev;
            prev = next;
        }
        assert!(fell);
        assert!(prev < 0.01);
    }

    #[test]
    fn no_frame_gives_zero_features() {
        let mut ex = extractor();
        assert_eq!(ex.extract(None), FeatureVector::ZERO);
    }

    #[test]
    fn bin_width_scenario() {
        let width = 44100.0 / 1024.0;
        assert!((width - 43.07f32).abs() < 0.01);
        assert_eq!(bin_for_hz(300.0, 44100.0, 1024), 7);
        assert_eq!(bin_for_hz(-50.0, 44100.0, 1024), 0);
        assert_eq!(bin_for_hz(1e9, 44100.0, 1024), 511);
    }

    #[test]
    fn band_power_ignores_argument_order() {
        let freq: Vec<u8> = (0..512).map(|i| (i * 7 % 256) as u8).collect();
        for &(f0, f1) in &[(85.0, 300.0), (300.0, 1000.0), (1000.0, 3000.0), (3000.0, 8000.0)] {
            assert_eq!(
                band_power(&freq, 44100.0, 1024, f0, f1),
                band_power(&freq, 44100.0, 1024, f1, f0)
            );
        }
    }

    #[test]
    fn band_power_averages_inclusive_span() {
        let mut freq = vec![0u8; 512];
        // 85 Hz -> bin 2, 300 Hz -> bin 7
        for v in &mut freq[2..=7] {
            *v = 255;
        }
        assert_eq!(band_power(&freq, 44100.0, 1024, 85.0, 300.0), 1.0);
        freq[7] = 0;
        assert!((band_power(&freq, 44100.0, 1024, 85.0, 300.0) - 5.0 / 6.0).abs() < 1e-6);
    }

    #[test]
    fn empty_spectrum_is_zero_not_nan() {
        assert_eq!(band_power(&[], 44100.0, 1024, 85.0, 300.0), 0.0);
        assert_eq!(band_power(&[200; 512], 0.0, 1024, 85.0, 300.0), 200.0 / 255.0);
    }

    #[test]
    fn bands_follow_frequency_content() {
        let mut ex = extractor();
        let mut freq = vec![0u8; 512];
        // 3-8 kHz -> bins 70..=186
        for v in &mut freq[70..=186] {
            *v = 255;
        }
        let fv = ex.extract(Some(&frame(vec![128; 1024], freq)));
        assert_eq!(fv.band(Band::Fundamental), 0.0);
        assert_eq!(fv.band(Band::Formant1), 0.0);
        assert_eq!(fv.band(Band::Sibilance), 1.0);
        assert!(fv.band(Band::Formant23) > 0.0);
    }
}
