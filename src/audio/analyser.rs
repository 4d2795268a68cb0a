use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

use crate::config::AnalyserConfig;

/// Latest raw observation: unsigned 8-bit time-domain and frequency views.
/// Overwritten in place on every refresh.
#[derive(Clone, Debug)]
pub struct AudioFrame {
    /// `fft_size` samples, 128 = zero crossing
    pub time_domain: Vec<u8>,
    /// `fft_size / 2` magnitudes scaled from the analyser's dB window
    pub frequency: Vec<u8>,
    pub sample_rate: f32,
    pub fft_size: usize,
}

impl AudioFrame {
    pub fn silent(fft_size: usize, sample_rate: f32) -> Self {
        Self {
            time_domain: vec![128; fft_size],
            frequency: vec![0; fft_size / 2],
            sample_rate,
            fft_size,
        }
    }
}

/// Fixed-capacity ring holding the newest mono samples from the device.
#[derive(Clone, Debug)]
pub struct SampleRing {
    buf: Vec<f32>,
    write: usize,
}

impl SampleRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0.0; capacity.max(1)],
            write: 0,
        }
    }

    pub fn push(&mut self, sample: f32) {
        self.buf[self.write] = sample;
        self.write = (self.write + 1) % self.buf.len();
    }

    pub fn extend(&mut self, samples: &[f32]) {
        for &s in samples {
            self.push(s);
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Copy out oldest to newest. `out` must have the ring's capacity.
    pub fn copy_ordered(&self, out: &mut [f32]) {
        let (newer, older) = self.buf.split_at(self.write);
        out[..older.len()].copy_from_slice(older);
        out[older.len()..].copy_from_slice(newer);
    }
}

/// Windowed FFT analysis producing byte views of the newest `fft_size`
/// samples, with per-bin magnitude smoothing across calls.
pub struct Analyser {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    samples: Vec<f32>,
    smoothed: Vec<f32>,
    smoothing: f32,
    min_decibels: f32,
    max_decibels: f32,
    frame: AudioFrame,
}

impl Analyser {
    pub fn new(config: &AnalyserConfig, sample_rate: u32) -> Self {
        let n = config.fft_size;
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(n);
        let scratch_len = fft.get_inplace_scratch_len();

        Self {
            fft,
            window: blackman_window(n),
            buffer: vec![Complex::new(0.0, 0.0); n],
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
            samples: vec![0.0; n],
            smoothed: vec![0.0; n / 2],
            smoothing: config.smoothing,
            min_decibels: config.min_decibels,
            max_decibels: config.max_decibels,
            frame: AudioFrame::silent(n, sample_rate as f32),
        }
    }

    pub fn frame(&self) -> &AudioFrame {
        &self.frame
    }

    /// Copy the ring's samples in for the next `update`. A ring smaller
    /// than `fft_size` is zero-padded at the front.
    pub fn load_ring(&mut self, ring: &SampleRing) {
        if ring.capacity() == self.samples.len() {
            ring.copy_ordered(&mut self.samples);
        } else {
            let mut ordered = vec![0.0; ring.capacity()];
            ring.copy_ordered(&mut ordered);
            self.load(&ordered);
        }
    }

    /// Recompute both byte views from the loaded samples.
    pub fn update(&mut self) -> &AudioFrame {
        self.compute();
        &self.frame
    }

    /// Analyse the newest `fft_size` samples of `input`, zero-padding at
    /// the front when it is shorter.
    pub fn analyse(&mut self, input: &[f32]) -> &AudioFrame {
        self.load(input);
        self.update()
    }

    fn load(&mut self, input: &[f32]) {
        let n = self.samples.len();
        let take = input.len().min(n);
        let pad = n - take;
        self.samples[..pad].fill(0.0);
        self.samples[pad..].copy_from_slice(&input[input.len() - take..]);
    }

    /// Forget smoothed magnitudes and show silence.
    pub fn reset(&mut self) {
        self.smoothed.fill(0.0);
        self.frame.time_domain.fill(128);
        self.frame.frequency.fill(0);
    }

    fn compute(&mut self) {
        let n = self.samples.len();

        for (byte, &s) in self.frame.time_domain.iter_mut().zip(self.samples.iter()) {
            *byte = (128.0 * (s + 1.0)).floor().clamp(0.0, 255.0) as u8;
        }

        for (i, c) in self.buffer.iter_mut().enumerate() {
            *c = Complex::new(self.samples[i] * self.window[i], 0.0);
        }
        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        let scale = 1.0 / n as f32;
        let db_range = self.max_decibels - self.min_decibels;
        for (k, byte) in self.frame.frequency.iter_mut().enumerate() {
            let magnitude = self.buffer[k].norm() * scale;
            let s = self.smoothing * self.smoothed[k] + (1.0 - self.smoothing) * magnitude;
            self.smoothed[k] = if s.is_finite() { s } else { 0.0 };

            *byte = if self.smoothed[k] > 0.0 {
                let db = 20.0 * self.smoothed[k].log10();
                (255.0 * (db - self.min_decibels) / db_range).floor().clamp(0.0, 255.0) as u8
            } else {
                0
            };
        }
    }
}

fn blackman_window(size: usize) -> Vec<f32> {
    let a0 = 0.42;
    let a1 = 0.5;
    let a2 = 0.08;
    (0..size)
        .map(|i| {
            let x = 2.0 * std::f32::consts::PI * i as f32 / size as f32;
            a0 - a1 * x.cos() + a2 * (2.0 * x).cos()
        })
        .collect()
}
