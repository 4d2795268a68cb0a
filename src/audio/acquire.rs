use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    SampleFormat, Stream, StreamConfig,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::analyser::{Analyser, AudioFrame, SampleRing};
use super::compressor::Compressor;
use crate::config::{AnalyserConfig, CompressorConfig};
use crate::error::AcquireError;

/// Anything that can hand the pipeline a fresh `AudioFrame`.
pub trait SignalSource {
    fn is_active(&self) -> bool;

    /// `None` while no device is delivering audio.
    fn refresh(&mut self) -> Option<&AudioFrame>;

    fn release(&mut self) {}
}

struct ActiveCapture {
    _stream: Stream,
    ring: Arc<Mutex<SampleRing>>,
    failed: Arc<AtomicBool>,
    analyser: Analyser,
    sample_rate: u32,
    device_name: String,
}

/// Owns the microphone stream and its compressor -> analyser chain.
pub struct Acquirer {
    compressor: CompressorConfig,
    analyser: AnalyserConfig,
    device_filter: Option<String>,
    active: Option<ActiveCapture>,
}

impl Acquirer {
    pub fn new(compressor: CompressorConfig, analyser: AnalyserConfig, device_filter: Option<String>) -> Self {
        Self {
            compressor,
            analyser,
            device_filter,
            active: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn sample_rate(&self) -> Option<u32> {
        self.active.as_ref().map(|a| a.sample_rate)
    }

    pub fn device_name(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.device_name.as_str())
    }

    /// Open the input device and start capturing. No-op when already active.
    pub fn acquire(&mut self) -> Result<(), AcquireError> {
        if self.active.is_some() {
            return Ok(());
        }

        let host = cpal::default_host();
        let device = pick_input_device(&host, self.device_filter.as_deref())?;
        let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());

        let supported = device.default_input_config()?;
        let sample_format = supported.sample_format();
        let stream_config: StreamConfig = supported.config();
        let sample_rate = stream_config.sample_rate.0;
        let channels = stream_config.channels.max(1) as usize;

        let ring = Arc::new(Mutex::new(SampleRing::new(self.analyser.fft_size)));
        let failed = Arc::new(AtomicBool::new(false));
        let compressor = Compressor::new(&self.compressor, sample_rate);

        let stream = build_input_stream(
            &device,
            &stream_config,
            sample_format,
            channels,
            compressor,
            Arc::clone(&ring),
            Arc::clone(&failed),
        )?;
        stream.play()?;

        log::info!(
            "Microphone capture started on '{}' ({} ch @ {} Hz, {:?})",
            device_name, channels, sample_rate, sample_format
        );

        self.active = Some(ActiveCapture {
            _stream: stream,
            ring,
            failed,
            analyser: Analyser::new(&self.analyser, sample_rate),
            sample_rate,
            device_name,
        });
        Ok(())
    }

    /// Stop the stream and drop every handle.
    pub fn release(&mut self) {
        if let Some(active) = self.active.take() {
            log::info!("Microphone capture on '{}' released", active.device_name);
        }
    }

    /// Recompute both byte views from the newest samples.
    pub fn refresh(&mut self) -> Option<&AudioFrame> {
        let lost = self
            .active
            .as_ref()
            .is_some_and(|a| a.failed.load(Ordering::Acquire));
        if lost {
            log::warn!("Microphone stream failed; continuing with a neutral signal");
            self.release();
            return None;
        }

        let active = self.active.as_mut()?;
        {
            let ring = lock_ring(&active.ring);
            active.analyser.load_ring(&ring);
        }
        Some(active.analyser.update())
    }
}

impl SignalSource for Acquirer {
    fn is_active(&self) -> bool {
        Acquirer::is_active(self)
    }

    fn refresh(&mut self) -> Option<&AudioFrame> {
        Acquirer::refresh(self)
    }

    fn release(&mut self) {
        Acquirer::release(self)
    }
}

impl Drop for Acquirer {
    fn drop(&mut self) {
        self.release();
    }
}

/// Names of every input device the default host reports.
pub fn list_input_devices() -> Vec<String> {
    let host = cpal::default_host();
    host.input_devices()
        .map(|devices| devices.filter_map(|d| d.name().ok()).collect())
        .unwrap_or_default()
}

fn pick_input_device(host: &cpal::Host, filter: Option<&str>) -> Result<cpal::Device, AcquireError> {
    match filter {
        None => host
            .default_input_device()
            .ok_or_else(|| AcquireError::DeviceUnavailable("no default input device".into())),
        Some(wanted) => {
            let wanted_lower = wanted.to_lowercase();
            let devices = host
                .input_devices()
                .map_err(|e| AcquireError::DeviceUnavailable(e.to_string()))?;
            for device in devices {
                if let Ok(name) = device.name() {
                    if name.to_lowercase().contains(&wanted_lower) {
                        return Ok(device);
                    }
                }
            }
            Err(AcquireError::DeviceUnavailable(format!("no input device matching '{}'", wanted)))
        }
    }
}

fn lock_ring(ring: &Mutex<SampleRing>) -> MutexGuard<'_, SampleRing> {
    // A panic in the audio callback leaves plain sample data behind
    ring.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Downmix interleaved frames to mono, compress, and append to the ring.
struct InputChain {
    channels: usize,
    compressor: Compressor,
    ring: Arc<Mutex<SampleRing>>,
    mono: Vec<f32>,
}

impl InputChain {
    fn push<I>(&mut self, samples: I)
    where
        I: Iterator<Item = f32>,
    {
        self.mono.clear();
        let mut acc = 0.0;
        let mut n = 0;
        for s in samples {
            acc += s;
            n += 1;
            if n == self.channels {
                self.mono.push(acc / self.channels as f32);
                acc = 0.0;
                n = 0;
            }
        }
        self.compressor.process_block(&mut self.mono);
        lock_ring(&self.ring).extend(&self.mono);
    }
}

fn build_input_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    sample_format: SampleFormat,
    channels: usize,
    compressor: Compressor,
    ring: Arc<Mutex<SampleRing>>,
    failed: Arc<AtomicBool>,
) -> Result<Stream, AcquireError> {
    let mut chain = InputChain {
        channels,
        compressor,
        ring,
        mono: Vec::new(),
    };
    let err_fn = move |err: cpal::StreamError| {
        log::error!("Audio input stream error: {}", err);
        if matches!(err, cpal::StreamError::DeviceNotAvailable) {
            failed.store(true, Ordering::Release);
        }
    };

    let stream = match sample_format {
        SampleFormat::F32 => device.build_input_stream(
            config,
            move |data: &[f32], _| chain.push(data.iter().copied()),
            err_fn,
            None,
        )?,
        SampleFormat::I16 => device.build_input_stream(
            config,
            move |data: &[i16], _| {
                let scale = i16::MAX as f32;
                chain.push(data.iter().map(move |&s| s as f32 / scale));
            },
            err_fn,
            None,
        )?,
        SampleFormat::U16 => device.build_input_stream(
            config,
            move |data: &[u16], _| {
                let mid = u16::MAX as f32 / 2.0;
                chain.push(data.iter().map(move |&s| (s as f32 - mid) / mid));
            },
            err_fn,
            None,
        )?,
        other => return Err(AcquireError::UnsupportedFormat(format!("{:?}", other))),
    };
    Ok(stream)
}
