//! Microphone capture, dynamics compression, spectrum analysis and the
//! per-tick feature extraction built on top of them.

pub mod acquire;
pub mod analyser;
pub mod compressor;
pub mod features;

pub use acquire::{list_input_devices, Acquirer, SignalSource};
pub use analyser::AudioFrame;
pub use features::{Band, FeatureExtractor, FeatureVector};
