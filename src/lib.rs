//! Live speech features and pending-state integration for an audio-reactive
//! visual effect.
//!
//! Data flows `Acquirer -> FeatureExtractor -> Integrator` and out as a
//! [`ControlFrame`] each render tick. [`Pipeline`] wires the three together.

pub mod audio;
pub mod config;
pub mod control;
pub mod error;
pub mod pipeline;

pub use audio::{Acquirer, FeatureVector, SignalSource};
pub use config::Config;
pub use control::{ControlFrame, ControlUniforms, PendingHandle, Resolution};
pub use error::{AcquireError, ConfigError};
pub use pipeline::Pipeline;
