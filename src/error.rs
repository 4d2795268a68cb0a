use thiserror::Error;

/// Failures surfaced by the microphone acquirer. Everything downstream of
/// the acquirer is total and keeps running on a neutral signal.
#[derive(Debug, Error)]
pub enum AcquireError {
    #[error("microphone permission denied")]
    PermissionDenied,
    #[error("no usable input device: {0}")]
    DeviceUnavailable(String),
    #[error("unsupported input sample format: {0}")]
    UnsupportedFormat(String),
    #[error("audio stream error: {0}")]
    Stream(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl AcquireError {
    /// Hosts report a refused microphone as a backend-specific string, so
    /// classify it by content.
    pub(crate) fn from_backend(description: &str) -> Self {
        let lower = description.to_ascii_lowercase();
        if lower.contains("permission") || lower.contains("denied") || lower.contains("not allowed") {
            AcquireError::PermissionDenied
        } else {
            AcquireError::DeviceUnavailable(description.to_string())
        }
    }
}

impl From<cpal::BuildStreamError> for AcquireError {
    fn from(err: cpal::BuildStreamError) -> Self {
        match err {
            cpal::BuildStreamError::DeviceNotAvailable => {
                AcquireError::DeviceUnavailable("device not available".into())
            }
            cpal::BuildStreamError::StreamConfigNotSupported => {
                AcquireError::UnsupportedFormat("stream config not supported".into())
            }
            cpal::BuildStreamError::BackendSpecific { err } => {
                AcquireError::from_backend(&err.description)
            }
            other => AcquireError::Stream(other.to_string()),
        }
    }
}

impl From<cpal::PlayStreamError> for AcquireError {
    fn from(err: cpal::PlayStreamError) -> Self {
        match err {
            cpal::PlayStreamError::DeviceNotAvailable => {
                AcquireError::DeviceUnavailable("device not available".into())
            }
            cpal::PlayStreamError::BackendSpecific { err } => {
                AcquireError::from_backend(&err.description)
            }
        }
    }
}

impl From<cpal::DefaultStreamConfigError> for AcquireError {
    fn from(err: cpal::DefaultStreamConfigError) -> Self {
        match err {
            cpal::DefaultStreamConfigError::DeviceNotAvailable => {
                AcquireError::DeviceUnavailable("device not available".into())
            }
            cpal::DefaultStreamConfigError::StreamTypeNotSupported => {
                AcquireError::DeviceUnavailable("device has no input stream".into())
            }
            cpal::DefaultStreamConfigError::BackendSpecific { err } => {
                AcquireError::from_backend(&err.description)
            }
        }
    }
}
