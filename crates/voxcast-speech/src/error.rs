use crate::types::AudioFormat;
use std::time::Duration;
use thiserror::Error;

/// TTS-related errors
#[derive(Error, Debug)]
pub enum TtsError {
    /// Invalid provider or request configuration
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A field declared required by the provider descriptor is absent
    #[error("missing required field: {0}")]
    MissingField(String),

    /// No descriptor matches the requested provider type key
    #[error("unknown provider type: {0}")]
    UnknownProvider(String),

    /// Vendor or network failure reported by a provider backend
    #[error("provider '{provider}' failed: {message}")]
    Provider {
        provider: String,
        message: String,
        /// Whether retrying the call may succeed (rate limits, 5xx, transport drops)
        transient: bool,
    },

    /// The provider did not offer a duplex channel
    #[error("duplex streaming not supported by provider '{0}'")]
    DuplexNotSupported(String),

    /// No audio frame was produced within the configured ceiling
    #[error("no audio frame within {0:?}")]
    Timeout(Duration),

    /// Cached or produced audio format disagrees with the request
    #[error("audio format mismatch: requested {requested}, produced {produced}")]
    FormatMismatch {
        requested: AudioFormat,
        produced: AudioFormat,
    },

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl TtsError {
    /// Shorthand for a provider backend failure.
    pub fn provider(
        provider: impl Into<String>,
        message: impl Into<String>,
        transient: bool,
    ) -> Self {
        TtsError::Provider {
            provider: provider.into(),
            message: message.into(),
            transient,
        }
    }

    /// True only for provider failures that are worth one retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, TtsError::Provider { transient: true, .. })
    }
}

/// Result type for TTS operations
pub type TtsResult<T> = Result<T, TtsError>;
