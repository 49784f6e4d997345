use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;
use voxcast_speech::TtsError;

/// Delivery-layer errors. Provider failures are wrapped with the session
/// context they occurred in before surfacing.
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("session {session_id} ({provider}): {source}")]
    Session {
        session_id: Uuid,
        provider: String,
        #[source]
        source: TtsError,
    },

    #[error("sink closed before delivery completed")]
    SinkClosed,

    #[error("sink stalled under backpressure for {0:?}")]
    SinkStalled(Duration),

    #[error("frame order violation: expected sequence >= {expected}, got {got}")]
    OutOfOrder { expected: u64, got: u64 },

    #[error("delivery task failed: {0}")]
    Internal(String),

    #[error(transparent)]
    Tts(#[from] TtsError),
}

impl DeliveryError {
    pub fn in_session(session_id: Uuid, provider: impl Into<String>, source: TtsError) -> Self {
        DeliveryError::Session {
            session_id,
            provider: provider.into(),
            source,
        }
    }

    /// The wrapped provider-layer error, if any.
    pub fn as_tts(&self) -> Option<&TtsError> {
        match self {
            DeliveryError::Session { source, .. } => Some(source),
            DeliveryError::Tts(source) => Some(source),
            _ => None,
        }
    }
}

pub type DeliveryResult<T> = Result<T, DeliveryError>;
