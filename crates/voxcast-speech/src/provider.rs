use crate::error::{TtsError, TtsResult};
use crate::types::{AudioFormat, AudioFrame, SynthesisRequest};
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Lazy, finite, non-restartable sequence of audio frames produced for one
/// request. Never shared across requests.
pub type FrameStream = Pin<Box<dyn Stream<Item = TtsResult<AudioFrame>> + Send>>;

/// How a provider talks to its backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterfaceKind {
    /// One request in, one complete payload out
    OneShot,
    /// Independent input-text and output-audio channels
    Duplex,
}

/// Minimal contract every synthesis backend implements.
#[async_trait]
pub trait SynthesisProvider: Send + Sync {
    /// Stable provider name used in configuration, cache keys, and logs.
    fn name(&self) -> &str;

    /// The audio format this provider is configured to produce.
    fn output_format(&self) -> AudioFormat;

    /// Synthesize the full request text into a frame stream.
    ///
    /// Out-of-range requests are rejected before any backend call; backend
    /// failures surface as [`TtsError::Provider`], never as a silently
    /// truncated stream.
    async fn synthesize(&self, request: SynthesisRequest) -> TtsResult<FrameStream>;
}

/// One increment of input text for a duplex backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TextChunk {
    Text(String),
    /// Explicit end-of-input marker; completion is never inferred from a
    /// timeout.
    End,
}

/// Caller-side handle for pushing text into an open duplex channel.
#[derive(Debug)]
pub struct TextSink {
    tx: mpsc::Sender<TextChunk>,
    provider: String,
}

impl TextSink {
    /// Wrap the sending half of a provider's input channel. Used by
    /// [`DuplexSynthesisProvider`] implementations.
    pub fn new(tx: mpsc::Sender<TextChunk>, provider: impl Into<String>) -> Self {
        Self {
            tx,
            provider: provider.into(),
        }
    }

    /// Push one text increment. Fails once the backend side has gone away.
    pub async fn push(&self, text: impl Into<String>) -> TtsResult<()> {
        self.tx
            .send(TextChunk::Text(text.into()))
            .await
            .map_err(|_| {
                TtsError::provider(self.provider.as_str(), "duplex input channel closed", true)
            })
    }

    /// Signal that no more text follows. Consumes the sink.
    pub async fn finish(self) -> TtsResult<()> {
        self.tx.send(TextChunk::End).await.map_err(|_| {
            TtsError::provider(self.provider.as_str(), "duplex input channel closed", true)
        })
    }
}

/// Capability for backends with independently progressing text-in and
/// audio-out channels.
#[async_trait]
pub trait DuplexSynthesisProvider: SynthesisProvider {
    /// Open a duplex channel for one request. The request's text field
    /// seeds validation only; actual input arrives through the returned
    /// [`TextSink`] and is terminated by [`TextChunk::End`].
    ///
    /// The final frame of the stream carries `is_final` only once the
    /// backend has confirmed the complete request, not merely the last
    /// chunk received so far.
    async fn open_duplex(&self, request: SynthesisRequest) -> TtsResult<(TextSink, FrameStream)>;
}

/// A constructed provider, tagged by capability.
///
/// The one-shot path never has to fake a duplex contract; callers that
/// need duplex semantics match on the variant.
#[derive(Clone)]
pub enum Provider {
    OneShot(Arc<dyn SynthesisProvider>),
    Duplex(Arc<dyn DuplexSynthesisProvider>),
}

impl Provider {
    pub fn name(&self) -> &str {
        match self {
            Provider::OneShot(p) => p.name(),
            Provider::Duplex(p) => p.name(),
        }
    }

    pub fn output_format(&self) -> AudioFormat {
        match self {
            Provider::OneShot(p) => p.output_format(),
            Provider::Duplex(p) => p.output_format(),
        }
    }

    pub fn kind(&self) -> InterfaceKind {
        match self {
            Provider::OneShot(_) => InterfaceKind::OneShot,
            Provider::Duplex(_) => InterfaceKind::Duplex,
        }
    }

    /// Synthesize the full request text, regardless of variant.
    pub async fn synthesize(&self, request: SynthesisRequest) -> TtsResult<FrameStream> {
        match self {
            Provider::OneShot(p) => p.synthesize(request).await,
            Provider::Duplex(p) => p.synthesize(request).await,
        }
    }

    /// Open a duplex channel; fails for one-shot providers.
    pub async fn open_duplex(
        &self,
        request: SynthesisRequest,
    ) -> TtsResult<(TextSink, FrameStream)> {
        match self {
            Provider::OneShot(p) => Err(TtsError::DuplexNotSupported(p.name().to_string())),
            Provider::Duplex(p) => p.open_duplex(request).await,
        }
    }
}

impl std::fmt::Debug for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("name", &self.name())
            .field("kind", &self.kind())
            .finish()
    }
}
