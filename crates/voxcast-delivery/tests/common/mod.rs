//! Shared scripted providers and sinks for delivery tests.
#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use voxcast_delivery::{FrameSink, SinkStatus};
use voxcast_speech::{
    AudioFormat, AudioFrame, DuplexSynthesisProvider, FrameChunker, FrameStream,
    SynthesisProvider, SynthesisRequest, TextChunk, TextSink, TtsError, TtsResult,
};

/// What a [`ScriptedProvider`] emits for a request.
#[derive(Clone)]
pub enum Payload {
    /// A fixed byte payload, sliced through the standard chunker.
    Fixed(Vec<u8>),
    /// The request text repeated `repeat` times, so sinks can be checked
    /// for cross-session contamination.
    EchoText { repeat: usize },
    /// A stream that never yields anything.
    Silent,
    /// Frames for the payload, but the stream ends without a final frame.
    Truncated(Vec<u8>),
}

/// One-shot provider with scripted failures and timing.
pub struct ScriptedProvider {
    payload: Payload,
    frame_delay: Duration,
    fail_attempts: AtomicU32,
    fail_transient: bool,
    pub calls: AtomicU32,
}

impl ScriptedProvider {
    pub fn new(payload: Payload) -> Self {
        Self {
            payload,
            frame_delay: Duration::ZERO,
            fail_attempts: AtomicU32::new(0),
            fail_transient: false,
            calls: AtomicU32::new(0),
        }
    }

    pub fn with_frame_delay(mut self, delay: Duration) -> Self {
        self.frame_delay = delay;
        self
    }

    pub fn failing_first(self, attempts: u32, transient: bool) -> Self {
        self.fail_attempts.store(attempts, Ordering::SeqCst);
        Self {
            fail_transient: transient,
            ..self
        }
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SynthesisProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn output_format(&self) -> AudioFormat {
        AudioFormat::pcm_16k_mono()
    }

    async fn synthesize(&self, request: SynthesisRequest) -> TtsResult<FrameStream> {
        request.validate()?;
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self
            .fail_attempts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(TtsError::provider(
                "scripted",
                "scripted failure",
                self.fail_transient,
            ));
        }

        let (bytes, truncate) = match &self.payload {
            Payload::Fixed(bytes) => (bytes.clone(), false),
            Payload::EchoText { repeat } => (request.text.repeat(*repeat).into_bytes(), false),
            Payload::Silent => return Ok(Box::pin(futures::stream::pending())),
            Payload::Truncated(bytes) => (bytes.clone(), true),
        };

        let mut frames = FrameChunker::default().slice(Bytes::from(bytes));
        if truncate {
            for frame in &mut frames {
                frame.is_final = false;
            }
        }

        let delay = self.frame_delay;
        if delay.is_zero() && !truncate {
            return Ok(Box::pin(futures::stream::iter(frames.into_iter().map(Ok))));
        }

        let (tx, rx) = mpsc::channel(2);
        tokio::spawn(async move {
            for frame in frames {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                if tx.send(Ok(frame)).await.is_err() {
                    return;
                }
            }
        });
        Ok(Box::pin(ReceiverStream::new(rx)))
    }
}

/// Duplex provider that answers every text increment with `chunks_per_push`
/// audio chunks and finishes on the end-of-input marker.
pub struct EchoDuplexProvider {
    pub chunk_bytes: usize,
    pub chunks_per_push: usize,
}

#[async_trait]
impl SynthesisProvider for EchoDuplexProvider {
    fn name(&self) -> &str {
        "echo-duplex"
    }

    fn output_format(&self) -> AudioFormat {
        AudioFormat::pcm_16k_mono()
    }

    async fn synthesize(&self, request: SynthesisRequest) -> TtsResult<FrameStream> {
        let text = request.text.clone();
        let (sink, stream) = self.open_duplex(request).await?;
        tokio::spawn(async move {
            if sink.push(text).await.is_ok() {
                let _ = sink.finish().await;
            }
        });
        Ok(stream)
    }
}

#[async_trait]
impl DuplexSynthesisProvider for EchoDuplexProvider {
    async fn open_duplex(&self, request: SynthesisRequest) -> TtsResult<(TextSink, FrameStream)> {
        request.validate_parameters()?;
        let (text_tx, mut text_rx) = mpsc::channel::<TextChunk>(8);
        let (frame_tx, frame_rx) = mpsc::channel(8);
        let chunks = self.chunks_per_push;
        let size = self.chunk_bytes;
        tokio::spawn(async move {
            let mut sequence = 0u64;
            while let Some(chunk) = text_rx.recv().await {
                match chunk {
                    TextChunk::Text(_) => {
                        for _ in 0..chunks {
                            let marker = (sequence + 1) as u8;
                            let frame =
                                AudioFrame::new(sequence, Bytes::from(vec![marker; size]), false);
                            sequence += 1;
                            if frame_tx.send(Ok(frame)).await.is_err() {
                                return;
                            }
                        }
                    }
                    TextChunk::End => {
                        let _ = frame_tx
                            .send(Ok(AudioFrame::new(sequence, Bytes::new(), true)))
                            .await;
                        return;
                    }
                }
            }
        });
        Ok((
            TextSink::new(text_tx, "echo-duplex"),
            Box::pin(ReceiverStream::new(frame_rx)),
        ))
    }
}

/// Accepts everything; frames are observable from outside the delivery
/// task through the shared handle.
#[derive(Clone, Default)]
pub struct CollectingSink {
    frames: Arc<Mutex<Vec<AudioFrame>>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> Vec<AudioFrame> {
        self.frames.lock().unwrap().clone()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.lock().unwrap().len()
    }

    pub fn payload(&self) -> Vec<u8> {
        self.frames
            .lock()
            .unwrap()
            .iter()
            .flat_map(|f| f.payload.to_vec())
            .collect()
    }
}

#[async_trait]
impl FrameSink for CollectingSink {
    async fn accept(&mut self, frame: &AudioFrame) -> SinkStatus {
        self.frames.lock().unwrap().push(frame.clone());
        SinkStatus::Accepted
    }
}

/// Refuses the first `refusals` accept calls, then behaves like a
/// collecting sink.
pub struct BackpressureSink {
    pub inner: CollectingSink,
    refusals: AtomicUsize,
    pub refused: AtomicUsize,
}

impl BackpressureSink {
    pub fn new(refusals: usize) -> Self {
        Self {
            inner: CollectingSink::new(),
            refusals: AtomicUsize::new(refusals),
            refused: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl FrameSink for BackpressureSink {
    async fn accept(&mut self, frame: &AudioFrame) -> SinkStatus {
        if self
            .refusals
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            self.refused.fetch_add(1, Ordering::SeqCst);
            return SinkStatus::Backpressure;
        }
        self.inner.accept(frame).await
    }
}

/// Reports the connection as gone after `accept_limit` frames.
pub struct ClosingSink {
    pub inner: CollectingSink,
    accept_limit: usize,
}

impl ClosingSink {
    pub fn new(accept_limit: usize) -> Self {
        Self {
            inner: CollectingSink::new(),
            accept_limit,
        }
    }
}

#[async_trait]
impl FrameSink for ClosingSink {
    async fn accept(&mut self, frame: &AudioFrame) -> SinkStatus {
        if self.inner.frame_count() >= self.accept_limit {
            return SinkStatus::Closed;
        }
        self.inner.accept(frame).await
    }
}
