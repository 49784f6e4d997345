//! Frame delivery from a session's provider stream to the device sink.
//!
//! The pipeline pulls at most one frame at a time: under sink
//! backpressure nothing further is pulled from the provider, so buffering
//! never grows beyond a single frame.

use crate::config::DeliveryConfig;
use crate::error::DeliveryError;
use crate::session::{SessionState, SynthesisSession};
use async_trait::async_trait;
use futures::StreamExt;
use std::time::Duration;
use uuid::Uuid;
use voxcast_speech::{AudioFrame, FrameStream, TtsError};

/// Outcome of handing one frame to a sink.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SinkStatus {
    Accepted,
    /// The sink cannot take the frame right now; it was not consumed.
    Backpressure,
    /// The peer is gone; the session should be cancelled.
    Closed,
}

/// Where a session's frames go: the device connection, a recorder, a test
/// collector.
#[async_trait]
pub trait FrameSink: Send {
    async fn accept(&mut self, frame: &AudioFrame) -> SinkStatus;
}

/// Why a delivery ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompletionReason {
    Completed,
    Failed,
    Cancelled,
}

/// End-of-delivery summary handed back to the protocol layer. Receiving
/// it is the end-of-utterance signal: the device may resume listening.
#[derive(Debug)]
pub struct DeliveryReport {
    pub session_id: Uuid,
    pub frames_sent: u64,
    pub bytes_sent: u64,
    pub reason: CompletionReason,
    pub error: Option<DeliveryError>,
}

enum ForwardOutcome {
    Delivered,
    Cancelled,
    Closed,
    Stalled(Duration),
}

#[derive(Clone, Debug, Default)]
pub struct DeliveryPipeline {
    config: DeliveryConfig,
}

impl DeliveryPipeline {
    pub fn new(config: DeliveryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DeliveryConfig {
        &self.config
    }

    /// Forward the session's frames to the sink in order until a terminal
    /// condition is reached. Every failure collapses into a single
    /// `Failed` outcome; the caller gets silence, never a hung turn.
    pub async fn deliver<S: FrameSink>(
        &self,
        session: &mut SynthesisSession,
        mut stream: FrameStream,
        sink: &mut S,
    ) -> DeliveryReport {
        let mut cancel = session.cancel_watcher();
        let mut frames_sent = 0u64;
        let mut bytes_sent = 0u64;
        let mut next_sequence = 0u64;
        let mut first = true;

        let (reason, error) = loop {
            if session.is_cancelled() {
                break (CompletionReason::Cancelled, None);
            }

            let ceiling = if first {
                self.config.first_frame_timeout()
            } else {
                self.config.frame_timeout()
            };
            let item = tokio::select! {
                biased;
                _ = cancel.changed() => break (CompletionReason::Cancelled, None),
                item = tokio::time::timeout(ceiling, stream.next()) => item,
            };

            let item = match item {
                Err(_) => {
                    break (
                        CompletionReason::Failed,
                        Some(self.session_error(session, TtsError::Timeout(ceiling))),
                    );
                }
                // The stream must end with a final frame; running dry
                // without one means the backend truncated the utterance.
                Ok(None) => {
                    break (
                        CompletionReason::Failed,
                        Some(self.session_error(
                            session,
                            TtsError::provider(
                                session.provider_name().to_string(),
                                "stream ended before final frame",
                                true,
                            ),
                        )),
                    );
                }
                Ok(Some(item)) => item,
            };

            let frame = match item {
                Ok(frame) => frame,
                Err(e) => {
                    break (
                        CompletionReason::Failed,
                        Some(self.session_error(session, e)),
                    );
                }
            };

            if first {
                session.transition(SessionState::Streaming);
                first = false;
            }

            if frame.sequence < next_sequence {
                break (
                    CompletionReason::Failed,
                    Some(DeliveryError::OutOfOrder {
                        expected: next_sequence,
                        got: frame.sequence,
                    }),
                );
            }
            next_sequence = frame.sequence + 1;

            match self.forward(session, sink, &frame).await {
                ForwardOutcome::Delivered => {
                    session.record_frame();
                    frames_sent += 1;
                    bytes_sent += frame.len() as u64;
                    if frame.is_final {
                        break (CompletionReason::Completed, None);
                    }
                }
                ForwardOutcome::Cancelled => break (CompletionReason::Cancelled, None),
                ForwardOutcome::Closed => {
                    session.cancel_handle().cancel();
                    break (CompletionReason::Cancelled, Some(DeliveryError::SinkClosed));
                }
                ForwardOutcome::Stalled(waited) => {
                    break (
                        CompletionReason::Failed,
                        Some(DeliveryError::SinkStalled(waited)),
                    );
                }
            }
        };

        // Dropping the stream aborts any in-flight vendor traffic; nothing
        // can reach the sink after the terminal event below.
        drop(stream);
        match reason {
            CompletionReason::Completed => session.transition(SessionState::Completed),
            CompletionReason::Failed => session.transition(SessionState::Failed),
            CompletionReason::Cancelled => session.transition(SessionState::Cancelled),
        }

        match &error {
            Some(e) => log::error!(
                "session {} ended after {frames_sent} frames: {e}",
                session.id()
            ),
            None => log::info!(
                "session {} {:?} ({frames_sent} frames, {bytes_sent} bytes, {:?})",
                session.id(),
                reason,
                session.elapsed()
            ),
        }

        DeliveryReport {
            session_id: session.id(),
            frames_sent,
            bytes_sent,
            reason,
            error,
        }
    }

    /// Hand one frame to the sink, waiting out backpressure. The frame is
    /// retried against the sink; the provider stream is not touched until
    /// the sink accepts or dies.
    async fn forward<S: FrameSink>(
        &self,
        session: &SynthesisSession,
        sink: &mut S,
        frame: &AudioFrame,
    ) -> ForwardOutcome {
        let mut waited = Duration::ZERO;
        loop {
            if session.is_cancelled() {
                return ForwardOutcome::Cancelled;
            }
            match sink.accept(frame).await {
                SinkStatus::Accepted => return ForwardOutcome::Delivered,
                SinkStatus::Closed => return ForwardOutcome::Closed,
                SinkStatus::Backpressure => {
                    if waited >= self.config.backpressure_ceiling() {
                        return ForwardOutcome::Stalled(waited);
                    }
                    tokio::time::sleep(self.config.backpressure_wait()).await;
                    waited += self.config.backpressure_wait();
                }
            }
        }
    }

    fn session_error(&self, session: &SynthesisSession, source: TtsError) -> DeliveryError {
        DeliveryError::in_session(session.id(), session.provider_name().to_string(), source)
    }
}
