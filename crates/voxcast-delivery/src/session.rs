//! Per-request synthesis session lifecycle.
//!
//! A session drives one provider through one request:
//!
//! ```text
//! Created -> Dispatching -> Streaming -> Completed
//!                 |              |
//!                 +--------------+--> Failed
//!       (any non-terminal state) ---> Cancelled
//! ```
//!
//! Exactly one terminal state is ever reached, and no frame is forwarded
//! after it.

use crate::config::DeliveryConfig;
use crate::error::{DeliveryError, DeliveryResult};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use uuid::Uuid;
use voxcast_speech::{FrameStream, Provider, SynthesisRequest, TextSink, TtsError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Dispatching,
    Streaming,
    Completed,
    Failed,
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Failed | SessionState::Cancelled
        )
    }
}

/// Handle for cancelling a session from outside its delivery task.
#[derive(Clone)]
pub struct CancelHandle {
    session_id: Uuid,
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

/// State for one synthesis request, from dispatch to terminal completion.
pub struct SynthesisSession {
    id: Uuid,
    request: SynthesisRequest,
    provider: Provider,
    state: SessionState,
    frames_produced: u64,
    started_at: Instant,
    finished_at: Option<Instant>,
    cancel_tx: Arc<watch::Sender<bool>>,
    cancel_rx: watch::Receiver<bool>,
}

impl SynthesisSession {
    pub fn new(provider: Provider, request: SynthesisRequest) -> Self {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        Self {
            id: Uuid::new_v4(),
            request,
            provider,
            state: SessionState::Created,
            frames_produced: 0,
            started_at: Instant::now(),
            finished_at: None,
            cancel_tx: Arc::new(cancel_tx),
            cancel_rx,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn request(&self) -> &SynthesisRequest {
        &self.request
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn frames_produced(&self) -> u64 {
        self.frames_produced
    }

    /// Wall-clock duration from creation until the terminal state, or
    /// until now for a live session.
    pub fn elapsed(&self) -> std::time::Duration {
        self.finished_at
            .unwrap_or_else(Instant::now)
            .duration_since(self.started_at)
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            session_id: self.id,
            tx: self.cancel_tx.clone(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel_rx.borrow()
    }

    pub(crate) fn cancel_watcher(&self) -> watch::Receiver<bool> {
        self.cancel_rx.clone()
    }

    /// Advance the state machine. Transitions out of a terminal state are
    /// ignored so exactly one terminal event is ever observed.
    pub(crate) fn transition(&mut self, next: SessionState) {
        if self.state.is_terminal() {
            return;
        }
        log::debug!("session {}: {:?} -> {:?}", self.id, self.state, next);
        self.state = next;
        if next.is_terminal() {
            self.finished_at = Some(Instant::now());
        }
    }

    pub(crate) fn record_frame(&mut self) {
        self.frames_produced += 1;
    }

    /// Initiate the provider call, retrying a transient failure within the
    /// configured bound.
    pub(crate) async fn dispatch(&mut self, config: &DeliveryConfig) -> DeliveryResult<FrameStream> {
        self.transition(SessionState::Dispatching);
        let mut attempts = 0u32;
        loop {
            match self.provider.synthesize(self.request.clone()).await {
                Ok(stream) => return Ok(stream),
                Err(e) if e.is_transient() && attempts < config.max_transient_retries => {
                    attempts += 1;
                    log::warn!(
                        "session {}: transient provider failure (retry {attempts}/{}): {e}",
                        self.id,
                        config.max_transient_retries
                    );
                    tokio::time::sleep(config.retry_backoff()).await;
                }
                Err(e) => return Err(self.dispatch_failed(e)),
            }
        }
    }

    /// Open a duplex channel; the connection stage gets the same bounded
    /// retry as one-shot dispatch.
    pub(crate) async fn dispatch_duplex(
        &mut self,
        config: &DeliveryConfig,
    ) -> DeliveryResult<(TextSink, FrameStream)> {
        self.transition(SessionState::Dispatching);
        let mut attempts = 0u32;
        loop {
            match self.provider.open_duplex(self.request.clone()).await {
                Ok(channel) => return Ok(channel),
                Err(e) if e.is_transient() && attempts < config.max_transient_retries => {
                    attempts += 1;
                    log::warn!(
                        "session {}: duplex open failed (retry {attempts}/{}): {e}",
                        self.id,
                        config.max_transient_retries
                    );
                    tokio::time::sleep(config.retry_backoff()).await;
                }
                Err(e) => return Err(self.dispatch_failed(e)),
            }
        }
    }

    fn dispatch_failed(&mut self, source: TtsError) -> DeliveryError {
        self.transition(SessionState::Failed);
        DeliveryError::in_session(self.id, self.provider.name().to_string(), source)
    }
}
