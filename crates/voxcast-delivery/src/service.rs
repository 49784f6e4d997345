//! The session-facing speech API exposed to the protocol layer.
//!
//! One `SpeechService` serves one device conversation: it resolves the
//! active provider, enforces the one-active-turn rule, runs the cache
//! fast path, and hands sessions to the delivery pipeline.

use crate::artifact::ArtifactStore;
use crate::config::DeliveryConfig;
use crate::error::{DeliveryError, DeliveryResult};
use crate::pipeline::{CompletionReason, DeliveryPipeline, DeliveryReport, FrameSink};
use crate::session::{CancelHandle, SessionState, SynthesisSession};
use bytes::Bytes;
use futures::StreamExt;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;
use voxcast_speech::{
    text::clean_markdown, CacheKey, CachedAudio, FrameChunker, FrameStream, InterfaceKind,
    Provider, ProviderRegistry, ResultCache, SynthesisRequest, TextSink, TtsError, TtsResult,
};

pub struct SpeechService {
    registry: Arc<ProviderRegistry>,
    pipeline: DeliveryPipeline,
    cache: Option<Arc<dyn ResultCache>>,
    artifacts: Option<ArtifactStore>,
    active: Arc<Mutex<Option<CancelHandle>>>,
}

impl SpeechService {
    pub fn new(registry: Arc<ProviderRegistry>, config: DeliveryConfig) -> Self {
        Self {
            registry,
            pipeline: DeliveryPipeline::new(config),
            cache: None,
            artifacts: None,
            active: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_artifacts(mut self, artifacts: ArtifactStore) -> Self {
        self.artifacts = Some(artifacts);
        self
    }

    /// Synthesize one utterance with the active provider's defaults and
    /// stream the frames to `sink`. Returns when the turn reaches a
    /// terminal state; the report is the end-of-utterance signal.
    pub async fn synthesize<S: FrameSink>(
        &self,
        text: &str,
        sink: &mut S,
    ) -> DeliveryResult<DeliveryReport> {
        let provider = self.registry.active()?;
        let request = SynthesisRequest::new(clean_markdown(text), "", provider.output_format());
        self.run_turn(provider, request, sink).await
    }

    /// Synthesize a fully specified request with the active provider.
    pub async fn synthesize_with<S: FrameSink>(
        &self,
        request: SynthesisRequest,
        sink: &mut S,
    ) -> DeliveryResult<DeliveryReport> {
        let provider = self.registry.active()?;
        self.run_turn(provider, request, sink).await
    }

    /// Open a duplex turn: text is pushed incrementally while frames are
    /// delivered to `sink` concurrently. The active provider must support
    /// duplex streaming.
    pub async fn begin_turn<S: FrameSink + 'static>(&self, sink: S) -> DeliveryResult<DuplexTurn> {
        let provider = self.registry.active()?;
        // text arrives incrementally through the returned handle
        let request = SynthesisRequest::new("", "", provider.output_format());

        let mut session = SynthesisSession::new(provider, request);
        self.install(&session);
        let (text, stream) = match session.dispatch_duplex(self.pipeline.config()).await {
            Ok(channel) => channel,
            Err(e) => {
                self.clear(session.id());
                return Err(e);
            }
        };

        let session_id = session.id();
        let pipeline = self.pipeline.clone();
        let active = self.active.clone();
        let delivery = tokio::spawn(async move {
            let mut sink = sink;
            let report = pipeline.deliver(&mut session, stream, &mut sink).await;
            let mut guard = active.lock().expect("active turn lock poisoned");
            if guard.as_ref().is_some_and(|h| h.session_id() == session_id) {
                *guard = None;
            }
            report
        });

        Ok(DuplexTurn {
            session_id,
            text,
            delivery,
        })
    }

    /// Cancel the named session. Effective within one frame-production
    /// interval: no further frame reaches the sink afterwards.
    pub fn cancel(&self, session_id: Uuid) -> bool {
        let guard = self.active.lock().expect("active turn lock poisoned");
        match guard.as_ref() {
            Some(handle) if handle.session_id() == session_id => {
                log::info!("cancelling session {session_id}");
                handle.cancel();
                true
            }
            _ => false,
        }
    }

    async fn run_turn<S: FrameSink>(
        &self,
        provider: Provider,
        request: SynthesisRequest,
        sink: &mut S,
    ) -> DeliveryResult<DeliveryReport> {
        request.validate()?;

        // Whole-payload reuse only makes sense where the whole payload is
        // produced up front.
        let cache_key = if provider.kind() == InterfaceKind::OneShot && self.cache.is_some() {
            Some(CacheKey::new(
                provider.name(),
                &request.voice_id,
                &request.format,
                request.speech_rate,
                &request.text,
            ))
        } else {
            None
        };

        if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
            if let Some(hit) = cache.lookup(key) {
                if hit.format != request.format {
                    cache.invalidate(key);
                    return Err(TtsError::FormatMismatch {
                        requested: request.format.clone(),
                        produced: hit.format,
                    }
                    .into());
                }
                log::debug!("cache hit ({} bytes), provider call skipped", hit.bytes.len());
                return Ok(self.deliver_cached(provider, request, hit.bytes, sink).await);
            }
        }

        let mut session = SynthesisSession::new(provider.clone(), request.clone());
        self.install(&session);

        let stream = match session.dispatch(self.pipeline.config()).await {
            Ok(stream) => stream,
            Err(error) => {
                self.clear(session.id());
                log::error!("{error}");
                return Ok(DeliveryReport {
                    session_id: session.id(),
                    frames_sent: 0,
                    bytes_sent: 0,
                    reason: CompletionReason::Failed,
                    error: Some(error),
                });
            }
        };

        // Accumulate the payload while it streams so completed one-shot
        // turns can feed the cache and the artifact store.
        let collected = if cache_key.is_some() || self.artifacts.is_some() {
            Some(Arc::new(Mutex::new(Vec::<u8>::new())))
        } else {
            None
        };
        let stream: FrameStream = match &collected {
            Some(buffer) => {
                let buffer = buffer.clone();
                Box::pin(stream.inspect(move |item| {
                    if let Ok(frame) = item {
                        buffer
                            .lock()
                            .expect("payload buffer lock poisoned")
                            .extend_from_slice(&frame.payload);
                    }
                }))
            }
            None => stream,
        };

        let report = self.pipeline.deliver(&mut session, stream, sink).await;
        self.clear(session.id());

        if report.reason == CompletionReason::Completed {
            if let Some(buffer) = collected {
                let payload = Bytes::from(std::mem::take(
                    &mut *buffer.lock().expect("payload buffer lock poisoned"),
                ));
                if let (Some(cache), Some(key)) = (&self.cache, cache_key) {
                    cache.store(
                        key,
                        CachedAudio {
                            format: request.format.clone(),
                            bytes: payload.clone(),
                        },
                    );
                }
                self.write_artifact(report.session_id, &request, &payload).await;
            }
        }
        Ok(report)
    }

    /// Serve a cached payload through the normal pipeline, re-sliced into
    /// frames exactly like a fresh one-shot result.
    async fn deliver_cached<S: FrameSink>(
        &self,
        provider: Provider,
        request: SynthesisRequest,
        payload: Bytes,
        sink: &mut S,
    ) -> DeliveryReport {
        let frames = FrameChunker::default().slice(payload);
        let stream: FrameStream = Box::pin(futures::stream::iter(frames.into_iter().map(Ok)));

        let mut session = SynthesisSession::new(provider, request);
        self.install(&session);
        session.transition(SessionState::Dispatching);
        let report = self.pipeline.deliver(&mut session, stream, sink).await;
        self.clear(session.id());
        report
    }

    async fn write_artifact(&self, session_id: Uuid, request: &SynthesisRequest, payload: &[u8]) {
        let Some(store) = &self.artifacts else {
            return;
        };
        match store.persist(session_id, &request.format, payload).await {
            Ok(path) => {
                log::debug!("wrote artifact {}", path.display());
                store.finish(&path).await;
            }
            // persistence is best-effort; the turn already succeeded
            Err(e) => log::warn!("artifact write failed for session {session_id}: {e}"),
        }
    }

    /// Make `session` the one active turn, interrupting any predecessor.
    fn install(&self, session: &SynthesisSession) {
        let mut guard = self.active.lock().expect("active turn lock poisoned");
        if let Some(previous) = guard.take() {
            log::info!(
                "interrupting session {} for new turn {}",
                previous.session_id(),
                session.id()
            );
            previous.cancel();
        }
        *guard = Some(session.cancel_handle());
    }

    fn clear(&self, session_id: Uuid) {
        let mut guard = self.active.lock().expect("active turn lock poisoned");
        if guard.as_ref().is_some_and(|h| h.session_id() == session_id) {
            *guard = None;
        }
    }
}

/// Handle for one in-flight duplex turn.
#[derive(Debug)]
pub struct DuplexTurn {
    session_id: Uuid,
    text: TextSink,
    delivery: JoinHandle<DeliveryReport>,
}

impl DuplexTurn {
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Push one text increment; markdown is stripped first and empty
    /// increments are skipped.
    pub async fn push_text(&self, text: &str) -> TtsResult<()> {
        let cleaned = clean_markdown(text);
        if cleaned.is_empty() {
            return Ok(());
        }
        self.text.push(cleaned).await
    }

    /// Close the input side and wait for delivery to reach its terminal
    /// state.
    pub async fn finish(self) -> DeliveryResult<DeliveryReport> {
        // The input channel may already be gone if delivery failed early;
        // the report carries the outcome either way.
        let _ = self.text.finish().await;
        self.delivery
            .await
            .map_err(|e| DeliveryError::Internal(e.to_string()))
    }
}
