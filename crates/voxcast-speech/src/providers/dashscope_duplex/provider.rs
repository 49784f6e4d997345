use super::protocol::{
    ClientMessage, ServerMessage, SynthesisParameters, EVENT_RESULT_GENERATED,
    EVENT_TASK_FAILED, EVENT_TASK_FINISHED, EVENT_TASK_STARTED,
};
use super::DashScopeDuplexConfig;
use crate::error::{TtsError, TtsResult};
use crate::provider::{
    DuplexSynthesisProvider, FrameStream, SynthesisProvider, TextChunk, TextSink,
};
use crate::types::{AudioFormat, AudioFrame, SynthesisRequest};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::connect_async;
use uuid::Uuid;

/// Duplex DashScope provider
pub struct DashScopeDuplexProvider {
    config: DashScopeDuplexConfig,
    format: AudioFormat,
}

impl DashScopeDuplexProvider {
    pub fn new(config: DashScopeDuplexConfig) -> TtsResult<Self> {
        config.validate()?;
        let format = config.output_format()?;
        Ok(Self { config, format })
    }

    pub fn config(&self) -> &DashScopeDuplexConfig {
        &self.config
    }

    fn effective_voice(&self, request: &SynthesisRequest) -> String {
        if request.voice_id.is_empty() {
            self.config.voice.clone()
        } else {
            request.voice_id.clone()
        }
    }
}

#[async_trait]
impl SynthesisProvider for DashScopeDuplexProvider {
    fn name(&self) -> &str {
        super::NAME
    }

    fn output_format(&self) -> AudioFormat {
        self.format.clone()
    }

    /// One-shot adaptation: push the whole text as a single increment and
    /// close the input side immediately. Failures surface on the frame
    /// stream.
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
impl DuplexSynthesisProvider for DashScopeDuplexProvider {
    async fn open_duplex(&self, request: SynthesisRequest) -> TtsResult<(TextSink, FrameStream)> {
        request.validate_parameters()?;

        let mut ws_request = self
            .config
            .endpoint
            .as_str()
            .into_client_request()
            .map_err(|e| TtsError::Config(format!("bad duplex endpoint: {e}")))?;
        ws_request.headers_mut().insert(
            "authorization",
            format!("bearer {}", self.config.api_key)
                .parse()
                .map_err(|_| TtsError::Config("api_key is not a valid header value".into()))?,
        );

        let (ws, _) = connect_async(ws_request)
            .await
            .map_err(|e| TtsError::provider(super::NAME, format!("connect failed: {e}"), true))?;
        let (mut write, mut read) = ws.split();

        let task_id = Uuid::new_v4().to_string();
        let parameters = SynthesisParameters {
            text_type: "PlainText",
            voice: self.effective_voice(&request),
            format: self.format.encoding.as_str().to_string(),
            sample_rate: self.format.sample_rate,
            rate: request.speech_rate,
        };
        let open = ClientMessage::run_task(&task_id, &self.config.model, parameters).to_json();
        write
            .send(Message::Text(open.into()))
            .await
            .map_err(|e| TtsError::provider(super::NAME, format!("open failed: {e}"), true))?;

        // The reader flips this on task-finished/task-failed; the writer
        // checks it so nothing is sent into a dead task.
        let terminal = Arc::new(AtomicBool::new(false));

        let (text_tx, mut text_rx) = mpsc::channel::<TextChunk>(32);
        let (frame_tx, frame_rx) = mpsc::channel::<TtsResult<AudioFrame>>(32);

        let writer_terminal = terminal.clone();
        let writer_task_id = task_id.clone();
        tokio::spawn(async move {
            let mut finished = false;
            while let Some(chunk) = text_rx.recv().await {
                if writer_terminal.load(Ordering::SeqCst) {
                    break;
                }
                match chunk {
                    TextChunk::Text(text) => {
                        let msg = ClientMessage::continue_task(&writer_task_id, text).to_json();
                        if write.send(Message::Text(msg.into())).await.is_err() {
                            break;
                        }
                    }
                    TextChunk::End => {
                        let msg = ClientMessage::finish_task(&writer_task_id).to_json();
                        let _ = write.send(Message::Text(msg.into())).await;
                        finished = true;
                        break;
                    }
                }
            }
            // Input side dropped without an explicit end marker: still ask
            // the backend to flush what it has.
            if !finished && !writer_terminal.load(Ordering::SeqCst) {
                let msg = ClientMessage::finish_task(&writer_task_id).to_json();
                let _ = write.send(Message::Text(msg.into())).await;
            }
        });

        let reader_terminal = terminal;
        tokio::spawn(async move {
            let mut sequence = 0u64;
            while let Some(result) = read.next().await {
                let message = match result {
                    Ok(m) => m,
                    Err(e) => {
                        reader_terminal.store(true, Ordering::SeqCst);
                        let _ = frame_tx
                            .send(Err(TtsError::provider(
                                super::NAME,
                                format!("websocket error: {e}"),
                                true,
                            )))
                            .await;
                        return;
                    }
                };
                match message {
                    Message::Binary(data) => {
                        let frame = AudioFrame::new(sequence, data, false);
                        sequence += 1;
                        if frame_tx.send(Ok(frame)).await.is_err() {
                            // receiver dropped: the session was cancelled,
                            // discard whatever else arrives
                            return;
                        }
                    }
                    Message::Text(text) => {
                        let event = match ServerMessage::parse(text.as_str()) {
                            Ok(m) => m,
                            Err(e) => {
                                log::warn!("unparseable gateway event: {e}");
                                continue;
                            }
                        };
                        match event.header.event.as_str() {
                            EVENT_TASK_STARTED => {
                                log::debug!("synthesis task {} started", event.header.task_id);
                            }
                            EVENT_RESULT_GENERATED => {}
                            EVENT_TASK_FINISHED => {
                                // Only now is the request known to be
                                // complete; mark the end of the utterance.
                                reader_terminal.store(true, Ordering::SeqCst);
                                let _ = frame_tx
                                    .send(Ok(AudioFrame::new(sequence, Bytes::new(), true)))
                                    .await;
                                return;
                            }
                            EVENT_TASK_FAILED => {
                                reader_terminal.store(true, Ordering::SeqCst);
                                let _ = frame_tx
                                    .send(Err(TtsError::provider(
                                        super::NAME,
                                        event.error_detail(),
                                        false,
                                    )))
                                    .await;
                                return;
                            }
                            other => log::debug!("ignoring gateway event '{other}'"),
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            // Socket ended before task-finished: surface the truncation
            // instead of ending the stream quietly.
            if !reader_terminal.swap(true, Ordering::SeqCst) {
                let _ = frame_tx
                    .send(Err(TtsError::provider(
                        super::NAME,
                        "connection closed before synthesis finished",
                        true,
                    )))
                    .await;
            }
        });

        let sink = TextSink::new(text_tx, super::NAME);
        let stream: FrameStream = Box::pin(ReceiverStream::new(frame_rx));
        Ok((sink, stream))
    }
}
