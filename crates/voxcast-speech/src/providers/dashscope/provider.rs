use super::DashScopeConfig;
use crate::chunker::FrameChunker;
use crate::error::{TtsError, TtsResult};
use crate::provider::{FrameStream, SynthesisProvider};
use crate::types::{AudioFormat, SynthesisRequest};
use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use std::time::Duration;

/// One-shot DashScope provider
pub struct DashScopeProvider {
    config: DashScopeConfig,
    format: AudioFormat,
    client: reqwest::Client,
    chunker: FrameChunker,
}

/// Error body returned by the vendor on non-audio responses.
#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

impl DashScopeProvider {
    pub fn new(config: DashScopeConfig) -> TtsResult<Self> {
        config.validate()?;
        let format = config.output_format()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TtsError::provider(super::NAME, format!("http client: {e}"), false))?;
        Ok(Self {
            config,
            format,
            client,
            chunker: FrameChunker::default(),
        })
    }

    pub fn config(&self) -> &DashScopeConfig {
        &self.config
    }

    fn effective_voice<'a>(&'a self, request: &'a SynthesisRequest) -> &'a str {
        if request.voice_id.is_empty() {
            &self.config.voice
        } else {
            &request.voice_id
        }
    }

    /// One blocking vendor call carrying the full text; returns the
    /// complete audio payload.
    async fn fetch_audio(&self, request: &SynthesisRequest) -> TtsResult<Bytes> {
        let body = serde_json::json!({
            "model": self.config.model,
            "input": { "text": request.text },
            "parameters": {
                "voice": self.effective_voice(request),
                "format": self.format.encoding.as_str(),
                "sample_rate": self.format.sample_rate,
                "rate": request.speech_rate,
            }
        });

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                // transport failures (connect, timeout, reset) are worth a retry
                let transient = !e.is_builder();
                TtsError::provider(super::NAME, format!("request failed: {e}"), transient)
            })?;

        let status = response.status();
        if !status.is_success() {
            let transient = status.is_server_error() || status.as_u16() == 429;
            let detail = match response.json::<ErrorBody>().await {
                Ok(err) if !err.message.is_empty() => format!("{} ({})", err.message, err.code),
                _ => String::new(),
            };
            return Err(TtsError::provider(
                super::NAME,
                format!("HTTP {status}: {detail}"),
                transient,
            ));
        }

        // A success status with a JSON body still signals a vendor-side
        // failure; audio always arrives as a binary payload.
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        if content_type.starts_with("application/json") {
            let detail = match response.json::<ErrorBody>().await {
                Ok(err) => format!("{} ({})", err.message, err.code),
                Err(e) => format!("unreadable error body: {e}"),
            };
            return Err(TtsError::provider(super::NAME, detail, false));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| TtsError::provider(super::NAME, format!("body read failed: {e}"), true))?;
        if bytes.is_empty() {
            return Err(TtsError::provider(super::NAME, "empty audio payload", false));
        }
        Ok(bytes)
    }
}

#[async_trait]
impl SynthesisProvider for DashScopeProvider {
    fn name(&self) -> &str {
        super::NAME
    }

    fn output_format(&self) -> AudioFormat {
        self.format.clone()
    }

    async fn synthesize(&self, request: SynthesisRequest) -> TtsResult<FrameStream> {
        request.validate()?;
        let payload = self.fetch_audio(&request).await?;
        log::debug!(
            "dashscope synthesized {} bytes for {} chars",
            payload.len(),
            request.text.chars().count()
        );
        let frames = self.chunker.slice(payload);
        Ok(Box::pin(futures::stream::iter(frames.into_iter().map(Ok))))
    }
}
