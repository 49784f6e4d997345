//! Configuration for the one-shot DashScope provider.

use crate::error::{TtsError, TtsResult};
use crate::registry::ProviderSettings;
use crate::types::{AudioFormat, SPEECH_RATE_MAX, SPEECH_RATE_MIN};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DashScopeConfig {
    pub api_key: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Default voice used when a request does not name one.
    #[serde(default = "default_voice")]
    pub voice: String,

    /// Vendor-style format preset, e.g. `PCM_22050HZ_MONO_16BIT`.
    #[serde(default = "default_audio_format", alias = "format")]
    pub audio_format: String,

    #[serde(default = "default_speech_rate")]
    pub speech_rate: f32,

    /// Where delivered utterances are persisted, when enabled.
    #[serde(default)]
    pub output_dir: Option<String>,

    /// Remove the persisted file once the utterance has been delivered.
    #[serde(default)]
    pub delete_audio_file: bool,

    /// Endpoint override for self-hosted gateways and tests.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Whole-request ceiling for the vendor call, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_model() -> String {
    "cosyvoice-v2".to_string()
}

fn default_voice() -> String {
    "longxiaochun".to_string()
}

fn default_audio_format() -> String {
    "PCM_22050HZ_MONO_16BIT".to_string()
}

fn default_speech_rate() -> f32 {
    1.0
}

fn default_endpoint() -> String {
    "https://dashscope.aliyuncs.com/api/v1/services/audio/tts".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl DashScopeConfig {
    /// Build from a validated settings block.
    pub fn from_settings(settings: &ProviderSettings) -> TtsResult<Self> {
        let config: Self =
            serde_json::from_value(serde_json::Value::Object(settings.options.clone()))
                .map_err(|e| TtsError::Config(format!("{}: {e}", super::NAME)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> TtsResult<()> {
        if self.api_key.trim().is_empty() {
            return Err(TtsError::MissingField(format!("{}.api_key", super::NAME)));
        }
        if !(SPEECH_RATE_MIN..=SPEECH_RATE_MAX).contains(&self.speech_rate) {
            return Err(TtsError::Config(format!(
                "speech_rate {} outside [{SPEECH_RATE_MIN}, {SPEECH_RATE_MAX}]",
                self.speech_rate
            )));
        }
        self.output_format().map(|_| ())
    }

    pub fn output_format(&self) -> TtsResult<AudioFormat> {
        AudioFormat::from_preset(&self.audio_format)
    }
}
