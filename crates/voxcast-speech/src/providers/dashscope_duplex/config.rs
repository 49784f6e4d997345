//! Configuration for the duplex DashScope provider.

use crate::error::{TtsError, TtsResult};
use crate::registry::ProviderSettings;
use crate::types::{AudioFormat, SPEECH_RATE_MAX, SPEECH_RATE_MIN};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DashScopeDuplexConfig {
    pub api_key: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_voice")]
    pub voice: String,

    /// Vendor-style format preset; the duplex gateway default is 16 kHz
    /// PCM to match the device decode path.
    #[serde(default = "default_audio_format", alias = "format")]
    pub audio_format: String,

    #[serde(default = "default_speech_rate")]
    pub speech_rate: f32,

    /// WebSocket endpoint override for self-hosted gateways and tests.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

fn default_model() -> String {
    "cosyvoice-v2".to_string()
}

fn default_voice() -> String {
    "longxiaochun".to_string()
}

fn default_audio_format() -> String {
    "PCM_16000HZ_MONO_16BIT".to_string()
}

fn default_speech_rate() -> f32 {
    1.0
}

fn default_endpoint() -> String {
    "wss://dashscope.aliyuncs.com/api-websocket/v1/inference".to_string()
}

impl DashScopeDuplexConfig {
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
