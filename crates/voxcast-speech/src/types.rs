use crate::error::{TtsError, TtsResult};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lower bound of the accepted speech rate range.
pub const SPEECH_RATE_MIN: f32 = 0.5;
/// Upper bound of the accepted speech rate range.
pub const SPEECH_RATE_MAX: f32 = 2.0;

/// Audio container/codec of a synthesized payload
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AudioEncoding {
    #[default]
    Pcm,
    Wav,
    Mp3,
    Opus,
}

impl AudioEncoding {
    /// Lowercase name as used in provider configuration and vendor parameters.
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioEncoding::Pcm => "pcm",
            AudioEncoding::Wav => "wav",
            AudioEncoding::Mp3 => "mp3",
            AudioEncoding::Opus => "opus",
        }
    }

    /// File extension for persisted artifacts.
    pub fn extension(&self) -> &'static str {
        self.as_str()
    }
}

impl fmt::Display for AudioEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full description of an audio payload's encoding.
///
/// Immutable once a synthesis session starts; a disagreement between the
/// requested and the produced format is an error, never a silent conversion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    pub encoding: AudioEncoding,
    pub sample_rate: u32,
    pub channels: u16,
    pub bit_depth: u16,
}

impl AudioFormat {
    pub fn new(encoding: AudioEncoding, sample_rate: u32, channels: u16, bit_depth: u16) -> Self {
        Self {
            encoding,
            sample_rate,
            channels,
            bit_depth,
        }
    }

    /// PCM 16 kHz mono 16-bit, the default duplex output format.
    pub fn pcm_16k_mono() -> Self {
        Self::new(AudioEncoding::Pcm, 16_000, 1, 16)
    }

    /// PCM 22.05 kHz mono 16-bit, the default one-shot output format.
    pub fn pcm_22k_mono() -> Self {
        Self::new(AudioEncoding::Pcm, 22_050, 1, 16)
    }

    /// MP3 22.05 kHz mono.
    pub fn mp3_22k_mono() -> Self {
        Self::new(AudioEncoding::Mp3, 22_050, 1, 16)
    }

    pub fn extension(&self) -> &'static str {
        self.encoding.extension()
    }

    /// Parse a vendor-style preset such as `PCM_22050HZ_MONO_16BIT` or
    /// `MP3_22050HZ_MONO_256KBPS`. Case-insensitive.
    pub fn from_preset(preset: &str) -> TtsResult<Self> {
        let upper = preset.trim().to_ascii_uppercase();
        let parts: Vec<&str> = upper.split('_').collect();
        if parts.len() != 4 {
            return Err(TtsError::Config(format!(
                "unrecognized audio format preset: '{preset}'"
            )));
        }

        let encoding = match parts[0] {
            "PCM" => AudioEncoding::Pcm,
            "WAV" => AudioEncoding::Wav,
            "MP3" => AudioEncoding::Mp3,
            "OPUS" => AudioEncoding::Opus,
            other => {
                return Err(TtsError::Config(format!(
                    "unsupported audio encoding: '{other}'"
                )));
            }
        };

        let sample_rate = parts[1]
            .strip_suffix("HZ")
            .and_then(|s| s.parse::<u32>().ok())
            .ok_or_else(|| {
                TtsError::Config(format!("invalid sample rate in preset: '{preset}'"))
            })?;

        let channels = match parts[2] {
            "MONO" => 1,
            "STEREO" => 2,
            other => {
                return Err(TtsError::Config(format!(
                    "invalid channel layout in preset: '{other}'"
                )));
            }
        };

        // The last segment is either a bit depth (16BIT) or an MP3 bitrate
        // (256KBPS); bitrate presets keep the default 16-bit depth.
        let bit_depth = if let Some(bits) = parts[3].strip_suffix("BIT") {
            bits.parse::<u16>().map_err(|_| {
                TtsError::Config(format!("invalid bit depth in preset: '{preset}'"))
            })?
        } else if parts[3].ends_with("KBPS") {
            16
        } else {
            return Err(TtsError::Config(format!(
                "unrecognized audio format preset: '{preset}'"
            )));
        };

        Ok(Self::new(encoding, sample_rate, channels, bit_depth))
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}Hz/{}ch/{}bit",
            self.encoding, self.sample_rate, self.channels, self.bit_depth
        )
    }
}

/// A voice offered by a provider. Read-only at synthesis time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceProfile {
    pub provider_id: String,
    pub voice_id: String,
    pub name: String,
    pub languages: Vec<String>,
}

/// One speech synthesis request. Created per call, consumed exactly once.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SynthesisRequest {
    pub text: String,
    pub voice_id: String,
    pub format: AudioFormat,
    pub speech_rate: f32,
}

impl SynthesisRequest {
    pub fn new(text: impl Into<String>, voice_id: impl Into<String>, format: AudioFormat) -> Self {
        Self {
            text: text.into(),
            voice_id: voice_id.into(),
            format,
            speech_rate: 1.0,
        }
    }

    pub fn with_speech_rate(mut self, speech_rate: f32) -> Self {
        self.speech_rate = speech_rate;
        self
    }

    /// Reject malformed requests before any provider call is made.
    pub fn validate(&self) -> TtsResult<()> {
        if self.text.trim().is_empty() {
            return Err(TtsError::Config("synthesis text must not be empty".into()));
        }
        self.validate_parameters()
    }

    /// Validate everything except the text body. Duplex channels are opened
    /// before any text exists; their input arrives incrementally.
    pub fn validate_parameters(&self) -> TtsResult<()> {
        if !(SPEECH_RATE_MIN..=SPEECH_RATE_MAX).contains(&self.speech_rate) {
            return Err(TtsError::Config(format!(
                "speech_rate {} outside [{SPEECH_RATE_MIN}, {SPEECH_RATE_MAX}]",
                self.speech_rate
            )));
        }
        Ok(())
    }
}

/// A sequenced unit of synthesized audio.
///
/// Sequence numbers are monotonic per session starting at 0; exactly one
/// frame of a successful request carries `is_final`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioFrame {
    pub sequence: u64,
    pub payload: Bytes,
    pub is_final: bool,
}

impl AudioFrame {
    pub fn new(sequence: u64, payload: Bytes, is_final: bool) -> Self {
        Self {
            sequence,
            payload,
            is_final,
        }
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}
