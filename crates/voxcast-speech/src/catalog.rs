//! Static provider descriptor catalog.
//!
//! Descriptors declare the configuration surface of each provider type so
//! user-supplied settings can be validated before a provider is
//! instantiated, and so administrative frontends can render the fields
//! without knowing the providers themselves.

use crate::error::{TtsError, TtsResult};
use serde_json::{Map, Value};

/// Type key of the one-shot DashScope provider.
pub const DASHSCOPE: &str = "dashscope";
/// Type key of the duplex-streaming DashScope provider.
pub const DASHSCOPE_DOUBLE_STREAM: &str = "dashscope_double_stream";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    /// Credential material; required secrets are never silently defaulted.
    Secret,
    Float,
    Path,
}

#[derive(Clone, Copy, Debug)]
pub struct FieldSpec {
    pub name: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub default: Option<&'static str>,
}

#[derive(Clone, Copy, Debug)]
pub struct ProviderDescriptor {
    pub type_key: &'static str,
    pub label: &'static str,
    /// Sort weight for catalog listings; lower sorts first.
    pub priority: u32,
    pub fields: &'static [FieldSpec],
}

impl ProviderDescriptor {
    /// Check that every declared field is present and well-typed.
    pub fn validate(&self, options: &Map<String, Value>) -> TtsResult<()> {
        for field in self.fields {
            match options.get(field.name) {
                None => {
                    if field.required && field.default.is_none() {
                        return Err(TtsError::MissingField(format!(
                            "{}.{}",
                            self.type_key, field.name
                        )));
                    }
                }
                Some(value) => self.check_field(field, value)?,
            }
        }
        Ok(())
    }

    fn check_field(&self, field: &FieldSpec, value: &Value) -> TtsResult<()> {
        let ok = match field.kind {
            FieldKind::Text | FieldKind::Path => value.is_string(),
            FieldKind::Secret => value.as_str().is_some_and(|s| !s.trim().is_empty()),
            FieldKind::Float => value.is_number(),
        };
        if ok {
            Ok(())
        } else {
            Err(TtsError::Config(format!(
                "field '{}.{}' has invalid value {value}",
                self.type_key, field.name
            )))
        }
    }
}

static DASHSCOPE_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "api_key",
        label: "API key",
        kind: FieldKind::Secret,
        required: true,
        default: None,
    },
    FieldSpec {
        name: "model",
        label: "Model",
        kind: FieldKind::Text,
        required: false,
        default: Some("cosyvoice-v2"),
    },
    FieldSpec {
        name: "voice",
        label: "Voice",
        kind: FieldKind::Text,
        required: false,
        default: Some("longxiaochun"),
    },
    FieldSpec {
        name: "audio_format",
        label: "Audio format",
        kind: FieldKind::Text,
        required: false,
        default: Some("PCM_22050HZ_MONO_16BIT"),
    },
    FieldSpec {
        name: "speech_rate",
        label: "Speech rate",
        kind: FieldKind::Float,
        required: false,
        default: Some("1.0"),
    },
    FieldSpec {
        name: "output_dir",
        label: "Output directory",
        kind: FieldKind::Path,
        required: false,
        default: None,
    },
];

static DASHSCOPE_DOUBLE_STREAM_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "api_key",
        label: "API key",
        kind: FieldKind::Secret,
        required: true,
        default: None,
    },
    FieldSpec {
        name: "model",
        label: "Model",
        kind: FieldKind::Text,
        required: false,
        default: Some("cosyvoice-v2"),
    },
    FieldSpec {
        name: "voice",
        label: "Voice",
        kind: FieldKind::Text,
        required: false,
        default: Some("longxiaochun"),
    },
    FieldSpec {
        name: "audio_format",
        label: "Audio format",
        kind: FieldKind::Text,
        required: false,
        default: Some("PCM_16000HZ_MONO_16BIT"),
    },
    FieldSpec {
        name: "speech_rate",
        label: "Speech rate",
        kind: FieldKind::Float,
        required: false,
        default: Some("1.0"),
    },
];

static CATALOG: &[ProviderDescriptor] = &[
    ProviderDescriptor {
        type_key: DASHSCOPE,
        label: "DashScope",
        priority: 10,
        fields: DASHSCOPE_FIELDS,
    },
    ProviderDescriptor {
        type_key: DASHSCOPE_DOUBLE_STREAM,
        label: "DashScope (double stream)",
        priority: 20,
        fields: DASHSCOPE_DOUBLE_STREAM_FIELDS,
    },
];

/// All known descriptors, sorted by priority.
pub fn catalog() -> Vec<&'static ProviderDescriptor> {
    let mut entries: Vec<&'static ProviderDescriptor> = CATALOG.iter().collect();
    entries.sort_by_key(|d| d.priority);
    entries
}

/// Look up a descriptor by its type key.
pub fn descriptor(type_key: &str) -> Option<&'static ProviderDescriptor> {
    CATALOG.iter().find(|d| d.type_key == type_key)
}
