//! # Voxcast Speech
//!
//! TTS provider abstractions and vendor backends for the Voxcast speech
//! server.
//!
//! The crate reconciles two fundamentally different vendor contracts
//! behind one frame-stream interface:
//!
//! - **One-shot**: a single blocking call carries the full text and
//!   returns one complete audio payload, which is sliced into transport
//!   frames.
//! - **Duplex**: a bidirectional channel where text increments are pushed
//!   while audio chunks arrive independently, for low first-frame latency.
//!
//! ## Architecture
//!
//! - [`SynthesisProvider`] / [`DuplexSynthesisProvider`]: capability
//!   traits implemented per vendor backend.
//! - [`Provider`]: tagged handle returned by the registry, so the one-shot
//!   path never fakes a duplex contract.
//! - [`ProviderRegistry`]: resolves configured blocks into providers with
//!   descriptor-driven validation and snapshot-isolated reload.
//! - [`ResultCache`]: content-addressed store for one-shot results.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::collections::HashMap;
//! use voxcast_speech::{ProviderRegistry, ProviderSettings, SynthesisRequest};
//!
//! # async fn synthesize() -> voxcast_speech::TtsResult<()> {
//! let mut settings = HashMap::new();
//! settings.insert(
//!     "TTS".to_string(),
//!     serde_json::from_value::<ProviderSettings>(serde_json::json!({
//!         "type": "dashscope",
//!         "api_key": "sk-...",
//!     }))
//!     .unwrap(),
//! );
//! let registry = ProviderRegistry::from_settings(&settings, Some("TTS"))?;
//!
//! let provider = registry.active()?;
//! let request = SynthesisRequest::new("你好", "", provider.output_format());
//! let _frames = provider.synthesize(request).await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod catalog;
pub mod chunker;
pub mod error;
mod provider;
pub mod registry;
pub mod text;
pub mod types;

// Provider implementations
pub mod providers;

// Re-export main types
pub use cache::{CacheKey, CachedAudio, MemoryCache, ResultCache};
pub use catalog::{FieldKind, FieldSpec, ProviderDescriptor};
pub use chunker::FrameChunker;
pub use error::{TtsError, TtsResult};
pub use provider::{
    DuplexSynthesisProvider, FrameStream, InterfaceKind, Provider, SynthesisProvider, TextChunk,
    TextSink,
};
pub use registry::{ProviderRegistry, ProviderSettings};
pub use types::{
    AudioEncoding, AudioFormat, AudioFrame, SynthesisRequest, VoiceProfile, SPEECH_RATE_MAX,
    SPEECH_RATE_MIN,
};
