//! # Voxcast Delivery
//!
//! Synthesis session lifecycle and ordered audio frame delivery for the
//! Voxcast speech server.
//!
//! A text-synthesis request enters at [`SpeechService`], which resolves a
//! provider from the shared registry, spins up a [`SynthesisSession`], and
//! hands its frame stream to the [`DeliveryPipeline`]. The pipeline
//! forwards frames to the device [`FrameSink`] in order, honoring
//! backpressure and cancellation, and closes the session with exactly one
//! terminal outcome.
//!
//! Each conversation gets its own `SpeechService`; sessions of different
//! conversations never interleave on a sink, and within one conversation
//! at most one turn is active at a time.
//!
//! ## Example
//!
//! ```rust,ignore
//! let registry = Arc::new(ProviderRegistry::from_settings(&settings, Some("TTS"))?);
//! let service = SpeechService::new(registry, DeliveryConfig::default())
//!     .with_cache(Arc::new(MemoryCache::new()));
//!
//! let report = service.synthesize("你好，今天天气怎么样？", &mut sink).await?;
//! assert_eq!(report.reason, CompletionReason::Completed);
//! ```

pub mod artifact;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod service;
pub mod session;

pub use artifact::ArtifactStore;
pub use config::DeliveryConfig;
pub use error::{DeliveryError, DeliveryResult};
pub use pipeline::{CompletionReason, DeliveryPipeline, DeliveryReport, FrameSink, SinkStatus};
pub use service::{DuplexTurn, SpeechService};
pub use session::{CancelHandle, SessionState, SynthesisSession};
