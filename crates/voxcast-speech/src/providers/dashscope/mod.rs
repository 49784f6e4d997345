//! One-shot DashScope TTS provider.
//!
//! Sends the full text in a single HTTP request, buffers the complete
//! audio payload, and slices it into transport frames. First-frame latency
//! is proportional to whole-utterance synthesis time; memory cost is
//! proportional to audio length.

mod config;
mod provider;

pub use config::DashScopeConfig;
pub use provider::DashScopeProvider;

/// Stable provider name.
pub const NAME: &str = "dashscope";
