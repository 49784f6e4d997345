//! Duplex-streaming DashScope TTS provider.
//!
//! Holds a WebSocket to the vendor's inference gateway. Text increments
//! are pushed while audio chunks arrive independently, which cuts
//! first-frame latency to roughly one sentence of synthesis. A writer
//! task and a reader task cooperate over channels and share only a
//! terminal flag.

mod config;
mod protocol;
mod provider;

pub use config::DashScopeDuplexConfig;
pub use provider::DashScopeDuplexProvider;

/// Stable provider name.
pub const NAME: &str = "dashscope_double_stream";
