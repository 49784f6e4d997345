//! Delivery timing and retry configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Ceiling for the first frame of a session, in milliseconds. One-shot
    /// backends buffer the whole utterance before the first frame, so this
    /// is the conversational-latency budget for the slowest vendor call.
    #[serde(default = "default_first_frame_timeout_ms")]
    pub first_frame_timeout_ms: u64,

    /// Ceiling between consecutive frames, in milliseconds.
    #[serde(default = "default_frame_timeout_ms")]
    pub frame_timeout_ms: u64,

    /// How many times a transient provider failure is retried at dispatch.
    /// Anything above 1 would mask degraded vendor health from callers.
    #[serde(default = "default_max_transient_retries")]
    pub max_transient_retries: u32,

    /// Pause before a dispatch retry, in milliseconds.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Pause between sink accept attempts under backpressure.
    #[serde(default = "default_backpressure_wait_ms")]
    pub backpressure_wait_ms: u64,

    /// Total backpressure wait before the sink is considered dead.
    #[serde(default = "default_backpressure_ceiling_ms")]
    pub backpressure_ceiling_ms: u64,
}

fn default_first_frame_timeout_ms() -> u64 {
    10_000
}

fn default_frame_timeout_ms() -> u64 {
    5_000
}

fn default_max_transient_retries() -> u32 {
    1
}

fn default_retry_backoff_ms() -> u64 {
    200
}

fn default_backpressure_wait_ms() -> u64 {
    20
}

fn default_backpressure_ceiling_ms() -> u64 {
    10_000
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            first_frame_timeout_ms: default_first_frame_timeout_ms(),
            frame_timeout_ms: default_frame_timeout_ms(),
            max_transient_retries: default_max_transient_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            backpressure_wait_ms: default_backpressure_wait_ms(),
            backpressure_ceiling_ms: default_backpressure_ceiling_ms(),
        }
    }
}

impl DeliveryConfig {
    pub fn first_frame_timeout(&self) -> Duration {
        Duration::from_millis(self.first_frame_timeout_ms)
    }

    pub fn frame_timeout(&self) -> Duration {
        Duration::from_millis(self.frame_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn backpressure_wait(&self) -> Duration {
        Duration::from_millis(self.backpressure_wait_ms.max(1))
    }

    pub fn backpressure_ceiling(&self) -> Duration {
        Duration::from_millis(self.backpressure_ceiling_ms)
    }
}
