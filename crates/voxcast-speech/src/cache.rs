//! Content-addressed cache for synthesized audio.
//!
//! Only the one-shot path is cached: whole-payload reuse would defeat the
//! latency advantage of the duplex path. Keys cover every input that can
//! change the produced audio, so a hit is byte-equivalent to a fresh
//! synthesis.

use crate::text::normalize_whitespace;
use crate::types::AudioFormat;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::RwLock;

/// SHA-256 over (provider, voice, format, speech_rate, normalized text).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey([u8; 32]);

impl CacheKey {
    pub fn new(
        provider_id: &str,
        voice_id: &str,
        format: &AudioFormat,
        speech_rate: f32,
        text: &str,
    ) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(provider_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(voice_id.as_bytes());
        hasher.update([0u8]);
        hasher.update(format.encoding.as_str().as_bytes());
        hasher.update(format.sample_rate.to_le_bytes());
        hasher.update(format.channels.to_le_bytes());
        hasher.update(format.bit_depth.to_le_bytes());
        hasher.update(speech_rate.to_bits().to_le_bytes());
        hasher.update(normalize_whitespace(text).as_bytes());
        Self(hasher.finalize().into())
    }

    pub fn to_hex(&self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

/// A cached synthesis result. The format is stored alongside the bytes so
/// a stale entry can never be served into a session with a different
/// format.
#[derive(Clone, Debug)]
pub struct CachedAudio {
    pub format: AudioFormat,
    pub bytes: Bytes,
}

/// Shared audio result store. Implementations must tolerate concurrent
/// lookups and stores; last-writer-wins on the same key is acceptable.
pub trait ResultCache: Send + Sync {
    fn lookup(&self, key: &CacheKey) -> Option<CachedAudio>;
    fn store(&self, key: CacheKey, audio: CachedAudio);
    fn invalidate(&self, key: &CacheKey);
}

/// In-process cache backed by a hash map. Eviction is left to the
/// deployment (the store is bounded by restart in practice); disk-backed
/// implementations plug in through [`ResultCache`].
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<CacheKey, CachedAudio>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("cache lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResultCache for MemoryCache {
    fn lookup(&self, key: &CacheKey) -> Option<CachedAudio> {
        self.entries
            .read()
            .expect("cache lock poisoned")
            .get(key)
            .cloned()
    }

    fn store(&self, key: CacheKey, audio: CachedAudio) {
        self.entries
            .write()
            .expect("cache lock poisoned")
            .insert(key, audio);
    }

    fn invalidate(&self, key: &CacheKey) {
        self.entries.write().expect("cache lock poisoned").remove(key);
    }
}
