//! Slicing of complete audio payloads into transport-sized frames.
//!
//! One-shot backends return the whole utterance in a single buffer; the
//! chunker turns that buffer into the same sequenced frame stream the
//! duplex backends produce natively. The first slice is smaller so the
//! device starts playback sooner.

use crate::types::AudioFrame;
use bytes::Bytes;

/// Size of the first slice emitted for an utterance.
pub const FIRST_CHUNK_BYTES: usize = 4 * 1024;
/// Size of every subsequent slice.
pub const CHUNK_BYTES: usize = 8 * 1024;

#[derive(Clone, Copy, Debug)]
pub struct FrameChunker {
    first_chunk_bytes: usize,
    chunk_bytes: usize,
}

impl Default for FrameChunker {
    fn default() -> Self {
        Self::new(FIRST_CHUNK_BYTES, CHUNK_BYTES)
    }
}

impl FrameChunker {
    pub fn new(first_chunk_bytes: usize, chunk_bytes: usize) -> Self {
        Self {
            first_chunk_bytes: first_chunk_bytes.max(1),
            chunk_bytes: chunk_bytes.max(1),
        }
    }

    /// Slice a complete payload into sequenced frames; the last frame is
    /// marked final. An empty payload yields a single empty final frame so
    /// every request still terminates with exactly one final marker.
    pub fn slice(&self, payload: Bytes) -> Vec<AudioFrame> {
        if payload.is_empty() {
            return vec![AudioFrame::new(0, Bytes::new(), true)];
        }

        let mut frames = Vec::new();
        let mut offset = 0usize;
        let mut sequence = 0u64;
        while offset < payload.len() {
            let size = if sequence == 0 {
                self.first_chunk_bytes
            } else {
                self.chunk_bytes
            };
            let end = (offset + size).min(payload.len());
            let is_final = end == payload.len();
            frames.push(AudioFrame::new(sequence, payload.slice(offset..end), is_final));
            offset = end;
            sequence += 1;
        }
        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn total_len(frames: &[AudioFrame]) -> usize {
        frames.iter().map(|f| f.len()).sum()
    }

    #[test]
    fn test_small_payload_single_final_frame() {
        let frames = FrameChunker::default().slice(Bytes::from(vec![0u8; 1200]));
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].sequence, 0);
        assert!(frames[0].is_final);
        assert_eq!(total_len(&frames), 1200);
    }

    #[test]
    fn test_large_payload_slicing() {
        let frames = FrameChunker::default().slice(Bytes::from(vec![0u8; 20_000]));
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].len(), FIRST_CHUNK_BYTES);
        assert_eq!(frames[1].len(), CHUNK_BYTES);
        assert_eq!(frames[2].len(), 20_000 - FIRST_CHUNK_BYTES - CHUNK_BYTES);
        assert_eq!(total_len(&frames), 20_000);

        let sequences: Vec<u64> = frames.iter().map(|f| f.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2]);
        assert_eq!(frames.iter().filter(|f| f.is_final).count(), 1);
        assert!(frames.last().unwrap().is_final);
    }

    #[test]
    fn test_payload_bytes_preserved() {
        let payload: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let frames = FrameChunker::default().slice(Bytes::from(payload.clone()));
        let mut reassembled = Vec::new();
        for frame in &frames {
            reassembled.extend_from_slice(&frame.payload);
        }
        assert_eq!(reassembled, payload);
    }

    #[test]
    fn test_empty_payload_still_terminates() {
        let frames = FrameChunker::default().slice(Bytes::new());
        assert_eq!(frames.len(), 1);
        assert!(frames[0].is_final);
        assert!(frames[0].is_empty());
    }

    #[test]
    fn test_exact_boundary() {
        let chunker = FrameChunker::new(4, 4);
        let frames = chunker.slice(Bytes::from(vec![1u8; 8]));
        assert_eq!(frames.len(), 2);
        assert!(!frames[0].is_final);
        assert!(frames[1].is_final);
    }
}
