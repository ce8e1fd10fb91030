//! Codec collaborator traits (spec §1 "out of scope: concrete audio codec
//! drivers"). [`AudioPipeline`](crate::pipeline::AudioPipeline) drives these
//! through dynamic dispatch so the orchestrator core never depends on a
//! concrete Opus implementation.

use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("encoder error: {0}")]
    Encode(String),
    #[error("decoder error: {0}")]
    Decode(String),
}

/// A 16 kHz mono, fixed 60 ms frame Opus encoder (spec §4.3).
pub trait OpusEncoder: Send {
    fn encode(&mut self, pcm: &[i16]) -> Result<Bytes, CodecError>;
    /// Drops any carried-over inter-frame state (spec §4.3 invariant i).
    fn reset_state(&mut self);
}

/// An Opus decoder whose sample rate and frame duration are renegotiated at
/// runtime (spec §4.3): `set_decode_sample_rate` swaps the concrete decoder
/// atomically, it does not mutate one in place.
pub trait OpusDecoder: Send {
    fn decode(&mut self, payload: &Bytes) -> Result<Vec<i16>, CodecError>;
    fn reset_state(&mut self);
    fn sample_rate_hz(&self) -> u32;
    fn frame_ms(&self) -> u32;
}

/// No-op codec used by the host simulator and tests: echoes frames back
/// without touching a real Opus library.
pub struct NullEncoder {
    resets: u32,
}

impl Default for NullEncoder {
    fn default() -> Self {
        Self { resets: 0 }
    }
}

impl NullEncoder {
    /// Number of times [`OpusEncoder::reset_state`] has been called —
    /// exercised directly by the "Listening re-entry preserves encoder"
    /// law (spec §8).
    pub fn reset_count(&self) -> u32 {
        self.resets
    }
}

impl OpusEncoder for NullEncoder {
    fn encode(&mut self, pcm: &[i16]) -> Result<Bytes, CodecError> {
        let mut bytes = Vec::with_capacity(pcm.len() * 2);
        for sample in pcm {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        Ok(Bytes::from(bytes))
    }

    fn reset_state(&mut self) {
        self.resets += 1;
    }
}

pub struct NullDecoder {
    sample_rate_hz: u32,
    frame_ms: u32,
    resets: u32,
}

impl NullDecoder {
    pub fn new(sample_rate_hz: u32, frame_ms: u32) -> Self {
        Self {
            sample_rate_hz,
            frame_ms,
            resets: 0,
        }
    }

    pub fn reset_count(&self) -> u32 {
        self.resets
    }
}

impl OpusDecoder for NullDecoder {
    fn decode(&mut self, payload: &Bytes) -> Result<Vec<i16>, CodecError> {
        Ok(payload
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]))
            .collect())
    }

    fn reset_state(&mut self) {
        self.resets += 1;
    }

    fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    fn frame_ms(&self) -> u32 {
        self.frame_ms
    }
}
