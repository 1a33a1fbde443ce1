//! Per-frame audio processing: energy gating and voice activity detection.
//!
//! Audio flows one direction per frame: raw PCM16 from the client socket is
//! decoded to normalized samples, passed through the [`gate::EnergyGate`] to
//! suppress sub-noise-floor frames, and then through the
//! [`vad::EnergyVad`] which emits discrete speech events for the turn engine.

pub mod gate;
pub mod vad;

pub use gate::EnergyGate;
pub use vad::{EnergyVad, VadConfig, VadEvent};

/// Decode a little-endian PCM16 byte buffer into normalized f32 samples in [-1, 1].
///
/// A trailing odd byte is ignored.
pub fn decode_pcm16(frame: &[u8]) -> Vec<f32> {
    frame
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect()
}

/// Mean squared amplitude of a frame. Returns 0.0 for an empty frame.
pub fn frame_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_pcm16_roundtrip() {
        let bytes = [0x00, 0x40, 0x00, 0xC0]; // 16384, -16384
        let samples = decode_pcm16(&bytes);
        assert_eq!(samples.len(), 2);
        assert!((samples[0] - 0.5).abs() < 1e-4);
        assert!((samples[1] + 0.5).abs() < 1e-4);
    }

    #[test]
    fn test_decode_pcm16_ignores_trailing_byte() {
        let bytes = [0x00, 0x40, 0xFF];
        assert_eq!(decode_pcm16(&bytes).len(), 1);
    }

    #[test]
    fn test_frame_energy_empty() {
        assert_eq!(frame_energy(&[]), 0.0);
    }

    #[test]
    fn test_frame_energy_mean_square() {
        let energy = frame_energy(&[0.5, -0.5, 0.5, -0.5]);
        assert!((energy - 0.25).abs() < 1e-6);
    }
}
