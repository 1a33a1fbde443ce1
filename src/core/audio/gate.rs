//! Noise floor estimation and energy gating.

use super::frame_energy;

/// Exponential smoothing factor for the noise floor estimate.
const FLOOR_SMOOTHING: f32 = 0.95;

/// A frame must exceed this multiple of the floor to pass the gate.
const GATE_RATIO: f32 = 1.2;

/// Initial noise floor before any frames have been observed.
const INITIAL_FLOOR: f32 = 0.001;

/// Per-session energy gate with an exponentially-decayed noise floor.
///
/// The floor adapts to the ambient energy level of the session's microphone:
/// every frame updates the estimate, whether or not the frame passes the
/// gate, so gate decisions never fight their own estimator. Frames whose
/// energy does not exceed `GATE_RATIO` times the current floor are replaced
/// by silence of equal length before they reach the detector.
#[derive(Debug)]
pub struct EnergyGate {
    noise_floor: f32,
}

impl EnergyGate {
    pub fn new() -> Self {
        Self {
            noise_floor: INITIAL_FLOOR,
        }
    }

    /// Gate one frame of normalized samples.
    ///
    /// Returns the frame unchanged if it clears the floor, otherwise a
    /// silence frame of equal length. The floor is always updated from the
    /// input frame's energy.
    pub fn process(&mut self, frame: Vec<f32>) -> Vec<f32> {
        let energy = frame_energy(&frame);

        self.noise_floor = FLOOR_SMOOTHING * self.noise_floor + (1.0 - FLOOR_SMOOTHING) * energy;

        if energy > self.noise_floor * GATE_RATIO {
            frame
        } else {
            vec![0.0; frame.len()]
        }
    }

    /// Current noise floor estimate.
    pub fn noise_floor(&self) -> f32 {
        self.noise_floor
    }
}

impl Default for EnergyGate {
    fn default() -> Self {
        Self::new()
    }
}
