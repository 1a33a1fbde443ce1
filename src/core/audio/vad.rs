//! Energy-threshold voice activity detection with silence hangover.
//!
//! # State Transitions
//!
//! ```text
//! [Silent] ─── energy > threshold ──► SpeechStart, [Speaking]
//!    │
//!    └── energy <= threshold ──► (no event)
//!
//! [Speaking] ─── energy > threshold ──► (no event, counter reset)
//!     │
//!     └── energy <= threshold for more than hangover frames ──► SpeechEnd, [Silent]
//! ```
//!
//! Hysteresis comes purely from the hangover counter: a single loud frame
//! starts speech, but only a sustained run of quiet frames ends it, so the
//! detector does not flap on single-frame energy spikes.

use super::frame_energy;

/// Event emitted by the detector on a state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadEvent {
    /// First frame of speech after silence.
    SpeechStart,
    /// The hangover limit was exceeded while speaking.
    SpeechEnd,
}

/// Configuration for the energy VAD.
#[derive(Debug, Clone, Copy)]
pub struct VadConfig {
    /// Mean-square energy above which a frame counts as speech.
    pub energy_threshold: f32,
    /// Consecutive sub-threshold frames required before declaring speech over.
    ///
    /// At a 200ms frame cadence the default of 8 gives roughly 1.6s of
    /// hangover, which absorbs natural mid-utterance pauses.
    pub hangover_frames: u32,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            energy_threshold: 0.003,
            hangover_frames: 8,
        }
    }
}

/// Two-state voice activity detector over gated frames.
#[derive(Debug)]
pub struct EnergyVad {
    config: VadConfig,
    silence_frames: u32,
    speaking: bool,
}

impl EnergyVad {
    pub fn new(config: VadConfig) -> Self {
        Self {
            config,
            silence_frames: 0,
            speaking: false,
        }
    }

    /// Process one frame of normalized samples and return any transition.
    pub fn process(&mut self, samples: &[f32]) -> Option<VadEvent> {
        let energy = frame_energy(samples);

        if energy > self.config.energy_threshold {
            self.silence_frames = 0;
            if !self.speaking {
                self.speaking = true;
                return Some(VadEvent::SpeechStart);
            }
        } else {
            self.silence_frames += 1;
            if self.speaking && self.silence_frames > self.config.hangover_frames {
                self.speaking = false;
                return Some(VadEvent::SpeechEnd);
            }
        }

        None
    }

    /// Whether the detector currently considers the user to be speaking.
    pub fn is_speaking(&self) -> bool {
        self.speaking
    }

    /// Reset to the silent state.
    pub fn reset(&mut self) {
        self.silence_frames = 0;
        self.speaking = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn speech_frame() -> Vec<f32> {
        vec![0.3; 160]
    }

    fn silence_frame() -> Vec<f32> {
        vec![0.0; 160]
    }

    fn detector() -> EnergyVad {
        EnergyVad::new(VadConfig::default())
    }

    #[test]
    fn test_speech_start_on_first_loud_frame_only() {
        let mut vad = detector();
        assert_eq!(vad.process(&speech_frame()), Some(VadEvent::SpeechStart));
        // Subsequent loud frames do not re-emit.
        assert_eq!(vad.process(&speech_frame()), None);
        assert_eq!(vad.process(&speech_frame()), None);
        assert!(vad.is_speaking());
    }

    #[test]
    fn test_silence_alone_emits_nothing() {
        let mut vad = detector();
        for _ in 0..20 {
            assert_eq!(vad.process(&silence_frame()), None);
        }
        assert!(!vad.is_speaking());
    }

    #[test]
    fn test_speech_end_after_hangover() {
        let mut vad = detector();
        vad.process(&speech_frame());

        // Exactly hangover_frames of silence: still speaking.
        for _ in 0..8 {
            assert_eq!(vad.process(&silence_frame()), None);
        }
        assert!(vad.is_speaking());

        // One more frame crosses the limit.
        assert_eq!(vad.process(&silence_frame()), Some(VadEvent::SpeechEnd));
        assert!(!vad.is_speaking());
    }

    #[test]
    fn test_brief_pause_does_not_end_speech() {
        let mut vad = detector();
        vad.process(&speech_frame());

        for _ in 0..5 {
            assert_eq!(vad.process(&silence_frame()), None);
        }
        // Speech resumes before the hangover limit: counter resets, no events.
        assert_eq!(vad.process(&speech_frame()), None);
        for _ in 0..5 {
            assert_eq!(vad.process(&silence_frame()), None);
        }
        assert!(vad.is_speaking());
    }

    #[test]
    fn test_exactly_one_start_between_ends() {
        let mut vad = detector();
        let mut starts = 0;
        let mut ends = 0;

        // Two full utterances separated by long silence.
        for _ in 0..2 {
            for _ in 0..10 {
                match vad.process(&speech_frame()) {
                    Some(VadEvent::SpeechStart) => starts += 1,
                    Some(VadEvent::SpeechEnd) => ends += 1,
                    None => {}
                }
            }
            for _ in 0..15 {
                match vad.process(&silence_frame()) {
                    Some(VadEvent::SpeechStart) => starts += 1,
                    Some(VadEvent::SpeechEnd) => ends += 1,
                    None => {}
                }
            }
        }

        assert_eq!(starts, 2);
        assert_eq!(ends, 2);
    }

    #[test]
    fn test_utterance_event_sequence() {
        // silence x3, speech x4, silence x9 (hangover 8)
        // => [none x3, speech_start, none x3, none x8, speech_end]
        let mut vad = detector();
        let mut events = Vec::new();

        for _ in 0..3 {
            events.push(vad.process(&silence_frame()));
        }
        for _ in 0..4 {
            events.push(vad.process(&speech_frame()));
        }
        for _ in 0..9 {
            events.push(vad.process(&silence_frame()));
        }

        let mut expected = vec![None; 3];
        expected.push(Some(VadEvent::SpeechStart));
        expected.extend(vec![None; 3]);
        expected.extend(vec![None; 8]);
        expected.push(Some(VadEvent::SpeechEnd));

        assert_eq!(events, expected);
    }
}
