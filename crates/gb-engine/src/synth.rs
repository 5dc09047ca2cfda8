//! Minimal sine synthesizer mixed alongside the sampler.

use core::f32::consts::TAU;

use gb_ir::AudioBuffer;

use crate::pitch::note_to_frequency;

/// Maximum simultaneous synth notes.
pub const MAX_SYNTH_VOICES: usize = 16;
/// Frames to fade out a released note.
const RELEASE_FRAMES: u32 = 256;
/// Headroom so a full chord does not clip.
const OUTPUT_GAIN: f32 = 0.2;

#[derive(Clone, Copy, Debug)]
struct SynthVoice {
    note: u8,
    phase: f32,
    phase_inc: f32,
    amplitude: f32,
    release_left: Option<u32>,
}

/// Sine oscillator bank keyed by MIDI note.
#[derive(Clone, Debug)]
pub struct Synth {
    voices: heapless::Vec<SynthVoice, MAX_SYNTH_VOICES>,
    sample_rate: u32,
}

impl Synth {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            voices: heapless::Vec::new(),
            sample_rate,
        }
    }

    /// Start a note. When full the oldest note is dropped.
    pub fn note_on(&mut self, note: u8, velocity: f32) {
        let voice = SynthVoice {
            note,
            phase: 0.0,
            phase_inc: TAU * note_to_frequency(note as f32) / self.sample_rate.max(1) as f32,
            amplitude: velocity.clamp(0.0, 1.0),
            release_left: None,
        };
        if self.voices.is_full() {
            self.voices.remove(0);
        }
        let _ = self.voices.push(voice);
    }

    /// Fade out every voice playing `note`.
    pub fn note_off(&mut self, note: u8) {
        for v in self.voices.iter_mut().filter(|v| v.note == note && v.release_left.is_none()) {
            v.release_left = Some(RELEASE_FRAMES);
        }
    }

    /// Sum all notes into the first two channels of `output`.
    pub fn process(&mut self, output: &mut AudioBuffer) {
        if self.voices.is_empty() {
            return;
        }
        let (left, right) = output.stereo_mut();
        for v in self.voices.iter_mut() {
            for (l, r) in left.iter_mut().zip(right.iter_mut()) {
                let fade = match v.release_left.as_mut() {
                    Some(0) => break,
                    Some(n) => {
                        *n -= 1;
                        *n as f32 / RELEASE_FRAMES as f32
                    }
                    None => 1.0,
                };
                let s = v.phase.sin() * v.amplitude * fade * OUTPUT_GAIN;
                *l += s;
                *r += s;
                v.phase = (v.phase + v.phase_inc) % TAU;
            }
        }
        self.voices.retain(|v| v.release_left != Some(0));
    }

    pub fn active_count(&self) -> usize {
        self.voices.len()
    }
}
