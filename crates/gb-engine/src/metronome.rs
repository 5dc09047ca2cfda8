//! Built-in metronome click.

use std::sync::Arc;

use gb_ir::{Instrument, InstrumentRef, Note, Sample};

/// Ticks between metronome clicks.
pub const METRONOME_SUBDIVISION: u64 = 48;
/// Pitch offset of the downbeat click, in semitones.
const DOWNBEAT_PITCH: f32 = 3.0;
const DOWNBEAT_VELOCITY: f32 = 1.0;
const BEAT_VELOCITY: f32 = 0.8;

/// The metronome instrument and its on/off switch.
#[derive(Clone, Debug)]
pub struct Metronome {
    pub enabled: bool,
    instrument: Instrument,
}

impl Metronome {
    /// Build the click instrument for `sample_rate`.
    pub fn new(sample_rate: u32) -> Self {
        let instrument = Instrument::with_sample("metronome", Arc::new(Sample::click(sample_rate)));
        Self {
            enabled: false,
            instrument,
        }
    }

    pub fn instrument(&self) -> &Instrument {
        &self.instrument
    }

    pub fn volume(&self) -> f32 {
        self.instrument.volume
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.instrument.volume = volume.clamp(0.0, 1.0);
    }

    /// Does `tick` get a click, given the current pattern start?
    pub fn is_click(tick: u64, pattern_start: u64) -> bool {
        pattern_start == tick || tick.saturating_sub(pattern_start) % METRONOME_SUBDIVISION == 0
    }

    /// Click note at `tick`; the downbeat is higher and louder.
    pub fn click(tick: u64, downbeat: bool) -> Note {
        if downbeat {
            Note::new(InstrumentRef::Metronome, tick, DOWNBEAT_VELOCITY).with_pitch(DOWNBEAT_PITCH)
        } else {
            Note::new(InstrumentRef::Metronome, tick, BEAT_VELOCITY)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clicks_every_beat_from_pattern_start() {
        assert!(Metronome::is_click(100, 100));
        assert!(Metronome::is_click(148, 100));
        assert!(!Metronome::is_click(147, 100));
        assert!(Metronome::is_click(0, 0));
        assert!(Metronome::is_click(96, 0));
    }

    #[test]
    fn downbeat_click_is_accented() {
        let strong = Metronome::click(0, true);
        let weak = Metronome::click(48, false);
        assert_eq!(strong.pitch, 3.0);
        assert_eq!(strong.velocity, 1.0);
        assert_eq!(weak.pitch, 0.0);
        assert_eq!(weak.velocity, 0.8);
        assert_eq!(weak.instrument, InstrumentRef::Metronome);
        assert_eq!((weak.pan_l, weak.pan_r), (0.5, 0.5));
    }

    #[test]
    fn volume_is_clamped() {
        let mut m = Metronome::new(48000);
        m.set_volume(2.0);
        assert_eq!(m.volume(), 1.0);
        assert_eq!(m.instrument().layers().len(), 1);
    }
}
