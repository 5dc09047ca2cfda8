//! Sampler: turns due notes into voices and renders them.

use gb_ir::{AudioBuffer, Instrument, InstrumentRef, Note};
use tracing::debug;

use crate::pitch::playback_increment;
use crate::voice::Voice;

/// Maximum number of simultaneous voices.
pub const MAX_VOICES: usize = 64;

/// Pool of playing voices.
#[derive(Clone, Debug)]
pub struct Sampler {
    voices: Vec<Voice>,
    sample_rate: u32,
}

impl Sampler {
    /// Create a sampler rendering at `sample_rate`, with every voice slot reserved.
    pub fn new(sample_rate: u32) -> Self {
        Self {
            voices: Vec::with_capacity(MAX_VOICES),
            sample_rate,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Change the output rate. Playing voices keep their old increment.
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate;
    }

    /// Start a voice for `note` on `instrument`.
    ///
    /// `tick_size` converts the note's tick position and length into frames.
    /// The voice stays silent until the note's start frame plus its
    /// humanize delay, counted from `block_start`; a start already in the
    /// past plays at once. Muted instruments and velocities with no
    /// matching layer are ignored. When every slot is taken the oldest
    /// voice is stolen.
    pub fn note_on(&mut self, note: &Note, instrument: &Instrument, tick_size: f32, block_start: u64) {
        if instrument.muted {
            return;
        }
        let Some(layer) = instrument.layer_for_velocity(note.velocity) else {
            debug!(velocity = note.velocity, "no layer for velocity");
            return;
        };

        let gain = note.velocity * instrument.volume * layer.gain;
        // Center pan (0.5) on both sides is unity.
        let gain_l = gain * note.pan_l * instrument.pan_l * 2.0;
        let gain_r = gain * note.pan_r * instrument.pan_r * 2.0;
        let increment = playback_increment(note.pitch, layer.sample.sample_rate, self.sample_rate);
        let delay = onset_delay(note, tick_size, block_start);

        let mut voice = Voice::new(note.instrument, layer.sample.clone(), increment, instrument.adsr)
            .with_gain(gain_l, gain_r)
            .with_delay(delay);
        if let Some(length) = note.length {
            voice = voice.with_length((length as f64 * tick_size as f64) as u64);
        }

        if self.voices.len() == MAX_VOICES {
            self.voices.remove(0);
        }
        self.voices.push(voice);
    }

    /// Release every voice started by `instrument`.
    pub fn note_off(&mut self, instrument: InstrumentRef) {
        for voice in self.voices.iter_mut().filter(|v| v.instrument == instrument) {
            voice.release();
        }
    }

    /// Cut every voice immediately.
    pub fn stop_playing_notes(&mut self) {
        self.voices.clear();
    }

    /// Sum all voices into the first two channels of `output` and drop finished ones.
    pub fn render(&mut self, output: &mut AudioBuffer) {
        let (left, right) = output.stereo_mut();
        for voice in &mut self.voices {
            voice.render(left, right);
        }
        self.voices.retain(Voice::is_playing);
    }

    pub fn active_count(&self) -> usize {
        self.voices.len()
    }
}

/// Frames from `block_start` until `note` should sound.
fn onset_delay(note: &Note, tick_size: f32, block_start: u64) -> u32 {
    let start = note.start_frame(tick_size) as i64 + i64::from(note.humanize_delay);
    (start - block_start as i64).clamp(0, i64::from(u32::MAX)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use gb_ir::{InstrumentLayer, Sample};
    use std::sync::Arc;

    fn instrument(len: usize) -> Instrument {
        let sample = Arc::new(Sample::from_mono("one", 48000, vec![1.0; len]));
        let mut inst = Instrument::with_sample("kick", sample);
        inst.adsr.release = 0;
        inst
    }

    fn note() -> Note {
        Note::new(InstrumentRef::Song(0), 0, 1.0)
    }

    #[test]
    fn center_pan_at_full_velocity_is_unity() {
        let mut s = Sampler::new(48000);
        s.note_on(&note(), &instrument(16), 500.0, 0);
        let mut buf = AudioBuffer::stereo(4);
        s.render(&mut buf);
        assert_eq!(buf.channel(0), &[1.0; 4]);
        assert_eq!(buf.channel(1), &[1.0; 4]);
    }

    #[test]
    fn finished_voices_are_reaped() {
        let mut s = Sampler::new(48000);
        s.note_on(&note(), &instrument(2), 500.0, 0);
        assert_eq!(s.active_count(), 1);
        let mut buf = AudioBuffer::stereo(4);
        s.render(&mut buf);
        assert_eq!(s.active_count(), 0);
    }

    #[test]
    fn muted_instrument_is_silent() {
        let mut s = Sampler::new(48000);
        let mut inst = instrument(16);
        inst.muted = true;
        s.note_on(&note(), &inst, 500.0, 0);
        assert_eq!(s.active_count(), 0);
    }

    #[test]
    fn velocity_outside_layers_is_ignored() {
        let mut s = Sampler::new(48000);
        let mut inst = Instrument::new("soft");
        let sample = Arc::new(Sample::from_mono("s", 48000, vec![1.0; 4]));
        inst.add_layer(InstrumentLayer::new(sample).with_range(0.0, 0.5)).unwrap();
        s.note_on(&note(), &inst, 500.0, 0);
        assert_eq!(s.active_count(), 0);
    }

    #[test]
    fn oldest_voice_is_stolen_when_full() {
        let mut s = Sampler::new(48000);
        let inst = instrument(1000);
        for i in 0..MAX_VOICES + 3 {
            let n = Note::new(InstrumentRef::Song(i), 0, 1.0);
            s.note_on(&n, &inst, 500.0, 0);
        }
        assert_eq!(s.active_count(), MAX_VOICES);
    }

    #[test]
    fn note_off_releases_matching_instrument_only() {
        let mut s = Sampler::new(48000);
        let inst = instrument(1000);
        s.note_on(&note(), &inst, 500.0, 0);
        s.note_on(&Note::new(InstrumentRef::Song(1), 0, 1.0), &inst, 500.0, 0);
        s.note_off(InstrumentRef::Song(0));
        let mut buf = AudioBuffer::stereo(8);
        s.render(&mut buf);
        assert_eq!(s.active_count(), 1);
    }

    fn first_sound(buf: &AudioBuffer) -> Option<usize> {
        buf.channel(0).iter().position(|&x| x != 0.0)
    }

    #[test]
    fn voice_starts_at_the_note_frame_within_the_block() {
        let mut s = Sampler::new(48000);
        // tick 7 at 500 frames per tick is frame 3500, 500 into the block
        s.note_on(&Note::new(InstrumentRef::Song(0), 7, 1.0), &instrument(16), 500.0, 3000);
        let mut buf = AudioBuffer::stereo(1000);
        s.render(&mut buf);
        assert_eq!(first_sound(&buf), Some(500));
    }

    #[test]
    fn humanize_delay_adds_to_the_onset() {
        let mut s = Sampler::new(48000);
        let mut n = Note::new(InstrumentRef::Song(0), 1, 1.0);
        n.humanize_delay = 120;
        s.note_on(&n, &instrument(16), 500.0, 0);
        let mut buf = AudioBuffer::stereo(1000);
        s.render(&mut buf);
        assert_eq!(first_sound(&buf), Some(620));

        // a negative delay can pull the note back to the block start, not before it
        let mut s = Sampler::new(48000);
        n.humanize_delay = -800;
        s.note_on(&n, &instrument(16), 500.0, 0);
        let mut buf = AudioBuffer::stereo(16);
        s.render(&mut buf);
        assert_eq!(first_sound(&buf), Some(0));
    }

    #[test]
    fn late_note_plays_at_block_start() {
        assert_eq!(onset_delay(&Note::new(InstrumentRef::Song(0), 2, 1.0), 500.0, 4000), 0);
        let mut n = Note::new(InstrumentRef::Song(0), 2, 1.0);
        n.humanize_delay = 3500;
        assert_eq!(onset_delay(&n, 500.0, 4000), 500);
    }

    #[test]
    fn onset_carries_into_the_next_block() {
        let mut s = Sampler::new(48000);
        let mut n = Note::new(InstrumentRef::Song(0), 1, 1.0);
        n.humanize_delay = 300;
        s.note_on(&n, &instrument(16), 500.0, 0);
        let mut buf = AudioBuffer::stereo(250);
        for _ in 0..3 {
            buf.silence();
            s.render(&mut buf);
            assert_eq!(first_sound(&buf), None);
        }
        buf.silence();
        s.render(&mut buf);
        assert_eq!(first_sound(&buf), Some(50));
    }

    #[test]
    fn stop_playing_notes_cuts_everything() {
        let mut s = Sampler::new(48000);
        s.note_on(&note(), &instrument(1000), 500.0, 0);
        s.stop_playing_notes();
        assert_eq!(s.active_count(), 0);
    }
}
