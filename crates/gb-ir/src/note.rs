//! Note events.
//!
//! The same type serves two roles: *template* notes stored in a [`Pattern`]
//! (never touched during playback) and *live* notes, owned copies the
//! scheduler creates when a template comes due.
//!
//! [`Pattern`]: crate::Pattern

/// Which instrument a note plays.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InstrumentRef {
    /// Index into the song's instrument list.
    Song(usize),
    /// The engine's built-in metronome click.
    Metronome,
}

/// A single note occurrence.
#[derive(Clone, Debug, PartialEq)]
pub struct Note {
    pub instrument: InstrumentRef,
    /// 0.0 - 1.0
    pub velocity: f32,
    /// Left pan gain, 0.0 - 1.0
    pub pan_l: f32,
    /// Right pan gain, 0.0 - 1.0
    pub pan_r: f32,
    /// Pitch offset in semitones
    pub pitch: f32,
    /// Absolute tick for live notes, pattern-relative tick for templates
    pub position: u64,
    /// Start delay in frames (swing + humanize), applied when rendering
    pub humanize_delay: i32,
    /// Length in ticks; `None` lets the sample ring out
    pub length: Option<u32>,
}

impl Note {
    /// Create a centered note with no pitch offset.
    pub fn new(instrument: InstrumentRef, position: u64, velocity: f32) -> Self {
        Self {
            instrument,
            velocity: velocity.clamp(0.0, 1.0),
            pan_l: 0.5,
            pan_r: 0.5,
            pitch: 0.0,
            position,
            humanize_delay: 0,
            length: None,
        }
    }

    /// Builder: set the stereo pan gains.
    pub fn with_pan(mut self, pan_l: f32, pan_r: f32) -> Self {
        self.pan_l = pan_l.clamp(0.0, 1.0);
        self.pan_r = pan_r.clamp(0.0, 1.0);
        self
    }

    /// Builder: set the pitch offset in semitones.
    pub fn with_pitch(mut self, pitch: f32) -> Self {
        self.pitch = pitch;
        self
    }

    /// Builder: set the note length in ticks.
    pub fn with_length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    /// Song instrument index, if this is not a metronome note.
    pub fn instrument_index(&self) -> Option<usize> {
        match self.instrument {
            InstrumentRef::Song(i) => Some(i),
            InstrumentRef::Metronome => None,
        }
    }

    /// Frame at which the note's tick begins, before any start delay.
    pub fn start_frame(&self, tick_size: f32) -> u64 {
        (self.position as f64 * tick_size as f64) as u64
    }

    /// Instantiate a playable copy of a template at an absolute tick.
    pub fn live_copy(&self, tick: u64) -> Self {
        Self {
            position: tick,
            humanize_delay: 0,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_clamps_velocity() {
        let n = Note::new(InstrumentRef::Song(0), 0, 1.7);
        assert_eq!(n.velocity, 1.0);
        let n = Note::new(InstrumentRef::Song(0), 0, -0.2);
        assert_eq!(n.velocity, 0.0);
    }

    #[test]
    fn live_copy_moves_position_and_resets_delay() {
        let mut template = Note::new(InstrumentRef::Song(3), 4, 0.8).with_pitch(2.0);
        template.humanize_delay = 120;
        let live = template.live_copy(100);
        assert_eq!(live.position, 100);
        assert_eq!(live.humanize_delay, 0);
        assert_eq!(live.pitch, 2.0);
        assert_eq!(live.instrument_index(), Some(3));
        assert_eq!(template.position, 4);
    }

    #[test]
    fn start_frame_truncates_fractional_ticks() {
        let n = Note::new(InstrumentRef::Song(0), 3, 1.0);
        assert_eq!(n.start_frame(500.0), 1500);
        assert_eq!(n.start_frame(459.375), 1378);
    }

    #[test]
    fn metronome_has_no_song_index() {
        let n = Note::new(InstrumentRef::Metronome, 0, 1.0);
        assert_eq!(n.instrument_index(), None);
    }
}
