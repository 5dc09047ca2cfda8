//! Realtime note input, MIDI mapping and tap tempo.

use gb_audio::MidiMessage;
use gb_ir::{InstrumentRef, Note, MAX_NOTES};
use tracing::debug;

use crate::engine_core::EngineCore;
use crate::error::Result;
use crate::events::EngineEvent;
use crate::state::EngineState;

/// MIDI note mapped to the first instrument of the song.
pub const MIDI_NOTE_OFFSET: u8 = 36;
/// Tap intervals kept for the moving average.
pub const TAP_HISTORY: usize = 8;
/// A tap further than this (in BPM) from the average restarts the history.
pub const TAP_RESET_THRESHOLD: f32 = 20.0;

/// What happened to a realtime note.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoteOutcome {
    /// Unknown instrument or no song.
    Ignored,
    /// Not recorded; queued for playback if `heard`.
    Auditioned { heard: bool },
    /// The selected pattern already has this instrument at the column.
    AlreadyPresent { heard: bool },
    /// Written into the selected pattern.
    Recorded { heard: bool },
}

impl NoteOutcome {
    pub fn heard(self) -> bool {
        match self {
            NoteOutcome::Ignored => false,
            NoteOutcome::Auditioned { heard }
            | NoteOutcome::AlreadyPresent { heard }
            | NoteOutcome::Recorded { heard } => heard,
        }
    }
}

/// Snap `column` to the nearest multiple of `scalar`. A result of `MAX_NOTES` wraps to 0.
pub fn quantize(column: u32, scalar: u32) -> u32 {
    let scalar = scalar.max(1);
    let q = (column as f64 / scalar as f64).round() as u32 * scalar;
    if q == MAX_NOTES {
        0
    } else {
        q
    }
}

/// Moving average over the last [`TAP_HISTORY`] taps.
#[derive(Clone, Debug, Default)]
pub struct TapTempo {
    history: [f32; TAP_HISTORY],
    primed: bool,
}

impl TapTempo {
    /// Feed the interval since the previous tap; returns the averaged BPM.
    pub fn tap(&mut self, interval_ms: f32) -> Option<f32> {
        if !(interval_ms.is_finite() && interval_ms > 0.0) {
            return None;
        }
        let bpm = 60_000.0 / interval_ms;
        if !self.primed || (self.history[0] - bpm).abs() > TAP_RESET_THRESHOLD {
            self.history = [bpm; TAP_HISTORY];
            self.primed = true;
        }
        let avg = (bpm + self.history.iter().sum::<f32>()) / (TAP_HISTORY + 1) as f32;
        self.history.copy_within(0..TAP_HISTORY - 1, 1);
        self.history[0] = avg;
        debug!(bpm = avg, "tap tempo");
        Some(avg)
    }
}

impl EngineCore {
    /// Play (and possibly record) a note arriving from a pad or MIDI.
    ///
    /// While playing with a selected pattern the note is recorded at the
    /// current (quantized) pattern tick if record mode is on. Heard notes
    /// go to the midi queue at the realtime tick.
    pub fn add_realtime_note(
        &mut self,
        instrument: usize,
        velocity: f32,
        pan_l: f32,
        pan_r: f32,
        pitch: f32,
        force_play: bool,
    ) -> Result<NoteOutcome> {
        self.require("add_realtime_note", &[EngineState::Ready, EngineState::Playing])?;

        let tick_position = self.scheduler.pattern_tick_position();
        let realtime_tick = self.realtime_tick_position();
        let playing = self.state == EngineState::Playing;
        let hear_new = self.prefs.hear_new_notes;
        let record = self.prefs.record_events;
        let column = if self.prefs.quantize_events {
            quantize(tick_position, self.prefs.quantize_scalar())
        } else {
            tick_position
        };

        let Some(song) = self.song.as_mut() else {
            return Ok(NoteOutcome::Ignored);
        };
        if instrument >= song.instruments.len() {
            debug!(instrument, "realtime note for unused instrument");
            return Ok(NoteOutcome::Ignored);
        }
        let inst = InstrumentRef::Song(instrument);

        let selected = song.pattern_at(self.selected_pattern);
        let outcome = match selected.filter(|_| playing) {
            Some(key) => {
                let Some(pattern) = song.pattern_mut(key) else {
                    return Ok(NoteOutcome::Ignored);
                };
                let column = if column >= pattern.length { 0 } else { column };
                if pattern.has_note(column, inst) {
                    NoteOutcome::AlreadyPresent { heard: force_play }
                } else if !record {
                    NoteOutcome::Auditioned {
                        heard: force_play || hear_new,
                    }
                } else {
                    pattern.insert(column, Note::new(inst, column as u64, velocity).with_pan(pan_l, pan_r));
                    song.is_modified = true;
                    self.events.push(EngineEvent::PatternModified);
                    NoteOutcome::Recorded {
                        heard: force_play || (hear_new && column <= tick_position),
                    }
                }
            }
            None => NoteOutcome::Auditioned {
                heard: force_play || hear_new,
            },
        };

        if outcome.heard() {
            let note = Note::new(inst, realtime_tick, velocity)
                .with_pan(pan_l, pan_r)
                .with_pitch(pitch);
            self.queues.push_midi(note);
        }
        Ok(outcome)
    }

    /// Map an incoming MIDI message onto the drum kit.
    pub fn handle_midi(&mut self, message: MidiMessage) {
        match message {
            MidiMessage::NoteOn { note, velocity, .. } => {
                let Some(instrument) = note.checked_sub(MIDI_NOTE_OFFSET) else {
                    debug!(note, "MIDI note below the drum map");
                    return;
                };
                let velocity = f32::from(velocity) / 127.0;
                if let Err(e) = self.add_realtime_note(instrument as usize, velocity, 0.5, 0.5, 0.0, false) {
                    debug!(error = %e, "MIDI note dropped");
                }
            }
            MidiMessage::NoteOff { note, .. } => {
                if let Some(instrument) = note.checked_sub(MIDI_NOTE_OFFSET) {
                    self.note_off(instrument as usize);
                }
            }
            other => debug!(?other, "ignoring MIDI message"),
        }
    }
}
