//! Sequencing and rendering engine for the groovebox drum sequencer.
//!
//! Turns the song's tick timeline into queued live notes and renders
//! them through the sampler, the synth and the effect rack.

mod humanize;
mod locator;
mod metronome;
mod note_queue;
mod pitch;
mod sampler;
pub mod scheduler;
mod synth;
#[cfg(test)]
mod test_log;
mod transport;
mod voice;

pub mod fx;

pub use fx::{create_fx, FxInfo, FxProcessor, FxRack, FxSlot, LowPass, MAX_FX};
pub use humanize::{
    gaussian, pitch_offset, swing_offset, time_offset, velocity as humanize_velocity,
    HUMANIZE_TIME_SPREAD, HUMANIZE_VELOCITY_SPREAD, MAX_HUMANIZE_DELAY, MAX_PITCH_DEVIATION,
    SWING_BEAT, SWING_GRID, SWING_TICKS,
};
pub use locator::{tick_for_position, Located, PatternLocator};
pub use metronome::{Metronome, METRONOME_SUBDIVISION};
pub use note_queue::NoteQueues;
pub use pitch::{note_to_frequency, playback_increment, semitone_ratio};
pub use sampler::{Sampler, MAX_VOICES};
pub use scheduler::{
    BlockClock, NextPatternMode, NoteScheduler, ScheduleResult, SchedulerEvent, PATTERN_LIST_CAPACITY,
};
pub use synth::{Synth, MAX_SYNTH_VOICES};
pub use transport::{tick_size, Transport, TransportStatus};
pub use voice::{AdsrState, EnvelopeStage, Voice};
