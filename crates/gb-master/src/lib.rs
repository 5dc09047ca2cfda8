//! Headless engine for the groovebox drum sequencer.
//!
//! Owns the engine lifecycle, the audio process callback, driver setup,
//! realtime note input and offline export. Front ends hold an [`Engine`]
//! and hand [`EngineHandle`] clones to other threads.

mod config;
mod drivers;
mod engine;
mod engine_core;
mod error;
mod events;
mod export;
mod process;
mod realtime;
mod state;

pub use config::{ConfigError, Preferences};
pub use engine_core::{EngineCore, NOTE_QUEUE_CAPACITY};
pub use engine::{Engine, EngineHandle};
pub use error::{EngineError, Result};
pub use events::{EngineEvent, ErrorCode, EventQueue};
pub use realtime::{quantize, NoteOutcome, TapTempo, MIDI_NOTE_OFFSET, TAP_HISTORY, TAP_RESET_THRESHOLD};
pub use state::EngineState;

// Re-export common types so callers don't need the lower crates directly.
pub use gb_audio::{
    AudioOutput, DriverKind, DriverName, FakeClock, FakeDriver, FakeMode, MidiMessage, MidiSender, NullDriver,
    ProcessStatus,
};
pub use gb_engine::NoteScheduler;
pub use gb_ir::{
    Instrument, InstrumentLayer, InstrumentRef, Note, Pattern, PatternKey, PatternList, Sample, Song, SongMode,
    MAX_NOTES,
};
