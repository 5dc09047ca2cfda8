//! The engine owner and its shareable handle.

use std::sync::Arc;

use crossbeam_channel::Receiver;
use gb_audio::{AudioOutput, MidiInput, MidiMessage, MidiSender};
use gb_engine::NoteScheduler;
use gb_ir::{PatternList, Song};
use parking_lot::{Mutex, MutexGuard};
use tracing::warn;

use crate::config::Preferences;
use crate::engine_core::EngineCore;
use crate::error::{EngineError, Result};
use crate::events::{EngineEvent, EventQueue};
use crate::export::ExportSession;
use crate::realtime::NoteOutcome;
use crate::state::EngineState;

/// Cloneable access to the engine from any thread.
///
/// Every method takes the engine lock for its duration.
#[derive(Clone)]
pub struct EngineHandle {
    pub(crate) core: Arc<Mutex<EngineCore>>,
    pub(crate) events: EventQueue,
}

impl EngineHandle {
    /// Take the engine lock. Keep the guard short-lived: the audio callback
    /// outputs silence while it is held.
    pub fn lock(&self) -> MutexGuard<'_, EngineCore> {
        self.core.lock()
    }

    pub fn events(&self) -> &EventQueue {
        &self.events
    }

    pub fn subscribe(&self) -> Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> EngineState {
        self.lock().state()
    }

    // --- Song ---

    /// Attach `song`. On error the song is handed back.
    pub fn set_song(&self, song: Song) -> std::result::Result<(), (EngineError, Song)> {
        self.lock().set_song(song)
    }

    pub fn remove_song(&self) -> Result<Song> {
        self.lock().remove_song()
    }

    pub fn with_song<R>(&self, f: impl FnOnce(&Song) -> R) -> Option<R> {
        self.lock().song().map(f)
    }

    /// Mutate the attached song. Its tempo is pushed to the driver afterwards.
    pub fn with_song_mut<R>(&self, f: impl FnOnce(&mut Song) -> R) -> Option<R> {
        let mut guard = self.lock();
        let core = &mut *guard;
        let song = core.song.as_mut()?;
        let result = f(song);
        if let Some(driver) = &core.driver {
            driver.set_bpm(song.bpm);
        }
        Some(result)
    }

    // --- Transport ---

    pub fn seek(&self, frame: u64) {
        self.lock().seek(frame);
    }

    pub fn set_pattern_pos(&self, column: usize) -> Result<()> {
        self.lock().set_pattern_pos(column)
    }

    pub fn set_bpm(&self, bpm: f32) -> Result<()> {
        self.lock().set_bpm(bpm)
    }

    pub fn set_tap_tempo(&self, interval_ms: f32) -> Result<f32> {
        self.lock().set_tap_tempo(interval_ms)
    }

    pub fn sequencer_play(&self) {
        self.lock().sequencer_play();
    }

    pub fn sequencer_stop(&self) {
        self.lock().sequencer_stop();
    }

    // --- Patterns ---

    pub fn set_next_pattern(&self, index: usize, append: bool, delete: bool) -> bool {
        self.lock().set_next_pattern(index, append, delete)
    }

    pub fn set_current_pattern_list(&self, list: &PatternList) {
        self.lock().set_current_pattern_list(list);
    }

    pub fn select_pattern(&self, index: usize) {
        self.lock().select_pattern(index);
    }

    pub fn select_instrument(&self, index: usize) {
        self.lock().select_instrument(index);
    }

    pub fn current_pattern_list(&self) -> PatternList {
        self.lock().current_pattern_list().clone()
    }

    pub fn next_patterns(&self) -> PatternList {
        self.lock().next_patterns().clone()
    }

    // --- Realtime input ---

    pub fn add_realtime_note(
        &self,
        instrument: usize,
        velocity: f32,
        pan_l: f32,
        pan_r: f32,
        pitch: f32,
        force_play: bool,
    ) -> Result<NoteOutcome> {
        self.lock()
            .add_realtime_note(instrument, velocity, pan_l, pan_r, pitch, force_play)
    }

    pub fn note_off(&self, instrument: usize) {
        self.lock().note_off(instrument);
    }

    pub fn handle_midi(&self, message: MidiMessage) {
        self.lock().handle_midi(message);
    }

    // --- Meters and position ---

    pub fn master_peaks(&self, reset: bool) -> (f32, f32) {
        self.lock().master_peaks(reset)
    }

    pub fn fx_peaks(&self, index: usize, reset: bool) -> Option<(f32, f32)> {
        self.lock().fx_peaks(index, reset)
    }

    pub fn process_time(&self) -> f32 {
        self.lock().process_time()
    }

    pub fn max_process_time(&self) -> f32 {
        self.lock().max_process_time()
    }

    pub fn tick_position(&self) -> u32 {
        self.lock().tick_position()
    }

    pub fn realtime_tick_position(&self) -> u64 {
        self.lock().realtime_tick_position()
    }

    pub fn pattern_position(&self) -> Option<usize> {
        self.lock().pattern_position()
    }

    pub fn total_frames(&self) -> u64 {
        self.lock().total_frames()
    }

    pub fn realtime_frames(&self) -> u64 {
        self.lock().realtime_frames()
    }
}

/// Owns the engine, its audio driver and MIDI input.
///
/// Drivers live here, on the control thread; only the callback and the
/// [`EngineHandle`] reach into the shared core.
pub struct Engine {
    pub(crate) handle: EngineHandle,
    pub(crate) driver: Option<Box<dyn AudioOutput>>,
    pub(crate) midi: Option<Box<dyn MidiInput>>,
    pub(crate) midi_sender: Option<MidiSender>,
    pub(crate) export: Option<ExportSession>,
}

impl Engine {
    pub fn new(prefs: Preferences) -> Self {
        Self::with_scheduler(prefs, NoteScheduler::new())
    }

    /// Engine with a caller-supplied scheduler, e.g. a seeded one.
    pub fn with_scheduler(prefs: Preferences, scheduler: NoteScheduler) -> Self {
        let events = EventQueue::new(prefs.event_queue_capacity);
        let core = EngineCore::with_scheduler(prefs, events.clone(), scheduler);
        Self {
            handle: EngineHandle {
                core: Arc::new(Mutex::new(core)),
                events,
            },
            driver: None,
            midi: None,
            midi_sender: None,
            export: None,
        }
    }

    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    pub fn init(&self) -> Result<()> {
        self.handle.lock().init()
    }

    /// Stop the drivers if they run, then release the engine.
    pub fn destroy(&mut self) -> Result<()> {
        if self.driver.is_some() {
            self.stop_audio_drivers()?;
        }
        self.handle.lock().destroy()
    }

    /// Name of the connected audio driver.
    pub fn driver_name(&self) -> Option<&'static str> {
        self.driver.as_ref().map(|d| d.name())
    }

    /// Feed for the virtual MIDI input, when the `Channel` MIDI driver is in use.
    pub fn midi_sender(&self) -> Option<MidiSender> {
        self.midi_sender.clone()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Some(mut session) = self.export.take() {
            session.driver.disconnect();
        }
        if self.driver.is_some() {
            if let Err(e) = self.stop_audio_drivers() {
                warn!(error = %e, "failed to stop audio drivers");
            }
        }
    }
}
