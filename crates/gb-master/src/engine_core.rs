//! Engine state shared between the audio callback and control threads.
//!
//! Everything here lives behind the engine lock. State transitions are
//! methods on `&mut EngineCore`, so they can only run while the lock is
//! held.

use std::time::Instant;

use gb_audio::TransportHandle;
use gb_engine::{
    FxRack, Metronome, NextPatternMode, NoteQueues, NoteScheduler, Sampler, Synth, Transport,
    TransportStatus,
};
use gb_ir::{AudioBuffer, InstrumentRef, PatternList, Song, SongMode};
use tracing::{debug, error, info, warn};

use crate::config::Preferences;
use crate::error::{EngineError, Result};
use crate::events::{EngineEvent, EventQueue};
use crate::realtime::TapTempo;
use crate::state::EngineState;

/// Live notes the queues can hold before pushing reallocates.
pub const NOTE_QUEUE_CAPACITY: usize = 1024;

pub struct EngineCore {
    pub(crate) state: EngineState,
    pub(crate) song: Option<Song>,
    pub(crate) transport: Transport,
    pub(crate) scheduler: NoteScheduler,
    pub(crate) queues: NoteQueues,
    pub(crate) metronome: Option<Metronome>,
    pub(crate) sampler: Sampler,
    pub(crate) synth: Synth,
    pub(crate) fx: FxRack,
    pub(crate) main: AudioBuffer,
    pub(crate) sample_rate: u32,
    /// Frames elapsed whether or not the transport rolls
    pub(crate) realtime_frames: u64,
    pub(crate) master_peak: (f32, f32),
    pub(crate) process_time_ms: f32,
    pub(crate) max_process_time_ms: f32,
    /// Wall-clock start of the last block
    pub(crate) block_started: Option<Instant>,
    /// The song ended on an offline driver; the next callback halts it
    pub(crate) halt_pending: bool,
    pub(crate) selected_pattern: usize,
    pub(crate) selected_instrument: usize,
    pub(crate) prefs: Preferences,
    /// Transport of the connected driver
    pub(crate) driver: Option<TransportHandle>,
    pub(crate) events: EventQueue,
    pub(crate) tap: TapTempo,
}

impl EngineCore {
    pub fn new(prefs: Preferences, events: EventQueue) -> Self {
        Self::with_scheduler(prefs, events, NoteScheduler::new())
    }

    /// Core with a caller-supplied scheduler, e.g. a seeded one for tests.
    pub fn with_scheduler(prefs: Preferences, events: EventQueue, scheduler: NoteScheduler) -> Self {
        let sample_rate = prefs.sample_rate;
        let frames = prefs.buffer_size;
        Self {
            state: EngineState::Uninitialized,
            song: None,
            transport: Transport::new(),
            scheduler,
            queues: NoteQueues::with_capacity(NOTE_QUEUE_CAPACITY),
            metronome: None,
            sampler: Sampler::new(sample_rate),
            synth: Synth::new(sample_rate),
            fx: FxRack::new(sample_rate, frames),
            main: AudioBuffer::stereo(frames),
            sample_rate,
            realtime_frames: 0,
            master_peak: (0.0, 0.0),
            process_time_ms: 0.0,
            max_process_time_ms: 0.0,
            block_started: None,
            halt_pending: false,
            selected_pattern: 0,
            selected_instrument: 0,
            prefs,
            driver: None,
            events,
            tap: TapTempo::default(),
        }
    }

    pub(crate) fn require(&self, op: &'static str, expected: &'static [EngineState]) -> Result<()> {
        if expected.contains(&self.state) {
            return Ok(());
        }
        error!(op, state = %self.state, "operation not allowed in this state");
        Err(EngineError::InvalidState {
            op,
            expected,
            actual: self.state,
        })
    }

    pub(crate) fn set_state(&mut self, state: EngineState) {
        debug!(from = %self.state, to = %state, "engine state");
        self.state = state;
        self.events.push(EngineEvent::State(state));
    }

    pub(crate) fn notify(&self, event: EngineEvent) {
        self.events.push(event);
    }

    // --- Lifecycle ---

    /// `Uninitialized → Initialized`.
    pub fn init(&mut self) -> Result<()> {
        self.require("init", &[EngineState::Uninitialized])?;
        self.scheduler.clear();
        self.queues.flush();
        let mut metronome = Metronome::new(self.sample_rate);
        metronome.enabled = self.prefs.metronome_enabled;
        metronome.set_volume(self.prefs.metronome_volume);
        self.metronome = Some(metronome);
        self.set_state(EngineState::Initialized);
        Ok(())
    }

    /// Adopt a freshly started driver: `Initialized → Prepared | Ready`.
    pub(crate) fn attach_driver(&mut self, transport: TransportHandle, sample_rate: u32, frames: usize) -> Result<()> {
        self.require("start_audio_drivers", &[EngineState::Initialized])?;
        self.halt_pending = false;
        if sample_rate != self.sample_rate {
            info!(sample_rate, "output sample rate changed");
            self.sample_rate = sample_rate;
            self.sampler.set_sample_rate(sample_rate);
            self.synth = Synth::new(sample_rate);
            self.fx.set_sample_rate(sample_rate);
        }
        if frames > 0 {
            self.main.resize(frames);
            self.fx.resize(frames);
        }
        if let Some(song) = &self.song {
            transport.set_bpm(song.bpm);
            self.transport.reset_tick_size(sample_rate, song.bpm, song.resolution);
        }
        self.driver = Some(transport);
        let next = if self.song.is_some() {
            EngineState::Ready
        } else {
            EngineState::Prepared
        };
        self.set_state(next);
        Ok(())
    }

    /// Let go of the driver: `Prepared | Ready → Initialized`, stopping first if playing.
    pub(crate) fn detach_driver(&mut self) -> Result<()> {
        if self.state == EngineState::Playing {
            self.stop_driver_and_engine();
        }
        self.require("stop_audio_drivers", &[EngineState::Prepared, EngineState::Ready])?;
        self.set_state(EngineState::Initialized);
        self.driver = None;
        Ok(())
    }

    /// `Initialized → Uninitialized`.
    pub fn destroy(&mut self) -> Result<()> {
        self.require("destroy", &[EngineState::Initialized])?;
        self.sampler.stop_playing_notes();
        self.queues.flush();
        self.scheduler.clear();
        self.metronome = None;
        self.set_state(EngineState::Uninitialized);
        Ok(())
    }

    /// Attach `song`: `Prepared → Ready`.
    ///
    /// On error the song is handed back along with the reason.
    pub fn set_song(&mut self, song: Song) -> std::result::Result<(), (EngineError, Song)> {
        if self.state == EngineState::Playing {
            self.stop_driver_and_engine();
        }
        if self.song.is_some() {
            error!("song already set");
            return Err((EngineError::SongAlreadySet, song));
        }
        if let Err(e) = self.require("set_song", &[EngineState::Prepared]) {
            return Err((e, song));
        }

        self.scheduler.clear();
        self.queues.flush();
        self.transport.reset_tick_size(self.sample_rate, song.bpm, song.resolution);
        self.transport.set_bpm(song.bpm);
        self.transport.set_frames(0);
        self.scheduler.prime(&song);
        if let Some(driver) = &self.driver {
            driver.set_bpm(song.bpm);
            driver.locate(0);
        }
        info!(title = %song.title, bpm = song.bpm, "song set");
        self.song = Some(song);
        self.set_state(EngineState::Ready);

        self.notify(EngineEvent::SelectedPatternChanged(self.selected_pattern));
        self.notify(EngineEvent::PatternChanged);
        self.notify(EngineEvent::SelectedInstrumentChanged(self.selected_instrument));
        Ok(())
    }

    /// Detach and return the song: `Ready → Prepared`, stopping first if playing.
    pub fn remove_song(&mut self) -> Result<Song> {
        if self.state == EngineState::Playing {
            self.stop_driver_and_engine();
        }
        self.require("remove_song", &[EngineState::Ready])?;
        let song = self.song.take().ok_or(EngineError::NoSong)?;
        self.queues.flush();
        self.sampler.stop_playing_notes();
        self.scheduler.clear();
        self.set_state(EngineState::Prepared);
        Ok(song)
    }

    /// `Ready → Playing`.
    pub fn start(&mut self) -> Result<()> {
        self.require("start", &[EngineState::Ready])?;
        self.master_peak = (0.0, 0.0);
        self.scheduler.reset_for_start();
        if let Some(song) = &self.song {
            self.transport.reset_tick_size(self.sample_rate, song.bpm, song.resolution);
        }
        self.transport.set_status(TransportStatus::Rolling);
        self.set_state(EngineState::Playing);
        Ok(())
    }

    /// `Playing → Ready`.
    pub fn stop(&mut self) -> Result<()> {
        self.require("stop", &[EngineState::Playing])?;
        self.master_peak = (0.0, 0.0);
        self.scheduler.reset_pattern_start();
        self.queues.flush();
        self.transport.set_status(TransportStatus::Stopped);
        self.set_state(EngineState::Ready);
        Ok(())
    }

    fn stop_driver_and_engine(&mut self) {
        if let Some(driver) = &self.driver {
            driver.stop();
        }
        let _ = self.stop();
    }

    // --- Transport ---

    /// Move the transport to `frame` and re-resolve the song position.
    pub fn seek(&mut self, frame: u64) {
        if self.transport.frames() == frame {
            return;
        }
        self.transport.set_frames(frame);
        let tick = self.transport.frame_to_tick(frame);
        if let Some(song) = &self.song {
            self.scheduler.relocate(song, tick, song.loop_enabled);
        }
        self.queues.flush();
        self.sampler.stop_playing_notes();
    }

    /// Jump to the start of column `column`.
    pub fn set_pattern_pos(&mut self, column: usize) -> Result<()> {
        let song = self.song.as_ref().ok_or(EngineError::NoSong)?;
        let Some(tick) = self.scheduler.tick_for_position(song, column) else {
            warn!(column, "no such song position");
            return Ok(());
        };
        if self.state != EngineState::Playing {
            self.scheduler.relocate(song, tick, song.loop_enabled);
        }
        let frame = self.transport.tick_to_frame(tick);
        if let Some(driver) = &self.driver {
            driver.locate(frame);
        }
        Ok(())
    }

    /// Change the song tempo and tell the driver.
    pub fn set_bpm(&mut self, bpm: f32) -> Result<()> {
        if !(bpm.is_finite() && bpm > 0.0) {
            warn!(bpm, "ignoring invalid tempo");
            return Err(EngineError::InvalidBpm(bpm));
        }
        let song = self.song.as_mut().ok_or(EngineError::NoSong)?;
        song.bpm = bpm;
        if let Some(driver) = &self.driver {
            driver.set_bpm(bpm);
        }
        Ok(())
    }

    /// Feed one tap interval; sets the averaged tempo.
    pub fn set_tap_tempo(&mut self, interval_ms: f32) -> Result<f32> {
        let Some(bpm) = self.tap.tap(interval_ms) else {
            return Err(EngineError::InvalidBpm(60_000.0 / interval_ms));
        };
        self.set_bpm(bpm)?;
        Ok(bpm)
    }

    /// Start the driver transport. Pattern mode always starts from the top.
    pub fn sequencer_play(&mut self) {
        if self.song.as_ref().is_some_and(|s| s.mode == SongMode::Pattern) {
            self.scheduler.reset_pattern_start();
            if let Some(driver) = &self.driver {
                driver.locate(0);
            }
        }
        if let Some(driver) = &self.driver {
            driver.start();
        }
    }

    /// Stop the driver transport and leave record mode.
    pub fn sequencer_stop(&mut self) {
        if let Some(driver) = &self.driver {
            driver.stop();
        }
        self.prefs.record_events = false;
    }

    // --- Patterns and selection ---

    /// Stage pattern `index` for the next boundary. See [`NoteScheduler::set_next_pattern`].
    pub fn set_next_pattern(&mut self, index: usize, append: bool, delete: bool) -> bool {
        let Some(song) = &self.song else {
            error!("no song set");
            return false;
        };
        self.scheduler
            .set_next_pattern(song, index, NextPatternMode { append, delete })
    }

    pub fn set_current_pattern_list(&mut self, list: &PatternList) {
        self.scheduler.set_playing(list);
        self.notify(EngineEvent::PatternChanged);
    }

    pub fn select_pattern(&mut self, index: usize) {
        if self.selected_pattern != index {
            self.selected_pattern = index;
            self.notify(EngineEvent::SelectedPatternChanged(index));
        }
    }

    pub fn select_instrument(&mut self, index: usize) {
        if self.selected_instrument != index {
            self.selected_instrument = index;
            self.notify(EngineEvent::SelectedInstrumentChanged(index));
        }
    }

    pub fn selected_pattern(&self) -> usize {
        self.selected_pattern
    }

    pub fn selected_instrument(&self) -> usize {
        self.selected_instrument
    }

    /// Release the sampler voices of `instrument`.
    pub fn note_off(&mut self, instrument: usize) {
        self.sampler.note_off(InstrumentRef::Song(instrument));
    }

    // --- Preferences ---

    pub fn preferences(&self) -> &Preferences {
        &self.prefs
    }

    pub fn set_preferences(&mut self, prefs: Preferences) {
        if let Some(metronome) = self.metronome.as_mut() {
            metronome.enabled = prefs.metronome_enabled;
            metronome.set_volume(prefs.metronome_volume);
        }
        self.prefs = prefs;
    }

    pub fn set_metronome(&mut self, enabled: bool, volume: f32) {
        self.prefs.metronome_enabled = enabled;
        self.prefs.metronome_volume = volume.clamp(0.0, 1.0);
        if let Some(metronome) = self.metronome.as_mut() {
            metronome.enabled = enabled;
            metronome.set_volume(volume);
        }
    }

    // --- Mixer ---

    /// Install an effect by name into the next free slot.
    pub fn add_fx(&mut self, name: &str) -> Option<usize> {
        let fx = gb_engine::create_fx(name)?;
        match self.fx.insert(fx) {
            Ok(index) => Some(index),
            Err(_) => {
                warn!(name, "effect rack is full");
                None
            }
        }
    }

    pub fn fx(&mut self) -> &mut FxRack {
        &mut self.fx
    }

    /// Start a synth note.
    pub fn synth_note_on(&mut self, note: u8, velocity: f32) {
        self.synth.note_on(note, velocity);
    }

    pub fn synth_note_off(&mut self, note: u8) {
        self.synth.note_off(note);
    }

    // --- Read accessors ---

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn song(&self) -> Option<&Song> {
        self.song.as_ref()
    }

    pub fn song_mut(&mut self) -> Option<&mut Song> {
        self.song.as_mut()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn buffer_size(&self) -> usize {
        self.main.frames()
    }

    /// Master peaks since the last reset.
    pub fn master_peaks(&mut self, reset: bool) -> (f32, f32) {
        let peaks = self.master_peak;
        if reset {
            self.master_peak = (0.0, 0.0);
        }
        peaks
    }

    pub fn fx_peaks(&mut self, index: usize, reset: bool) -> Option<(f32, f32)> {
        self.fx.take_peaks(index, reset)
    }

    /// Render time of the last block, in milliseconds.
    pub fn process_time(&self) -> f32 {
        self.process_time_ms
    }

    pub fn max_process_time(&self) -> f32 {
        self.max_process_time_ms
    }

    /// Tick position inside the current pattern.
    pub fn tick_position(&self) -> u32 {
        self.scheduler.pattern_tick_position()
    }

    /// Tick the listener hears now, extrapolated from the last block.
    ///
    /// Adds the wall time since the block started plus one buffer, so a
    /// note queued here is not already late.
    pub fn realtime_tick_position(&self) -> u64 {
        let tick_size = self.transport.tick_size() as f64;
        let sample_rate = self.sample_rate.max(1) as f64;
        let init_tick = (self.realtime_frames as f64 / tick_size) as u64;
        let elapsed = self.block_started.map_or(0.0, |t| t.elapsed().as_secs_f64());
        let delta = elapsed + self.main.frames() as f64 / sample_rate;
        init_tick + (sample_rate / tick_size * delta) as u64
    }

    /// Column playing in Song mode.
    pub fn pattern_position(&self) -> Option<usize> {
        self.scheduler.song_pos()
    }

    pub fn total_frames(&self) -> u64 {
        self.transport.frames()
    }

    pub fn realtime_frames(&self) -> u64 {
        self.realtime_frames
    }

    pub fn tick_size(&self) -> f32 {
        self.transport.tick_size()
    }

    pub fn current_pattern_list(&self) -> &PatternList {
        self.scheduler.playing()
    }

    pub fn next_patterns(&self) -> &PatternList {
        self.scheduler.next()
    }

    pub fn queued_notes(&self) -> (usize, usize) {
        (self.queues.song_len(), self.queues.midi_len())
    }

    pub fn active_voices(&self) -> usize {
        self.sampler.active_count()
    }
}
