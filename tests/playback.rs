//! Integration test: build a song → connect a fake driver → clock blocks → verify events and output.

use std::sync::Arc;

use gb_master::{
    Engine, EngineEvent, EngineHandle, EngineState, FakeClock, FakeDriver, Instrument, InstrumentRef, Note,
    NoteScheduler, Pattern, Preferences, Sample, Song, SongMode,
};

const RATE: u32 = 48000;

fn prefs(buffer_size: usize) -> Preferences {
    Preferences {
        audio_driver: "Null".to_string(),
        sample_rate: RATE,
        buffer_size,
        ..Preferences::default()
    }
}

fn hit() -> Instrument {
    let sample = Arc::new(Sample::from_mono("hit", RATE, vec![0.5; 128]));
    Instrument::with_sample("hit", sample)
}

/// One column holding a 16-tick pattern with a note at tick 0.
fn looping_song() -> Song {
    let mut song = Song::new("loop");
    song.loop_enabled = true;
    song.instruments.push(hit());
    let mut pattern = Pattern::new("a", 16);
    pattern.insert(0, Note::new(InstrumentRef::Song(0), 0, 1.0));
    let key = song.add_pattern(pattern);
    song.add_column(&[key]);
    song
}

/// One looping 16-tick pattern with a single note at `tick`.
fn song_with_note_at(tick: u32) -> Song {
    let mut song = Song::new("onset");
    song.loop_enabled = true;
    song.instruments.push(hit());
    let mut pattern = Pattern::new("a", 16);
    pattern.insert(tick, Note::new(InstrumentRef::Song(0), 0, 1.0));
    let key = song.add_pattern(pattern);
    song.add_column(&[key]);
    song
}

/// Clock one block and return the first sounding frame on the left.
fn tick_onset(clock: &FakeClock) -> Option<usize> {
    clock.tick();
    clock.last_output().0.iter().position(|&s| s != 0.0)
}

/// Start `song` on a manually clocked fake driver with `buffer_size` frames per block.
fn start(song: Song, buffer_size: usize) -> (Engine, EngineHandle, FakeClock) {
    let mut engine = Engine::with_scheduler(prefs(buffer_size), NoteScheduler::seeded(7));
    engine.init().unwrap();
    let driver = FakeDriver::new(RATE);
    let clock = driver.clock();
    engine.start_with_driver(Box::new(driver)).unwrap();
    let handle = engine.handle();
    handle.set_song(song).map_err(|(e, _)| e).unwrap();
    handle.events().drain();
    (engine, handle, clock)
}

fn count(handle: &EngineHandle, pred: impl Fn(&EngineEvent) -> bool) -> usize {
    handle.events().drain().iter().filter(|e| pred(e)).count()
}

fn note_ons(handle: &EngineHandle) -> usize {
    count(handle, |e| matches!(e, EngineEvent::NoteOn { .. }))
}

// --- Song mode ---

#[test]
fn looping_pattern_retriggers_its_first_note() {
    let (_engine, handle, clock) = start(looping_song(), 250);
    handle.sequencer_play();

    // 120 BPM, resolution 48, 48 kHz: 500 frames per tick
    assert_eq!(clock.run(12), 12);
    assert_eq!(handle.state(), EngineState::Playing);
    approx::assert_relative_eq!(handle.lock().tick_size(), 500.0);
    assert_eq!(handle.total_frames(), 3000);
    assert_eq!(note_ons(&handle), 1);

    // past tick 16
    clock.run(22);
    assert_eq!(note_ons(&handle), 1);
    assert_eq!(handle.pattern_position(), Some(0));

    let (left, _) = clock.last_output();
    assert_eq!(left.len(), 250);
}

#[test]
fn note_onset_lands_on_its_frame_in_a_later_block() {
    let (_engine, handle, clock) = start(song_with_note_at(3), 1024);
    handle.sequencer_play();
    assert_eq!(tick_onset(&clock), None);
    // tick 3 is frame 1500; the second block starts at 1024
    assert_eq!(tick_onset(&clock), Some(476));
    assert_eq!(note_ons(&handle), 1);
}

#[test]
fn swung_note_is_delayed_across_blocks() {
    let mut song = song_with_note_at(12);
    song.set_swing(1.0);
    let (_engine, handle, clock) = start(song, 1024);
    handle.sequencer_play();
    // tick 12 is frame 6000; full swing adds six ticks, so the hit sounds at 9000
    for _ in 0..8 {
        assert_eq!(tick_onset(&clock), None);
    }
    assert_eq!(tick_onset(&clock), Some(9000 - 8 * 1024));
}

#[test]
fn song_without_loop_ends_and_rewinds() {
    let mut song = looping_song();
    song.loop_enabled = false;
    let (_engine, handle, clock) = start(song, 500);
    handle.sequencer_play();
    let ran = clock.run(64);
    assert!(ran < 64);
    assert!(clock.is_halted());
    assert_eq!(handle.state(), EngineState::Ready);
    assert_eq!(handle.lock().queued_notes(), (0, 0));
}

// --- Pattern mode ---

#[test]
fn staged_pattern_joins_at_the_boundary() {
    let mut song = Song::new("pm");
    song.mode = SongMode::Pattern;
    let a = song.add_pattern(Pattern::new("A", 4));
    let b = song.add_pattern(Pattern::new("B", 4));
    let (_engine, handle, clock) = start(song, 500);
    handle.sequencer_play();

    // first block records the pattern start at tick 0
    clock.tick();
    assert!(handle.set_next_pattern(1, true, false));
    assert_eq!(handle.next_patterns().iter().collect::<Vec<_>>(), vec![b]);
    handle.events().drain();

    clock.run(5);
    assert_eq!(handle.current_pattern_list().iter().collect::<Vec<_>>(), vec![a, b]);
    assert!(handle.next_patterns().is_empty());
    assert_eq!(count(&handle, |e| *e == EngineEvent::PatternChanged), 1);
}

// --- Driver transport ---

#[test]
fn stopping_the_driver_stops_the_engine() {
    let (_engine, handle, clock) = start(looping_song(), 250);
    handle.sequencer_play();
    clock.run(4);
    assert_eq!(handle.state(), EngineState::Playing);

    handle.sequencer_stop();
    clock.tick();
    assert_eq!(handle.state(), EngineState::Ready);
    assert_eq!(handle.lock().queued_notes().0, 0);

    let before = handle.realtime_frames();
    clock.tick();
    assert_eq!(handle.realtime_frames(), before + 250);
    clock.tick();
    assert_eq!(handle.realtime_frames(), before + 500);
}

#[test]
fn realtime_notes_are_heard_while_stopped() {
    let (_engine, handle, clock) = start(looping_song(), 250);
    let outcome = handle.add_realtime_note(0, 0.8, 0.5, 0.5, 0.0, false).unwrap();
    assert!(outcome.heard());
    clock.run(2);
    assert_eq!(note_ons(&handle), 1);
    assert!(handle.master_peaks(true).0 > 0.0);
    assert_eq!(handle.master_peaks(false), (0.0, 0.0));
}

#[test]
fn tempo_change_reaches_the_callback() {
    let (_engine, handle, clock) = start(looping_song(), 250);
    handle.set_bpm(60.0).unwrap();
    clock.tick();
    approx::assert_relative_eq!(handle.lock().tick_size(), 1000.0);
    assert_eq!(handle.with_song(|s| s.bpm), Some(60.0));
}

#[cfg(not(feature = "cpal"))]
#[test]
fn auto_without_a_backend_falls_back_to_null() {
    let mut engine = Engine::new(Preferences {
        audio_driver: "Auto".to_string(),
        ..Preferences::default()
    });
    engine.init().unwrap();
    engine.start_audio_drivers().unwrap();
    assert_eq!(engine.driver_name(), Some("Null"));
    assert!(matches!(
        engine.handle().state(),
        EngineState::Prepared | EngineState::Ready
    ));
    engine.destroy().unwrap();
    assert_eq!(engine.handle().state(), EngineState::Uninitialized);
}

// --- Export ---

#[test]
fn export_writes_audible_audio() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("loop.wav");
    let mut engine = Engine::with_scheduler(prefs(500), NoteScheduler::seeded(7));
    engine.init().unwrap();
    engine.start_audio_drivers().unwrap();
    engine.handle().set_song(looping_song()).map_err(|(e, _)| e).unwrap();

    engine.export_song(&path).unwrap();
    let frames = engine.wait_export().unwrap();
    engine.stop_export_song().unwrap();
    assert_eq!(frames, 16 * 500);
    assert_eq!(engine.handle().with_song(|s| s.loop_enabled), Some(true));

    let mut reader = hound::WavReader::open(&path).unwrap();
    assert_eq!(reader.spec().sample_rate, RATE);
    assert_eq!(reader.duration(), 16 * 500);
    let peak = reader
        .samples::<i16>()
        .map(|s| s.unwrap().unsigned_abs())
        .max()
        .unwrap_or(0);
    assert!(peak > 0);
}
