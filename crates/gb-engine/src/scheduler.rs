//! Tick-by-tick note scheduling.
//!
//! Once per audio block the scheduler walks every tick the block covers,
//! decides which patterns are sounding (song columns in Song mode, the
//! playing set in Pattern mode), and queues live copies of the template
//! notes due at each tick, offset by swing and humanize.

use gb_ir::{PatternList, Song, SongMode};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use tracing::{error, info, warn};

use crate::humanize;
use crate::locator::{tick_for_position, Located, PatternLocator};
use crate::metronome::Metronome;
use crate::note_queue::NoteQueues;

/// Room reserved in the playing and staged pattern sets.
pub const PATTERN_LIST_CAPACITY: usize = 64;

/// What the caller must do after a scheduling pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScheduleResult {
    Continue,
    /// A pattern boundary was crossed; notify once the engine lock is released.
    PatternChanged,
    /// Nothing left to play; stop the transport.
    EndOfSong,
}

/// Side events raised while scheduling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerEvent {
    Metronome { downbeat: bool },
}

/// Where the current block sits in time.
#[derive(Clone, Copy, Debug)]
pub struct BlockClock {
    /// First frame of the block
    pub frame: u64,
    /// Block length in frames
    pub frames: usize,
    /// Frames per tick
    pub tick_size: f32,
    /// Only a playing engine expands patterns
    pub playing: bool,
}

impl BlockClock {
    fn tick_range(&self) -> (u64, u64) {
        let ts = self.tick_size as f64;
        let start = (self.frame as f64 / ts) as u64;
        let end = ((self.frame + self.frames as u64) as f64 / ts) as u64;
        (start, end)
    }
}

/// How staged patterns are spliced in at the next boundary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NextPatternMode {
    /// Keep the playing set instead of replacing it
    pub append: bool,
    /// Staged patterns are only removed from the playing set
    pub delete: bool,
}

/// The note scheduler and its song-position bookkeeping.
#[derive(Clone, Debug)]
pub struct NoteScheduler {
    last_tick: Option<u64>,
    pattern_start_tick: Option<u64>,
    pattern_tick_position: u32,
    song_pos: Option<usize>,
    playing: PatternList,
    next: PatternList,
    next_mode: NextPatternMode,
    locator: PatternLocator,
    rng: SmallRng,
}

impl Default for NoteScheduler {
    fn default() -> Self {
        Self::with_rng(SmallRng::from_entropy())
    }
}

impl NoteScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scheduler with a reproducible humanize sequence.
    pub fn seeded(seed: u64) -> Self {
        Self::with_rng(SmallRng::seed_from_u64(seed))
    }

    fn with_rng(rng: SmallRng) -> Self {
        Self {
            last_tick: None,
            pattern_start_tick: None,
            pattern_tick_position: 0,
            song_pos: None,
            playing: PatternList::with_capacity(PATTERN_LIST_CAPACITY),
            next: PatternList::with_capacity(PATTERN_LIST_CAPACITY),
            next_mode: NextPatternMode { append: true, delete: false },
            locator: PatternLocator::new(),
            rng,
        }
    }

    /// Schedule every tick covered by `clock`.
    pub fn update<F>(
        &mut self,
        song: &Song,
        clock: &BlockClock,
        queues: &mut NoteQueues,
        metronome: &Metronome,
        mut emit: F,
    ) -> ScheduleResult
    where
        F: FnMut(SchedulerEvent),
    {
        let (start_tick, end_tick) = clock.tick_range();
        let mut pattern_changed = false;

        for tick in start_tick..=end_tick {
            if self.last_tick == Some(tick) {
                continue;
            }
            self.last_tick = Some(tick);

            queues.merge_midi_until(tick);

            if !clock.playing {
                continue;
            }

            match song.mode {
                SongMode::Song => match self.advance_song(song, tick) {
                    Some(changed) => pattern_changed |= changed,
                    None => return ScheduleResult::EndOfSong,
                },
                SongMode::Pattern => pattern_changed |= self.advance_pattern(song, tick),
            }

            let start = self.pattern_start_tick.unwrap_or(0);
            if Metronome::is_click(tick, start) {
                let downbeat = self.pattern_tick_position == 0;
                emit(SchedulerEvent::Metronome { downbeat });
                if metronome.enabled {
                    queues.push_song(Metronome::click(tick, downbeat));
                }
            }

            self.queue_pattern_notes(song, tick, clock.tick_size, queues);
        }

        if pattern_changed {
            ScheduleResult::PatternChanged
        } else {
            ScheduleResult::Continue
        }
    }

    /// Resolve the column for `tick`. Returns whether a pattern starts here,
    /// or `None` at the end of the song.
    fn advance_song(&mut self, song: &Song, tick: u64) -> Option<bool> {
        if song.columns.is_empty() {
            error!("no patterns in song");
            return None;
        }

        let located = match self.locator.locate(song, tick, song.loop_enabled) {
            Some(found) => {
                let song_ticks = self.locator.song_ticks();
                let rel = tick - found.start_tick;
                let pos = if song_ticks != 0 { rel % song_ticks } else { rel };
                self.pattern_tick_position = pos as u32;
                found
            }
            None if song.loop_enabled => {
                info!("song position lost, relocating to tick 0");
                let found = self.locator.locate(song, 0, true)?;
                self.pattern_tick_position = 0;
                found
            }
            None => {
                info!("end of song");
                return None;
            }
        };

        self.song_pos = Some(located.column);
        self.pattern_start_tick = Some(located.start_tick);
        self.playing.replace_with(&song.columns[located.column]);
        Some(self.pattern_tick_position == 0)
    }

    /// Splice staged patterns at the pattern boundary. Returns whether anything was spliced.
    fn advance_pattern(&mut self, song: &Song, tick: u64) -> bool {
        let size = song.list_length(&self.playing);
        if size == 0 {
            error!("first playing pattern has zero length");
        }

        let mut changed = false;
        let at_boundary = match self.pattern_start_tick {
            None => true,
            Some(start) => tick == start + size as u64,
        };
        if at_boundary {
            if !self.next.is_empty() {
                if self.next_mode.delete {
                    for key in self.next.iter() {
                        self.playing.del(key);
                    }
                } else {
                    if !self.next_mode.append {
                        self.playing.clear();
                    }
                    for key in self.next.iter() {
                        self.playing.toggle(key);
                    }
                }
                self.next.clear();
                changed = true;
            }
            self.pattern_start_tick = Some(tick);
        }

        self.pattern_tick_position = (tick % size.max(1) as u64) as u32;
        changed
    }

    fn queue_pattern_notes(&mut self, song: &Song, tick: u64, tick_size: f32, queues: &mut NoteQueues) {
        let pos = self.pattern_tick_position;
        let swing = song.swing();
        let humanize_time = song.humanize_time();
        let humanize_velocity = song.humanize_velocity();
        let rng = &mut self.rng;

        for key in self.playing.iter() {
            let Some(pattern) = song.pattern(key) else {
                continue;
            };
            for template in pattern.notes_at(pos) {
                let offset = humanize::swing_offset(pos, tick_size, swing)
                    + humanize::time_offset(rng, humanize_time);
                let mut live = template.live_copy(tick);
                live.velocity = humanize::velocity(rng, live.velocity, humanize_velocity);
                live.humanize_delay = offset;
                queues.push_song(live);
            }
        }
    }

    /// Reset song-position bookkeeping for a fresh start.
    pub fn reset_for_start(&mut self) {
        self.song_pos = None;
        self.pattern_start_tick = None;
        self.pattern_tick_position = 0;
        self.last_tick = None;
    }

    /// Forget the pattern start so Pattern mode splices on the next tick.
    pub fn reset_pattern_start(&mut self) {
        self.pattern_start_tick = None;
    }

    /// Re-resolve the song position at `tick` (after a seek).
    pub fn relocate(&mut self, song: &Song, tick: u64, loop_enabled: bool) -> Option<Located> {
        let found = self.locator.locate(song, tick, loop_enabled);
        self.song_pos = found.map(|l| l.column);
        self.pattern_start_tick = found.map(|l| l.start_tick);
        self.last_tick = None;
        found
    }

    /// Jump to the start of column `pos`; returns its tick.
    pub fn tick_for_position(&self, song: &Song, pos: usize) -> Option<u64> {
        tick_for_position(song, pos, song.loop_enabled)
    }

    /// Empty both pattern sets and forget the song position.
    pub fn clear(&mut self) {
        self.playing.clear();
        self.next.clear();
        self.song_pos = None;
        self.pattern_start_tick = None;
        self.pattern_tick_position = 0;
    }

    /// Put the first pattern of the song's pattern list into the playing set.
    pub fn prime(&mut self, song: &Song) {
        self.playing.clear();
        if let Some(first) = song.pattern_at(0) {
            self.playing.add(first);
        }
    }

    /// Stage pattern `index` for the next boundary (Pattern mode only).
    ///
    /// Staging a pattern twice unstages it. An out-of-range index or Song
    /// mode clears the staged set and returns false.
    pub fn set_next_pattern(&mut self, song: &Song, index: usize, mode: NextPatternMode) -> bool {
        self.next_mode = mode;
        if song.mode != SongMode::Pattern {
            error!("can't set next pattern in song mode");
            self.next.clear();
            return false;
        }
        match song.pattern_at(index) {
            Some(key) => {
                self.next.toggle(key);
                true
            }
            None => {
                error!(index, patterns = song.pattern_list.len(), "next pattern index out of range");
                self.next.clear();
                false
            }
        }
    }

    /// Replace the playing set.
    pub fn set_playing(&mut self, list: &PatternList) {
        if list.len() > PATTERN_LIST_CAPACITY {
            warn!(len = list.len(), "playing set exceeds reserved capacity");
        }
        self.playing.replace_with(list);
    }

    pub fn playing(&self) -> &PatternList {
        &self.playing
    }

    pub fn next(&self) -> &PatternList {
        &self.next
    }

    /// Column index currently playing in Song mode.
    pub fn song_pos(&self) -> Option<usize> {
        self.song_pos
    }

    pub fn pattern_start_tick(&self) -> Option<u64> {
        self.pattern_start_tick
    }

    pub fn pattern_tick_position(&self) -> u32 {
        self.pattern_tick_position
    }

    pub fn last_tick(&self) -> Option<u64> {
        self.last_tick
    }

    /// RNG shared with render-time humanizing.
    pub fn rng(&mut self) -> &mut SmallRng {
        &mut self.rng
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gb_ir::{InstrumentRef, Note, Pattern, PatternKey};

    const TS: f32 = 500.0;

    fn clock(frame: u64, frames: usize) -> BlockClock {
        BlockClock { frame, frames, tick_size: TS, playing: true }
    }

    fn one_pattern_song(len: u32, ticks: &[u32]) -> (Song, PatternKey) {
        let mut song = Song::new("s");
        let mut p = Pattern::new("a", len);
        for &t in ticks {
            p.insert(t, Note::new(InstrumentRef::Song(0), 0, 0.9));
        }
        let key = song.add_pattern(p);
        song.add_column(&[key]);
        song.loop_enabled = true;
        (song, key)
    }

    fn run(
        sched: &mut NoteScheduler,
        song: &Song,
        c: BlockClock,
        queues: &mut NoteQueues,
    ) -> (ScheduleResult, Vec<SchedulerEvent>) {
        let metronome = Metronome::new(48000);
        let mut events = Vec::new();
        let r = sched.update(song, &c, queues, &metronome, |e| events.push(e));
        (r, events)
    }

    #[test]
    fn song_mode_schedules_note_at_tick_zero() {
        let (song, _) = one_pattern_song(16, &[0]);
        let mut sched = NoteScheduler::seeded(1);
        let mut q = NoteQueues::with_capacity(64);

        let (r, _) = run(&mut sched, &song, clock(0, 3000), &mut q);
        assert_eq!(r, ScheduleResult::PatternChanged);
        assert_eq!(q.song_len(), 1);
        assert_eq!(q.song_notes().next().map(|n| n.position), Some(0));
        assert_eq!(sched.last_tick(), Some(6));
        assert_eq!(sched.song_pos(), Some(0));
    }

    #[test]
    fn looping_song_repeats_pattern() {
        let (song, _) = one_pattern_song(16, &[0]);
        let mut sched = NoteScheduler::seeded(1);
        let mut q = NoteQueues::with_capacity(64);

        let mut frame = 0;
        while frame < 16 * 500 + 100 {
            run(&mut sched, &song, clock(frame, 256), &mut q);
            frame += 256;
        }
        let ticks: Vec<u64> = q.song_notes().map(|n| n.position).collect();
        assert_eq!(ticks, vec![0, 16]);
    }

    #[test]
    fn no_tick_is_scheduled_twice() {
        let (song, _) = one_pattern_song(4, &[0, 1, 2, 3]);
        let mut sched = NoteScheduler::seeded(1);
        let mut q = NoteQueues::with_capacity(256);

        // Overlapping block boundaries share their edge tick.
        let mut frame = 0;
        let mut last = None;
        for _ in 0..40 {
            run(&mut sched, &song, clock(frame, 700), &mut q);
            assert!(sched.last_tick() >= last);
            last = sched.last_tick();
            frame += 700;
        }
        let ticks: Vec<u64> = q.song_notes().map(|n| n.position).collect();
        let mut dedup = ticks.clone();
        dedup.dedup();
        assert_eq!(ticks, dedup);
        assert_eq!(ticks, (0..=56).collect::<Vec<_>>());
    }

    #[test]
    fn end_of_song_without_loop() {
        let (mut song, _) = one_pattern_song(4, &[0]);
        song.loop_enabled = false;
        let mut sched = NoteScheduler::seeded(1);
        let mut q = NoteQueues::with_capacity(16);
        let (r, _) = run(&mut sched, &song, clock(0, 1000), &mut q);
        assert_eq!(r, ScheduleResult::PatternChanged);
        let (r, _) = run(&mut sched, &song, clock(1000, 1500), &mut q);
        assert_eq!(r, ScheduleResult::EndOfSong);
    }

    #[test]
    fn empty_song_ends_immediately() {
        let song = Song::new("empty");
        let mut sched = NoteScheduler::seeded(1);
        let mut q = NoteQueues::with_capacity(16);
        let (r, _) = run(&mut sched, &song, clock(0, 256), &mut q);
        assert_eq!(r, ScheduleResult::EndOfSong);
    }

    #[test]
    fn not_playing_only_merges_midi() {
        let (song, _) = one_pattern_song(16, &[0]);
        let mut sched = NoteScheduler::seeded(1);
        let mut q = NoteQueues::with_capacity(16);
        q.push_midi(Note::new(InstrumentRef::Song(0), 2, 1.0));
        let mut c = clock(0, 1500);
        c.playing = false;
        let (r, events) = run(&mut sched, &song, c, &mut q);
        assert_eq!(r, ScheduleResult::Continue);
        assert!(events.is_empty());
        assert_eq!(q.song_len(), 1);
        assert_eq!(q.midi_len(), 0);
    }

    #[test]
    fn pattern_mode_splices_staged_pattern_at_boundary() {
        let mut song = Song::new("pm");
        song.mode = SongMode::Pattern;
        let a = song.add_pattern(Pattern::new("A", 4));
        let b = song.add_pattern(Pattern::new("B", 4));

        let mut sched = NoteScheduler::seeded(1);
        sched.prime(&song);
        let mut q = NoteQueues::with_capacity(16);

        // First tick records the pattern start; nothing staged yet.
        let (r, _) = run(&mut sched, &song, clock(0, 499), &mut q);
        assert_eq!(r, ScheduleResult::Continue);

        assert!(sched.set_next_pattern(&song, 1, NextPatternMode { append: true, delete: false }));
        let mut changes = 0;
        for i in 1..8u64 {
            let (r, _) = run(&mut sched, &song, clock(i * 500, 499), &mut q);
            if r == ScheduleResult::PatternChanged {
                changes += 1;
            }
        }
        assert_eq!(changes, 1);
        let playing: Vec<_> = sched.playing().iter().collect();
        assert_eq!(playing, vec![a, b]);
        assert!(sched.next().is_empty());
        assert_eq!(sched.pattern_start_tick(), Some(4));
    }

    #[test]
    fn replace_and_delete_staging() {
        let mut song = Song::new("pm");
        song.mode = SongMode::Pattern;
        let a = song.add_pattern(Pattern::new("A", 4));
        let b = song.add_pattern(Pattern::new("B", 4));

        let mut sched = NoteScheduler::seeded(1);
        sched.prime(&song);
        let mut q = NoteQueues::with_capacity(16);
        sched.set_next_pattern(&song, 1, NextPatternMode { append: false, delete: false });
        run(&mut sched, &song, clock(0, 100), &mut q);
        assert_eq!(sched.playing().iter().collect::<Vec<_>>(), vec![b]);

        sched.set_next_pattern(&song, 1, NextPatternMode { append: true, delete: true });
        run(&mut sched, &song, clock(4 * 500, 100), &mut q);
        assert!(sched.playing().is_empty());
        assert!(!sched.playing().contains(a));
    }

    #[test]
    fn next_pattern_rejected_in_song_mode_or_out_of_range() {
        let (song, _) = one_pattern_song(4, &[]);
        let mut sched = NoteScheduler::seeded(1);
        assert!(!sched.set_next_pattern(&song, 0, NextPatternMode::default()));

        let mut song = song;
        song.mode = SongMode::Pattern;
        assert!(sched.set_next_pattern(&song, 0, NextPatternMode::default()));
        assert_eq!(sched.next().len(), 1);
        assert!(!sched.set_next_pattern(&song, 7, NextPatternMode::default()));
        assert!(sched.next().is_empty());
    }

    #[test]
    fn metronome_events_every_beat() {
        let (song, _) = one_pattern_song(96, &[]);
        let mut sched = NoteScheduler::seeded(1);
        let mut q = NoteQueues::with_capacity(16);
        let mut metronome = Metronome::new(48000);
        metronome.enabled = true;
        let mut events = Vec::new();
        let c = clock(0, 96 * 500 - 1);
        sched.update(&song, &c, &mut q, &metronome, |e| events.push(e));
        assert_eq!(
            events,
            vec![
                SchedulerEvent::Metronome { downbeat: true },
                SchedulerEvent::Metronome { downbeat: false },
            ]
        );
        let clicks: Vec<_> = q.song_notes().map(|n| (n.position, n.pitch)).collect();
        assert_eq!(clicks, vec![(0, 3.0), (48, 0.0)]);
    }

    #[test]
    fn swing_delays_off_beats() {
        let (mut song, _) = one_pattern_song(48, &[0, 12, 24]);
        song.set_swing(0.5);
        let mut sched = NoteScheduler::seeded(1);
        let mut q = NoteQueues::with_capacity(16);
        run(&mut sched, &song, clock(0, 30 * 500), &mut q);
        let delays: Vec<_> = q.song_notes().map(|n| (n.position, n.humanize_delay)).collect();
        assert_eq!(delays, vec![(0, 0), (12, 1500), (24, 0)]);
    }

    #[test]
    fn zero_humanize_leaves_notes_untouched() {
        let (song, _) = one_pattern_song(16, &[0, 3, 7]);
        let mut sched = NoteScheduler::seeded(5);
        let mut q = NoteQueues::with_capacity(16);
        run(&mut sched, &song, clock(0, 8 * 500), &mut q);
        assert_eq!(q.song_len(), 3);
        for n in q.song_notes() {
            assert_eq!(n.humanize_delay, 0);
            assert_eq!(n.velocity, 0.9);
        }
    }

    #[test]
    fn relocate_resets_position() {
        let mut song = Song::new("two");
        let a = song.add_pattern(Pattern::new("a", 16));
        let b = song.add_pattern(Pattern::new("b", 32));
        song.add_column(&[a]);
        song.add_column(&[b]);
        let mut sched = NoteScheduler::seeded(1);
        let found = sched.relocate(&song, 20, false);
        assert_eq!(found, Some(Located { column: 1, start_tick: 16 }));
        assert_eq!(sched.song_pos(), Some(1));
        assert_eq!(sched.pattern_start_tick(), Some(16));
        assert_eq!(sched.tick_for_position(&song, 1), Some(16));
    }
}
