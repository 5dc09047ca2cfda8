//! Queues of live notes waiting to be rendered.
//!
//! Pattern expansion feeds the *song* queue; realtime input feeds the
//! *midi* queue. Midi notes are merged into the song queue as the
//! scheduler reaches their tick, and the renderer pops due notes off the
//! song queue front. Both queues are pre-sized so that pushing within
//! capacity does not allocate on the audio thread.

use std::collections::VecDeque;

use gb_ir::Note;

/// The song and midi note queues.
#[derive(Clone, Debug, Default)]
pub struct NoteQueues {
    song: VecDeque<Note>,
    midi: VecDeque<Note>,
}

impl NoteQueues {
    /// Create empty queues with room for `capacity` notes each.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            song: VecDeque::with_capacity(capacity),
            midi: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a scheduled note to the song queue.
    pub fn push_song(&mut self, note: Note) {
        self.song.push_back(note);
    }

    /// Insert a realtime note into the midi queue, keeping it ordered by tick.
    ///
    /// Notes with equal ticks keep arrival order.
    pub fn push_midi(&mut self, note: Note) {
        let pos = self.midi.partition_point(|n| n.position <= note.position);
        self.midi.insert(pos, note);
    }

    /// Move every midi note due at or before `tick` onto the song queue.
    pub fn merge_midi_until(&mut self, tick: u64) -> usize {
        let mut moved = 0;
        while self.midi.front().is_some_and(|n| n.position <= tick) {
            if let Some(note) = self.midi.pop_front() {
                self.song.push_back(note);
                moved += 1;
            }
        }
        moved
    }

    /// Pop the front song note if it starts before `end_frame`.
    ///
    /// Start frame is `position * tick_size`; notes whose start already
    /// passed are also returned.
    pub fn pop_due(&mut self, end_frame: u64, tick_size: f32) -> Option<Note> {
        let front = self.song.front()?;
        let start = front.start_frame(tick_size);
        if start < end_frame {
            self.song.pop_front()
        } else {
            None
        }
    }

    /// Drop every queued note. Returns how many were released.
    pub fn flush(&mut self) -> usize {
        let released = self.song.len() + self.midi.len();
        self.song.clear();
        self.midi.clear();
        released
    }

    pub fn song_len(&self) -> usize {
        self.song.len()
    }

    pub fn midi_len(&self) -> usize {
        self.midi.len()
    }

    pub fn is_empty(&self) -> bool {
        self.song.is_empty() && self.midi.is_empty()
    }

    /// Queued song notes, front first.
    pub fn song_notes(&self) -> impl Iterator<Item = &Note> {
        self.song.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gb_ir::InstrumentRef;

    fn note(tick: u64) -> Note {
        Note::new(InstrumentRef::Song(0), tick, 1.0)
    }

    #[test]
    fn midi_queue_is_ordered_by_tick() {
        let mut q = NoteQueues::with_capacity(8);
        q.push_midi(note(10));
        q.push_midi(note(5));
        q.push_midi(Note::new(InstrumentRef::Song(1), 10, 1.0));

        assert_eq!(q.merge_midi_until(7), 1);
        assert_eq!(q.midi_len(), 2);
        assert_eq!(q.merge_midi_until(10), 2);
        let order: Vec<_> = q.song_notes().map(|n| (n.position, n.instrument)).collect();
        assert_eq!(
            order,
            vec![
                (5, InstrumentRef::Song(0)),
                (10, InstrumentRef::Song(0)),
                (10, InstrumentRef::Song(1)),
            ]
        );
    }

    #[test]
    fn pop_due_respects_block_end() {
        let mut q = NoteQueues::with_capacity(8);
        q.push_song(note(0));
        q.push_song(note(6));

        assert_eq!(q.pop_due(3000, 500.0).map(|n| n.position), Some(0));
        // Tick 6 starts exactly at frame 3000.
        assert!(q.pop_due(3000, 500.0).is_none());
        assert_eq!(q.pop_due(3001, 500.0).map(|n| n.position), Some(6));
        assert!(q.pop_due(u64::MAX, 500.0).is_none());
    }

    #[test]
    fn fractional_tick_start_is_truncated() {
        let mut q = NoteQueues::with_capacity(4);
        q.push_song(note(3));
        // 3 * 459.375 = 1378.125
        assert!(q.pop_due(1378, 459.375).is_none());
        assert_eq!(q.pop_due(1379, 459.375).map(|n| n.position), Some(3));
    }

    #[test]
    fn stale_notes_are_still_due() {
        let mut q = NoteQueues::with_capacity(4);
        q.push_song(note(1));
        assert!(q.pop_due(10_000, 500.0).is_some());
    }

    #[test]
    fn flush_releases_every_note_once() {
        let mut q = NoteQueues::with_capacity(4);
        q.push_song(note(1));
        q.push_song(note(2));
        q.push_midi(note(3));
        assert_eq!(q.flush(), 3);
        assert!(q.is_empty());
        assert_eq!(q.flush(), 0);
    }
}
