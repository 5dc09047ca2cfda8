//! Patterns and pattern lists.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use arrayvec::ArrayString;

use crate::note::{InstrumentRef, Note};

slotmap::new_key_type! {
    /// Key for referencing patterns in the song's pattern pool.
    pub struct PatternKey;
}

/// A fixed-length, tick-indexed collection of notes.
///
/// Several notes may share a tick.
#[derive(Clone, Debug)]
pub struct Pattern {
    /// Pattern name
    pub name: ArrayString<32>,
    /// Length in ticks
    pub length: u32,
    notes: BTreeMap<u32, Vec<Note>>,
}

impl Pattern {
    /// Create an empty pattern.
    pub fn new(name: &str, length: u32) -> Self {
        let mut pattern_name = ArrayString::new();
        let _ = pattern_name.try_push_str(name);
        Self {
            name: pattern_name,
            length,
            notes: BTreeMap::new(),
        }
    }

    /// Insert a template note at `tick`. The note's position is rewritten to `tick`.
    pub fn insert(&mut self, tick: u32, mut note: Note) {
        note.position = tick as u64;
        self.notes.entry(tick).or_default().push(note);
    }

    /// All notes stored at `tick`.
    pub fn notes_at(&self, tick: u32) -> &[Note] {
        self.notes.get(&tick).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Does a note for `instrument` already sit at `tick`?
    pub fn has_note(&self, tick: u32, instrument: InstrumentRef) -> bool {
        self.notes_at(tick).iter().any(|n| n.instrument == instrument)
    }

    /// Remove every note for `instrument` at `tick`. Returns how many were removed.
    pub fn remove(&mut self, tick: u32, instrument: InstrumentRef) -> usize {
        let Some(slot) = self.notes.get_mut(&tick) else {
            return 0;
        };
        let before = slot.len();
        slot.retain(|n| n.instrument != instrument);
        let removed = before - slot.len();
        if slot.is_empty() {
            self.notes.remove(&tick);
        }
        removed
    }

    /// Iterate `(tick, note)` pairs in tick order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &Note)> {
        self.notes
            .iter()
            .flat_map(|(tick, notes)| notes.iter().map(move |n| (*tick, n)))
    }

    /// Total number of notes.
    pub fn note_count(&self) -> usize {
        self.notes.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}

/// An ordered set of patterns: a song column, or the playing / staged sets.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PatternList {
    keys: Vec<PatternKey>,
}

impl PatternList {
    pub fn new() -> Self {
        Self { keys: Vec::new() }
    }

    /// Pre-size so that refilling on the audio thread never reallocates.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            keys: Vec::with_capacity(capacity),
        }
    }

    pub fn add(&mut self, key: PatternKey) {
        self.keys.push(key);
    }

    /// Remove the first occurrence of `key`. Returns true if it was present.
    pub fn del(&mut self, key: PatternKey) -> bool {
        match self.keys.iter().position(|k| *k == key) {
            Some(pos) => {
                self.keys.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Remove `key` if present, otherwise add it. Returns true if it was added.
    pub fn toggle(&mut self, key: PatternKey) -> bool {
        if self.del(key) {
            false
        } else {
            self.add(key);
            true
        }
    }

    /// Replace the contents with `other`, reusing the allocation.
    pub fn replace_with(&mut self, other: &PatternList) {
        self.keys.clear();
        self.keys.extend_from_slice(&other.keys);
    }

    pub fn contains(&self, key: PatternKey) -> bool {
        self.keys.contains(&key)
    }

    pub fn get(&self, index: usize) -> Option<PatternKey> {
        self.keys.get(index).copied()
    }

    pub fn first(&self) -> Option<PatternKey> {
        self.keys.first().copied()
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = PatternKey> + '_ {
        self.keys.iter().copied()
    }
}

impl FromIterator<PatternKey> for PatternList {
    fn from_iter<I: IntoIterator<Item = PatternKey>>(iter: I) -> Self {
        Self {
            keys: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn kick(tick: u64) -> Note {
        Note::new(InstrumentRef::Song(0), tick, 1.0)
    }

    #[test]
    fn multiple_notes_share_a_tick() {
        let mut p = Pattern::new("beat", 16);
        p.insert(0, kick(0));
        p.insert(0, Note::new(InstrumentRef::Song(1), 0, 0.5));
        p.insert(8, kick(0));

        assert_eq!(p.notes_at(0).len(), 2);
        assert_eq!(p.notes_at(8).len(), 1);
        assert_eq!(p.notes_at(8)[0].position, 8);
        assert!(p.notes_at(3).is_empty());
        assert_eq!(p.note_count(), 3);
    }

    #[test]
    fn remove_drops_empty_ticks() {
        let mut p = Pattern::new("beat", 16);
        p.insert(4, kick(0));
        assert!(p.has_note(4, InstrumentRef::Song(0)));
        assert_eq!(p.remove(4, InstrumentRef::Song(0)), 1);
        assert!(p.is_empty());
        assert_eq!(p.remove(4, InstrumentRef::Song(0)), 0);
    }

    #[test]
    fn iter_is_tick_ordered() {
        let mut p = Pattern::new("beat", 16);
        p.insert(12, kick(0));
        p.insert(2, kick(0));
        let ticks: Vec<u32> = p.iter().map(|(t, _)| t).collect();
        assert_eq!(ticks, vec![2, 12]);
    }

    #[test]
    fn pattern_list_toggle() {
        let mut pool: SlotMap<PatternKey, ()> = SlotMap::with_key();
        let a = pool.insert(());
        let b = pool.insert(());

        let mut list = PatternList::new();
        assert!(list.toggle(a));
        assert!(list.toggle(b));
        assert_eq!(list.len(), 2);
        assert!(!list.toggle(a));
        assert_eq!(list.first(), Some(b));
        assert!(!list.del(a));
    }

    #[test]
    fn replace_with_copies_order() {
        let mut pool: SlotMap<PatternKey, ()> = SlotMap::with_key();
        let a = pool.insert(());
        let b = pool.insert(());
        let src: PatternList = [a, b].into_iter().collect();
        let mut dst = PatternList::with_capacity(4);
        dst.add(b);
        dst.replace_with(&src);
        assert_eq!(dst, src);
    }
}
