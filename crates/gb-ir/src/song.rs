//! Song structure and sequencing types.

use alloc::vec::Vec;
use arrayvec::ArrayString;
use slotmap::SlotMap;

use crate::instrument::Instrument;
use crate::pattern::{Pattern, PatternKey, PatternList};

/// Default pattern length in ticks; also the length assumed for an empty column.
pub const MAX_NOTES: u32 = 192;
/// Default ticks per quarter note.
pub const DEFAULT_RESOLUTION: u32 = 48;

/// How the sequencer walks the song.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SongMode {
    /// Traverse the columns in order.
    #[default]
    Song,
    /// Loop whatever patterns are currently active.
    Pattern,
}

/// A complete song.
#[derive(Clone, Debug)]
pub struct Song {
    /// Song title
    pub title: ArrayString<32>,
    /// Tempo in BPM
    pub bpm: f32,
    /// Ticks per quarter note
    pub resolution: u32,
    pub mode: SongMode,
    pub loop_enabled: bool,
    /// Set when realtime recording inserts a note
    pub is_modified: bool,
    pub instruments: Vec<Instrument>,
    /// Pattern pool
    pub patterns: SlotMap<PatternKey, Pattern>,
    /// Patterns in index order, for selection and staging by number
    pub pattern_list: Vec<PatternKey>,
    /// Ordered columns of patterns that play together
    pub columns: Vec<PatternList>,
    humanize_time: f32,
    humanize_velocity: f32,
    swing: f32,
}

impl Default for Song {
    fn default() -> Self {
        Self {
            title: ArrayString::new(),
            bpm: 120.0,
            resolution: DEFAULT_RESOLUTION,
            mode: SongMode::Song,
            loop_enabled: false,
            is_modified: false,
            instruments: Vec::new(),
            patterns: SlotMap::with_key(),
            pattern_list: Vec::new(),
            columns: Vec::new(),
            humanize_time: 0.0,
            humanize_velocity: 0.0,
            swing: 0.0,
        }
    }
}

impl Song {
    /// Create a new empty song.
    pub fn new(title: &str) -> Self {
        let mut song = Self::default();
        let _ = song.title.try_push_str(title);
        song
    }

    /// Add a pattern to the pool and append it to the pattern list.
    pub fn add_pattern(&mut self, pattern: Pattern) -> PatternKey {
        let key = self.patterns.insert(pattern);
        self.pattern_list.push(key);
        key
    }

    /// Append a column playing the given patterns.
    pub fn add_column(&mut self, keys: &[PatternKey]) {
        self.columns.push(keys.iter().copied().collect());
    }

    pub fn pattern(&self, key: PatternKey) -> Option<&Pattern> {
        self.patterns.get(key)
    }

    pub fn pattern_mut(&mut self, key: PatternKey) -> Option<&mut Pattern> {
        self.patterns.get_mut(key)
    }

    /// Pattern key at `index` in the pattern list.
    pub fn pattern_at(&self, index: usize) -> Option<PatternKey> {
        self.pattern_list.get(index).copied()
    }

    /// Length in ticks of a pattern list: its first pattern, or [`MAX_NOTES`] if empty.
    pub fn list_length(&self, list: &PatternList) -> u32 {
        list.first()
            .and_then(|key| self.patterns.get(key))
            .map(|p| p.length)
            .unwrap_or(MAX_NOTES)
    }

    /// Length in ticks of column `index`.
    pub fn column_length(&self, index: usize) -> u32 {
        self.columns
            .get(index)
            .map(|c| self.list_length(c))
            .unwrap_or(0)
    }

    /// Sum of all column lengths.
    pub fn total_ticks(&self) -> u64 {
        self.columns.iter().map(|c| self.list_length(c) as u64).sum()
    }

    pub fn humanize_time(&self) -> f32 {
        self.humanize_time
    }

    pub fn humanize_velocity(&self) -> f32 {
        self.humanize_velocity
    }

    pub fn swing(&self) -> f32 {
        self.swing
    }

    /// Timing jitter amount, clamped to `[0, 1]`.
    pub fn set_humanize_time(&mut self, value: f32) {
        self.humanize_time = value.clamp(0.0, 1.0);
    }

    /// Velocity jitter amount, clamped to `[0, 1]`.
    pub fn set_humanize_velocity(&mut self, value: f32) {
        self.humanize_velocity = value.clamp(0.0, 1.0);
    }

    /// Off-beat delay amount, clamped to `[0, 1]`.
    pub fn set_swing(&mut self, value: f32) {
        self.swing = value.clamp(0.0, 1.0);
    }
}
