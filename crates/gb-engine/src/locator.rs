//! Mapping between absolute ticks and song columns.

use gb_ir::Song;
use tracing::debug;

/// A column of the song and the tick at which it starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Located {
    pub column: usize,
    pub start_tick: u64,
}

/// Resolves ticks to columns, remembering the song length found by the loop path.
#[derive(Clone, Debug, Default)]
pub struct PatternLocator {
    song_ticks: u64,
}

impl PatternLocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Song length in ticks as cached by the last looping lookup, 0 otherwise.
    pub fn song_ticks(&self) -> u64 {
        self.song_ticks
    }

    /// Find the column containing `tick`.
    ///
    /// With `loop_enabled`, a tick past the end wraps modulo the song length.
    /// The returned `start_tick` is then relative to the wrapped tick.
    pub fn locate(&mut self, song: &Song, tick: u64, loop_enabled: bool) -> Option<Located> {
        self.song_ticks = 0;

        if let Some(found) = scan(song, tick) {
            return Some(found);
        }

        if loop_enabled {
            self.song_ticks = song.total_ticks();
            let loop_tick = if self.song_ticks != 0 { tick % self.song_ticks } else { 0 };
            if let Some(found) = scan(song, loop_tick) {
                return Some(found);
            }
        }

        debug!(tick, "no pattern found for tick");
        None
    }
}

fn scan(song: &Song, tick: u64) -> Option<Located> {
    let mut acc = 0u64;
    for (column, list) in song.columns.iter().enumerate() {
        let len = song.list_length(list) as u64;
        if tick >= acc && tick < acc + len {
            return Some(Located { column, start_tick: acc });
        }
        acc += len;
    }
    None
}

/// Tick at which column `pos` starts.
///
/// Past the end wraps when looping, otherwise there is no such tick.
pub fn tick_for_position(song: &Song, pos: usize, loop_enabled: bool) -> Option<u64> {
    let columns = song.columns.len();
    if columns == 0 {
        return None;
    }
    let pos = if pos >= columns {
        if !loop_enabled {
            return None;
        }
        pos % columns
    } else {
        pos
    };
    Some(song.columns[..pos].iter().map(|c| song.list_length(c) as u64).sum())
}
