//! Transport position and tick size.
//!
//! Musical time is counted in ticks (`resolution` ticks per quarter note);
//! the transport keeps the frame position and the frames-per-tick ratio
//! that maps one onto the other.

use tracing::{debug, warn};

/// Whether the transport is moving.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TransportStatus {
    #[default]
    Stopped,
    Rolling,
}

/// Frames per tick for a tempo, or `None` if the result would not be usable.
pub fn tick_size(sample_rate: u32, bpm: f32, resolution: u32) -> Option<f32> {
    let size = sample_rate as f32 * 60.0 / bpm / resolution as f32;
    (size.is_finite() && size > 0.0).then_some(size)
}

/// Frame position, tick size and rolling state of the engine.
#[derive(Clone, Debug)]
pub struct Transport {
    frames: u64,
    tick_size: f32,
    status: TransportStatus,
    bpm: f32,
}

impl Default for Transport {
    fn default() -> Self {
        Self {
            frames: 0,
            tick_size: 1.0,
            status: TransportStatus::Stopped,
            bpm: 120.0,
        }
    }
}

impl Transport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn set_frames(&mut self, frames: u64) {
        self.frames = frames;
    }

    /// Move forward by one block.
    pub fn advance(&mut self, frames: usize) {
        self.frames += frames as u64;
    }

    pub fn tick_size(&self) -> f32 {
        self.tick_size
    }

    pub fn status(&self) -> TransportStatus {
        self.status
    }

    pub fn set_status(&mut self, status: TransportStatus) {
        self.status = status;
    }

    pub fn is_rolling(&self) -> bool {
        self.status == TransportStatus::Rolling
    }

    pub fn bpm(&self) -> f32 {
        self.bpm
    }

    pub fn set_bpm(&mut self, bpm: f32) {
        self.bpm = bpm;
    }

    /// Set the tick size without touching the frame position.
    ///
    /// Returns false (and keeps the old size) if the tempo gives no usable size.
    pub fn reset_tick_size(&mut self, sample_rate: u32, bpm: f32, resolution: u32) -> bool {
        match tick_size(sample_rate, bpm, resolution) {
            Some(size) => {
                self.tick_size = size;
                true
            }
            None => {
                warn!(sample_rate, bpm, resolution, "ignoring unusable tick size");
                false
            }
        }
    }

    /// Recompute the tick size for a new tempo and re-project the frame
    /// position so it points at the same tick. Returns true if anything changed.
    pub fn update_tempo(&mut self, sample_rate: u32, bpm: f32, resolution: u32) -> bool {
        let Some(new_size) = tick_size(sample_rate, bpm, resolution) else {
            warn!(sample_rate, bpm, resolution, "ignoring unusable tick size");
            return false;
        };
        if new_size == self.tick_size {
            return false;
        }
        let tick = self.frames as f64 / self.tick_size as f64;
        self.tick_size = new_size;
        self.frames = (tick * new_size as f64) as u64;
        debug!(tick_size = new_size, frames = self.frames, "tempo change: recomputed tick size and frame position");
        true
    }

    /// Tick containing `frame`.
    pub fn frame_to_tick(&self, frame: u64) -> u64 {
        (frame as f64 / self.tick_size as f64) as u64
    }

    /// First frame of `tick`.
    pub fn tick_to_frame(&self, tick: u64) -> u64 {
        (tick as f64 * self.tick_size as f64) as u64
    }

    /// Tick at the current frame position.
    pub fn tick(&self) -> u64 {
        self.frame_to_tick(self.frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_size_at_120_bpm() {
        assert_eq!(tick_size(48000, 120.0, 48), Some(500.0));
        assert_eq!(tick_size(44100, 120.0, 48), Some(459.375));
    }

    #[test]
    fn tick_size_rejects_degenerate_tempo() {
        assert_eq!(tick_size(48000, 0.0, 48), None);
        assert_eq!(tick_size(48000, 120.0, 0), None);
        assert_eq!(tick_size(0, 120.0, 48), None);
        assert_eq!(tick_size(48000, f32::NAN, 48), None);
    }

    #[test]
    fn tick_size_positive_across_ranges() {
        for &sr in &[22050, 44100, 48000, 96000, 192000] {
            for bpm in (30..=300).step_by(7) {
                for &res in &[24, 48, 96, 192] {
                    let size = tick_size(sr, bpm as f32, res).unwrap();
                    assert!(size > 0.0, "sr={sr} bpm={bpm} res={res}");
                }
            }
        }
    }

    #[test]
    fn frame_tick_round_trip_within_one_tick() {
        let mut t = Transport::new();
        t.reset_tick_size(44100, 133.0, 48);
        for frame in (0..2_000_000u64).step_by(9_973) {
            let back = t.tick_to_frame(t.frame_to_tick(frame));
            assert!(back <= frame);
            assert!((frame - back) as f32 <= t.tick_size());
        }
    }

    #[test]
    fn tempo_change_keeps_tick_position() {
        let mut t = Transport::new();
        t.reset_tick_size(48000, 120.0, 48);
        t.set_frames(5000);
        assert_eq!(t.tick(), 10);

        assert!(t.update_tempo(48000, 240.0, 48));
        assert_eq!(t.tick_size(), 250.0);
        assert_eq!(t.frames(), 2500);
        assert_eq!(t.tick(), 10);
    }

    #[test]
    fn tempo_change_is_quiet_at_info() {
        let mut t = Transport::new();
        t.reset_tick_size(48000, 120.0, 48);
        let logged = crate::test_log::capture_info(|| {
            assert!(t.update_tempo(48000, 90.0, 48));
        });
        assert_eq!(logged, "");
    }

    #[test]
    fn unchanged_tempo_is_a_no_op() {
        let mut t = Transport::new();
        t.reset_tick_size(48000, 120.0, 48);
        t.set_frames(1234);
        assert!(!t.update_tempo(48000, 120.0, 48));
        assert_eq!(t.frames(), 1234);
    }

    #[test]
    fn invalid_tempo_keeps_old_tick_size() {
        let mut t = Transport::new();
        t.reset_tick_size(48000, 120.0, 48);
        assert!(!t.update_tempo(48000, 0.0, 48));
        assert!(!t.reset_tick_size(48000, 120.0, 0));
        assert_eq!(t.tick_size(), 500.0);
    }
}
