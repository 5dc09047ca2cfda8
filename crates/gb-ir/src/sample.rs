//! Sample data types.

use alloc::vec::Vec;
use arrayvec::ArrayString;

/// Frequency of the built-in metronome click.
const CLICK_HZ: f32 = 1760.0;
/// Length of the built-in metronome click in seconds.
const CLICK_SECONDS: f32 = 0.03;

/// A decoded stereo sample, planar `f32`.
#[derive(Clone, Debug, Default)]
pub struct Sample {
    /// Sample name
    pub name: ArrayString<32>,
    /// Rate the data was recorded at
    pub sample_rate: u32,
    left: Vec<f32>,
    right: Vec<f32>,
}

impl Sample {
    /// Build a sample from separate left/right planes.
    ///
    /// The shorter plane is padded with silence.
    pub fn from_planes(name: &str, sample_rate: u32, mut left: Vec<f32>, mut right: Vec<f32>) -> Self {
        let len = left.len().max(right.len());
        left.resize(len, 0.0);
        right.resize(len, 0.0);
        let mut sample_name = ArrayString::new();
        let _ = sample_name.try_push_str(name);
        Self {
            name: sample_name,
            sample_rate,
            left,
            right,
        }
    }

    /// Build a sample by duplicating a mono plane to both channels.
    pub fn from_mono(name: &str, sample_rate: u32, data: Vec<f32>) -> Self {
        let right = data.clone();
        Self::from_planes(name, sample_rate, data, right)
    }

    /// Synthesize the metronome click: a short exponentially decaying sine.
    pub fn click(sample_rate: u32) -> Self {
        let frames = (sample_rate as f32 * CLICK_SECONDS) as usize;
        let sr = sample_rate.max(1) as f32;
        let data = (0..frames)
            .map(|i| {
                let t = i as f32 / sr;
                let env = libm::expf(-t / (CLICK_SECONDS / 5.0));
                libm::sinf(2.0 * core::f32::consts::PI * CLICK_HZ * t) * env
            })
            .collect();
        Self::from_mono("click", sample_rate, data)
    }

    /// Length in frames.
    pub fn len(&self) -> usize {
        self.left.len()
    }

    /// Returns true if the sample has no data.
    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    pub fn left(&self) -> &[f32] {
        &self.left
    }

    pub fn right(&self) -> &[f32] {
        &self.right
    }

    /// Linearly interpolated stereo frame at a fractional position.
    ///
    /// Positions past the end read as silence.
    pub fn frame_at(&self, pos: f64) -> (f32, f32) {
        if pos < 0.0 {
            return (0.0, 0.0);
        }
        let idx = pos as usize;
        let frac = (pos - idx as f64) as f32;
        let read = |plane: &[f32]| {
            let a = plane.get(idx).copied().unwrap_or(0.0);
            let b = plane.get(idx + 1).copied().unwrap_or(0.0);
            a + (b - a) * frac
        };
        (read(&self.left), read(&self.right))
    }
}
