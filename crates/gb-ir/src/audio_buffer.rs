//! Stereo-capable f32 block buffer with planar layout.

use alloc::vec;
use alloc::vec::Vec;

/// Number of channels in the master mix.
pub const STEREO: u16 = 2;

/// A multichannel f32 audio buffer in planar layout.
///
/// Data is stored as `channels` contiguous planes of `frames` samples each.
/// `data[ch * frames + frame]` gives the sample for channel `ch` at `frame`.
#[derive(Clone, Debug)]
pub struct AudioBuffer {
    data: Vec<f32>,
    channels: u16,
    frames: usize,
}

impl AudioBuffer {
    /// Create a new silent buffer with the given dimensions.
    pub fn new(channels: u16, frames: usize) -> Self {
        Self {
            data: vec![0.0; channels as usize * frames],
            channels,
            frames,
        }
    }

    /// Create a silent stereo buffer.
    pub fn stereo(frames: usize) -> Self {
        Self::new(STEREO, frames)
    }

    /// Change the block length. Reallocates, so keep it off the steady-state path.
    pub fn resize(&mut self, frames: usize) {
        if frames == self.frames {
            return;
        }
        self.frames = frames;
        self.data = vec![0.0; self.channels as usize * frames];
    }

    /// Fill all samples with zero.
    pub fn silence(&mut self) {
        self.data.fill(0.0);
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Read-only access to one channel's sample data.
    pub fn channel(&self, ch: u16) -> &[f32] {
        let start = ch as usize * self.frames;
        &self.data[start..start + self.frames]
    }

    /// Mutable access to one channel's sample data.
    pub fn channel_mut(&mut self, ch: u16) -> &mut [f32] {
        let start = ch as usize * self.frames;
        let len = self.frames;
        &mut self.data[start..start + len]
    }

    /// Split a stereo buffer into its left and right planes.
    pub fn stereo_mut(&mut self) -> (&mut [f32], &mut [f32]) {
        debug_assert!(self.channels >= STEREO);
        let (left, rest) = self.data.split_at_mut(self.frames);
        (left, &mut rest[..self.frames])
    }

    /// Sum overlapping channels from `source` into this buffer with gain.
    pub fn mix_from_scaled(&mut self, source: &AudioBuffer, gain: f32) {
        let chs = self.channels.min(source.channels);
        let frs = self.frames.min(source.frames);
        for ch in 0..chs {
            let dst = self.channel_mut(ch);
            let src = source.channel(ch);
            for i in 0..frs {
                dst[i] += src[i] * gain;
            }
        }
    }

    /// Overwrite overlapping channels with `source`; anything beyond it is silenced.
    pub fn copy_from(&mut self, source: &AudioBuffer) {
        self.silence();
        let chs = self.channels.min(source.channels);
        let frs = self.frames.min(source.frames);
        for ch in 0..chs {
            self.channel_mut(ch)[..frs].copy_from_slice(&source.channel(ch)[..frs]);
        }
    }

    /// Largest positive sample in a channel, floored at `floor`.
    ///
    /// Meters only follow the positive half-wave.
    pub fn peak(&self, ch: u16, floor: f32) -> f32 {
        self.channel(ch).iter().fold(floor, |peak, &s| if s > peak { s } else { peak })
    }
}
