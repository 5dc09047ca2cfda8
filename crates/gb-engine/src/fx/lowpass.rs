//! One-pole RC low-pass filter.

use core::f32::consts::TAU;

use super::{FxInfo, FxProcessor};

const DEFAULT_CUTOFF: f32 = 4410.0;
const MIN_CUTOFF: f32 = 20.0;

static INFO: FxInfo = FxInfo {
    name: "Low Pass",
    short_name: "LPF",
};

/// `y = y_prev + alpha * (x - y_prev)` per channel.
pub struct LowPass {
    prev_left: f32,
    prev_right: f32,
    alpha: f32,
    cutoff_hz: f32,
    sample_rate: u32,
}

impl Default for LowPass {
    fn default() -> Self {
        Self::new()
    }
}

impl LowPass {
    pub fn new() -> Self {
        Self {
            prev_left: 0.0,
            prev_right: 0.0,
            alpha: 0.0,
            cutoff_hz: DEFAULT_CUTOFF,
            sample_rate: 48000,
        }
    }

    /// Cutoff in Hz, limited to the Nyquist frequency.
    pub fn set_cutoff(&mut self, hz: f32) {
        let nyquist = self.sample_rate as f32 / 2.0;
        self.cutoff_hz = hz.clamp(MIN_CUTOFF, nyquist.max(MIN_CUTOFF));
        self.recompute_alpha();
    }

    pub fn cutoff(&self) -> f32 {
        self.cutoff_hz
    }

    fn recompute_alpha(&mut self) {
        let rc = 1.0 / (TAU * self.cutoff_hz);
        let dt = 1.0 / self.sample_rate.max(1) as f32;
        self.alpha = dt / (rc + dt);
    }
}

impl FxProcessor for LowPass {
    fn info(&self) -> &FxInfo {
        &INFO
    }

    fn activate(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate;
        self.recompute_alpha();
    }

    fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        let alpha = self.alpha;
        let mut prev_l = self.prev_left;
        let mut prev_r = self.prev_right;

        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            prev_l += alpha * (*l - prev_l);
            prev_r += alpha * (*r - prev_r);
            *l = prev_l;
            *r = prev_r;
        }

        self.prev_left = prev_l;
        self.prev_right = prev_r;
    }

    fn reset(&mut self) {
        self.prev_left = 0.0;
        self.prev_right = 0.0;
    }
}
