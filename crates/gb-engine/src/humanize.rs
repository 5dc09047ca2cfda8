//! Swing and humanize offsets.
//!
//! All randomness goes through a caller-supplied RNG so tests can seed it.

use rand::Rng;

/// Largest humanize-time delay in frames at full strength.
pub const MAX_HUMANIZE_DELAY: f32 = 2000.0;
/// Swing applies on positions that are multiples of this...
pub const SWING_GRID: u32 = 12;
/// ...but not of this.
pub const SWING_BEAT: u32 = 24;
/// Swing delay at full strength, in ticks.
pub const SWING_TICKS: f32 = 6.0;
/// Gaussian spread for humanize-time.
pub const HUMANIZE_TIME_SPREAD: f32 = 0.3;
/// Gaussian spread for humanize-velocity and random pitch.
pub const HUMANIZE_VELOCITY_SPREAD: f32 = 0.2;
/// Pitch deviation in semitones at a random-pitch factor of 1.
pub const MAX_PITCH_DEVIATION: f32 = 2.0;

/// Polar-method normal deviate scaled by `z` and centered on 0.5.
pub fn gaussian<R: Rng + ?Sized>(rng: &mut R, z: f32) -> f32 {
    let (x1, w) = loop {
        let x1: f32 = rng.gen_range(-1.0..1.0);
        let x2: f32 = rng.gen_range(-1.0..1.0);
        let w = x1 * x1 + x2 * x2;
        if w < 1.0 && w > 0.0 {
            break (x1, w);
        }
    };
    let w = ((-2.0 * w.ln()) / w).sqrt();
    x1 * w * z + 0.5
}

/// Swing delay in frames for a pattern position.
pub fn swing_offset(pattern_pos: u32, tick_size: f32, swing: f32) -> i32 {
    if pattern_pos % SWING_GRID == 0 && pattern_pos % SWING_BEAT != 0 {
        (SWING_TICKS * tick_size * swing) as i32
    } else {
        0
    }
}

/// Humanize-time delay in frames. Exactly 0 when `amount` is 0.
pub fn time_offset<R: Rng + ?Sized>(rng: &mut R, amount: f32) -> i32 {
    if amount == 0.0 {
        return 0;
    }
    (gaussian(rng, HUMANIZE_TIME_SPREAD) * amount * MAX_HUMANIZE_DELAY) as i32
}

/// Jittered velocity, clamped to `[0, 1]`. Unchanged when `amount` is 0.
pub fn velocity<R: Rng + ?Sized>(rng: &mut R, velocity: f32, amount: f32) -> f32 {
    if amount == 0.0 {
        return velocity;
    }
    let random = amount * gaussian(rng, HUMANIZE_VELOCITY_SPREAD);
    (velocity + random - amount / 2.0).clamp(0.0, 1.0)
}

/// Random pitch offset in semitones for an instrument's random-pitch factor.
pub fn pitch_offset<R: Rng + ?Sized>(rng: &mut R, factor: f32) -> f32 {
    if factor == 0.0 {
        return 0.0;
    }
    (MAX_PITCH_DEVIATION * gaussian(rng, HUMANIZE_VELOCITY_SPREAD) - MAX_PITCH_DEVIATION / 2.0) * factor
}
