//! Voice: one sounding sample with its envelope.

use std::sync::Arc;

use gb_ir::{Adsr, InstrumentRef, Sample};

/// Envelope segment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EnvelopeStage {
    #[default]
    Attack,
    Decay,
    Sustain,
    Release,
    Idle,
}

/// Linear ADSR evaluator, advanced one frame at a time.
#[derive(Clone, Debug)]
pub struct AdsrState {
    params: Adsr,
    stage: EnvelopeStage,
    /// Frames spent in the current stage.
    elapsed: u32,
    value: f32,
    /// Level the release ramps down from.
    release_from: f32,
}

impl AdsrState {
    pub fn new(params: Adsr) -> Self {
        Self {
            params,
            stage: EnvelopeStage::Attack,
            elapsed: 0,
            value: 0.0,
            release_from: 0.0,
        }
    }

    pub fn stage(&self) -> EnvelopeStage {
        self.stage
    }

    pub fn is_idle(&self) -> bool {
        self.stage == EnvelopeStage::Idle
    }

    /// Gate off: ramp from the current level to zero.
    pub fn release(&mut self) {
        if matches!(self.stage, EnvelopeStage::Release | EnvelopeStage::Idle) {
            return;
        }
        self.release_from = self.value;
        self.stage = EnvelopeStage::Release;
        self.elapsed = 0;
    }

    /// Advance one frame and return the new level.
    pub fn next_value(&mut self) -> f32 {
        let p = self.params;
        loop {
            match self.stage {
                EnvelopeStage::Attack => {
                    if self.elapsed >= p.attack {
                        self.stage = EnvelopeStage::Decay;
                        self.elapsed = 0;
                        continue;
                    }
                    self.value = (self.elapsed + 1) as f32 / p.attack as f32;
                }
                EnvelopeStage::Decay => {
                    if self.elapsed >= p.decay {
                        self.stage = EnvelopeStage::Sustain;
                        self.elapsed = 0;
                        continue;
                    }
                    let t = (self.elapsed + 1) as f32 / p.decay as f32;
                    self.value = 1.0 + (p.sustain - 1.0) * t;
                }
                EnvelopeStage::Sustain => {
                    self.value = p.sustain;
                    return self.value;
                }
                EnvelopeStage::Release => {
                    if self.elapsed >= p.release {
                        self.stage = EnvelopeStage::Idle;
                        continue;
                    }
                    let t = (self.elapsed + 1) as f32 / p.release as f32;
                    self.value = self.release_from * (1.0 - t);
                }
                EnvelopeStage::Idle => {
                    self.value = 0.0;
                    return 0.0;
                }
            }
            self.elapsed += 1;
            return self.value;
        }
    }
}

/// A single voice producing audio from a sample.
#[derive(Clone, Debug)]
pub struct Voice {
    /// Instrument that started the voice, for note-off.
    pub instrument: InstrumentRef,
    sample: Arc<Sample>,
    /// Fractional read position in sample frames.
    position: f64,
    /// Sample frames advanced per output frame.
    increment: f64,
    gain_l: f32,
    gain_r: f32,
    /// Output frames to wait before the first sample.
    delay: u32,
    /// Output frames until an automatic release, for notes with a length.
    release_in: Option<u64>,
    envelope: AdsrState,
    playing: bool,
}

impl Voice {
    pub fn new(instrument: InstrumentRef, sample: Arc<Sample>, increment: f64, adsr: Adsr) -> Self {
        Self {
            instrument,
            sample,
            position: 0.0,
            increment,
            gain_l: 1.0,
            gain_r: 1.0,
            delay: 0,
            release_in: None,
            envelope: AdsrState::new(adsr),
            playing: true,
        }
    }

    /// Builder: per-channel output gain.
    pub fn with_gain(mut self, left: f32, right: f32) -> Self {
        self.gain_l = left;
        self.gain_r = right;
        self
    }

    /// Builder: frames of silence before the voice starts.
    pub fn with_delay(mut self, frames: u32) -> Self {
        self.delay = frames;
        self
    }

    /// Builder: release automatically after `frames` of sound.
    pub fn with_length(mut self, frames: u64) -> Self {
        self.release_in = Some(frames);
        self
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn release(&mut self) {
        self.envelope.release();
    }

    /// Sum this voice into the output planes.
    pub fn render(&mut self, left: &mut [f32], right: &mut [f32]) {
        let len = self.sample.len() as f64;
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            if !self.playing {
                return;
            }
            if self.delay > 0 {
                self.delay -= 1;
                continue;
            }
            if let Some(remaining) = self.release_in.as_mut() {
                if *remaining == 0 {
                    self.envelope.release();
                    self.release_in = None;
                } else {
                    *remaining -= 1;
                }
            }

            let env = self.envelope.next_value();
            let (sl, sr) = self.sample.frame_at(self.position);
            *l += sl * self.gain_l * env;
            *r += sr * self.gain_r * env;

            self.position += self.increment;
            if self.position >= len || self.envelope.is_idle() {
                self.playing = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_sample(len: usize) -> Arc<Sample> {
        Arc::new(Sample::from_mono("flat", 48000, vec![1.0; len]))
    }

    fn instant() -> Adsr {
        Adsr { attack: 0, decay: 0, sustain: 1.0, release: 4 }
    }

    #[test]
    fn envelope_ramps_through_stages() {
        let mut env = AdsrState::new(Adsr { attack: 2, decay: 2, sustain: 0.5, release: 2 });
        let values: Vec<f32> = (0..5).map(|_| env.next_value()).collect();
        assert_eq!(values, vec![0.5, 1.0, 0.75, 0.5, 0.5]);
        assert_eq!(env.stage(), EnvelopeStage::Sustain);

        env.release();
        assert_eq!(env.next_value(), 0.25);
        assert_eq!(env.next_value(), 0.0);
        assert_eq!(env.next_value(), 0.0);
        assert!(env.is_idle());
    }

    #[test]
    fn voice_plays_sample_to_its_end() {
        let mut v = Voice::new(InstrumentRef::Song(0), flat_sample(3), 1.0, instant());
        let mut l = [0.0; 5];
        let mut r = [0.0; 5];
        v.render(&mut l, &mut r);
        assert_eq!(l, [1.0, 1.0, 1.0, 0.0, 0.0]);
        assert!(!v.is_playing());
    }

    #[test]
    fn delay_shifts_start() {
        let mut v = Voice::new(InstrumentRef::Song(0), flat_sample(8), 1.0, instant())
            .with_delay(2)
            .with_gain(0.5, 0.25);
        let mut l = [0.0; 4];
        let mut r = [0.0; 4];
        v.render(&mut l, &mut r);
        assert_eq!(l, [0.0, 0.0, 0.5, 0.5]);
        assert_eq!(r, [0.0, 0.0, 0.25, 0.25]);
    }

    #[test]
    fn delay_carries_across_blocks() {
        let mut v = Voice::new(InstrumentRef::Song(0), flat_sample(8), 1.0, instant()).with_delay(3);
        let mut l = [0.0; 2];
        let mut r = [0.0; 2];
        v.render(&mut l, &mut r);
        assert_eq!(l, [0.0, 0.0]);
        let mut l = [0.0; 2];
        v.render(&mut l, &mut r);
        assert_eq!(l, [0.0, 1.0]);
    }

    #[test]
    fn note_length_triggers_release() {
        let mut v = Voice::new(InstrumentRef::Song(0), flat_sample(100), 1.0, instant()).with_length(2);
        let mut l = [0.0; 10];
        let mut r = [0.0; 10];
        v.render(&mut l, &mut r);
        assert_eq!(&l[..2], &[1.0, 1.0]);
        assert!(l[2] < 1.0);
        assert!(!v.is_playing());
        assert_eq!(l[9], 0.0);
    }
}
