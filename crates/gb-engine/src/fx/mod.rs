//! Send-effect rack.
//!
//! Each slot holds an effect processor with its own block buffer. Per
//! block the main mix is copied into the slot buffer, processed, and the
//! wet result is summed back into the main mix.

mod lowpass;

pub use lowpass::LowPass;

use gb_ir::AudioBuffer;

/// Number of effect slots.
pub const MAX_FX: usize = 4;

/// Static metadata about an effect.
pub struct FxInfo {
    pub name: &'static str,
    pub short_name: &'static str,
}

/// Core trait for block effects.
pub trait FxProcessor: Send {
    fn info(&self) -> &FxInfo;
    /// Called before the first block and whenever the output rate changes.
    fn activate(&mut self, sample_rate: u32);
    /// Process one block in place.
    fn process(&mut self, left: &mut [f32], right: &mut [f32]);
    /// Forget any internal state.
    fn reset(&mut self);
}

/// Create an effect by name.
pub fn create_fx(name: &str) -> Option<Box<dyn FxProcessor>> {
    match name {
        "Low Pass" | "lowpass" => Some(Box::new(LowPass::new())),
        _ => None,
    }
}

/// One occupied slot of the rack.
pub struct FxSlot {
    processor: Box<dyn FxProcessor>,
    pub enabled: bool,
    /// Gain of the processed signal summed back into the main mix
    pub wet: f32,
    buffer: AudioBuffer,
    peak_l: f32,
    peak_r: f32,
}

impl FxSlot {
    pub fn name(&self) -> &'static str {
        self.processor.info().name
    }

    /// Peak output since the last reset.
    pub fn peaks(&self) -> (f32, f32) {
        (self.peak_l, self.peak_r)
    }
}

/// Fixed set of effect slots.
pub struct FxRack {
    slots: heapless::Vec<FxSlot, MAX_FX>,
    sample_rate: u32,
    frames: usize,
}

impl FxRack {
    pub fn new(sample_rate: u32, frames: usize) -> Self {
        Self {
            slots: heapless::Vec::new(),
            sample_rate,
            frames,
        }
    }

    /// Install an effect. Returns it back if the rack is full.
    pub fn insert(&mut self, mut processor: Box<dyn FxProcessor>) -> Result<usize, Box<dyn FxProcessor>> {
        if self.slots.is_full() {
            return Err(processor);
        }
        processor.activate(self.sample_rate);
        let slot = FxSlot {
            processor,
            enabled: true,
            wet: 0.5,
            buffer: AudioBuffer::stereo(self.frames),
            peak_l: 0.0,
            peak_r: 0.0,
        };
        let index = self.slots.len();
        if let Err(slot) = self.slots.push(slot) {
            return Err(slot.processor);
        }
        Ok(index)
    }

    pub fn slot(&self, index: usize) -> Option<&FxSlot> {
        self.slots.get(index)
    }

    pub fn slot_mut(&mut self, index: usize) -> Option<&mut FxSlot> {
        self.slots.get_mut(index)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Change the block length of every slot buffer. Reallocates.
    pub fn resize(&mut self, frames: usize) {
        self.frames = frames;
        for slot in self.slots.iter_mut() {
            slot.buffer.resize(frames);
        }
    }

    /// Re-activate every effect at a new output rate.
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate;
        for slot in self.slots.iter_mut() {
            slot.processor.activate(sample_rate);
        }
    }

    /// Zero every slot buffer.
    pub fn silence(&mut self) {
        for slot in self.slots.iter_mut() {
            slot.buffer.silence();
        }
    }

    /// Run every enabled effect on `main` and sum the wet signal back.
    pub fn process(&mut self, main: &mut AudioBuffer) {
        for slot in self.slots.iter_mut().filter(|s| s.enabled) {
            slot.buffer.copy_from(main);
            let (left, right) = slot.buffer.stereo_mut();
            slot.processor.process(left, right);
            slot.peak_l = slot.buffer.peak(0, slot.peak_l);
            slot.peak_r = slot.buffer.peak(1, slot.peak_r);
            main.mix_from_scaled(&slot.buffer, slot.wet);
        }
    }

    /// Peaks of slot `index`, optionally clearing them.
    pub fn take_peaks(&mut self, index: usize, reset: bool) -> Option<(f32, f32)> {
        let slot = self.slots.get_mut(index)?;
        let peaks = (slot.peak_l, slot.peak_r);
        if reset {
            slot.peak_l = 0.0;
            slot.peak_r = 0.0;
        }
        Some(peaks)
    }

    /// Clear effect state, e.g. after a seek.
    pub fn reset(&mut self) {
        for slot in self.slots.iter_mut() {
            slot.processor.reset();
        }
    }
}
