//! Instrument, layer and envelope types.

use alloc::sync::Arc;
use arrayvec::{ArrayString, ArrayVec};

use crate::sample::Sample;

/// Maximum number of velocity layers per instrument.
pub const MAX_LAYERS: usize = 16;

/// An instrument definition.
#[derive(Clone, Debug)]
pub struct Instrument {
    /// Instrument name
    pub name: ArrayString<32>,
    /// Output gain, 0.0 - 1.0
    pub volume: f32,
    /// Left pan gain
    pub pan_l: f32,
    /// Right pan gain
    pub pan_r: f32,
    pub muted: bool,
    /// Scale of the random pitch offset applied when a note starts (semitones)
    pub random_pitch_factor: f32,
    /// Amplitude envelope
    pub adsr: Adsr,
    layers: ArrayVec<InstrumentLayer, MAX_LAYERS>,
}

impl Default for Instrument {
    fn default() -> Self {
        Self {
            name: ArrayString::new(),
            volume: 1.0,
            pan_l: 1.0,
            pan_r: 1.0,
            muted: false,
            random_pitch_factor: 0.0,
            adsr: Adsr::default(),
            layers: ArrayVec::new(),
        }
    }
}

impl Instrument {
    /// Create a new instrument with default settings.
    pub fn new(name: &str) -> Self {
        let mut inst = Self::default();
        let _ = inst.name.try_push_str(name);
        inst
    }

    /// Create an instrument playing a single sample across the whole velocity range.
    pub fn with_sample(name: &str, sample: Arc<Sample>) -> Self {
        let mut inst = Self::new(name);
        let _ = inst.add_layer(InstrumentLayer::new(sample));
        inst
    }

    /// Add a velocity layer. Returns the layer back if all slots are taken.
    pub fn add_layer(&mut self, layer: InstrumentLayer) -> Result<(), InstrumentLayer> {
        self.layers.try_push(layer).map_err(|e| e.element())
    }

    pub fn layers(&self) -> &[InstrumentLayer] {
        &self.layers
    }

    /// First layer whose velocity window contains `velocity`.
    pub fn layer_for_velocity(&self, velocity: f32) -> Option<&InstrumentLayer> {
        self.layers
            .iter()
            .find(|l| velocity >= l.start_velocity && velocity <= l.end_velocity)
    }
}

/// One velocity-switched sample slot.
#[derive(Clone, Debug)]
pub struct InstrumentLayer {
    /// Lowest velocity that selects this layer
    pub start_velocity: f32,
    /// Highest velocity that selects this layer
    pub end_velocity: f32,
    /// Layer gain
    pub gain: f32,
    pub sample: Arc<Sample>,
}

impl InstrumentLayer {
    /// A full-range layer at unity gain.
    pub fn new(sample: Arc<Sample>) -> Self {
        Self {
            start_velocity: 0.0,
            end_velocity: 1.0,
            gain: 1.0,
            sample,
        }
    }

    /// Builder: restrict the velocity window.
    pub fn with_range(mut self, start: f32, end: f32) -> Self {
        self.start_velocity = start;
        self.end_velocity = end;
        self
    }
}

/// Attack/decay/sustain/release envelope. Times are in frames.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Adsr {
    pub attack: u32,
    pub decay: u32,
    /// Sustain level, 0.0 - 1.0
    pub sustain: f32,
    pub release: u32,
}

impl Default for Adsr {
    /// Percussive default: instant attack, full sustain, short release.
    fn default() -> Self {
        Self {
            attack: 0,
            decay: 0,
            sustain: 1.0,
            release: 1000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    fn sample() -> Arc<Sample> {
        Arc::new(Sample::from_mono("s", 48000, vec![1.0; 8]))
    }

    #[test]
    fn layer_selection_by_velocity() {
        let mut inst = Instrument::new("snare");
        inst.add_layer(InstrumentLayer::new(sample()).with_range(0.0, 0.5)).unwrap();
        let mut loud = InstrumentLayer::new(sample()).with_range(0.5, 1.0);
        loud.gain = 0.7;
        inst.add_layer(loud).unwrap();

        assert_eq!(inst.layer_for_velocity(0.2).unwrap().gain, 1.0);
        assert_eq!(inst.layer_for_velocity(0.9).unwrap().gain, 0.7);
    }

    #[test]
    fn no_layers_selects_nothing() {
        let inst = Instrument::new("empty");
        assert!(inst.layer_for_velocity(0.5).is_none());
    }

    #[test]
    fn layer_slots_are_bounded() {
        let mut inst = Instrument::new("full");
        for _ in 0..MAX_LAYERS {
            assert!(inst.add_layer(InstrumentLayer::new(sample())).is_ok());
        }
        assert!(inst.add_layer(InstrumentLayer::new(sample())).is_err());
        assert_eq!(inst.layers().len(), MAX_LAYERS);
    }
}
