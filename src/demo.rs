//! A small drum song built in memory: synthesized kit, two patterns.

use std::f32::consts::PI;
use std::sync::Arc;

use gb_master::{Instrument, InstrumentRef, Note, Pattern, Sample, Song, MAX_NOTES};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

const KIT_RATE: u32 = 44100;
const KICK: usize = 0;
const SNARE: usize = 1;
const HAT: usize = 2;

/// Render `seconds` of `f(t, noise)` into a mono sample.
fn synth(name: &str, seconds: f32, rng: &mut SmallRng, f: impl Fn(f32, f32) -> f32) -> Arc<Sample> {
    let frames = (KIT_RATE as f32 * seconds) as usize;
    let data = (0..frames)
        .map(|i| f(i as f32 / KIT_RATE as f32, rng.gen_range(-1.0..1.0)))
        .collect();
    Arc::new(Sample::from_mono(name, KIT_RATE, data))
}

fn kit() -> Vec<Instrument> {
    let mut rng = SmallRng::seed_from_u64(0x6b1d);
    let kick = synth("kick", 0.35, &mut rng, |t, _| {
        let freq = 50.0 + 100.0 * (-t * 30.0).exp();
        (2.0 * PI * freq * t).sin() * (-t * 9.0).exp()
    });
    let snare = synth("snare", 0.2, &mut rng, |t, noise| {
        let tone = (2.0 * PI * 180.0 * t).sin() * 0.4;
        (tone + noise * 0.6) * (-t * 20.0).exp()
    });
    let hat = synth("hat", 0.06, &mut rng, |t, noise| noise * 0.5 * (-t * 70.0).exp());

    let mut hat = Instrument::with_sample("hat", hat);
    hat.volume = 0.6;
    hat.random_pitch_factor = 0.2;
    vec![
        Instrument::with_sample("kick", kick),
        Instrument::with_sample("snare", snare),
        hat,
    ]
}

fn hit(pattern: &mut Pattern, tick: u32, instrument: usize, velocity: f32) {
    pattern.insert(tick, Note::new(InstrumentRef::Song(instrument), 0, velocity));
}

fn beat() -> Pattern {
    let mut p = Pattern::new("beat", MAX_NOTES);
    for tick in (0..MAX_NOTES).step_by(24) {
        let accent = if tick % 48 == 0 { 0.8 } else { 0.5 };
        hit(&mut p, tick, HAT, accent);
    }
    hit(&mut p, 0, KICK, 1.0);
    hit(&mut p, 96, KICK, 0.9);
    hit(&mut p, 120, KICK, 0.6);
    hit(&mut p, 48, SNARE, 0.9);
    hit(&mut p, 144, SNARE, 0.9);
    p
}

fn fill() -> Pattern {
    let mut p = Pattern::new("fill", MAX_NOTES);
    hit(&mut p, 0, KICK, 1.0);
    hit(&mut p, 96, KICK, 0.9);
    hit(&mut p, 48, SNARE, 0.9);
    for (i, tick) in (120..MAX_NOTES).step_by(12).enumerate() {
        hit(&mut p, tick, SNARE, 0.5 + 0.08 * i as f32);
    }
    p
}

/// Four bars: three of the beat, one fill.
pub fn song() -> Song {
    let mut song = Song::new("demo");
    song.bpm = 110.0;
    song.instruments = kit();
    song.set_swing(0.2);
    song.set_humanize_velocity(0.1);
    let beat = song.add_pattern(beat());
    let fill = song.add_pattern(fill());
    for _ in 0..3 {
        song.add_column(&[beat]);
    }
    song.add_column(&[fill]);
    song
}
