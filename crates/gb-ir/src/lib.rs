//! Core data types for the groovebox drum sequencer.
//!
//! This crate defines the song model shared by the engine and the
//! front ends: songs made of pattern columns, tick-indexed patterns of
//! template notes, instruments with velocity layers, and the planar
//! block buffer the mixer renders into.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod audio_buffer;
mod instrument;
mod note;
mod pattern;
mod sample;
pub mod song;

pub use audio_buffer::{AudioBuffer, STEREO};
pub use instrument::{Adsr, Instrument, InstrumentLayer, MAX_LAYERS};
pub use note::{InstrumentRef, Note};
pub use pattern::{Pattern, PatternKey, PatternList};
pub use sample::Sample;
pub use song::{Song, SongMode, DEFAULT_RESOLUTION, MAX_NOTES};
