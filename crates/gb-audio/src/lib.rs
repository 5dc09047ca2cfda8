//! Audio and MIDI driver backends for the groovebox drum sequencer.
//!
//! Every backend calls a single process callback once per block and exposes
//! a shared transport handle. Hardware backends sit behind cargo features.

mod backend;
mod disk_writer;
mod fake_driver;
mod midi;
mod midi_channel;
mod null_driver;
mod traits;
mod transport;

#[cfg(feature = "cpal")]
mod cpal_backend;
#[cfg(feature = "midir")]
mod midir_backend;

pub use backend::{open_backend, open_midi_backend, DriverName, MidiDriverName};
pub use disk_writer::{DiskWriterDriver, RenderProgress};
pub use fake_driver::{FakeClock, FakeDriver, FakeMode};
pub use midi::{MidiError, MidiHandler, MidiInput, MidiMessage};
pub use midi_channel::{ChannelMidiInput, MidiSender};
pub use null_driver::NullDriver;
pub use traits::{
    AudioOutput, DriverError, DriverKind, ProcessBlock, ProcessCallback, ProcessStatus, Result,
};
pub use transport::{TransportHandle, TransportSnapshot};

#[cfg(feature = "cpal")]
pub use cpal_backend::CpalDriver;
#[cfg(feature = "midir")]
pub use midir_backend::MidirInput;
