//! Backend selection by name.

use std::fmt;
use std::str::FromStr;

use tracing::{info, warn};

use crate::fake_driver::FakeDriver;
use crate::midi::{MidiError, MidiInput};
use crate::null_driver::NullDriver;
use crate::traits::{AudioOutput, DriverError, Result};

/// Audio driver named in the preferences.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriverName {
    /// First hardware backend that opens.
    Auto,
    Cpal,
    Fake,
    Null,
    DiskWriter,
}

impl DriverName {
    /// Hardware backends tried by `Auto`, in order.
    pub const AUTO_ORDER: &'static [DriverName] = &[DriverName::Cpal];
}

impl FromStr for DriverName {
    type Err = DriverError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(DriverName::Auto),
            "cpal" => Ok(DriverName::Cpal),
            "fake" => Ok(DriverName::Fake),
            "null" => Ok(DriverName::Null),
            "diskwriter" | "disk" => Ok(DriverName::DiskWriter),
            _ => Err(DriverError::UnknownDriver(s.to_string())),
        }
    }
}

impl fmt::Display for DriverName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DriverName::Auto => "Auto",
            DriverName::Cpal => "Cpal",
            DriverName::Fake => "Fake",
            DriverName::Null => "Null",
            DriverName::DiskWriter => "DiskWriter",
        };
        f.write_str(name)
    }
}

fn create(name: DriverName, sample_rate: u32) -> Result<Box<dyn AudioOutput>> {
    match name {
        #[cfg(feature = "cpal")]
        DriverName::Cpal => Ok(Box::new(crate::cpal_backend::CpalDriver::new())),
        #[cfg(not(feature = "cpal"))]
        DriverName::Cpal => Err(DriverError::Unavailable("built without the cpal feature")),
        DriverName::Fake => Ok(Box::new(FakeDriver::new(sample_rate))),
        DriverName::Null => Ok(Box::new(NullDriver::new(sample_rate))),
        DriverName::DiskWriter => Err(DriverError::Unavailable("the disk writer is only used for export")),
        DriverName::Auto => Err(DriverError::NoDevice),
    }
}

/// Create and initialize the named backend.
///
/// `Auto` walks [`DriverName::AUTO_ORDER`] and returns the first backend that
/// initializes; `NoDevice` if none does.
pub fn open_backend(name: DriverName, sample_rate: u32, buffer_size: usize) -> Result<Box<dyn AudioOutput>> {
    if name != DriverName::Auto {
        let mut driver = create(name, sample_rate)?;
        driver.init(buffer_size)?;
        return Ok(driver);
    }

    for &candidate in DriverName::AUTO_ORDER {
        match create(candidate, sample_rate).and_then(|mut d| d.init(buffer_size).map(|_| d)) {
            Ok(driver) => {
                info!(driver = driver.name(), "auto-selected audio driver");
                return Ok(driver);
            }
            Err(e) => warn!(driver = %candidate, "driver unavailable: {e}"),
        }
    }
    Err(DriverError::NoDevice)
}

/// MIDI driver named in the preferences.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MidiDriverName {
    None,
    /// Virtual port fed from inside the process.
    Channel,
    Midir,
}

impl FromStr for MidiDriverName {
    type Err = MidiError;

    fn from_str(s: &str) -> std::result::Result<Self, MidiError> {
        match s.to_ascii_lowercase().as_str() {
            "" | "none" => Ok(MidiDriverName::None),
            "channel" | "virtual" => Ok(MidiDriverName::Channel),
            "midir" => Ok(MidiDriverName::Midir),
            _ => Err(MidiError::UnknownDriver(s.to_string())),
        }
    }
}

/// Hardware MIDI input, if compiled in.
pub fn open_midi_backend(port: Option<String>) -> std::result::Result<Box<dyn MidiInput>, MidiError> {
    #[cfg(feature = "midir")]
    {
        Ok(Box::new(crate::midir_backend::MidirInput::new(port)))
    }
    #[cfg(not(feature = "midir"))]
    {
        let _ = port;
        Err(MidiError::Unavailable("built without the midir feature"))
    }
}
