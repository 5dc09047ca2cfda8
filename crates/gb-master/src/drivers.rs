//! Starting and stopping the audio and MIDI drivers.

use gb_audio::{
    open_backend, open_midi_backend, AudioOutput, ChannelMidiInput, DriverKind, DriverName, MidiDriverName,
    MidiHandler, MidiInput, NullDriver,
};
use tracing::{error, info, warn};

use crate::engine::Engine;
use crate::error::Result;
use crate::events::{EngineEvent, ErrorCode};
use crate::process;
use crate::state::EngineState;

/// Name the virtual MIDI input reports.
const VIRTUAL_MIDI_NAME: &str = "groovebox virtual input";

fn null_driver(sample_rate: u32, buffer_size: usize) -> Box<dyn AudioOutput> {
    let mut driver = NullDriver::new(sample_rate);
    let _ = driver.init(buffer_size);
    Box::new(driver)
}

impl Engine {
    /// Open the configured audio driver (and MIDI input) and connect the
    /// engine: `Initialized → Prepared | Ready`.
    ///
    /// A driver that cannot be started is replaced by the null driver and
    /// reported through [`EngineEvent::Error`].
    pub fn start_audio_drivers(&mut self) -> Result<()> {
        let (name, sample_rate, buffer_size) = {
            let core = self.handle.lock();
            core.require("start_audio_drivers", &[EngineState::Initialized])?;
            let prefs = core.preferences();
            (prefs.audio_driver.clone(), prefs.sample_rate, prefs.buffer_size)
        };

        let driver = match name.parse::<DriverName>() {
            Ok(parsed) => match open_backend(parsed, sample_rate, buffer_size) {
                Ok(driver) => driver,
                Err(e) => {
                    error!(driver = %parsed, error = %e, "error starting audio driver, using null driver");
                    self.handle.events.push(EngineEvent::Error(ErrorCode::ErrorStartingDriver));
                    null_driver(sample_rate, buffer_size)
                }
            },
            Err(e) => {
                error!(error = %e, "unknown audio driver, using null driver");
                self.handle.events.push(EngineEvent::Error(ErrorCode::UnknownDriver));
                self.handle.events.push(EngineEvent::Error(ErrorCode::ErrorStartingDriver));
                null_driver(sample_rate, buffer_size)
            }
        };
        self.start_with_driver(driver)
    }

    /// Connect the engine to `driver`, initializing it first if needed.
    ///
    /// Falls back to the null driver if `driver` fails to initialize or connect.
    pub fn start_with_driver(&mut self, mut driver: Box<dyn AudioOutput>) -> Result<()> {
        let (sample_rate, buffer_size) = {
            let core = self.handle.lock();
            core.require("start_audio_drivers", &[EngineState::Initialized])?;
            (core.preferences().sample_rate, core.preferences().buffer_size)
        };

        if driver.buffer_size() == 0 {
            if let Err(e) = driver.init(buffer_size) {
                error!(driver = driver.name(), error = %e, "error initializing audio driver, using null driver");
                self.handle.events.push(EngineEvent::Error(ErrorCode::ErrorStartingDriver));
                driver = null_driver(sample_rate, buffer_size);
            }
        }

        self.handle.lock().attach_driver(
            driver.transport().clone(),
            driver.sample_rate(),
            driver.buffer_size(),
        )?;

        if let Err(e) = self.connect(driver.as_mut()) {
            error!(driver = driver.name(), error = %e, "error connecting audio driver, using null driver");
            self.handle.events.push(EngineEvent::Error(ErrorCode::ErrorStartingDriver));
            driver = null_driver(sample_rate, buffer_size);
            self.handle.lock().driver = Some(driver.transport().clone());
            self.connect(driver.as_mut())?;
        }
        info!(
            driver = driver.name(),
            sample_rate = driver.sample_rate(),
            buffer_size = driver.buffer_size(),
            "audio driver started"
        );
        self.driver = Some(driver);

        self.start_midi();
        Ok(())
    }

    fn connect(&self, driver: &mut dyn AudioOutput) -> gb_audio::Result<()> {
        let callback = process::callback(
            self.handle.core.clone(),
            driver.transport().clone(),
            driver.kind(),
            self.handle.events.clone(),
        );
        driver.connect(callback)
    }

    fn start_midi(&mut self) {
        let (name, port) = {
            let core = self.handle.lock();
            let prefs = core.preferences();
            (prefs.midi_driver.clone(), prefs.midi_port.clone())
        };
        let mut input: Box<dyn MidiInput> = match name.parse::<MidiDriverName>() {
            Ok(MidiDriverName::None) => return,
            Ok(MidiDriverName::Channel) => {
                let (input, sender) = ChannelMidiInput::new(VIRTUAL_MIDI_NAME);
                self.midi_sender = Some(sender);
                Box::new(input)
            }
            Ok(MidiDriverName::Midir) => match open_midi_backend(port) {
                Ok(input) => input,
                Err(e) => {
                    warn!(error = %e, "MIDI input unavailable");
                    return;
                }
            },
            Err(e) => {
                warn!(error = %e, "unknown MIDI driver");
                return;
            }
        };

        let handle = self.handle.clone();
        let handler: MidiHandler = Box::new(move |message| handle.handle_midi(message));
        match input.open(handler) {
            Ok(()) => {
                info!(input = input.name(), "MIDI input open");
                self.midi = Some(input);
            }
            Err(e) => {
                warn!(input = input.name(), error = %e, "failed to open MIDI input");
                self.midi_sender = None;
            }
        }
    }

    /// Disconnect and drop the drivers: `Prepared | Ready → Initialized`,
    /// stopping playback first.
    ///
    /// The driver is disconnected outside the engine lock so a callback
    /// in flight can finish.
    pub fn stop_audio_drivers(&mut self) -> Result<()> {
        self.handle.lock().detach_driver()?;

        if let Some(mut midi) = self.midi.take() {
            midi.close();
        }
        self.midi_sender = None;

        if let Some(mut driver) = self.driver.take() {
            driver.disconnect();
            info!(driver = driver.name(), "audio driver stopped");
        }
        Ok(())
    }

    /// Stop the drivers if they run, then start them again from the preferences.
    pub fn restart_audio_drivers(&mut self) -> Result<()> {
        if self.driver.is_some() {
            self.stop_audio_drivers()?;
        }
        self.start_audio_drivers()
    }

    /// Kind of the connected audio driver.
    pub fn driver_kind(&self) -> Option<DriverKind> {
        self.driver.as_ref().map(|d| d.kind())
    }
}
