//! Hardware MIDI input through `midir`.

use midir::{Ignore, MidiInputConnection};
use tracing::info;

use crate::midi::{MidiError, MidiHandler, MidiInput, MidiMessage};

const CLIENT_NAME: &str = "groovebox";

/// First input port, or the first one whose name contains `port`.
pub struct MidirInput {
    port: Option<String>,
    name: String,
    connection: Option<MidiInputConnection<()>>,
}

impl MidirInput {
    pub fn new(port: Option<String>) -> Self {
        Self {
            port,
            name: String::from("midir"),
            connection: None,
        }
    }
}

impl MidiInput for MidirInput {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&mut self, mut handler: MidiHandler) -> Result<(), MidiError> {
        if self.connection.is_some() {
            return Err(MidiError::AlreadyOpen);
        }
        let mut midi_in =
            midir::MidiInput::new(CLIENT_NAME).map_err(|e| MidiError::Backend(e.to_string()))?;
        midi_in.ignore(Ignore::SysexAndTime);

        let ports = midi_in.ports();
        let port = ports
            .iter()
            .find(|p| match &self.port {
                Some(wanted) => midi_in.port_name(p).is_ok_and(|n| n.contains(wanted.as_str())),
                None => true,
            })
            .ok_or_else(|| MidiError::PortNotFound(self.port.clone().unwrap_or_default()))?;
        let port_name = midi_in.port_name(port).unwrap_or_default();

        let connection = midi_in
            .connect(
                port,
                "groovebox-in",
                move |_stamp, bytes, _| {
                    if let Some(message) = MidiMessage::from_bytes(bytes) {
                        handler(message);
                    }
                },
                (),
            )
            .map_err(|e| MidiError::Backend(e.to_string()))?;

        info!(port = %port_name, "MIDI input connected");
        self.name = port_name;
        self.connection = Some(connection);
        Ok(())
    }

    fn close(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.close();
        }
    }
}
