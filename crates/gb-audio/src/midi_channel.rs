//! Virtual MIDI port fed through a channel.
//!
//! Raw messages pushed through a [`MidiSender`] are parsed and handed to the
//! handler on a dedicated reader thread. Closing the port wakes the thread
//! and joins it.

use std::thread::JoinHandle;

use crossbeam_channel::{bounded, select, Receiver, Sender};
use tracing::{debug, warn};

use crate::midi::{MidiError, MidiHandler, MidiInput, MidiMessage};

const PORT_CAPACITY: usize = 256;

/// Writing end of a [`ChannelMidiInput`].
#[derive(Clone, Debug)]
pub struct MidiSender {
    tx: Sender<Vec<u8>>,
}

impl MidiSender {
    /// Queue raw bytes. Returns false when the port is full or gone.
    pub fn send(&self, bytes: &[u8]) -> bool {
        self.tx.try_send(bytes.to_vec()).is_ok()
    }

    pub fn note_on(&self, channel: u8, note: u8, velocity: u8) -> bool {
        self.send(&[0x90 | (channel & 0x0F), note & 0x7F, velocity & 0x7F])
    }

    pub fn note_off(&self, channel: u8, note: u8) -> bool {
        self.send(&[0x80 | (channel & 0x0F), note & 0x7F, 0])
    }
}

struct Reader {
    shutdown: Sender<()>,
    thread: JoinHandle<()>,
}

pub struct ChannelMidiInput {
    name: String,
    rx: Receiver<Vec<u8>>,
    reader: Option<Reader>,
}

impl ChannelMidiInput {
    pub fn new(name: impl Into<String>) -> (Self, MidiSender) {
        let (tx, rx) = bounded(PORT_CAPACITY);
        let input = Self {
            name: name.into(),
            rx,
            reader: None,
        };
        (input, MidiSender { tx })
    }

    pub fn is_open(&self) -> bool {
        self.reader.is_some()
    }
}

fn read_loop(rx: Receiver<Vec<u8>>, shutdown: Receiver<()>, mut handler: MidiHandler) {
    loop {
        select! {
            recv(shutdown) -> _ => break,
            recv(rx) -> msg => match msg {
                Ok(bytes) => match MidiMessage::from_bytes(&bytes) {
                    Some(message) => handler(message),
                    None => warn!("empty MIDI message"),
                },
                // All senders dropped
                Err(_) => break,
            },
        }
    }
    debug!("MIDI reader thread finished");
}

impl MidiInput for ChannelMidiInput {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&mut self, handler: MidiHandler) -> Result<(), MidiError> {
        if self.reader.is_some() {
            return Err(MidiError::AlreadyOpen);
        }
        let (shutdown, shutdown_rx) = bounded(1);
        let rx = self.rx.clone();
        let thread = std::thread::Builder::new()
            .name(format!("midi-{}", self.name))
            .spawn(move || read_loop(rx, shutdown_rx, handler))
            .map_err(|e| MidiError::Backend(e.to_string()))?;
        self.reader = Some(Reader { shutdown, thread });
        Ok(())
    }

    fn close(&mut self) {
        if let Some(reader) = self.reader.take() {
            let _ = reader.shutdown.try_send(());
            let _ = reader.thread.join();
        }
    }
}

impl Drop for ChannelMidiInput {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn messages_reach_the_handler() {
        let (mut input, sender) = ChannelMidiInput::new("test");
        let (seen_tx, seen_rx) = crossbeam_channel::unbounded();
        input
            .open(Box::new(move |msg| {
                let _ = seen_tx.send(msg);
            }))
            .unwrap();

        assert!(sender.note_on(0, 36, 127));
        assert!(sender.note_off(0, 36));
        let first = seen_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        let second = seen_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(
            first,
            MidiMessage::NoteOn {
                channel: 0,
                note: 36,
                velocity: 127
            }
        );
        assert!(matches!(second, MidiMessage::NoteOff { note: 36, .. }));
        input.close();
        assert!(!input.is_open());
    }

    #[test]
    fn open_twice_fails() {
        let (mut input, _sender) = ChannelMidiInput::new("test");
        input.open(Box::new(|_| {})).unwrap();
        assert!(matches!(input.open(Box::new(|_| {})), Err(MidiError::AlreadyOpen)));
    }

    #[test]
    fn close_joins_idle_reader() {
        let (mut input, _sender) = ChannelMidiInput::new("idle");
        input.open(Box::new(|_| {})).unwrap();
        input.close();
        input.open(Box::new(|_| {})).unwrap();
        assert!(input.is_open());
    }
}
