//! MIDI input contract and message parsing.

/// Error type for MIDI input.
#[derive(thiserror::Error, Debug)]
pub enum MidiError {
    #[error("MIDI input already open")]
    AlreadyOpen,

    #[error("MIDI port not found: {0}")]
    PortNotFound(String),

    /// Error reported by the platform MIDI layer
    #[error("MIDI backend error: {0}")]
    Backend(String),

    #[error("unknown MIDI driver: {0}")]
    UnknownDriver(String),

    #[error("MIDI driver unavailable: {0}")]
    Unavailable(&'static str),
}

/// Parsed channel message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MidiMessage {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8, velocity: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    ProgramChange { channel: u8, program: u8 },
    PitchBend { channel: u8, value: i16 },
    Other { status: u8 },
}

impl MidiMessage {
    /// Parse raw MIDI bytes. A note-on with velocity 0 is a note-off.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let (&status, data) = bytes.split_first()?;
        let channel = status & 0x0F;
        let msg = match (status & 0xF0, data) {
            (0x90, &[note, velocity, ..]) if velocity > 0 => MidiMessage::NoteOn {
                channel,
                note,
                velocity,
            },
            (0x90, &[note, _, ..]) => MidiMessage::NoteOff {
                channel,
                note,
                velocity: 0,
            },
            (0x80, &[note, velocity, ..]) => MidiMessage::NoteOff {
                channel,
                note,
                velocity,
            },
            (0xB0, &[controller, value, ..]) => MidiMessage::ControlChange {
                channel,
                controller,
                value,
            },
            (0xC0, &[program, ..]) => MidiMessage::ProgramChange { channel, program },
            (0xE0, &[lsb, msb, ..]) => {
                let value = (((msb as i16) << 7) | lsb as i16) - 8192;
                MidiMessage::PitchBend { channel, value }
            }
            _ => MidiMessage::Other { status },
        };
        Some(msg)
    }
}

/// Called on the MIDI reader thread for every parsed message.
pub type MidiHandler = Box<dyn FnMut(MidiMessage) + Send + 'static>;

/// Trait for MIDI input backends.
pub trait MidiInput {
    fn name(&self) -> &str;

    /// Start delivering messages to `handler`.
    fn open(&mut self, handler: MidiHandler) -> Result<(), MidiError>;

    /// Stop delivering messages. Returns once the handler has been dropped.
    fn close(&mut self);
}
