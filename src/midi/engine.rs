use std::error::Error;
use std::fmt;

/// MIDI clock wire rate
pub const MIDI_NATIVE_PPQ: u32 = 24;
/// Number of MIDI channels
pub const MIDI_NUM_CHANNELS: usize = 16;
/// Number of controller numbers per channel
pub const MIDI_NUM_CONTROLLERS: usize = 128;

pub const MIDI_NOTE_OFF: u8 = 0x80;
pub const MIDI_NOTE_ON: u8 = 0x90;
pub const MIDI_CONTROL_CHANGE: u8 = 0xB0;
pub const MIDI_PROGRAM_CHANGE: u8 = 0xC0;
pub const MIDI_TIMING_TICK: u8 = 0xF8;
pub const MIDI_CLOCK_START: u8 = 0xFA;
pub const MIDI_CLOCK_CONTINUE: u8 = 0xFB;
pub const MIDI_CLOCK_STOP: u8 = 0xFC;

/// Custom error type for MIDI operations
#[derive(Debug)]
pub enum MidiError {
    /// Error when sending a MIDI message
    SendError(String),
    /// Error when receiving a MIDI message
    RecvError(String),
    /// Error when connecting to a MIDI device
    ConnectionError(String),
}

impl fmt::Display for MidiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MidiError::SendError(msg) => write!(f, "MIDI send error: {}", msg),
            MidiError::RecvError(msg) => write!(f, "MIDI receive error: {}", msg),
            MidiError::ConnectionError(msg) => write!(f, "MIDI connection error: {}", msg),
        }
    }
}

impl Error for MidiError {}

impl From<midir::InitError> for MidiError {
    fn from(e: midir::InitError) -> Self {
        MidiError::ConnectionError(e.to_string())
    }
}

impl From<midir::PortInfoError> for MidiError {
    fn from(e: midir::PortInfoError) -> Self {
        MidiError::ConnectionError(e.to_string())
    }
}

impl<T> From<midir::ConnectError<T>> for MidiError {
    fn from(e: midir::ConnectError<T>) -> Self {
        MidiError::ConnectionError(e.kind().to_string())
    }
}

impl From<midir::SendError> for MidiError {
    fn from(e: midir::SendError) -> Self {
        MidiError::SendError(e.to_string())
    }
}

/// Represents a MIDI message that can be sent or received
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    /// Note On message with note number and velocity
    NoteOn { channel: u8, note: u8, velocity: u8 },
    /// Note Off message with note number and velocity
    NoteOff { channel: u8, note: u8, velocity: u8 },
    /// Control Change message with controller number and value
    ControlChange {
        channel: u8,
        controller: u8,
        value: u8,
    },
    /// Program Change message with program number
    ProgramChange { channel: u8, program: u8 },
    /// MIDI Clock timing message
    Clock,
    /// MIDI Start message
    Start,
    /// MIDI Continue message
    Continue,
    /// MIDI Stop message
    Stop,
}

impl MidiMessage {
    /// Builds a control change, masking every field into its legal range.
    pub fn control_change(channel: u8, controller: u8, value: u8) -> Self {
        MidiMessage::ControlChange {
            channel: channel & 0x0F,
            controller: controller & 0x7F,
            value: value & 0x7F,
        }
    }

    /// Decodes a raw MIDI message. Unsupported or truncated messages yield `None`.
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        let status = *data.first()?;

        match status {
            MIDI_TIMING_TICK => return Some(MidiMessage::Clock),
            MIDI_CLOCK_START => return Some(MidiMessage::Start),
            MIDI_CLOCK_CONTINUE => return Some(MidiMessage::Continue),
            MIDI_CLOCK_STOP => return Some(MidiMessage::Stop),
            _ => {}
        }

        let channel = status & 0x0F;
        match status & 0xF0 {
            MIDI_NOTE_ON if data.len() >= 3 => Some(MidiMessage::NoteOn {
                channel,
                note: data[1] & 0x7F,
                velocity: data[2] & 0x7F,
            }),
            MIDI_NOTE_OFF if data.len() >= 3 => Some(MidiMessage::NoteOff {
                channel,
                note: data[1] & 0x7F,
                velocity: data[2] & 0x7F,
            }),
            MIDI_CONTROL_CHANGE if data.len() >= 3 => {
                Some(MidiMessage::control_change(channel, data[1], data[2]))
            }
            MIDI_PROGRAM_CHANGE if data.len() >= 2 => Some(MidiMessage::ProgramChange {
                channel,
                program: data[1] & 0x7F,
            }),
            _ => None,
        }
    }

    /// Encodes the message into its wire form.
    pub fn to_bytes(&self) -> Vec<u8> {
        match *self {
            MidiMessage::NoteOn {
                channel,
                note,
                velocity,
            } => vec![MIDI_NOTE_ON | (channel & 0x0F), note, velocity],
            MidiMessage::NoteOff {
                channel,
                note,
                velocity,
            } => vec![MIDI_NOTE_OFF | (channel & 0x0F), note, velocity],
            MidiMessage::ControlChange {
                channel,
                controller,
                value,
            } => vec![MIDI_CONTROL_CHANGE | (channel & 0x0F), controller, value],
            MidiMessage::ProgramChange { channel, program } => {
                vec![MIDI_PROGRAM_CHANGE | (channel & 0x0F), program]
            }
            MidiMessage::Clock => vec![MIDI_TIMING_TICK],
            MidiMessage::Start => vec![MIDI_CLOCK_START],
            MidiMessage::Continue => vec![MIDI_CLOCK_CONTINUE],
            MidiMessage::Stop => vec![MIDI_CLOCK_STOP],
        }
    }

    /// The status byte as it appears on the wire.
    pub fn status(&self) -> u8 {
        match *self {
            MidiMessage::NoteOn { channel, .. } => MIDI_NOTE_ON | channel,
            MidiMessage::NoteOff { channel, .. } => MIDI_NOTE_OFF | channel,
            MidiMessage::ControlChange { channel, .. } => MIDI_CONTROL_CHANGE | channel,
            MidiMessage::ProgramChange { channel, .. } => MIDI_PROGRAM_CHANGE | channel,
            MidiMessage::Clock => MIDI_TIMING_TICK,
            MidiMessage::Start => MIDI_CLOCK_START,
            MidiMessage::Continue => MIDI_CLOCK_CONTINUE,
            MidiMessage::Stop => MIDI_CLOCK_STOP,
        }
    }

    pub fn is_control_change(&self) -> bool {
        matches!(self, MidiMessage::ControlChange { .. })
    }

    /// Single-byte system realtime messages (clock and transport).
    pub fn is_realtime(&self) -> bool {
        matches!(
            self,
            MidiMessage::Clock | MidiMessage::Start | MidiMessage::Continue | MidiMessage::Stop
        )
    }
}

/// Result type for MIDI operations
pub type Result<T> = std::result::Result<T, MidiError>;

/// Trait defining the interface for MIDI engine implementations
pub trait MidiEngine: Send {
    /// Sends a MIDI message to the device
    fn send(&mut self, msg: MidiMessage) -> Result<()>;

    /// Returns the next pending input message without blocking
    fn try_recv(&mut self) -> Result<Option<MidiMessage>>;

    /// Lists the devices this engine can see
    fn list_devices(&self) -> Vec<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_realtime_bytes() {
        assert_eq!(MidiMessage::from_bytes(&[0xF8]), Some(MidiMessage::Clock));
        assert_eq!(MidiMessage::from_bytes(&[0xFA]), Some(MidiMessage::Start));
        assert_eq!(MidiMessage::from_bytes(&[0xFB]), Some(MidiMessage::Continue));
        assert_eq!(MidiMessage::from_bytes(&[0xFC]), Some(MidiMessage::Stop));
    }

    #[test]
    fn truncated_control_change_is_dropped() {
        assert_eq!(MidiMessage::from_bytes(&[0xB3, 7]), None);
        assert_eq!(MidiMessage::from_bytes(&[]), None);
        assert_eq!(MidiMessage::from_bytes(&[0xF2, 0, 0]), None);
    }

    #[test]
    fn control_change_keeps_channel_and_masks_data() {
        let msg = MidiMessage::from_bytes(&[0xB3, 0x87, 0xFF]).unwrap();
        assert_eq!(
            msg,
            MidiMessage::ControlChange {
                channel: 3,
                controller: 7,
                value: 0x7F
            }
        );
        assert_eq!(msg.status(), 0xB3);
        assert_eq!(msg.to_bytes(), vec![0xB3, 7, 0x7F]);
        assert!(msg.is_control_change());
        assert!(!msg.is_realtime());
    }
}
