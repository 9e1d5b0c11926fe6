use crate::midi::{MidiMessage, MIDI_NUM_CHANNELS, MIDI_NUM_CONTROLLERS};

/// Default lifetime of a remembered CC value, in `process` calls
pub const CC_MEM_DEFAULT_TIMEOUT: u32 = 1000;

#[derive(Debug, Clone, Copy, Default)]
struct CcEntry {
    value: Option<u8>,
    timeout: u32,
}

/// Last seen value of every controller on every channel.
///
/// An entry is forgotten once its timeout runs down. A timeout of zero
/// means entries never expire.
#[derive(Debug, Clone)]
pub struct CcMemory {
    entries: [[CcEntry; MIDI_NUM_CONTROLLERS]; MIDI_NUM_CHANNELS],
    timeout: u32,
}

impl Default for CcMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl CcMemory {
    pub fn new() -> Self {
        Self {
            entries: [[CcEntry::default(); MIDI_NUM_CONTROLLERS]; MIDI_NUM_CHANNELS],
            timeout: CC_MEM_DEFAULT_TIMEOUT,
        }
    }

    pub fn set_timeout(&mut self, timeout: u32) {
        self.timeout = timeout;
    }

    /// Remembers a control change and reports whether this exact value was
    /// already known. Other message types are never known.
    pub fn handle_cc(&mut self, msg: &MidiMessage) -> bool {
        let MidiMessage::ControlChange {
            channel,
            controller,
            value,
        } = *msg
        else {
            return false;
        };
        let entry =
            &mut self.entries[(channel & 0x0F) as usize][(controller & 0x7F) as usize];
        let known = entry.value == Some(value);
        entry.value = Some(value);
        entry.timeout = self.timeout;
        known
    }

    /// Ages every entry by one call.
    pub fn process(&mut self) {
        for entry in self.entries.iter_mut().flatten() {
            if entry.value.is_some() && entry.timeout > 0 {
                entry.timeout -= 1;
                if entry.timeout == 0 {
                    entry.value = None;
                }
            }
        }
    }

    pub fn reset(&mut self) {
        for entry in self.entries.iter_mut().flatten() {
            *entry = CcEntry::default();
        }
    }
}
