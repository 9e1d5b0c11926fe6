use crate::midi::{MidiEngine, MidiMessage, Result};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// In-memory engine: input is scripted up front, output is recorded.
///
/// The sent log is shared so a test can keep a handle after the engine has
/// been moved into a task loop.
#[derive(Default)]
pub struct MockMidiEngine {
    input: VecDeque<MidiMessage>,
    sent: Arc<Mutex<Vec<MidiMessage>>>,
}

impl MockMidiEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input<I: IntoIterator<Item = MidiMessage>>(input: I) -> Self {
        Self {
            input: input.into_iter().collect(),
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn push_input(&mut self, msg: MidiMessage) {
        self.input.push_back(msg);
    }

    pub fn sent_log(&self) -> Arc<Mutex<Vec<MidiMessage>>> {
        self.sent.clone()
    }
}

impl MidiEngine for MockMidiEngine {
    fn send(&mut self, msg: MidiMessage) -> Result<()> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(msg);
        }
        Ok(())
    }

    fn try_recv(&mut self) -> Result<Option<MidiMessage>> {
        Ok(self.input.pop_front())
    }

    fn list_devices(&self) -> Vec<String> {
        vec!["Mock Device 1".to_string(), "Mock Device 2".to_string()]
    }
}
