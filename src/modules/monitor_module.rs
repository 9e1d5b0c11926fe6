use super::TaskModule;
use crate::midi::MidiMessage;
use crate::repeater::CcMemory;
use crate::state::TransportState;
use chrono::Local;
use log::{info, trace};

/// Logs incoming traffic, hiding clock ticks and CCs that repeat a known value.
pub struct MonitorModule {
    cc_mem: CcMemory,
    line_num: u64,
    suppressed: u64,
}

impl Default for MonitorModule {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorModule {
    pub fn new() -> Self {
        Self {
            cc_mem: CcMemory::new(),
            line_num: 0,
            suppressed: 0,
        }
    }

    /// CC memory lifetime in task runs
    pub fn set_cc_timeout(&mut self, timeout: u32) {
        self.cc_mem.set_timeout(timeout);
    }

    /// Lines logged so far
    pub fn line_count(&self) -> u64 {
        self.line_num
    }

    pub fn suppressed_count(&self) -> u64 {
        self.suppressed
    }

    /// One display line: line number, timestamp and the message bytes in hex.
    pub fn format_line(line_num: u64, msg: &MidiMessage) -> String {
        let bytes = msg.to_bytes();
        let data = (0..3)
            .map(|i| bytes.get(i).map_or("--".to_string(), |b| format!("{:02X}", b)))
            .collect::<Vec<_>>()
            .join(" ");
        format!(
            "{:04} {} {}",
            line_num % 10_000,
            Local::now().format("%H:%M:%S%.3f"),
            data
        )
    }
}

impl TaskModule for MonitorModule {
    fn name(&self) -> &'static str {
        "monitor"
    }

    fn handle_input(&mut self, msg: &MidiMessage) {
        if *msg == MidiMessage::Clock {
            return;
        }
        if self.cc_mem.handle_cc(msg) {
            trace!("Repeated CC hidden: {:?}", msg);
            self.suppressed += 1;
            return;
        }
        info!("{}", Self::format_line(self.line_num, msg));
        self.line_num += 1;
    }

    fn run_task(&mut self) {
        self.cc_mem.process();
    }

    fn poll_output(&mut self) -> Option<MidiMessage> {
        None
    }

    fn publish(&self, state: &TransportState) {
        state.set_message_count(self.line_num);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_cc_is_logged_once() {
        let mut monitor = MonitorModule::new();
        let cc = MidiMessage::control_change(0, 7, 100);
        monitor.handle_input(&cc);
        monitor.handle_input(&cc);
        monitor.handle_input(&MidiMessage::Clock);
        monitor.handle_input(&MidiMessage::Start);
        assert_eq!(monitor.line_count(), 2);
        assert_eq!(monitor.suppressed_count(), 1);
    }

    #[test]
    fn line_shows_missing_bytes() {
        let line = MonitorModule::format_line(3, &MidiMessage::Stop);
        assert!(line.starts_with("0003 "));
        assert!(line.ends_with("FC -- --"));
        let line = MonitorModule::format_line(12, &MidiMessage::control_change(1, 2, 3));
        assert!(line.ends_with("B1 02 03"));
    }
}
