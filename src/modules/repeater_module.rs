use super::{ModuleCommand, TaskModule};
use crate::midi::MidiMessage;
use crate::repeater::{Repeater, RepeaterMode, RepeaterTiming};
use crate::state::TransportState;
use crossbeam::channel::{unbounded, Receiver, Sender};
use log::{debug, info, trace};

type PortSender = Sender<(usize, MidiMessage)>;

/// Several independent repeaters behind one shared mode switch.
pub struct RepeaterModule {
    ports: Vec<Repeater<PortSender>>,
    rx: Receiver<(usize, MidiMessage)>,
    mode: RepeaterMode,
    received: u64,
}

impl RepeaterModule {
    pub fn new(num_ports: usize, mode: RepeaterMode, timing: RepeaterTiming) -> Self {
        let (tx, rx) = unbounded();
        let ports = (0..num_ports.max(1))
            .map(|port| {
                let mut repeater = Repeater::with_sender(tx.clone(), port);
                repeater.set_timing(timing);
                repeater.set_mode(mode);
                repeater
            })
            .collect();
        debug!("Repeater module with {} ports, mode {}", num_ports.max(1), mode);
        Self {
            ports,
            rx,
            mode,
            received: 0,
        }
    }

    pub fn num_ports(&self) -> usize {
        self.ports.len()
    }

    pub fn port(&self, port: usize) -> Option<&Repeater<PortSender>> {
        self.ports.get(port)
    }

    pub fn mode(&self) -> RepeaterMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: RepeaterMode) {
        if mode == self.mode {
            return;
        }
        self.mode = mode;
        for repeater in self.ports.iter_mut() {
            repeater.set_mode(mode);
        }
    }

    /// Steps the mode switch off, on, gen and back to off.
    pub fn next_mode(&mut self) {
        let mode = match self.mode {
            RepeaterMode::Off => RepeaterMode::PassThrough,
            RepeaterMode::PassThrough => RepeaterMode::Regenerate,
            RepeaterMode::Regenerate => RepeaterMode::Off,
        };
        info!("Repeater mode -> {}", mode);
        self.set_mode(mode);
    }

    /// Clears every port and returns the switch to off.
    pub fn reset(&mut self) {
        for repeater in self.ports.iter_mut() {
            repeater.reset();
        }
        self.mode = RepeaterMode::Off;
    }

    /// Feeds one port. Unknown ports are ignored.
    pub fn handle_port_input(&mut self, port: usize, msg: &MidiMessage) {
        if let Some(repeater) = self.ports.get_mut(port) {
            self.received += 1;
            repeater.handle_message(msg);
        }
    }

    /// Next forwarded message with the port it belongs to
    pub fn poll_port_output(&mut self) -> Option<(usize, MidiMessage)> {
        self.rx.try_recv().ok()
    }
}

impl TaskModule for RepeaterModule {
    fn name(&self) -> &'static str {
        "repeater"
    }

    /// The device input feeds the first port.
    fn handle_input(&mut self, msg: &MidiMessage) {
        self.handle_port_input(0, msg);
    }

    fn handle_command(&mut self, cmd: ModuleCommand) {
        match cmd {
            ModuleCommand::NextMode => self.next_mode(),
            ModuleCommand::Reset => self.reset(),
            _ => {}
        }
    }

    fn run_task(&mut self) {
        for repeater in self.ports.iter_mut() {
            repeater.task_timer();
        }
    }

    fn poll_output(&mut self) -> Option<MidiMessage> {
        let (port, msg) = self.poll_port_output()?;
        trace!("Port {} out: {:?}", port, msg);
        Some(msg)
    }

    fn publish(&self, state: &TransportState) {
        state.set_message_count(self.received);
    }
}
