//! Host modules
//!
//! Each module wraps one core component and adapts it to the task loop:
//! MIDI input is handed over before a task step, output is drained after
//! it, and a status snapshot is published for the UI.
mod clock_module;
mod monitor_module;
mod repeater_module;

use crate::midi::MidiMessage;
use crate::state::TransportState;

pub use clock_module::{ClockModule, ClockModuleConfig, ClockOutput, OUTPUT_DIV_MAX};
pub use monitor_module::MonitorModule;
pub use repeater_module::RepeaterModule;

/// Front-panel style controls routed to the running module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleCommand {
    ToggleRun,
    Reset,
    TapTempo,
    ToggleSource,
    ToggleAutostart,
    NextMode,
}

/// Something the task loop can drive at a fixed rate.
pub trait TaskModule: Send {
    fn name(&self) -> &'static str;

    /// Hands over one input message. Runs before `run_task` in the same step.
    fn handle_input(&mut self, msg: &MidiMessage);

    /// Applies a user control. Modules without the control ignore it.
    fn handle_command(&mut self, _cmd: ModuleCommand) {}

    /// One task step.
    fn run_task(&mut self);

    /// Next message waiting to be sent, if any.
    fn poll_output(&mut self) -> Option<MidiMessage>;

    fn publish(&self, state: &TransportState);
}

impl<M: TaskModule + ?Sized> TaskModule for Box<M> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn handle_input(&mut self, msg: &MidiMessage) {
        (**self).handle_input(msg)
    }

    fn handle_command(&mut self, cmd: ModuleCommand) {
        (**self).handle_command(cmd)
    }

    fn run_task(&mut self) {
        (**self).run_task()
    }

    fn poll_output(&mut self) -> Option<MidiMessage> {
        (**self).poll_output()
    }

    fn publish(&self, state: &TransportState) {
        (**self).publish(state)
    }
}
