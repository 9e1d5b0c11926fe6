//! pllsyncrs: a MIDI clock PLL and CC repeater
//!
//! The two cores are [`clock::ClockPll`] and [`repeater::Repeater`]. Both are
//! plain single-threaded state machines stepped from a fixed-rate task; the
//! rest of the crate wires them to MIDI devices, a task thread and a
//! terminal status display.
pub mod cli;
pub mod clock;
pub mod config;
pub mod event_loop;
pub mod input;
pub mod logging;
pub mod midi;
pub mod modules;
pub mod repeater;
pub mod scheduler;
pub mod state;
pub mod ui;

use std::sync::Arc;

pub use cli::Args;
pub use scheduler::{Scheduler, ThreadScheduler};
pub use state::TransportState;

/// Task steps per second
pub const DEFAULT_TASK_RATE_HZ: u32 = 4000;

pub type SharedState = Arc<TransportState>;

pub fn create_scheduler() -> ThreadScheduler {
    ThreadScheduler::new()
}

pub fn create_shared_state() -> SharedState {
    Arc::new(TransportState::new())
}

#[cfg(not(feature = "test-mock"))]
pub fn handle_device_list() -> Vec<String> {
    midi::MidirEngine::available_ports()
}

#[cfg(feature = "test-mock")]
pub fn handle_device_list() -> Vec<String> {
    use midi::MidiEngine;
    midi::MockMidiEngine::new().list_devices()
}
