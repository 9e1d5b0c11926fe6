//! MIDI transport plumbing for pllsyncrs
//!
//! This module provides:
//! - Core MIDI message types, wire encoding and error handling
//! - Real MIDI device communication via midir
//! - A scripted mock engine for testing
//!
//! The clock and repeater cores never touch this layer directly; they only
//! consume decoded [`MidiMessage`] values.
mod engine;
pub mod midir_engine;
pub mod mock_engine;

pub use engine::{
    MidiEngine, MidiError, MidiMessage, Result, MIDI_CLOCK_CONTINUE, MIDI_CLOCK_START,
    MIDI_CLOCK_STOP, MIDI_CONTROL_CHANGE, MIDI_NATIVE_PPQ, MIDI_NOTE_OFF, MIDI_NOTE_ON,
    MIDI_NUM_CHANNELS, MIDI_NUM_CONTROLLERS, MIDI_PROGRAM_CHANGE, MIDI_TIMING_TICK,
};

pub use midir_engine::MidirEngine;
pub use mock_engine::MockMidiEngine;

// Set default engine type
pub type DefaultMidiEngine = MidirEngine;
