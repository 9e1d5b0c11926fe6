//! Control change de-duplication and regeneration
//!
//! [`Repeater`] filters a stream of MIDI messages down to control changes
//! and forwards them under one of three policies, see [`RepeaterMode`].
//! [`CcMemory`] is the lighter per-channel value memory used to hide
//! repeated CCs from displays and logs.
mod cc_mem;

use crate::midi::{MidiMessage, MIDI_NUM_CONTROLLERS};
use log::{debug, trace};
use serde::Deserialize;
use std::fmt;

pub use cc_mem::{CcMemory, CC_MEM_DEFAULT_TIMEOUT};

/// Delivery policy for control changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum RepeaterMode {
    /// Suppress exact repeats inside the hold window
    #[default]
    #[serde(rename = "off")]
    Off,
    /// Forward everything unchanged
    #[serde(rename = "on", alias = "pass-through", alias = "passthrough")]
    PassThrough,
    /// Forward and periodically re-send the last value per controller
    #[serde(rename = "gen", alias = "regenerate")]
    Regenerate,
}

impl fmt::Display for RepeaterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepeaterMode::Off => write!(f, "off"),
            RepeaterMode::PassThrough => write!(f, "on"),
            RepeaterMode::Regenerate => write!(f, "gen"),
        }
    }
}

/// Output side of a repeater.
pub trait RepeaterSender {
    /// `index` identifies the repeater that produced the message
    fn send_message(&mut self, msg: MidiMessage, index: usize);
}

/// Sender that drops every message.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSender;

impl RepeaterSender for NullSender {
    fn send_message(&mut self, _msg: MidiMessage, _index: usize) {}
}

impl RepeaterSender for Vec<(MidiMessage, usize)> {
    fn send_message(&mut self, msg: MidiMessage, index: usize) {
        self.push((msg, index));
    }
}

impl RepeaterSender for crossbeam::channel::Sender<(usize, MidiMessage)> {
    fn send_message(&mut self, msg: MidiMessage, index: usize) {
        // the receiver going away only happens on shutdown
        let _ = self.send((index, msg));
    }
}

impl<S: RepeaterSender + ?Sized> RepeaterSender for &mut S {
    fn send_message(&mut self, msg: MidiMessage, index: usize) {
        (**self).send_message(msg, index)
    }
}

/// Repeater timing, all in task runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepeaterTiming {
    /// Resend period in regenerate mode
    pub send_interval: i32,
    /// Duplicate suppression window in off mode
    pub hist_timeout: i32,
    /// How many task runs pass between slot updates
    pub check_interval: i32,
}

impl RepeaterTiming {
    /// 0.5 s resend, 2.0 s hold and 0.1 s check at the given task rate.
    pub fn for_task_rate(task_rate_hz: u32) -> Self {
        let rate = task_rate_hz as f64;
        Self {
            send_interval: (rate * 0.5) as i32,
            hist_timeout: (rate * 2.0) as i32,
            check_interval: (rate * 0.1) as i32,
        }
        .clamped()
    }

    fn clamped(self) -> Self {
        Self {
            send_interval: self.send_interval.max(1),
            hist_timeout: self.hist_timeout.max(1),
            check_interval: self.check_interval.max(1),
        }
    }
}

impl Default for RepeaterTiming {
    fn default() -> Self {
        Self::for_task_rate(crate::DEFAULT_TASK_RATE_HZ)
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct HistSlot {
    msg: Option<MidiMessage>,
    timeout: i32,
}

/// Per-controller CC history with off / pass-through / regenerate modes.
///
/// Slots are indexed by controller number only; the channel lives in the
/// stored status byte.
pub struct Repeater<S: RepeaterSender = NullSender> {
    hist: [HistSlot; MIDI_NUM_CONTROLLERS],
    mode: RepeaterMode,
    repeat_check: i32,
    timing: RepeaterTiming,
    sender: S,
    index: usize,
}

impl Repeater<NullSender> {
    pub fn new() -> Self {
        Self::with_sender(NullSender, 0)
    }
}

impl Default for Repeater<NullSender> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: RepeaterSender> Repeater<S> {
    pub fn with_sender(sender: S, index: usize) -> Self {
        let mut repeater = Self {
            hist: [HistSlot::default(); MIDI_NUM_CONTROLLERS],
            mode: RepeaterMode::Off,
            repeat_check: 0,
            timing: RepeaterTiming::default(),
            sender,
            index,
        };
        repeater.reset();
        repeater
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn sender(&self) -> &S {
        &self.sender
    }

    pub fn sender_mut(&mut self) -> &mut S {
        &mut self.sender
    }

    pub fn timing(&self) -> RepeaterTiming {
        self.timing
    }

    pub fn set_timing(&mut self, timing: RepeaterTiming) {
        self.timing = timing.clamped();
        debug!("Repeater {} timing: {:?}", self.index, self.timing);
    }

    pub fn set_send_interval(&mut self, interval: i32) {
        self.timing.send_interval = interval.max(1);
    }

    pub fn set_hist_timeout(&mut self, timeout: i32) {
        self.timing.hist_timeout = timeout.max(1);
    }

    pub fn set_check_interval(&mut self, interval: i32) {
        self.timing.check_interval = interval.max(1);
    }

    pub fn mode(&self) -> RepeaterMode {
        self.mode
    }

    /// Takes effect immediately. Armed slots keep their timers and decay
    /// under the new mode's rules.
    pub fn set_mode(&mut self, mode: RepeaterMode) {
        if self.mode != mode {
            debug!("Repeater {} mode: {}", self.index, mode);
        }
        self.mode = mode;
    }

    /// Clears all slot timers and returns to [`RepeaterMode::Off`].
    pub fn reset(&mut self) {
        self.repeat_check = 0;
        for slot in self.hist.iter_mut() {
            slot.timeout = 0;
        }
        self.mode = RepeaterMode::Off;
    }

    /// Remaining timer of a controller slot, in task runs.
    pub fn slot_timeout(&self, controller: u8) -> i32 {
        self.hist
            .get(controller as usize)
            .map_or(0, |slot| slot.timeout)
    }

    /// Processes one incoming message. Anything but a control change is dropped.
    pub fn handle_message(&mut self, msg: &MidiMessage) {
        let MidiMessage::ControlChange {
            controller, value, ..
        } = *msg
        else {
            return;
        };
        let slot = &mut self.hist[(controller & 0x7F) as usize];

        match self.mode {
            RepeaterMode::Off => {
                let duplicate = slot.timeout > 0
                    && slot.msg.is_some_and(|stored| {
                        stored.status() == msg.status() && cc_value(&stored) == Some(value)
                    });
                slot.timeout = self.timing.hist_timeout;
                if duplicate {
                    trace!("Repeater {} suppressed CC {} = {}", self.index, controller, value);
                    return;
                }
                slot.msg = Some(*msg);
            }
            RepeaterMode::Regenerate => {
                slot.msg = Some(*msg);
                slot.timeout = self.timing.send_interval;
            }
            RepeaterMode::PassThrough => {}
        }
        self.sender.send_message(*msg, self.index);
    }

    /// Called once per task run. Slot timers only move every
    /// `check_interval` runs, by `check_interval` at a time.
    pub fn task_timer(&mut self) {
        if self.repeat_check == self.timing.check_interval {
            let step = self.timing.check_interval;
            for slot in self.hist.iter_mut().filter(|slot| slot.timeout != 0) {
                match self.mode {
                    RepeaterMode::Off => {
                        slot.timeout = (slot.timeout - step).max(0);
                    }
                    RepeaterMode::Regenerate => {
                        slot.timeout -= step;
                        if slot.timeout <= 0 {
                            if let Some(msg) = slot.msg {
                                self.sender.send_message(msg, self.index);
                            }
                            slot.timeout = self.timing.send_interval;
                        }
                    }
                    RepeaterMode::PassThrough => {}
                }
            }
            self.repeat_check = 0;
        }
        self.repeat_check += 1;
    }
}

fn cc_value(msg: &MidiMessage) -> Option<u8> {
    match *msg {
        MidiMessage::ControlChange { value, .. } => Some(value),
        _ => None,
    }
}
