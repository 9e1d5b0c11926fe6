//! Software MIDI clock with a phase-locked loop
//!
//! [`ClockPll`] free-runs at a programmed tempo or locks to an external
//! 24 PPQ tick stream, and reports everything through a [`ClockHandler`].
//! All state changes happen inside [`ClockPll::timer_task`]; the request
//! and external-input methods only flag work for the next task run.
mod handler;
mod history;
mod pll;

use serde::Deserialize;
use std::fmt;

pub use handler::{ClockEvent, ClockHandler, NullHandler};
pub use history::IntervalHistory;
pub use pll::ClockPll;

pub const DEFAULT_TEMPO: f64 = 120.0;
pub const TEMPO_MIN: f64 = 30.0;
pub const TEMPO_MAX: f64 = 300.0;
/// Default task interval when the host never calls `set_task_interval`
pub const DEFAULT_TASK_INTERVAL_US: i64 = 1_000;
/// External intervals averaged when locking (power of two)
pub const EXT_HIST_LEN: usize = 8;
/// Intervals needed before the external clock drives the internal one
pub const EXT_MIN_HIST: usize = 3;
/// Taps averaged for tap tempo; one more tap than this is needed to lock
pub const TAP_HIST_LEN: usize = 2;

/// Which clock drives ticking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockSource {
    Internal,
    External,
}

impl fmt::Display for ClockSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClockSource::Internal => write!(f, "internal"),
            ClockSource::External => write!(f, "external"),
        }
    }
}

/// Pending transport command. Single slot: the last request before a task
/// run wins, and the task consumes it exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportRequest {
    #[default]
    Idle,
    Start,
    Continue,
    Stop,
}

/// How the lock error between internal and external tick counts nudges the
/// tick interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LockCorrection {
    /// Fixed step of `ext_error_adj_us` per external tick toward zero error
    Fixed,
    /// Step proportional to the tick error, capped at `ext_error_adj_us`
    Proportional { gain_us_per_tick: i64 },
}

/// Tuning for [`ClockPll`]. Times are in microseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PllConfig {
    pub tempo_min: f64,
    pub tempo_max: f64,
    pub ext_sync_timeout_us: i64,
    pub ext_error_adj_us: i64,
    pub ext_tempo_filter: f64,
    pub tap_timeout_us: i64,
    pub lock_correction: LockCorrection,
}

impl Default for PllConfig {
    fn default() -> Self {
        Self {
            tempo_min: TEMPO_MIN,
            tempo_max: TEMPO_MAX,
            ext_sync_timeout_us: 125_000,
            ext_error_adj_us: 500,
            ext_tempo_filter: 0.9,
            // just longer than one beat at 30 BPM
            tap_timeout_us: 2_500_000,
            lock_correction: LockCorrection::Fixed,
        }
    }
}

impl PllConfig {
    /// Same defaults with a different tempo range. A reversed range is swapped.
    pub fn with_tempo_range(tempo_min: f64, tempo_max: f64) -> Self {
        let (lo, hi) = if tempo_min <= tempo_max {
            (tempo_min, tempo_max)
        } else {
            (tempo_max, tempo_min)
        };
        Self {
            tempo_min: lo.max(1.0),
            tempo_max: hi.max(1.0),
            ..Self::default()
        }
    }
}
