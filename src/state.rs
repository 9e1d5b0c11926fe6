use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

pub const BEATS_PER_BAR: u32 = 4;

/// Status snapshot written by the task thread and read by the UI.
///
/// Every field is a separate atomic; readers may see a mix of two
/// consecutive snapshots, which is fine for display.
pub struct TransportState {
    tempo_bits: AtomicU64,
    tick_position: AtomicU32,
    ppq: AtomicU32,
    running: AtomicBool,
    synced: AtomicBool,
    external: AtomicBool,
    clock_pulses: AtomicU64,
    reset_pulses: AtomicU64,
    messages: AtomicU64,
    tempo_locks: AtomicU64,
}

impl Default for TransportState {
    fn default() -> Self {
        Self {
            tempo_bits: AtomicU64::new(120.0f64.to_bits()),
            tick_position: AtomicU32::new(0),
            ppq: AtomicU32::new(crate::midi::MIDI_NATIVE_PPQ),
            running: AtomicBool::new(false),
            synced: AtomicBool::new(false),
            external: AtomicBool::new(false),
            clock_pulses: AtomicU64::new(0),
            reset_pulses: AtomicU64::new(0),
            messages: AtomicU64::new(0),
            tempo_locks: AtomicU64::new(0),
        }
    }
}

impl TransportState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_tempo(&self, bpm: f64) {
        self.tempo_bits.store(bpm.to_bits(), Ordering::Relaxed);
    }

    pub fn tempo(&self) -> f64 {
        f64::from_bits(self.tempo_bits.load(Ordering::Relaxed))
    }

    pub fn set_position(&self, tick: u32, ppq: u32) {
        self.tick_position.store(tick, Ordering::Relaxed);
        self.ppq.store(ppq.max(1), Ordering::Relaxed);
    }

    pub fn tick_position(&self) -> u32 {
        self.tick_position.load(Ordering::Relaxed)
    }

    pub fn ppq(&self) -> u32 {
        self.ppq.load(Ordering::Relaxed)
    }

    /// 1-based beat within the bar, assuming 4/4
    pub fn beat(&self) -> u32 {
        (self.tick_position() / self.ppq()) % BEATS_PER_BAR + 1
    }

    /// 1-based bar number
    pub fn bar(&self) -> u32 {
        self.tick_position() / (self.ppq() * BEATS_PER_BAR) + 1
    }

    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn set_sync(&self, external: bool, synced: bool) {
        self.external.store(external, Ordering::Relaxed);
        self.synced.store(synced, Ordering::Relaxed);
    }

    pub fn is_external(&self) -> bool {
        self.external.load(Ordering::Relaxed)
    }

    pub fn is_synced(&self) -> bool {
        self.synced.load(Ordering::Relaxed)
    }

    pub fn set_pulse_counts(&self, clock_pulses: u64, reset_pulses: u64) {
        self.clock_pulses.store(clock_pulses, Ordering::Relaxed);
        self.reset_pulses.store(reset_pulses, Ordering::Relaxed);
    }

    pub fn clock_pulses(&self) -> u64 {
        self.clock_pulses.load(Ordering::Relaxed)
    }

    pub fn reset_pulses(&self) -> u64 {
        self.reset_pulses.load(Ordering::Relaxed)
    }

    pub fn set_message_count(&self, count: u64) {
        self.messages.store(count, Ordering::Relaxed);
    }

    pub fn message_count(&self) -> u64 {
        self.messages.load(Ordering::Relaxed)
    }

    /// Number of tap or external tempo locks seen so far
    pub fn set_tempo_locks(&self, count: u64) {
        self.tempo_locks.store(count, Ordering::Relaxed);
    }

    pub fn tempo_locks(&self) -> u64 {
        self.tempo_locks.load(Ordering::Relaxed)
    }
}
