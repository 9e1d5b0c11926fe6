use super::{ModuleCommand, TaskModule};
use crate::clock::{ClockHandler, ClockPll, ClockSource, PllConfig, DEFAULT_TEMPO};
use crate::midi::{MidiMessage, MIDI_NATIVE_PPQ};
use crate::state::TransportState;
use crossbeam::channel::{unbounded, Receiver, Sender};
use log::{debug, info};

/// Largest clock output divider
pub const OUTPUT_DIV_MAX: u32 = 24;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockModuleConfig {
    pub task_interval_us: i64,
    pub internal_ppq: u32,
    pub tempo: f64,
    pub source: ClockSource,
    pub output_div: u32,
    pub autostart: bool,
    pub pll: PllConfig,
}

impl Default for ClockModuleConfig {
    fn default() -> Self {
        Self {
            task_interval_us: 1_000_000 / crate::DEFAULT_TASK_RATE_HZ as i64,
            internal_ppq: MIDI_NATIVE_PPQ,
            tempo: DEFAULT_TEMPO,
            source: ClockSource::Internal,
            output_div: 1,
            autostart: false,
            pll: PllConfig::default(),
        }
    }
}

/// Clock handler that turns clock events into MIDI output and pulse counts.
pub struct ClockOutput {
    tx: Sender<MidiMessage>,
    upsample: u32,
    output_div: u32,
    active_div: u32,
    div_count: u32,
    running: bool,
    clock_pulses: u64,
    reset_pulses: u64,
    sync_acquired: bool,
    tempo_changed: bool,
}

impl ClockOutput {
    pub fn new(tx: Sender<MidiMessage>) -> Self {
        Self {
            tx,
            upsample: 1,
            output_div: 1,
            active_div: 1,
            div_count: 0,
            running: false,
            clock_pulses: 0,
            reset_pulses: 0,
            sync_acquired: false,
            tempo_changed: false,
        }
    }

    /// Requested divider; it takes effect on the next beat.
    pub fn set_output_div(&mut self, div: u32) {
        self.output_div = div.clamp(1, OUTPUT_DIV_MAX);
    }

    pub fn output_div(&self) -> u32 {
        self.output_div
    }

    /// Divider currently applied to the pulse output
    pub fn active_div(&self) -> u32 {
        self.active_div
    }

    pub fn clock_pulses(&self) -> u64 {
        self.clock_pulses
    }

    pub fn reset_pulses(&self) -> u64 {
        self.reset_pulses
    }

    fn send(&self, msg: MidiMessage) {
        // receiver lives in the owning module
        let _ = self.tx.send(msg);
    }
}

impl ClockHandler for ClockOutput {
    fn on_beat_crossed(&mut self) {
        if self.active_div != self.output_div {
            debug!("Output divider now {}", self.output_div);
            self.active_div = self.output_div;
            self.div_count = 0;
        }
    }

    fn on_run_state_changed(&mut self, running: bool, was_reset: bool) {
        self.running = running;
        self.send(match (running, was_reset) {
            (true, true) => MidiMessage::Start,
            (true, false) => MidiMessage::Continue,
            (false, _) => MidiMessage::Stop,
        });
    }

    fn on_source_changed(&mut self, source: ClockSource) {
        debug!("Clock output following {} source", source);
    }

    fn on_tap_tempo_locked(&mut self) {
        self.tempo_changed = true;
    }

    fn on_ticked(&mut self, tick: u32) {
        if !self.running {
            return;
        }
        if tick % self.upsample == 0 {
            self.send(MidiMessage::Clock);
        }
        if self.div_count == 0 {
            self.clock_pulses += 1;
        }
        self.div_count += 1;
        if self.div_count >= self.active_div {
            self.div_count = 0;
        }
    }

    fn on_position_reset(&mut self) {
        self.reset_pulses += 1;
        self.div_count = 0;
        if self.running {
            self.send(MidiMessage::Start);
        }
    }

    fn on_ext_tempo_changed(&mut self) {
        self.tempo_changed = true;
    }

    fn on_ext_sync_changed(&mut self, synced: bool) {
        if synced {
            self.sync_acquired = true;
        }
    }
}

/// MIDI clock generator: internal tempo or locked to incoming clock.
pub struct ClockModule {
    pll: ClockPll<ClockOutput>,
    rx: Receiver<MidiMessage>,
    autostart: bool,
    tempo_locks: u64,
}

impl ClockModule {
    pub fn new(config: ClockModuleConfig) -> Self {
        let (tx, rx) = unbounded();
        let mut output = ClockOutput::new(tx);
        output.set_output_div(config.output_div);
        output.active_div = output.output_div;

        let mut pll = ClockPll::with_config(config.pll, output);
        pll.set_task_interval(config.task_interval_us);
        pll.set_source(config.source);

        let mut module = Self {
            pll,
            rx,
            autostart: config.autostart,
            tempo_locks: 0,
        };
        module.set_internal_ppq(config.internal_ppq);
        module.pll.set_tempo(config.tempo);

        if module.autostart && config.source == ClockSource::Internal {
            info!("Autostart enabled, starting internal clock");
            module.pll.reset_request();
            module.pll.continue_request();
        }
        module
    }

    pub fn pll(&self) -> &ClockPll<ClockOutput> {
        &self.pll
    }

    pub fn pll_mut(&mut self) -> &mut ClockPll<ClockOutput> {
        &mut self.pll
    }

    pub fn set_internal_ppq(&mut self, ppq: u32) {
        self.pll.set_internal_ppq(ppq);
        let upsample = self.pll.upsample_ratio();
        self.pll.handler_mut().upsample = upsample;
    }

    pub fn set_output_div(&mut self, div: u32) {
        self.pll.handler_mut().set_output_div(div);
    }

    pub fn set_autostart(&mut self, autostart: bool) {
        self.autostart = autostart;
    }

    pub fn autostart(&self) -> bool {
        self.autostart
    }

    /// Run/stop button
    pub fn toggle_run(&mut self) {
        if self.pll.run_state() {
            self.pll.stop_request();
        } else {
            self.pll.continue_request();
        }
    }

    /// Flips between internal and external clock. Applied on the next task.
    pub fn toggle_source(&mut self) {
        let source = match self.pll.desired_source() {
            ClockSource::Internal => ClockSource::External,
            ClockSource::External => ClockSource::Internal,
        };
        info!("Clock source -> {}", source);
        self.pll.set_source(source);
    }

    /// True once after the tempo display value moved
    pub fn take_tempo_changed(&mut self) -> bool {
        std::mem::take(&mut self.pll.handler_mut().tempo_changed)
    }

    /// Tap and external tempo locks since startup
    pub fn tempo_locks(&self) -> u64 {
        self.tempo_locks
    }
}

impl TaskModule for ClockModule {
    fn name(&self) -> &'static str {
        "clock"
    }

    fn handle_input(&mut self, msg: &MidiMessage) {
        if msg.is_realtime() {
            self.pll.handle_message(msg);
        }
    }

    fn handle_command(&mut self, cmd: ModuleCommand) {
        debug!("Clock command {:?}", cmd);
        match cmd {
            ModuleCommand::ToggleRun => self.toggle_run(),
            ModuleCommand::Reset => self.pll.reset_request(),
            ModuleCommand::TapTempo => self.pll.tap_tempo(),
            ModuleCommand::ToggleSource => self.toggle_source(),
            ModuleCommand::ToggleAutostart => {
                self.set_autostart(!self.autostart);
                info!("Autostart {}", if self.autostart { "on" } else { "off" });
            }
            ModuleCommand::NextMode => {}
        }
    }

    fn run_task(&mut self) {
        self.pll.timer_task();
        if std::mem::take(&mut self.pll.handler_mut().sync_acquired) && self.autostart {
            info!("External clock detected, autostarting");
            self.pll.continue_request();
        }
        if self.take_tempo_changed() {
            self.tempo_locks += 1;
            debug!("Tempo now {:.1} BPM", self.pll.tempo());
        }
    }

    fn poll_output(&mut self) -> Option<MidiMessage> {
        self.rx.try_recv().ok()
    }

    fn publish(&self, state: &TransportState) {
        let output = self.pll.handler();
        state.set_tempo(self.pll.tempo());
        state.set_position(self.pll.tick_position(), self.pll.internal_ppq());
        state.set_running(self.pll.run_state());
        state.set_sync(
            self.pll.source() == ClockSource::External,
            self.pll.is_externally_synced(),
        );
        state.set_pulse_counts(output.clock_pulses(), output.reset_pulses());
        state.set_tempo_locks(self.tempo_locks);
    }
}
