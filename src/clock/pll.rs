use super::{
    ClockHandler, ClockSource, IntervalHistory, LockCorrection, NullHandler, PllConfig,
    TransportRequest, DEFAULT_TASK_INTERVAL_US, DEFAULT_TEMPO, EXT_HIST_LEN, EXT_MIN_HIST,
    TAP_HIST_LEN,
};
use crate::midi::{MidiMessage, MIDI_NATIVE_PPQ};
use log::{debug, info, trace};

const US_PER_MINUTE: f64 = 60_000_000.0;

/// MIDI clock with internal free-run and external lock.
///
/// Two tick counters exist: one advances while running, the other while
/// stopped. `run_state` selects which one is the current position.
pub struct ClockPll<H: ClockHandler = NullHandler> {
    handler: H,
    config: PllConfig,
    us_per_tick_min: i64,
    us_per_tick_max: i64,
    internal_ppq: u32,
    upsample: u32,
    task_interval_us: i64,
    // general clock state
    desired_source: ClockSource,
    source: ClockSource,
    desired_run_state: bool,
    run_state: bool,
    request: TransportRequest,
    reset_pending: bool,
    ext_tick_pending: bool,
    tap_pending: bool,
    time_count: i64,
    next_tick_time: i64,
    // internal clock state
    run_tick_count: u32,
    stop_tick_count: u32,
    us_per_beat: i64,
    us_per_tick: i64,
    // external clock recovery state
    ext_intervals: IntervalHistory<EXT_HIST_LEN>,
    ext_tick_count: u32,
    ext_sync_timeout: i64,
    ext_last_tick_time: i64,
    ext_run_tick_count: u32,
    ext_tempo_average: f64,
    ext_tempo_seeded: bool,
    ext_tempo_reported: i64,
    // tap tempo state
    taps: IntervalHistory<TAP_HIST_LEN>,
    tap_count: u32,
    tap_last_time: i64,
}

impl ClockPll<NullHandler> {
    pub fn new() -> Self {
        Self::with_handler(NullHandler)
    }
}

impl Default for ClockPll<NullHandler> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: ClockHandler> ClockPll<H> {
    pub fn with_handler(handler: H) -> Self {
        Self::with_config(PllConfig::default(), handler)
    }

    pub fn with_config(config: PllConfig, handler: H) -> Self {
        let mut pll = Self {
            handler,
            config,
            us_per_tick_min: 1,
            us_per_tick_max: i64::MAX,
            internal_ppq: MIDI_NATIVE_PPQ,
            upsample: 1,
            task_interval_us: DEFAULT_TASK_INTERVAL_US,
            desired_source: ClockSource::Internal,
            source: ClockSource::Internal,
            desired_run_state: false,
            run_state: false,
            request: TransportRequest::Idle,
            reset_pending: false,
            ext_tick_pending: false,
            tap_pending: false,
            time_count: 0,
            next_tick_time: 0,
            run_tick_count: 0,
            stop_tick_count: 0,
            us_per_beat: (US_PER_MINUTE / DEFAULT_TEMPO).round() as i64,
            us_per_tick: 1,
            ext_intervals: IntervalHistory::new(),
            ext_tick_count: 0,
            ext_sync_timeout: 0,
            ext_last_tick_time: 0,
            ext_run_tick_count: 0,
            ext_tempo_average: 0.0,
            ext_tempo_seeded: false,
            ext_tempo_reported: 0,
            taps: IntervalHistory::new(),
            tap_count: 0,
            tap_last_time: 0,
        };
        pll.set_internal_ppq(MIDI_NATIVE_PPQ);
        pll.set_tempo(DEFAULT_TEMPO);
        pll.ext_tempo_average = pll.us_per_tick as f64;
        pll
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    pub fn into_handler(self) -> H {
        self.handler
    }

    pub fn config(&self) -> &PllConfig {
        &self.config
    }

    /// Declares how often `timer_task` runs. Timing scales with the error
    /// between this value and the real call rate.
    pub fn set_task_interval(&mut self, interval_us: i64) {
        self.task_interval_us = interval_us.max(1);
        debug!("Clock task interval: {} us", self.task_interval_us);
    }

    pub fn task_interval_micros(&self) -> i64 {
        self.task_interval_us
    }

    /// Sets the output tick resolution, keeping the programmed tempo.
    ///
    /// The value is rounded down to a multiple of the MIDI native 24 PPQ,
    /// with 24 as the floor.
    pub fn set_internal_ppq(&mut self, ppq: u32) {
        let tempo = self.internal_tempo();
        let ppq = (ppq / MIDI_NATIVE_PPQ).max(1) * MIDI_NATIVE_PPQ;
        self.internal_ppq = ppq;
        self.upsample = ppq / MIDI_NATIVE_PPQ;
        self.us_per_tick_max = (US_PER_MINUTE / (self.config.tempo_min * ppq as f64)) as i64;
        self.us_per_tick_min = ((US_PER_MINUTE / (self.config.tempo_max * ppq as f64)) as i64).max(1);
        debug!(
            "Clock PPQ: {} (upsample {}), tick interval range {}..={} us",
            ppq, self.upsample, self.us_per_tick_min, self.us_per_tick_max
        );
        self.set_tempo(tempo);
    }

    pub fn internal_ppq(&self) -> u32 {
        self.internal_ppq
    }

    /// Internal ticks per incoming MIDI clock tick.
    pub fn upsample_ratio(&self) -> u32 {
        self.upsample
    }

    /// Programs the internal tempo, clamped into the configured range.
    /// While externally synced only the stored tempo changes; the tick
    /// interval stays with the external estimate.
    pub fn set_tempo(&mut self, bpm: f64) {
        if !bpm.is_finite() {
            return;
        }
        let bpm = bpm.clamp(self.config.tempo_min, self.config.tempo_max);
        self.us_per_beat = (US_PER_MINUTE / bpm).round() as i64;
        if !self.is_externally_synced() {
            self.us_per_tick = self.clamp_tick_interval(self.us_per_beat / self.internal_ppq as i64);
        }
        debug!("Tempo {:.2} BPM, {} us per tick", bpm, self.us_per_tick);
    }

    /// Current tempo. While externally synced this is the filtered estimate
    /// of the external tempo, not the value last given to `set_tempo`.
    pub fn tempo(&self) -> f64 {
        if self.is_externally_synced() && self.ext_tempo_seeded {
            return US_PER_MINUTE / self.internal_ppq as f64 / self.ext_tempo_average;
        }
        self.internal_tempo()
    }

    fn internal_tempo(&self) -> f64 {
        US_PER_MINUTE / self.us_per_beat as f64
    }

    /// Interval currently used between internal ticks.
    pub fn tick_interval_micros(&self) -> i64 {
        self.us_per_tick
    }

    /// Records a tap for the next task run. Ignored while externally synced.
    pub fn tap_tempo(&mut self) {
        if self.is_externally_synced() {
            trace!("Tap ignored while externally synced");
            return;
        }
        self.tap_pending = true;
    }

    pub fn continue_request(&mut self) {
        self.request = TransportRequest::Continue;
    }

    pub fn stop_request(&mut self) {
        self.request = TransportRequest::Stop;
    }

    pub fn reset_request(&mut self) {
        self.reset_pending = true;
    }

    /// Requests a clock source; the switch happens in the next task run and
    /// stops the transport.
    pub fn set_source(&mut self, source: ClockSource) {
        self.desired_source = source;
    }

    pub fn source(&self) -> ClockSource {
        self.source
    }

    pub fn desired_source(&self) -> ClockSource {
        self.desired_source
    }

    pub fn is_externally_synced(&self) -> bool {
        self.source == ClockSource::External && self.ext_sync_timeout > 0
    }

    pub fn run_state(&self) -> bool {
        self.run_state
    }

    pub fn tick_position(&self) -> u32 {
        if self.run_state {
            self.run_tick_count
        } else {
            self.stop_tick_count
        }
    }

    pub fn pending_request(&self) -> TransportRequest {
        self.request
    }

    //
    // external clock inputs
    //
    pub fn on_external_tick(&mut self) {
        self.ext_tick_pending = true;
    }

    pub fn on_external_start(&mut self) {
        self.request = TransportRequest::Start;
    }

    pub fn on_external_continue(&mut self) {
        self.request = TransportRequest::Continue;
    }

    pub fn on_external_stop(&mut self) {
        self.request = TransportRequest::Stop;
    }

    /// Routes a realtime message to the external inputs. Anything else is
    /// dropped.
    pub fn handle_message(&mut self, msg: &MidiMessage) {
        match msg {
            MidiMessage::Clock => self.on_external_tick(),
            MidiMessage::Start => self.on_external_start(),
            MidiMessage::Continue => self.on_external_continue(),
            MidiMessage::Stop => self.on_external_stop(),
            _ => {}
        }
    }

    /// Returns to a stopped clock at position zero, dropping pending
    /// requests, external lock and tap history. Tempo, PPQ and source are kept.
    pub fn reset(&mut self) {
        self.request = TransportRequest::Idle;
        self.reset_pending = false;
        self.tap_pending = false;
        self.drop_external_sync();
        self.taps.clear();
        self.tap_count = 0;
        self.desired_run_state = false;
        if self.run_state {
            self.change_run_state(false);
        }
        self.time_count = 0;
        self.next_tick_time = 0;
        self.reset_pos();
    }

    /// One step of the clock. Must be called once per task interval and
    /// never re-entered.
    pub fn timer_task(&mut self) {
        self.apply_requests();
        self.apply_source_change();
        self.apply_run_state();
        self.run_timebase();
        self.recover_external_clock();
        self.check_ext_timeout();
        self.recover_tap_tempo();
    }

    fn apply_requests(&mut self) {
        if std::mem::take(&mut self.reset_pending) {
            self.reset_pos();
        }
        match std::mem::take(&mut self.request) {
            TransportRequest::Start => {
                self.desired_run_state = true;
                self.reset_pos();
            }
            TransportRequest::Continue => self.desired_run_state = true,
            TransportRequest::Stop => self.desired_run_state = false,
            TransportRequest::Idle => {}
        }
    }

    fn apply_source_change(&mut self) {
        if self.source == self.desired_source {
            return;
        }
        self.source = self.desired_source;
        info!("Clock source changed to {}", self.source);
        if self.source == ClockSource::Internal {
            self.drop_external_sync();
        }
        self.handler.on_source_changed(self.source);
        self.desired_run_state = false;
    }

    fn apply_run_state(&mut self) {
        if self.run_state == self.desired_run_state {
            return;
        }
        if !self.desired_run_state {
            self.stop_tick_count = self.run_tick_count;
        }
        self.change_run_state(self.desired_run_state);
    }

    fn run_timebase(&mut self) {
        self.time_count += self.task_interval_us;
        while self.time_count > self.next_tick_time {
            let tick = self.tick_position();
            if tick % self.internal_ppq == 0 {
                self.handler.on_beat_crossed();
            }
            self.handler.on_ticked(tick);

            let next = tick.wrapping_add(1);
            if self.run_state {
                self.run_tick_count = next;
            } else {
                self.stop_tick_count = next;
            }
            self.next_tick_time += self.us_per_tick;
        }
    }

    fn recover_external_clock(&mut self) {
        if !std::mem::take(&mut self.ext_tick_pending) || self.source != ClockSource::External {
            return;
        }
        if self.ext_sync_timeout <= 0 {
            info!("External clock sync acquired");
            self.handler.on_ext_sync_changed(true);
        }
        self.ext_sync_timeout = self.config.ext_sync_timeout_us;

        // the first tick after acquiring sync has no previous tick to measure from
        if self.ext_tick_count > 0 {
            self.ext_intervals
                .push(self.time_count - self.ext_last_tick_time);
            if let Some(average) = self.ext_intervals.average(EXT_MIN_HIST) {
                self.us_per_tick = self.clamp_tick_interval(average / self.upsample as i64);
                self.update_ext_tempo_average();
            }
        }

        if self.run_state {
            self.ext_run_tick_count = self.ext_run_tick_count.wrapping_add(self.upsample);
            let error = self.run_tick_count as i64 - self.ext_run_tick_count as i64;
            let adjusted = self.us_per_tick + self.lock_adjustment(error);
            self.us_per_tick = self.clamp_tick_interval(adjusted);
            trace!(
                "Lock error {} ticks, {} us per tick",
                error,
                self.us_per_tick
            );
        }

        self.ext_last_tick_time = self.time_count;
        self.ext_tick_count = self.ext_tick_count.saturating_add(1);
    }

    fn lock_adjustment(&self, error: i64) -> i64 {
        let step = self.config.ext_error_adj_us;
        match self.config.lock_correction {
            LockCorrection::Fixed => step * error.signum(),
            LockCorrection::Proportional { gain_us_per_tick } => {
                (gain_us_per_tick * error).clamp(-step, step)
            }
        }
    }

    fn update_ext_tempo_average(&mut self) {
        let filter = self.config.ext_tempo_filter;
        if self.ext_tempo_seeded {
            self.ext_tempo_average =
                self.ext_tempo_average * filter + self.us_per_tick as f64 * (1.0 - filter);
        } else {
            self.ext_tempo_average = self.us_per_tick as f64;
            self.ext_tempo_seeded = true;
        }

        let tenths = (US_PER_MINUTE * 10.0 / self.internal_ppq as f64 / self.ext_tempo_average)
            .round() as i64;
        if tenths != self.ext_tempo_reported {
            self.ext_tempo_reported = tenths;
            debug!("External tempo {:.1} BPM", tenths as f64 / 10.0);
            self.handler.on_ext_tempo_changed();
        }
    }

    fn check_ext_timeout(&mut self) {
        if self.ext_sync_timeout <= 0 {
            return;
        }
        self.ext_sync_timeout -= self.task_interval_us;
        if self.ext_sync_timeout <= 0 {
            self.ext_sync_timeout = 0;
            info!("External clock sync lost, stopping");
            self.handler.on_ext_sync_changed(false);
            self.clear_external_estimate();
            self.request = TransportRequest::Stop;
        }
    }

    fn recover_tap_tempo(&mut self) {
        if std::mem::take(&mut self.tap_pending) && self.ext_sync_timeout <= 0 {
            if self.tap_count > 0 {
                self.taps.push(self.time_count - self.tap_last_time);
            }
            self.tap_last_time = self.time_count;
            self.tap_count = self.tap_count.saturating_add(1);

            if let Some(period) = self.taps.average(TAP_HIST_LEN) {
                let ppq = self.internal_ppq as i64;
                self.us_per_tick = self.clamp_tick_interval(period / ppq);
                self.us_per_beat = self.us_per_tick * ppq;
                info!("Tap tempo locked at {:.2} BPM", self.internal_tempo());
                self.handler.on_tap_tempo_locked();
            }
        }

        if self.tap_count > 0 && self.time_count - self.tap_last_time > self.config.tap_timeout_us
        {
            trace!("Tap history timed out");
            self.tap_count = 0;
            self.taps.clear();
        }
    }

    /// Leaves external lock without requesting a stop.
    fn drop_external_sync(&mut self) {
        self.ext_tick_pending = false;
        if self.ext_sync_timeout > 0 {
            self.ext_sync_timeout = 0;
            self.handler.on_ext_sync_changed(false);
        }
        self.clear_external_estimate();
    }

    fn clear_external_estimate(&mut self) {
        self.ext_intervals.clear();
        self.ext_tick_count = 0;
        self.ext_tempo_seeded = false;
        self.us_per_tick = self.clamp_tick_interval(self.us_per_beat / self.internal_ppq as i64);
    }

    fn clamp_tick_interval(&self, us_per_tick: i64) -> i64 {
        us_per_tick.clamp(self.us_per_tick_min, self.us_per_tick_max)
    }

    fn reset_pos(&mut self) {
        self.run_tick_count = 0;
        self.stop_tick_count = 0;
        self.ext_run_tick_count = 0;
        self.handler.on_position_reset();
    }

    fn change_run_state(&mut self, running: bool) {
        self.desired_run_state = running;
        self.run_state = running;
        let was_reset = if running {
            self.run_tick_count == 0
        } else {
            self.stop_tick_count == 0
        };
        info!(
            "Clock {} (position {}, reset {})",
            if running { "running" } else { "stopped" },
            self.tick_position(),
            was_reset
        );
        self.handler.on_run_state_changed(running, was_reset);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ClockEvent;

    #[test]
    fn ppq_is_rounded_to_native_multiples() {
        let mut pll = ClockPll::new();
        pll.set_internal_ppq(100);
        assert_eq!(pll.internal_ppq(), 96);
        assert_eq!(pll.upsample_ratio(), 4);
        pll.set_internal_ppq(5);
        assert_eq!(pll.internal_ppq(), 24);
        assert_eq!(pll.upsample_ratio(), 1);
    }

    #[test]
    fn ppq_change_keeps_tempo() {
        let mut pll = ClockPll::new();
        pll.set_tempo(140.0);
        pll.set_internal_ppq(96);
        assert!((pll.tempo() - 140.0).abs() < 0.01);
        assert_eq!(pll.tick_interval_micros(), (60_000_000 / 140) / 96);
    }

    #[test]
    fn tempo_rounds_to_nearest_micro() {
        let mut pll = ClockPll::new();
        // 218181.8 us per beat
        pll.set_tempo(275.0);
        assert_eq!(pll.us_per_beat, 218_182);
        assert!((pll.tempo() - 275.0).abs() < 0.001);
        pll.set_tempo(299.0);
        assert!((pll.tempo() - 299.0).abs() < 0.001);
    }

    #[test]
    fn tempo_is_clamped_to_range() {
        let mut pll = ClockPll::new();
        pll.set_tempo(1000.0);
        assert!((pll.tempo() - 300.0).abs() < 0.01);
        pll.set_tempo(1.0);
        assert!((pll.tempo() - 30.0).abs() < 0.01);
        pll.set_tempo(f64::NAN);
        assert!((pll.tempo() - 30.0).abs() < 0.01);
    }

    #[test]
    fn fixed_lock_correction_steps_toward_zero_error() {
        let pll = ClockPll::new();
        assert_eq!(pll.lock_adjustment(-7), -500);
        assert_eq!(pll.lock_adjustment(3), 500);
        assert_eq!(pll.lock_adjustment(0), 0);
    }

    #[test]
    fn proportional_lock_correction_is_capped() {
        let config = PllConfig {
            lock_correction: LockCorrection::Proportional {
                gain_us_per_tick: 100,
            },
            ..PllConfig::default()
        };
        let pll = ClockPll::with_config(config, NullHandler);
        assert_eq!(pll.lock_adjustment(2), 200);
        assert_eq!(pll.lock_adjustment(-20), -500);
    }

    #[test]
    fn source_change_forces_stop() {
        let mut pll = ClockPll::with_handler(Vec::<ClockEvent>::new());
        pll.continue_request();
        pll.timer_task();
        assert!(pll.run_state());

        pll.set_source(ClockSource::External);
        pll.handler_mut().clear();
        pll.timer_task();

        assert_eq!(pll.source(), ClockSource::External);
        assert!(!pll.run_state());
        let events = pll.handler();
        assert_eq!(events[0], ClockEvent::SourceChanged(ClockSource::External));
        assert!(matches!(
            events[1],
            ClockEvent::RunStateChanged { running: false, .. }
        ));
    }

    #[test]
    fn stopping_carries_run_position_into_stop_counter() {
        let mut pll = ClockPll::new();
        pll.set_task_interval(pll.tick_interval_micros());
        pll.continue_request();
        for _ in 0..10 {
            pll.timer_task();
        }
        assert_eq!(pll.tick_position(), 10);
        pll.stop_request();
        pll.timer_task();
        // stop counter starts where the run counter stopped and keeps counting
        assert_eq!(pll.tick_position(), 11);
        pll.continue_request();
        pll.timer_task();
        assert_eq!(pll.tick_position(), 11);
    }
}
