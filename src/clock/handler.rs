use super::ClockSource;

/// Receives everything the clock has to say during `timer_task`.
///
/// The clock owns its handler, so callbacks cannot reach back into the
/// clock. A handler that needs to react (e.g. autostart on sync) records
/// the intent and its owner issues the request after the task returns.
pub trait ClockHandler {
    /// A quarter-note boundary is about to be ticked
    fn on_beat_crossed(&mut self);

    /// Run state was applied; `was_reset` is true when the active counter is at zero
    fn on_run_state_changed(&mut self, running: bool, was_reset: bool);

    fn on_source_changed(&mut self, source: ClockSource);

    fn on_tap_tempo_locked(&mut self);

    /// One internal tick at `tick` (the position before advancing)
    fn on_ticked(&mut self, tick: u32);

    fn on_position_reset(&mut self);

    /// The filtered external tempo moved by at least 0.1 BPM
    fn on_ext_tempo_changed(&mut self);

    fn on_ext_sync_changed(&mut self, synced: bool);
}

/// Handler that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHandler;

impl ClockHandler for NullHandler {
    fn on_beat_crossed(&mut self) {}
    fn on_run_state_changed(&mut self, _running: bool, _was_reset: bool) {}
    fn on_source_changed(&mut self, _source: ClockSource) {}
    fn on_tap_tempo_locked(&mut self) {}
    fn on_ticked(&mut self, _tick: u32) {}
    fn on_position_reset(&mut self) {}
    fn on_ext_tempo_changed(&mut self) {}
    fn on_ext_sync_changed(&mut self, _synced: bool) {}
}

/// A clock callback captured as data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockEvent {
    BeatCrossed,
    RunStateChanged { running: bool, was_reset: bool },
    SourceChanged(ClockSource),
    TapTempoLocked,
    Ticked(u32),
    PositionReset,
    ExtTempoChanged,
    ExtSyncChanged(bool),
}

/// Records events in order. Allocates, so keep it off real-time paths.
impl ClockHandler for Vec<ClockEvent> {
    fn on_beat_crossed(&mut self) {
        self.push(ClockEvent::BeatCrossed);
    }

    fn on_run_state_changed(&mut self, running: bool, was_reset: bool) {
        self.push(ClockEvent::RunStateChanged { running, was_reset });
    }

    fn on_source_changed(&mut self, source: ClockSource) {
        self.push(ClockEvent::SourceChanged(source));
    }

    fn on_tap_tempo_locked(&mut self) {
        self.push(ClockEvent::TapTempoLocked);
    }

    fn on_ticked(&mut self, tick: u32) {
        self.push(ClockEvent::Ticked(tick));
    }

    fn on_position_reset(&mut self) {
        self.push(ClockEvent::PositionReset);
    }

    fn on_ext_tempo_changed(&mut self) {
        self.push(ClockEvent::ExtTempoChanged);
    }

    fn on_ext_sync_changed(&mut self, synced: bool) {
        self.push(ClockEvent::ExtSyncChanged(synced));
    }
}

impl<H: ClockHandler + ?Sized> ClockHandler for Box<H> {
    fn on_beat_crossed(&mut self) {
        (**self).on_beat_crossed()
    }
    fn on_run_state_changed(&mut self, running: bool, was_reset: bool) {
        (**self).on_run_state_changed(running, was_reset)
    }
    fn on_source_changed(&mut self, source: ClockSource) {
        (**self).on_source_changed(source)
    }
    fn on_tap_tempo_locked(&mut self) {
        (**self).on_tap_tempo_locked()
    }
    fn on_ticked(&mut self, tick: u32) {
        (**self).on_ticked(tick)
    }
    fn on_position_reset(&mut self) {
        (**self).on_position_reset()
    }
    fn on_ext_tempo_changed(&mut self) {
        (**self).on_ext_tempo_changed()
    }
    fn on_ext_sync_changed(&mut self, synced: bool) {
        (**self).on_ext_sync_changed(synced)
    }
}

impl<H: ClockHandler + ?Sized> ClockHandler for &mut H {
    fn on_beat_crossed(&mut self) {
        (**self).on_beat_crossed()
    }
    fn on_run_state_changed(&mut self, running: bool, was_reset: bool) {
        (**self).on_run_state_changed(running, was_reset)
    }
    fn on_source_changed(&mut self, source: ClockSource) {
        (**self).on_source_changed(source)
    }
    fn on_tap_tempo_locked(&mut self) {
        (**self).on_tap_tempo_locked()
    }
    fn on_ticked(&mut self, tick: u32) {
        (**self).on_ticked(tick)
    }
    fn on_position_reset(&mut self) {
        (**self).on_position_reset()
    }
    fn on_ext_tempo_changed(&mut self) {
        (**self).on_ext_tempo_changed()
    }
    fn on_ext_sync_changed(&mut self, synced: bool) {
        (**self).on_ext_sync_changed(synced)
    }
}
