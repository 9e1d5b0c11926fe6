// event_loop.rs

use crate::midi::MidiEngine;
use crate::modules::{ModuleCommand, TaskModule};
use crate::state::TransportState;
use crossbeam::channel::{select, tick, Receiver};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Longest backlog worked off after a stall; anything beyond is dropped.
const MAX_CATCH_UP_STEPS: u32 = 4000;

/// Counts whole task intervals elapsed since the last step, carrying the
/// remainder so the long-run step rate matches the interval.
#[derive(Debug)]
struct StepClock {
    interval: Duration,
    last: Instant,
}

impl StepClock {
    fn new(interval: Duration, now: Instant) -> Self {
        Self { interval, last: now }
    }

    fn due(&mut self, now: Instant) -> u32 {
        let elapsed = now.saturating_duration_since(self.last);
        let steps = elapsed.as_nanos() / self.interval.as_nanos();
        if steps > u128::from(MAX_CATCH_UP_STEPS) {
            warn!(
                "Task loop fell {} steps behind, skipping to now",
                steps - u128::from(MAX_CATCH_UP_STEPS)
            );
            self.last = now;
            return MAX_CATCH_UP_STEPS;
        }
        let steps = steps as u32;
        self.last += self.interval * steps;
        steps
    }
}

/// Fixed-rate driver for one module and one MIDI engine.
pub struct TaskLoop<E: MidiEngine, M: TaskModule> {
    engine: E,
    module: M,
    state: Arc<TransportState>,
    commands: Option<Receiver<ModuleCommand>>,
    interval: Duration,
    steps: u64,
    send_errors: u64,
}

impl<E: MidiEngine, M: TaskModule> TaskLoop<E, M> {
    pub fn new(engine: E, module: M, state: Arc<TransportState>, interval: Duration) -> Self {
        TaskLoop {
            engine,
            module,
            state,
            commands: None,
            interval: interval.max(Duration::from_micros(1)),
            steps: 0,
            send_errors: 0,
        }
    }

    /// Controls drained at the start of every step.
    pub fn with_commands(mut self, commands: Receiver<ModuleCommand>) -> Self {
        self.commands = Some(commands);
        self
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn module(&self) -> &M {
        &self.module
    }

    pub fn module_mut(&mut self) -> &mut M {
        &mut self.module
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// One task step: commands, input, module task, output, status.
    pub fn step(&mut self) {
        if let Some(commands) = &self.commands {
            for cmd in commands.try_iter() {
                self.module.handle_command(cmd);
            }
        }

        loop {
            match self.engine.try_recv() {
                Ok(Some(msg)) => self.module.handle_input(&msg),
                Ok(None) => break,
                Err(e) => {
                    warn!("MIDI input error: {}", e);
                    break;
                }
            }
        }

        self.module.run_task();

        while let Some(msg) = self.module.poll_output() {
            if let Err(e) = self.engine.send(msg) {
                if self.send_errors == 0 {
                    error!("Failed to send {:?}: {}", msg, e);
                } else {
                    debug!("Failed to send {:?}: {}", msg, e);
                }
                self.send_errors += 1;
            }
        }

        self.module.publish(&self.state);
        self.steps += 1;
    }

    /// Steps at the configured interval until `shutdown` fires or its
    /// sender is dropped. Late wakeups are made up with extra steps so the
    /// module sees one step per interval of wall time. Returns the module
    /// for inspection.
    pub fn run(mut self, shutdown: Receiver<()>) -> M {
        info!(
            "Task loop started for {} module, interval {:?}",
            self.module.name(),
            self.interval
        );
        let ticker = tick(self.interval);
        let mut clock = StepClock::new(self.interval, Instant::now());
        loop {
            select! {
                recv(shutdown) -> _ => break,
                recv(ticker) -> _ => {
                    for _ in 0..clock.due(Instant::now()) {
                        self.step();
                    }
                }
            }
        }
        info!(
            "Task loop stopped after {} steps ({} send errors)",
            self.steps, self.send_errors
        );
        self.module
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::{MidiMessage, MockMidiEngine};
    use crate::modules::RepeaterModule;
    use crate::repeater::{RepeaterMode, RepeaterTiming};
    use crossbeam::channel::{bounded, unbounded};
    use std::thread;

    #[derive(Default)]
    struct CountingModule {
        tasks: u64,
        commands: Vec<ModuleCommand>,
    }

    impl TaskModule for CountingModule {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn handle_input(&mut self, _msg: &MidiMessage) {}

        fn handle_command(&mut self, cmd: ModuleCommand) {
            self.commands.push(cmd);
        }

        fn run_task(&mut self) {
            self.tasks += 1;
        }

        fn poll_output(&mut self) -> Option<MidiMessage> {
            None
        }

        fn publish(&self, _state: &TransportState) {}
    }

    #[test]
    fn step_clock_carries_remainder() {
        let start = Instant::now();
        let mut clock = StepClock::new(Duration::from_micros(250), start);
        assert_eq!(clock.due(start + Duration::from_micros(100)), 0);
        assert_eq!(clock.due(start + Duration::from_micros(600)), 2);
        // 100 us left over from the previous call
        assert_eq!(clock.due(start + Duration::from_micros(750)), 1);
        assert_eq!(clock.due(start + Duration::from_millis(10)), 37);
    }

    #[test]
    fn step_clock_drops_long_stalls() {
        let start = Instant::now();
        let mut clock = StepClock::new(Duration::from_micros(250), start);
        assert_eq!(clock.due(start + Duration::from_secs(10)), MAX_CATCH_UP_STEPS);
        assert_eq!(clock.due(start + Duration::from_secs(10)), 0);
    }

    #[test]
    fn run_keeps_step_rate_over_wall_time() {
        let interval = Duration::from_micros(250);
        let state = Arc::new(TransportState::new());
        let task_loop = TaskLoop::new(
            MockMidiEngine::new(),
            CountingModule::default(),
            state,
            interval,
        );
        let (shutdown_tx, shutdown_rx) = bounded(1);

        let started = Instant::now();
        let handle = thread::spawn(move || task_loop.run(shutdown_rx));
        let window = Duration::from_millis(400);
        thread::sleep(window);
        shutdown_tx.send(()).unwrap();
        let module = handle.join().unwrap();
        let elapsed = started.elapsed();

        let minimum = (window.as_micros() / interval.as_micros()) as u64;
        let maximum = (elapsed.as_micros() / interval.as_micros()) as u64;
        assert!(
            module.tasks * 100 >= minimum * 95,
            "{} steps in {:?}, expected about {}",
            module.tasks,
            window,
            minimum
        );
        assert!(module.tasks <= maximum);
    }

    #[test]
    fn commands_reach_module_before_task() {
        let (tx, rx) = unbounded();
        let mut task_loop = TaskLoop::new(
            MockMidiEngine::new(),
            CountingModule::default(),
            Arc::new(TransportState::new()),
            Duration::from_millis(1),
        )
        .with_commands(rx);
        tx.send(ModuleCommand::ToggleRun).unwrap();
        tx.send(ModuleCommand::TapTempo).unwrap();
        task_loop.step();
        task_loop.step();

        let module = task_loop.module();
        assert_eq!(
            module.commands,
            vec![ModuleCommand::ToggleRun, ModuleCommand::TapTempo]
        );
        assert_eq!(module.tasks, 2);
    }

    #[test]
    fn step_moves_input_through_module() {
        let cc = MidiMessage::control_change(0, 1, 2);
        let engine = MockMidiEngine::with_input([cc, cc, MidiMessage::Clock]);
        let sent = engine.sent_log();
        let module = RepeaterModule::new(1, RepeaterMode::Off, RepeaterTiming::default());
        let state = Arc::new(TransportState::new());
        let mut task_loop =
            TaskLoop::new(engine, module, state.clone(), Duration::from_millis(1));

        task_loop.step();

        assert_eq!(*sent.lock().unwrap(), vec![cc]);
        assert_eq!(state.message_count(), 3);
        assert_eq!(task_loop.steps(), 1);
    }
}
