extern crate pllsyncrs;

use crossbeam::channel::{bounded, unbounded};
use pllsyncrs::clock::ClockSource;
use pllsyncrs::event_loop::TaskLoop;
use pllsyncrs::midi::{MidiMessage, MockMidiEngine};
use pllsyncrs::modules::{ClockModule, ClockModuleConfig, ModuleCommand, RepeaterModule};
use pllsyncrs::repeater::{RepeaterMode, RepeaterTiming};
use pllsyncrs::state::TransportState;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn clock_config() -> ClockModuleConfig {
    ClockModuleConfig {
        task_interval_us: 1_000,
        ..ClockModuleConfig::default()
    }
}

#[test]
fn integration_test_task_loop_runs_until_shutdown() {
    let engine = MockMidiEngine::new();
    let sent = engine.sent_log();
    let state = Arc::new(TransportState::new());
    let module = ClockModule::new(ClockModuleConfig {
        autostart: true,
        ..clock_config()
    });
    let task_loop = TaskLoop::new(engine, module, state.clone(), Duration::from_millis(1));

    let (shutdown_tx, shutdown_rx) = bounded(1);
    let handle = thread::spawn(move || task_loop.run(shutdown_rx));

    thread::sleep(Duration::from_millis(100));
    shutdown_tx.send(()).unwrap();
    let module = handle.join().expect("Task loop thread panicked");

    let sent = sent.lock().unwrap();
    assert_eq!(sent.first(), Some(&MidiMessage::Start));
    assert!(sent.contains(&MidiMessage::Clock));
    assert!(module.pll().run_state());
    assert!(state.is_running());
}

#[test]
fn integration_test_dropped_shutdown_sender_stops_loop() {
    let state = Arc::new(TransportState::new());
    let module = RepeaterModule::new(1, RepeaterMode::Off, RepeaterTiming::default());
    let task_loop = TaskLoop::new(
        MockMidiEngine::new(),
        module,
        state,
        Duration::from_millis(1),
    );

    let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
    let handle = thread::spawn(move || task_loop.run(shutdown_rx));
    drop(shutdown_tx);
    handle.join().expect("Task loop thread panicked");
}

#[test]
fn integration_test_external_clock_autostart() {
    let engine = MockMidiEngine::new();
    let sent = engine.sent_log();
    let state = Arc::new(TransportState::new());
    let module = ClockModule::new(ClockModuleConfig {
        source: ClockSource::External,
        autostart: true,
        ..clock_config()
    });
    let mut task_loop = TaskLoop::new(engine, module, state.clone(), Duration::from_millis(1));

    // 20 ms per clock is 125 BPM
    for _ in 0..12 {
        task_loop.engine_mut().push_input(MidiMessage::Clock);
        for _ in 0..20 {
            task_loop.step();
        }
    }

    assert!(task_loop.module().pll().is_externally_synced());
    assert_eq!(task_loop.module().pll().tick_interval_micros(), 20_000);
    assert!(state.is_running());
    assert!(state.is_synced());
    assert!((state.tempo() - 125.0).abs() < 0.01);

    let sent = sent.lock().unwrap();
    assert_eq!(sent.first(), Some(&MidiMessage::Start));
    assert!(sent.iter().filter(|m| **m == MidiMessage::Clock).count() >= 8);
}

#[test]
fn integration_test_repeater_dedup_through_loop() {
    let cc = MidiMessage::control_change(0, 74, 64);
    let engine = MockMidiEngine::with_input([cc, cc, cc]);
    let sent = engine.sent_log();
    let state = Arc::new(TransportState::new());
    let module = RepeaterModule::new(3, RepeaterMode::Off, RepeaterTiming::default());
    let mut task_loop = TaskLoop::new(engine, module, state.clone(), Duration::from_millis(1));

    task_loop.step();
    task_loop.engine_mut().push_input(MidiMessage::control_change(0, 74, 65));
    task_loop.step();

    assert_eq!(
        *sent.lock().unwrap(),
        vec![cc, MidiMessage::control_change(0, 74, 65)]
    );
    assert_eq!(state.message_count(), 4);
}

#[test]
fn integration_test_clock_output_keeps_tempo_in_real_time() {
    let engine = MockMidiEngine::new();
    let sent = engine.sent_log();
    let state = Arc::new(TransportState::new());
    let config = ClockModuleConfig::default();
    let interval = Duration::from_micros(config.task_interval_us as u64);
    let mut module = ClockModule::new(config);
    module.pll_mut().continue_request();
    let task_loop = TaskLoop::new(engine, module, state, interval);

    let (shutdown_tx, shutdown_rx) = bounded(1);
    let started = Instant::now();
    let handle = thread::spawn(move || task_loop.run(shutdown_rx));
    let window = Duration::from_secs(1);
    thread::sleep(window);
    shutdown_tx.send(()).unwrap();
    handle.join().expect("Task loop thread panicked");
    let elapsed = started.elapsed();

    // 120 BPM at 24 clocks per beat
    let clocks_per_sec = 48.0;
    let clocks = sent
        .lock()
        .unwrap()
        .iter()
        .filter(|m| **m == MidiMessage::Clock)
        .count() as f64;
    assert!(
        clocks >= clocks_per_sec * window.as_secs_f64() * 0.95,
        "{} clocks in {:?}",
        clocks,
        window
    );
    assert!(clocks <= clocks_per_sec * elapsed.as_secs_f64() + 1.0);
}

#[test]
fn integration_test_commands_control_clock() {
    let engine = MockMidiEngine::new();
    let sent = engine.sent_log();
    let state = Arc::new(TransportState::new());
    let module = ClockModule::new(clock_config());
    let (command_tx, command_rx) = unbounded();
    let mut task_loop = TaskLoop::new(engine, module, state.clone(), Duration::from_millis(1))
        .with_commands(command_rx);

    command_tx.send(ModuleCommand::ToggleRun).unwrap();
    task_loop.step();
    assert!(state.is_running());

    command_tx.send(ModuleCommand::Reset).unwrap();
    task_loop.step();
    assert_eq!(state.reset_pulses(), 1);

    command_tx.send(ModuleCommand::ToggleRun).unwrap();
    task_loop.step();
    assert!(!state.is_running());

    let sent = sent.lock().unwrap();
    // starting from zero is a Start, and so is the reset while running
    assert_eq!(sent.first(), Some(&MidiMessage::Start));
    assert_eq!(sent.iter().filter(|m| **m == MidiMessage::Start).count(), 2);
    assert_eq!(sent.last(), Some(&MidiMessage::Stop));
}
