use clap::Parser;
use crossbeam::channel::{bounded, unbounded, Receiver, Sender};
use dialoguer::Select;
use pllsyncrs::{
    cli::{device_port_name, validate_device, Args, ModuleKind},
    config::Settings,
    create_scheduler, create_shared_state,
    event_loop::TaskLoop,
    handle_device_list,
    input::{run_key_reader, KEY_HELP},
    logging,
    midi::DefaultMidiEngine,
    modules::{ClockModule, ModuleCommand, MonitorModule, RepeaterModule, TaskModule},
    ui::UI,
    Scheduler, SharedState, ThreadScheduler,
};
use std::error::Error;
use std::process;
use std::time::Duration;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

fn main() {
    let args = Args::parse();
    let settings = match load_settings(&args) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error loading settings: {}", e);
            process::exit(1);
        }
    };
    initialize_logging(&settings);

    if let Err(e) = run(args, settings) {
        log::error!("{}", e);
        eprintln!("{}", e);
        process::exit(1);
    }
}

fn load_settings(args: &Args) -> Result<Settings, Box<dyn Error>> {
    let mut settings = Settings::load(args.config.as_deref())?;
    settings.apply_args(args);
    Ok(settings)
}

fn initialize_logging(settings: &Settings) {
    let level = logging::parse_level(&settings.log_level);
    match logging::init_logger(level) {
        Ok(path) => log::info!("Logging to {}", path.display()),
        Err(e) => {
            let _ = env_logger::Builder::new().filter_level(level).try_init();
            log::warn!("File logging unavailable ({}), logging to stderr", e);
        }
    }
    log::info!("Application starting");
    log::debug!("Settings: {:?}", settings);
}

fn run(args: Args, mut settings: Settings) -> Result<(), Box<dyn Error>> {
    let devices = handle_device_list();

    if args.device_list {
        list_available_devices(&devices);
        return Ok(());
    }

    if args.select_device {
        settings.input_device = select_input_device(&devices)?;
    }

    for device in [&settings.input_device, &settings.output_device]
        .into_iter()
        .flatten()
    {
        validate_device(device, &devices)?;
    }

    let engine = DefaultMidiEngine::new(
        settings.input_device.as_deref(),
        settings.output_device.as_deref(),
    )?;

    let module = build_module(args.mode, &settings);
    let scheduler = create_scheduler();
    let shared_state = create_shared_state();
    let interval = Duration::from_micros(settings.task_interval_us() as u64);
    let (shutdown_tx, shutdown_rx) = bounded::<()>(1);
    let (done_tx, done_rx) = bounded::<()>(1);
    let (command_tx, command_rx) = unbounded::<ModuleCommand>();
    let (quit_tx, quit_rx) = unbounded::<()>();

    let ctrlc_quit = quit_tx.clone();
    ctrlc::set_handler(move || {
        let _ = ctrlc_quit.send(());
    })?;

    let task_state = shared_state.clone();
    scheduler.spawn("task-loop", move || {
        let task_loop =
            TaskLoop::new(engine, module, task_state, interval).with_commands(command_rx);
        task_loop.run(shutdown_rx);
        let _ = done_tx.send(());
    });

    run_application_loop(
        &scheduler,
        args.no_status,
        shared_state,
        command_tx,
        (quit_tx, quit_rx),
    );

    drop(shutdown_tx);
    if done_rx.recv_timeout(SHUTDOWN_TIMEOUT).is_err() {
        log::warn!("Task loop did not stop within {:?}", SHUTDOWN_TIMEOUT);
    }
    log::info!("Application stopped");
    Ok(())
}

fn build_module(kind: ModuleKind, settings: &Settings) -> Box<dyn TaskModule> {
    match kind {
        ModuleKind::Clock => Box::new(ClockModule::new(settings.clock_module_config())),
        ModuleKind::Repeater => Box::new(RepeaterModule::new(
            settings.repeater_ports,
            settings.repeater_mode,
            settings.repeater_timing(),
        )),
        ModuleKind::Monitor => Box::new(MonitorModule::new()),
    }
}

fn list_available_devices(devices: &[String]) {
    println!("Available MIDI devices:");
    for device in devices {
        println!("  - {}", device);
    }
}

fn select_input_device(devices: &[String]) -> Result<Option<String>, Box<dyn Error>> {
    let inputs: Vec<&str> = devices
        .iter()
        .filter(|d| d.ends_with("[Input]"))
        .map(|d| device_port_name(d))
        .collect();
    if inputs.is_empty() {
        return Err("No MIDI input devices found".into());
    }
    let choice = Select::new()
        .with_prompt("Select MIDI input device")
        .items(&inputs)
        .default(0)
        .interact_opt()?;
    Ok(choice.map(|i| inputs[i].to_string()))
}

fn run_application_loop(
    scheduler: &ThreadScheduler,
    no_status: bool,
    shared_state: SharedState,
    commands: Sender<ModuleCommand>,
    (quit_tx, quit_rx): (Sender<()>, Receiver<()>),
) {
    log::info!("Application running");
    if no_status {
        println!("\nPress Ctrl+C to exit...");
        let _ = quit_rx.recv();
        return;
    }

    println!("\n{}", KEY_HELP);
    scheduler.spawn("key-reader", move || run_key_reader(commands, quit_tx));
    UI::new(shared_state).run(quit_rx);
}
