// input.rs

use crate::modules::ModuleCommand;
use crossbeam::channel::Sender;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use log::{debug, info, warn};
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// What a key press asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Command(ModuleCommand),
    Quit,
}

pub fn map_key_event(key: KeyEvent) -> Option<KeyAction> {
    if key.kind == KeyEventKind::Release {
        return None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') | KeyCode::Char('C') => Some(KeyAction::Quit),
            _ => None,
        };
    }
    let cmd = match key.code {
        KeyCode::Char(' ') => ModuleCommand::ToggleRun,
        KeyCode::Char('r') | KeyCode::Char('R') => ModuleCommand::Reset,
        KeyCode::Char('t') | KeyCode::Char('T') => ModuleCommand::TapTempo,
        KeyCode::Char('e') | KeyCode::Char('E') => ModuleCommand::ToggleSource,
        KeyCode::Char('a') | KeyCode::Char('A') => ModuleCommand::ToggleAutostart,
        KeyCode::Char('m') | KeyCode::Char('M') => ModuleCommand::NextMode,
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => return Some(KeyAction::Quit),
        _ => return None,
    };
    Some(KeyAction::Command(cmd))
}

pub const KEY_HELP: &str =
    "space run/stop | r reset | t tap | e int/ext | a autostart | m repeater mode | q quit";

/// Reads the terminal in raw mode and forwards mapped keys until a quit key
/// arrives or the command receiver goes away, then signals `quit`. The
/// terminal is back in cooked mode by the time `quit` fires.
pub fn run_key_reader(commands: Sender<ModuleCommand>, quit: Sender<()>) {
    if let Err(e) = enable_raw_mode() {
        warn!("Keyboard control unavailable: {}", e);
        return;
    }
    debug!("Key reader started");

    loop {
        match event::poll(POLL_INTERVAL) {
            Ok(false) => continue,
            Ok(true) => {}
            Err(e) => {
                warn!("Keyboard read failed: {}", e);
                break;
            }
        }
        let key = match event::read() {
            Ok(Event::Key(key)) => key,
            Ok(_) => continue,
            Err(e) => {
                warn!("Keyboard read failed: {}", e);
                break;
            }
        };
        match map_key_event(key) {
            Some(KeyAction::Command(cmd)) => {
                if commands.send(cmd).is_err() {
                    break;
                }
            }
            Some(KeyAction::Quit) => {
                info!("Quit requested from keyboard");
                break;
            }
            None => {}
        }
    }

    if let Err(e) = disable_raw_mode() {
        warn!("Failed to restore terminal: {}", e);
    }
    let _ = quit.send(());
}
