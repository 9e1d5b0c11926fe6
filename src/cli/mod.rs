use crate::clock::ClockSource;
use crate::repeater::RepeaterMode;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Which module the task loop drives
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModuleKind {
    Clock,
    Repeater,
    Monitor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceArg {
    Internal,
    External,
}

impl From<SourceArg> for ClockSource {
    fn from(arg: SourceArg) -> Self {
        match arg {
            SourceArg::Internal => ClockSource::Internal,
            SourceArg::External => ClockSource::External,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RepeaterModeArg {
    /// Suppress repeated values
    Off,
    /// Pass everything through
    On,
    /// Regenerate the last value periodically
    Gen,
}

impl From<RepeaterModeArg> for RepeaterMode {
    fn from(arg: RepeaterModeArg) -> Self {
        match arg {
            RepeaterModeArg::Off => RepeaterMode::Off,
            RepeaterModeArg::On => RepeaterMode::PassThrough,
            RepeaterModeArg::Gen => RepeaterMode::Regenerate,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// List available MIDI devices
    #[arg(long)]
    pub device_list: bool,

    /// Bind to a specific MIDI input device
    #[arg(long)]
    pub bind_to_device: Option<String>,

    /// MIDI output device
    #[arg(long)]
    pub output_device: Option<String>,

    /// Pick the input device interactively
    #[arg(long)]
    pub select_device: bool,

    /// Module to run
    #[arg(long, value_enum, default_value_t = ModuleKind::Clock)]
    pub mode: ModuleKind,

    /// Internal tempo in BPM
    #[arg(long)]
    pub tempo: Option<f64>,

    /// Internal pulses per quarter note (multiple of 24)
    #[arg(long)]
    pub ppq: Option<u32>,

    /// Clock source
    #[arg(long, value_enum)]
    pub source: Option<SourceArg>,

    /// Repeater mode
    #[arg(long, value_enum)]
    pub repeater_mode: Option<RepeaterModeArg>,

    /// Clock pulse output divider (1-24)
    #[arg(long)]
    pub output_div: Option<u32>,

    /// Start when the clock comes up or external sync is found
    #[arg(long)]
    pub autostart: bool,

    /// Settings file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Disable the terminal status display
    #[arg(long)]
    pub no_status: bool,
}

pub fn validate_device(device_name: &str, devices: &[String]) -> Result<(), String> {
    if !devices.iter().any(|d| d.contains(device_name)) {
        let mut error_msg = format!(
            "Error: Device '{}' not found in available devices:\n",
            device_name
        );
        for device in devices {
            error_msg.push_str(&format!("  - {}\n", device));
        }
        return Err(error_msg);
    }
    Ok(())
}

/// Strips the " [Input]" / " [Output]" label from a device list entry.
pub fn device_port_name(entry: &str) -> &str {
    entry
        .strip_suffix(" [Input]")
        .or_else(|| entry.strip_suffix(" [Output]"))
        .unwrap_or(entry)
}
