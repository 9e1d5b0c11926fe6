// config.rs

use crate::cli::Args;
use crate::clock::{ClockSource, PllConfig, DEFAULT_TEMPO, TEMPO_MAX, TEMPO_MIN};
use crate::midi::MIDI_NATIVE_PPQ;
use crate::modules::ClockModuleConfig;
use crate::repeater::{RepeaterMode, RepeaterTiming};
use ::config::{Config, ConfigError, Environment, File};
use log::debug;
use serde::Deserialize;
use std::path::Path;

/// Environment variable prefix, e.g. `PLLSYNC_TEMPO=98`
pub const ENV_PREFIX: &str = "PLLSYNC";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Settings {
    pub task_rate_hz: u32,
    pub internal_ppq: u32,
    pub tempo: f64,
    pub tempo_min: f64,
    pub tempo_max: f64,
    pub clock_source: ClockSource,
    pub output_div: u32,
    pub autostart: bool,
    pub repeater_mode: RepeaterMode,
    pub repeater_ports: usize,
    #[serde(default)]
    pub input_device: Option<String>,
    #[serde(default)]
    pub output_device: Option<String>,
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            task_rate_hz: crate::DEFAULT_TASK_RATE_HZ,
            internal_ppq: MIDI_NATIVE_PPQ,
            tempo: DEFAULT_TEMPO,
            tempo_min: TEMPO_MIN,
            tempo_max: TEMPO_MAX,
            clock_source: ClockSource::Internal,
            output_div: 1,
            autostart: false,
            repeater_mode: RepeaterMode::Off,
            repeater_ports: 3,
            input_device: None,
            output_device: None,
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Defaults, then the optional settings file, then `PLLSYNC_*` variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let defaults = Settings::default();
        let mut builder = Config::builder()
            .set_default("task_rate_hz", i64::from(defaults.task_rate_hz))?
            .set_default("internal_ppq", i64::from(defaults.internal_ppq))?
            .set_default("tempo", defaults.tempo)?
            .set_default("tempo_min", defaults.tempo_min)?
            .set_default("tempo_max", defaults.tempo_max)?
            .set_default("clock_source", defaults.clock_source.to_string())?
            .set_default("output_div", i64::from(defaults.output_div))?
            .set_default("autostart", defaults.autostart)?
            .set_default("repeater_mode", defaults.repeater_mode.to_string())?
            .set_default("repeater_ports", defaults.repeater_ports as i64)?
            .set_default("log_level", defaults.log_level)?;

        if let Some(path) = path {
            debug!("Loading settings from {}", path.display());
            builder = builder.add_source(File::from(path));
        }

        let settings: Settings = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;
        Ok(settings.normalized())
    }

    /// Command-line values win over everything else.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(tempo) = args.tempo {
            self.tempo = tempo;
        }
        if let Some(ppq) = args.ppq {
            self.internal_ppq = ppq;
        }
        if let Some(source) = args.source {
            self.clock_source = source.into();
        }
        if let Some(mode) = args.repeater_mode {
            self.repeater_mode = mode.into();
        }
        if let Some(div) = args.output_div {
            self.output_div = div;
        }
        if args.autostart {
            self.autostart = true;
        }
        if let Some(device) = &args.bind_to_device {
            self.input_device = Some(device.clone());
        }
        if let Some(device) = &args.output_device {
            self.output_device = Some(device.clone());
        }
        if let Some(level) = &args.log_level {
            self.log_level = level.clone();
        }
        *self = std::mem::take(self).normalized();
    }

    fn normalized(mut self) -> Self {
        self.task_rate_hz = self.task_rate_hz.max(1);
        self.repeater_ports = self.repeater_ports.max(1);
        self
    }

    pub fn task_interval_us(&self) -> i64 {
        1_000_000 / i64::from(self.task_rate_hz.max(1))
    }

    pub fn clock_module_config(&self) -> ClockModuleConfig {
        ClockModuleConfig {
            task_interval_us: self.task_interval_us(),
            internal_ppq: self.internal_ppq,
            tempo: self.tempo,
            source: self.clock_source,
            output_div: self.output_div,
            autostart: self.autostart,
            pll: PllConfig::with_tempo_range(self.tempo_min, self.tempo_max),
        }
    }

    pub fn repeater_timing(&self) -> RepeaterTiming {
        RepeaterTiming::for_task_rate(self.task_rate_hz)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::fs;

    #[test]
    fn file_overrides_defaults() {
        let path = std::env::temp_dir().join(format!("pllsyncrs-{}.toml", std::process::id()));
        fs::write(
            &path,
            "tempo = 98.5\nclock_source = \"external\"\nrepeater_mode = \"gen\"\ninput_device = \"Synth\"\n",
        )
        .unwrap();

        let settings = Settings::load(Some(&path)).unwrap();
        let _ = fs::remove_file(&path);

        assert_eq!(settings.tempo, 98.5);
        assert_eq!(settings.clock_source, ClockSource::External);
        assert_eq!(settings.repeater_mode, RepeaterMode::Regenerate);
        assert_eq!(settings.input_device.as_deref(), Some("Synth"));
        assert_eq!(settings.task_rate_hz, 4000);
        assert_eq!(settings.output_device, None);
    }

    #[test]
    fn args_override_settings() {
        let args = Args::parse_from([
            "test",
            "--tempo",
            "140",
            "--source",
            "external",
            "--repeater-mode",
            "on",
            "--bind-to-device",
            "Mock Device 1",
        ]);
        let mut settings = Settings::default();
        settings.apply_args(&args);
        assert_eq!(settings.tempo, 140.0);
        assert_eq!(settings.clock_source, ClockSource::External);
        assert_eq!(settings.repeater_mode, RepeaterMode::PassThrough);
        assert_eq!(settings.input_device.as_deref(), Some("Mock Device 1"));
    }

    #[test]
    fn derived_timing() {
        let settings = Settings::default();
        assert_eq!(settings.task_interval_us(), 250);
        assert_eq!(settings.repeater_timing().check_interval, 400);
        let clock = settings.clock_module_config();
        assert_eq!(clock.pll.tempo_min, 30.0);
        assert_eq!(clock.task_interval_us, 250);
    }
}
