use chrono::Local;
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};
use std::fs::{self, OpenOptions};
use std::io::{Error, ErrorKind};
use std::path::PathBuf;

/// Directory log files go to: `$HOME/.local/share/pllsyncrs/logs`.
pub fn log_dir() -> Result<PathBuf, Error> {
    let home = std::env::var("HOME")
        .map_err(|_| Error::new(ErrorKind::NotFound, "HOME environment variable not set"))?;

    Ok(PathBuf::from(home)
        .join(".local")
        .join("share")
        .join("pllsyncrs")
        .join("logs"))
}

/// Installs a file logger writing to `<log_dir>/<date>.log`.
pub fn init_logger(level: LevelFilter) -> Result<PathBuf, Error> {
    let log_dir = log_dir()?;
    fs::create_dir_all(&log_dir)?;

    let path = log_dir.join(format!("{}.log", Local::now().format("%Y-%m-%d")));
    let log_file = OpenOptions::new().create(true).append(true).open(&path)?;

    let config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_thread_level(LevelFilter::Debug)
        .build();

    WriteLogger::init(level, config, log_file)
        .map_err(|e| Error::new(ErrorKind::Other, format!("Logger initialization failed: {}", e)))?;
    Ok(path)
}

/// Parses a level name, defaulting to `Info`.
pub fn parse_level(name: &str) -> LevelFilter {
    name.parse().unwrap_or(LevelFilter::Info)
}
