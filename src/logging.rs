use std::fs::{self, File};
use std::path::Path;

use log::LevelFilter;
use simplelog::{ColorChoice, CombinedLogger, SharedLogger, TermLogger, TerminalMode, WriteLogger};

use crate::error::ExtractResult;

/// Terminal level for the number of `-v` flags.
pub fn terminal_level(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Installs the global logger: terminal output at the chosen verbosity and,
/// if `log_file` is given, a debug-level copy written to that file.
pub fn init(verbosity: u8, log_file: Option<&Path>) -> ExtractResult<()> {
    let config = simplelog::ConfigBuilder::new()
        .set_location_level(LevelFilter::Off)
        .set_target_level(LevelFilter::Off)
        .set_thread_level(LevelFilter::Off)
        .build();

    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        terminal_level(verbosity),
        config.clone(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];
    if let Some(path) = log_file {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        loggers.push(WriteLogger::new(
            LevelFilter::Debug.max(terminal_level(verbosity)),
            config,
            File::create(path)?,
        ));
    }
    CombinedLogger::init(loggers)?;
    Ok(())
}
