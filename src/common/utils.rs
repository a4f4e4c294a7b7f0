use colored::Colorize;
use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;

use crate::common::constants::PROJECT_NAME;

/// Wires the fern dispatcher: colored stdout plus an optional plain file.
pub fn setup_logger(log_file: Option<&str>) -> Result<(), fern::InitError> {
    let colors = ColoredLevelConfig::new()
        .info(Color::Green)
        .warn(Color::Yellow)
        .error(Color::Red)
        .debug(Color::Magenta);

    let mut dispatch = fern::Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "{} [{}] {}",
                chrono::Local::now()
                    .format("%H:%M:%S%.3f")
                    .to_string()
                    .dimmed(),
                colors.color(record.level()),
                message
            ))
        })
        .level(LevelFilter::Info)
        .level_for(PROJECT_NAME, LevelFilter::Debug)
        .level_for("hyper", LevelFilter::Warn)
        .level_for("reqwest", LevelFilter::Warn)
        .chain(std::io::stdout());

    if let Some(path) = log_file {
        dispatch = dispatch.chain(fern::log_file(path)?);
    }

    dispatch.apply()?;
    Ok(())
}
