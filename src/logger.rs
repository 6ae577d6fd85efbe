use chrono::Local;
use env_logger::fmt::{Color, Style, StyledValue};
use env_logger::{Builder, Logger, Target};
use log::{Level, LevelFilter, SetLoggerError};

/// Installs the logger for the binary. Records go to stderr, so stdout only
/// carries the extracted media.
pub(crate) fn init(debug: bool) -> Result<(), SetLoggerError> {
    let logger = default_logger(debug);
    log::set_max_level(logger.filter());
    log::set_boxed_logger(Box::new(logger))
}

pub(crate) fn default_logger(debug: bool) -> Logger {
    formatted_local_time_builder("%H:%M:%S.%3f", debug)
        .target(Target::Stderr)
        .filter_level(if debug { LevelFilter::Trace } else { LevelFilter::Info })
        .parse_default_env()
        .build()
}

fn formatted_local_time_builder(fmt: &'static str, show_module: bool) -> Builder {
    let mut builder = Builder::new();

    builder.format(move |f, record| {
        use std::io::Write;

        let Some(module) = own_module(record.target(), clap::crate_name!()) else {
            return Ok(());
        };

        let mut style = f.style();
        let level = colored_level(&mut style, record.level());

        let time = Local::now().format(fmt);

        match module {
            Some(module) if show_module => writeln!(f, "{} {} [{}] > {}", time, level, module, record.args()),
            _ => writeln!(f, "{} {} > {}", time, level, record.args()),
        }
    });

    builder
}

/// `None` for records of other crates, otherwise the module below the crate
/// root, if any.
fn own_module<'a>(target: &'a str, crate_name: &str) -> Option<Option<&'a str>> {
    if target == crate_name {
        return Some(None);
    }

    target
        .strip_prefix(crate_name)
        .and_then(|rest| rest.strip_prefix("::"))
        .map(Some)
}

fn colored_level(style: &'_ mut Style, level: Level) -> StyledValue<'_, &'static str> {
    match level {
        Level::Trace => style.set_color(Color::Magenta).value("TRACE"),
        Level::Debug => style.set_color(Color::Blue).value("DEBUG"),
        Level::Info => style.set_color(Color::Green).value("INFO "),
        Level::Warn => style.set_color(Color::Yellow).value("WARN "),
        Level::Error => style.set_color(Color::Red).value("ERROR"),
    }
}
