use chrono::Local;
use fern::Dispatch;
use fern::colors::{Color, ColoredLevelConfig};
use log::LevelFilter;
use std::fs;

const LOG_DIR: &str = "logs";
const LOG_FILE: &str = "transfer_core.log";

/// Initializes the global logger: colored console output plus a plain
/// file sink under `logs/`.
///
/// Call once at startup. The level comes from `RUST_LOG` and defaults
/// to `info`; chatty dependencies are pinned to `warn`.
pub fn init() {
    let level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|v| v.parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Info);

    if let Err(e) = fs::create_dir_all(LOG_DIR) {
        eprintln!("Failed to create log directory '{}': {}", LOG_DIR, e);
    }
    let log_file_path = format!("{}/{}", LOG_DIR, LOG_FILE);

    let result = Dispatch::new()
        .level(level)
        .level_for("serde", LevelFilter::Warn)
        .level_for("url", LevelFilter::Warn)
        .chain(console_dispatch())
        .chain(file_dispatch(&log_file_path))
        .apply();

    if let Err(e) = result {
        eprintln!("Failed to apply logger configuration: {}", e);
        return;
    }

    log::info!("Logger initialized. Logging to console and '{}'.", log_file_path);
}

fn console_dispatch() -> Dispatch {
    let colors = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Blue)
        .trace(Color::BrightBlack);

    Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                colors.color(record.level()),
                record.target(),
                message
            ))
        })
        .chain(std::io::stderr())
}

fn file_dispatch(path: &str) -> Dispatch {
    let sink = fern::log_file(path).unwrap_or_else(|e| {
        eprintln!("Failed to open log file '{}': {}", path, e);
        fern::log_file("/dev/stderr").expect("Failed to open stderr as fallback")
    });

    Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {} {}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                message
            ))
        })
        .chain(sink)
}
