//! Logging setup for the dataset pipeline.

use chrono::{Local, NaiveDate};
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::setting::LoaderSetting;
use crate::utility::get_folder_path;

/// Log level constants (compatible with Python logging module)
pub const DEBUG: i32 = 10;
pub const INFO: i32 = 20;
pub const WARNING: i32 = 30;
pub const ERROR: i32 = 40;

/// Convert integer log level to tracing Level
pub fn level_from_int(level: i32) -> Level {
    match level {
        i32::MIN..=10 => Level::DEBUG,
        11..=20 => Level::INFO,
        21..=30 => Level::WARN,
        _ => Level::ERROR,
    }
}

/// Install the global tracing subscriber from the loader setting.
///
/// Returns `false` when a global subscriber was already installed.
pub fn init_logger(setting: &LoaderSetting) -> bool {
    let level = level_from_int(setting.log_level);
    let filter = EnvFilter::from_default_env().add_directive(level.into());

    let console_layer = setting.log_console.then(|| {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .with_ansi(true)
    });

    let file_layer = if setting.log_file {
        open_log_file().map(|file| {
            fmt::layer()
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false)
        })
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .is_ok()
}

fn open_log_file() -> Option<fs::File> {
    let log_path = get_log_file_path();
    if let Some(parent) = log_path.parent() {
        let _ = fs::create_dir_all(parent);
    }

    match OpenOptions::new().create(true).append(true).open(&log_path) {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!("Failed to open log file {:?}: {}", log_path, e);
            None
        }
    }
}

/// Get the log file path for today
fn get_log_file_path() -> PathBuf {
    get_folder_path("log").join(log_file_name(Local::now().date_naive()))
}

fn log_file_name(date: NaiveDate) -> String {
    format!("dataset_{}.log", date.format("%Y%m%d"))
}
