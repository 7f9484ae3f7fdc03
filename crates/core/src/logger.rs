use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{mpsc, Mutex, OnceLock};

use anyhow::{Context, Result};
use chrono::Local;

static LOGGER: OnceLock<Mutex<Logger>> = OnceLock::new();

struct Logger {
    file: File,
    tui_tx: Option<mpsc::Sender<String>>,
    prefixes: HashMap<String, u8>, // prefix -> color index
}

// Color indices for TUI rendering (mapped in ui.rs)
pub const COLOR_GRAY: u8 = 1;
pub const COLOR_BLUE: u8 = 2;
pub const COLOR_MAGENTA: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl Level {
    fn tag(self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }
}

/// Initialize the global logger. Truncates `app.log` in `log_dir`.
/// Before this runs every log call is a no-op.
pub fn init(log_dir: &Path) -> Result<()> {
    fs::create_dir_all(log_dir).ok();
    let log_path = log_dir.join("app.log");
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(&log_path)
        .with_context(|| format!("failed to open log file {}", log_path.display()))?;

    LOGGER
        .set(Mutex::new(Logger { file, tui_tx: None, prefixes: HashMap::new() }))
        .ok();

    // Components of the core log under these prefixes
    register_prefix("engine", COLOR_BLUE);
    register_prefix("queue", COLOR_GRAY);
    register_prefix("exec", COLOR_GRAY);
    register_prefix("profile", COLOR_MAGENTA);
    Ok(())
}

/// Wire the TUI log channel.
pub fn set_tui_sender(tx: mpsc::Sender<String>) {
    if let Some(logger) = LOGGER.get() {
        if let Ok(mut l) = logger.lock() {
            l.tui_tx = Some(tx);
        }
    }
}

/// Register a prefix with a display color.
pub fn register_prefix(prefix: &str, color: u8) {
    if let Some(logger) = LOGGER.get() {
        if let Ok(mut l) = logger.lock() {
            l.prefixes.insert(prefix.to_string(), color);
        }
    }
}

/// The file gets plain text; the TUI channel gets
/// level\x1fprefix\x1fcolor\x1ftimestamp\x1fmessage
fn write_log(level: Level, prefix: &str, msg: &str) {
    let Some(logger) = LOGGER.get() else { return };
    let Ok(mut l) = logger.lock() else { return };

    let ts = Local::now().format("%H:%M:%S%.3f").to_string();
    let color = l.prefixes.get(prefix).copied().unwrap_or(0);

    let file_line = if prefix.is_empty() {
        format!("[{}] [{}] {}", ts, level.tag(), msg)
    } else {
        format!("[{}] [{}] [{}] {}", ts, level.tag(), prefix, msg)
    };
    writeln!(l.file, "{}", file_line).ok();

    if let Some(tx) = &l.tui_tx {
        let short_ts = Local::now().format("%H:%M:%S").to_string();
        tx.send(format!("{}\x1f{}\x1f{}\x1f{}\x1f{}", level.tag(), prefix, color, short_ts, msg))
            .ok();
    }
}

pub fn info(msg: &str) {
    write_log(Level::Info, "", msg);
}

pub fn warn(msg: &str) {
    write_log(Level::Warn, "", msg);
}

pub fn error(msg: &str) {
    write_log(Level::Error, "", msg);
}

/// Log under a registered prefix.
pub fn info_p(prefix: &str, msg: &str) {
    write_log(Level::Info, prefix, msg);
}

pub fn warn_p(prefix: &str, msg: &str) {
    write_log(Level::Warn, prefix, msg);
}

pub fn error_p(prefix: &str, msg: &str) {
    write_log(Level::Error, prefix, msg);
}
