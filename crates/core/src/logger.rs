use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{mpsc, Mutex, MutexGuard, OnceLock};

use chrono::Local;

static LOGGER: OnceLock<Mutex<Logger>> = OnceLock::new();

struct Logger {
    file: Option<File>,
    tui_tx: Option<mpsc::Sender<String>>,
    prefixes: HashMap<String, u8>, // prefix -> color index
}

// Color indices for TUI rendering (mapped in afspelen-tui ui.rs)
pub const COLOR_GRAY: u8 = 1;
pub const COLOR_BLUE: u8 = 2;
pub const COLOR_GREEN: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }
}

fn logger() -> Option<MutexGuard<'static, Logger>> {
    LOGGER
        .get()
        .map(|l| l.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
}

/// Initialize the global logger. Truncates `app.log` inside `log_dir`.
pub fn init(log_dir: &Path) -> io::Result<()> {
    fs::create_dir_all(log_dir)?;
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(log_dir.join("app.log"))?;

    if LOGGER
        .set(Mutex::new(Logger { file: Some(file), tui_tx: None, prefixes: HashMap::new() }))
        .is_err()
    {
        // Already initialized (tests, or a second init); just swap the file.
        if let Some(mut l) = logger() {
            l.file = OpenOptions::new().append(true).open(log_dir.join("app.log")).ok();
        }
    }
    Ok(())
}

/// Wire the dashboard log channel.
pub fn set_tui_sender(tx: mpsc::Sender<String>) {
    if let Some(mut l) = logger() {
        l.tui_tx = Some(tx);
    }
}

/// Register a prefix with a color. Later `*_p` calls with this prefix
/// render in that color.
pub fn register_prefix(prefix: &str, color: u8) {
    if let Some(mut l) = logger() {
        l.prefixes.insert(prefix.to_string(), color);
    }
}

/// Dashboard format uses \x1f as field separator:
/// level\x1fprefix\x1fcolor\x1ftimestamp\x1fmessage
pub fn format_tui_line(level: Level, prefix: &str, color: u8, ts: &str, msg: &str) -> String {
    format!("{}\x1f{}\x1f{}\x1f{}\x1f{}", level.as_str(), prefix, color, ts, msg)
}

fn write_log(level: Level, prefix: &str, msg: &str) {
    let Some(mut l) = logger() else { return };

    let ts = Local::now().format("%H:%M:%S").to_string();
    let color = l.prefixes.get(prefix).copied().unwrap_or(0);

    let file_line = if prefix.is_empty() {
        format!("[{}] [{}] {}", ts, level.as_str(), msg)
    } else {
        format!("[{}] [{}] [{}] {}", ts, level.as_str(), prefix, msg)
    };
    if let Some(file) = l.file.as_mut() {
        writeln!(file, "{}", file_line).ok();
    }

    let tui_line = format_tui_line(level, prefix, color, &ts, msg);
    let disconnected = match &l.tui_tx {
        Some(tx) => tx.send(tui_line).is_err(),
        None => false,
    };
    if disconnected {
        l.tui_tx = None;
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

pub fn info_p(prefix: &str, msg: &str) {
    write_log(Level::Info, prefix, msg);
}

pub fn warn_p(prefix: &str, msg: &str) {
    write_log(Level::Warn, prefix, msg);
}

pub fn error_p(prefix: &str, msg: &str) {
    write_log(Level::Error, prefix, msg);
}
