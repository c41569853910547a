//! Module that prints colored, leveled log lines to the console.

use color_print::cformat;
use std::sync::atomic::{AtomicU8, Ordering};

/// Enum that represents how verbose the console output is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
}

static LEVEL: AtomicU8 = AtomicU8::new(Level::Info as u8);

/// Function that sets the most verbose level that gets printed.
pub fn set_level(level: Level) {
    LEVEL.store(level as u8, Ordering::Relaxed);
}

/// Function that returns the current log level.
pub fn level() -> Level {
    match LEVEL.load(Ordering::Relaxed) {
        0 => Level::Error,
        1 => Level::Warn,
        2 => Level::Info,
        _ => Level::Debug,
    }
}

pub fn enabled(level: Level) -> bool {
    level <= self::level()
}

/// Function that prints an error message.
pub fn error(msg: &str) {
    if enabled(Level::Error) {
        eprintln!("{} {msg}", cformat!("<red, bold>[ERROR]</red, bold>"));
    }
}

/// Function that prints a warning.
pub fn warn(msg: &str) {
    if enabled(Level::Warn) {
        eprintln!("{} {msg}", cformat!("<yellow, bold>[WARN]</yellow, bold>"));
    }
}

/// Function that prints an informational message.
pub fn info(msg: &str) {
    if enabled(Level::Info) {
        println!("{} {msg}", cformat!("<green, bold>[INFO]</green, bold>"));
    }
}

/// Function that prints a debug message.
pub fn debug(msg: &str) {
    if enabled(Level::Debug) {
        println!("{} {msg}", cformat!("<blue, bold>[DEBUG]</blue, bold>"));
    }
}
